use test_log::test;

use symex_rs::cfg::{BinaryOp, CfgBuilder, ControlFlowGraph, Literal, OperationKind, Terminator};
use symex_rs::check::{BranchContext, ExplorationCheck, OperationContext, PostOperationContext};
use symex_rs::config::ExplorationConfig;
use symex_rs::constraint::{Constraint, DisposableConstraint};
use symex_rs::explorer::{ExplorationResult, Explorer, IncompleteReason, Outcome};
use symex_rs::model::{TableModel, TypeHint, UnknownModel};
use symex_rs::types::{BlockId, OperationId, SymbolId};
use symex_rs::value::ValueArena;

fn s(id: u32) -> SymbolId {
    SymbolId::new(id)
}

/// Dereference of a value known to be null.
#[derive(Default)]
struct NullDereference {
    found: Vec<OperationId>,
}

impl ExplorationCheck for NullDereference {
    fn pre_operation(&mut self, ctx: &OperationContext<'_>) {
        if ctx.operation.kind != OperationKind::Dereference {
            return;
        }
        if let Some(top) = ctx.state.peek_value(0) {
            if ctx.state.has_constraint(top, Constraint::NULL) && !self.found.contains(&ctx.operation.id) {
                self.found.push(ctx.operation.id);
            }
        }
    }
}

/// Dispose of a value already disposed.
#[derive(Default)]
struct DoubleDispose {
    found: Vec<OperationId>,
}

impl ExplorationCheck for DoubleDispose {
    fn pre_operation(&mut self, ctx: &OperationContext<'_>) {
        let disposed = Constraint::Disposable(DisposableConstraint::Disposed);
        if ctx.operation.kind == OperationKind::Dispose {
            if let Some(top) = ctx.state.peek_value(0) {
                if ctx.state.has_constraint(top, disposed) && !self.found.contains(&ctx.operation.id) {
                    self.found.push(ctx.operation.id);
                }
            }
        }
    }
}

/// Conditions with the same outcome on every path.
#[derive(Default)]
struct ConstantCondition {
    /// Per branching block: (seen true, seen false).
    outcomes: Vec<(BlockId, bool, bool)>,
}

impl ExplorationCheck for ConstantCondition {
    fn on_branch(&mut self, ctx: &BranchContext<'_>) {
        match self.outcomes.iter_mut().find(|(b, ..)| *b == ctx.block) {
            Some((_, t, f)) => {
                *t |= ctx.true_feasible;
                *f |= ctx.false_feasible;
            }
            None => self.outcomes.push((ctx.block, ctx.true_feasible, ctx.false_feasible)),
        }
    }
}

impl ConstantCondition {
    fn constant_blocks(&self) -> Vec<BlockId> {
        self.outcomes.iter().filter(|(_, t, f)| t != f).map(|(b, ..)| *b).collect()
    }
}

/// Counts values pushed by operations and the end-of-exploration callback.
#[derive(Default)]
struct Counter {
    pushed: usize,
    results: Vec<Outcome>,
}

impl ExplorationCheck for Counter {
    fn post_operation(&mut self, ctx: &PostOperationContext<'_>) {
        if ctx.pushed.is_some() {
            self.pushed += 1;
        }
    }

    fn on_exploration_end(&mut self, result: &ExplorationResult) {
        self.results.push(result.outcome);
    }
}

/// ```text
/// if (x == null) { x.f }
/// ```
fn null_check_then_dereference(swap: bool) -> ControlFlowGraph {
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    let inside = b.new_block();
    let exit = b.new_block();
    b.push_all(
        entry,
        [
            OperationKind::Load(s(1)),
            OperationKind::Literal(Literal::Null),
            OperationKind::Binary(BinaryOp::Equal),
        ],
    );
    let (t, f) = if swap { (exit, inside) } else { (inside, exit) };
    b.terminate(entry, Terminator::branch(t, f));
    b.push_all(
        inside,
        [
            OperationKind::Load(s(1)),
            OperationKind::Dereference,
            OperationKind::Discard,
        ],
    );
    b.terminate(inside, Terminator::Jump(exit));
    b.build()
}

#[test]
fn null_dereference_is_reported_on_the_null_branch() {
    let cfg = null_check_then_dereference(false);
    let values = ValueArena::new();
    let mut check = NullDereference::default();
    let result = Explorer::new(&values, &UnknownModel)
        .explore(&cfg, &mut [&mut check])
        .unwrap();

    assert!(result.outcome.is_complete());
    assert_eq!(check.found.len(), 1);
    // The null path ends at the dereference; the other one exits.
    assert_eq!(result.paths_completed, 1);
}

#[test]
fn no_null_dereference_on_the_other_branch() {
    let cfg = null_check_then_dereference(true);
    let values = ValueArena::new();
    let mut check = NullDereference::default();
    let result = Explorer::new(&values, &UnknownModel)
        .explore(&cfg, &mut [&mut check])
        .unwrap();

    assert!(check.found.is_empty());
    assert_eq!(result.paths_completed, 2);
}

#[test]
fn double_dispose() {
    // x = new(); x.Dispose(); if (?) { x.Dispose(); }
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    let again = b.new_block();
    let exit = b.new_block();
    b.push_all(
        entry,
        [
            OperationKind::New { arguments: 0 },
            OperationKind::Store(s(1)),
            OperationKind::Load(s(1)),
            OperationKind::Dispose,
            OperationKind::Literal(Literal::Unknown),
        ],
    );
    b.terminate(entry, Terminator::branch(again, exit));
    b.push(again, OperationKind::Load(s(1)));
    let second = b.push(again, OperationKind::Dispose);
    b.terminate(again, Terminator::Jump(exit));
    let cfg = b.build();

    let values = ValueArena::new();
    let mut check = DoubleDispose::default();
    let result = Explorer::new(&values, &UnknownModel)
        .explore(&cfg, &mut [&mut check])
        .unwrap();
    assert!(result.outcome.is_complete());
    assert_eq!(check.found, vec![second]);
}

#[test]
fn repeated_condition_is_constant() {
    // if (a < b) { if (b <= a) { } }
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    let outer = b.new_block();
    let inner = b.new_block();
    let exit = b.new_block();
    b.push_all(
        entry,
        [
            OperationKind::Load(s(1)),
            OperationKind::Load(s(2)),
            OperationKind::Binary(BinaryOp::Less),
        ],
    );
    b.terminate(entry, Terminator::branch(outer, exit));
    b.push_all(
        outer,
        [
            OperationKind::Load(s(2)),
            OperationKind::Load(s(1)),
            OperationKind::Binary(BinaryOp::LessOrEqual),
        ],
    );
    b.terminate(outer, Terminator::branch(inner, exit));
    b.terminate(inner, Terminator::Jump(exit));
    let cfg = b.build();

    let values = ValueArena::new();
    let mut check = ConstantCondition::default();
    Explorer::new(&values, &UnknownModel)
        .explore(&cfg, &mut [&mut check])
        .unwrap();
    assert_eq!(check.constant_blocks(), vec![outer]);
}

#[test]
fn unconditioned_loop_is_bounded() {
    // while (?) { x = new(); x.Dispose(); }
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    let head = b.new_block();
    let body = b.new_block();
    let exit = b.new_block();
    b.push(entry, OperationKind::Declare(s(1)));
    b.terminate(entry, Terminator::Jump(head));
    b.push(head, OperationKind::Literal(Literal::Unknown));
    b.terminate(head, Terminator::branch(body, exit));
    b.push_all(
        body,
        [
            OperationKind::New { arguments: 0 },
            OperationKind::Store(s(1)),
            OperationKind::Load(s(1)),
            OperationKind::Dispose,
        ],
    );
    b.terminate(body, Terminator::Jump(head));
    let cfg = b.build();

    for max_per_point_visits in [1, 2, 5] {
        let values = ValueArena::new();
        let config = ExplorationConfig::default().with_max_per_point_visits(max_per_point_visits);
        let result = Explorer::with_config(&values, &UnknownModel, config)
            .explore(&cfg, &mut [])
            .unwrap();
        assert!(matches!(
            result.outcome,
            Outcome::Incomplete(IncompleteReason::VisitLimit { .. })
        ));
        assert!(result.paths_completed >= 1);
    }
}

#[test]
fn loop_with_stable_state_completes() {
    // while (flag) { }
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    let head = b.new_block();
    let exit = b.new_block();
    b.terminate(entry, Terminator::Jump(head));
    b.push(head, OperationKind::Load(s(1)));
    b.terminate(head, Terminator::branch(head, exit));
    let cfg = b.build();

    let values = ValueArena::new();
    let model = TableModel::new().with_type(s(1), TypeHint::Boolean);
    let result = Explorer::with_config(
        &values,
        &model,
        ExplorationConfig::default().with_max_per_point_visits(10),
    )
    .explore(&cfg, &mut [])
    .unwrap();
    assert_eq!(result.outcome, Outcome::Complete);
    assert_eq!(result.paths_completed, 1);
}

#[test]
fn state_cap_stops_exploration() {
    // Eight independent unknown conditions in a row: 2^8 paths.
    let mut b = CfgBuilder::new();
    let mut current = b.entry();
    for i in 0..8 {
        let then_block = b.new_block();
        let join = b.new_block();
        b.push(current, OperationKind::Literal(Literal::Unknown));
        b.terminate(current, Terminator::branch(then_block, join));
        b.push_all(
            then_block,
            [OperationKind::Literal(Literal::Unknown), OperationKind::Store(s(i))],
        );
        b.terminate(then_block, Terminator::Jump(join));
        current = join;
    }
    let cfg = b.build();

    let values = ValueArena::new();
    let mut counter = Counter::default();
    let result = Explorer::with_config(&values, &UnknownModel, ExplorationConfig::default().with_max_states(50))
        .explore(&cfg, &mut [&mut counter])
        .unwrap();

    assert_eq!(
        result.outcome,
        Outcome::Incomplete(IncompleteReason::StateLimit { max_states: 50 })
    );
    assert!(result.states_explored <= 50);
    assert_eq!(counter.results, vec![result.outcome]);
    assert!(counter.pushed > 0);
}

#[test]
fn scope_end_merges_paths() {
    // { t = ?; if (t == null) { } } exit
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    let then_block = b.new_block();
    let join = b.new_block();
    b.push_all(
        entry,
        [
            OperationKind::Declare(s(1)),
            OperationKind::Load(s(1)),
            OperationKind::Literal(Literal::Null),
            OperationKind::Binary(BinaryOp::ReferenceEqual),
        ],
    );
    b.terminate(entry, Terminator::branch(then_block, join));
    b.terminate(then_block, Terminator::Jump(join));
    b.push(join, OperationKind::EndScope(vec![s(1)]));
    let cfg = b.build();

    let values = ValueArena::new();
    let result = Explorer::new(&values, &UnknownModel).explore(&cfg, &mut []).unwrap();
    assert!(result.outcome.is_complete());
    assert_eq!(result.paths_completed, 1);
    assert_eq!(result.final_states.len(), 1);
}
