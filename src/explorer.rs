//! Exploration engine.
//!
//! The explorer walks a [`ControlFlowGraph`] path by path. A worklist holds
//! `(program point, state)` pairs; each step evaluates one operation (or the
//! terminator of a block) and enqueues the resulting states. Branches fork
//! the state with the condition asserted true and false, and infeasible
//! successors disappear silently.
//!
//! Exploration stays finite thanks to three mechanisms:
//! - a `(point, state)` pair already seen is never explored again
//!   (visit counters take no part in state equality);
//! - a path that reaches the same point more than
//!   [`max_per_point_visits`][ExplorationConfig::max_per_point_visits] times is dropped;
//! - exploration stops after [`max_states`][ExplorationConfig::max_states]
//!   distinct pairs.
//!
//! Dropping a path or stopping early makes the result
//! [incomplete][Outcome::Incomplete]: checks have not seen every path.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use log::{debug, info, warn};

use crate::cfg::{BasicBlock, BinaryOp, ControlFlowGraph, Literal, Operation, OperationKind, Terminator};
use crate::check::{BranchContext, ExitContext, ExplorationCheck, OperationContext, PostOperationContext};
use crate::config::ExplorationConfig;
use crate::constraint::{BoolConstraint, Constraint, ConstraintKind, DisposableConstraint};
use crate::error::{ExplorationError, Result};
use crate::model::{SemanticModel, TypeHint};
use crate::reference::ValueRef;
use crate::state::ProgramState;
use crate::types::{BlockId, ProgramPoint, SymbolId};
use crate::value::ValueArena;

/// Why an exploration did not cover every path.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IncompleteReason {
    /// A path was dropped after visiting `point` too many times.
    VisitLimit { point: ProgramPoint },
    /// The global cap on distinct states was reached.
    StateLimit { max_states: usize },
    /// The host asked to stop.
    Cancelled,
}

impl fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncompleteReason::VisitLimit { point } => write!(f, "visit limit reached at {}", point),
            IncompleteReason::StateLimit { max_states } => write!(f, "state limit of {} reached", max_states),
            IncompleteReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Outcome {
    Complete,
    /// Analysis incomplete. Holds the first reason encountered.
    Incomplete(IncompleteReason),
}

impl Outcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete)
    }
}

/// Result of exploring one graph.
#[derive(Debug, Clone)]
pub struct ExplorationResult {
    pub outcome: Outcome,
    /// Distinct `(point, state)` pairs explored.
    pub states_explored: usize,
    /// Worklist items processed.
    pub steps: usize,
    /// Paths that reached an exit.
    pub paths_completed: usize,
    /// Distinct states at exit.
    pub final_states: Vec<ProgramState>,
}

impl ExplorationResult {
    fn new() -> Self {
        ExplorationResult {
            outcome: Outcome::Complete,
            states_explored: 0,
            steps: 0,
            paths_completed: 0,
            final_states: Vec::new(),
        }
    }

    fn mark_incomplete(&mut self, reason: IncompleteReason) {
        if self.outcome.is_complete() {
            self.outcome = Outcome::Incomplete(reason);
        }
    }
}

/// Successor states of an operation, each with the value it pushed.
type Evaluated = Vec<(ProgramState, Option<ValueRef>)>;

fn pushed(state: ProgramState, value: ValueRef) -> Result<Evaluated> {
    Ok(vec![(state.push_value(value), Some(value))])
}

/// Symbolic explorer over control-flow graphs.
///
/// Values created while exploring are allocated in the borrowed arena, which
/// outlives the exploration so that results and states can be inspected
/// (and rendered) afterwards.
pub struct Explorer<'a> {
    values: &'a ValueArena,
    model: &'a dyn SemanticModel,
    config: ExplorationConfig,
}

impl<'a> Explorer<'a> {
    pub fn new(values: &'a ValueArena, model: &'a dyn SemanticModel) -> Self {
        Explorer {
            values,
            model,
            config: ExplorationConfig::default(),
        }
    }

    pub fn with_config(values: &'a ValueArena, model: &'a dyn SemanticModel, config: ExplorationConfig) -> Self {
        Explorer { values, model, config }
    }

    pub fn config(&self) -> &ExplorationConfig {
        &self.config
    }

    pub fn values(&self) -> &'a ValueArena {
        self.values
    }

    /// Explore every path of the graph, notifying `checks` along the way.
    pub fn explore(&self, cfg: &ControlFlowGraph, checks: &mut [&mut dyn ExplorationCheck]) -> Result<ExplorationResult> {
        self.explore_until(cfg, checks, || false)
    }

    /// Like [`explore`][Self::explore], polling `stop` before every step.
    ///
    /// When `stop` returns `true` exploration ends with
    /// [`IncompleteReason::Cancelled`].
    pub fn explore_until(
        &self,
        cfg: &ControlFlowGraph,
        checks: &mut [&mut dyn ExplorationCheck],
        mut stop: impl FnMut() -> bool,
    ) -> Result<ExplorationResult> {
        let mut result = ExplorationResult::new();
        let mut visited: HashSet<(ProgramPoint, ProgramState)> = HashSet::new();
        let mut worklist: VecDeque<(ProgramPoint, ProgramState)> = VecDeque::new();

        let start = ProgramPoint::entry(cfg.entry());
        if cfg.block(cfg.entry()).is_none() {
            return Err(ExplorationError::UnknownBlock {
                point: start,
                block: cfg.entry(),
            });
        }
        let initial = ProgramState::new();
        visited.insert((start, initial.clone()));
        worklist.push_back((start, initial));

        'explore: while let Some((point, state)) = worklist.pop_front() {
            if stop() {
                warn!("Exploration cancelled after {} steps", result.steps);
                result.mark_incomplete(IncompleteReason::Cancelled);
                break;
            }
            result.steps += 1;

            if state.visited_count(point) >= self.config.max_per_point_visits {
                debug!("Dropping path at {}: visited {} times", point, state.visited_count(point));
                result.mark_incomplete(IncompleteReason::VisitLimit { point });
                continue;
            }
            let state = state.add_visit(point);

            let block = self.block(cfg, point, point.block())?;
            let successors = match block.operations.get(point.offset()) {
                Some(operation) => self.step_operation(point, operation, &state, checks)?,
                None => self.step_terminator(cfg, block, point, state, checks, &mut result)?,
            };

            for (next, next_state) in successors {
                let key = (next, next_state);
                if visited.contains(&key) {
                    debug!("Skipping duplicate state at {}", next);
                    continue;
                }
                if visited.len() >= self.config.max_states {
                    warn!("State limit of {} reached, stopping", self.config.max_states);
                    result.mark_incomplete(IncompleteReason::StateLimit {
                        max_states: self.config.max_states,
                    });
                    break 'explore;
                }
                visited.insert(key.clone());
                worklist.push_back(key);
            }
        }

        result.states_explored = visited.len();
        match result.outcome {
            Outcome::Complete => info!(
                "Exploration complete: {} states, {} steps, {} paths",
                result.states_explored, result.steps, result.paths_completed
            ),
            Outcome::Incomplete(reason) => info!(
                "Exploration incomplete ({}): {} states, {} steps, {} paths",
                reason, result.states_explored, result.steps, result.paths_completed
            ),
        }

        for check in checks.iter_mut() {
            check.on_exploration_end(&result);
        }
        Ok(result)
    }

    fn block<'g>(&self, cfg: &'g ControlFlowGraph, point: ProgramPoint, id: BlockId) -> Result<&'g BasicBlock> {
        cfg.block(id)
            .ok_or(ExplorationError::UnknownBlock { point, block: id })
    }

    fn step_operation(
        &self,
        point: ProgramPoint,
        operation: &Operation,
        state: &ProgramState,
        checks: &mut [&mut dyn ExplorationCheck],
    ) -> Result<Vec<(ProgramPoint, ProgramState)>> {
        let ctx = OperationContext {
            point,
            operation,
            state,
            values: self.values,
        };
        for check in checks.iter_mut() {
            check.pre_operation(&ctx);
        }

        let results = self.evaluate(point, operation, state)?;
        debug!("{} {} -> {} state(s)", point, operation, results.len());

        let mut successors = Vec::with_capacity(results.len());
        for (next_state, pushed) in results {
            let ctx = PostOperationContext {
                point,
                operation,
                pre_state: state,
                state: &next_state,
                pushed,
                values: self.values,
            };
            for check in checks.iter_mut() {
                check.post_operation(&ctx);
            }
            successors.push((point.next(), next_state));
        }
        Ok(successors)
    }

    fn step_terminator(
        &self,
        cfg: &ControlFlowGraph,
        block: &BasicBlock,
        point: ProgramPoint,
        state: ProgramState,
        checks: &mut [&mut dyn ExplorationCheck],
        result: &mut ExplorationResult,
    ) -> Result<Vec<(ProgramPoint, ProgramState)>> {
        match block.terminator {
            Terminator::Jump(target) => {
                self.block(cfg, point, target)?;
                Ok(vec![(ProgramPoint::entry(target), state)])
            }
            Terminator::Exit => {
                let ctx = ExitContext {
                    block: block.id,
                    state: &state,
                    values: self.values,
                };
                for check in checks.iter_mut() {
                    check.on_exit(&ctx);
                }
                result.paths_completed += 1;
                if !result.final_states.contains(&state) {
                    result.final_states.push(state);
                }
                Ok(vec![])
            }
            Terminator::Branch {
                true_target,
                false_target,
            } => {
                self.block(cfg, point, true_target)?;
                self.block(cfg, point, false_target)?;
                let (state, condition) = state
                    .pop_value()
                    .ok_or(ExplorationError::MissingBranchCondition { block: block.id })?;
                self.require(point, condition, Constraint::TRUE)?;

                let (when_true, when_false) = match state.constraint(condition, ConstraintKind::Bool) {
                    Some(Constraint::Bool(BoolConstraint::True)) => (vec![state.clone()], vec![]),
                    Some(Constraint::Bool(BoolConstraint::False)) => (vec![], vec![state.clone()]),
                    _ => (
                        self.values.try_set_constraint(&state, condition, Constraint::TRUE),
                        self.values.try_set_constraint(&state, condition, Constraint::FALSE),
                    ),
                };
                debug!(
                    "{}: branch on {}: {} true, {} false",
                    block.id,
                    condition,
                    when_true.len(),
                    when_false.len()
                );

                let ctx = BranchContext {
                    block: block.id,
                    condition,
                    state: &state,
                    values: self.values,
                    true_feasible: !when_true.is_empty(),
                    false_feasible: !when_false.is_empty(),
                };
                for check in checks.iter_mut() {
                    check.on_branch(&ctx);
                }

                let successors = when_true
                    .into_iter()
                    .map(|s| (ProgramPoint::entry(true_target), s))
                    .chain(when_false.into_iter().map(|s| (ProgramPoint::entry(false_target), s)))
                    .collect();
                Ok(successors)
            }
        }
    }

    /// Successor states of one operation, each with the value it pushed.
    fn evaluate(&self, point: ProgramPoint, operation: &Operation, state: &ProgramState) -> Result<Evaluated> {
        let values = self.values;

        match &operation.kind {
            OperationKind::Literal(literal) => {
                let value = match literal {
                    Literal::True => ValueRef::TRUE,
                    Literal::False => ValueRef::FALSE,
                    Literal::Null => ValueRef::NULL,
                    Literal::Unknown => values.mk_plain(),
                };
                pushed(state.clone(), value)
            }
            OperationKind::Declare(symbol) => {
                let (state, _) = self.fresh_binding(state, *symbol);
                Ok(vec![(state, None)])
            }
            OperationKind::Load(symbol) => match state.symbol_value(*symbol) {
                Some(value) => pushed(state.clone(), value),
                None => {
                    let (state, value) = self.fresh_binding(state, *symbol);
                    pushed(state, value)
                }
            },
            OperationKind::Store(symbol) => {
                let (state, popped) = self.pop(point, state, 1)?;
                Ok(vec![(state.store_symbol_value(*symbol, popped[0]), None)])
            }
            OperationKind::This => pushed(state.clone(), ValueRef::THIS),
            OperationKind::Base => pushed(state.clone(), ValueRef::BASE),
            OperationKind::Binary(op) => {
                let (state, popped) = self.pop(point, state, 2)?;
                let (left, right) = (popped[0], popped[1]);
                let value = match op {
                    BinaryOp::Equal => values.mk_equals(left, right),
                    BinaryOp::NotEqual => values.mk_not_equals(left, right),
                    BinaryOp::ReferenceEqual => values.mk_reference_equals(left, right),
                    BinaryOp::ReferenceNotEqual => values.mk_reference_not_equals(left, right),
                    BinaryOp::Less => values.mk_less(left, right),
                    BinaryOp::LessOrEqual => values.mk_less_or_equal(left, right),
                    BinaryOp::Greater => values.mk_less(right, left),
                    BinaryOp::GreaterOrEqual => values.mk_less_or_equal(right, left),
                    BinaryOp::And => values.mk_and(left, right),
                    BinaryOp::Or => values.mk_or(left, right),
                    BinaryOp::Xor => values.mk_xor(left, right),
                };
                pushed(state, value)
            }
            OperationKind::Not => {
                let (state, popped) = self.pop(point, state, 1)?;
                pushed(state, values.mk_not(popped[0]))
            }
            OperationKind::Invoke { arguments, returns } => {
                let (mut state, _) = self.pop(point, state, *arguments)?;
                let referenced: Vec<SymbolId> = state
                    .symbols()
                    .map(|(symbol, _)| symbol)
                    .filter(|&symbol| self.model.references_symbol(operation.id, symbol))
                    .collect();
                for symbol in referenced {
                    debug!("{} may reassign {}", operation.id, symbol);
                    state = self.fresh_binding(&state, symbol).0;
                }
                if *returns {
                    pushed(state, values.mk_plain())
                } else {
                    Ok(vec![(state, None)])
                }
            }
            OperationKind::New { arguments } => {
                let (state, _) = self.pop(point, state, *arguments)?;
                let value = values.mk_plain();
                pushed(state.set_constraint(value, Constraint::NOT_NULL), value)
            }
            OperationKind::Dereference => {
                let value = state.peek_value(0).ok_or(ExplorationError::StackUnderflow {
                    point,
                    needed: 1,
                    available: 0,
                })?;
                let states = values
                    .checked_set_constraint(state, value, Constraint::NOT_NULL)
                    .map_err(|e| ExplorationError::unsupported_at(point, e))?;
                if states.is_empty() {
                    debug!("{}: {} is null, path ends", point, value);
                }
                Ok(states.into_iter().map(|s| (s, None)).collect())
            }
            OperationKind::Dispose => {
                let (state, popped) = self.pop(point, state, 1)?;
                let value = popped[0];
                let disposed = Constraint::Disposable(DisposableConstraint::Disposed);
                self.require(point, value, disposed)?;
                let mut state = state.remove_constraint(value, ConstraintKind::Disposable);
                if let Some(inner) = values.wrapped(value) {
                    state = state.remove_constraint(inner, ConstraintKind::Disposable);
                }
                let states = values.try_set_constraint(&state, value, disposed);
                Ok(states.into_iter().map(|s| (s, None)).collect())
            }
            OperationKind::Discard => {
                let (state, _) = self.pop(point, state, 1)?;
                Ok(vec![(state, None)])
            }
            OperationKind::EndScope(symbols) => {
                let state = state.remove_symbols(values, |symbol| symbols.contains(&symbol));
                Ok(vec![(state, None)])
            }
        }
    }

    /// Bind `symbol` to a fresh value of its declared type.
    fn fresh_binding(&self, state: &ProgramState, symbol: SymbolId) -> (ProgramState, ValueRef) {
        let hint = self.model.declared_type(symbol);
        let value = self.values.create(hint);
        let mut state = state.store_symbol_value(symbol, value);
        if hint == TypeHint::Value {
            state = state.set_constraint(value, Constraint::NOT_NULL);
        }
        (state, value)
    }

    fn pop(&self, point: ProgramPoint, state: &ProgramState, count: usize) -> Result<(ProgramState, Vec<ValueRef>)> {
        state.pop_values(count).ok_or(ExplorationError::StackUnderflow {
            point,
            needed: count,
            available: state.stack_depth(),
        })
    }

    fn require(&self, point: ProgramPoint, value: ValueRef, constraint: Constraint) -> Result<()> {
        if self.values.can_carry(value, constraint.kind()) {
            Ok(())
        } else {
            Err(ExplorationError::UnsupportedConstraint {
                point,
                value,
                constraint,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::model::{TableModel, UnknownModel};
    use crate::types::OperationId;

    /// Records what the hooks saw.
    #[derive(Default)]
    struct Recorder {
        operations: Vec<OperationId>,
        branches: Vec<(BlockId, bool, bool)>,
        exits: usize,
        ended: bool,
    }

    impl ExplorationCheck for Recorder {
        fn pre_operation(&mut self, ctx: &OperationContext<'_>) {
            self.operations.push(ctx.operation.id);
        }

        fn on_branch(&mut self, ctx: &BranchContext<'_>) {
            self.branches.push((ctx.block, ctx.true_feasible, ctx.false_feasible));
        }

        fn on_exit(&mut self, _ctx: &ExitContext<'_>) {
            self.exits += 1;
        }

        fn on_exploration_end(&mut self, _result: &ExplorationResult) {
            self.ended = true;
        }
    }

    fn s(id: u32) -> SymbolId {
        SymbolId::new(id)
    }

    #[test]
    fn test_straight_line() {
        let mut builder = crate::cfg::CfgBuilder::new();
        let entry = builder.entry();
        builder.push_all(
            entry,
            [
                OperationKind::Declare(s(1)),
                OperationKind::Literal(Literal::Null),
                OperationKind::Store(s(1)),
            ],
        );
        let cfg = builder.build();

        let values = ValueArena::new();
        let explorer = Explorer::new(&values, &UnknownModel);
        let mut recorder = Recorder::default();
        let result = explorer.explore(&cfg, &mut [&mut recorder]).unwrap();

        assert!(result.outcome.is_complete());
        assert_eq!(result.paths_completed, 1);
        assert_eq!(recorder.operations.len(), 3);
        assert_eq!(recorder.exits, 1);
        assert!(recorder.ended);
        assert_eq!(result.final_states[0].symbol_value(s(1)), Some(ValueRef::NULL));
    }

    #[test]
    fn test_branch_forks_and_prunes() {
        // if (x == null) { x.f } else {}
        let mut builder = crate::cfg::CfgBuilder::new();
        let entry = builder.entry();
        let then_block = builder.new_block();
        let exit = builder.new_block();
        builder.push_all(
            entry,
            [
                OperationKind::Load(s(1)),
                OperationKind::Literal(Literal::Null),
                OperationKind::Binary(BinaryOp::Equal),
            ],
        );
        builder.terminate(entry, Terminator::branch(then_block, exit));
        builder.push_all(then_block, [OperationKind::Load(s(1)), OperationKind::Dereference]);
        builder.terminate(then_block, Terminator::Jump(exit));
        let cfg = builder.build();

        let values = ValueArena::new();
        let explorer = Explorer::new(&values, &UnknownModel);
        let mut recorder = Recorder::default();
        let result = explorer.explore(&cfg, &mut [&mut recorder]).unwrap();

        assert!(result.outcome.is_complete());
        assert_eq!(recorder.branches, vec![(entry, true, true)]);
        // The null path dies at the dereference.
        assert_eq!(result.paths_completed, 1);
    }

    #[test]
    fn test_value_types_are_never_null() {
        let mut builder = crate::cfg::CfgBuilder::new();
        let entry = builder.entry();
        let then_block = builder.new_block();
        let exit = builder.new_block();
        builder.push_all(
            entry,
            [
                OperationKind::Declare(s(1)),
                OperationKind::Load(s(1)),
                OperationKind::Literal(Literal::Null),
                OperationKind::Binary(BinaryOp::ReferenceEqual),
            ],
        );
        builder.terminate(entry, Terminator::branch(then_block, exit));
        let cfg = builder.build();

        let values = ValueArena::new();
        let model = TableModel::new().with_type(s(1), TypeHint::Value);
        let mut recorder = Recorder::default();
        Explorer::new(&values, &model).explore(&cfg, &mut [&mut recorder]).unwrap();
        assert_eq!(recorder.branches, vec![(entry, false, true)]);
    }

    #[test]
    fn test_invoke_reassigns_referenced_symbols() {
        let mut builder = crate::cfg::CfgBuilder::new();
        let entry = builder.entry();
        builder.push_all(entry, [OperationKind::Literal(Literal::Null), OperationKind::Store(s(1))]);
        let call = builder.push(
            entry,
            OperationKind::Invoke {
                arguments: 0,
                returns: false,
            },
        );
        let cfg = builder.build();

        let values = ValueArena::new();
        let model = TableModel::new().with_reference(call, s(1));
        let result = Explorer::new(&values, &model).explore(&cfg, &mut []).unwrap();
        let value = result.final_states[0].symbol_value(s(1)).unwrap();
        assert_ne!(value, ValueRef::NULL);
        assert!(!result.final_states[0].has_constraint(value, Constraint::NULL));
    }

    #[test]
    fn test_stack_underflow() {
        let mut builder = crate::cfg::CfgBuilder::new();
        let entry = builder.entry();
        builder.push(entry, OperationKind::Binary(BinaryOp::And));
        let cfg = builder.build();

        let values = ValueArena::new();
        let err = Explorer::new(&values, &UnknownModel).explore(&cfg, &mut []).unwrap_err();
        assert_eq!(
            err,
            ExplorationError::StackUnderflow {
                point: ProgramPoint::entry(entry),
                needed: 2,
                available: 0,
            }
        );
    }

    #[test]
    fn test_missing_branch_condition() {
        let mut builder = crate::cfg::CfgBuilder::new();
        let entry = builder.entry();
        let exit = builder.new_block();
        builder.terminate(entry, Terminator::branch(exit, exit));
        let cfg = builder.build();

        let values = ValueArena::new();
        let err = Explorer::new(&values, &UnknownModel).explore(&cfg, &mut []).unwrap_err();
        assert_eq!(err, ExplorationError::MissingBranchCondition { block: entry });
    }

    #[test]
    fn test_unknown_block() {
        let mut builder = crate::cfg::CfgBuilder::new();
        let entry = builder.entry();
        builder.terminate(entry, Terminator::Jump(BlockId::new(9)));
        let cfg = builder.build();

        let values = ValueArena::new();
        let err = Explorer::new(&values, &UnknownModel).explore(&cfg, &mut []).unwrap_err();
        assert!(matches!(err, ExplorationError::UnknownBlock { block, .. } if block == BlockId::new(9)));
    }

    #[test]
    fn test_unsupported_constraint() {
        let mut builder = crate::cfg::CfgBuilder::new();
        let entry = builder.entry();
        builder.push_all(entry, [OperationKind::Literal(Literal::True), OperationKind::Dispose]);
        let cfg = builder.build();

        let values = ValueArena::new();
        let err = Explorer::new(&values, &UnknownModel).explore(&cfg, &mut []).unwrap_err();
        assert!(matches!(err, ExplorationError::UnsupportedConstraint { value, .. } if value == ValueRef::TRUE));
    }

    #[test]
    fn test_cancellation() {
        let mut builder = crate::cfg::CfgBuilder::new();
        let entry = builder.entry();
        builder.push(entry, OperationKind::This);
        let cfg = builder.build();

        let values = ValueArena::new();
        let mut recorder = Recorder::default();
        let result = Explorer::new(&values, &UnknownModel)
            .explore_until(&cfg, &mut [&mut recorder], || true)
            .unwrap();
        assert_eq!(result.outcome, Outcome::Incomplete(IncompleteReason::Cancelled));
        assert_eq!(result.steps, 0);
        assert!(recorder.ended);
    }
}
