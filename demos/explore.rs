use clap::Parser;

use symex_rs::cfg::{BinaryOp, CfgBuilder, ControlFlowGraph, Literal, OperationKind, Terminator};
use symex_rs::check::{BranchContext, ExplorationCheck, OperationContext};
use symex_rs::config::ExplorationConfig;
use symex_rs::constraint::{Constraint, DisposableConstraint};
use symex_rs::dot::DotConfig;
use symex_rs::explorer::{ExplorationResult, Explorer};
use symex_rs::model::{TableModel, TypeHint};
use symex_rs::types::{BlockId, OperationId, SymbolId};
use symex_rs::value::ValueArena;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Maximum number of distinct states to explore.
    #[arg(long, value_name = "INT", default_value = "1000")]
    max_states: usize,

    /// Maximum number of visits of a program point along one path.
    #[arg(long, value_name = "INT", default_value = "2")]
    max_visits: usize,

    /// Print the control-flow graph and the final states in DOT format.
    #[arg(long)]
    dot: bool,
}

#[derive(Default)]
struct NullDereference {
    issues: Vec<OperationId>,
}

impl ExplorationCheck for NullDereference {
    fn pre_operation(&mut self, ctx: &OperationContext<'_>) {
        if ctx.operation.kind != OperationKind::Dereference {
            return;
        }
        let Some(top) = ctx.state.peek_value(0) else { return };
        if ctx.state.has_constraint(top, Constraint::NULL) && !self.issues.contains(&ctx.operation.id) {
            log::warn!("{}: null dereference of {}", ctx.point, ctx.values.describe(top));
            self.issues.push(ctx.operation.id);
        }
    }
}

#[derive(Default)]
struct DoubleDispose {
    issues: Vec<OperationId>,
}

impl ExplorationCheck for DoubleDispose {
    fn pre_operation(&mut self, ctx: &OperationContext<'_>) {
        if ctx.operation.kind != OperationKind::Dispose {
            return;
        }
        let Some(top) = ctx.state.peek_value(0) else { return };
        let disposed = Constraint::Disposable(DisposableConstraint::Disposed);
        if ctx.state.has_constraint(top, disposed) && !self.issues.contains(&ctx.operation.id) {
            log::warn!("{}: {} is disposed twice", ctx.point, ctx.values.describe(top));
            self.issues.push(ctx.operation.id);
        }
    }
}

/// Reports conditions that were only ever true, or only ever false.
#[derive(Default)]
struct ConstantCondition {
    seen: Vec<(BlockId, bool, bool)>,
}

impl ExplorationCheck for ConstantCondition {
    fn on_branch(&mut self, ctx: &BranchContext<'_>) {
        match self.seen.iter_mut().find(|(block, ..)| *block == ctx.block) {
            Some((_, t, f)) => {
                *t |= ctx.true_feasible;
                *f |= ctx.false_feasible;
            }
            None => self.seen.push((ctx.block, ctx.true_feasible, ctx.false_feasible)),
        }
    }

    fn on_exploration_end(&mut self, result: &ExplorationResult) {
        if !result.outcome.is_complete() {
            // Unexplored paths may take the other branch.
            return;
        }
        for &(block, t, f) in &self.seen {
            if t != f {
                log::warn!("{}: condition is always {}", block, t);
            }
        }
    }
}

/// ```text
/// void M(object x, bool flag) {
///     if (x == null) { x.ToString(); }
///     var s = new Stream();
///     s.Dispose();
///     if (flag) { s.Dispose(); }
///     if (flag && x != null) { }
///     while (flag) { }
/// }
/// ```
fn sample(x: SymbolId, flag: SymbolId, s: SymbolId) -> ControlFlowGraph {
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    let deref = b.new_block();
    let alloc = b.new_block();
    let dispose_again = b.new_block();
    let check_both = b.new_block();
    let both = b.new_block();
    let head = b.new_block();
    let exit = b.new_block();

    b.push_all(
        entry,
        [
            OperationKind::Load(x),
            OperationKind::Literal(Literal::Null),
            OperationKind::Binary(BinaryOp::Equal),
        ],
    );
    b.terminate(entry, Terminator::branch(deref, alloc));

    b.push_all(
        deref,
        [
            OperationKind::Load(x),
            OperationKind::Dereference,
            OperationKind::Invoke {
                arguments: 1,
                returns: true,
            },
            OperationKind::Discard,
        ],
    );
    b.terminate(deref, Terminator::Jump(alloc));

    b.push_all(
        alloc,
        [
            OperationKind::New { arguments: 0 },
            OperationKind::Store(s),
            OperationKind::Load(s),
            OperationKind::Dispose,
            OperationKind::Load(flag),
        ],
    );
    b.terminate(alloc, Terminator::branch(dispose_again, check_both));

    b.push_all(dispose_again, [OperationKind::Load(s), OperationKind::Dispose]);
    b.terminate(dispose_again, Terminator::Jump(check_both));

    b.push_all(
        check_both,
        [
            OperationKind::Load(flag),
            OperationKind::Load(x),
            OperationKind::Literal(Literal::Null),
            OperationKind::Binary(BinaryOp::NotEqual),
            OperationKind::Binary(BinaryOp::And),
        ],
    );
    b.terminate(check_both, Terminator::branch(both, head));
    b.terminate(both, Terminator::Jump(head));

    b.push(head, OperationKind::Load(flag));
    b.terminate(head, Terminator::branch(head, exit));
    b.push(exit, OperationKind::EndScope(vec![s]));

    b.build()
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let (x, flag, s) = (SymbolId::new(1), SymbolId::new(2), SymbolId::new(3));
    let cfg = sample(x, flag, s);
    println!("cfg:\n{}", cfg);

    let values = ValueArena::new();
    let model = TableModel::new()
        .with_type(x, TypeHint::Reference)
        .with_type(flag, TypeHint::Boolean)
        .with_type(s, TypeHint::Reference);
    let config = ExplorationConfig::default()
        .with_max_states(args.max_states)
        .with_max_per_point_visits(args.max_visits);
    let explorer = Explorer::with_config(&values, &model, config);

    let mut null_dereference = NullDereference::default();
    let mut double_dispose = DoubleDispose::default();
    let mut constant_condition = ConstantCondition::default();
    let result = explorer.explore(
        &cfg,
        &mut [&mut null_dereference, &mut double_dispose, &mut constant_condition],
    )?;

    println!("outcome = {:?}", result.outcome);
    println!(
        "states = {}, steps = {}, paths = {}, final states = {}",
        result.states_explored,
        result.steps,
        result.paths_completed,
        result.final_states.len()
    );
    println!("null dereferences at {:?}", null_dereference.issues);
    println!("double disposals at {:?}", double_dispose.issues);

    for (i, state) in result.final_states.iter().enumerate() {
        println!("final state #{}:\n{}", i, values.dump_state(state));
    }

    if args.dot {
        println!("{}", cfg.to_dot()?);
        let config = DotConfig::default();
        for state in &result.final_states {
            println!("{}", values.state_to_dot(state, &config)?);
        }
    }

    let time_total = time_total.elapsed();
    println!("\nAll done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
