//! Hooks for rule checks.
//!
//! A rule check observes exploration through an [`ExplorationCheck`]. Every
//! hook receives a read-only snapshot; checks cannot steer exploration, they
//! only record what they see (typically as diagnostics of their own type).
//!
//! ```
//! use symex_rs::check::{ExplorationCheck, OperationContext};
//! use symex_rs::cfg::OperationKind;
//! use symex_rs::constraint::Constraint;
//! use symex_rs::types::OperationId;
//!
//! /// Flags dereferences of a value known to be null.
//! #[derive(Default)]
//! struct NullDereference {
//!     found: Vec<OperationId>,
//! }
//!
//! impl ExplorationCheck for NullDereference {
//!     fn pre_operation(&mut self, ctx: &OperationContext<'_>) {
//!         if ctx.operation.kind == OperationKind::Dereference {
//!             if let Some(top) = ctx.state.peek_value(0) {
//!                 if ctx.state.has_constraint(top, Constraint::NULL) {
//!                     self.found.push(ctx.operation.id);
//!                 }
//!             }
//!         }
//!     }
//! }
//! ```

use crate::cfg::Operation;
use crate::explorer::ExplorationResult;
use crate::reference::ValueRef;
use crate::state::ProgramState;
use crate::types::{BlockId, ProgramPoint};
use crate::value::ValueArena;

/// Snapshot before an operation is evaluated.
#[derive(Debug, Copy, Clone)]
pub struct OperationContext<'a> {
    pub point: ProgramPoint,
    pub operation: &'a Operation,
    pub state: &'a ProgramState,
    pub values: &'a ValueArena,
}

/// Snapshot after an operation produced one of its successor states.
#[derive(Debug, Copy, Clone)]
pub struct PostOperationContext<'a> {
    pub point: ProgramPoint,
    pub operation: &'a Operation,
    pub pre_state: &'a ProgramState,
    pub state: &'a ProgramState,
    /// The value the operation left on top of the stack, if it pushed one.
    pub pushed: Option<ValueRef>,
    pub values: &'a ValueArena,
}

/// Snapshot at a branch, after the condition has been popped.
#[derive(Debug, Copy, Clone)]
pub struct BranchContext<'a> {
    pub block: BlockId,
    pub condition: ValueRef,
    pub state: &'a ProgramState,
    pub values: &'a ValueArena,
    /// Whether the condition can be true on this path.
    pub true_feasible: bool,
    /// Whether the condition can be false on this path.
    pub false_feasible: bool,
}

impl BranchContext<'_> {
    /// The condition has the same outcome on every continuation of this path.
    pub fn is_constant(&self) -> bool {
        self.true_feasible != self.false_feasible
    }
}

/// Snapshot when a path reaches an exit.
#[derive(Debug, Copy, Clone)]
pub struct ExitContext<'a> {
    pub block: BlockId,
    pub state: &'a ProgramState,
    pub values: &'a ValueArena,
}

/// Observer of an exploration. All hooks default to doing nothing.
pub trait ExplorationCheck {
    fn pre_operation(&mut self, _ctx: &OperationContext<'_>) {}

    fn post_operation(&mut self, _ctx: &PostOperationContext<'_>) {}

    fn on_branch(&mut self, _ctx: &BranchContext<'_>) {}

    fn on_exit(&mut self, _ctx: &ExitContext<'_>) {}

    /// Called once with the final result, complete or not. Not called when
    /// exploration fails with an error.
    fn on_exploration_end(&mut self, _result: &ExplorationResult) {}
}
