//! Errors raised by the explorer and by constraint propagation.
//!
//! These are contract violations by the front-end: the graph asks for
//! something the engine cannot do. An infeasible path is not an error; it
//! simply has no successor states.

use thiserror::Error;

use crate::constraint::Constraint;
use crate::reference::ValueRef;
use crate::types::{BlockId, ProgramPoint};

/// Fatal error for the graph being explored.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ExplorationError {
    /// An operation popped more values than the expression stack holds.
    #[error("Stack underflow at {point}: needed {needed} value(s), found {available}")]
    StackUnderflow {
        point: ProgramPoint,
        needed: usize,
        available: usize,
    },

    /// A terminator (or the entry) names a block the graph does not have.
    #[error("Unknown block {block} referenced at {point}")]
    UnknownBlock { point: ProgramPoint, block: BlockId },

    /// A branch found nothing on the expression stack to branch on.
    #[error("Missing branch condition at the end of {block}")]
    MissingBranchCondition { block: BlockId },

    /// A constraint was applied to a value whose shape cannot carry its family.
    #[error("Value {value} cannot carry {constraint} (at {point})")]
    UnsupportedConstraint {
        point: ProgramPoint,
        value: ValueRef,
        constraint: Constraint,
    },
}

impl ExplorationError {
    pub(crate) fn unsupported_at(point: ProgramPoint, error: UnsupportedConstraint) -> Self {
        ExplorationError::UnsupportedConstraint {
            point,
            value: error.value,
            constraint: error.constraint,
        }
    }
}

/// A constraint of a family the value's shape cannot carry, e.g. a disposal
/// constraint on a comparison.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
#[error("Value {value} cannot carry {constraint}")]
pub struct UnsupportedConstraint {
    pub value: ValueRef,
    pub constraint: Constraint,
}

pub type Result<T, E = ExplorationError> = std::result::Result<T, E>;
