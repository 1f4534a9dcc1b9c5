//! Debug utilities for inspecting values and program states.
//!
//! These are primarily useful in tests, in rule checks under development,
//! and when tracing why a path was (not) pruned.

use crate::constraint::ConstraintSet;
use crate::reference::ValueRef;
use crate::relationship::EqualityKind;
use crate::state::ProgramState;
use crate::value::{BinaryBoolOp, ComparisonKind, ValueArena, ValueKind};

/// Detailed information about a single value in a given state.
#[derive(Debug, Clone)]
pub struct ValueInfo {
    pub value: ValueRef,
    pub kind: ValueKind,
    /// Direct operands (the payload, for a nullable wrapper).
    pub operands: Vec<ValueRef>,
    /// Constraints the value carries in the inspected state.
    pub constraints: ConstraintSet,
}

impl std::fmt::Display for ValueInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.value, expression(self.value, self.kind))?;
        if !self.constraints.is_empty() {
            write!(f, " {}", self.constraints)?;
        }
        Ok(())
    }
}

/// A value together with everything reachable from it, for debugging.
#[derive(Debug, Clone)]
pub struct ValueTree {
    pub root: ValueRef,
    pub values: Vec<ValueInfo>,
}

impl std::fmt::Display for ValueTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Value {} (size={}):", self.root, self.values.len())?;
        for info in &self.values {
            writeln!(f, "  {}", info)?;
        }
        Ok(())
    }
}

/// One-line expression for a value of the given shape.
fn expression(value: ValueRef, kind: ValueKind) -> String {
    let eq = |k: EqualityKind| match k {
        EqualityKind::Value => "==",
        EqualityKind::Reference => "===",
    };
    let ne = |k: EqualityKind| match k {
        EqualityKind::Value => "!=",
        EqualityKind::Reference => "!==",
    };
    match kind {
        ValueKind::BoolLiteral(_) | ValueKind::Null | ValueKind::This | ValueKind::Base | ValueKind::Plain => {
            value.to_string()
        }
        ValueKind::Nullable(inner) => format!("{}?", inner),
        ValueKind::Not(a) => format!("!{}", a),
        ValueKind::Binary(op, a, b) => {
            let op = match op {
                BinaryBoolOp::And => "&&",
                BinaryBoolOp::Or => "||",
                BinaryBoolOp::Xor => "^",
            };
            format!("{} {} {}", a, op, b)
        }
        ValueKind::Equals(k, a, b) => format!("{} {} {}", a, eq(k), b),
        ValueKind::NotEquals(k, a, b) => format!("{} {} {}", a, ne(k), b),
        ValueKind::Comparison(ComparisonKind::Less, a, b) => format!("{} < {}", a, b),
        ValueKind::Comparison(ComparisonKind::LessOrEqual, a, b) => format!("{} <= {}", a, b),
    }
}

impl ValueArena {
    /// The value as an expression over its direct operands, e.g. `sv6 == null`.
    pub fn describe(&self, value: ValueRef) -> String {
        expression(value, self.kind(value))
    }

    /// Get detailed information about a single value.
    pub fn value_info(&self, value: ValueRef, state: &ProgramState) -> ValueInfo {
        ValueInfo {
            value,
            kind: self.kind(value),
            operands: self.operands(value),
            constraints: state.constraints(value),
        }
    }

    /// All values reachable from `root`, sorted by handle.
    pub fn debug_tree(&self, root: ValueRef, state: &ProgramState) -> ValueTree {
        let values = self
            .descendants([root])
            .into_iter()
            .map(|v| self.value_info(v, state))
            .collect();
        ValueTree { root, values }
    }

    /// Compact multi-line representation of a value and its operands.
    pub fn debug_string(&self, root: ValueRef, state: &ProgramState) -> String {
        self.debug_tree(root, state).to_string()
    }

    /// Dump a complete program state for debugging.
    pub fn dump_state(&self, state: &ProgramState) -> String {
        StateDump { values: self, state }.to_string()
    }
}

/// Human-readable rendering of a whole program state.
pub struct StateDump<'a> {
    pub values: &'a ValueArena,
    pub state: &'a ProgramState,
}

impl std::fmt::Display for StateDump<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (values, state) = (self.values, self.state);

        writeln!(f, "=== Program State ===")?;

        writeln!(f, "Bindings:")?;
        for (symbol, value) in state.symbols() {
            writeln!(f, "  {} -> {}", symbol, values.value_info(value, state))?;
        }

        let stack: Vec<String> = state.stack().map(|v| v.to_string()).collect();
        writeln!(f, "Stack: [{}]", stack.join(", "))?;

        writeln!(f, "Constraints:")?;
        for (value, constraints) in state.constrained_values().filter(|(v, _)| !v.is_singleton()) {
            writeln!(f, "  {} {}", values.describe(value), constraints)?;
        }

        writeln!(f, "Relationships:")?;
        for r in state.relationships() {
            writeln!(f, "  {}", r)?;
        }
        Ok(())
    }
}
