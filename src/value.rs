//! Symbolic values and the arena that owns them.
//!
//! Every symbolic value of one exploration lives in a single [`ValueArena`] and
//! is addressed by a [`ValueRef`] handle. Values are immutable once allocated:
//! facts about them are kept in [program states][crate::state::ProgramState],
//! never in the arena.
//!
//! The arena plays the role of a manager: all value construction and all
//! constraint propagation (see [`propagate`][crate::propagate]) go through it.
//!
//! ```
//! use symex_rs::reference::ValueRef;
//! use symex_rs::value::{ValueArena, ValueKind};
//!
//! let values = ValueArena::new();
//! let a = values.mk_plain();
//! let b = values.mk_plain();
//! let eq = values.mk_equals(a, b);
//!
//! assert_ne!(a, b);
//! assert_eq!(values.operands(eq), vec![a, b]);
//! assert_eq!(values.kind(ValueRef::NULL), ValueKind::Null);
//! ```

use std::cell::RefCell;
use std::fmt;

use log::debug;

use crate::constraint::ConstraintKind;
use crate::model::TypeHint;
use crate::reference::ValueRef;
use crate::relationship::EqualityKind;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BinaryBoolOp {
    And,
    Or,
    Xor,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ComparisonKind {
    Less,
    LessOrEqual,
}

/// Shape of a symbolic value.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ValueKind {
    /// Literal `true` or `false`.
    BoolLiteral(bool),
    Null,
    This,
    Base,
    /// An unknown value with no structure.
    Plain,
    /// An optional wrapper around a payload value.
    Nullable(ValueRef),
    /// Logical negation.
    Not(ValueRef),
    Binary(BinaryBoolOp, ValueRef, ValueRef),
    /// The boolean `a == b`.
    Equals(EqualityKind, ValueRef, ValueRef),
    /// The boolean `a != b`.
    NotEquals(EqualityKind, ValueRef, ValueRef),
    /// The boolean `a < b` or `a <= b`.
    Comparison(ComparisonKind, ValueRef, ValueRef),
}

impl ValueKind {
    /// Whether the value is the result of a boolean operator or literal.
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            ValueKind::BoolLiteral(_)
                | ValueKind::Not(_)
                | ValueKind::Binary(..)
                | ValueKind::Equals(..)
                | ValueKind::NotEquals(..)
                | ValueKind::Comparison(..)
        )
    }
}

/// Arena of symbolic values.
///
/// The five singletons (`true`, `false`, `null`, `this`, `base`) are allocated
/// up front at the indices named by the [`ValueRef`] constants.
pub struct ValueArena {
    kinds: RefCell<Vec<ValueKind>>,
}

impl ValueArena {
    pub fn new() -> Self {
        let kinds = vec![
            ValueKind::BoolLiteral(true),
            ValueKind::BoolLiteral(false),
            ValueKind::Null,
            ValueKind::This,
            ValueKind::Base,
        ];
        assert_eq!(kinds.len(), ValueRef::SINGLETONS as usize);
        Self {
            kinds: RefCell::new(kinds),
        }
    }
}

impl Default for ValueArena {
    fn default() -> Self {
        ValueArena::new()
    }
}

impl fmt::Debug for ValueArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueArena").field("size", &self.len()).finish()
    }
}

impl ValueArena {
    /// Number of allocated values, singletons included.
    pub fn len(&self) -> usize {
        self.kinds.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self, value: ValueRef) -> ValueKind {
        self.kinds.borrow()[value.index()]
    }

    fn alloc(&self, kind: ValueKind) -> ValueRef {
        let mut kinds = self.kinds.borrow_mut();
        assert!(kinds.len() < u32::MAX as usize, "Value arena is full");
        let value = ValueRef::new(kinds.len() as u32);
        kinds.push(kind);
        debug!("alloc {} = {:?}", value, kind);
        value
    }

    pub fn mk_plain(&self) -> ValueRef {
        self.alloc(ValueKind::Plain)
    }

    /// A nullable wrapper around a fresh payload value.
    pub fn mk_nullable(&self) -> ValueRef {
        let inner = self.mk_plain();
        self.alloc(ValueKind::Nullable(inner))
    }

    /// A fresh value for something declared with the given type.
    pub fn create(&self, hint: TypeHint) -> ValueRef {
        match hint {
            TypeHint::Nullable => self.mk_nullable(),
            TypeHint::Reference | TypeHint::Value | TypeHint::Boolean => self.mk_plain(),
        }
    }

    pub fn mk_bool(&self, value: bool) -> ValueRef {
        if value {
            ValueRef::TRUE
        } else {
            ValueRef::FALSE
        }
    }

    pub fn mk_not(&self, operand: ValueRef) -> ValueRef {
        self.alloc(ValueKind::Not(operand))
    }

    pub fn mk_and(&self, left: ValueRef, right: ValueRef) -> ValueRef {
        self.alloc(ValueKind::Binary(BinaryBoolOp::And, left, right))
    }

    pub fn mk_or(&self, left: ValueRef, right: ValueRef) -> ValueRef {
        self.alloc(ValueKind::Binary(BinaryBoolOp::Or, left, right))
    }

    pub fn mk_xor(&self, left: ValueRef, right: ValueRef) -> ValueRef {
        self.alloc(ValueKind::Binary(BinaryBoolOp::Xor, left, right))
    }

    pub fn mk_equals(&self, left: ValueRef, right: ValueRef) -> ValueRef {
        self.alloc(ValueKind::Equals(EqualityKind::Value, left, right))
    }

    pub fn mk_reference_equals(&self, left: ValueRef, right: ValueRef) -> ValueRef {
        self.alloc(ValueKind::Equals(EqualityKind::Reference, left, right))
    }

    pub fn mk_not_equals(&self, left: ValueRef, right: ValueRef) -> ValueRef {
        self.alloc(ValueKind::NotEquals(EqualityKind::Value, left, right))
    }

    pub fn mk_reference_not_equals(&self, left: ValueRef, right: ValueRef) -> ValueRef {
        self.alloc(ValueKind::NotEquals(EqualityKind::Reference, left, right))
    }

    pub fn mk_less(&self, left: ValueRef, right: ValueRef) -> ValueRef {
        self.alloc(ValueKind::Comparison(ComparisonKind::Less, left, right))
    }

    pub fn mk_less_or_equal(&self, left: ValueRef, right: ValueRef) -> ValueRef {
        self.alloc(ValueKind::Comparison(ComparisonKind::LessOrEqual, left, right))
    }

    /// Direct operands of a composite value, in source order.
    pub fn operands(&self, value: ValueRef) -> Vec<ValueRef> {
        match self.kind(value) {
            ValueKind::BoolLiteral(_) | ValueKind::Null | ValueKind::This | ValueKind::Base | ValueKind::Plain => vec![],
            ValueKind::Nullable(inner) | ValueKind::Not(inner) => vec![inner],
            ValueKind::Binary(_, a, b)
            | ValueKind::Equals(_, a, b)
            | ValueKind::NotEquals(_, a, b)
            | ValueKind::Comparison(_, a, b) => vec![a, b],
        }
    }

    /// The payload of a nullable wrapper.
    pub fn wrapped(&self, value: ValueRef) -> Option<ValueRef> {
        match self.kind(value) {
            ValueKind::Nullable(inner) => Some(inner),
            _ => None,
        }
    }

    /// All values reachable from `roots` through composite operands, roots included.
    pub fn descendants(&self, roots: impl IntoIterator<Item = ValueRef>) -> Vec<ValueRef> {
        let mut visited = std::collections::BTreeSet::new();
        let mut stack: Vec<ValueRef> = roots.into_iter().collect();
        while let Some(value) = stack.pop() {
            if visited.insert(value) {
                stack.extend(self.operands(value));
            }
        }
        visited.into_iter().collect()
    }

    /// Whether a value of this shape can carry constraints of the given family.
    ///
    /// Boolean-valued values only carry truth and nullability, `null` only
    /// nullability, and the receivers everything but truth.
    pub fn can_carry(&self, value: ValueRef, kind: ConstraintKind) -> bool {
        match self.kind(value) {
            ValueKind::Null => kind == ConstraintKind::Object,
            ValueKind::This | ValueKind::Base => kind != ConstraintKind::Bool,
            ValueKind::Plain | ValueKind::Nullable(_) => true,
            ValueKind::BoolLiteral(_)
            | ValueKind::Not(_)
            | ValueKind::Binary(..)
            | ValueKind::Equals(..)
            | ValueKind::NotEquals(..)
            | ValueKind::Comparison(..) => matches!(kind, ConstraintKind::Bool | ConstraintKind::Object),
        }
    }
}
