use std::fmt::{Display, Formatter};

/// Handle to a symbolic value allocated in a [`ValueArena`][crate::value::ValueArena].
///
/// Two handles are equal iff they name the same allocation: symbolic values
/// have identity semantics, structurally identical values allocated twice
/// are still different values.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValueRef(u32);

impl ValueRef {
    /// Literal `true`.
    pub const TRUE: ValueRef = ValueRef(0);
    /// Literal `false`.
    pub const FALSE: ValueRef = ValueRef(1);
    /// Literal `null`.
    pub const NULL: ValueRef = ValueRef(2);
    /// The receiver of the analyzed member.
    pub const THIS: ValueRef = ValueRef(3);
    /// The receiver seen through the base type.
    pub const BASE: ValueRef = ValueRef(4);

    /// Number of preallocated singleton values.
    pub(crate) const SINGLETONS: u32 = 5;

    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the index of the value in its arena.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this is one of the preallocated singletons.
    pub const fn is_singleton(self) -> bool {
        self.0 < Self::SINGLETONS
    }

    /// Whether this is `this` or `base`, the values that always count as live.
    pub const fn is_protected(self) -> bool {
        self.0 == Self::THIS.0 || self.0 == Self::BASE.0
    }
}

impl Display for ValueRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::TRUE => write!(f, "true"),
            Self::FALSE => write!(f, "false"),
            Self::NULL => write!(f, "null"),
            Self::THIS => write!(f, "this"),
            Self::BASE => write!(f, "base"),
            _ => write!(f, "sv{}", self.0),
        }
    }
}
