//! Constraint lattice.
//!
//! A constraint is a fact from a small closed family that can be attached to a
//! symbolic value. Constraints of the same family are mutually exclusive unless
//! one [implies][Constraint::implies] the other, and a value carries at most one
//! constraint per family at a time. Families never interact: a value can be
//! `NotNull` and `Disposed` simultaneously.
//!
//! ```
//! use symex_rs::constraint::{BoolConstraint, Constraint, StringConstraint};
//!
//! let t = Constraint::Bool(BoolConstraint::True);
//! assert_eq!(t.opposite(), Some(Constraint::Bool(BoolConstraint::False)));
//!
//! let ws = Constraint::String(StringConstraint::WhiteSpace);
//! assert!(ws.implies(Constraint::String(StringConstraint::Full)));
//! ```

use std::fmt;

/// Truth value of a boolean expression.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum BoolConstraint {
    True,
    False,
}

impl BoolConstraint {
    pub fn from_bool(value: bool) -> Self {
        if value {
            BoolConstraint::True
        } else {
            BoolConstraint::False
        }
    }

    pub fn as_bool(self) -> bool {
        self == BoolConstraint::True
    }
}

/// Nullability of a reference (or of a nullable wrapper).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ObjectConstraint {
    Null,
    NotNull,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum DisposableConstraint {
    Disposed,
    NotDisposed,
}

/// Provenance of a byte buffer used as cryptographic material.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ByteArrayConstraint {
    /// Still holds its constant initializer: cryptographically weak.
    Constant,
    /// Overwritten by a random generator: cryptographically strong.
    Modified,
}

/// Whether an initialization vector was produced by a random generator.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum IvConstraint {
    Random,
    NotRandom,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum CollectionConstraint {
    Empty,
    NotEmpty,
}

/// Content of a string.
///
/// `WhiteSpace` and `FullNotWhiteSpace` both refine `Full`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum StringConstraint {
    Empty,
    Full,
    WhiteSpace,
    FullNotWhiteSpace,
}

/// Family a constraint belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ConstraintKind {
    Bool,
    Object,
    Disposable,
    ByteArray,
    InitializationVector,
    Collection,
    String,
}

impl ConstraintKind {
    pub const ALL: [ConstraintKind; 7] = [
        ConstraintKind::Bool,
        ConstraintKind::Object,
        ConstraintKind::Disposable,
        ConstraintKind::ByteArray,
        ConstraintKind::InitializationVector,
        ConstraintKind::Collection,
        ConstraintKind::String,
    ];
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Constraint {
    Bool(BoolConstraint),
    Object(ObjectConstraint),
    Disposable(DisposableConstraint),
    ByteArray(ByteArrayConstraint),
    InitializationVector(IvConstraint),
    Collection(CollectionConstraint),
    String(StringConstraint),
}

impl Constraint {
    pub const TRUE: Constraint = Constraint::Bool(BoolConstraint::True);
    pub const FALSE: Constraint = Constraint::Bool(BoolConstraint::False);
    pub const NULL: Constraint = Constraint::Object(ObjectConstraint::Null);
    pub const NOT_NULL: Constraint = Constraint::Object(ObjectConstraint::NotNull);

    pub fn kind(self) -> ConstraintKind {
        match self {
            Constraint::Bool(_) => ConstraintKind::Bool,
            Constraint::Object(_) => ConstraintKind::Object,
            Constraint::Disposable(_) => ConstraintKind::Disposable,
            Constraint::ByteArray(_) => ConstraintKind::ByteArray,
            Constraint::InitializationVector(_) => ConstraintKind::InitializationVector,
            Constraint::Collection(_) => ConstraintKind::Collection,
            Constraint::String(_) => ConstraintKind::String,
        }
    }

    /// The complementary constraint of the same family, if the family has one.
    ///
    /// `Full` strings complement `Empty` ones; the two refinements of `Full`
    /// have no single complement.
    pub fn opposite(self) -> Option<Constraint> {
        use Constraint::*;
        let opposite = match self {
            Bool(BoolConstraint::True) => Bool(BoolConstraint::False),
            Bool(BoolConstraint::False) => Bool(BoolConstraint::True),
            Object(ObjectConstraint::Null) => Object(ObjectConstraint::NotNull),
            Object(ObjectConstraint::NotNull) => Object(ObjectConstraint::Null),
            Disposable(DisposableConstraint::Disposed) => Disposable(DisposableConstraint::NotDisposed),
            Disposable(DisposableConstraint::NotDisposed) => Disposable(DisposableConstraint::Disposed),
            ByteArray(ByteArrayConstraint::Constant) => ByteArray(ByteArrayConstraint::Modified),
            ByteArray(ByteArrayConstraint::Modified) => ByteArray(ByteArrayConstraint::Constant),
            InitializationVector(IvConstraint::Random) => InitializationVector(IvConstraint::NotRandom),
            InitializationVector(IvConstraint::NotRandom) => InitializationVector(IvConstraint::Random),
            Collection(CollectionConstraint::Empty) => Collection(CollectionConstraint::NotEmpty),
            Collection(CollectionConstraint::NotEmpty) => Collection(CollectionConstraint::Empty),
            String(StringConstraint::Empty) => String(StringConstraint::Full),
            String(StringConstraint::Full) => String(StringConstraint::Empty),
            String(StringConstraint::WhiteSpace) | String(StringConstraint::FullNotWhiteSpace) => return None,
        };
        Some(opposite)
    }

    /// The constraint `!x` carries when `x` carries `self`.
    ///
    /// Logical negation flips truth values and lifts nullability unchanged
    /// (`!null` is `null` for nullable booleans). Other families say nothing
    /// about the negated value.
    pub fn opposite_for_logical_not(self) -> Option<Constraint> {
        match self {
            Constraint::Bool(_) => self.opposite(),
            Constraint::Object(_) => Some(self),
            _ => None,
        }
    }

    /// Partial order within a family: `self` implies `other` when every value
    /// satisfying `self` also satisfies `other`.
    ///
    /// Constraints of different families never imply each other.
    pub fn implies(self, other: Constraint) -> bool {
        if self == other {
            return true;
        }
        matches!(
            (self, other),
            (
                Constraint::String(StringConstraint::WhiteSpace | StringConstraint::FullNotWhiteSpace),
                Constraint::String(StringConstraint::Full)
            )
        )
    }

    /// Whether `self` and `other` can hold for the same value at the same time.
    pub fn is_compatible_with(self, other: Constraint) -> bool {
        self.kind() != other.kind() || self.implies(other) || other.implies(self)
    }
}

impl From<BoolConstraint> for Constraint {
    fn from(c: BoolConstraint) -> Self {
        Constraint::Bool(c)
    }
}

impl From<ObjectConstraint> for Constraint {
    fn from(c: ObjectConstraint) -> Self {
        Constraint::Object(c)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Bool(c) => write!(f, "{:?}", c),
            Constraint::Object(c) => write!(f, "{:?}", c),
            Constraint::Disposable(c) => write!(f, "{:?}", c),
            Constraint::ByteArray(c) => write!(f, "{:?}Bytes", c),
            Constraint::InitializationVector(c) => write!(f, "{:?}IV", c),
            Constraint::Collection(c) => write!(f, "{:?}Collection", c),
            Constraint::String(c) => write!(f, "{:?}String", c),
        }
    }
}

/// Outcome of adding a constraint to a [`ConstraintSet`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Refinement {
    /// The set already implied the constraint.
    Unchanged,
    /// The constraint was added, or refined a weaker one of its family.
    Refined(ConstraintSet),
    /// The constraint contradicts the one already present in its family.
    Contradiction,
}

/// At most one constraint per family.
#[derive(Debug, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ConstraintSet {
    slots: [Option<Constraint>; 7],
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(kind: ConstraintKind) -> usize {
        kind as usize
    }

    pub fn get(&self, kind: ConstraintKind) -> Option<Constraint> {
        self.slots[Self::slot(kind)]
    }

    /// Whether the set contains `constraint` or something implying it.
    pub fn has(&self, constraint: Constraint) -> bool {
        self.get(constraint.kind()).is_some_and(|c| c.implies(constraint))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = Constraint> + '_ {
        self.slots.iter().filter_map(|c| *c)
    }

    /// Overwrite the slot of the constraint's family, whatever it held.
    pub fn with(&self, constraint: Constraint) -> Self {
        let mut slots = self.slots;
        slots[Self::slot(constraint.kind())] = Some(constraint);
        Self { slots }
    }

    pub fn without(&self, kind: ConstraintKind) -> Self {
        let mut slots = self.slots;
        slots[Self::slot(kind)] = None;
        Self { slots }
    }

    /// Add `constraint` respecting family exclusivity.
    pub fn refine(&self, constraint: Constraint) -> Refinement {
        match self.get(constraint.kind()) {
            None => Refinement::Refined(self.with(constraint)),
            Some(existing) if existing.implies(constraint) => Refinement::Unchanged,
            Some(existing) if constraint.implies(existing) => Refinement::Refined(self.with(constraint)),
            Some(_) => Refinement::Contradiction,
        }
    }
}

impl fmt::Display for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, c) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, "}}")
    }
}
