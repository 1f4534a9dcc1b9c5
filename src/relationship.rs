//! Relationships between symbolic values.
//!
//! A [`Relationship`] is a binary fact over two values: equality, inequality,
//! strict or non-strict ordering. Equality and inequality come in two kinds,
//! value and reference, where reference equality implies value equality.
//!
//! The relationship set of a program state is kept closed under transitive
//! inference by [`close`], and then reduced by [`simplify`], which drops facts
//! implied by a stronger fact on the same pair. Both are pure functions of
//! their input: the closed set is the least fixpoint of the inference rules,
//! so the order in which facts were asserted never changes the result.
//!
//! Inference rules (`x R y` composed with `y S z`):
//!
//! ```text
//! a < b   ∧ b < c    ⇒ a < c
//! a <= b  ∧ b < c    ⇒ a < c
//! a <= b  ∧ b <= c   ⇒ a <= c
//! a == b  ∧ b R c    ⇒ a R c      (R on values; any R through reference equality)
//! a <= b  ∧ b <= a   ⇒ a == b
//! a <= b  ∧ a != b   ⇒ a < b
//! ```

use std::collections::VecDeque;
use std::fmt;

use im::OrdSet;
use log::debug;

use crate::reference::ValueRef;

/// Flavour of (in)equality.
///
/// `Reference` is the stricter one: two references that are the same object
/// are also value-equal, two values that differ are also different objects.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum EqualityKind {
    Value,
    Reference,
}

/// A binary fact between two symbolic values.
///
/// Symmetric facts (`Equals`, `NotEquals`) keep their operands sorted, so
/// `a == b` and `b == a` are the same relationship.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Relationship {
    Equals(EqualityKind, ValueRef, ValueRef),
    NotEquals(EqualityKind, ValueRef, ValueRef),
    Less(ValueRef, ValueRef),
    LessOrEqual(ValueRef, ValueRef),
}

fn sorted(a: ValueRef, b: ValueRef) -> (ValueRef, ValueRef) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// A relationship viewed from its left operand, used for composition.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Link {
    Eq(EqualityKind),
    Ne(EqualityKind),
    Lt,
    Le,
}

impl Link {
    fn compose(self, next: Link) -> Option<Link> {
        use EqualityKind::*;
        use Link::*;
        match (self, next) {
            (Eq(Reference), Eq(Reference)) => Some(Eq(Reference)),
            (Eq(_), Eq(_)) => Some(Eq(Value)),
            (Eq(Reference), other) | (other, Eq(Reference)) => Some(other),
            (Eq(Value), Ne(Value)) | (Ne(Value), Eq(Value)) => Some(Ne(Value)),
            (Eq(Value), Lt) | (Lt, Eq(Value)) => Some(Lt),
            (Eq(Value), Le) | (Le, Eq(Value)) => Some(Le),
            (Lt, Lt) | (Lt, Le) | (Le, Lt) => Some(Lt),
            (Le, Le) => Some(Le),
            _ => None,
        }
    }
}

impl Relationship {
    pub fn equals(a: ValueRef, b: ValueRef) -> Self {
        let (a, b) = sorted(a, b);
        Relationship::Equals(EqualityKind::Value, a, b)
    }

    pub fn reference_equals(a: ValueRef, b: ValueRef) -> Self {
        let (a, b) = sorted(a, b);
        Relationship::Equals(EqualityKind::Reference, a, b)
    }

    pub fn not_equals(a: ValueRef, b: ValueRef) -> Self {
        let (a, b) = sorted(a, b);
        Relationship::NotEquals(EqualityKind::Value, a, b)
    }

    pub fn reference_not_equals(a: ValueRef, b: ValueRef) -> Self {
        let (a, b) = sorted(a, b);
        Relationship::NotEquals(EqualityKind::Reference, a, b)
    }

    pub fn less(a: ValueRef, b: ValueRef) -> Self {
        Relationship::Less(a, b)
    }

    pub fn less_or_equal(a: ValueRef, b: ValueRef) -> Self {
        Relationship::LessOrEqual(a, b)
    }

    fn from_link(link: Link, a: ValueRef, b: ValueRef) -> Self {
        match link {
            Link::Eq(EqualityKind::Value) => Self::equals(a, b),
            Link::Eq(EqualityKind::Reference) => Self::reference_equals(a, b),
            Link::Ne(EqualityKind::Value) => Self::not_equals(a, b),
            Link::Ne(EqualityKind::Reference) => Self::reference_not_equals(a, b),
            Link::Lt => Self::less(a, b),
            Link::Le => Self::less_or_equal(a, b),
        }
    }

    pub fn left(&self) -> ValueRef {
        self.operands().0
    }

    pub fn right(&self) -> ValueRef {
        self.operands().1
    }

    pub fn operands(&self) -> (ValueRef, ValueRef) {
        match *self {
            Relationship::Equals(_, a, b)
            | Relationship::NotEquals(_, a, b)
            | Relationship::Less(a, b)
            | Relationship::LessOrEqual(a, b) => (a, b),
        }
    }

    pub fn involves(&self, value: ValueRef) -> bool {
        let (a, b) = self.operands();
        a == value || b == value
    }

    /// The operand on the other side of `value`, if `value` takes part.
    pub fn other(&self, value: ValueRef) -> Option<ValueRef> {
        let (a, b) = self.operands();
        if a == value {
            Some(b)
        } else if b == value {
            Some(a)
        } else {
            None
        }
    }

    fn same_pair(&self, other: &Relationship) -> bool {
        sorted(self.left(), self.right()) == sorted(other.left(), other.right())
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, Relationship::Equals(..))
    }

    /// Logical negation. `negate(negate(r)) == r` for every relationship.
    pub fn negate(&self) -> Relationship {
        match *self {
            Relationship::Equals(k, a, b) => Relationship::NotEquals(k, a, b),
            Relationship::NotEquals(k, a, b) => Relationship::Equals(k, a, b),
            Relationship::Less(a, b) => Relationship::LessOrEqual(b, a),
            Relationship::LessOrEqual(a, b) => Relationship::Less(b, a),
        }
    }

    /// Trivially true facts over a single operand (`a == a`, `a <= a`).
    pub fn is_tautology(&self) -> bool {
        let (a, b) = self.operands();
        a == b && matches!(self, Relationship::Equals(..) | Relationship::LessOrEqual(..))
    }

    /// Trivially false facts over a single operand (`a != a`, `a < a`).
    pub fn is_absurd(&self) -> bool {
        let (a, b) = self.operands();
        a == b && matches!(self, Relationship::NotEquals(..) | Relationship::Less(..))
    }

    /// Whether `self` and `other` cannot both hold.
    pub fn is_contradicting(&self, other: &Relationship) -> bool {
        use Relationship::*;
        match (*self, *other) {
            (Equals(eq, ..), NotEquals(ne, ..)) | (NotEquals(ne, ..), Equals(eq, ..)) => {
                self.same_pair(other) && (ne == EqualityKind::Value || eq == EqualityKind::Reference)
            }
            (Equals(..), Less(..)) | (Less(..), Equals(..)) => self.same_pair(other),
            (Less(a, b), Less(c, d)) => a == d && b == c,
            (Less(a, b), LessOrEqual(c, d)) | (LessOrEqual(c, d), Less(a, b)) => a == d && b == c,
            _ => false,
        }
    }

    /// Views of the fact from its left operand, both directions for symmetric facts.
    fn links(&self) -> impl Iterator<Item = (Link, ValueRef, ValueRef)> {
        let (link, a, b, symmetric) = match *self {
            Relationship::Equals(k, a, b) => (Link::Eq(k), a, b, true),
            Relationship::NotEquals(k, a, b) => (Link::Ne(k), a, b, true),
            Relationship::Less(a, b) => (Link::Lt, a, b, false),
            Relationship::LessOrEqual(a, b) => (Link::Le, a, b, false),
        };
        let mirrored = symmetric.then_some((link, b, a));
        std::iter::once((link, a, b)).chain(mirrored)
    }

    /// Facts that follow from `self` and `other` together.
    pub fn consequences(&self, other: &Relationship) -> Vec<Relationship> {
        let mut result = Vec::new();

        for (first, second) in [(self, other), (other, self)] {
            for (l1, x, y) in first.links() {
                for (l2, y2, z) in second.links() {
                    if y != y2 || x == z {
                        continue;
                    }
                    if let Some(link) = l1.compose(l2) {
                        result.push(Relationship::from_link(link, x, z));
                    }
                }
            }
        }

        match (*self, *other) {
            (Relationship::LessOrEqual(a, b), Relationship::LessOrEqual(c, d)) if a == d && b == c => {
                result.push(Relationship::equals(a, b));
            }
            (Relationship::LessOrEqual(a, b), Relationship::NotEquals(EqualityKind::Value, ..))
            | (Relationship::NotEquals(EqualityKind::Value, ..), Relationship::LessOrEqual(a, b))
                if self.same_pair(other) =>
            {
                result.push(Relationship::less(a, b));
            }
            _ => {}
        }

        result
    }

    /// Whether a stronger fact on the same pair makes `self` redundant.
    pub fn is_dominated_by(&self, set: &OrdSet<Relationship>) -> bool {
        match *self {
            Relationship::LessOrEqual(a, b) => {
                set.contains(&Relationship::less(a, b))
                    || set.contains(&Relationship::equals(a, b))
                    || set.contains(&Relationship::reference_equals(a, b))
            }
            Relationship::NotEquals(EqualityKind::Value, a, b) => {
                set.contains(&Relationship::less(a, b)) || set.contains(&Relationship::less(b, a))
            }
            Relationship::NotEquals(EqualityKind::Reference, a, b) => {
                set.contains(&Relationship::not_equals(a, b))
                    || set.contains(&Relationship::less(a, b))
                    || set.contains(&Relationship::less(b, a))
            }
            Relationship::Equals(EqualityKind::Value, a, b) => set.contains(&Relationship::reference_equals(a, b)),
            Relationship::Equals(EqualityKind::Reference, ..) | Relationship::Less(..) => false,
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b) = self.operands();
        let op = match self {
            Relationship::Equals(EqualityKind::Value, ..) => "==",
            Relationship::Equals(EqualityKind::Reference, ..) => "===",
            Relationship::NotEquals(EqualityKind::Value, ..) => "!=",
            Relationship::NotEquals(EqualityKind::Reference, ..) => "!==",
            Relationship::Less(..) => "<",
            Relationship::LessOrEqual(..) => "<=",
        };
        write!(f, "{} {} {}", a, op, b)
    }
}

/// Add `fact` to `existing` and close the result under inference.
///
/// Returns `None` if the closure contains two contradicting facts.
/// The returned set is [simplified][simplify].
pub fn close(existing: &OrdSet<Relationship>, fact: Relationship) -> Option<OrdSet<Relationship>> {
    let mut set = existing.clone();
    let mut worklist = VecDeque::from([fact]);

    while let Some(r) = worklist.pop_front() {
        if set.contains(&r) || r.is_tautology() {
            continue;
        }
        if r.is_absurd() {
            debug!("close: {} is absurd", r);
            return None;
        }
        if let Some(c) = set.iter().find(|s| r.is_contradicting(s)) {
            debug!("close: {} contradicts {}", r, c);
            return None;
        }
        for s in set.iter() {
            for c in r.consequences(s) {
                if !set.contains(&c) {
                    worklist.push_back(c);
                }
            }
        }
        set.insert(r);
    }

    Some(simplify(&set))
}

/// Drop every fact implied by a stronger fact on the same pair.
///
/// Collapses `a <= b ∧ b <= a` into `a == b` and `a <= b ∧ a != b` into `a < b`
/// (the stronger facts are produced by [`close`]).
pub fn simplify(set: &OrdSet<Relationship>) -> OrdSet<Relationship> {
    set.iter().filter(|r| !r.is_dominated_by(set)).copied().collect()
}
