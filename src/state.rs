//! Program state: an immutable snapshot of everything known at one point of a path.
//!
//! A [`ProgramState`] is made of
//! - symbol bindings: source symbol → symbolic value,
//! - constraints: symbolic value → [`ConstraintSet`],
//! - relationships: a closed set of [`Relationship`] facts,
//! - an expression stack of values not consumed yet,
//! - visit counters per program point.
//!
//! Every operation returns a new state and leaves the receiver untouched. The
//! collections are persistent (`im`), so forking a state is cheap and
//! successors share structure with their predecessor.
//!
//! Two states are equal when their bindings, constraints, relationships and
//! expression stacks are equal. Visit counters are bookkeeping for the
//! explorer and take no part in equality or hashing.

use std::hash::{Hash, Hasher};

use im::{OrdMap, OrdSet, Vector};
use log::debug;

use crate::constraint::{Constraint, ConstraintKind, ConstraintSet, ObjectConstraint};
use crate::reference::ValueRef;
use crate::relationship::{close, Relationship};
use crate::types::{ProgramPoint, SymbolId};
use crate::value::ValueArena;

/// The three states of a nullable wrapper.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NullableState {
    Unknown,
    HasValue,
    IsEmpty,
}

#[derive(Debug, Clone)]
pub struct ProgramState {
    values: OrdMap<SymbolId, ValueRef>,
    constraints: OrdMap<ValueRef, ConstraintSet>,
    relationships: OrdSet<Relationship>,
    expression_stack: Vector<ValueRef>,
    visit_counts: OrdMap<ProgramPoint, usize>,
}

impl ProgramState {
    /// The empty state, with the constraints of the singletons pinned.
    pub fn new() -> Self {
        let pinned = [
            (ValueRef::TRUE, ConstraintSet::new().with(Constraint::TRUE).with(Constraint::NOT_NULL)),
            (ValueRef::FALSE, ConstraintSet::new().with(Constraint::FALSE).with(Constraint::NOT_NULL)),
            (ValueRef::NULL, ConstraintSet::new().with(Constraint::NULL)),
            (ValueRef::THIS, ConstraintSet::new().with(Constraint::NOT_NULL)),
            (ValueRef::BASE, ConstraintSet::new().with(Constraint::NOT_NULL)),
        ];
        Self {
            values: OrdMap::new(),
            constraints: pinned.into_iter().collect(),
            relationships: OrdSet::new(),
            expression_stack: Vector::new(),
            visit_counts: OrdMap::new(),
        }
    }
}

impl Default for ProgramState {
    fn default() -> Self {
        ProgramState::new()
    }
}

impl PartialEq for ProgramState {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
            && self.constraints == other.constraints
            && self.relationships == other.relationships
            && self.expression_stack == other.expression_stack
    }
}

impl Eq for ProgramState {}

impl Hash for ProgramState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state);
        self.constraints.hash(state);
        self.relationships.hash(state);
        self.expression_stack.hash(state);
    }
}

// Symbol bindings
impl ProgramState {
    pub fn symbol_value(&self, symbol: SymbolId) -> Option<ValueRef> {
        self.values.get(&symbol).copied()
    }

    pub fn store_symbol_value(&self, symbol: SymbolId, value: ValueRef) -> Self {
        let mut next = self.clone();
        next.values.insert(symbol, value);
        next
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, ValueRef)> + '_ {
        self.values.iter().map(|(&s, &v)| (s, v))
    }

    /// Whether relationships on this value are tracked: it is bound to a
    /// symbol, or it is `this`/`base`.
    pub fn is_live(&self, value: ValueRef) -> bool {
        value.is_protected() || self.values.values().any(|&v| v == value)
    }
}

// Expression stack
impl ProgramState {
    pub fn push_value(&self, value: ValueRef) -> Self {
        let mut next = self.clone();
        next.expression_stack.push_back(value);
        next
    }

    pub fn push_values(&self, values: impl IntoIterator<Item = ValueRef>) -> Self {
        let mut next = self.clone();
        next.expression_stack.extend(values);
        next
    }

    /// Pop the top value, or `None` if the stack is empty.
    pub fn pop_value(&self) -> Option<(Self, ValueRef)> {
        let mut next = self.clone();
        let value = next.expression_stack.pop_back()?;
        Some((next, value))
    }

    /// Pop `count` values, returned in the order they were pushed.
    pub fn pop_values(&self, count: usize) -> Option<(Self, Vec<ValueRef>)> {
        let len = self.expression_stack.len();
        if count > len {
            return None;
        }
        let mut next = self.clone();
        let popped = next.expression_stack.split_off(len - count);
        Some((next, popped.into_iter().collect()))
    }

    /// The value `depth` entries below the top (0 is the top).
    pub fn peek_value(&self, depth: usize) -> Option<ValueRef> {
        let len = self.expression_stack.len();
        if depth >= len {
            return None;
        }
        self.expression_stack.get(len - 1 - depth).copied()
    }

    pub fn stack_depth(&self) -> usize {
        self.expression_stack.len()
    }

    pub fn stack(&self) -> impl Iterator<Item = ValueRef> + '_ {
        self.expression_stack.iter().copied()
    }
}

// Constraints
impl ProgramState {
    pub fn constraints(&self, value: ValueRef) -> ConstraintSet {
        self.constraints.get(&value).cloned().unwrap_or_default()
    }

    pub fn constraint(&self, value: ValueRef, kind: ConstraintKind) -> Option<Constraint> {
        self.constraints.get(&value).and_then(|set| set.get(kind))
    }

    /// Whether the value carries `constraint` or a constraint implying it.
    pub fn has_constraint(&self, value: ValueRef, constraint: Constraint) -> bool {
        self.constraints.get(&value).is_some_and(|set| set.has(constraint))
    }

    /// Overwrite the constraint of the family, with no consistency check and
    /// no propagation.
    pub fn set_constraint(&self, value: ValueRef, constraint: Constraint) -> Self {
        let set = self.constraints(value).with(constraint);
        self.with_constraint_set(value, set)
    }

    pub fn remove_constraint(&self, value: ValueRef, kind: ConstraintKind) -> Self {
        let set = self.constraints(value).without(kind);
        self.with_constraint_set(value, set)
    }

    pub(crate) fn with_constraint_set(&self, value: ValueRef, set: ConstraintSet) -> Self {
        let mut next = self.clone();
        if set.is_empty() {
            next.constraints.remove(&value);
        } else {
            next.constraints.insert(value, set);
        }
        next
    }

    /// Assert `constraint` on `value` and everything that follows from it.
    ///
    /// Returns every feasible resulting state: none if the constraint
    /// contradicts what is known, several when a composite value fans out.
    /// Panics like [`ValueArena::try_set_constraint`] on a shape that cannot
    /// carry the family.
    pub fn try_set_constraint(&self, values: &ValueArena, value: ValueRef, constraint: Constraint) -> Vec<Self> {
        values.try_set_constraint(self, value, constraint)
    }

    /// State of a nullable wrapper, read from its nullability constraint.
    pub fn nullable_state(&self, value: ValueRef) -> NullableState {
        match self.constraint(value, ConstraintKind::Object) {
            Some(Constraint::Object(ObjectConstraint::Null)) => NullableState::IsEmpty,
            Some(Constraint::Object(ObjectConstraint::NotNull)) => NullableState::HasValue,
            _ => NullableState::Unknown,
        }
    }

    /// Values with at least one constraint.
    pub fn constrained_values(&self) -> impl Iterator<Item = (ValueRef, &ConstraintSet)> + '_ {
        self.constraints.iter().map(|(&v, set)| (v, set))
    }
}

// Relationships
impl ProgramState {
    pub fn relationships(&self) -> &OrdSet<Relationship> {
        &self.relationships
    }

    pub fn has_relationship(&self, relationship: &Relationship) -> bool {
        self.relationships.contains(relationship)
    }

    /// Add a relationship to the store and close it under inference.
    ///
    /// Facts over values that are not live are not tracked and leave the state
    /// unchanged. Returns `None` if the fact is absurd or contradicts the store.
    ///
    /// This only maintains the store; use
    /// [`ValueArena::assert_relationship`] to also propagate constraints
    /// between the related values.
    pub fn try_set_relationship(&self, relationship: Relationship) -> Option<Self> {
        if relationship.is_absurd() {
            return None;
        }
        if self.relationships.contains(&relationship) {
            return Some(self.clone());
        }
        let (a, b) = relationship.operands();
        if !self.is_live(a) || !self.is_live(b) {
            debug!("try_set_relationship: {} is not tracked", relationship);
            return Some(self.clone());
        }
        let relationships = close(&self.relationships, relationship)?;
        let mut next = self.clone();
        next.relationships = relationships;
        Some(next)
    }
}

// Visits
impl ProgramState {
    pub fn add_visit(&self, point: ProgramPoint) -> Self {
        let mut next = self.clone();
        next.visit_counts.insert(point, self.visited_count(point) + 1);
        next
    }

    pub fn visited_count(&self, point: ProgramPoint) -> usize {
        self.visit_counts.get(&point).copied().unwrap_or(0)
    }
}

// Scopes
impl ProgramState {
    /// Drop the bindings of every symbol matching `predicate`, then forget
    /// constraints and relationships of values nothing refers to anymore.
    ///
    /// A value is still referred to when it is bound to a remaining symbol,
    /// sits on the expression stack, is a singleton, or is an operand
    /// (transitively) of such a value.
    pub fn remove_symbols(&self, values: &ValueArena, predicate: impl Fn(SymbolId) -> bool) -> Self {
        let mut next = self.clone();
        next.values = self
            .values
            .iter()
            .filter(|(&symbol, _)| !predicate(symbol))
            .map(|(&symbol, &value)| (symbol, value))
            .collect();

        let roots = next
            .values
            .values()
            .copied()
            .chain(next.expression_stack.iter().copied());
        let reachable: OrdSet<ValueRef> = values.descendants(roots).into_iter().collect();
        let keep = |v: &ValueRef| v.is_singleton() || reachable.contains(v);

        next.constraints = self
            .constraints
            .iter()
            .filter(|(v, _)| keep(*v))
            .map(|(&v, set)| (v, set.clone()))
            .collect();
        next.relationships = next
            .relationships
            .iter()
            .filter(|r| keep(&r.left()) && keep(&r.right()))
            .copied()
            .collect();
        next
    }
}
