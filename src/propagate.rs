//! Constraint propagation.
//!
//! Setting a constraint on a value may add relationships (asserting `a == b`
//! to be true), and adding relationships may set constraints (`a == b` where
//! `a` is null makes `b` null). Both directions run in one explicit worklist
//! per candidate state, so there is no recursion and the termination
//! argument is local: a constraint item only produces more work when it
//! strictly refines a constraint set, and relationship items are only
//! produced by such refinements.
//!
//! Composite values distribute constraints to their operands by the truth
//! table of their operator. When several operand assignments are possible
//! (`a || b` is true) the candidate state forks, one branch per assignment.

use std::collections::VecDeque;

use log::debug;

use crate::constraint::{BoolConstraint, Constraint, ConstraintKind, ObjectConstraint, Refinement};
use crate::error::UnsupportedConstraint;
use crate::reference::ValueRef;
use crate::relationship::{EqualityKind, Relationship};
use crate::state::ProgramState;
use crate::value::{BinaryBoolOp, ComparisonKind, ValueArena, ValueKind};

/// A pending propagation step.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Pending {
    Constraint(ValueRef, Constraint),
    Relationship(Relationship),
}

/// Candidate successors of one step: a state plus the work it adds.
type Step = Vec<(ProgramState, Vec<Pending>)>;

/// Families carried across an equality of the given kind.
///
/// Equal values share truth, nullability and string content; identity-bound
/// facts (disposal, crypto material, collection content) need the same object.
fn copies_across(kind: EqualityKind, family: ConstraintKind) -> bool {
    match kind {
        EqualityKind::Reference => true,
        EqualityKind::Value => matches!(family, ConstraintKind::Bool | ConstraintKind::Object | ConstraintKind::String),
    }
}

/// The constraint `b` must carry when `a != b` and `a` carries `constraint`.
///
/// Only two-valued families where one side pins the other: there is one null,
/// and a boolean value different from `true` is `false`.
fn complement_across_inequality(kind: EqualityKind, constraint: Constraint) -> Option<Constraint> {
    match (kind, constraint) {
        (_, Constraint::Object(ObjectConstraint::Null)) => Some(Constraint::NOT_NULL),
        (EqualityKind::Value, Constraint::Bool(_)) => constraint.opposite(),
        _ => None,
    }
}

/// Operand assignments under which `a op b` evaluates to `result`.
fn truth_table(op: BinaryBoolOp, result: BoolConstraint) -> Vec<(BoolConstraint, BoolConstraint)> {
    use BoolConstraint::{False as F, True as T};
    match (op, result) {
        (BinaryBoolOp::And, T) => vec![(T, T)],
        (BinaryBoolOp::And, F) => vec![(F, F), (F, T), (T, F)],
        (BinaryBoolOp::Or, T) => vec![(T, F), (F, T), (T, T)],
        (BinaryBoolOp::Or, F) => vec![(F, F)],
        (BinaryBoolOp::Xor, T) => vec![(T, F), (F, T)],
        (BinaryBoolOp::Xor, F) => vec![(T, T), (F, F)],
    }
}

/// The constraint `fact` carries from one of its operands, holding `constraint`,
/// to the other one.
///
/// `a < b` carries what the value inequality `a != b` carries: the store
/// keeps only the ordering once both are known.
fn carried_across(fact: Relationship, constraint: Constraint) -> Option<Constraint> {
    match fact {
        Relationship::Equals(eq, ..) => copies_across(eq, constraint.kind()).then_some(constraint),
        Relationship::NotEquals(ne, ..) => complement_across_inequality(ne, constraint),
        Relationship::Less(..) => complement_across_inequality(EqualityKind::Value, constraint),
        Relationship::LessOrEqual(..) => None,
    }
}

fn equality(kind: EqualityKind, a: ValueRef, b: ValueRef) -> Relationship {
    match kind {
        EqualityKind::Value => Relationship::equals(a, b),
        EqualityKind::Reference => Relationship::reference_equals(a, b),
    }
}

impl ValueArena {
    /// Assert `constraint` on `value` in `state`, with full propagation.
    ///
    /// Returns the feasible resulting states: empty when the constraint is
    /// infeasible, more than one when a composite value fans out.
    ///
    /// # Panics
    ///
    /// Panics if values of this shape cannot carry constraints of this family
    /// (e.g. a disposal constraint on a comparison). Ask
    /// [`can_carry`][ValueArena::can_carry] first, or use
    /// [`checked_set_constraint`][ValueArena::checked_set_constraint].
    pub fn try_set_constraint(&self, state: &ProgramState, value: ValueRef, constraint: Constraint) -> Vec<ProgramState> {
        assert!(
            self.can_carry(value, constraint.kind()),
            "{:?} cannot carry {}",
            self.kind(value),
            constraint
        );
        debug!("try_set_constraint({} := {})", value, constraint);
        self.settle(state, vec![Pending::Constraint(value, constraint)])
    }

    /// Like [`try_set_constraint`][ValueArena::try_set_constraint], with a
    /// shape/family mismatch reported as an error.
    pub fn checked_set_constraint(
        &self,
        state: &ProgramState,
        value: ValueRef,
        constraint: Constraint,
    ) -> Result<Vec<ProgramState>, UnsupportedConstraint> {
        if !self.can_carry(value, constraint.kind()) {
            return Err(UnsupportedConstraint { value, constraint });
        }
        Ok(self.try_set_constraint(state, value, constraint))
    }

    /// Assert a relationship between two values, with full propagation.
    ///
    /// The relationship itself is recorded only when both operands are live,
    /// but constraints flow between the operands regardless.
    pub fn assert_relationship(&self, state: &ProgramState, relationship: Relationship) -> Vec<ProgramState> {
        debug!("assert_relationship({})", relationship);
        self.settle(state, vec![Pending::Relationship(relationship)])
    }

    /// Run the worklist of every candidate state to completion.
    fn settle(&self, state: &ProgramState, seed: Vec<Pending>) -> Vec<ProgramState> {
        let mut candidates: Vec<(ProgramState, VecDeque<Pending>)> = vec![(state.clone(), seed.into())];
        let mut settled: Vec<ProgramState> = Vec::new();

        while let Some((state, mut pending)) = candidates.pop() {
            let Some(item) = pending.pop_front() else {
                if !settled.contains(&state) {
                    settled.push(state);
                }
                continue;
            };
            let successors = match item {
                Pending::Constraint(value, constraint) => self.step_constraint(&state, value, constraint),
                Pending::Relationship(relationship) => self.step_relationship(&state, relationship),
            };
            // Reversed so that candidates settle in the order they were produced.
            for (next, work) in successors.into_iter().rev() {
                let mut queue = pending.clone();
                queue.extend(work);
                candidates.push((next, queue));
            }
        }

        debug!("settle: {} resulting state(s)", settled.len());
        settled
    }

    fn step_constraint(&self, state: &ProgramState, value: ValueRef, constraint: Constraint) -> Step {
        if !self.can_carry(value, constraint.kind()) {
            // Propagation reaches values of every shape; families a shape
            // cannot carry say nothing about it.
            return vec![(state.clone(), vec![])];
        }

        let kind = self.kind(value);
        if let ValueKind::Nullable(inner) = kind {
            return self.step_nullable(state, value, inner, constraint);
        }

        let next = match self.refine(state, value, constraint) {
            None => return vec![],
            Some(None) => return vec![(state.clone(), vec![])],
            Some(Some(next)) => next,
        };

        let mut work = self.related_work(&next, value, constraint);
        match (kind, constraint) {
            (ValueKind::Not(operand), _) => {
                if let Some(c) = constraint.opposite_for_logical_not() {
                    work.push(Pending::Constraint(operand, c));
                }
            }
            (ValueKind::Equals(eq, a, b), Constraint::Bool(truth)) => {
                let r = equality(eq, a, b);
                work.push(Pending::Relationship(if truth.as_bool() { r } else { r.negate() }));
            }
            (ValueKind::NotEquals(eq, a, b), Constraint::Bool(truth)) => {
                let r = equality(eq, a, b);
                work.push(Pending::Relationship(if truth.as_bool() { r.negate() } else { r }));
            }
            (ValueKind::Comparison(cmp, a, b), Constraint::Bool(truth)) => {
                let r = match cmp {
                    ComparisonKind::Less => Relationship::less(a, b),
                    ComparisonKind::LessOrEqual => Relationship::less_or_equal(a, b),
                };
                work.push(Pending::Relationship(if truth.as_bool() { r } else { r.negate() }));
            }
            (ValueKind::Binary(op, a, b), Constraint::Bool(truth)) => {
                return truth_table(op, truth)
                    .into_iter()
                    .map(|(ta, tb)| {
                        let mut work = work.clone();
                        work.push(Pending::Constraint(a, Constraint::Bool(ta)));
                        work.push(Pending::Constraint(b, Constraint::Bool(tb)));
                        (next.clone(), work)
                    })
                    .collect();
            }
            _ => {}
        }
        vec![(next, work)]
    }

    /// `Unknown → {HasValue, IsEmpty}`: nullability moves the wrapper itself,
    /// anything else first requires a value and then goes to the payload.
    fn step_nullable(&self, state: &ProgramState, wrapper: ValueRef, inner: ValueRef, constraint: Constraint) -> Step {
        let presence = match constraint {
            Constraint::Object(_) => constraint,
            _ => Constraint::NOT_NULL,
        };
        let (next, mut work) = match self.refine(state, wrapper, presence) {
            None => {
                debug!("nullable {}: {} rejected in {:?}", wrapper, constraint, state.nullable_state(wrapper));
                return vec![];
            }
            Some(None) => (state.clone(), Vec::new()),
            Some(Some(next)) => {
                let work = self.related_work(&next, wrapper, presence);
                (next, work)
            }
        };

        if constraint != presence {
            work.push(Pending::Constraint(inner, constraint));
        }
        vec![(next, work)]
    }

    /// Add `constraint` to the value's set.
    ///
    /// `None` on contradiction, `Some(None)` when already implied.
    fn refine(&self, state: &ProgramState, value: ValueRef, constraint: Constraint) -> Option<Option<ProgramState>> {
        match state.constraints(value).refine(constraint) {
            Refinement::Contradiction => {
                debug!("refine: {} contradicts {} on {}", constraint, state.constraints(value), value);
                None
            }
            Refinement::Unchanged => Some(None),
            Refinement::Refined(set) => Some(Some(state.with_constraint_set(value, set))),
        }
    }

    /// Constraints implied on values related to `value` once it carries `constraint`.
    fn related_work(&self, state: &ProgramState, value: ValueRef, constraint: Constraint) -> Vec<Pending> {
        let mut work = Vec::new();
        for r in state.relationships().iter().filter(|r| r.involves(value)) {
            let Some(other) = r.other(value) else { continue };
            if let Some(c) = carried_across(*r, constraint) {
                work.push(Pending::Constraint(other, c));
            }
        }
        work
    }

    /// Record the relationship and exchange constraints across every fact it
    /// brought into the store, and across the relationship itself.
    fn step_relationship(&self, state: &ProgramState, relationship: Relationship) -> Step {
        let Some(next) = state.try_set_relationship(relationship) else {
            return vec![];
        };

        let mut facts: Vec<Relationship> = next
            .relationships()
            .iter()
            .filter(|r| !state.has_relationship(r))
            .copied()
            .collect();
        if !facts.contains(&relationship) && !relationship.is_tautology() {
            facts.push(relationship);
        }

        let mut work = Vec::new();
        for fact in facts {
            let (a, b) = fact.operands();
            for (from, to) in [(a, b), (b, a)] {
                for c in next.constraints(from).iter() {
                    if let Some(c) = carried_across(fact, c) {
                        work.push(Pending::Constraint(to, c));
                    }
                }
            }
        }
        vec![(next, work)]
    }
}
