use test_log::test;

use symex_rs::constraint::{Constraint, StringConstraint};
use symex_rs::reference::ValueRef;
use symex_rs::relationship::Relationship;
use symex_rs::state::ProgramState;
use symex_rs::types::SymbolId;
use symex_rs::value::ValueArena;

fn s(id: u32) -> SymbolId {
    SymbolId::new(id)
}

/// `values` bound to symbols `s1..`, so that relationships on them are tracked.
fn bound(values: &[ValueRef]) -> ProgramState {
    values
        .iter()
        .enumerate()
        .fold(ProgramState::new(), |state, (i, &v)| state.store_symbol_value(s(i as u32 + 1), v))
}

fn single(states: Vec<ProgramState>) -> ProgramState {
    assert_eq!(states.len(), 1, "expected exactly one state");
    states.into_iter().next().unwrap()
}

#[test]
fn null_propagates_through_equality() {
    let values = ValueArena::new();
    let x_value = values.mk_plain();
    let y = values.mk_plain();
    let state = ProgramState::new()
        .store_symbol_value(s(1), x_value)
        .store_symbol_value(s(2), y);

    let state = single(values.try_set_constraint(&state, x_value, Constraint::NULL));
    let state = single(values.assert_relationship(&state, Relationship::equals(x_value, y)));

    let z_value = state.symbol_value(s(2)).unwrap();
    assert!(state.has_constraint(z_value, Constraint::NULL));
}

#[test]
fn boolean_fork_on_known_value_is_infeasible() {
    let values = ValueArena::new();
    let a = values.mk_plain();
    let state = single(values.try_set_constraint(&bound(&[a]), a, Constraint::TRUE));

    let a_is_false = values.mk_equals(a, ValueRef::FALSE);
    assert!(values.try_set_constraint(&state, a_is_false, Constraint::TRUE).is_empty());

    let state = single(values.try_set_constraint(&state, a_is_false, Constraint::FALSE));
    assert!(state.has_constraint(a, Constraint::TRUE));
}

#[test]
fn or_value_fans_out_into_three_states() {
    let values = ValueArena::new();
    let a = values.mk_plain();
    let b = values.mk_plain();
    let or = values.mk_or(a, b);

    let states = values.try_set_constraint(&bound(&[a, b]), or, Constraint::TRUE);
    let assignments: Vec<(bool, bool)> = states
        .iter()
        .map(|st| (st.has_constraint(a, Constraint::TRUE), st.has_constraint(b, Constraint::TRUE)))
        .collect();
    assert_eq!(assignments, vec![(true, false), (false, true), (true, true)]);

    let states = values.try_set_constraint(&bound(&[a, b]), or, Constraint::FALSE);
    let state = single(states);
    assert!(state.has_constraint(a, Constraint::FALSE));
    assert!(state.has_constraint(b, Constraint::FALSE));
}

#[test]
fn constraint_exclusivity_and_idempotence() {
    let values = ValueArena::new();
    let a = values.mk_plain();
    let state = bound(&[a]);

    let full = Constraint::String(StringConstraint::Full);
    let white = Constraint::String(StringConstraint::WhiteSpace);
    let empty = Constraint::String(StringConstraint::Empty);

    let once = single(values.try_set_constraint(&state, a, full));
    let twice = single(values.try_set_constraint(&once, a, full));
    assert_eq!(once, twice);

    // A refinement of the family replaces the weaker constraint.
    let refined = single(values.try_set_constraint(&once, a, white));
    assert!(refined.has_constraint(a, full));
    assert_eq!(single(values.try_set_constraint(&refined, a, full)), refined);

    assert!(values.try_set_constraint(&once, a, empty).is_empty());
    // Other families are unaffected.
    let both = single(values.try_set_constraint(&once, a, Constraint::NOT_NULL));
    assert!(both.has_constraint(a, full));
    assert!(both.has_constraint(a, Constraint::NOT_NULL));
}

#[test]
fn transitive_closure_in_either_order() {
    let values = ValueArena::new();
    let (a, b, c) = (values.mk_plain(), values.mk_plain(), values.mk_plain());
    let state = bound(&[a, b, c]);

    let facts = [Relationship::less(a, b), Relationship::less_or_equal(b, c)];
    let forward = facts
        .iter()
        .try_fold(state.clone(), |st, &r| st.try_set_relationship(r))
        .unwrap();
    let backward = facts
        .iter()
        .rev()
        .try_fold(state, |st, &r| st.try_set_relationship(r))
        .unwrap();

    assert!(forward.has_relationship(&Relationship::less(a, c)));
    assert_eq!(forward, backward);
}

#[test]
fn contradictions_are_infeasible() {
    let values = ValueArena::new();
    let (a, b) = (values.mk_plain(), values.mk_plain());
    let state = bound(&[a, b]);

    let lt = state.try_set_relationship(Relationship::less(a, b)).unwrap();
    assert!(lt.try_set_relationship(Relationship::less_or_equal(b, a)).is_none());

    let eq = state.try_set_relationship(Relationship::equals(a, b)).unwrap();
    assert!(eq.try_set_relationship(Relationship::not_equals(a, b)).is_none());

    // Through the arena, which also propagates constraints.
    let eq = single(values.assert_relationship(&state, Relationship::equals(a, b)));
    assert!(values.assert_relationship(&eq, Relationship::not_equals(b, a)).is_empty());
}

#[test]
fn redundant_orderings_collapse_into_equality() {
    let values = ValueArena::new();
    let (a, b) = (values.mk_plain(), values.mk_plain());
    let state = bound(&[a, b]);

    let via_orderings = state
        .try_set_relationship(Relationship::less_or_equal(a, b))
        .and_then(|st| st.try_set_relationship(Relationship::less_or_equal(b, a)))
        .unwrap();
    assert!(via_orderings.has_relationship(&Relationship::equals(a, b)));
    assert!(!via_orderings.has_relationship(&Relationship::less_or_equal(a, b)));
    assert!(!via_orderings.has_relationship(&Relationship::less_or_equal(b, a)));

    let direct = state.try_set_relationship(Relationship::equals(a, b)).unwrap();
    assert_eq!(via_orderings, direct);
}

#[test]
fn relationships_on_dead_values_are_not_tracked() {
    let values = ValueArena::new();
    let (a, b) = (values.mk_plain(), values.mk_plain());
    let state = bound(&[a]);

    let same = state.try_set_relationship(Relationship::less(a, b)).unwrap();
    assert_eq!(same, state);
    assert!(same.relationships().is_empty());

    // `this` is always tracked.
    let tracked = state.try_set_relationship(Relationship::less(a, ValueRef::THIS)).unwrap();
    assert!(tracked.has_relationship(&Relationship::less(a, ValueRef::THIS)));
}

#[test]
fn nested_conditions_propagate_to_leaves() {
    // !(x == null) && (y != null)
    let values = ValueArena::new();
    let (x, y) = (values.mk_plain(), values.mk_plain());
    let cond = values.mk_and(
        values.mk_not(values.mk_equals(x, ValueRef::NULL)),
        values.mk_not_equals(y, ValueRef::NULL),
    );

    let state = single(values.try_set_constraint(&bound(&[x, y]), cond, Constraint::TRUE));
    assert!(state.has_constraint(x, Constraint::NOT_NULL));
    assert!(state.has_constraint(y, Constraint::NOT_NULL));

    // The negation fans out into the three ways the conjunction can fail.
    let states = values.try_set_constraint(&bound(&[x, y]), cond, Constraint::FALSE);
    assert_eq!(states.len(), 3);
}
