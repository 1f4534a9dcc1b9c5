use proptest::prelude::*;

use symex_rs::constraint::{
    BoolConstraint, Constraint, ConstraintSet, DisposableConstraint, ObjectConstraint, Refinement, StringConstraint,
};
use symex_rs::reference::ValueRef;
use symex_rs::relationship::Relationship;
use symex_rs::state::ProgramState;
use symex_rs::types::SymbolId;
use symex_rs::value::ValueArena;

const VALUES: usize = 4;

fn relationship(kind: u8, a: ValueRef, b: ValueRef) -> Relationship {
    match kind % 6 {
        0 => Relationship::equals(a, b),
        1 => Relationship::reference_equals(a, b),
        2 => Relationship::not_equals(a, b),
        3 => Relationship::reference_not_equals(a, b),
        4 => Relationship::less(a, b),
        _ => Relationship::less_or_equal(a, b),
    }
}

fn constraint(index: u8) -> Constraint {
    const ALL: [Constraint; 10] = [
        Constraint::Bool(BoolConstraint::True),
        Constraint::Bool(BoolConstraint::False),
        Constraint::Object(ObjectConstraint::Null),
        Constraint::Object(ObjectConstraint::NotNull),
        Constraint::Disposable(DisposableConstraint::Disposed),
        Constraint::Disposable(DisposableConstraint::NotDisposed),
        Constraint::String(StringConstraint::Empty),
        Constraint::String(StringConstraint::Full),
        Constraint::String(StringConstraint::WhiteSpace),
        Constraint::String(StringConstraint::FullNotWhiteSpace),
    ];
    ALL[index as usize % ALL.len()]
}

/// One assertion through the arena, over values addressed by index.
#[derive(Debug, Copy, Clone)]
enum Assertion {
    Relate(u8, usize, usize),
    Constrain(usize, u8),
}

fn assertion() -> impl Strategy<Value = Assertion> {
    prop_oneof![
        (0u8..6, 0..VALUES, 0..VALUES).prop_map(|(kind, a, b)| Assertion::Relate(kind, a, b)),
        (0..VALUES, 0u8..10).prop_map(|(v, c)| Assertion::Constrain(v, c)),
    ]
}

/// Apply `assertions` to every candidate state in turn, keeping distinct results.
fn assert_all<'a>(
    arena: &ValueArena,
    values: &[ValueRef],
    state: &ProgramState,
    assertions: impl Iterator<Item = &'a Assertion>,
) -> Vec<ProgramState> {
    assertions.fold(vec![state.clone()], |states, &assertion| {
        let mut next: Vec<ProgramState> = Vec::new();
        for st in &states {
            let produced = match assertion {
                Assertion::Relate(kind, a, b) => arena.assert_relationship(st, relationship(kind, values[a], values[b])),
                Assertion::Constrain(v, c) => arena.try_set_constraint(st, values[v], constraint(c)),
            };
            for s in produced {
                if !next.contains(&s) {
                    next.push(s);
                }
            }
        }
        next
    })
}

fn same_states(left: &[ProgramState], right: &[ProgramState]) -> bool {
    left.len() == right.len() && left.iter().all(|s| right.contains(s))
}

/// Fresh plain values, each bound to a symbol.
fn bound_values(arena: &ValueArena) -> (Vec<ValueRef>, ProgramState) {
    let values: Vec<ValueRef> = (0..VALUES).map(|_| arena.mk_plain()).collect();
    let state = values
        .iter()
        .enumerate()
        .fold(ProgramState::new(), |st, (i, &v)| st.store_symbol_value(SymbolId::new(i as u32), v));
    (values, state)
}

fn apply_all(state: &ProgramState, facts: impl Iterator<Item = Relationship>) -> Option<ProgramState> {
    facts.fold(Some(state.clone()), |st, r| st?.try_set_relationship(r))
}

fn refine_all(constraints: impl Iterator<Item = Constraint>) -> Option<ConstraintSet> {
    constraints.fold(Some(ConstraintSet::new()), |set, c| {
        let set = set?;
        match set.refine(c) {
            Refinement::Unchanged => Some(set),
            Refinement::Refined(next) => Some(next),
            Refinement::Contradiction => None,
        }
    })
}

proptest! {
    #[test]
    fn relationship_order_does_not_matter(
        facts in prop::collection::vec((0u8..6, 0..VALUES, 0..VALUES), 1..6)
    ) {
        let arena = ValueArena::new();
        let (values, state) = bound_values(&arena);

        let facts: Vec<Relationship> = facts
            .into_iter()
            .map(|(kind, a, b)| relationship(kind, values[a], values[b]))
            .collect();

        let forward = apply_all(&state, facts.iter().copied());
        let backward = apply_all(&state, facts.iter().rev().copied());
        prop_assert_eq!(forward, backward, "facts: {:?}", facts);
    }

    #[test]
    fn propagation_order_does_not_matter(assertions in prop::collection::vec(assertion(), 1..8)) {
        let arena = ValueArena::new();
        let (values, state) = bound_values(&arena);

        let forward = assert_all(&arena, &values, &state, assertions.iter());
        let backward = assert_all(&arena, &values, &state, assertions.iter().rev());
        prop_assert!(
            same_states(&forward, &backward),
            "assertions: {:?}\nforward: {:?}\nbackward: {:?}",
            assertions,
            forward,
            backward
        );
    }

    #[test]
    fn contradicting_third_fact_is_infeasible_in_any_order(
        order in Just(vec![0usize, 1, 2, 3]).prop_shuffle()
    ) {
        let arena = ValueArena::new();
        let (values, state) = bound_values(&arena);
        let (a, b, c) = (0, 1, 2);
        // a < b, b < c, c <= a, and a is null.
        let assertions = [
            Assertion::Relate(4, a, b),
            Assertion::Relate(4, b, c),
            Assertion::Relate(5, c, a),
            Assertion::Constrain(a, 2),
        ];
        let ordered: Vec<Assertion> = order.iter().map(|&i| assertions[i]).collect();
        prop_assert!(assert_all(&arena, &values, &state, ordered.iter()).is_empty());

        // Without the third fact the rest is feasible, and `b`, `c` are not null.
        let rest: Vec<Assertion> = ordered.into_iter().filter(|x| !matches!(x, Assertion::Relate(5, ..))).collect();
        let states = assert_all(&arena, &values, &state, rest.iter());
        prop_assert_eq!(states.len(), 1);
        prop_assert!(states[0].has_constraint(values[b], Constraint::NOT_NULL));
        prop_assert!(states[0].has_constraint(values[c], Constraint::NOT_NULL));
    }

    #[test]
    fn constraint_order_does_not_matter(constraints in prop::collection::vec(0u8..10, 0..6)) {
        let constraints: Vec<Constraint> = constraints.into_iter().map(constraint).collect();
        let forward = refine_all(constraints.iter().copied());
        let backward = refine_all(constraints.iter().rev().copied());
        prop_assert_eq!(forward, backward, "constraints: {:?}", constraints);
    }
}
