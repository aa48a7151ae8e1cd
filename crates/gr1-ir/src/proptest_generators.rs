//! Proptest strategies for small transition systems and GR(1) formulas.

use gr1_dsl::ast::FormulaExpr;
use proptest::prelude::*;

use crate::transition_system::TransitionSystem;

/// Proposition names used by [`arb_transition_system`].
pub const PROPOSITIONS: [&str; 3] = ["p0", "p1", "p2"];

/// Strategy for a transition system without reachable absorbing states.
///
/// Generated systems have:
/// - 1–6 states named `s0..`, with `s0` initial
/// - the propositions `p0`, `p1`, `p2`, each state carrying a random subset
/// - at least one outgoing edge per state
pub fn arb_transition_system() -> impl Strategy<Value = TransitionSystem> {
    (1..=6usize)
        .prop_flat_map(|n| {
            let labels = proptest::collection::vec(0u8..8, n..=n);
            // One mandatory successor per state plus a few extra edges.
            let forced = proptest::collection::vec(0..n, n..=n);
            let extra = proptest::collection::vec((0..n, 0..n), 0..=n * 2);
            (Just(n), labels, forced, extra)
        })
        .prop_map(|(n, labels, forced, extra)| {
            let mut ts = TransitionSystem::new();
            let _ = ts.add_atomic_propositions(PROPOSITIONS);
            for (i, mask) in labels.iter().enumerate() {
                let props = PROPOSITIONS
                    .iter()
                    .enumerate()
                    .filter(|(bit, _)| mask >> bit & 1 == 1)
                    .map(|(_, p)| *p);
                let _ = ts.add_state(format!("s{i}"), props);
            }
            let _ = ts.add_initial("s0");
            let names: Vec<String> = (0..n).map(|i| format!("s{i}")).collect();
            for (from, &to) in forced.iter().enumerate() {
                let _ = ts.add_transitions_comb([names[from].as_str()], [names[to].as_str()]);
            }
            for (from, to) in extra {
                let _ = ts.add_transitions_comb([names[from].as_str()], [names[to].as_str()]);
            }
            ts
        })
}

/// Strategy for a state formula (no `X`) over `names`.
pub fn arb_state_formula(names: Vec<String>) -> impl Strategy<Value = FormulaExpr> {
    let leaf = prop_oneof![
        1 => any::<bool>().prop_map(FormulaExpr::Bool),
        4 => proptest::sample::select(names).prop_map(FormulaExpr::Var),
    ];
    leaf.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(FormulaExpr::not),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| FormulaExpr::and(l, r)),
            (inner.clone(), inner.clone()).prop_map(|(l, r)| FormulaExpr::or(l, r)),
            (inner.clone(), inner).prop_map(|(l, r)| FormulaExpr::Implies(Box::new(l), Box::new(r))),
        ]
    })
}

/// Strategy for a transition formula: a state formula over `current`
/// combined with a state formula over `next` placed under `X`.
pub fn arb_transition_formula(
    current: Vec<String>,
    next: Vec<String>,
) -> impl Strategy<Value = FormulaExpr> {
    (
        arb_state_formula(current),
        arb_state_formula(next),
        any::<bool>(),
    )
        .prop_map(|(now, later, as_implication)| {
            let later = FormulaExpr::next(later);
            if as_implication {
                FormulaExpr::Implies(Box::new(now), Box::new(later))
            } else {
                FormulaExpr::or(now, later)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_systems_are_valid(ts in arb_transition_system()) {
            prop_assert!(ts.num_states() >= 1);
            prop_assert_eq!(ts.initial_states().len(), 1);
            prop_assert!(ts.validate().is_ok());
            for s in 0..ts.num_states() {
                prop_assert!(!ts.successors(s).is_empty());
            }
        }

        #[test]
        fn state_formulas_never_mention_next(
            f in arb_state_formula(vec!["a".into(), "b".into()])
        ) {
            prop_assert!(!f.mentions_next());
        }

        #[test]
        fn transition_formulas_round_trip_through_parser(
            f in arb_transition_formula(vec!["a".into()], vec!["b".into()])
        ) {
            let reparsed = gr1_dsl::parse_formula(&f.to_string()).unwrap();
            prop_assert_eq!(reparsed, f);
        }
    }
}
