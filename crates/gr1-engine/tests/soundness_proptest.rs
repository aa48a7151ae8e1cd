//! Randomized checks: every extracted controller respects the transition
//! system and system safety, keeps visiting every system goal while the
//! environment keeps its promises, and the solver is deterministic.

use gr1_dsl::ast::FormulaExpr;
use gr1_engine::pipeline::{synthesize, SynthesisError, SynthesisOptions};
use gr1_engine::simulation::{simulate, EnvironmentPolicy, ScriptedInputs};
use gr1_engine::{check_realizability, GameSemantics};
use gr1_ir::proptest_generators::{
    arb_state_formula, arb_transition_formula, arb_transition_system, PROPOSITIONS,
};
use gr1_ir::specification::{GrSpec, Player, Section};
use gr1_ir::transition_system::TransitionSystem;
use gr1_ir::valuation::{Snapshot, Valuation};
use proptest::prelude::*;

fn names(extra: &[&str]) -> Vec<String> {
    PROPOSITIONS
        .iter()
        .chain(extra)
        .map(|s| s.to_string())
        .collect()
}

/// A spec over the generated propositions, one environment input `e` and
/// one system output `s`.
fn arb_spec() -> impl Strategy<Value = GrSpec> {
    (
        arb_transition_formula(names(&["e", "s"]), names(&["s"])),
        proptest::collection::vec(arb_state_formula(names(&["e", "s"])), 0..=2),
        proptest::option::of(arb_state_formula(names(&["e"]))),
    )
        .prop_map(|(safety, goals, assumption)| {
            let mut spec = GrSpec::new(["e"], ["s"]).unwrap();
            spec.add_formula(Section::SysSafe, safety);
            for g in goals {
                spec.add_formula(Section::SysProg, g);
            }
            if let Some(a) = assumption {
                spec.add_formula(Section::EnvProg, a);
            }
            spec
        })
}

/// Goals over the generated propositions, `e` and `s`, under the assumption
/// that `e` holds infinitely often.
fn arb_live_spec() -> impl Strategy<Value = GrSpec> {
    (
        arb_transition_formula(names(&["e", "s"]), names(&["s"])),
        proptest::collection::vec(arb_state_formula(names(&["e", "s"])), 1..=3),
    )
        .prop_map(|(safety, goals)| {
            let mut spec = GrSpec::new(["e"], ["s"]).unwrap();
            spec.add_formula(Section::SysSafe, safety);
            for g in goals {
                spec.add_formula(Section::SysProg, g);
            }
            spec.add(Section::EnvProg, "e").unwrap();
            spec
        })
}

/// Pseudo-random environment that sets `e` at least every fourth step.
struct FairEnvironment {
    state: u64,
    since_e: usize,
}

impl FairEnvironment {
    fn new(seed: u64) -> Self {
        Self {
            state: seed | 1,
            since_e: 0,
        }
    }

    fn next_bit(&mut self) -> bool {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state & 1 == 1
    }
}

impl EnvironmentPolicy for FairEnvironment {
    fn choose(&mut self, _step: usize, inputs: &[Valuation]) -> Option<usize> {
        let want_e = self.since_e >= 3 || self.next_bit();
        self.since_e = if want_e { 0 } else { self.since_e + 1 };
        Some(inputs.iter().position(|v| v.get(0) == want_e).unwrap_or(0))
    }
}

fn options(semantics: GameSemantics, parallel: bool) -> SynthesisOptions {
    SynthesisOptions {
        semantics,
        parallel,
        ..SynthesisOptions::default()
    }
}

fn is_edge(ts: &TransitionSystem, from: &str, to: &str) -> bool {
    ts.neighbors(from).map(|n| n.contains(&to)).unwrap_or(false)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn controllers_only_take_safe_moves(
        ts in arb_transition_system(),
        spec in arb_spec(),
        moore in any::<bool>(),
    ) {
        let semantics = if moore { GameSemantics::Moore } else { GameSemantics::Mealy };
        let result = match synthesize(&ts, &spec, &options(semantics, false)) {
            Ok(result) => result,
            Err(SynthesisError::Unrealizable(_)) => return Ok(()),
            Err(other) => return Err(TestCaseError::fail(format!("unexpected error: {other}"))),
        };
        let c = &result.controller;
        for s in c.states() {
            // No environment safety: both values of `e` must be answered.
            prop_assert_eq!(s.transitions.len(), 2);
            let current = Snapshot::new(s.env, s.sys, ts.label_valuation(s.ts_state));
            for t in &s.transitions {
                let target = c.state(t.target).unwrap();
                prop_assert!(is_edge(&ts, &s.location, &target.location));
                let next = Snapshot::new(target.env, target.sys, ts.label_valuation(target.ts_state));
                prop_assert!(result.spec.evaluate_safety(Player::Sys, &current, &next));
            }
            if semantics == GameSemantics::Moore {
                let outputs: Vec<_> = s
                    .transitions
                    .iter()
                    .map(|t| c.output(t.target).unwrap())
                    .collect();
                prop_assert!(outputs.windows(2).all(|w| w[0] == w[1]));
            }
        }

        let script = vec![Valuation::from_bits(1), Valuation::EMPTY, Valuation::EMPTY];
        let trace = simulate(c, &ts, &result.spec, &mut ScriptedInputs::new(script), 60);
        prop_assert!(trace.is_safe());
        prop_assert!(!trace.deadlocked);
    }

    #[test]
    fn every_system_goal_keeps_recurring(
        ts in arb_transition_system(),
        spec in arb_live_spec(),
        seed in any::<u64>(),
        moore in any::<bool>(),
    ) {
        let semantics = if moore { GameSemantics::Moore } else { GameSemantics::Mealy };
        let result = match synthesize(&ts, &spec, &options(semantics, false)) {
            Ok(result) => result,
            Err(SynthesisError::Unrealizable(_)) => return Ok(()),
            Err(other) => return Err(TestCaseError::fail(format!("unexpected error: {other}"))),
        };
        let c = &result.controller;
        let horizon = 1000;
        let trace = simulate(c, &ts, &result.spec, &mut FairEnvironment::new(seed), horizon);
        prop_assert!(trace.is_safe());
        prop_assert_eq!(trace.steps.len(), horizon + 1);

        let tail: Vec<Snapshot> = trace.steps[horizon / 2..]
            .iter()
            .map(|step| {
                let ts_state = c.state(step.state).unwrap().ts_state;
                Snapshot::new(step.env, step.sys, ts.label_valuation(ts_state))
            })
            .collect();
        prop_assert!(tail.iter().filter(|snap| snap.env.get(0)).count() >= tail.len() / 4);
        for goal in 0..result.spec.goal_count(Player::Sys) {
            prop_assert!(
                tail.iter().any(|snap| result.spec.evaluate_justice(Player::Sys, goal, snap)),
                "system goal {} missing from the second half of the run under {}",
                goal,
                semantics
            );
        }
    }

    #[test]
    fn parallel_and_sequential_solving_agree(
        ts in arb_transition_system(),
        spec in arb_spec(),
    ) {
        let a = synthesize(&ts, &spec, &options(GameSemantics::Mealy, false));
        let b = synthesize(&ts, &spec, &options(GameSemantics::Mealy, true));
        match (a, b) {
            (Ok(a), Ok(b)) => prop_assert_eq!(
                a.controller.fingerprint().unwrap(),
                b.controller.fingerprint().unwrap()
            ),
            (Err(SynthesisError::Unrealizable(a)), Err(SynthesisError::Unrealizable(b))) => {
                prop_assert_eq!(a.reason, b.reason);
                prop_assert_eq!(a.justice_pairs, b.justice_pairs);
            }
            (a, b) => prop_assert!(false, "runs disagree: {:?} vs {:?}", a.err(), b.err()),
        }
    }

    #[test]
    fn moore_wins_no_more_than_mealy(
        ts in arb_transition_system(),
        spec in arb_spec(),
    ) {
        let mealy = check_realizability(&ts, &spec, &options(GameSemantics::Mealy, false)).unwrap();
        let moore = check_realizability(&ts, &spec, &options(GameSemantics::Moore, false)).unwrap();
        prop_assert!(moore.report().winning_nodes <= mealy.report().winning_nodes);
        prop_assert!(!moore.is_realizable() || mealy.is_realizable());
    }

    #[test]
    fn trivial_goal_matches_empty_goal_list(
        ts in arb_transition_system(),
        safety in arb_transition_formula(names(&["s"]), names(&["s"])),
    ) {
        let mut bare = GrSpec::new(Vec::<String>::new(), ["s"]).unwrap();
        bare.add_formula(Section::SysSafe, safety);
        let mut trivial = bare.clone();
        trivial.add_formula(Section::SysProg, FormulaExpr::Bool(true));
        let a = check_realizability(&ts, &bare, &options(GameSemantics::Mealy, false)).unwrap();
        let b = check_realizability(&ts, &trivial, &options(GameSemantics::Mealy, false)).unwrap();
        prop_assert_eq!(a.is_realizable(), b.is_realizable());
        prop_assert_eq!(a.report().winning_nodes, b.report().winning_nodes);
    }
}
