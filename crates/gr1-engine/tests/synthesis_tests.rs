mod common;

use common::{grid_2x3, grid_two_layers, mealy, sequential, uav_spec};
use gr1_engine::pipeline::{check_realizability, synthesize, SynthesisError, SynthesisOptions};
use gr1_engine::realizability::{Qinit, UnrealizableReason};
use gr1_engine::result::UnrealizableReport;
use gr1_engine::simulation::{simulate, FirstInput, ScriptedInputs};
use gr1_engine::GameSemantics;
use gr1_ir::specification::{GrSpec, Section, SpecError};
use gr1_ir::transition_system::TransitionSystem;
use gr1_ir::valuation::Valuation;

fn expect_unrealizable(ts: &TransitionSystem, spec: &GrSpec) -> Box<UnrealizableReport> {
    match synthesize(ts, spec, &SynthesisOptions::default()) {
        Err(SynthesisError::Unrealizable(report)) => report,
        Err(other) => panic!("expected an unrealizable verdict, got error: {other}"),
        Ok(s) => panic!(
            "expected an unrealizable verdict, got a controller:\n{}",
            s.controller
        ),
    }
}

/// Longest stretch of steps between two visits of `location`.
fn longest_gap<'a>(locations: impl Iterator<Item = &'a str>, location: &str) -> usize {
    let mut gap = 0;
    let mut longest = 0;
    for loc in locations {
        if loc == location {
            gap = 0;
        } else {
            gap += 1;
            longest = longest.max(gap);
        }
    }
    longest
}

// ---------------------------------------------------------------------------
// UAV patrol on the 2x3 grid
// ---------------------------------------------------------------------------

#[test]
fn uav_patrol_is_realizable() {
    let ts = grid_2x3();
    let options = SynthesisOptions::default();
    assert_eq!(options.semantics, GameSemantics::Moore);
    assert_eq!(options.qinit, Qinit::ExistsForall);
    let result = synthesize(&ts, &uav_spec(), &options).unwrap();
    let c = &result.controller;
    assert_eq!(c.semantics(), GameSemantics::Moore);
    assert!(c.num_states() > 0);
    assert!(!c.initial_states().is_empty());
    assert_eq!(result.report.sys_goals, 2);
    assert_eq!(result.report.env_goals, 1);
    assert_eq!(result.report.ts_states, 6);
    assert!(result.report.winning_nodes <= result.report.game_nodes);
    for &id in c.initial_states() {
        assert_eq!(c.output(id).unwrap().0, "X0");
    }
}

#[test]
fn uav_patrol_never_enters_obstacle_and_keeps_returning_home() {
    let ts = grid_2x3();
    let park = Valuation::from_bits(1);
    let idle = Valuation::EMPTY;
    // Every script releases `park` regularly, so the environment keeps its
    // side of the contract.
    let scripts = [
        vec![idle],
        vec![park, idle],
        vec![park, park, idle],
        vec![park, idle, idle, park, park, park, idle],
    ];
    for options in [SynthesisOptions::default(), mealy()] {
        let result = synthesize(&ts, &uav_spec(), &options).unwrap();
        for script in &scripts {
            let mut policy = ScriptedInputs::new(script.clone());
            let trace = simulate(&result.controller, &ts, &result.spec, &mut policy, 1000);
            assert_eq!(
                trace.steps.len(),
                1001,
                "{} script {script:?}",
                options.semantics
            );
            assert!(trace.is_safe(), "violations {:?}", trace.safety_violations);
            assert!(!trace.deadlocked);
            assert!(trace.locations().all(|loc| loc != "X3"));
            assert!(
                trace.sys_goal_visits.iter().all(|&n| n >= 10),
                "{:?}",
                trace.sys_goal_visits
            );
            assert!(longest_gap(trace.locations(), "X0") <= 100);
        }
    }
}

#[test]
fn every_controller_move_follows_the_transition_system() {
    let ts = grid_2x3();
    let result = synthesize(&ts, &uav_spec(), &SynthesisOptions::default()).unwrap();
    let c = &result.controller;
    for s in c.states() {
        // One transition per value of `park`; no input is left unanswered.
        assert_eq!(s.transitions.len(), 2, "state at {}", s.location);
        let neighbors = ts.neighbors(&s.location).unwrap();
        for t in &s.transitions {
            let target = c.state(t.target).unwrap();
            assert!(
                neighbors.contains(&target.location.as_str()),
                "{} -> {} is not a move",
                s.location,
                target.location
            );
            assert_eq!(target.env, t.input);
        }
    }
}

#[test]
fn first_input_run_alternates_goals() {
    let ts = grid_2x3();
    let result = synthesize(&ts, &uav_spec(), &SynthesisOptions::default()).unwrap();
    let trace = simulate(&result.controller, &ts, &result.spec, &mut FirstInput, 200);
    assert!(trace.is_safe());
    assert!(trace.locations().any(|loc| loc == "X5"));
    assert!(trace.steps.iter().any(|s| s.sys.get(0)));
}

#[test]
fn two_layer_grid_is_realizable_under_moore_semantics() {
    let ts = grid_two_layers();
    let options = SynthesisOptions {
        semantics: GameSemantics::Moore,
        ..SynthesisOptions::default()
    };
    let result = synthesize(&ts, &uav_spec(), &options).unwrap();
    assert_eq!(result.report.ts_states, 12);
    assert_eq!(result.controller.semantics(), GameSemantics::Moore);

    let trace = simulate(&result.controller, &ts, &result.spec, &mut FirstInput, 500);
    assert!(trace.is_safe());
    assert!(trace.locations().all(|loc| loc != "X3" && loc != "X7"));
    assert!(trace.sys_goal_visits.iter().all(|&n| n > 0));
}

// ---------------------------------------------------------------------------
// Unrealizable specifications
// ---------------------------------------------------------------------------

#[test]
fn forbidding_the_start_cell_fails_immediately() {
    let mut spec = uav_spec();
    spec.add(Section::SysSafe, "!home").unwrap();
    let report = expect_unrealizable(&grid_2x3(), &spec);
    assert_eq!(report.reason, UnrealizableReason::SafetyUnsatisfiableAtStart);
    assert!(report.to_string().starts_with("UNREALIZABLE"));
}

#[test]
fn never_returning_home_is_diagnosed_per_goal() {
    let mut spec = uav_spec();
    spec.add(Section::SysSafe, "X !home").unwrap();
    let report = expect_unrealizable(&grid_2x3(), &spec);
    assert_eq!(report.reason, UnrealizableReason::NoWinningInitialNode);
    assert_eq!(report.justice_pairs.len(), 2);
    let failing: Vec<(usize, usize)> = report
        .failing_pairs()
        .map(|p| (p.env_goal, p.sys_goal))
        .collect();
    assert_eq!(failing, vec![(0, 0)]);
    assert_eq!(report.report.controller_states, None);
}

#[test]
fn diagnostics_can_be_disabled() {
    let mut spec = uav_spec();
    spec.add(Section::SysSafe, "X !home").unwrap();
    let options = SynthesisOptions {
        diagnose_unrealizable: false,
        ..SynthesisOptions::default()
    };
    let verdict = check_realizability(&grid_2x3(), &spec, &options).unwrap();
    assert!(!verdict.is_realizable());
    match verdict {
        gr1_engine::Verdict::Unrealizable(report) => assert!(report.justice_pairs.is_empty()),
        other => panic!("expected unrealizable, got {other}"),
    }
}

#[test]
fn contradictory_initial_conditions() {
    let mut spec = uav_spec();
    spec.add(Section::SysInit, "lot").unwrap();
    let report = expect_unrealizable(&grid_2x3(), &spec);
    assert_eq!(report.reason, UnrealizableReason::NoAdmissibleInitialNode);
}

#[test]
fn malformed_specifications_are_rejected_before_solving() {
    let ts = grid_2x3();

    let mut spec = uav_spec();
    spec.add(Section::SysProg, "X home").unwrap();
    let err = synthesize(&ts, &spec, &SynthesisOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        SynthesisError::MalformedSpec(SpecError::NextNotAllowed {
            section: Section::SysProg,
            ..
        })
    ));

    let mut spec = uav_spec();
    spec.add(Section::EnvSafe, "X UAV1").unwrap();
    let err = synthesize(&ts, &spec, &SynthesisOptions::default()).unwrap_err();
    assert!(matches!(err, SynthesisError::MalformedSpec(SpecError::NextNotAllowed { .. })));

    let spec = GrSpec::new(["park"], ["home"]).unwrap();
    let err = synthesize(&ts, &spec, &SynthesisOptions::default()).unwrap_err();
    assert!(matches!(err, SynthesisError::MalformedSpec(SpecError::NameClash { .. })));
}

// ---------------------------------------------------------------------------
// Boundaries
// ---------------------------------------------------------------------------

fn single_loop() -> TransitionSystem {
    let mut ts = TransitionSystem::new();
    ts.add_atomic_propositions(["here"]).unwrap();
    ts.add_state("only", ["here"]).unwrap();
    ts.add_initial("only").unwrap();
    ts.add_transitions_comb(["only"], ["only"]).unwrap();
    ts
}

#[test]
fn single_state_self_loop_yields_one_state_controller() {
    let ts = single_loop();
    let spec = GrSpec::new(Vec::<String>::new(), Vec::<String>::new()).unwrap();
    let result = synthesize(&ts, &spec, &sequential()).unwrap();
    let c = &result.controller;
    assert_eq!(c.num_states(), 1);
    assert_eq!(c.num_transitions(), 1);
    assert_eq!(c.step(0, Valuation::EMPTY), Some(0));
    assert_eq!(result.report.game_nodes, 1);
}

#[test]
fn empty_universe_is_malformed() {
    let mut ts = TransitionSystem::new();
    ts.add_states_from(["only"]);
    ts.add_initial("only").unwrap();
    ts.add_transitions_comb(["only"], ["only"]).unwrap();
    let spec = GrSpec::new(Vec::<String>::new(), Vec::<String>::new()).unwrap();
    let err = synthesize(&ts, &spec, &sequential()).unwrap_err();
    assert!(matches!(err, SynthesisError::MalformedSpec(SpecError::EmptyUniverse)));
}

#[test]
fn empty_system_justice_reduces_to_safety() {
    let ts = grid_2x3();
    let mut safety_only = GrSpec::new(["park"], ["UAV1"]).unwrap();
    safety_only.add(Section::SysInit, "home").unwrap();
    safety_only.add(Section::SysSafe, "!obs").unwrap();
    let mut trivially_live = safety_only.clone();
    trivially_live.add(Section::SysProg, "true").unwrap();

    let a = synthesize(&ts, &safety_only, &sequential()).unwrap();
    let b = synthesize(&ts, &trivially_live, &sequential()).unwrap();
    assert_eq!(a.report.sys_goals, 1);
    assert_eq!(
        a.controller.fingerprint().unwrap(),
        b.controller.fingerprint().unwrap()
    );
    let trace = simulate(&a.controller, &ts, &a.spec, &mut FirstInput, 100);
    assert!(trace.is_safe());
    assert!(trace.locations().all(|loc| loc != "X3"));
}

#[test]
fn unsatisfiable_environment_safety_lets_the_system_win() {
    let ts = grid_2x3();
    let mut spec = uav_spec();
    spec.add(Section::EnvSafe, "false").unwrap();
    let result = synthesize(&ts, &spec, &sequential()).unwrap();
    for s in result.controller.states() {
        assert!(s.transitions.is_empty());
    }
    let trace = simulate(&result.controller, &ts, &result.spec, &mut FirstInput, 10);
    assert!(trace.deadlocked);
    assert_eq!(trace.steps.len(), 1);
}
