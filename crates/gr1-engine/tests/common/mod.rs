#![allow(dead_code)]

use gr1_engine::pipeline::SynthesisOptions;
use gr1_engine::GameSemantics;
use gr1_ir::specification::{GrSpec, Section};
use gr1_ir::transition_system::TransitionSystem;

/// Safety guarantee of the UAV patrol: `UAV1` mirrors `lot` on the next step
/// unless the vehicle is already busy and not parked, and `obs` is never
/// occupied.
pub const UAV_SAFETY: &str = "((X (UAV1) <-> lot) || ((UAV1 && !park) )) && (!obs)";

/// ```text
///     +----+----+----+
///     | X3 | X4 | X5 |
///     +----+----+----+
///     | X0 | X1 | X2 |
///     +----+----+----+
/// ```
///
/// `X0` is `home` and initial, `X5` is `lot`, `X3` is `obs`.
pub fn grid_2x3() -> TransitionSystem {
    let mut ts = TransitionSystem::new();
    ts.add_atomic_propositions(["home", "lot", "obs"]).unwrap();
    ts.add_states_from(["X0", "X1", "X2", "X3", "X4", "X5"]);
    ts.add_initial("X0").unwrap();
    add_layer(&mut ts, 0);
    ts.add_state("X0", ["home"]).unwrap();
    ts.add_state("X5", ["lot"]).unwrap();
    ts.add_state("X3", ["obs"]).unwrap();
    ts
}

/// Two stacked 2x3 layers. The upper layer `X6..X11` mirrors the lower one
/// and each cell is connected to the cell above or below it. `X0` and `X6`
/// are `home`, `X5` is `lot`, `X3` and `X7` are `obs`.
pub fn grid_two_layers() -> TransitionSystem {
    let mut ts = TransitionSystem::new();
    ts.add_atomic_propositions(["home", "lot", "obs"]).unwrap();
    ts.add_states_from((0..12).map(|i| format!("X{i}")));
    ts.add_initial("X0").unwrap();
    add_layer(&mut ts, 0);
    add_layer(&mut ts, 6);
    for i in 0..6 {
        let lower = format!("X{i}");
        let upper = format!("X{}", i + 6);
        ts.add_transitions_comb([lower.as_str()], [upper.as_str()]).unwrap();
        ts.add_transitions_comb([upper.as_str()], [lower.as_str()]).unwrap();
    }
    ts.add_state("X6", ["home"]).unwrap();
    ts.add_state("X0", ["home"]).unwrap();
    ts.add_state("X5", ["lot"]).unwrap();
    ts.add_state("X3", ["obs"]).unwrap();
    ts.add_state("X7", ["obs"]).unwrap();
    ts
}

/// Grid adjacency inside one 2x3 layer whose cells start at `X{base}`.
fn add_layer(ts: &mut TransitionSystem, base: usize) {
    let adjacency: [(usize, &[usize]); 6] = [
        (0, &[1, 3]),
        (1, &[0, 2, 4]),
        (2, &[1, 5]),
        (3, &[0, 4]),
        (4, &[1, 3, 5]),
        (5, &[2, 4]),
    ];
    for (from, targets) in adjacency {
        let from = format!("X{}", base + from);
        let targets: Vec<String> = targets.iter().map(|t| format!("X{}", base + t)).collect();
        ts.add_transitions_comb([from.as_str()], targets.iter().map(String::as_str))
            .unwrap();
    }
}

/// Start at `home`, return to it and to `UAV1` infinitely often, provided the
/// environment stops parking infinitely often.
pub fn uav_spec() -> GrSpec {
    let mut spec = GrSpec::new(["park"], ["UAV1"]).unwrap();
    spec.add(Section::EnvProg, "!park").unwrap();
    spec.add(Section::SysInit, "home").unwrap();
    spec.add_all(Section::SysProg, ["home", "UAV1"]).unwrap();
    spec.add(Section::SysSafe, UAV_SAFETY).unwrap();
    spec
}

/// Options for tests that compare runs: sequential solving, default budget.
pub fn sequential() -> SynthesisOptions {
    SynthesisOptions {
        parallel: false,
        ..SynthesisOptions::default()
    }
}

/// Sequential options for a controller that reads the next input.
pub fn mealy() -> SynthesisOptions {
    SynthesisOptions {
        semantics: GameSemantics::Mealy,
        ..sequential()
    }
}
