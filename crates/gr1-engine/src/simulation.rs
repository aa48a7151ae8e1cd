//! Replaying a controller against an environment.

use gr1_ir::specification::{CompiledSpec, Player};
use gr1_ir::transition_system::TransitionSystem;
use gr1_ir::valuation::{Snapshot, Valuation};
use serde::Serialize;

use crate::controller::{Controller, ControllerStateId};

/// Chooses the environment input at each step.
pub trait EnvironmentPolicy {
    /// Index into `inputs` (never empty), or `None` to stop the run.
    fn choose(&mut self, step: usize, inputs: &[Valuation]) -> Option<usize>;
}

impl<F> EnvironmentPolicy for F
where
    F: FnMut(usize, &[Valuation]) -> Option<usize>,
{
    fn choose(&mut self, step: usize, inputs: &[Valuation]) -> Option<usize> {
        self(step, inputs)
    }
}

/// Always the first admissible input.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstInput;

impl EnvironmentPolicy for FirstInput {
    fn choose(&mut self, _step: usize, _inputs: &[Valuation]) -> Option<usize> {
        Some(0)
    }
}

/// Replays a fixed input sequence, cycling when it runs out. Scripted inputs
/// that are not admissible fall back to the first admissible one.
#[derive(Debug, Clone)]
pub struct ScriptedInputs {
    script: Vec<Valuation>,
}

impl ScriptedInputs {
    pub fn new(script: Vec<Valuation>) -> Self {
        Self { script }
    }
}

impl EnvironmentPolicy for ScriptedInputs {
    fn choose(&mut self, step: usize, inputs: &[Valuation]) -> Option<usize> {
        if self.script.is_empty() {
            return Some(0);
        }
        let wanted = self.script[step % self.script.len()];
        Some(inputs.iter().position(|&v| v == wanted).unwrap_or(0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationStep {
    pub state: ControllerStateId,
    pub location: String,
    pub env: Valuation,
    pub sys: Valuation,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationTrace {
    pub steps: Vec<SimulationStep>,
    /// Step indices whose outgoing transition violates system safety.
    pub safety_violations: Vec<usize>,
    /// How often each system goal held along the run.
    pub sys_goal_visits: Vec<usize>,
    /// How often each environment goal held along the run.
    pub env_goal_visits: Vec<usize>,
    /// The run stopped because no input was admissible.
    pub deadlocked: bool,
}

impl SimulationTrace {
    pub fn is_safe(&self) -> bool {
        self.safety_violations.is_empty()
    }

    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.location.as_str())
    }
}

/// Run `controller` from its first initial state for at most `horizon`
/// transitions, auditing safety and justice along the way.
pub fn simulate<P: EnvironmentPolicy>(
    controller: &Controller,
    ts: &TransitionSystem,
    spec: &CompiledSpec,
    policy: &mut P,
    horizon: usize,
) -> SimulationTrace {
    let mut trace = SimulationTrace {
        steps: Vec::new(),
        safety_violations: Vec::new(),
        sys_goal_visits: vec![0; spec.goal_count(Player::Sys)],
        env_goal_visits: vec![0; spec.goal_count(Player::Env)],
        deadlocked: false,
    };
    let Some(&start) = controller.initial_states().first() else {
        return trace;
    };

    let snapshot_of = |id: ControllerStateId| {
        controller.state(id).map(|s| {
            let props = ts.label_valuation(s.ts_state);
            Snapshot::new(s.env, s.sys, props)
        })
    };

    let mut current = start;
    for step in 0..=horizon {
        let Some(state) = controller.state(current) else {
            break;
        };
        let Some(snap) = snapshot_of(current) else {
            break;
        };
        trace.steps.push(SimulationStep {
            state: current,
            location: state.location.clone(),
            env: state.env,
            sys: state.sys,
        });
        for (g, count) in trace.sys_goal_visits.iter_mut().enumerate() {
            if spec.evaluate_justice(Player::Sys, g, &snap) {
                *count += 1;
            }
        }
        for (g, count) in trace.env_goal_visits.iter_mut().enumerate() {
            if spec.evaluate_justice(Player::Env, g, &snap) {
                *count += 1;
            }
        }
        if step == horizon {
            break;
        }

        let inputs = controller.inputs(current);
        if inputs.is_empty() {
            trace.deadlocked = true;
            break;
        }
        let Some(choice) = policy.choose(step, &inputs) else {
            break;
        };
        let input = inputs[choice.min(inputs.len() - 1)];
        let Some(next) = controller.step(current, input) else {
            break;
        };
        if let Some(next_snap) = snapshot_of(next) {
            if !spec.evaluate_safety(Player::Sys, &snap, &next_snap) {
                trace.safety_violations.push(step);
            }
        }
        current = next;
    }
    trace
}
