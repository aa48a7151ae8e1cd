//! The synthesized Moore machine.
//!
//! Each controller state is a winning game node paired with the system goal
//! it currently pursues. Its output is the node's transition-system state
//! and system valuation; transitions are keyed by the environment valuation
//! observed next.

use gr1_ir::transition_system::StateId;
use gr1_ir::valuation::Valuation;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::game::GameSemantics;
use crate::realizability::Qinit;

pub type ControllerStateId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControllerTransition {
    pub input: Valuation,
    pub target: ControllerStateId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerState {
    /// Name of the transition-system state.
    pub location: String,
    #[serde(skip)]
    pub ts_state: StateId,
    /// Environment valuation that led into this state.
    pub env: Valuation,
    pub sys: Valuation,
    /// System goal owed from this state on.
    pub goal: usize,
    /// One entry per admissible input, in ascending input order.
    pub transitions: Vec<ControllerTransition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Controller {
    env_vars: Vec<String>,
    sys_vars: Vec<String>,
    qinit: Qinit,
    semantics: GameSemantics,
    initial: Vec<ControllerStateId>,
    states: Vec<ControllerState>,
}

impl Controller {
    pub(crate) fn new(
        env_vars: Vec<String>,
        sys_vars: Vec<String>,
        qinit: Qinit,
        semantics: GameSemantics,
        initial: Vec<ControllerStateId>,
        states: Vec<ControllerState>,
    ) -> Self {
        Self {
            env_vars,
            sys_vars,
            qinit,
            semantics,
            initial,
            states,
        }
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_transitions(&self) -> usize {
        self.states.iter().map(|s| s.transitions.len()).sum()
    }

    pub fn states(&self) -> &[ControllerState] {
        &self.states
    }

    pub fn state(&self, id: ControllerStateId) -> Option<&ControllerState> {
        self.states.get(id)
    }

    pub fn initial_states(&self) -> &[ControllerStateId] {
        &self.initial
    }

    pub fn env_vars(&self) -> &[String] {
        &self.env_vars
    }

    pub fn sys_vars(&self) -> &[String] {
        &self.sys_vars
    }

    pub fn qinit(&self) -> Qinit {
        self.qinit
    }

    pub fn semantics(&self) -> GameSemantics {
        self.semantics
    }

    /// Output of state `id`: transition-system location and system valuation.
    pub fn output(&self, id: ControllerStateId) -> Option<(&str, Valuation)> {
        self.states.get(id).map(|s| (s.location.as_str(), s.sys))
    }

    /// Environment valuations accepted in state `id`.
    pub fn inputs(&self, id: ControllerStateId) -> Vec<Valuation> {
        self.states
            .get(id)
            .map(|s| s.transitions.iter().map(|t| t.input).collect())
            .unwrap_or_default()
    }

    /// Successor of `id` on `input`; `None` if the input is not admissible.
    pub fn step(&self, id: ControllerStateId, input: Valuation) -> Option<ControllerStateId> {
        self.states
            .get(id)?
            .transitions
            .iter()
            .find(|t| t.input == input)
            .map(|t| t.target)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// SHA-256 over the compact JSON form.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Controller: {} states, {} transitions ({}, {})",
            self.num_states(),
            self.num_transitions(),
            self.qinit,
            self.semantics
        )?;
        writeln!(f, "  Inputs: [{}]", self.env_vars.join(", "))?;
        writeln!(f, "  Outputs: [loc, {}]", self.sys_vars.join(", "))?;
        for (id, s) in self.states.iter().enumerate() {
            let mark = if self.initial.contains(&id) { "*" } else { " " };
            let targets: Vec<String> = s
                .transitions
                .iter()
                .map(|t| format!("{} -> {}", t.input.display_with(&self.env_vars), t.target))
                .collect();
            writeln!(
                f,
                "  {mark}{id:>4}  {:<8} {:<16} goal {}  | {}",
                s.location,
                s.sys.display_with(&self.sys_vars),
                s.goal,
                targets.join(", ")
            )?;
        }
        Ok(())
    }
}
