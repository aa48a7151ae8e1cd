use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

use crate::valuation::{Valuation, MAX_PROPOSITIONS};

/// A unique identifier for a state of the transition system.
pub type StateId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionSystemError {
    #[error("Unknown state '{0}'")]
    UnknownState(String),
    #[error("State '{state}' is labelled with undeclared proposition '{proposition}'")]
    UnknownProposition { state: String, proposition: String },
    #[error("Too many atomic propositions: {count} declared, at most {max} supported")]
    TooManyPropositions { count: usize, max: usize },
    #[error("Transition system has no initial state")]
    NoInitialStates,
    #[error("Absorbing state(s) without outgoing transitions reachable from the initial states: {}", .states.join(", "))]
    Absorbing { states: Vec<String> },
}

/// Finite transition system describing the legal moves of the agent.
///
/// States are kept in insertion order; all queries iterate in that order so
/// that every downstream computation is deterministic.
#[derive(Debug, Clone, Default)]
pub struct TransitionSystem {
    states: IndexMap<String, IndexSet<String>>,
    initial: IndexSet<StateId>,
    transitions: Vec<IndexSet<StateId>>,
    atomic_propositions: IndexSet<String>,
}

impl TransitionSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare atomic propositions that states may be labelled with.
    pub fn add_atomic_propositions<I, S>(&mut self, props: I) -> Result<(), TransitionSystemError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for p in props {
            self.atomic_propositions.insert(p.into());
        }
        if self.atomic_propositions.len() > MAX_PROPOSITIONS {
            return Err(TransitionSystemError::TooManyPropositions {
                count: self.atomic_propositions.len(),
                max: MAX_PROPOSITIONS,
            });
        }
        Ok(())
    }

    /// Add a state, or replace the label set of an existing one.
    ///
    /// Labels are overwritten, never merged: re-adding `X0` with `{home}`
    /// drops whatever labels `X0` carried before.
    pub fn add_state<I, S>(
        &mut self,
        name: impl Into<String>,
        labels: I,
    ) -> Result<StateId, TransitionSystemError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let mut label_set = IndexSet::new();
        for label in labels {
            let label = label.into();
            if !self.atomic_propositions.contains(&label) {
                return Err(TransitionSystemError::UnknownProposition {
                    state: name,
                    proposition: label,
                });
            }
            label_set.insert(label);
        }
        if let Some(id) = self.states.get_index_of(&name) {
            self.states[id] = label_set;
            return Ok(id);
        }
        let (id, _) = self.states.insert_full(name, label_set);
        self.transitions.push(IndexSet::new());
        Ok(id)
    }

    /// Add unlabelled states. Existing states keep their labels.
    pub fn add_states_from<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.states.contains_key(&name) {
                self.states.insert(name, IndexSet::new());
                self.transitions.push(IndexSet::new());
            }
        }
    }

    pub fn add_initial(&mut self, name: &str) -> Result<(), TransitionSystemError> {
        let id = self.require(name)?;
        self.initial.insert(id);
        Ok(())
    }

    /// Add an edge from every state of `from` to every state of `to`.
    ///
    /// Only the pairs of this call are added; nothing carries over to later
    /// calls. Returns the number of edges that were not already present.
    pub fn add_transitions_comb<'a, F, T>(
        &mut self,
        from: F,
        to: T,
    ) -> Result<usize, TransitionSystemError>
    where
        F: IntoIterator<Item = &'a str>,
        T: IntoIterator<Item = &'a str>,
    {
        let sources = from
            .into_iter()
            .map(|n| self.require(n))
            .collect::<Result<Vec<_>, _>>()?;
        let targets = to
            .into_iter()
            .map(|n| self.require(n))
            .collect::<Result<Vec<_>, _>>()?;
        let mut added = 0;
        for &s in &sources {
            for &t in &targets {
                if self.transitions[s].insert(t) {
                    added += 1;
                }
            }
        }
        Ok(added)
    }

    /// Names of the states reachable in one move from `name`.
    pub fn neighbors(&self, name: &str) -> Result<Vec<&str>, TransitionSystemError> {
        let id = self.require(name)?;
        Ok(self.transitions[id]
            .iter()
            .map(|&t| self.state_name(t))
            .collect())
    }

    pub fn successors(&self, id: StateId) -> &IndexSet<StateId> {
        &self.transitions[id]
    }

    pub fn labels(&self, name: &str) -> Result<&IndexSet<String>, TransitionSystemError> {
        self.states
            .get(name)
            .ok_or_else(|| TransitionSystemError::UnknownState(name.to_string()))
    }

    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.states.get_index_of(name)
    }

    /// Name of state `id`; `<invalid>` for ids that did not come from this system.
    pub fn state_name(&self, id: StateId) -> &str {
        self.states
            .get_index(id)
            .map(|(name, _)| name.as_str())
            .unwrap_or("<invalid>")
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_transitions(&self) -> usize {
        self.transitions.iter().map(IndexSet::len).sum()
    }

    pub fn initial_states(&self) -> &IndexSet<StateId> {
        &self.initial
    }

    pub fn atomic_propositions(&self) -> &IndexSet<String> {
        &self.atomic_propositions
    }

    /// Labels of state `id` packed over [`Self::atomic_propositions`].
    pub fn label_valuation(&self, id: StateId) -> Valuation {
        match self.states.get_index(id) {
            Some((_, labels)) => Valuation::from_true_indices(
                labels
                    .iter()
                    .filter_map(|l| self.atomic_propositions.get_index_of(l)),
            ),
            None => Valuation::EMPTY,
        }
    }

    /// States reachable from an initial state, in breadth-first order.
    pub fn reachable_states(&self) -> IndexSet<StateId> {
        let mut seen: IndexSet<StateId> = self.initial.iter().copied().collect();
        let mut queue: VecDeque<StateId> = seen.iter().copied().collect();
        while let Some(s) = queue.pop_front() {
            for &t in &self.transitions[s] {
                if seen.insert(t) {
                    queue.push_back(t);
                }
            }
        }
        seen
    }

    /// Reachable states that have no outgoing transition.
    pub fn absorbing_states(&self) -> Vec<StateId> {
        self.reachable_states()
            .into_iter()
            .filter(|&s| self.transitions[s].is_empty())
            .collect()
    }

    /// Structural checks performed at synthesis time.
    pub fn validate(&self) -> Result<(), TransitionSystemError> {
        if self.initial.is_empty() {
            return Err(TransitionSystemError::NoInitialStates);
        }
        let absorbing = self.absorbing_states();
        if !absorbing.is_empty() {
            return Err(TransitionSystemError::Absorbing {
                states: absorbing
                    .into_iter()
                    .map(|s| self.state_name(s).to_string())
                    .collect(),
            });
        }
        Ok(())
    }

    fn require(&self, name: &str) -> Result<StateId, TransitionSystemError> {
        self.state_id(name)
            .ok_or_else(|| TransitionSystemError::UnknownState(name.to_string()))
    }
}

impl fmt::Display for TransitionSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Transition System:")?;
        let props: Vec<&str> = self.atomic_propositions.iter().map(String::as_str).collect();
        writeln!(f, "  Atomic propositions: {{{}}}", props.join(", "))?;
        writeln!(f, "  States:")?;
        for (i, (name, labels)) in self.states.iter().enumerate() {
            let initial = if self.initial.contains(&i) {
                " (initial)"
            } else {
                ""
            };
            let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
            writeln!(f, "    {name}{initial}: {{{}}}", labels.join(", "))?;
        }
        writeln!(f, "  Transitions:")?;
        for (i, targets) in self.transitions.iter().enumerate() {
            if targets.is_empty() {
                continue;
            }
            let names: Vec<&str> = targets.iter().map(|&t| self.state_name(t)).collect();
            writeln!(f, "    {} -> {}", self.state_name(i), names.join(", "))?;
        }
        Ok(())
    }
}
