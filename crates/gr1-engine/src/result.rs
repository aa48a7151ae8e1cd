use serde::Serialize;
use std::fmt;

use crate::game::GameSemantics;
use crate::realizability::{Qinit, UnrealizableReason};

/// Wall-clock time spent in one pipeline phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseProfile {
    pub phase: String,
    pub elapsed_ms: u128,
}

/// Statistics of one synthesis run.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisReport {
    pub qinit: Qinit,
    pub semantics: GameSemantics,
    pub ts_states: usize,
    pub env_goals: usize,
    pub sys_goals: usize,
    pub game_nodes: usize,
    pub game_edges: usize,
    pub initial_nodes: usize,
    pub winning_nodes: usize,
    pub outer_iterations: usize,
    pub fixpoint_iterations: usize,
    /// Number of controller states; `None` when no controller was extracted.
    pub controller_states: Option<usize>,
    pub phases: Vec<PhaseProfile>,
}

impl fmt::Display for SynthesisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Synthesis report ({}, {}):", self.qinit, self.semantics)?;
        writeln!(f, "  Transition system states: {}", self.ts_states)?;
        writeln!(
            f,
            "  Justice goals: {} environment, {} system",
            self.env_goals, self.sys_goals
        )?;
        writeln!(
            f,
            "  Game graph: {} nodes, {} edges, {} initial",
            self.game_nodes, self.game_edges, self.initial_nodes
        )?;
        writeln!(
            f,
            "  Winning region: {} nodes after {} outer iterations ({} fixpoint iterations total)",
            self.winning_nodes, self.outer_iterations, self.fixpoint_iterations
        )?;
        if let Some(n) = self.controller_states {
            writeln!(f, "  Controller states: {n}")?;
        }
        for p in &self.phases {
            writeln!(f, "  [{}] {} ms", p.phase, p.elapsed_ms)?;
        }
        Ok(())
    }
}

/// Winning region of one (environment goal, system goal) pair solved in
/// isolation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JusticePairReport {
    pub env_goal: usize,
    pub sys_goal: usize,
    pub region_size: usize,
    pub contains_initial: bool,
}

/// Explanation of an unrealizable verdict.
#[derive(Debug, Clone, Serialize)]
pub struct UnrealizableReport {
    pub reason: UnrealizableReason,
    pub report: SynthesisReport,
    /// Empty when diagnostics were disabled or the failure happened before
    /// any goal mattered.
    pub justice_pairs: Vec<JusticePairReport>,
}

impl UnrealizableReport {
    /// Pairs whose isolated game is already lost at every initial node.
    pub fn failing_pairs(&self) -> impl Iterator<Item = &JusticePairReport> {
        self.justice_pairs.iter().filter(|p| !p.contains_initial)
    }
}

impl fmt::Display for UnrealizableReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "UNREALIZABLE: {}", self.reason)?;
        write!(f, "{}", self.report)?;
        if !self.justice_pairs.is_empty() {
            writeln!(f, "  Justice pairs (env goal, sys goal):")?;
            for p in &self.justice_pairs {
                let status = if p.contains_initial { "ok" } else { "LOSING" };
                writeln!(
                    f,
                    "    ({}, {}): {} winning nodes [{status}]",
                    p.env_goal, p.sys_goal, p.region_size
                )?;
            }
        }
        Ok(())
    }
}

/// Outcome of a realizability check.
#[derive(Debug, Clone)]
pub enum Verdict {
    Realizable { report: SynthesisReport },
    Unrealizable(Box<UnrealizableReport>),
}

impl Verdict {
    pub fn is_realizable(&self) -> bool {
        matches!(self, Verdict::Realizable { .. })
    }

    pub fn report(&self) -> &SynthesisReport {
        match self {
            Verdict::Realizable { report } => report,
            Verdict::Unrealizable(u) => &u.report,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Realizable { report } => {
                writeln!(f, "REALIZABLE")?;
                write!(f, "{report}")
            }
            Verdict::Unrealizable(u) => write!(f, "{u}"),
        }
    }
}
