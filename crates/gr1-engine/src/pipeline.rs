//! Synthesis entry points.
//!
//! `compile -> build game -> solve -> select initial nodes -> extract`. Every
//! structural problem is reported before any fixpoint work starts.

use std::time::Instant;

use gr1_ir::specification::{CompiledSpec, GrSpec, Player, SpecError};
use gr1_ir::transition_system::{TransitionSystem, TransitionSystemError};
use thiserror::Error;
use tracing::{info, warn};

use crate::budget::{CancelToken, RunGuard, SynthesisBudget};
use crate::controller::Controller;
use crate::game::{GameGraph, GameSemantics, NodeId};
use crate::realizability::{select_initial, Qinit, UnrealizableReason};
use crate::result::{JusticePairReport, PhaseProfile, SynthesisReport, UnrealizableReport, Verdict};
use crate::solver::{solve, solve_with_goals, GoalSets, SolveConfig, WinningRegion};
use crate::strategy::StrategyContext;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Transition system error: {0}")]
    TransitionSystem(#[from] TransitionSystemError),
    #[error("Malformed specification: {0}")]
    MalformedSpec(#[from] SpecError),
    #[error("Specification is unrealizable: {}", .0.reason)]
    Unrealizable(Box<UnrealizableReport>),
    #[error("Solver divergence: {fixpoint} fixpoint ran {iterations} iterations (bound {bound})")]
    SolverDivergence {
        fixpoint: &'static str,
        iterations: usize,
        bound: usize,
    },
    #[error("Game graph exceeds the node budget of {max_nodes}")]
    BudgetExceeded { max_nodes: usize },
    #[error("Timed out during {phase}")]
    Timeout { phase: &'static str },
    #[error("Cancelled during {phase}")]
    Cancelled { phase: &'static str },
    #[error("Strategy extraction failed: {0}")]
    Strategy(String),
}

/// Options controlling one synthesis run.
#[derive(Debug, Clone)]
pub struct SynthesisOptions {
    pub qinit: Qinit,
    pub semantics: GameSemantics,
    pub budget: SynthesisBudget,
    /// Solve the per-goal fixpoints on the rayon pool.
    pub parallel: bool,
    /// Treat reachable absorbing states as losing positions instead of
    /// rejecting the transition system.
    pub allow_absorbing: bool,
    /// On an unrealizable verdict, solve every justice pair in isolation.
    pub diagnose_unrealizable: bool,
    pub cancel: Option<CancelToken>,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            qinit: Qinit::ExistsForall,
            semantics: GameSemantics::Moore,
            budget: SynthesisBudget::default(),
            parallel: true,
            allow_absorbing: false,
            diagnose_unrealizable: true,
            cancel: None,
        }
    }
}

/// A realizable specification and its controller.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub controller: Controller,
    pub spec: CompiledSpec,
    pub report: SynthesisReport,
}

/// Synthesize a controller, or fail with `Unrealizable` and a report.
pub fn synthesize(
    ts: &TransitionSystem,
    spec: &GrSpec,
    options: &SynthesisOptions,
) -> Result<Synthesis, SynthesisError> {
    let mut run = SolvedGame::solve(ts, spec, options)?;
    let seeds = match select_initial(&run.graph, &run.region, options.qinit) {
        Ok(seeds) => seeds,
        Err(reason) => {
            let report = run.unrealizable(reason, options)?;
            return Err(SynthesisError::Unrealizable(Box::new(report)));
        }
    };

    let started = Instant::now();
    let ctx = StrategyContext {
        ts,
        graph: &run.graph,
        goals: &run.goals,
        region: &run.region,
        semantics: options.semantics,
    };
    let controller = ctx.extract(
        &seeds,
        run.spec.env_vars.iter().cloned().collect(),
        run.spec.sys_vars.iter().cloned().collect(),
        options.qinit,
    )?;
    run.phase("extract", started);

    let mut report = run.report(seeds.len());
    report.controller_states = Some(controller.num_states());
    Ok(Synthesis {
        controller,
        spec: run.spec,
        report,
    })
}

/// Decide realizability without extracting a controller.
pub fn check_realizability(
    ts: &TransitionSystem,
    spec: &GrSpec,
    options: &SynthesisOptions,
) -> Result<Verdict, SynthesisError> {
    let run = SolvedGame::solve(ts, spec, options)?;
    match select_initial(&run.graph, &run.region, options.qinit) {
        Ok(seeds) => Ok(Verdict::Realizable {
            report: run.report(seeds.len()),
        }),
        Err(reason) => Ok(Verdict::Unrealizable(Box::new(
            run.unrealizable(reason, options)?,
        ))),
    }
}

/// Compiled inputs, game graph and winning region of one run.
struct SolvedGame {
    spec: CompiledSpec,
    graph: GameGraph,
    goals: GoalSets,
    region: WinningRegion,
    guard: RunGuard,
    ts_states: usize,
    qinit: Qinit,
    semantics: GameSemantics,
    phases: Vec<PhaseProfile>,
}

impl SolvedGame {
    fn solve(
        ts: &TransitionSystem,
        spec: &GrSpec,
        options: &SynthesisOptions,
    ) -> Result<Self, SynthesisError> {
        let mut phases = Vec::new();
        let started = Instant::now();
        validate_transition_system(ts, options.allow_absorbing)?;
        let compiled = spec.compile(ts.atomic_propositions())?;
        push_phase(&mut phases, "compile", started);

        let guard = RunGuard::new(&options.budget, options.cancel.clone());

        let started = Instant::now();
        info!("Building game graph...");
        let graph = GameGraph::build(ts, &compiled, options.budget.max_nodes, &guard)?;
        push_phase(&mut phases, "game", started);

        let started = Instant::now();
        let goals = GoalSets::compute(&graph, &compiled);
        let config = SolveConfig {
            semantics: options.semantics,
            parallel: options.parallel,
        };
        let region = solve(&graph, &goals, config, &guard)?;
        push_phase(&mut phases, "solve", started);
        info!(
            winning = region.len(),
            nodes = graph.num_nodes(),
            outer_iterations = region.outer_iterations,
            "winning region computed"
        );

        Ok(Self {
            spec: compiled,
            graph,
            goals,
            region,
            guard,
            ts_states: ts.num_states(),
            qinit: options.qinit,
            semantics: options.semantics,
            phases,
        })
    }

    fn phase(&mut self, name: &str, started: Instant) {
        push_phase(&mut self.phases, name, started);
    }

    fn report(&self, initial_nodes: usize) -> SynthesisReport {
        SynthesisReport {
            qinit: self.qinit,
            semantics: self.semantics,
            ts_states: self.ts_states,
            env_goals: self.spec.goal_count(Player::Env),
            sys_goals: self.spec.goal_count(Player::Sys),
            game_nodes: self.graph.num_nodes(),
            game_edges: self.graph.num_edges(),
            initial_nodes,
            winning_nodes: self.region.len(),
            outer_iterations: self.region.outer_iterations,
            fixpoint_iterations: self.guard.iterations(),
            controller_states: None,
            phases: self.phases.clone(),
        }
    }

    fn unrealizable(
        &self,
        reason: UnrealizableReason,
        options: &SynthesisOptions,
    ) -> Result<UnrealizableReport, SynthesisError> {
        info!(%reason, "specification is unrealizable");
        let justice_pairs = if options.diagnose_unrealizable {
            self.justice_pairs(options)?
        } else {
            Vec::new()
        };
        Ok(UnrealizableReport {
            reason,
            report: self.report(self.graph.initial_nodes().len()),
            justice_pairs,
        })
    }

    /// Solve each (environment goal, system goal) pair in isolation.
    fn justice_pairs(&self, options: &SynthesisOptions) -> Result<Vec<JusticePairReport>, SynthesisError> {
        let config = SolveConfig {
            semantics: options.semantics,
            parallel: false,
        };
        let initial: &[NodeId] = self.graph.initial_nodes();
        let mut pairs = Vec::new();
        for (i, env_goal) in self.goals.env.iter().enumerate() {
            for (j, sys_goal) in self.goals.sys.iter().enumerate() {
                let guard = RunGuard::new(&options.budget, options.cancel.clone());
                let region = solve_with_goals(&self.graph, &[env_goal], &[sys_goal], config, &guard)?;
                pairs.push(JusticePairReport {
                    env_goal: i,
                    sys_goal: j,
                    region_size: region.len(),
                    contains_initial: initial.iter().any(|&n| region.contains(n)),
                });
            }
        }
        Ok(pairs)
    }
}

fn push_phase(phases: &mut Vec<PhaseProfile>, phase: &str, started: Instant) {
    phases.push(PhaseProfile {
        phase: phase.to_string(),
        elapsed_ms: started.elapsed().as_millis(),
    });
}

fn validate_transition_system(
    ts: &TransitionSystem,
    allow_absorbing: bool,
) -> Result<(), TransitionSystemError> {
    match ts.validate() {
        Err(TransitionSystemError::Absorbing { states }) if allow_absorbing => {
            warn!(
                states = %states.join(", "),
                "absorbing states treated as losing positions"
            );
            Ok(())
        }
        other => other,
    }
}
