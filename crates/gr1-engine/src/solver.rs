//! GR(1) winning-region computation.
//!
//! ```text
//! Z = νZ. ⋂_j μY. ⋃_i νX. (J^s_j ∩ CPre(Z)) ∪ CPre(Y) ∪ (¬J^e_i ∩ CPre(X))
//! ```
//!
//! For every system goal `j` the final middle-loop layers `Y_j^k` and inner
//! fixpoints `X_j^{k,i}` are kept, together with the rank of every node, for
//! strategy extraction. Goals are independent within one outer iteration and
//! may be solved on the rayon pool.

use gr1_ir::specification::{CompiledSpec, Player};
use rayon::prelude::*;
use tracing::debug;

use crate::budget::RunGuard;
use crate::game::{GameGraph, GameSemantics, NodeId, NodeSet};
use crate::pipeline::SynthesisError;

/// Position of a node in the attractor layers of one system goal.
///
/// `layer = k` means the node first appears in `Y^{k+1}`; `env_goal` is the
/// smallest `i` with the node in `X^{k,i}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rank {
    pub layer: usize,
    pub env_goal: usize,
}

/// Memoized fixpoint layers for one system goal.
#[derive(Debug, Clone)]
pub struct GoalLayers {
    /// `y[k]` is `Y^k`; `y[0]` is empty and the last entry is the fixpoint.
    pub y: Vec<NodeSet>,
    /// `x[k][i]` is `X^{k,i}`, whose union is `Y^{k+1}`.
    pub x: Vec<Vec<NodeSet>>,
    ranks: Vec<Option<Rank>>,
}

impl GoalLayers {
    pub fn rank(&self, id: NodeId) -> Option<Rank> {
        self.ranks.get(id).copied().flatten()
    }

    pub fn region(&self) -> &NodeSet {
        // y always holds at least the empty Y^0.
        &self.y[self.y.len() - 1]
    }

    fn compute_ranks(&mut self, nodes: usize) {
        let mut ranks = vec![None; nodes];
        for (k, xs) in self.x.iter().enumerate() {
            for (i, x) in xs.iter().enumerate() {
                for id in x.iter() {
                    if ranks[id].is_none() && !self.y[k].contains(id) {
                        ranks[id] = Some(Rank {
                            layer: k,
                            env_goal: i,
                        });
                    }
                }
            }
        }
        self.ranks = ranks;
    }
}

/// Nodes satisfying each justice predicate.
#[derive(Debug, Clone)]
pub struct GoalSets {
    pub env: Vec<NodeSet>,
    pub sys: Vec<NodeSet>,
}

impl GoalSets {
    /// Evaluate every justice goal on every node. Empty justice lists become
    /// a single goal containing all nodes.
    pub fn compute(graph: &GameGraph, spec: &CompiledSpec) -> Self {
        let collect = |player: Player| -> Vec<NodeSet> {
            (0..spec.goal_count(player))
                .map(|g| graph.select(|snap| spec.evaluate_justice(player, g, snap)))
                .collect()
        };
        Self {
            env: collect(Player::Env),
            sys: collect(Player::Sys),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WinningRegion {
    pub winning: NodeSet,
    /// `CPre(Z)`; goal nodes inside it may hand over to the next goal.
    pub cpre_winning: NodeSet,
    pub goals: Vec<GoalLayers>,
    pub outer_iterations: usize,
}

impl WinningRegion {
    pub fn contains(&self, id: NodeId) -> bool {
        self.winning.contains(id)
    }

    pub fn len(&self) -> usize {
        self.winning.len()
    }

    pub fn is_empty(&self) -> bool {
        self.winning.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct SolveConfig {
    pub semantics: GameSemantics,
    pub parallel: bool,
}

/// Solve the full GR(1) game.
pub(crate) fn solve(
    graph: &GameGraph,
    goals: &GoalSets,
    config: SolveConfig,
    guard: &RunGuard,
) -> Result<WinningRegion, SynthesisError> {
    let env_goals: Vec<&NodeSet> = goals.env.iter().collect();
    let sys_goals: Vec<&NodeSet> = goals.sys.iter().collect();
    solve_with_goals(graph, &env_goals, &sys_goals, config, guard)
}

/// Solve the game for an arbitrary selection of justice goals.
pub(crate) fn solve_with_goals(
    graph: &GameGraph,
    env_goals: &[&NodeSet],
    sys_goals: &[&NodeSet],
    config: SolveConfig,
    guard: &RunGuard,
) -> Result<WinningRegion, SynthesisError> {
    let n = graph.num_nodes();
    let bound = n + 1;
    let mut z = NodeSet::full(n);
    let mut outer = 0;

    loop {
        guard.check("fixpoint")?;
        outer += 1;
        if outer > bound {
            return Err(SynthesisError::SolverDivergence {
                fixpoint: "outer",
                iterations: outer,
                bound,
            });
        }
        guard.tick("outer")?;

        let cpre_z = graph.cpre(&z, config.semantics);
        let solve_goal = |j: usize| -> Result<GoalLayers, SynthesisError> {
            guard.check("fixpoint")?;
            goal_fixpoint(graph, &cpre_z, sys_goals[j], env_goals, config.semantics, guard)
        };
        let layers: Vec<GoalLayers> = if config.parallel {
            (0..sys_goals.len())
                .into_par_iter()
                .map(solve_goal)
                .collect::<Result<_, _>>()?
        } else {
            (0..sys_goals.len())
                .map(solve_goal)
                .collect::<Result<_, _>>()?
        };

        let mut next = NodeSet::full(n);
        for l in &layers {
            next.intersect_with(l.region());
        }
        debug!(
            iteration = outer,
            winning = next.len(),
            "outer fixpoint iteration"
        );

        if next == z {
            let mut goals = layers;
            for g in &mut goals {
                g.compute_ranks(n);
            }
            return Ok(WinningRegion {
                winning: z,
                cpre_winning: cpre_z,
                goals,
                outer_iterations: outer,
            });
        }
        z = next;
    }
}

/// `μY. ⋃_i νX. (J^s_j ∩ CPre(Z)) ∪ CPre(Y) ∪ (¬J^e_i ∩ CPre(X))`.
fn goal_fixpoint(
    graph: &GameGraph,
    cpre_z: &NodeSet,
    sys_goal: &NodeSet,
    env_goals: &[&NodeSet],
    semantics: GameSemantics,
    guard: &RunGuard,
) -> Result<GoalLayers, SynthesisError> {
    let n = graph.num_nodes();
    let bound = n + 1;

    let mut reach_goal = sys_goal.clone();
    reach_goal.intersect_with(cpre_z);

    let mut y = NodeSet::empty(n);
    let mut layers = GoalLayers {
        y: vec![y.clone()],
        x: Vec::new(),
        ranks: Vec::new(),
    };

    for middle in 1.. {
        if middle > bound {
            return Err(SynthesisError::SolverDivergence {
                fixpoint: "middle",
                iterations: middle,
                bound,
            });
        }
        guard.tick("middle")?;

        let mut base = graph.cpre(&y, semantics);
        base.union_with(&reach_goal);

        let mut next_y = NodeSet::empty(n);
        let mut xs = Vec::with_capacity(env_goals.len());
        for env_goal in env_goals {
            let x = inner_fixpoint(graph, &base, env_goal, semantics, guard)?;
            next_y.union_with(&x);
            xs.push(x);
        }

        if next_y == y {
            break;
        }
        layers.x.push(xs);
        layers.y.push(next_y.clone());
        y = next_y;
    }
    Ok(layers)
}

/// `νX. base ∪ (¬J^e_i ∩ CPre(X))`, iterated down from the full node set.
fn inner_fixpoint(
    graph: &GameGraph,
    base: &NodeSet,
    env_goal: &NodeSet,
    semantics: GameSemantics,
    guard: &RunGuard,
) -> Result<NodeSet, SynthesisError> {
    let n = graph.num_nodes();
    let bound = n + 1;
    let mut x = NodeSet::full(n);
    for inner in 1.. {
        if inner > bound {
            return Err(SynthesisError::SolverDivergence {
                fixpoint: "inner",
                iterations: inner,
                bound,
            });
        }
        guard.tick("inner")?;

        let mut next = graph.cpre(&x, semantics);
        next.subtract(env_goal);
        next.union_with(base);
        if next == x {
            break;
        }
        x = next;
    }
    Ok(x)
}
