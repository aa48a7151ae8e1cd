//! Strategy extraction from the memoized fixpoint layers.
//!
//! At node `s` owing goal `j` the controller first hands over to the next
//! goal while `s` is a goal node of `j` inside `CPre(Z)`. It then moves
//! towards `Y_j^k` (one layer closer to the goal) or, when that is not
//! possible, stays inside `X_j^{k,i}` where the environment is violating its
//! own justice assumption `i`.

use gr1_ir::transition_system::TransitionSystem;
use gr1_ir::valuation::Valuation;
use indexmap::IndexMap;
use tracing::info;

use crate::controller::{Controller, ControllerState, ControllerStateId, ControllerTransition};
use crate::game::{GameGraph, GameSemantics, NodeEdges, NodeId, NodeSet};
use crate::pipeline::SynthesisError;
use crate::realizability::Qinit;
use crate::solver::{GoalLayers, GoalSets, Rank, WinningRegion};

/// Everything extraction reads.
pub(crate) struct StrategyContext<'a> {
    pub ts: &'a TransitionSystem,
    pub graph: &'a GameGraph,
    pub goals: &'a GoalSets,
    pub region: &'a WinningRegion,
    pub semantics: GameSemantics,
}

/// Chosen successors of one controller state.
struct Decision {
    next_goal: usize,
    moves: Vec<(Valuation, NodeId)>,
}

const UNRANKED: Rank = Rank {
    layer: usize::MAX,
    env_goal: usize::MAX,
};

impl StrategyContext<'_> {
    /// Build the controller reachable from `seeds`, all starting on goal 0.
    pub(crate) fn extract(
        &self,
        seeds: &[NodeId],
        env_vars: Vec<String>,
        sys_vars: Vec<String>,
        qinit: Qinit,
    ) -> Result<Controller, SynthesisError> {
        let mut index: IndexMap<(NodeId, usize), ControllerStateId> = IndexMap::new();
        let mut initial = Vec::with_capacity(seeds.len());
        for &seed in seeds {
            let len = index.len();
            let id = *index.entry((seed, 0)).or_insert(len);
            if !initial.contains(&id) {
                initial.push(id);
            }
        }

        let mut states = Vec::new();
        let mut next = 0;
        while next < index.len() {
            let (node, goal) = *index
                .get_index(next)
                .map(|(k, _)| k)
                .ok_or_else(|| SynthesisError::Strategy("controller index out of range".into()))?;
            let decision = self.decide(node, goal)?;
            let mut transitions = Vec::with_capacity(decision.moves.len());
            for (input, target) in decision.moves {
                let len = index.len();
                let target = *index.entry((target, decision.next_goal)).or_insert(len);
                transitions.push(ControllerTransition { input, target });
            }
            let game_node = self
                .graph
                .node(node)
                .ok_or_else(|| SynthesisError::Strategy(format!("unknown game node {node}")))?;
            states.push(ControllerState {
                location: self.ts.state_name(game_node.state).to_string(),
                ts_state: game_node.state,
                env: game_node.env,
                sys: game_node.sys,
                goal,
                transitions,
            });
            next += 1;
        }

        info!(states = states.len(), "controller extracted");
        Ok(Controller::new(
            env_vars,
            sys_vars,
            qinit,
            self.semantics,
            initial,
            states,
        ))
    }

    fn decide(&self, s: NodeId, goal: usize) -> Result<Decision, SynthesisError> {
        let n_goals = self.region.goals.len();
        let mut j = goal % n_goals.max(1);
        let mut advanced = 0;
        while advanced < n_goals && self.hands_over(s, j) {
            j = (j + 1) % n_goals;
            advanced += 1;
        }

        let layers = &self.region.goals[j];
        let edges = self.graph.edges(s);
        let moves = if advanced == n_goals {
            // Every goal holds here: any move that stays winning.
            self.choose(edges, layers, &self.region.winning, None)
        } else {
            let rank = layers.rank(s).ok_or_else(|| {
                SynthesisError::Strategy(format!("node {s} has no rank for goal {j}"))
            })?;
            let closer = &layers.y[rank.layer];
            let stay = &layers.x[rank.layer][rank.env_goal];
            self.choose(edges, layers, closer, Some(stay))
        };
        let moves = moves.ok_or_else(|| {
            SynthesisError::Strategy(format!("no strategy move at node {s} for goal {j}"))
        })?;
        Ok(Decision { next_goal: j, moves })
    }

    fn hands_over(&self, s: NodeId, j: usize) -> bool {
        self.goals.sys[j].contains(s) && self.region.cpre_winning.contains(s)
    }

    /// Pick successors inside `primary`, falling back to `primary ∪ fallback`.
    fn choose(
        &self,
        edges: &NodeEdges,
        layers: &GoalLayers,
        primary: &NodeSet,
        fallback: Option<&NodeSet>,
    ) -> Option<Vec<(Valuation, NodeId)>> {
        if edges.is_env_deadlock() {
            return Some(Vec::new());
        }
        let in_primary = |t: NodeId| primary.contains(t);
        let in_either = |t: NodeId| primary.contains(t) || fallback.is_some_and(|f| f.contains(t));
        match self.semantics {
            GameSemantics::Mealy => edges
                .env_inputs
                .iter()
                .enumerate()
                .map(|(r, &input)| {
                    best_in_row(edges.row(r), layers, in_primary)
                        .or_else(|| best_in_row(edges.row(r), layers, in_either))
                        .map(|t| (input, t))
                })
                .collect(),
            GameSemantics::Moore => {
                let m = best_uniform_move(edges, layers, in_primary)
                    .or_else(|| best_uniform_move(edges, layers, in_either))?;
                edges
                    .env_inputs
                    .iter()
                    .enumerate()
                    .map(|(r, &input)| edges.successor(r, m).map(|t| (input, t)))
                    .collect()
            }
        }
    }
}

/// Successor with the smallest rank, then smallest move index.
fn best_in_row(
    row: &[Option<NodeId>],
    layers: &GoalLayers,
    accept: impl Fn(NodeId) -> bool,
) -> Option<NodeId> {
    row.iter()
        .enumerate()
        .filter_map(|(m, t)| t.filter(|&t| accept(t)).map(|t| (m, t)))
        .min_by_key(|&(m, t)| (layers.rank(t).unwrap_or(UNRANKED), m))
        .map(|(_, t)| t)
}

/// Move whose successors are accepted for every input, by worst successor
/// rank then move index.
fn best_uniform_move(
    edges: &NodeEdges,
    layers: &GoalLayers,
    accept: impl Fn(NodeId) -> bool,
) -> Option<usize> {
    let inputs = edges.env_inputs.len();
    (0..edges.num_moves())
        .filter_map(|m| {
            let mut worst = Rank {
                layer: 0,
                env_goal: 0,
            };
            for r in 0..inputs {
                let t = edges.successor(r, m).filter(|&t| accept(t))?;
                worst = worst.max(layers.rank(t).unwrap_or(UNRANKED));
            }
            Some((worst, m))
        })
        .min()
        .map(|(_, m)| m)
}
