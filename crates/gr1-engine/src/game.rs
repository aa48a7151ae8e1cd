//! Explicit two-player game graph.
//!
//! A node is a transition-system state together with the environment and
//! system valuations that currently hold. From a node the environment first
//! picks an admissible input `x'`; the system answers with a move `(l', y')`
//! to a neighbouring state and a new system valuation. The successor node
//! `(l', x', y')` exists iff system safety holds over the transition.

use bitvec::prelude::*;
use gr1_ir::specification::{CompiledSpec, Player};
use gr1_ir::transition_system::{StateId, TransitionSystem};
use gr1_ir::valuation::{Snapshot, Valuation};
use indexmap::IndexSet;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use crate::budget::RunGuard;
use crate::pipeline::SynthesisError;

/// Dense node identifier, assigned in discovery order.
pub type NodeId = usize;

/// How often exploration polls the deadline and cancellation flag.
const GUARD_POLL_INTERVAL: usize = 1024;

/// When the system chooses its move relative to the environment input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum GameSemantics {
    /// The system observes the next environment input before moving.
    Mealy,
    /// The system commits to its move before the next input is revealed; the
    /// move must be good for every admissible input.
    #[default]
    Moore,
}

impl fmt::Display for GameSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameSemantics::Mealy => write!(f, "mealy"),
            GameSemantics::Moore => write!(f, "moore"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameNode {
    pub state: StateId,
    pub env: Valuation,
    pub sys: Valuation,
}

/// A system move: target transition-system state plus new system valuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysMove {
    pub state: StateId,
    pub sys: Valuation,
}

/// Outgoing edges of one node.
///
/// `succ` is row-major: one row per admissible input, one column per move of
/// the node's transition-system state.
#[derive(Debug, Clone, Default)]
pub struct NodeEdges {
    pub env_inputs: Vec<Valuation>,
    succ: Vec<Option<NodeId>>,
    width: usize,
}

impl NodeEdges {
    /// No admissible environment input: the environment is deadlocked.
    pub fn is_env_deadlock(&self) -> bool {
        self.env_inputs.is_empty()
    }

    pub fn row(&self, input: usize) -> &[Option<NodeId>] {
        let start = input * self.width;
        self.succ.get(start..start + self.width).unwrap_or(&[])
    }

    pub fn successor(&self, input: usize, mv: usize) -> Option<NodeId> {
        if mv >= self.width {
            return None;
        }
        self.succ.get(input * self.width + mv).copied().flatten()
    }

    pub fn num_moves(&self) -> usize {
        self.width
    }

    pub fn num_edges(&self) -> usize {
        self.succ.iter().filter(|s| s.is_some()).count()
    }

    /// The environment can move but no system answer is safe.
    pub fn is_stuck(&self) -> bool {
        !self.is_env_deadlock() && self.succ.iter().all(Option::is_none)
    }
}

/// Set of game nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSet(BitVec);

impl NodeSet {
    pub fn empty(len: usize) -> Self {
        NodeSet(BitVec::repeat(false, len))
    }

    pub fn full(len: usize) -> Self {
        NodeSet(BitVec::repeat(true, len))
    }

    pub fn from_predicate(len: usize, mut pred: impl FnMut(NodeId) -> bool) -> Self {
        let mut set = Self::empty(len);
        for id in 0..len {
            if pred(id) {
                set.insert(id);
            }
        }
        set
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.0.get(id).is_some_and(|b| *b)
    }

    pub fn insert(&mut self, id: NodeId) {
        if id < self.0.len() {
            self.0.set(id, true);
        }
    }

    pub fn len(&self) -> usize {
        self.0.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.0.not_any()
    }

    pub fn union_with(&mut self, other: &NodeSet) {
        for (a, b) in self.0.as_raw_mut_slice().iter_mut().zip(other.0.as_raw_slice()) {
            *a |= *b;
        }
    }

    pub fn intersect_with(&mut self, other: &NodeSet) {
        for (a, b) in self.0.as_raw_mut_slice().iter_mut().zip(other.0.as_raw_slice()) {
            *a &= *b;
        }
    }

    /// Remove every node of `other`.
    pub fn subtract(&mut self, other: &NodeSet) {
        for (a, b) in self.0.as_raw_mut_slice().iter_mut().zip(other.0.as_raw_slice()) {
            *a &= !*b;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.iter_ones()
    }
}

/// The explored game graph. Immutable once built.
#[derive(Debug, Clone)]
pub struct GameGraph {
    nodes: IndexSet<GameNode>,
    edges: Vec<NodeEdges>,
    labels: Vec<Valuation>,
    moves: Vec<Vec<SysMove>>,
    initial: Vec<NodeId>,
    env_initial: Vec<Valuation>,
    initial_states: Vec<StateId>,
    env_width: usize,
    sys_width: usize,
}

impl GameGraph {
    /// Explore every node reachable from the initial nodes.
    ///
    /// Initial nodes are all `(l, x, y)` with `l` an initial transition-system
    /// state, `x` satisfying env-init and `(l, x, y)` satisfying sys-init.
    pub(crate) fn build(
        ts: &TransitionSystem,
        spec: &CompiledSpec,
        max_nodes: usize,
        guard: &RunGuard,
    ) -> Result<Self, SynthesisError> {
        let env_width = spec.env_width();
        let sys_width = spec.sys_width();
        let env_all: Vec<Valuation> = Valuation::enumerate(env_width).collect();
        let sys_all: Vec<Valuation> = Valuation::enumerate(sys_width).collect();
        let labels: Vec<Valuation> = (0..ts.num_states()).map(|s| ts.label_valuation(s)).collect();
        let moves: Vec<Vec<SysMove>> = (0..ts.num_states())
            .map(|s| {
                ts.successors(s)
                    .iter()
                    .flat_map(|&t| sys_all.iter().map(move |&y| SysMove { state: t, sys: y }))
                    .collect()
            })
            .collect();

        let env_initial: Vec<Valuation> = env_all
            .iter()
            .copied()
            .filter(|&x| {
                spec.evaluate_init(
                    Player::Env,
                    &Snapshot::new(x, Valuation::EMPTY, Valuation::EMPTY),
                )
            })
            .collect();

        let mut graph = GameGraph {
            nodes: IndexSet::new(),
            edges: Vec::new(),
            labels,
            moves,
            initial: Vec::new(),
            env_initial,
            initial_states: ts.initial_states().iter().copied().collect(),
            env_width,
            sys_width,
        };

        let initial_states = graph.initial_states.clone();
        let env_initial = graph.env_initial.clone();
        for &l in &initial_states {
            for &x in &env_initial {
                for &y in &sys_all {
                    let snap = Snapshot::new(x, y, graph.labels[l]);
                    if spec.evaluate_init(Player::Sys, &snap) {
                        let id = graph.intern(GameNode { state: l, env: x, sys: y }, max_nodes)?;
                        graph.initial.push(id);
                    }
                }
            }
        }
        debug!(initial = graph.initial.len(), "seeded game graph");

        let mut next = 0;
        while next < graph.nodes.len() {
            if next % GUARD_POLL_INTERVAL == 0 {
                guard.check("game construction")?;
            }
            let edges = graph.expand(next, spec, &env_all, max_nodes)?;
            graph.edges.push(edges);
            next += 1;
        }

        info!(
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            "game graph constructed"
        );
        Ok(graph)
    }

    fn intern(&mut self, node: GameNode, max_nodes: usize) -> Result<NodeId, SynthesisError> {
        if let Some(id) = self.nodes.get_index_of(&node) {
            return Ok(id);
        }
        if self.nodes.len() >= max_nodes {
            return Err(SynthesisError::BudgetExceeded { max_nodes });
        }
        Ok(self.nodes.insert_full(node).0)
    }

    fn expand(
        &mut self,
        id: NodeId,
        spec: &CompiledSpec,
        env_all: &[Valuation],
        max_nodes: usize,
    ) -> Result<NodeEdges, SynthesisError> {
        let node = self.nodes[id];
        let current = self.snapshot_of(&node);
        let env_inputs: Vec<Valuation> = env_all
            .iter()
            .copied()
            .filter(|&x| {
                spec.evaluate_safety(
                    Player::Env,
                    &current,
                    &Snapshot::new(x, Valuation::EMPTY, Valuation::EMPTY),
                )
            })
            .collect();

        let width = self.moves[node.state].len();
        let mut succ = Vec::with_capacity(env_inputs.len() * width);
        for &x in &env_inputs {
            for mi in 0..width {
                let mv = self.moves[node.state][mi];
                let next = Snapshot::new(x, mv.sys, self.labels[mv.state]);
                if spec.evaluate_safety(Player::Sys, &current, &next) {
                    let target = GameNode {
                        state: mv.state,
                        env: x,
                        sys: mv.sys,
                    };
                    succ.push(Some(self.intern(target, max_nodes)?));
                } else {
                    succ.push(None);
                }
            }
        }
        Ok(NodeEdges {
            env_inputs,
            succ,
            width,
        })
    }

    fn snapshot_of(&self, node: &GameNode) -> Snapshot {
        Snapshot::new(node.env, node.sys, self.labels[node.state])
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.iter().map(NodeEdges::num_edges).sum()
    }

    pub fn node(&self, id: NodeId) -> Option<&GameNode> {
        self.nodes.get_index(id)
    }

    pub fn node_id(&self, node: &GameNode) -> Option<NodeId> {
        self.nodes.get_index_of(node)
    }

    pub fn snapshot(&self, id: NodeId) -> Snapshot {
        self.nodes
            .get_index(id)
            .map(|n| self.snapshot_of(n))
            .unwrap_or_default()
    }

    pub fn edges(&self, id: NodeId) -> &NodeEdges {
        &self.edges[id]
    }

    /// Moves available from transition-system state `state`, in column order.
    pub fn moves(&self, state: StateId) -> &[SysMove] {
        self.moves.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes satisfying env-init and sys-init, in discovery order.
    pub fn initial_nodes(&self) -> &[NodeId] {
        &self.initial
    }

    /// Environment valuations satisfying env-init, ascending.
    pub fn env_initial(&self) -> &[Valuation] {
        &self.env_initial
    }

    pub fn initial_states(&self) -> &[StateId] {
        &self.initial_states
    }

    pub fn env_width(&self) -> usize {
        self.env_width
    }

    pub fn sys_width(&self) -> usize {
        self.sys_width
    }

    /// Nodes satisfying `pred` on their snapshot.
    pub fn select(&self, mut pred: impl FnMut(&Snapshot) -> bool) -> NodeSet {
        NodeSet::from_predicate(self.num_nodes(), |id| pred(&self.snapshot(id)))
    }

    /// Controllable predecessor of `target`.
    ///
    /// Mealy: for every admissible input some move reaches `target`.
    /// Moore: some move reaches `target` for every admissible input.
    /// Environment-deadlocked nodes are always included.
    pub fn cpre(&self, target: &NodeSet, semantics: GameSemantics) -> NodeSet {
        NodeSet::from_predicate(self.num_nodes(), |id| {
            self.controllable(id, target, semantics)
        })
    }

    pub fn controllable(&self, id: NodeId, target: &NodeSet, semantics: GameSemantics) -> bool {
        let edges = &self.edges[id];
        if edges.is_env_deadlock() {
            return true;
        }
        let hits = |s: &Option<NodeId>| s.is_some_and(|t| target.contains(t));
        match semantics {
            GameSemantics::Mealy => {
                (0..edges.env_inputs.len()).all(|r| edges.row(r).iter().any(hits))
            }
            GameSemantics::Moore => (0..edges.num_moves()).any(|m| {
                (0..edges.env_inputs.len()).all(|r| hits(&edges.successor(r, m)))
            }),
        }
    }
}
