//! Initial-node selection under the four quantification policies.

use gr1_ir::valuation::Valuation;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::game::{GameGraph, GameNode, NodeId};
use crate::solver::WinningRegion;

/// How the initial condition is quantified over system and environment
/// choices. Written `"\E \A"` etc. with the system quantifier first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Qinit {
    /// `\E \A`: one initial system choice must win for every admissible
    /// environment valuation.
    #[default]
    ExistsForall,
    /// `\A \E`: for every admissible environment valuation some system
    /// choice wins.
    ForallExists,
    /// `\A \A`: every node satisfying both init predicates must win.
    ForallForall,
    /// `\E \E`: some node satisfying both init predicates wins.
    ExistsExists,
}

impl fmt::Display for Qinit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Qinit::ExistsForall => "\\E \\A",
            Qinit::ForallExists => "\\A \\E",
            Qinit::ForallForall => "\\A \\A",
            Qinit::ExistsExists => "\\E \\E",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown initial-condition quantifier '{0}' (expected one of \\E \\A, \\A \\E, \\A \\A, \\E \\E)")]
pub struct ParseQinitError(pub String);

impl FromStr for Qinit {
    type Err = ParseQinitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = s.split_whitespace().collect();
        match words.as_slice() {
            ["\\E", "\\A"] => Ok(Qinit::ExistsForall),
            ["\\A", "\\E"] => Ok(Qinit::ForallExists),
            ["\\A", "\\A"] => Ok(Qinit::ForallForall),
            ["\\E", "\\E"] => Ok(Qinit::ExistsExists),
            _ => Err(ParseQinitError(s.to_string())),
        }
    }
}

/// Why no controller exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnrealizableReason {
    /// No node satisfies env-init and sys-init at an initial state.
    NoAdmissibleInitialNode,
    /// Every initial node has an admissible input but no safe answer.
    SafetyUnsatisfiableAtStart,
    /// Initial nodes exist but the policy's winning condition fails.
    NoWinningInitialNode,
}

impl fmt::Display for UnrealizableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnrealizableReason::NoAdmissibleInitialNode => {
                write!(f, "no initial node satisfies the initial conditions")
            }
            UnrealizableReason::SafetyUnsatisfiableAtStart => {
                write!(f, "system safety cannot be satisfied from any initial node")
            }
            UnrealizableReason::NoWinningInitialNode => {
                write!(f, "no initial node is winning for the system")
            }
        }
    }
}

/// Pick the controller's initial nodes, or explain why there are none.
pub fn select_initial(
    graph: &GameGraph,
    region: &WinningRegion,
    qinit: Qinit,
) -> Result<Vec<NodeId>, UnrealizableReason> {
    if graph.initial_nodes().is_empty() {
        return Err(UnrealizableReason::NoAdmissibleInitialNode);
    }
    let seeds = match qinit {
        Qinit::ExistsForall => exists_forall(graph, region),
        Qinit::ForallExists => forall_exists(graph, region),
        Qinit::ForallForall => {
            let all = graph.initial_nodes();
            all.iter()
                .all(|&n| region.contains(n))
                .then(|| all.to_vec())
        }
        Qinit::ExistsExists => graph
            .initial_nodes()
            .iter()
            .copied()
            .find(|&n| region.contains(n))
            .map(|n| vec![n]),
    };
    match seeds {
        Some(seeds) if !seeds.is_empty() => Ok(seeds),
        _ => Err(failure_reason(graph, region)),
    }
}

/// Candidate system choices `(initial state, sys valuation)` in order.
fn system_choices(graph: &GameGraph) -> impl Iterator<Item = (usize, Valuation)> + '_ {
    graph.initial_states().iter().flat_map(move |&l| {
        Valuation::enumerate(graph.sys_width()).map(move |y| (l, y))
    })
}

fn winning_node(graph: &GameGraph, region: &WinningRegion, l: usize, x: Valuation, y: Valuation) -> Option<NodeId> {
    graph
        .node_id(&GameNode {
            state: l,
            env: x,
            sys: y,
        })
        .filter(|&n| region.contains(n))
}

fn exists_forall(graph: &GameGraph, region: &WinningRegion) -> Option<Vec<NodeId>> {
    let env = graph.env_initial();
    system_choices(graph).find_map(|(l, y)| {
        env.iter()
            .map(|&x| winning_node(graph, region, l, x, y))
            .collect::<Option<Vec<_>>>()
    })
}

fn forall_exists(graph: &GameGraph, region: &WinningRegion) -> Option<Vec<NodeId>> {
    graph
        .env_initial()
        .iter()
        .map(|&x| system_choices(graph).find_map(|(l, y)| winning_node(graph, region, l, x, y)))
        .collect()
}

fn failure_reason(graph: &GameGraph, region: &WinningRegion) -> UnrealizableReason {
    let initial = graph.initial_nodes();
    let none_winning = initial.iter().all(|&n| !region.contains(n));
    if none_winning && initial.iter().all(|&n| graph.edges(n).is_stuck()) {
        UnrealizableReason::SafetyUnsatisfiableAtStart
    } else {
        UnrealizableReason::NoWinningInitialNode
    }
}
