//! FSM simulation over a graph with join points.
//!
//! The walk carries one tracing state set per visited node, cloning state at
//! branches and merging it where paths rejoin. A node is re-explored only
//! when an arriving state populates a sub-state the node has not recorded
//! yet, which bounds the walk and makes it terminate on any graph.

use indexmap::IndexMap;
use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;
use tracing::debug;

use modelog_trace::{EventId, EventType, RelationId, TraceGraph};

use crate::history::HistoryArena;
use crate::invariant::{InvariantKind, TemporalInvariant};

/// The graph shape the checkers walk: a single initial and terminal node,
/// typed nodes, per-relation successors.
pub trait CheckableGraph {
    type Node: Copy + Eq + Hash + fmt::Debug;

    fn initial(&self) -> Self::Node;
    fn terminal(&self) -> Self::Node;
    fn node_type(&self, node: Self::Node) -> EventType;
    fn successors(&self, node: Self::Node, relation: RelationId) -> Vec<Self::Node>;
}

/// A violating path from initial to terminal, with the minimal sub-range
/// `[violation_start, violation_end]` proving the violation.
#[derive(Debug, Clone)]
pub struct CounterExamplePath<N> {
    pub invariant: TemporalInvariant,
    pub path: Vec<N>,
    pub violation_start: usize,
    pub violation_end: usize,
}

/// Checks one invariant over the graph. Returns a shortest-witness
/// counterexample path, or `None` when the invariant holds.
pub fn counterexample<G: CheckableGraph>(
    inv: &TemporalInvariant,
    graph: &G,
) -> Option<CounterExamplePath<G::Node>> {
    let relation = inv.relation();
    let mut arena = HistoryArena::new();
    let mut states: IndexMap<G::Node, crate::TracingStateSet> = IndexMap::new();

    let initial = graph.initial();
    let mut start = inv.new_checker();
    start.set_initial(initial, &graph.node_type(initial), &mut arena);
    states.insert(initial, start);

    let mut queue = VecDeque::new();
    queue.push_back(initial);

    while let Some(node) = queue.pop_front() {
        let state = states[&node].clone();
        for succ in graph.successors(node, relation) {
            let mut arrived = state.clone();
            arrived.transition(succ, &graph.node_type(succ), &mut arena);
            match states.get_mut(&succ) {
                Some(existing) => {
                    // Nothing new reachable from this arrival; prune.
                    if arrived.is_subset(existing) {
                        continue;
                    }
                    existing.merge_with(&arrived, &arena);
                    queue.push_back(succ);
                }
                None => {
                    states.insert(succ, arrived);
                    queue.push_back(succ);
                }
            }
        }
    }

    let terminal = states.get(&graph.terminal())?;
    let fail = terminal.fail_path()?;
    let path = arena.path(fail);
    debug!(invariant = %inv, len = path.len(), "counterexample found");

    let types: Vec<EventType> = path.iter().map(|&n| graph.node_type(n)).collect();
    let (violation_start, violation_end) = violation_bounds(inv, &types);
    Some(CounterExamplePath {
        invariant: inv.clone(),
        path,
        violation_start,
        violation_end,
    })
}

/// The first counterexample over any of `invariants`, in order.
pub fn first_counterexample<G: CheckableGraph>(
    invariants: &[TemporalInvariant],
    graph: &G,
) -> Option<CounterExamplePath<G::Node>> {
    invariants.iter().find_map(|inv| counterexample(inv, graph))
}

/// One representative counterexample per violated invariant.
pub fn all_counterexamples<G: CheckableGraph>(
    invariants: &[TemporalInvariant],
    graph: &G,
) -> Vec<CounterExamplePath<G::Node>> {
    invariants
        .iter()
        .filter_map(|inv| counterexample(inv, graph))
        .collect()
}

/// The minimal index span of `types` whose removal would satisfy the
/// invariant the path violates.
fn violation_bounds(inv: &TemporalInvariant, types: &[EventType]) -> (usize, usize) {
    let last = types.len().saturating_sub(1);
    match inv.kind() {
        // From the start through the first unpreceded `second`.
        InvariantKind::AlwaysPrecedes => {
            let end = types
                .iter()
                .position(|ty| ty == inv.second())
                .unwrap_or(last);
            (0, end)
        }
        // From the last unanswered `first` through the end of the path.
        InvariantKind::AlwaysFollowedBy => {
            let start = types.iter().rposition(|ty| ty == inv.first()).unwrap_or(0);
            (start, last)
        }
        // From an offending `first` through the first `second` after it.
        InvariantKind::NeverFollowedBy => {
            let mut last_first = None;
            for (i, ty) in types.iter().enumerate() {
                if ty == inv.first() {
                    last_first = Some(i);
                } else if ty == inv.second() {
                    if let Some(start) = last_first {
                        return (start, i);
                    }
                }
            }
            (0, last)
        }
    }
}

impl CheckableGraph for TraceGraph {
    type Node = EventId;

    fn initial(&self) -> EventId {
        TraceGraph::initial(self)
    }

    fn terminal(&self) -> EventId {
        TraceGraph::terminal(self)
    }

    fn node_type(&self, node: EventId) -> EventType {
        self.event(node).event_type().clone()
    }

    fn successors(&self, node: EventId, relation: RelationId) -> Vec<EventId> {
        TraceGraph::successors(self, node, relation)
            .iter()
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(kind: InvariantKind, a: &str, b: &str) -> TemporalInvariant {
        TemporalInvariant::new(
            kind,
            EventType::event(a),
            EventType::event(b),
            TraceGraph::new().time_relation(),
        )
    }

    #[test]
    fn trace_graph_afby_counterexample() {
        let mut g = TraceGraph::new();
        g.add_trace(["x", "y", "z"]);
        g.add_trace(["x", "u"]);
        let afby = inv(InvariantKind::AlwaysFollowedBy, "x", "z");
        let cex = counterexample(&afby, &g).expect("second trace violates x AFby z");
        let types: Vec<EventType> = cex.path.iter().map(|&e| g.node_type(e)).collect();
        assert_eq!(types[0], EventType::Initial);
        assert_eq!(*types.last().unwrap(), EventType::Terminal);
        assert!(types.contains(&EventType::event("x")));
        assert!(!types.contains(&EventType::event("z")));
        // Violation spans from the unanswered x to the terminal.
        assert_eq!(types[cex.violation_start], EventType::event("x"));
        assert_eq!(cex.violation_end, cex.path.len() - 1);
    }

    #[test]
    fn trace_graph_holds_when_satisfied() {
        let mut g = TraceGraph::new();
        g.add_trace(["x", "y", "z"]);
        let afby = inv(InvariantKind::AlwaysFollowedBy, "x", "z");
        assert!(counterexample(&afby, &g).is_none());
        let ap = inv(InvariantKind::AlwaysPrecedes, "x", "z");
        assert!(counterexample(&ap, &g).is_none());
    }

    #[test]
    fn ap_counterexample_bounds() {
        let mut g = TraceGraph::new();
        g.add_trace(["y", "u", "x"]);
        let ap = inv(InvariantKind::AlwaysPrecedes, "x", "u");
        let cex = counterexample(&ap, &g).expect("u arrives before x");
        assert_eq!(cex.violation_start, 0);
        let types: Vec<EventType> = cex.path.iter().map(|&e| g.node_type(e)).collect();
        assert_eq!(types[cex.violation_end], EventType::event("u"));
    }

    #[test]
    fn nfby_counterexample_bounds() {
        let mut g = TraceGraph::new();
        g.add_trace(["a", "c", "b", "b"]);
        let nfby = inv(InvariantKind::NeverFollowedBy, "a", "b");
        let cex = counterexample(&nfby, &g).expect("a is followed by b");
        let types: Vec<EventType> = cex.path.iter().map(|&e| g.node_type(e)).collect();
        assert_eq!(types[cex.violation_start], EventType::event("a"));
        assert_eq!(types[cex.violation_end], EventType::event("b"));
        // Minimal range ends at the first offending b.
        assert_eq!(cex.violation_end, cex.violation_start + 2);
    }

    #[test]
    fn shortest_counterexample_preferred_at_joins() {
        // Two violating traces of different lengths; the reported witness
        // follows the shorter one.
        let mut g = TraceGraph::new();
        g.add_trace(["x", "y", "y", "y", "u"]);
        g.add_trace(["x", "u"]);
        let ap = inv(InvariantKind::AlwaysPrecedes, "w", "u");
        let cex = counterexample(&ap, &g).expect("u never preceded by w");
        // INITIAL, x, u, TERMINAL
        assert_eq!(cex.path.len(), 4);
    }
}
