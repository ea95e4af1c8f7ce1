//! Transitive closure of one relation, excluding the sentinels.
//!
//! A single dynamic-programming sweep: as each event's edges are processed,
//! the event is linked to everything its children already reach, and its own
//! reachable set is pushed up to every ancestor discovered so far. On the
//! acyclic relations produced by trace ingestion this is equivalent to
//! all-pairs reachability without a second pass.

use indexmap::{IndexMap, IndexSet};

use crate::event::EventId;
use crate::graph::{RelationId, TraceGraph};

/// Per-event strictly-reachable descendants under one named relation.
#[derive(Debug, Clone)]
pub struct TransitiveClosure {
    relation: RelationId,
    reachable: IndexMap<EventId, IndexSet<EventId>>,
}

impl TransitiveClosure {
    pub fn compute(graph: &TraceGraph, relation: RelationId) -> Self {
        let mut reachable: IndexMap<EventId, IndexSet<EventId>> = IndexMap::new();
        // Ancestors of each event discovered so far, so closure updates can
        // be propagated upward immediately.
        let mut parents: IndexMap<EventId, IndexSet<EventId>> = IndexMap::new();

        for m in graph.event_ids() {
            if graph.event(m).event_type().is_sentinel() {
                continue;
            }
            reachable.entry(m).or_default();

            for &child in graph.successors(m, relation) {
                if graph.event(child).event_type().is_sentinel() {
                    continue;
                }
                reachable[&m].insert(child);
                parents.entry(child).or_default().insert(m);

                // Everything the child already reaches, m reaches as well.
                let through_child: Vec<EventId> = reachable
                    .get(&child)
                    .map(|set| set.iter().copied().collect())
                    .unwrap_or_default();
                for n in through_child {
                    reachable[&m].insert(n);
                    parents.entry(n).or_default().insert(m);
                }
            }

            // Push m's finished reachable set to every known ancestor.
            let from_m: Vec<EventId> = reachable[&m].iter().copied().collect();
            let ancestors: Vec<EventId> = parents
                .get(&m)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default();
            for p in ancestors {
                for &n in &from_m {
                    reachable.entry(p).or_default().insert(n);
                    parents.entry(n).or_default().insert(p);
                }
            }
        }

        TransitiveClosure {
            relation,
            reachable,
        }
    }

    pub fn relation(&self) -> RelationId {
        self.relation
    }

    /// The events strictly reachable from `event`; non-reflexive.
    pub fn reachable(&self, event: EventId) -> impl Iterator<Item = EventId> + '_ {
        self.reachable
            .get(&event)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    pub fn is_reachable(&self, from: EventId, to: EventId) -> bool {
        self.reachable
            .get(&from)
            .is_some_and(|set| set.contains(&to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reach(tc: &TransitiveClosure, e: EventId) -> Vec<EventId> {
        let mut out: Vec<EventId> = tc.reachable(e).collect();
        out.sort();
        out
    }

    #[test]
    fn chain_closure() {
        let mut g = TraceGraph::new();
        let ids = g.add_trace(["a", "b", "c"]);
        let tc = TransitiveClosure::compute(&g, g.time_relation());
        assert_eq!(reach(&tc, ids[0]), vec![ids[1], ids[2]]);
        assert_eq!(reach(&tc, ids[1]), vec![ids[2]]);
        assert_eq!(reach(&tc, ids[2]), vec![]);
    }

    #[test]
    fn sentinels_excluded() {
        let mut g = TraceGraph::new();
        let ids = g.add_trace(["a"]);
        let tc = TransitiveClosure::compute(&g, g.time_relation());
        assert_eq!(reach(&tc, ids[0]), vec![]);
        assert_eq!(reach(&tc, g.initial()), vec![]);
        assert!(!tc.is_reachable(ids[0], g.terminal()));
    }

    #[test]
    fn diamond_closure() {
        // a -> b, a -> c, b -> d, c -> d under a secondary relation.
        let mut g = TraceGraph::new();
        let ids = g.add_trace(["a", "b", "c", "d"]);
        let rel = g.register_relation("fork").unwrap();
        g.add_relation_edge(rel, ids[0], ids[1]);
        g.add_relation_edge(rel, ids[0], ids[2]);
        g.add_relation_edge(rel, ids[1], ids[3]);
        g.add_relation_edge(rel, ids[2], ids[3]);
        let tc = TransitiveClosure::compute(&g, rel);
        assert_eq!(reach(&tc, ids[0]), vec![ids[1], ids[2], ids[3]]);
        assert_eq!(reach(&tc, ids[1]), vec![ids[3]]);
        assert_eq!(reach(&tc, ids[2]), vec![ids[3]]);
        assert_eq!(reach(&tc, ids[3]), vec![]);
    }

    #[test]
    fn traces_do_not_leak_into_each_other() {
        let mut g = TraceGraph::new();
        let t1 = g.add_trace(["a", "b"]);
        let t2 = g.add_trace(["c", "d"]);
        let tc = TransitiveClosure::compute(&g, g.time_relation());
        assert_eq!(reach(&tc, t1[0]), vec![t1[1]]);
        assert!(!tc.is_reachable(t1[0], t2[0]));
        assert!(!tc.is_reachable(t1[0], t2[1]));
    }
}
