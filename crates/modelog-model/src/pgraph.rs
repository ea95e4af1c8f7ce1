//! The partition graph and its read-only accessors.

use indexmap::{IndexMap, IndexSet};

use modelog_invariants::{CheckableGraph, TemporalInvariant};
use modelog_trace::{EventId, EventType, RelationId, TraceGraph};

use crate::ops::{ModelError, ModelResult};
use crate::partition::{Partition, PartitionId};

/// A quotient of the trace graph: every concrete event belongs to exactly
/// one live partition, and partition transitions are derived from member
/// successor sets on demand.
#[derive(Debug, Clone)]
pub struct PartitionGraph<'g> {
    trace: &'g TraceGraph,
    pub(crate) parts: IndexMap<PartitionId, Partition>,
    /// Owning partition per event, indexed by event id.
    pub(crate) event_part: Vec<PartitionId>,
    pub(crate) next_id: u32,
    initial: PartitionId,
    terminal: PartitionId,
    invariants: Vec<TemporalInvariant>,
}

impl<'g> PartitionGraph<'g> {
    /// Builds the initial quotient: one partition per distinct event type,
    /// plus one partition per sentinel.
    pub fn new(trace: &'g TraceGraph, invariants: Vec<TemporalInvariant>) -> Self {
        let mut by_type: IndexMap<EventType, IndexSet<EventId>> = IndexMap::new();
        for id in trace.event_ids() {
            let ty = trace.event(id).event_type().clone();
            by_type.entry(ty).or_default().insert(id);
        }

        let mut parts = IndexMap::new();
        let mut event_part = vec![PartitionId(0); trace.len()];
        let mut initial = PartitionId(0);
        let mut terminal = PartitionId(0);
        let mut next_id = 0u32;
        for (ty, events) in by_type {
            let pid = PartitionId(next_id);
            next_id += 1;
            if ty.is_initial() {
                initial = pid;
            } else if ty.is_terminal() {
                terminal = pid;
            }
            for &e in &events {
                event_part[e.index()] = pid;
            }
            parts.insert(pid, Partition::new(ty, events));
        }

        PartitionGraph {
            trace,
            parts,
            event_part,
            next_id,
            initial,
            terminal,
            invariants,
        }
    }

    pub fn trace_graph(&self) -> &'g TraceGraph {
        self.trace
    }

    pub fn invariants(&self) -> &[TemporalInvariant] {
        &self.invariants
    }

    pub fn initial(&self) -> PartitionId {
        self.initial
    }

    pub fn terminal(&self) -> PartitionId {
        self.terminal
    }

    /// Number of live partitions, sentinels included.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn is_live(&self, id: PartitionId) -> bool {
        self.parts.contains_key(&id)
    }

    /// A snapshot of the live partition ids, in insertion order.
    pub fn partition_ids(&self) -> Vec<PartitionId> {
        self.parts.keys().copied().collect()
    }

    /// The live partition with this id. Panics on a dead id; engines only
    /// hold ids taken from the current graph.
    pub fn partition(&self, id: PartitionId) -> &Partition {
        &self.parts[&id]
    }

    pub fn get(&self, id: PartitionId) -> Option<&Partition> {
        self.parts.get(&id)
    }

    pub fn partition_of(&self, event: EventId) -> PartitionId {
        self.event_part[event.index()]
    }

    /// Derived per-relation outgoing transitions of a partition.
    pub fn successors(&self, id: PartitionId, relation: RelationId) -> IndexSet<PartitionId> {
        let mut out = IndexSet::new();
        for &e in self.parts[&id].events() {
            for &s in self.trace.successors(e, relation) {
                out.insert(self.partition_of(s));
            }
        }
        out
    }

    /// Members of `id` with at least one `relation`-successor inside
    /// `target`; the outgoing-based split candidate set.
    pub fn transition_events(
        &self,
        id: PartitionId,
        relation: RelationId,
        target: PartitionId,
    ) -> IndexSet<EventId> {
        self.parts[&id]
            .events()
            .iter()
            .copied()
            .filter(|&e| {
                self.trace
                    .successors(e, relation)
                    .iter()
                    .any(|&s| self.partition_of(s) == target)
            })
            .collect()
    }

    /// Members of `target` reached from `source` under `relation`; the
    /// incoming-based split candidate set.
    pub fn events_reached_from(
        &self,
        source: PartitionId,
        relation: RelationId,
        target: PartitionId,
    ) -> IndexSet<EventId> {
        let mut out = IndexSet::new();
        for &e in self.parts[&source].events() {
            for &s in self.trace.successors(e, relation) {
                if self.partition_of(s) == target {
                    out.insert(s);
                }
            }
        }
        out
    }

    /// Verifies that the partitions form a strict covering, non-overlapping
    /// quotient of the concrete events.
    pub fn check_sanity(&self) -> ModelResult<()> {
        let mut seen = 0usize;
        for (&id, part) in &self.parts {
            if part.is_empty() {
                return Err(ModelError::CorruptQuotient {
                    detail: format!("partition {id:?} is empty"),
                });
            }
            for &e in part.events() {
                if self.trace.event(e).event_type() != part.event_type() {
                    return Err(ModelError::CorruptQuotient {
                        detail: format!("event {e:?} does not match the type of {id:?}"),
                    });
                }
                if self.event_part[e.index()] != id {
                    return Err(ModelError::CorruptQuotient {
                        detail: format!("event {e:?} is mapped outside {id:?}"),
                    });
                }
                seen += 1;
            }
        }
        if seen != self.trace.len() {
            return Err(ModelError::CorruptQuotient {
                detail: format!(
                    "partitions cover {seen} of {} events",
                    self.trace.len()
                ),
            });
        }
        Ok(())
    }
}

impl CheckableGraph for PartitionGraph<'_> {
    type Node = PartitionId;

    fn initial(&self) -> PartitionId {
        self.initial
    }

    fn terminal(&self) -> PartitionId {
        self.terminal
    }

    fn node_type(&self, node: PartitionId) -> EventType {
        self.parts[&node].event_type().clone()
    }

    fn successors(&self, node: PartitionId, relation: RelationId) -> Vec<PartitionId> {
        PartitionGraph::successors(self, node, relation)
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_quotient_groups_by_type() {
        let mut trace = TraceGraph::new();
        trace.add_trace(["a", "b", "a"]);
        trace.add_trace(["a", "c"]);
        let graph = PartitionGraph::new(&trace, Vec::new());
        // INITIAL, TERMINAL, a, b, c
        assert_eq!(graph.len(), 5);
        graph.check_sanity().unwrap();

        let a_part = graph.partition_of(
            trace
                .event_ids()
                .find(|&e| *trace.event(e).event_type() == EventType::event("a"))
                .unwrap(),
        );
        assert_eq!(graph.partition(a_part).len(), 3);
    }

    #[test]
    fn derived_transitions_follow_members() {
        let mut trace = TraceGraph::new();
        let ids = trace.add_trace(["a", "b"]);
        trace.add_trace(["a", "c"]);
        let graph = PartitionGraph::new(&trace, Vec::new());
        let t = trace.time_relation();
        let a_part = graph.partition_of(ids[0]);
        let succs = graph.successors(a_part, t);
        // a leads to both b and c across the two traces.
        assert_eq!(succs.len(), 2);
        assert_eq!(
            graph.transition_events(a_part, t, graph.partition_of(ids[1])),
            IndexSet::from([ids[0]])
        );
    }
}
