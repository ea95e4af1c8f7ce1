//! Transactional split and merge operations with exact inverses.
//!
//! `apply` is the only code path that alters partition membership. Applying
//! an operation validates it against the live graph and returns the inverse
//! operation; applying the inverse restores the prior graph exactly, same
//! partition ids, same memberships, and therefore the same derived
//! transitions.

use indexmap::IndexSet;
use thiserror::Error;

use modelog_trace::EventId;

use crate::partition::{Partition, PartitionId};
use crate::pgraph::PartitionGraph;

/// Partition graph consistency error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("split of {partition:?} has fewer than two parts")]
    TrivialSplit { partition: PartitionId },

    #[error("split of {partition:?} has an empty part")]
    EmptySplitPart { partition: PartitionId },

    #[error("split parts do not exactly cover partition {partition:?}")]
    SplitNotCovering { partition: PartitionId },

    #[error("cannot merge partition {partition:?} with itself")]
    SelfMerge { partition: PartitionId },

    #[error("cannot merge partitions {keep:?} and {absorb:?} of different event types")]
    MergeTypeMismatch {
        keep: PartitionId,
        absorb: PartitionId,
    },

    #[error("no live partition {partition:?}")]
    DeadPartition { partition: PartitionId },

    #[error("partition quotient corrupted: {detail}")]
    CorruptQuotient { detail: String },
}

pub type ModelResult<T> = Result<T, ModelError>;

/// One part of a split: the events it receives and, when the part restores
/// a previously merged partition, the id it must come back under. The first
/// part of a split always keeps the split partition's id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPart {
    pub id: Option<PartitionId>,
    pub events: IndexSet<EventId>,
}

/// Divides one partition into two or more non-empty parts that exactly
/// cover it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOp {
    target: PartitionId,
    parts: Vec<SplitPart>,
}

impl SplitOp {
    pub fn new(target: PartitionId, parts: Vec<SplitPart>) -> Self {
        SplitOp { target, parts }
    }

    /// The binary candidate split separating `fulfills` from the rest of
    /// `partition`'s events. `None` when the separation is degenerate (no
    /// event, or every event, fulfills), matching the validity rules.
    pub fn separating(
        partition: &Partition,
        target: PartitionId,
        fulfills: &IndexSet<EventId>,
    ) -> Option<SplitOp> {
        let fulfills: IndexSet<EventId> = partition
            .events()
            .iter()
            .copied()
            .filter(|e| fulfills.contains(e))
            .collect();
        let rest: IndexSet<EventId> = partition
            .events()
            .iter()
            .copied()
            .filter(|e| !fulfills.contains(e))
            .collect();
        if fulfills.is_empty() || rest.is_empty() {
            return None;
        }
        Some(SplitOp {
            target,
            parts: vec![
                SplitPart {
                    id: None,
                    events: fulfills,
                },
                SplitPart {
                    id: None,
                    events: rest,
                },
            ],
        })
    }

    pub fn target(&self) -> PartitionId {
        self.target
    }

    pub fn parts(&self) -> &[SplitPart] {
        &self.parts
    }

    /// Refines this split by another split of the same partition: the new
    /// parts are the non-empty pairwise intersections. Coalesces several
    /// binary splits into one multi-way split.
    pub fn incorporate(&mut self, other: &SplitOp) {
        debug_assert_eq!(self.target, other.target, "incorporated split targets differ");
        let mut refined = Vec::new();
        for mine in &self.parts {
            for theirs in &other.parts {
                let events: IndexSet<EventId> = mine
                    .events
                    .iter()
                    .copied()
                    .filter(|e| theirs.events.contains(e))
                    .collect();
                if !events.is_empty() {
                    refined.push(SplitPart { id: None, events });
                }
            }
        }
        self.parts = refined;
    }

    fn validate(&self, graph: &PartitionGraph<'_>) -> ModelResult<()> {
        let target = graph
            .get(self.target)
            .ok_or(ModelError::DeadPartition {
                partition: self.target,
            })?;
        if self.parts.len() < 2 {
            return Err(ModelError::TrivialSplit {
                partition: self.target,
            });
        }
        let mut union: IndexSet<EventId> = IndexSet::new();
        let mut total = 0usize;
        for part in &self.parts {
            if part.events.is_empty() {
                return Err(ModelError::EmptySplitPart {
                    partition: self.target,
                });
            }
            total += part.events.len();
            union.extend(part.events.iter().copied());
        }
        // Exact cover: no overlap between parts and nothing outside the
        // target's current membership.
        if total != union.len() || union != *target.events() {
            return Err(ModelError::SplitNotCovering {
                partition: self.target,
            });
        }
        Ok(())
    }
}

/// Merges one or more partitions into `keep`, unioning their event sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOp {
    keep: PartitionId,
    absorb: Vec<PartitionId>,
}

impl MergeOp {
    pub fn new(keep: PartitionId, absorb: PartitionId) -> Self {
        MergeOp {
            keep,
            absorb: vec![absorb],
        }
    }

    pub fn multi(keep: PartitionId, absorb: Vec<PartitionId>) -> Self {
        MergeOp { keep, absorb }
    }

    pub fn keep(&self) -> PartitionId {
        self.keep
    }

    pub fn absorb(&self) -> &[PartitionId] {
        &self.absorb
    }
}

/// A described transformation of the partition set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphOp {
    Split(SplitOp),
    Merge(MergeOp),
}

impl PartitionGraph<'_> {
    /// Applies an operation and returns its exact inverse. All partition
    /// mutation goes through here.
    pub fn apply(&mut self, op: GraphOp) -> ModelResult<GraphOp> {
        match op {
            GraphOp::Split(split) => self.apply_split(split).map(GraphOp::Merge),
            GraphOp::Merge(merge) => self.apply_merge(merge).map(GraphOp::Split),
        }
    }

    fn apply_split(&mut self, op: SplitOp) -> ModelResult<MergeOp> {
        op.validate(self)?;
        let ty = self.parts[&op.target].event_type().clone();
        let mut parts = op.parts.into_iter();
        // Unwrap is fine: validate guarantees at least two parts.
        let head = parts.next().expect("validated split has parts");

        let mut absorb = Vec::new();
        for part in parts {
            let id = match part.id {
                Some(id) => {
                    debug_assert!(!self.parts.contains_key(&id), "restored id is live");
                    id
                }
                None => {
                    let id = PartitionId(self.next_id);
                    self.next_id += 1;
                    id
                }
            };
            for &e in &part.events {
                self.event_part[e.index()] = id;
            }
            self.parts.insert(id, Partition::new(ty.clone(), part.events));
            absorb.push(id);
        }
        // The first part keeps the target id; only its membership shrinks.
        for &e in &head.events {
            self.event_part[e.index()] = op.target;
        }
        self.parts[&op.target].events = head.events;

        Ok(MergeOp {
            keep: op.target,
            absorb,
        })
    }

    fn apply_merge(&mut self, op: MergeOp) -> ModelResult<SplitOp> {
        if !self.is_live(op.keep) {
            return Err(ModelError::DeadPartition {
                partition: op.keep,
            });
        }
        for &id in &op.absorb {
            if id == op.keep {
                return Err(ModelError::SelfMerge {
                    partition: op.keep,
                });
            }
            if !self.is_live(id) {
                return Err(ModelError::DeadPartition { partition: id });
            }
            if self.parts[&id].event_type() != self.parts[&op.keep].event_type() {
                return Err(ModelError::MergeTypeMismatch {
                    keep: op.keep,
                    absorb: id,
                });
            }
        }

        let mut parts = vec![SplitPart {
            id: None,
            events: self.parts[&op.keep].events().clone(),
        }];
        for &id in &op.absorb {
            let absorbed = self
                .parts
                .shift_remove(&id)
                .ok_or(ModelError::DeadPartition { partition: id })?;
            for &e in absorbed.events() {
                self.event_part[e.index()] = op.keep;
            }
            self.parts[&op.keep].events.extend(absorbed.events().iter().copied());
            parts.push(SplitPart {
                id: Some(id),
                events: absorbed.events,
            });
        }

        Ok(SplitOp {
            target: op.keep,
            parts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelog_trace::TraceGraph;

    fn two_trace_graph() -> TraceGraph {
        let mut trace = TraceGraph::new();
        trace.add_trace(["a", "b"]);
        trace.add_trace(["a", "c"]);
        trace
    }

    fn a_partition(graph: &PartitionGraph<'_>) -> PartitionId {
        *graph
            .partition_ids()
            .iter()
            .find(|&&id| {
                *graph.partition(id).event_type() == modelog_trace::EventType::event("a")
            })
            .expect("a-partition exists")
    }

    #[test]
    fn split_then_inverse_restores_graph() {
        let trace = two_trace_graph();
        let mut graph = PartitionGraph::new(&trace, Vec::new());
        let before = graph.clone();
        let a = a_partition(&graph);
        let first = *graph.partition(a).events().first().unwrap();

        let split = SplitOp::separating(graph.partition(a), a, &IndexSet::from([first]))
            .expect("proper two-way split");
        let inverse = graph.apply(GraphOp::Split(split)).unwrap();
        assert_eq!(graph.len(), before.len() + 1);
        graph.check_sanity().unwrap();

        let redo = graph.apply(inverse).unwrap();
        assert_eq!(graph.parts, before.parts);
        assert_eq!(graph.event_part, before.event_part);
        // The round trip hands back a split equivalent to the one applied.
        assert!(matches!(redo, GraphOp::Split(_)));
    }

    #[test]
    fn merge_then_inverse_restores_ids() {
        let trace = two_trace_graph();
        let mut graph = PartitionGraph::new(&trace, Vec::new());
        let a = a_partition(&graph);
        let first = *graph.partition(a).events().first().unwrap();
        let split = SplitOp::separating(graph.partition(a), a, &IndexSet::from([first])).unwrap();
        let GraphOp::Merge(merge) = graph.apply(GraphOp::Split(split)).unwrap() else {
            panic!("split inverse must be a merge");
        };
        let split_off = merge.absorb()[0];
        let before = graph.clone();

        let inverse = graph.apply(GraphOp::Merge(merge)).unwrap();
        assert!(!graph.is_live(split_off));
        let restored = graph.apply(inverse).unwrap();
        assert!(graph.is_live(split_off));
        assert_eq!(graph.parts, before.parts);
        assert_eq!(graph.event_part, before.event_part);
        assert!(matches!(restored, GraphOp::Merge(_)));
    }

    #[test]
    fn degenerate_separations_are_rejected() {
        let trace = two_trace_graph();
        let graph = PartitionGraph::new(&trace, Vec::new());
        let a = a_partition(&graph);
        let all = graph.partition(a).events().clone();
        assert!(SplitOp::separating(graph.partition(a), a, &all).is_none());
        assert!(SplitOp::separating(graph.partition(a), a, &IndexSet::new()).is_none());
    }

    #[test]
    fn invalid_splits_are_rejected_before_mutation() {
        let trace = two_trace_graph();
        let mut graph = PartitionGraph::new(&trace, Vec::new());
        let before = graph.clone();
        let a = a_partition(&graph);
        let events = graph.partition(a).events().clone();

        let empty_part = SplitOp::new(
            a,
            vec![
                SplitPart { id: None, events: events.clone() },
                SplitPart { id: None, events: IndexSet::new() },
            ],
        );
        assert_eq!(
            graph.apply(GraphOp::Split(empty_part)),
            Err(ModelError::EmptySplitPart { partition: a })
        );

        let overlapping = SplitOp::new(
            a,
            vec![
                SplitPart { id: None, events: events.clone() },
                SplitPart { id: None, events },
            ],
        );
        assert_eq!(
            graph.apply(GraphOp::Split(overlapping)),
            Err(ModelError::SplitNotCovering { partition: a })
        );
        assert_eq!(graph.parts, before.parts);
    }

    #[test]
    fn self_merge_rejected() {
        let trace = two_trace_graph();
        let mut graph = PartitionGraph::new(&trace, Vec::new());
        let a = a_partition(&graph);
        assert_eq!(
            graph.apply(GraphOp::Merge(MergeOp::new(a, a))),
            Err(ModelError::SelfMerge { partition: a })
        );
    }

    #[test]
    fn incorporate_refines_to_intersections() {
        let mut trace = TraceGraph::new();
        trace.add_trace(["a", "b"]);
        trace.add_trace(["a", "c"]);
        trace.add_trace(["a", "d"]);
        let graph = PartitionGraph::new(&trace, Vec::new());
        let a = a_partition(&graph);
        let events: Vec<EventId> = graph.partition(a).events().iter().copied().collect();
        assert_eq!(events.len(), 3);

        let mut split =
            SplitOp::separating(graph.partition(a), a, &IndexSet::from([events[0]])).unwrap();
        let other = SplitOp::separating(
            graph.partition(a),
            a,
            &IndexSet::from([events[0], events[1]]),
        )
        .unwrap();
        split.incorporate(&other);
        // {e0} x {e0,e1} and {e1,e2} x {e0,e1}/{e2} -> three singletons.
        assert_eq!(split.parts().len(), 3);
        let mut graph = graph;
        graph.apply(GraphOp::Split(split)).unwrap();
        graph.check_sanity().unwrap();
    }
}
