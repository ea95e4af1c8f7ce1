//! Coarsening: merge k-equivalent partitions while preserving invariants.
//!
//! Scans all unordered pairs of live partitions; the first k-equivalent,
//! non-blacklisted pair is merged speculatively. A merge that introduces a
//! counterexample is rewound and the pair blacklisted; a safe merge is kept
//! and the scan restarts over the smaller graph. Merges strictly shrink the
//! partition set and the blacklist is bounded by its square, so the loop
//! terminates.

use indexmap::IndexSet;
use tracing::{debug, info};

use modelog_invariants::{first_counterexample, TemporalInvariant};
use modelog_model::{GraphOp, MergeOp, ModelError, ModelResult, PartitionGraph, PartitionId};

/// Merges k-equivalent partitions of `graph` while every invariant in
/// `invariants` stays satisfied (`None` means unconstrained). Returns the
/// number of committed merges.
///
/// `on_step` is a diagnostic snapshot hook called after each committed
/// merge; elidable without changing results.
pub fn merge_partitions(
    graph: &mut PartitionGraph<'_>,
    invariants: Option<&[TemporalInvariant]>,
    k: usize,
    mut on_step: Option<&mut dyn FnMut(usize, &PartitionGraph<'_>)>,
) -> ModelResult<usize> {
    // Pairs whose merge violated an invariant; symmetric, stored normalized.
    let mut blacklist: IndexSet<(PartitionId, PartitionId)> = IndexSet::new();
    let mut committed = 0usize;

    'outer: loop {
        let partitions = graph.partition_ids();
        for &p in &partitions {
            if graph.partition(p).event_type().is_sentinel() {
                continue;
            }
            for &q in &partitions {
                if p == q
                    || blacklist.contains(&pair_key(p, q))
                    || !k_equivalent(graph, p, q, k)
                {
                    continue;
                }

                debug!(?p, ?q, "attempting merge");
                let before: IndexSet<PartitionId> = partitions.iter().copied().collect();
                let rewind = graph.apply(GraphOp::Merge(MergeOp::new(p, q)))?;

                let violation =
                    invariants.and_then(|invs| first_counterexample(invs, graph));
                match violation {
                    Some(cex) => {
                        debug!(?p, ?q, invariant = %cex.invariant, "merge violates invariant, rewinding");
                        blacklist.insert(pair_key(p, q));
                        graph.apply(rewind)?;
                        // The scan keeps iterating over the pre-merge
                        // snapshot, so the rewind must restore it exactly.
                        let after: IndexSet<PartitionId> =
                            graph.partition_ids().into_iter().collect();
                        if before != after {
                            return Err(ModelError::CorruptQuotient {
                                detail: format!(
                                    "partition set changed across rewound merge of {p:?} and {q:?}"
                                ),
                            });
                        }
                    }
                    None => {
                        committed += 1;
                        debug!(?p, ?q, partitions = graph.len(), "merge kept");
                        if let Some(on_step) = on_step.as_mut() {
                            on_step(committed, graph);
                        }
                        continue 'outer;
                    }
                }
            }
        }
        break;
    }

    info!(committed, partitions = graph.len(), "coarsening finished");
    Ok(committed)
}

/// Merges k-equivalent partitions without preserving any invariants.
pub fn k_reduce(graph: &mut PartitionGraph<'_>, k: usize) -> ModelResult<usize> {
    merge_partitions(graph, None, k, None)
}

fn pair_key(p: PartitionId, q: PartitionId) -> (PartitionId, PartitionId) {
    if p <= q {
        (p, q)
    } else {
        (q, p)
    }
}

/// Bounded-lookahead equivalence: same event type and, recursively to depth
/// `k`, matching per-relation successor behavior. Depth 0 compares the
/// immediate successor label sets.
fn k_equivalent(graph: &PartitionGraph<'_>, p: PartitionId, q: PartitionId, k: usize) -> bool {
    if graph.partition(p).event_type() != graph.partition(q).event_type() {
        return false;
    }
    for relation in graph.trace_graph().relation_ids() {
        let p_succs = graph.successors(p, relation);
        let q_succs = graph.successors(q, relation);
        if k == 0 {
            let p_labels: IndexSet<_> = p_succs
                .iter()
                .map(|&s| graph.partition(s).event_type().clone())
                .collect();
            let q_labels: IndexSet<_> = q_succs
                .iter()
                .map(|&s| graph.partition(s).event_type().clone())
                .collect();
            if p_labels != q_labels {
                return false;
            }
        } else {
            let covered = |from: &IndexSet<PartitionId>, to: &IndexSet<PartitionId>| {
                from.iter()
                    .all(|&a| to.iter().any(|&b| k_equivalent(graph, a, b, k - 1)))
            };
            if !covered(&p_succs, &q_succs) || !covered(&q_succs, &p_succs) {
                return false;
            }
        }
    }
    true
}
