//! Counterexample-guided refinement: split partitions until every invariant
//! holds over the partition graph.
//!
//! Each iteration finds one counterexample path per violated invariant,
//! localizes a split point on each path with the hot-set walk, speculatively
//! applies candidate splits to see which ones resolve their invariant, and
//! commits at most one (possibly multi-way) split per partition. Every
//! speculative trial is rewound through the operation's inverse before the
//! next trial runs.

use indexmap::{IndexMap, IndexSet};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::{debug, info};

use modelog_invariants::{all_counterexamples, counterexample, CounterExamplePath, TemporalInvariant};
use modelog_model::{GraphOp, ModelError, PartitionGraph, PartitionId, SplitOp};

/// Refinement failure.
#[derive(Debug, Error)]
pub enum RefineError {
    /// An iteration made zero progress while counterexamples remained. The
    /// invariant set cannot be satisfied by refining totally ordered traces,
    /// or the input is not totally ordered.
    #[error("could not satisfy invariants: {}", .unsatisfied.join(", "))]
    Unsatisfiable { unsatisfied: Vec<String> },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Options for the refinement loop.
pub struct RefineConfig<'cb> {
    /// Also propose splits keyed on which predecessor partition reaches the
    /// split point.
    pub incoming_split: bool,
    /// Outer-iteration cap, checked only between iterations. The loop
    /// returns normally when the cap is reached; the graph may still have
    /// counterexamples.
    pub max_steps: Option<usize>,
    /// Diagnostic snapshot hook, called after each committed step. Elidable
    /// without changing results.
    pub on_step: Option<Box<dyn FnMut(usize, &PartitionGraph<'_>) + 'cb>>,
}

impl Default for RefineConfig<'_> {
    fn default() -> Self {
        RefineConfig {
            incoming_split: true,
            max_steps: None,
            on_step: None,
        }
    }
}

/// Splits partitions until all of the graph's invariants are satisfied.
/// Returns the number of committed split steps.
///
/// Deterministic for a fixed `rng` seed; the seed affects which valid
/// sequence of splits is chosen, never whether the result satisfies the
/// invariants.
pub fn split_partitions(
    graph: &mut PartitionGraph<'_>,
    rng: &mut StdRng,
    mut config: RefineConfig<'_>,
) -> Result<usize, RefineError> {
    let invariants = graph.invariants().to_vec();
    let mut steps = 0usize;

    loop {
        if config.max_steps.is_some_and(|cap| steps >= cap) {
            info!(steps, "refinement stopped at step cap");
            return Ok(steps);
        }

        // Re-deriving the violated set from fresh counterexamples is
        // deliberate: one split can satisfy more invariants than the one it
        // was chosen for.
        let mut cexs = all_counterexamples(&invariants, graph);
        if cexs.is_empty() {
            info!(steps, partitions = graph.len(), "all invariants satisfied");
            return Ok(steps);
        }
        debug!(
            unsatisfied = cexs.len(),
            partitions = graph.len(),
            "refinement iteration"
        );

        cexs.shuffle(rng);
        let progressed = perform_split_step(graph, rng, &cexs, config.incoming_split, steps)?;
        if !progressed {
            return Err(RefineError::Unsatisfiable {
                unsatisfied: cexs.iter().map(|c| c.invariant.to_string()).collect(),
            });
        }
        steps += 1;
        if let Some(on_step) = config.on_step.as_mut() {
            on_step(steps, graph);
        }
    }
}

/// One refinement iteration over a fixed set of counterexamples. Returns
/// whether any split was committed.
fn perform_split_step(
    graph: &mut PartitionGraph<'_>,
    rng: &mut StdRng,
    cexs: &[CounterExamplePath<PartitionId>],
    incoming_split: bool,
    step: usize,
) -> Result<bool, RefineError> {
    // Splits that made some invariant satisfied, coalesced per partition so
    // each partition is split at most once per iteration.
    let mut splits_to_do: IndexMap<PartitionId, SplitOp> = IndexMap::new();
    let mut newly_satisfied: IndexSet<TemporalInvariant> = IndexSet::new();
    // First syntactically valid candidate, the forward-progress fallback.
    let mut arbitrary_split: Option<SplitOp> = None;

    for cex in cexs {
        let mut candidates = candidate_splits(graph, cex, incoming_split);
        candidates.shuffle(rng);

        for candidate in candidates {
            if arbitrary_split.is_none() {
                arbitrary_split = Some(candidate.clone());
            }
            if try_split(graph, &cex.invariant, candidate.clone())? {
                match splits_to_do.get_mut(&candidate.target()) {
                    Some(existing) => existing.incorporate(&candidate),
                    None => {
                        splits_to_do.insert(candidate.target(), candidate);
                    }
                }
                newly_satisfied.insert(cex.invariant.clone());
            }
        }
    }

    if splits_to_do.is_empty() {
        match arbitrary_split {
            None => {
                debug!(step, "no valid split available");
                Ok(false)
            }
            Some(split) => {
                info!(step, target = ?split.target(), "applying arbitrary split");
                graph.apply(GraphOp::Split(split))?;
                Ok(true)
            }
        }
    } else {
        for (_, split) in splits_to_do {
            debug!(step, target = ?split.target(), parts = split.parts().len(), "committing split");
            graph.apply(GraphOp::Split(split))?;
        }
        info!(
            step,
            resolved = newly_satisfied.len(),
            partitions = graph.len(),
            "committed resolving splits"
        );
        Ok(true)
    }
}

/// Speculatively applies `split`, re-checks `inv`, and rewinds. Returns
/// whether the split removed every counterexample for the invariant.
fn try_split(
    graph: &mut PartitionGraph<'_>,
    inv: &TemporalInvariant,
    split: SplitOp,
) -> Result<bool, RefineError> {
    let rewind = graph.apply(GraphOp::Split(split))?;
    let resolved = counterexample(inv, graph).is_none();
    graph.apply(rewind)?;
    Ok(resolved)
}

/// Candidate splits that could remove `cex` from the graph.
///
/// Walks the counterexample while tracking the hot set of concrete events
/// still consistent with the path prefix; where the hot set dies, the
/// previous partition conflates events with different futures and is the
/// split target.
fn candidate_splits(
    graph: &PartitionGraph<'_>,
    cex: &CounterExamplePath<PartitionId>,
    incoming_split: bool,
) -> Vec<SplitOp> {
    let relation = cex.invariant.relation();
    let trace = graph.trace_graph();

    let mut hot: IndexSet<_> = match cex.path.first() {
        Some(&first) => graph.partition(first).events().clone(),
        None => return Vec::new(),
    };
    let mut prev: Option<PartitionId> = None;
    let mut cur: Option<PartitionId> = None;
    let mut next: Option<PartitionId> = None;

    for &part in &cex.path {
        prev = cur;
        cur = next;
        next = Some(part);
        hot.retain(|&e| graph.partition(part).events().contains(&e));
        if hot.is_empty() {
            break;
        }
        hot = hot
            .iter()
            .flat_map(|&e| trace.successors(e, relation).iter().copied())
            .collect();
    }

    let (Some(cur), Some(next)) = (cur, next) else {
        return Vec::new();
    };

    let mut candidates = Vec::new();
    let outgoing = graph.transition_events(cur, relation, next);
    if let Some(split) = SplitOp::separating(graph.partition(cur), cur, &outgoing) {
        candidates.push(split);
    }
    if incoming_split {
        if let Some(prev) = prev {
            let reached = graph.events_reached_from(prev, relation, cur);
            if let Some(split) = SplitOp::separating(graph.partition(cur), cur, &reached) {
                candidates.push(split);
            }
        }
    }
    candidates
}
