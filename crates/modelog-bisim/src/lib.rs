//! Refinement and coarsening of partition graphs.
//!
//! The split loop refines an initial per-label quotient until every mined
//! invariant is satisfied; the merge loop then coarsens the result to a
//! minimal model that still satisfies them. Together they implement the
//! bisimulation-style inference pipeline.
//!
//! Both engines are deterministic for a fixed seed: every randomized choice
//! draws from the caller-supplied generator, never from ambient state.

pub mod coarsen;
pub mod refine;

pub use coarsen::{k_reduce, merge_partitions};
pub use refine::{split_partitions, RefineConfig, RefineError};
