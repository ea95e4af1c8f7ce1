//! Temporal invariants and their FSM checkers.
//!
//! An invariant relates two event types under one of a closed set of binary
//! temporal kinds. Each invariant can be evaluated directly over a trace
//! (`satisfies`) or simulated over a graph with join points by a per-kind
//! tracing state set, which retains the shortest witness path to every
//! abstract state it reaches and yields length-minimal counterexamples.

pub mod check;
pub mod history;
pub mod invariant;
pub mod tracing_set;

pub use check::{
    all_counterexamples, counterexample, first_counterexample, CheckableGraph,
    CounterExamplePath,
};
pub use history::{HistoryArena, HistoryId, HistoryNode};
pub use invariant::{InvariantKind, TemporalInvariant};
pub use tracing_set::TracingStateSet;
