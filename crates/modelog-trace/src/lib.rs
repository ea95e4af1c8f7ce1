//! Concrete events and trace graphs.
//!
//! A trace graph holds the immutable, fully-parsed input to model inference:
//! one node per observed event, wired by one or more named relations (at
//! minimum the total-order time relation), between a synthetic INITIAL and
//! TERMINAL sentinel.

pub mod closure;
pub mod event;
pub mod graph;

pub use closure::TransitiveClosure;
pub use event::{EventId, EventNode, EventType, TraceId};
pub use graph::{RelationId, TraceError, TraceGraph, TraceResult, TIME_RELATION};
