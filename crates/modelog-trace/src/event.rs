//! Event types and immutable concrete events.

use indexmap::IndexSet;
use std::fmt;
use std::sync::Arc;

use crate::graph::RelationId;

/// The label classifying an event. The two sentinel variants mark the
/// synthetic start and end nodes of a trace graph and never occur in input
/// traces.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    Initial,
    Terminal,
    Event(Arc<str>),
}

impl EventType {
    pub fn event(label: impl AsRef<str>) -> Self {
        EventType::Event(Arc::from(label.as_ref()))
    }

    pub fn is_initial(&self) -> bool {
        matches!(self, EventType::Initial)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::Terminal)
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, EventType::Initial | EventType::Terminal)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Initial => write!(f, "INITIAL"),
            EventType::Terminal => write!(f, "TERMINAL"),
            EventType::Event(label) => write!(f, "{label}"),
        }
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Identifies a concrete event within its trace graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub(crate) u32);

impl EventId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Identifies one ordered execution (a trace) within the graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId(pub(crate) u32);

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// An observed occurrence within one trace. Immutable once the trace graph
/// is built; successor sets are indexed by registered relation.
#[derive(Debug, Clone)]
pub struct EventNode {
    pub(crate) ty: EventType,
    pub(crate) trace: TraceId,
    pub(crate) succs: Vec<IndexSet<EventId>>,
}

impl EventNode {
    pub fn event_type(&self) -> &EventType {
        &self.ty
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace
    }

    /// The event's direct successors under one relation.
    pub fn successors(&self, relation: RelationId) -> &IndexSet<EventId> {
        &self.succs[relation.index()]
    }
}
