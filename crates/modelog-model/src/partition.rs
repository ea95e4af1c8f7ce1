//! Partitions: equivalence classes of concrete events.

use indexmap::IndexSet;
use std::fmt;

use modelog_trace::{EventId, EventType};

/// Identifies a partition in its graph. Ids are stable across rewinds: a
/// rewound operation restores the partitions it removed under their
/// original ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(pub(crate) u32);

impl fmt::Debug for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// A non-empty set of concrete events sharing one event type. Transitions
/// are derived from the members' successor sets, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub(crate) ty: EventType,
    pub(crate) events: IndexSet<EventId>,
}

impl Partition {
    pub(crate) fn new(ty: EventType, events: IndexSet<EventId>) -> Self {
        Partition { ty, events }
    }

    pub fn event_type(&self) -> &EventType {
        &self.ty
    }

    pub fn events(&self) -> &IndexSet<EventId> {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.ty, self.events.len())
    }
}
