//! The trace graph: concrete events wired by named relations.

use indexmap::{IndexMap, IndexSet};
use std::fmt;
use thiserror::Error;

use crate::event::{EventId, EventNode, EventType, TraceId};

/// Name of the default total-order relation every graph carries.
pub const TIME_RELATION: &str = "t";

/// Identifies a registered relation within its trace graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationId(pub(crate) u32);

impl RelationId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Trace construction error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraceError {
    #[error("relation '{name}' is already registered")]
    DuplicateRelation { name: String },

    #[error("no relation named '{name}'")]
    UnknownRelation { name: String },
}

pub type TraceResult<T> = Result<T, TraceError>;

/// A set of fully-parsed traces over a shared alphabet of event types,
/// bracketed by one INITIAL and one TERMINAL sentinel event.
///
/// Under the time relation, INITIAL points at the first event of every
/// trace and the last event of every trace points at TERMINAL.
#[derive(Debug, Clone)]
pub struct TraceGraph {
    events: Vec<EventNode>,
    relations: IndexMap<String, RelationId>,
    initial: EventId,
    terminal: EventId,
    num_traces: u32,
}

impl TraceGraph {
    pub fn new() -> Self {
        let mut relations = IndexMap::new();
        relations.insert(TIME_RELATION.to_owned(), RelationId(0));
        let sentinel = |ty: EventType| EventNode {
            ty,
            trace: TraceId(u32::MAX),
            succs: vec![IndexSet::new()],
        };
        TraceGraph {
            events: vec![
                sentinel(EventType::Initial),
                sentinel(EventType::Terminal),
            ],
            relations,
            initial: EventId(0),
            terminal: EventId(1),
            num_traces: 0,
        }
    }

    /// Registers a new named relation. Rejects duplicates; the graph is
    /// unaffected on error.
    pub fn register_relation(&mut self, name: &str) -> TraceResult<RelationId> {
        if self.relations.contains_key(name) {
            return Err(TraceError::DuplicateRelation {
                name: name.to_owned(),
            });
        }
        let id = RelationId(self.relations.len() as u32);
        self.relations.insert(name.to_owned(), id);
        for event in &mut self.events {
            event.succs.push(IndexSet::new());
        }
        Ok(id)
    }

    pub fn relation(&self, name: &str) -> TraceResult<RelationId> {
        self.relations
            .get(name)
            .copied()
            .ok_or_else(|| TraceError::UnknownRelation {
                name: name.to_owned(),
            })
    }

    pub fn time_relation(&self) -> RelationId {
        RelationId(0)
    }

    pub fn relation_name(&self, relation: RelationId) -> &str {
        self.relations
            .get_index(relation.index())
            .map(|(name, _)| name.as_str())
            .unwrap_or("?")
    }

    pub fn relation_ids(&self) -> impl Iterator<Item = RelationId> + '_ {
        self.relations.values().copied()
    }

    /// Appends one trace as a chain under the time relation, wiring it to
    /// the sentinels. Returns the ids of the created events in order.
    pub fn add_trace<'a>(&mut self, labels: impl IntoIterator<Item = &'a str>) -> Vec<EventId> {
        let trace = TraceId(self.num_traces);
        self.num_traces += 1;
        let num_relations = self.relations.len();
        let time = self.time_relation();

        let mut ids = Vec::new();
        for label in labels {
            let id = EventId(self.events.len() as u32);
            self.events.push(EventNode {
                ty: EventType::event(label),
                trace,
                succs: vec![IndexSet::new(); num_relations],
            });
            ids.push(id);
        }
        if let (Some(&first), Some(&last)) = (ids.first(), ids.last()) {
            let initial = self.initial;
            let terminal = self.terminal;
            self.link(time, initial, first);
            for pair in ids.windows(2) {
                self.link(time, pair[0], pair[1]);
            }
            self.link(time, last, terminal);
        }
        ids
    }

    /// Adds an edge under an additional relation. Part of trace
    /// construction; events are immutable once the graph is in use.
    pub fn add_relation_edge(&mut self, relation: RelationId, from: EventId, to: EventId) {
        self.link(relation, from, to);
    }

    fn link(&mut self, relation: RelationId, from: EventId, to: EventId) {
        self.events[from.index()].succs[relation.index()].insert(to);
    }

    pub fn initial(&self) -> EventId {
        self.initial
    }

    pub fn terminal(&self) -> EventId {
        self.terminal
    }

    pub fn event(&self, id: EventId) -> &EventNode {
        &self.events[id.index()]
    }

    pub fn event_ids(&self) -> impl Iterator<Item = EventId> {
        (0..self.events.len() as u32).map(EventId)
    }

    /// Number of events, sentinels included.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        // The sentinels are always present.
        self.events.len() == 2
    }

    pub fn num_traces(&self) -> usize {
        self.num_traces as usize
    }

    pub fn successors(&self, id: EventId, relation: RelationId) -> &IndexSet<EventId> {
        self.events[id.index()].successors(relation)
    }
}

impl Default for TraceGraph {
    fn default() -> Self {
        TraceGraph::new()
    }
}
