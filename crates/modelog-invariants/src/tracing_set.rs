//! Per-kind FSM simulation state with shortest-witness history chains.
//!
//! A tracing state set simulates one invariant forward over a path of nodes.
//! Each abstract sub-state is a slot holding the shortest history chain that
//! reaches it; an unpopulated slot means that sub-state is unreachable on
//! any path seen so far. Divergent paths carry independent clones and
//! rejoining paths combine slot-wise, keeping the shorter chain per slot.

use modelog_trace::EventType;

use crate::history::{HistoryArena, HistoryId};
use crate::invariant::{InvariantKind, TemporalInvariant};

/// Simulation state of one invariant checker, one variant per kind.
#[derive(Debug, Clone)]
pub enum TracingStateSet {
    AlwaysPrecedes(ApSet),
    AlwaysFollowedBy(AfbySet),
    NeverFollowedBy(NfbySet),
}

/// AlwaysPrecedes(a, b): fails once `b` is seen with no earlier `a`.
#[derive(Debug, Clone)]
pub struct ApSet {
    a: EventType,
    b: EventType,
    /// Neither type seen yet.
    neither: Option<HistoryId>,
    /// An `a` arrived first; the rest of the path is vacuously fine.
    first_a: Option<HistoryId>,
    /// A `b` arrived first: the failure state, absorbing.
    first_b: Option<HistoryId>,
}

/// AlwaysFollowedBy(a, b): fails when the path ends with an `a` still
/// unanswered by a later `b`.
#[derive(Debug, Clone)]
pub struct AfbySet {
    a: EventType,
    b: EventType,
    /// `a` seen more recently than `b` (the failing state at a final node).
    was_a: Option<HistoryId>,
    /// `b` seen more recently than `a`, or neither seen.
    was_b: Option<HistoryId>,
}

/// NeverFollowedBy(a, b): fails once some `a` has a later `b`.
#[derive(Debug, Clone)]
pub struct NfbySet {
    a: EventType,
    b: EventType,
    /// No `a` seen yet.
    no_a: Option<HistoryId>,
    /// An `a` was seen; no `b` since then would be fine, forever.
    saw_a: Option<HistoryId>,
    /// An `a` followed by a `b`: the failure state, absorbing.
    fail: Option<HistoryId>,
}

impl TracingStateSet {
    pub fn new(inv: &TemporalInvariant) -> Self {
        let a = inv.first().clone();
        let b = inv.second().clone();
        match inv.kind() {
            InvariantKind::AlwaysPrecedes => TracingStateSet::AlwaysPrecedes(ApSet {
                a,
                b,
                neither: None,
                first_a: None,
                first_b: None,
            }),
            InvariantKind::AlwaysFollowedBy => TracingStateSet::AlwaysFollowedBy(AfbySet {
                a,
                b,
                was_a: None,
                was_b: None,
            }),
            InvariantKind::NeverFollowedBy => TracingStateSet::NeverFollowedBy(NfbySet {
                a,
                b,
                no_a: None,
                saw_a: None,
                fail: None,
            }),
        }
    }

    /// Initializes the state from the first node of a path.
    pub fn set_initial<N: Copy>(&mut self, node: N, ty: &EventType, arena: &mut HistoryArena<N>) {
        let root = arena.root(node);
        match self {
            TracingStateSet::AlwaysPrecedes(s) => {
                s.neither = None;
                s.first_a = None;
                s.first_b = None;
                if *ty == s.a {
                    s.first_a = Some(root);
                } else if *ty == s.b {
                    s.first_b = Some(root);
                } else {
                    s.neither = Some(root);
                }
            }
            TracingStateSet::AlwaysFollowedBy(s) => {
                let is_a = *ty == s.a;
                let is_b = *ty == s.b;
                s.was_a = None;
                s.was_b = None;
                if is_a {
                    s.was_a = Some(root);
                }
                if !is_a || is_b {
                    s.was_b = Some(root);
                }
            }
            TracingStateSet::NeverFollowedBy(s) => {
                s.no_a = None;
                s.saw_a = None;
                s.fail = None;
                if *ty == s.a {
                    s.saw_a = Some(root);
                } else {
                    s.no_a = Some(root);
                }
            }
        }
    }

    /// Consumes the next node of a path, moving chains between slots per the
    /// kind's transition table and extending every surviving chain.
    pub fn transition<N: Copy>(&mut self, node: N, ty: &EventType, arena: &mut HistoryArena<N>) {
        match self {
            TracingStateSet::AlwaysPrecedes(s) => {
                if *ty == s.a {
                    s.first_a = arena.prefer_shorter(s.neither, s.first_a);
                    s.neither = None;
                } else if *ty == s.b {
                    s.first_b = arena.prefer_shorter(s.neither, s.first_b);
                    s.neither = None;
                }
                s.neither = arena.extend(node, s.neither);
                s.first_a = arena.extend(node, s.first_a);
                s.first_b = arena.extend(node, s.first_b);
            }
            TracingStateSet::AlwaysFollowedBy(s) => {
                let is_a = *ty == s.a;
                let is_b = *ty == s.b;
                if is_a && is_b {
                    let to_b = arena.prefer_shorter(s.was_a, s.was_b);
                    s.was_a = arena.prefer_shorter(s.was_b, s.was_a);
                    s.was_b = to_b;
                } else if is_a {
                    s.was_a = arena.prefer_shorter(s.was_b, s.was_a);
                    s.was_b = None;
                } else if is_b {
                    s.was_b = arena.prefer_shorter(s.was_a, s.was_b);
                    s.was_a = None;
                }
                s.was_a = arena.extend(node, s.was_a);
                s.was_b = arena.extend(node, s.was_b);
            }
            TracingStateSet::NeverFollowedBy(s) => {
                // `b` first: a chain already past an `a` fails on this node.
                if *ty == s.b {
                    s.fail = arena.prefer_shorter(s.saw_a, s.fail);
                }
                if *ty == s.a {
                    s.saw_a = arena.prefer_shorter(s.no_a, s.saw_a);
                    s.no_a = None;
                }
                s.no_a = arena.extend(node, s.no_a);
                s.saw_a = arena.extend(node, s.saw_a);
                s.fail = arena.extend(node, s.fail);
            }
        }
    }

    /// Whether the current state denotes a violation at a final node.
    pub fn is_fail(&self) -> bool {
        self.fail_path().is_some()
    }

    /// The witness chain for the failure sub-state.
    pub fn fail_path(&self) -> Option<HistoryId> {
        match self {
            TracingStateSet::AlwaysPrecedes(s) => s.first_b,
            TracingStateSet::AlwaysFollowedBy(s) => s.was_a,
            TracingStateSet::NeverFollowedBy(s) => s.fail,
        }
    }

    /// Combines two states of the same kind where traversal paths rejoin,
    /// keeping the shorter chain per slot.
    pub fn merge_with<N: Copy>(&mut self, other: &TracingStateSet, arena: &HistoryArena<N>) {
        match (self, other) {
            (TracingStateSet::AlwaysPrecedes(s), TracingStateSet::AlwaysPrecedes(o)) => {
                s.neither = arena.prefer_shorter(o.neither, s.neither);
                s.first_a = arena.prefer_shorter(o.first_a, s.first_a);
                s.first_b = arena.prefer_shorter(o.first_b, s.first_b);
            }
            (TracingStateSet::AlwaysFollowedBy(s), TracingStateSet::AlwaysFollowedBy(o)) => {
                s.was_a = arena.prefer_shorter(o.was_a, s.was_a);
                s.was_b = arena.prefer_shorter(o.was_b, s.was_b);
            }
            (TracingStateSet::NeverFollowedBy(s), TracingStateSet::NeverFollowedBy(o)) => {
                s.no_a = arena.prefer_shorter(o.no_a, s.no_a);
                s.saw_a = arena.prefer_shorter(o.saw_a, s.saw_a);
                s.fail = arena.prefer_shorter(o.fail, s.fail);
            }
            _ => unreachable!("merged tracing sets of different kinds"),
        }
    }

    /// True iff every populated sub-state of `self` is populated in `other`;
    /// a subsumed state cannot reach any new sub-state and its traversal can
    /// stop.
    pub fn is_subset(&self, other: &TracingStateSet) -> bool {
        fn covers(mine: Option<HistoryId>, theirs: Option<HistoryId>) -> bool {
            mine.is_none() || theirs.is_some()
        }
        match (self, other) {
            (TracingStateSet::AlwaysPrecedes(s), TracingStateSet::AlwaysPrecedes(o)) => {
                covers(s.neither, o.neither)
                    && covers(s.first_a, o.first_a)
                    && covers(s.first_b, o.first_b)
            }
            (TracingStateSet::AlwaysFollowedBy(s), TracingStateSet::AlwaysFollowedBy(o)) => {
                covers(s.was_a, o.was_a) && covers(s.was_b, o.was_b)
            }
            (TracingStateSet::NeverFollowedBy(s), TracingStateSet::NeverFollowedBy(o)) => {
                covers(s.no_a, o.no_a) && covers(s.saw_a, o.saw_a) && covers(s.fail, o.fail)
            }
            _ => unreachable!("compared tracing sets of different kinds"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelog_trace::TraceGraph;

    fn inv(kind: InvariantKind, a: &str, b: &str) -> TemporalInvariant {
        TemporalInvariant::new(
            kind,
            EventType::event(a),
            EventType::event(b),
            TraceGraph::new().time_relation(),
        )
    }

    /// Runs a checker over a linear path of labels, nodes being positions.
    fn simulate(
        inv: &TemporalInvariant,
        labels: &[EventType],
    ) -> (TracingStateSet, HistoryArena<usize>) {
        let mut arena = HistoryArena::new();
        let mut set = inv.new_checker();
        set.set_initial(0, &labels[0], &mut arena);
        for (i, ty) in labels.iter().enumerate().skip(1) {
            set.transition(i, ty, &mut arena);
        }
        (set, arena)
    }

    fn tys(labels: &[&str]) -> Vec<EventType> {
        labels.iter().map(EventType::event).collect()
    }

    #[test]
    fn linear_simulation_agrees_with_satisfies() {
        let cases: &[&[&str]] = &[
            &["x", "y", "u"],
            &["u", "x"],
            &["x", "z", "x"],
            &["y"],
            &["x", "x", "z"],
        ];
        for kind in [
            InvariantKind::AlwaysPrecedes,
            InvariantKind::AlwaysFollowedBy,
            InvariantKind::NeverFollowedBy,
        ] {
            let inv = inv(kind, "x", "z");
            for case in cases {
                let labels = tys(case);
                let (set, _) = simulate(&inv, &labels);
                assert_eq!(
                    !set.is_fail(),
                    inv.satisfies(&labels),
                    "{inv} over {case:?}"
                );
            }
        }
    }

    #[test]
    fn afby_fail_path_ends_at_last_unanswered_a() {
        let afby = inv(InvariantKind::AlwaysFollowedBy, "a", "b");
        let labels = tys(&["a", "b", "a", "c"]);
        let (set, arena) = simulate(&afby, &labels);
        let fail = set.fail_path().unwrap();
        // Witness covers the whole path; the chain moved to was_a at index 2.
        assert_eq!(arena.path(fail), vec![0, 1, 2, 3]);
    }

    #[test]
    fn merge_keeps_shorter_witness_per_slot() {
        let nfby = inv(InvariantKind::NeverFollowedBy, "a", "b");
        let (mut long, mut arena) = {
            let labels = tys(&["a", "c", "c", "b"]);
            let mut arena = HistoryArena::new();
            let mut set = nfby.new_checker();
            set.set_initial(0usize, &labels[0], &mut arena);
            for (i, ty) in labels.iter().enumerate().skip(1) {
                set.transition(i, ty, &mut arena);
            }
            (set, arena)
        };
        let short = {
            let labels = tys(&["a", "b"]);
            let mut set = nfby.new_checker();
            set.set_initial(10usize, &labels[0], &mut arena);
            set.transition(11, &labels[1], &mut arena);
            set
        };
        assert!(long.is_fail() && short.is_fail());
        long.merge_with(&short, &arena);
        assert_eq!(arena.path(long.fail_path().unwrap()), vec![10, 11]);
    }

    #[test]
    fn subset_compares_populated_slots() {
        let ap = inv(InvariantKind::AlwaysPrecedes, "a", "b");
        let mut arena: HistoryArena<usize> = HistoryArena::new();
        let mut only_a = ap.new_checker();
        only_a.set_initial(0, &EventType::event("a"), &mut arena);
        let mut only_b = ap.new_checker();
        only_b.set_initial(1, &EventType::event("b"), &mut arena);

        assert!(only_a.is_subset(&only_a.clone()));
        assert!(!only_a.is_subset(&only_b));
        let mut both = only_a.clone();
        both.merge_with(&only_b, &arena);
        assert!(only_a.is_subset(&both));
        assert!(only_b.is_subset(&both));
        assert!(!both.is_subset(&only_a));
    }
}
