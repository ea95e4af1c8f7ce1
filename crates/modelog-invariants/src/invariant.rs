//! Binary temporal invariants over event types.

use std::fmt;

use modelog_trace::{EventType, RelationId};

use crate::tracing_set::TracingStateSet;

/// The closed set of binary temporal relation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvariantKind {
    /// Every occurrence of `second` has an earlier occurrence of `first`.
    AlwaysPrecedes,
    /// Every occurrence of `first` has a later occurrence of `second`.
    AlwaysFollowedBy,
    /// No occurrence of `first` is ever followed by `second`.
    NeverFollowedBy,
}

impl InvariantKind {
    pub fn short_name(self) -> &'static str {
        match self {
            InvariantKind::AlwaysPrecedes => "AP",
            InvariantKind::AlwaysFollowedBy => "AFby",
            InvariantKind::NeverFollowedBy => "NFby",
        }
    }
}

/// A binary temporal invariant between two event types, checked along one
/// named relation. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemporalInvariant {
    kind: InvariantKind,
    first: EventType,
    second: EventType,
    relation: RelationId,
}

impl TemporalInvariant {
    pub fn new(
        kind: InvariantKind,
        first: EventType,
        second: EventType,
        relation: RelationId,
    ) -> Self {
        TemporalInvariant {
            kind,
            first,
            second,
            relation,
        }
    }

    pub fn kind(&self) -> InvariantKind {
        self.kind
    }

    pub fn first(&self) -> &EventType {
        &self.first
    }

    pub fn second(&self) -> &EventType {
        &self.second
    }

    pub fn relation(&self) -> RelationId {
        self.relation
    }

    /// A fresh FSM checker for this invariant's kind.
    pub fn new_checker(&self) -> TracingStateSet {
        TracingStateSet::new(self)
    }

    /// Evaluates the invariant over one ordered trace of event types.
    pub fn satisfies(&self, trace: &[EventType]) -> bool {
        match self.kind {
            InvariantKind::AlwaysPrecedes => {
                for ty in trace {
                    if *ty == self.first {
                        // Everything after the first `first` is vacuously fine.
                        return true;
                    }
                    if *ty == self.second {
                        return false;
                    }
                }
                true
            }
            InvariantKind::AlwaysFollowedBy => {
                let mut pending = false;
                for ty in trace {
                    if *ty == self.second {
                        pending = false;
                    } else if *ty == self.first {
                        pending = true;
                    }
                }
                !pending
            }
            InvariantKind::NeverFollowedBy => {
                let mut seen_first = false;
                for ty in trace {
                    if seen_first && *ty == self.second {
                        return false;
                    }
                    if *ty == self.first {
                        seen_first = true;
                    }
                }
                true
            }
        }
    }

    /// A regular-expression-like description matching exactly the violating
    /// event sequences, for the QRe-consuming verification back-end.
    ///
    /// Grammar: `.` concatenation, `_` any event, `[^x y]` any event other
    /// than `x` or `y`, postfix `*`/`+` repetition.
    pub fn bad_state_regex(&self) -> String {
        let a = &self.first;
        let b = &self.second;
        match self.kind {
            // A `b` with no earlier `a`, followed by anything.
            InvariantKind::AlwaysPrecedes => format!("[^{a} {b}]* . {b} . _*"),
            // A final `a` never answered by a `b`.
            InvariantKind::AlwaysFollowedBy => format!("_* . {a} . [^{b}]*"),
            // Some `a` with a later `b`.
            InvariantKind::NeverFollowedBy => format!("_* . {a} . _* . {b} . _*"),
        }
    }

    /// A Promela-style never claim accepting exactly the violating
    /// sequences, for the model-checker back-end.
    pub fn never_claim(&self) -> String {
        let a = &self.first;
        let b = &self.second;
        match self.kind {
            InvariantKind::AlwaysPrecedes => format!(
                "never {{ /* !(!({b}) U ({a})) */\n\
                 need_a:\n\
                 \tdo\n\
                 \t:: ({b}) -> goto accept_all\n\
                 \t:: (!({a}) && !({b})) -> goto need_a\n\
                 \tod;\n\
                 accept_all:\n\
                 \tskip\n\
                 }}\n"
            ),
            InvariantKind::AlwaysFollowedBy => format!(
                "never {{ /* !([]({a} -> <>({b}))) */\n\
                 T0_init:\n\
                 \tdo\n\
                 \t:: (({a}) && !({b})) -> goto accept_no_b\n\
                 \t:: true\n\
                 \tod;\n\
                 accept_no_b:\n\
                 \tdo\n\
                 \t:: (!({b}))\n\
                 \tod;\n\
                 }}\n"
            ),
            InvariantKind::NeverFollowedBy => format!(
                "never {{ /* !([]({a} -> [](!({b})))) */\n\
                 T0_init:\n\
                 \tdo\n\
                 \t:: ({a}) -> goto seen_a\n\
                 \t:: true\n\
                 \tod;\n\
                 seen_a:\n\
                 \tdo\n\
                 \t:: ({b}) -> goto accept_all\n\
                 \t:: true\n\
                 \tod;\n\
                 accept_all:\n\
                 \tskip\n\
                 }}\n"
            ),
        }
    }
}

impl fmt::Display for TemporalInvariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.first,
            self.kind.short_name(),
            self.second
        )
    }
}
