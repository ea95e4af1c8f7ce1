//! Arena of immutable, backward-linked witness path records.
//!
//! Many simulation paths share common prefixes; records are addressed by
//! stable index and never mutated after creation, so sharing a predecessor
//! index is always safe and cycles cannot form.

use std::fmt;

/// Index of a history record in its arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistoryId(u32);

impl fmt::Debug for HistoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// One step of a witness path: the node visited, the record it extends, and
/// the total path length up to this node.
#[derive(Debug, Clone, Copy)]
pub struct HistoryNode<N> {
    pub node: N,
    pub pred: Option<HistoryId>,
    pub len: u32,
}

#[derive(Debug, Clone)]
pub struct HistoryArena<N> {
    nodes: Vec<HistoryNode<N>>,
}

impl<N: Copy> HistoryArena<N> {
    pub fn new() -> Self {
        HistoryArena { nodes: Vec::new() }
    }

    /// A length-one record with no predecessor.
    pub fn root(&mut self, node: N) -> HistoryId {
        self.push(HistoryNode {
            node,
            pred: None,
            len: 1,
        })
    }

    /// Extends `pred` by one node; a missing predecessor stays missing, so
    /// unpopulated state slots propagate as unpopulated.
    pub fn extend(&mut self, node: N, pred: Option<HistoryId>) -> Option<HistoryId> {
        let pred = pred?;
        let len = self.get(pred).len + 1;
        Some(self.push(HistoryNode {
            node,
            pred: Some(pred),
            len,
        }))
    }

    pub fn get(&self, id: HistoryId) -> &HistoryNode<N> {
        &self.nodes[id.0 as usize]
    }

    /// Of two optional chains, the populated one, or the shorter when both
    /// are populated (ties keep the incumbent `b`).
    pub fn prefer_shorter(
        &self,
        a: Option<HistoryId>,
        b: Option<HistoryId>,
    ) -> Option<HistoryId> {
        match (a, b) {
            (Some(a), Some(b)) => {
                if self.get(a).len < self.get(b).len {
                    Some(a)
                } else {
                    Some(b)
                }
            }
            (a, None) => a,
            (None, b) => b,
        }
    }

    /// The full path ending at `id`, in forward order.
    pub fn path(&self, id: HistoryId) -> Vec<N> {
        let mut out = Vec::with_capacity(self.get(id).len as usize);
        let mut cursor = Some(id);
        while let Some(id) = cursor {
            let record = self.get(id);
            out.push(record.node);
            cursor = record.pred;
        }
        out.reverse();
        out
    }

    fn push(&mut self, node: HistoryNode<N>) -> HistoryId {
        let id = HistoryId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }
}

impl<N: Copy> Default for HistoryArena<N> {
    fn default() -> Self {
        HistoryArena::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_share_prefixes() {
        let mut arena: HistoryArena<u32> = HistoryArena::new();
        let root = arena.root(0);
        let left = arena.extend(1, Some(root)).unwrap();
        let right = arena.extend(2, Some(root)).unwrap();
        assert_eq!(arena.path(left), vec![0, 1]);
        assert_eq!(arena.path(right), vec![0, 2]);
        assert_eq!(arena.get(left).len, 2);
    }

    #[test]
    fn extend_of_none_is_none() {
        let mut arena: HistoryArena<u32> = HistoryArena::new();
        assert_eq!(arena.extend(7, None), None);
    }

    #[test]
    fn prefer_shorter_picks_populated_then_shorter() {
        let mut arena: HistoryArena<u32> = HistoryArena::new();
        let short = arena.root(0);
        let long = arena.extend(1, Some(short)).unwrap();
        assert_eq!(arena.prefer_shorter(None, Some(long)), Some(long));
        assert_eq!(arena.prefer_shorter(Some(short), None), Some(short));
        assert_eq!(arena.prefer_shorter(Some(long), Some(short)), Some(short));
        assert_eq!(arena.prefer_shorter(Some(short), Some(long)), Some(short));
    }
}
