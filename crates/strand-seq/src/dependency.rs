//! Justification tracking.
//!
//! Every derived fact carries a dependency: a DAG over pairs of terms the
//! host has asserted equal. Leaves name one asserted equality; joins combine
//! two dependencies. Nodes live in a per-solver arena indexed by [`DepId`];
//! the empty justification is `None`. Backtracking truncates the arena at the
//! scope watermark, which is safe because nodes allocated inside a popped
//! scope are only reachable from state that is popped with them.

use hashbrown::HashSet;
use strand_core::TermId;

/// Index of a dependency node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepId(u32);

impl DepId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy)]
enum DepNode {
    /// The host asserted these two terms equal.
    Leaf(TermId, TermId),
    /// Union of two dependencies.
    Join(DepId, DepId),
}

/// Arena of justification nodes.
#[derive(Debug, Default)]
pub struct DepManager {
    nodes: Vec<DepNode>,
    limits: Vec<usize>,
}

impl DepManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A dependency on a single asserted equality.
    pub fn mk_leaf(&mut self, a: TermId, b: TermId) -> DepId {
        let id = DepId(self.nodes.len() as u32);
        self.nodes.push(DepNode::Leaf(a, b));
        id
    }

    /// Join two dependencies; the empty justification is absorbed.
    pub fn mk_join(&mut self, d1: Option<DepId>, d2: Option<DepId>) -> Option<DepId> {
        match (d1, d2) {
            (None, d) | (d, None) => d,
            (Some(a), Some(b)) => {
                if a == b {
                    return Some(a);
                }
                let id = DepId(self.nodes.len() as u32);
                self.nodes.push(DepNode::Join(a, b));
                Some(id)
            }
        }
    }

    /// The set of asserted equalities a dependency reaches, deduplicated.
    pub fn linearize(&self, d: Option<DepId>) -> Vec<(TermId, TermId)> {
        let mut out = Vec::new();
        let mut seen_nodes: HashSet<DepId> = HashSet::new();
        let mut seen_pairs: HashSet<(TermId, TermId)> = HashSet::new();
        let mut stack: Vec<DepId> = d.into_iter().collect();
        while let Some(id) = stack.pop() {
            if !seen_nodes.insert(id) {
                continue;
            }
            match self.nodes[id.index()] {
                DepNode::Leaf(a, b) => {
                    if seen_pairs.insert((a, b)) {
                        out.push((a, b));
                    }
                }
                DepNode::Join(d1, d2) => {
                    stack.push(d1);
                    stack.push(d2);
                }
            }
        }
        out
    }

    /// Open a scope.
    pub fn push_scope(&mut self) {
        self.limits.push(self.nodes.len());
    }

    /// Close `n` scopes, discarding nodes allocated inside them.
    pub fn pop_scopes(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let start = self.limits[self.limits.len() - n];
        self.nodes.truncate(start);
        self.limits.truncate(self.limits.len() - n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::{Sort, TermStore};

    fn pairs(tm: &mut TermStore, n: usize) -> Vec<(TermId, TermId)> {
        (0..n)
            .map(|i| {
                let a = tm.mk_var(format!("a{i}"), Sort::string());
                let b = tm.mk_var(format!("b{i}"), Sort::string());
                (a, b)
            })
            .collect()
    }

    #[test]
    fn test_join_absorbs_null() {
        let mut tm = TermStore::new();
        let mut dm = DepManager::new();
        let ps = pairs(&mut tm, 1);
        let leaf = dm.mk_leaf(ps[0].0, ps[0].1);
        assert_eq!(dm.mk_join(None, Some(leaf)), Some(leaf));
        assert_eq!(dm.mk_join(Some(leaf), None), Some(leaf));
        assert_eq!(dm.mk_join(None, None), None);
    }

    #[test]
    fn test_linearize_dedupes() {
        let mut tm = TermStore::new();
        let mut dm = DepManager::new();
        let ps = pairs(&mut tm, 2);
        let l0 = dm.mk_leaf(ps[0].0, ps[0].1);
        let l0b = dm.mk_leaf(ps[0].0, ps[0].1);
        let l1 = dm.mk_leaf(ps[1].0, ps[1].1);
        let j1 = dm.mk_join(Some(l0), Some(l1));
        let j2 = dm.mk_join(j1, Some(l0b));
        let j3 = dm.mk_join(j2, j1);

        let mut lin = dm.linearize(j3);
        lin.sort_unstable();
        let mut expected = ps.clone();
        expected.sort_unstable();
        assert_eq!(lin, expected);
        assert!(dm.linearize(None).is_empty());
    }

    #[test]
    fn test_scopes_truncate() {
        let mut tm = TermStore::new();
        let mut dm = DepManager::new();
        let ps = pairs(&mut tm, 3);
        dm.mk_leaf(ps[0].0, ps[0].1);
        dm.push_scope();
        dm.mk_leaf(ps[1].0, ps[1].1);
        dm.push_scope();
        dm.mk_leaf(ps[2].0, ps[2].1);
        assert_eq!(dm.nodes.len(), 3);
        dm.pop_scopes(2);
        assert_eq!(dm.nodes.len(), 1);
        assert!(dm.limits.is_empty());
    }
}
