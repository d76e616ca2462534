//! Disequality memory for branching.
//!
//! Records which trial equalities have already been excluded by the host, so
//! the branching engine never proposes the same case twice. Pairs are stored
//! id-ordered; the table is symmetric, irreflexive and backtrackable.

use hashbrown::HashSet;
use strand_core::{TermId, TermStore};

/// Backtrackable symmetric set of excluded pairs.
#[derive(Debug, Default)]
pub struct ExclusionTable {
    table: HashSet<(TermId, TermId)>,
    inserted: Vec<(TermId, TermId)>,
    limits: Vec<usize>,
}

fn ordered(a: TermId, b: TermId) -> (TermId, TermId) {
    if b < a {
        (b, a)
    } else {
        (a, b)
    }
}

impl ExclusionTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `a` and `b` are excluded from being equal. Reflexive pairs
    /// are ignored; only a first insertion is logged.
    pub fn update(&mut self, a: TermId, b: TermId) {
        if a == b {
            return;
        }
        let pair = ordered(a, b);
        if self.table.insert(pair) {
            self.inserted.push(pair);
        }
    }

    /// Whether the pair is excluded.
    pub fn contains(&self, a: TermId, b: TermId) -> bool {
        a != b && self.table.contains(&ordered(a, b))
    }

    /// Open a scope.
    pub fn push_scope(&mut self) {
        self.limits.push(self.inserted.len());
    }

    /// Close `n` scopes, removing pairs inserted inside them.
    pub fn pop_scopes(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let start = self.limits[self.limits.len() - n];
        for pair in self.inserted.drain(start..) {
            self.table.remove(&pair);
        }
        self.limits.truncate(self.limits.len() - n);
    }

    /// Render the excluded pairs, id-ordered for determinism.
    pub fn display(&self, tm: &TermStore, out: &mut dyn std::fmt::Write) -> std::fmt::Result {
        let mut pairs: Vec<(TermId, TermId)> = self.table.iter().copied().collect();
        pairs.sort_unstable();
        for (a, b) in pairs {
            writeln!(out, "{} != {}", tm.display(a), tm.display(b))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::Sort;

    #[test]
    fn test_symmetric_irreflexive() {
        let mut tm = TermStore::new();
        let mut ex = ExclusionTable::new();
        let a = tm.mk_var("a", Sort::string());
        let b = tm.mk_var("b", Sort::string());

        ex.update(b, a);
        assert!(ex.contains(a, b));
        assert!(ex.contains(b, a));
        assert!(!ex.contains(a, a));

        ex.update(a, a);
        assert!(!ex.contains(a, a));
    }

    #[test]
    fn test_pop_removes_scoped_pairs() {
        let mut tm = TermStore::new();
        let mut ex = ExclusionTable::new();
        let a = tm.mk_var("a", Sort::string());
        let b = tm.mk_var("b", Sort::string());
        let c = tm.mk_var("c", Sort::string());

        ex.update(a, b);
        ex.push_scope();
        ex.update(a, c);
        // re-inserting an existing pair must not be logged again
        ex.update(b, a);
        assert!(ex.contains(a, c));
        ex.pop_scopes(1);

        assert!(ex.contains(a, b));
        assert!(!ex.contains(a, c));
    }
}

// ============================================================================
// Kani Verification Harnesses
// ============================================================================

#[cfg(kani)]
mod verification {
    use super::*;

    /// Push followed by pop restores the scope depth.
    #[kani::proof]
    fn proof_push_pop_restores_depth() {
        let mut ex = ExclusionTable::new();
        let depth = ex.limits.len();
        ex.push_scope();
        ex.pop_scopes(1);
        assert_eq!(ex.limits.len(), depth);
    }

    /// Popping zero scopes is a no-op.
    #[kani::proof]
    fn proof_pop_zero_is_noop() {
        let mut ex = ExclusionTable::new();
        ex.push_scope();
        let depth = ex.limits.len();
        ex.pop_scopes(0);
        assert_eq!(ex.limits.len(), depth);
    }
}
