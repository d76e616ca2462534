//! The solved form: a backtrackable substitution from variables to their
//! representatives.
//!
//! Each binding carries the dependency justifying it. Lookups follow binding
//! chains, joining dependencies along the way; a lookup that takes more than
//! one hop rewrites the original key to point directly at the terminal
//! representative with the joined dependency (path compression for the
//! original key only). Every mutation is recorded on an internal trail so a
//! pop restores the map exactly.

use hashbrown::HashMap;
use strand_core::{TermId, TermStore};

use crate::dependency::{DepId, DepManager};

#[derive(Debug, Clone, Copy)]
enum MapOp {
    Ins,
    Del,
}

#[derive(Debug, Clone, Copy)]
struct TrailEntry {
    op: MapOp,
    key: TermId,
    value: TermId,
    dep: Option<DepId>,
}

/// Backtrackable substitution `term -> (representative, dependency)`.
#[derive(Debug, Default)]
pub struct SolutionMap {
    map: HashMap<TermId, (TermId, Option<DepId>)>,
    trail: Vec<TrailEntry>,
    limits: Vec<usize>,
}

impl SolutionMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `e` to `r`, justified by `d`. An existing binding is overwritten
    /// and both the removal and the insertion are trailed.
    pub fn update(&mut self, e: TermId, r: TermId, d: Option<DepId>) {
        if let Some(&(old_r, old_d)) = self.map.get(&e) {
            self.trail.push(TrailEntry {
                op: MapOp::Del,
                key: e,
                value: old_r,
                dep: old_d,
            });
        }
        self.map.insert(e, (r, d));
        self.trail.push(TrailEntry {
            op: MapOp::Ins,
            key: e,
            value: r,
            dep: d,
        });
    }

    /// Whether `e` has a binding.
    pub fn contains(&self, e: TermId) -> bool {
        self.map.contains_key(&e)
    }

    /// The representative of `e` together with the joined dependency of the
    /// chain walked. Compresses the path for `e` when more than one hop was
    /// taken.
    pub fn find(&mut self, e: TermId, dm: &mut DepManager) -> (TermId, Option<DepId>) {
        let mut result = e;
        let mut dep: Option<DepId> = None;
        let mut hops = 0usize;
        while let Some(&(next, d)) = self.map.get(&result) {
            dep = dm.mk_join(dep, d);
            result = next;
            hops += 1;
        }
        if hops > 1 {
            self.update(e, result, dep);
        }
        (result, dep)
    }

    /// Open a scope.
    pub fn push_scope(&mut self) {
        self.limits.push(self.trail.len());
    }

    /// Close `n` scopes by replaying the trail in reverse.
    pub fn pop_scopes(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let start = self.limits[self.limits.len() - n];
        let entries = self.trail.split_off(start);
        for entry in entries.into_iter().rev() {
            match entry.op {
                MapOp::Ins => {
                    self.map.remove(&entry.key);
                }
                MapOp::Del => {
                    self.map.insert(entry.key, (entry.value, entry.dep));
                }
            }
        }
        self.limits.truncate(self.limits.len() - n);
    }

    /// Bindings sorted by key, for deterministic display.
    pub fn sorted_bindings(&self) -> Vec<(TermId, TermId)> {
        let mut out: Vec<(TermId, TermId)> = self.map.iter().map(|(&k, &(v, _))| (k, v)).collect();
        out.sort_unstable();
        out
    }

    /// Render the solved form.
    pub fn display(&self, tm: &TermStore, out: &mut dyn std::fmt::Write) -> std::fmt::Result {
        for (k, v) in self.sorted_bindings() {
            writeln!(out, "{} |-> {}", tm.display(k), tm.display(v))?;
        }
        Ok(())
    }
}
