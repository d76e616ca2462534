//! Fresh values for model completion.
//!
//! When the engine builds a model, variables with no binding in the solved
//! form are completed with fresh concrete values. The factory hands out
//! string values that collide neither with each other nor with any literal
//! it was seeded with.

use hashbrown::HashSet;
use strand_core::{Sort, TermId, TermStore};

/// Generator of fresh sequence values.
#[derive(Debug)]
pub struct SeqValueFactory {
    used: HashSet<String>,
    counter: usize,
}

impl SeqValueFactory {
    /// Create a factory that avoids the given existing literals.
    pub fn new<'a>(existing: impl Iterator<Item = &'a str>) -> Self {
        SeqValueFactory {
            used: existing.map(str::to_owned).collect(),
            counter: 0,
        }
    }

    /// A fresh value of the given sort, or `None` when the factory cannot
    /// produce values of that sort (the model is then left incomplete for
    /// that variable).
    pub fn fresh_value(&mut self, tm: &mut TermStore, sort: &Sort) -> Option<TermId> {
        if *sort != Sort::string() {
            return None;
        }
        loop {
            let candidate = format!("str!{}", self.counter);
            self.counter += 1;
            if self.used.insert(candidate.clone()) {
                return Some(tm.mk_string(candidate));
            }
        }
    }
}
