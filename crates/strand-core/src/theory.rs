//! Theory interaction protocol.
//!
//! A theory solver is a passive plug-in driven by callbacks from the host
//! search loop: term internalization, merges and splits of equivalence
//! classes, truth assignments, scope push/pop and the final consistency
//! check. Outbound actions (propagated literals and equalities, theory
//! axioms, case-split requests, conflicts) are values the host drains after
//! each callback rather than re-entrant calls into the host.

use std::fmt;

use crate::error::TheoryResult;
use crate::term::{TermId, TermStore};

/// A signed theory atom (term plus Boolean value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TheoryLit {
    /// The term representing the Boolean atom.
    pub term: TermId,
    /// The Boolean value of the atom.
    pub value: bool,
}

impl TheoryLit {
    /// Create a new signed theory literal.
    #[must_use]
    pub fn new(term: TermId, value: bool) -> Self {
        Self { term, value }
    }
}

/// Why a propagation or conflict holds: a set of equalities the host has
/// asserted in the current scope, plus any supporting Boolean literals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Justification {
    /// Host-asserted equalities, as term pairs.
    pub eqs: Vec<(TermId, TermId)>,
    /// Supporting literal assignments.
    pub lits: Vec<TheoryLit>,
}

impl Justification {
    /// A justification from equalities alone.
    #[must_use]
    pub fn from_eqs(eqs: Vec<(TermId, TermId)>) -> Self {
        Justification {
            eqs,
            lits: Vec::new(),
        }
    }

    /// A justification from a single literal.
    #[must_use]
    pub fn from_lit(lit: TheoryLit) -> Self {
        Justification {
            eqs: Vec::new(),
            lits: vec![lit],
        }
    }
}

/// An outbound action the host must apply on the theory's behalf.
#[derive(Debug, Clone)]
pub enum Propagation {
    /// Assign a literal, justified.
    Lit {
        /// The literal to assign.
        lit: TheoryLit,
        /// Why it holds.
        just: Justification,
    },
    /// Merge two terms, justified.
    Eq {
        /// Left side.
        lhs: TermId,
        /// Right side.
        rhs: TermId,
        /// Why they are equal.
        just: Justification,
    },
    /// Assert a theory axiom (a valid formula).
    Axiom {
        /// The formula to assert.
        formula: TermId,
    },
}

/// A request that the host introduce a case split on an equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitRequest {
    /// Left side of the trial equality.
    pub lhs: TermId,
    /// Right side of the trial equality.
    pub rhs: TermId,
}

/// Verdict of a final check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalCheckStatus {
    /// The theory is satisfied by the current assignment.
    Done,
    /// The theory made progress (propagated, split, or found a conflict);
    /// the host should continue its search loop.
    Continue,
    /// The theory cannot decide; the solver should answer unknown.
    GiveUp,
}

/// Named counters reported by solvers.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    entries: Vec<(String, u64)>,
}

impl Statistics {
    /// Create an empty statistics table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a counter value, overwriting any previous entry of that name.
    pub fn update(&mut self, name: &str, value: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name.to_string(), value));
        }
    }

    /// Look up a counter by name.
    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Iterate over all counters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

/// The inbound callback surface of a sequence theory solver.
///
/// The host owns the [`TermStore`] and passes it into every callback; the
/// solver allocates axiom formulas and skolem witnesses through it. After
/// each callback the host drains [`take_propagations`](Self::take_propagations)
/// and [`take_splits`](Self::take_splits) and checks
/// [`conflict`](Self::conflict).
pub trait SequenceTheory {
    /// Internalize a Boolean atom owned by the theory.
    fn internalize_atom(&mut self, tm: &mut TermStore, atom: TermId);

    /// Internalize a term, recursively internalizing its arguments.
    fn internalize_term(&mut self, tm: &mut TermStore, term: TermId);

    /// Attach the theory to a term on sort grounds alone (an uninterpreted
    /// constant of sequence sort).
    fn apply_sort_cnstr(&mut self, tm: &mut TermStore, term: TermId);

    /// Two internalized terms were asserted equal by the host.
    fn new_eq(&mut self, tm: &mut TermStore, lhs: TermId, rhs: TermId);

    /// Two internalized terms were asserted disequal by the host.
    fn new_diseq(&mut self, tm: &mut TermStore, lhs: TermId, rhs: TermId);

    /// A theory-owned atom was assigned a truth value.
    fn assign_literal(&mut self, tm: &mut TermStore, atom: TermId, value: bool)
        -> TheoryResult<()>;

    /// A term became relevant to the host's search.
    fn relevant(&mut self, tm: &mut TermStore, term: TermId);

    /// Open a decision scope.
    fn push_scope(&mut self);

    /// Close `n` decision scopes, restoring the state at the matching push.
    fn pop_scopes(&mut self, n: usize);

    /// The host restarted its search. Deductions are preserved.
    fn restart(&mut self);

    /// Decide, propagate, or give up on the current assignment.
    fn final_check(&mut self, tm: &mut TermStore) -> FinalCheckStatus;

    /// Whether queued axioms remain to be asserted.
    fn can_propagate(&self) -> bool;

    /// Drain the axiom queue into the outbox.
    fn propagate(&mut self, tm: &mut TermStore);

    /// Prepare for model construction.
    fn init_model(&mut self, tm: &TermStore);

    /// The model value of an internalized term. Must be called after
    /// [`init_model`](Self::init_model).
    fn mk_value(&mut self, tm: &mut TermStore, term: TermId) -> TermId;

    /// The recorded conflict, if the theory found the assignment inconsistent.
    fn conflict(&self) -> Option<&Justification>;

    /// Take the pending outbound actions.
    fn take_propagations(&mut self) -> Vec<Propagation>;

    /// Take the pending case-split requests.
    fn take_splits(&mut self) -> Vec<SplitRequest>;

    /// Report counters.
    fn collect_statistics(&self, st: &mut Statistics);

    /// Render the solver state for diagnostics.
    fn display(&self, tm: &TermStore, out: &mut dyn fmt::Write) -> fmt::Result;
}
