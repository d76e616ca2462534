//! The sequence equation engine.
//!
//! [`SeqSolver`] maintains a solved form for the sequence equalities the host
//! asserts: pending equations are canonicalized under the current
//! substitution, reduced by cancelling matching prefixes and suffixes, and
//! turned into variable bindings when one side is a variable that does not
//! occur in the other. When reduction reaches a fixed point with equations
//! left over, the branching engine proposes case splits on the first variable
//! of an unsolved equation. Sequence predicates and operators are expanded
//! into quantifier-free axioms over interned skolem witnesses.
//!
//! The solver is passive: the host drives it through the
//! [`SequenceTheory`] callbacks and drains propagations, splits and
//! conflicts after each one.

use std::fmt;

use hashbrown::HashSet;
use strand_core::{
    FinalCheckStatus, Justification, Propagation, SeqRewriter, SequenceTheory, SplitRequest,
    Statistics, TermData, TermId, TermStore, TheoryError, TheoryLit, TheoryResult,
};

use crate::dependency::{DepId, DepManager};
use crate::eqs::{EqStore, PendingEq};
use crate::exclusion::ExclusionTable;
use crate::model::SeqValueFactory;
use crate::solution::SolutionMap;

/// Counters reported through `collect_statistics`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeqStats {
    /// Case splits requested by the branching engine.
    pub num_splits: u64,
    /// Equations discharged or replaced during preprocessing sweeps.
    pub num_reductions: u64,
}

/// Tagged undo actions for mutations not covered by copy-on-push frames.
#[derive(Debug, Clone, Copy)]
enum Undo {
    PopIneq,
    PopAxiom,
    AxiomsHead(usize),
    Incomplete(bool),
    ForgetInternalized(TermId),
    ForgetTrackedLength(TermId),
    ForgetLenAxiom(TermId),
    ForgetLenConcat(TermId),
}

/// Decision procedure for the theory of finite sequences.
pub struct SeqSolver {
    rw: SeqRewriter,
    dm: DepManager,
    rep: SolutionMap,
    exclude: ExclusionTable,
    eqs: EqStore,
    /// Atoms asserted false: disequality equality-atoms and negated
    /// sequence predicates.
    ineqs: Vec<TermId>,
    axioms: Vec<TermId>,
    axioms_head: usize,
    /// Fairness cursor for branching; deliberately not trailed.
    branch_head: usize,
    incomplete: bool,
    model_completion: bool,
    factory: Option<SeqValueFactory>,
    internalized: HashSet<TermId>,
    /// Arguments of internalized length applications.
    tracked_lengths: HashSet<TermId>,
    /// Length terms whose basic axioms are already queued.
    len_axiomed: HashSet<TermId>,
    /// Concats whose distributivity axiom is already queued.
    len_concat_axiomed: HashSet<TermId>,
    trail: Vec<Undo>,
    trail_limits: Vec<usize>,
    outbox: Vec<Propagation>,
    splits: Vec<SplitRequest>,
    conflict: Option<Justification>,
    stats: SeqStats,
}

impl SeqSolver {
    /// Create a solver with empty state.
    #[must_use]
    pub fn new() -> Self {
        SeqSolver {
            rw: SeqRewriter::new(),
            dm: DepManager::new(),
            rep: SolutionMap::new(),
            exclude: ExclusionTable::new(),
            eqs: EqStore::new(),
            ineqs: Vec::new(),
            axioms: Vec::new(),
            axioms_head: 0,
            branch_head: 0,
            incomplete: false,
            model_completion: false,
            factory: None,
            internalized: HashSet::new(),
            tracked_lengths: HashSet::new(),
            len_axiomed: HashSet::new(),
            len_concat_axiomed: HashSet::new(),
            trail: Vec::new(),
            trail_limits: Vec::new(),
            outbox: Vec::new(),
            splits: Vec::new(),
            conflict: None,
            stats: SeqStats::default(),
        }
    }

    /// Pending equations in the current scope.
    pub fn pending_eqs(&self) -> usize {
        self.eqs.len()
    }

    /// The solver's counters.
    pub fn stats(&self) -> SeqStats {
        self.stats
    }

    // ------------------------------------------------------------------
    // Variables and the occurs-check
    // ------------------------------------------------------------------

    /// A sequence variable: uninterpreted, or a theory skolem.
    fn is_var(&self, tm: &TermStore, t: TermId) -> bool {
        tm.is_uninterp(t) || tm.as_skolem(t).is_some()
    }

    /// Strip `left`/`right` selector skolems.
    fn peel_selectors(&self, tm: &TermStore, mut t: TermId) -> TermId {
        while let Some((name, args)) = tm.as_skolem(t) {
            if (name == "left" || name == "right") && !args.is_empty() {
                t = args[0];
            } else {
                break;
            }
        }
        t
    }

    /// Whether variable `a` occurs in `b`: walks concat spines and selector
    /// peels and compares residues by identity.
    fn occurs(&self, tm: &TermStore, a: TermId, b: TermId) -> bool {
        debug_assert!(self.is_var(tm, a));
        let a = self.peel_selectors(tm, a);
        if let Some((b1, b2)) = tm.as_concat(b) {
            return self.occurs_peeled(tm, a, b1) || self.occurs_peeled(tm, a, b2);
        }
        let b = self.peel_selectors(tm, b);
        a == b
    }

    fn occurs_peeled(&self, tm: &TermStore, a: TermId, b: TermId) -> bool {
        if let Some((b1, b2)) = tm.as_concat(b) {
            return self.occurs_peeled(tm, a, b1) || self.occurs_peeled(tm, a, b2);
        }
        let b = self.peel_selectors(tm, b);
        a == b
    }

    // ------------------------------------------------------------------
    // Canonicalization
    // ------------------------------------------------------------------

    /// The normal form of `e` under the solved form and the rewriter,
    /// together with the dependency justifying the substitutions applied.
    fn canonize(&mut self, tm: &mut TermStore, e: TermId) -> (TermId, Option<DepId>) {
        let (expanded, deps) = self.expand(tm, e);
        (self.rw.rewrite(tm, expanded), deps)
    }

    fn expand(&mut self, tm: &mut TermStore, e0: TermId) -> (TermId, Option<DepId>) {
        let (e, mut deps) = self.rep.find(e0, &mut self.dm);
        if let Some((l, r)) = tm.as_concat(e) {
            let (l2, d1) = self.expand(tm, l);
            let (r2, d2) = self.expand(tm, r);
            deps = self.dm.mk_join(deps, d1);
            deps = self.dm.mk_join(deps, d2);
            return (tm.mk_concat(l2, r2), deps);
        }
        if tm.is_empty_seq(e) || tm.as_string(e).is_some() {
            return (e, deps);
        }
        if let Some((l, r)) = tm.as_eq(e) {
            let (l2, d1) = self.expand(tm, l);
            let (r2, d2) = self.expand(tm, r);
            deps = self.dm.mk_join(deps, d1);
            deps = self.dm.mk_join(deps, d2);
            return (tm.mk_eq(l2, r2), deps);
        }
        if let Some((l, r)) = tm.as_prefix(e) {
            let (l2, d1) = self.expand(tm, l);
            let (r2, d2) = self.expand(tm, r);
            deps = self.dm.mk_join(deps, d1);
            deps = self.dm.mk_join(deps, d2);
            return (tm.mk_prefix(l2, r2), deps);
        }
        if let Some((l, r)) = tm.as_suffix(e) {
            let (l2, d1) = self.expand(tm, l);
            let (r2, d2) = self.expand(tm, r);
            deps = self.dm.mk_join(deps, d1);
            deps = self.dm.mk_join(deps, d2);
            return (tm.mk_suffix(l2, r2), deps);
        }
        if let Some((l, r)) = tm.as_contains(e) {
            let (l2, d1) = self.expand(tm, l);
            let (r2, d2) = self.expand(tm, r);
            deps = self.dm.mk_join(deps, d1);
            deps = self.dm.mk_join(deps, d2);
            return (tm.mk_contains(l2, r2), deps);
        }
        if self.model_completion && self.is_var(tm, e) {
            let sort = tm.sort(e).clone();
            let factory = self.factory.as_mut().expect("init_model before mk_value");
            if let Some(val) = factory.fresh_value(tm, &sort) {
                self.rep.update(e, val, None);
                return (val, deps);
            }
        }
        (e, deps)
    }

    // ------------------------------------------------------------------
    // Outbound actions
    // ------------------------------------------------------------------

    fn justify(&self, deps: Option<DepId>) -> Justification {
        Justification::from_eqs(self.dm.linearize(deps))
    }

    fn set_conflict(&mut self, deps: Option<DepId>) {
        if self.conflict.is_some() {
            return;
        }
        let just = self.justify(deps);
        tracing::debug!("seq conflict from {} asserted equalities", just.eqs.len());
        self.conflict = Some(just);
    }

    fn propagate_lit(&mut self, deps: Option<DepId>, lit: TheoryLit) {
        let just = self.justify(deps);
        self.outbox.push(Propagation::Lit { lit, just });
    }

    fn propagate_eq(&mut self, deps: Option<DepId>, lhs: TermId, rhs: TermId) {
        let just = self.justify(deps);
        self.outbox.push(Propagation::Eq { lhs, rhs, just });
    }

    fn propagate_eq_from_lit(
        &mut self,
        tm: &mut TermStore,
        lit: TheoryLit,
        lhs: TermId,
        rhs: TermId,
    ) {
        tracing::debug!(
            "assignment expands to {} = {}",
            tm.display(lhs),
            tm.display(rhs)
        );
        self.internalize(tm, lhs);
        debug_assert!(self.internalized.contains(&rhs));
        self.outbox.push(Propagation::Eq {
            lhs,
            rhs,
            just: Justification::from_lit(lit),
        });
    }

    // ------------------------------------------------------------------
    // Equation solving
    // ------------------------------------------------------------------

    /// Canonicalize both sides and reduce. Returns whether the equation was
    /// consumed (conflict found, discharged, or replaced by residuals).
    fn simplify_eq(&mut self, tm: &mut TermStore, eq: PendingEq) -> bool {
        let (lh, d1) = self.canonize(tm, eq.lhs);
        let (rh, d2) = self.canonize(tm, eq.rhs);
        let mut deps = self.dm.mk_join(eq.dep, d1);
        deps = self.dm.mk_join(deps, d2);
        match self.rw.reduce_eq(tm, lh, rh) {
            None => {
                tracing::debug!("{} != {}", tm.display(lh), tm.display(rh));
                self.set_conflict(deps);
                true
            }
            Some(residual) => {
                if residual.len() == 1 && residual[0] == (eq.lhs, eq.rhs) {
                    return false;
                }
                for &(l, r) in &residual {
                    self.eqs.push(PendingEq {
                        lhs: l,
                        rhs: r,
                        dep: deps,
                    });
                }
                tracing::trace!(
                    "{} = {} reduced to {} residual equations",
                    tm.display(eq.lhs),
                    tm.display(eq.rhs),
                    residual.len()
                );
                true
            }
        }
    }

    /// Discharge a trivial equation or eliminate a variable. Returns whether
    /// the equation was consumed.
    fn solve_unit_eq(&mut self, tm: &mut TermStore, eq: PendingEq) -> bool {
        let (lh, d1) = self.canonize(tm, eq.lhs);
        let (rh, d2) = self.canonize(tm, eq.rhs);
        if lh == rh {
            return true;
        }
        let mut deps = self.dm.mk_join(eq.dep, d1);
        deps = self.dm.mk_join(deps, d2);
        if self.is_var(tm, lh) && !self.occurs(tm, lh, rh) {
            self.add_solution(tm, lh, rh, deps);
            return true;
        }
        if self.is_var(tm, rh) && !self.occurs(tm, rh, lh) {
            self.add_solution(tm, rh, lh, deps);
            return true;
        }
        false
    }

    fn add_solution(&mut self, tm: &mut TermStore, l: TermId, r: TermId, deps: Option<DepId>) {
        debug_assert!(self.is_var(tm, l) && !self.occurs(tm, l, r));
        self.rep.update(l, r, deps);
        if self.internalized.contains(&l) && self.internalized.contains(&r) {
            self.propagate_eq(deps, l, r);
        }
    }

    /// One sweep over the pending equations, simplifying or unit-solving each
    /// and deleting consumed ones by swap-with-last. Returns whether anything
    /// changed.
    fn pre_process_eqs(&mut self, tm: &mut TermStore, simplify: bool) -> bool {
        let mut change = false;
        let mut i = 0;
        while self.conflict.is_none() && i < self.eqs.len() {
            let eq = self.eqs.get(i);
            let consumed = if simplify {
                self.simplify_eq(tm, eq)
            } else {
                self.solve_unit_eq(tm, eq)
            };
            if consumed {
                self.eqs.swap_remove(i);
                self.stats.num_reductions += 1;
                change = true;
            } else {
                i += 1;
            }
        }
        change
    }

    fn simplify_eqs(&mut self, tm: &mut TermStore) -> bool {
        self.pre_process_eqs(tm, true)
    }

    fn solve_basic_eqs(&mut self, tm: &mut TermStore) -> bool {
        self.pre_process_eqs(tm, false)
    }

    fn simplify_and_solve_eqs(&mut self, tm: &mut TermStore) -> bool {
        let mut change = self.simplify_eqs(tm);
        while self.conflict.is_none() && self.solve_basic_eqs(tm) {
            self.simplify_eqs(tm);
            change = true;
        }
        change
    }

    /// Evaluate the negative constraints. Returns false (and propagates) when
    /// one of them canonicalizes to true.
    fn check_ineqs(&mut self, tm: &mut TermStore) -> bool {
        for i in 0..self.ineqs.len() {
            let a = self.ineqs[i];
            let (b, deps) = self.canonize(tm, a);
            if tm.is_true(b) {
                tracing::debug!("negative constraint {} evaluates to true", tm.display(a));
                self.internalize(tm, a);
                self.propagate_lit(deps, TheoryLit::new(a, true));
                return false;
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Branching
    // ------------------------------------------------------------------

    /// Propose a case split on the first variable of an unsolved equation,
    /// round-robin from the fairness cursor.
    fn branch_variable(&mut self, tm: &mut TermStore) -> bool {
        let sz = self.eqs.len();
        for i in 0..sz {
            let k = (i + self.branch_head) % sz;
            let eq = self.eqs.get(k);
            let ls = tm.concat_spine(eq.lhs);
            let rs = tm.concat_spine(eq.rhs);
            if !ls.is_empty() && self.find_branch_candidate(tm, ls[0], &rs) {
                self.branch_head = k;
                return true;
            }
            if !rs.is_empty() && self.find_branch_candidate(tm, rs[0], &ls) {
                self.branch_head = k;
                return true;
            }
        }
        false
    }

    /// Trial equalities for variable `l` against the spine `rs`: the empty
    /// sequence, every proper prefix of an aligned string literal, and each
    /// accumulated prefix of `rs`. Bails out when `l` occurs in `rs`.
    fn find_branch_candidate(&mut self, tm: &mut TermStore, l: TermId, rs: &[TermId]) -> bool {
        if !self.is_var(tm, l) {
            return false;
        }
        let sort = tm.sort(l).clone();
        let mut v0 = tm.mk_empty(sort);
        if self.assume_equality(tm, l, v0) {
            return true;
        }
        for (j, &rj) in rs.iter().enumerate() {
            if self.occurs(tm, l, rj) {
                return false;
            }
            if let Some(s) = tm.as_string(rj).map(str::to_owned) {
                for k in 1..s.len() {
                    if !s.is_char_boundary(k) {
                        continue;
                    }
                    let prefix = tm.mk_string(&s[..k]);
                    let v = tm.mk_concat(v0, prefix);
                    if self.assume_equality(tm, l, v) {
                        return true;
                    }
                }
            }
            v0 = if j == 0 { rs[0] } else { tm.mk_concat(v0, rj) };
            if self.assume_equality(tm, l, v0) {
                return true;
            }
        }
        false
    }

    /// Ask the host to split on `a = b` unless the pair is excluded.
    fn assume_equality(&mut self, tm: &mut TermStore, a: TermId, b: TermId) -> bool {
        if self.exclude.contains(a, b) {
            return false;
        }
        debug_assert!(self.internalized.contains(&a));
        if !self.internalized.contains(&b) {
            self.internalize(tm, b);
        }
        tracing::debug!("assume {} = {}", tm.display(a), tm.display(b));
        self.splits.push(SplitRequest { lhs: a, rhs: b });
        self.stats.num_splits += 1;
        true
    }

    /// Nielsen-style length splits; reserved.
    fn split_variable(&mut self) -> bool {
        false
    }

    // ------------------------------------------------------------------
    // Internalization and the incomplete flag
    // ------------------------------------------------------------------

    fn internalize(&mut self, tm: &mut TermStore, t: TermId) {
        if self.internalized.contains(&t) {
            return;
        }
        let args: Vec<TermId> = match tm.get(t) {
            TermData::App(_, args) => args.clone(),
            _ => Vec::new(),
        };
        for a in args {
            self.internalize(tm, a);
        }
        self.internalized.insert(t);
        self.trail.push(Undo::ForgetInternalized(t));

        if let Some(x) = tm.as_length(t) {
            if self.tracked_lengths.insert(x) {
                self.trail.push(Undo::ForgetTrackedLength(x));
            }
        } else if tm.as_index(t).is_some() {
            self.add_indexof_axiom(tm, t);
        } else if tm.as_replace(t).is_some() {
            self.add_replace_axiom(tm, t);
        } else if tm.as_extract(t).is_some() || tm.as_in_re(t).is_some() {
            self.set_incomplete(tm, t);
        } else if tm.is_seq_op(t) && !self.is_handled_seq_op(tm, t) {
            self.set_incomplete(tm, t);
        }
    }

    fn is_handled_seq_op(&self, tm: &TermStore, t: TermId) -> bool {
        tm.as_concat(t).is_some()
            || tm.is_empty_seq(t)
            || tm.as_unit(t).is_some()
            || tm.as_prefix(t).is_some()
            || tm.as_suffix(t).is_some()
            || tm.as_contains(t).is_some()
            || tm.as_skolem(t).is_some()
    }

    fn set_incomplete(&mut self, tm: &TermStore, t: TermId) {
        tracing::debug!("no support for {}", tm.display(t));
        if !self.incomplete {
            self.trail.push(Undo::Incomplete(false));
            self.incomplete = true;
        }
    }

    // ------------------------------------------------------------------
    // Axioms
    // ------------------------------------------------------------------

    fn create_axiom(&mut self, fml: TermId) {
        self.trail.push(Undo::PopAxiom);
        self.axioms.push(fml);
    }

    fn assert_axiom(&mut self, tm: &mut TermStore, fml: TermId) {
        if tm.is_true(fml) {
            return;
        }
        tracing::debug!("asserting {}", tm.display(fml));
        self.internalize(tm, fml);
        self.outbox.push(Propagation::Axiom { formula: fml });
    }

    fn mk_seq_skolem(&self, tm: &mut TermStore, name: &str, args: &[TermId]) -> TermId {
        let sort = tm.sort(args[0]).clone();
        tm.mk_skolem(name, args, sort)
    }

    /// `s` occurs in `x ++ s` only at the very end: `s = s1 ++ c`, `c` a
    /// single element, and `x ++ s1` does not contain `s`.
    fn tightest_prefix(&self, tm: &mut TermStore, s: TermId, x: TermId) -> TermId {
        let s1 = self.mk_seq_skolem(tm, "first", &[s]);
        let c = self.mk_seq_skolem(tm, "last", &[s]);
        let s1c = tm.mk_concat(s1, c);
        let eq_split = tm.mk_eq(s, s1c);
        let len_c = tm.mk_length(c);
        let one = tm.mk_int(1);
        let eq_len = tm.mk_eq(len_c, one);
        let xs1 = tm.mk_concat(x, s1);
        let cont = tm.mk_contains(s, xs1);
        let not_cont = tm.mk_not(cont);
        tm.mk_and(vec![eq_split, eq_len, not_cont])
    }

    /// Length axioms for one `length` application:
    /// `len(x) >= 0`, `len(x) = 0 <-> x = empty`, and `len(x) = rewrite(len(x))`
    /// when rewriting makes progress.
    fn add_len_axiom(&mut self, tm: &mut TermStore, n: TermId) {
        let x = tm.as_length(n).expect("length application");
        let zero = tm.mk_int(0);
        let eq_zero = tm.mk_eq(zero, n);
        let sort = tm.sort(x).clone();
        let empty = tm.mk_empty(sort);
        let eq_empty = tm.mk_eq(x, empty);

        let fml = tm.mk_ge(n, zero);
        self.create_axiom(fml);
        let not_eq_zero = tm.mk_not(eq_zero);
        let fml = tm.mk_or(vec![not_eq_zero, eq_empty]);
        self.create_axiom(fml);
        let not_eq_empty = tm.mk_not(eq_empty);
        let fml = tm.mk_or(vec![not_eq_empty, eq_zero]);
        self.create_axiom(fml);

        let nr = self.rw.rewrite(tm, n);
        if nr != n {
            let fml = tm.mk_eq(n, nr);
            self.create_axiom(fml);
        }
    }

    /// The index-of axioms, eagerly instantiated:
    ///
    /// ```text
    /// let i = index(s, t)
    /// contains(s, t) \/ i = -1
    /// !contains(s, t) \/ !(s = empty) \/ i = 0
    /// !contains(s, t) \/ s = empty \/ t = x ++ s ++ y
    /// !contains(s, t) \/ s = empty \/ tightest_prefix(s, x)
    /// ```
    fn add_indexof_axiom(&mut self, tm: &mut TermStore, i: TermId) {
        let (s, t) = tm.as_index(i).expect("index application");
        let x = self.mk_seq_skolem(tm, "contains_left", &[s, t]);
        let y = self.mk_seq_skolem(tm, "contains_right", &[s, t]);
        let sort = tm.sort(s).clone();
        let empty = tm.mk_empty(sort.clone());
        let eq_empty = tm.mk_eq(s, empty);
        let cnt = tm.mk_contains(s, t);
        let not_cnt = tm.mk_not(cnt);
        let not_empty = tm.mk_not(eq_empty);

        let minus_one = tm.mk_int(-1);
        let eq_m1 = tm.mk_eq(i, minus_one);
        let fml = tm.mk_or(vec![cnt, eq_m1]);
        self.create_axiom(fml);

        let zero = tm.mk_int(0);
        let eq_zero = tm.mk_eq(i, zero);
        let fml = tm.mk_or(vec![not_cnt, not_empty, eq_zero]);
        self.create_axiom(fml);

        let xsy = tm.mk_concat_list(&[x, s, y], &sort);
        let eq_split = tm.mk_eq(t, xsy);
        let fml = tm.mk_or(vec![not_cnt, eq_empty, eq_split]);
        self.create_axiom(fml);

        let tight = self.tightest_prefix(tm, s, x);
        let fml = tm.mk_or(vec![not_cnt, eq_empty, tight]);
        self.create_axiom(fml);
    }

    /// The replace axioms, eagerly instantiated:
    ///
    /// ```text
    /// let r = replace(a, s, t)
    /// contains(s, a) -> a = x ++ s ++ y /\ r = x ++ t ++ y /\ tightest_prefix(s, x)
    /// !contains(s, a) -> r = a
    /// ```
    fn add_replace_axiom(&mut self, tm: &mut TermStore, r: TermId) {
        let (a, s, t) = tm.as_replace(r).expect("replace application");
        let cnt = tm.mk_contains(s, a);
        let not_cnt = tm.mk_not(cnt);
        let x = self.mk_seq_skolem(tm, "contains_left", &[s, a]);
        let y = self.mk_seq_skolem(tm, "contains_right", &[s, a]);
        let sort = tm.sort(a).clone();

        let xsy = tm.mk_concat_list(&[x, s, y], &sort);
        let eq_a = tm.mk_eq(a, xsy);
        let fml = tm.mk_or(vec![not_cnt, eq_a]);
        self.create_axiom(fml);

        let xty = tm.mk_concat_list(&[x, t, y], &sort);
        let eq_r = tm.mk_eq(r, xty);
        let fml = tm.mk_or(vec![not_cnt, eq_r]);
        self.create_axiom(fml);

        let tight = self.tightest_prefix(tm, s, x);
        let fml = tm.mk_or(vec![not_cnt, tight]);
        self.create_axiom(fml);

        let eq_same = tm.mk_eq(r, a);
        let fml = tm.mk_or(vec![cnt, eq_same]);
        self.create_axiom(fml);
    }

    /// Queue `len(a) + len(b) = len(a ++ b)` once per concat per scope.
    fn add_len_concat_axiom(&mut self, tm: &mut TermStore, c: TermId) {
        if !self.len_concat_axiomed.insert(c) {
            return;
        }
        self.trail.push(Undo::ForgetLenConcat(c));
        let (a, b) = tm.as_concat(c).expect("concatenation");
        let la = tm.mk_length(a);
        let lb = tm.mk_length(b);
        let lc = tm.mk_length(c);
        let sum = tm.mk_add(vec![la, lb]);
        let fml = tm.mk_eq(sum, lc);
        self.create_axiom(fml);
    }

    /// Length distributes over concatenation: fired when a merge involves a
    /// tracked length argument on one side and a concat on the other.
    fn new_eq_len_concat(&mut self, tm: &mut TermStore, n1: TermId, n2: TermId) {
        if !tm.sort(n1).is_seq() {
            return;
        }
        if self.tracked_lengths.contains(&n1) && tm.as_concat(n2).is_some() {
            self.add_len_concat_axiom(tm, n2);
        }
    }

    // ------------------------------------------------------------------
    // Scope discipline
    // ------------------------------------------------------------------

    fn apply_undo(&mut self, undo: Undo) {
        match undo {
            Undo::PopIneq => {
                self.ineqs.pop();
            }
            Undo::PopAxiom => {
                self.axioms.pop();
            }
            Undo::AxiomsHead(h) => {
                self.axioms_head = h;
            }
            Undo::Incomplete(prev) => {
                self.incomplete = prev;
            }
            Undo::ForgetInternalized(t) => {
                self.internalized.remove(&t);
            }
            Undo::ForgetTrackedLength(t) => {
                self.tracked_lengths.remove(&t);
            }
            Undo::ForgetLenAxiom(t) => {
                self.len_axiomed.remove(&t);
            }
            Undo::ForgetLenConcat(t) => {
                self.len_concat_axiomed.remove(&t);
            }
        }
    }
}

impl Default for SeqSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceTheory for SeqSolver {
    fn internalize_atom(&mut self, tm: &mut TermStore, atom: TermId) {
        self.internalize(tm, atom);
    }

    fn internalize_term(&mut self, tm: &mut TermStore, term: TermId) {
        self.internalize(tm, term);
    }

    fn apply_sort_cnstr(&mut self, tm: &mut TermStore, term: TermId) {
        self.internalize(tm, term);
    }

    fn new_eq(&mut self, tm: &mut TermStore, lhs: TermId, rhs: TermId) {
        if lhs == rhs {
            return;
        }
        let leaf = self.dm.mk_leaf(lhs, rhs);
        self.eqs.push(PendingEq {
            lhs,
            rhs,
            dep: Some(leaf),
        });
        self.new_eq_len_concat(tm, lhs, rhs);
        self.new_eq_len_concat(tm, rhs, lhs);
    }

    fn new_diseq(&mut self, tm: &mut TermStore, lhs: TermId, rhs: TermId) {
        let atom = tm.mk_eq(lhs, rhs);
        self.trail.push(Undo::PopIneq);
        self.ineqs.push(atom);
        self.exclude.update(lhs, rhs);
    }

    fn assign_literal(
        &mut self,
        tm: &mut TermStore,
        atom: TermId,
        value: bool,
    ) -> TheoryResult<()> {
        if !value {
            self.trail.push(Undo::PopIneq);
            self.ineqs.push(atom);
            return Ok(());
        }
        if let Some((a, b)) = tm.as_prefix(atom) {
            let p = self.mk_seq_skolem(tm, "prefix", &[a, b]);
            let f = tm.mk_concat(a, p);
            self.propagate_eq_from_lit(tm, TheoryLit::new(atom, true), f, b);
        } else if let Some((a, b)) = tm.as_suffix(atom) {
            let p = self.mk_seq_skolem(tm, "suffix", &[a, b]);
            let f = tm.mk_concat(p, a);
            self.propagate_eq_from_lit(tm, TheoryLit::new(atom, true), f, b);
        } else if let Some((a, b)) = tm.as_contains(atom) {
            let x = self.mk_seq_skolem(tm, "contains_left", &[a, b]);
            let y = self.mk_seq_skolem(tm, "contains_right", &[a, b]);
            let xa = tm.mk_concat(x, a);
            let f = tm.mk_concat(xa, y);
            self.propagate_eq_from_lit(tm, TheoryLit::new(atom, true), f, b);
        } else if tm.as_in_re(atom).is_some() {
            self.set_incomplete(tm, atom);
        } else {
            let head = match tm.get(atom) {
                TermData::App(sym, _) => sym.name().to_string(),
                _ => "non-application".to_string(),
            };
            return Err(TheoryError::UnexpectedAtom { atom, head });
        }
        Ok(())
    }

    fn relevant(&mut self, tm: &mut TermStore, term: TermId) {
        self.internalize(tm, term);
        if let Some(x) = tm.as_length(term) {
            if self.len_axiomed.insert(term) {
                self.trail.push(Undo::ForgetLenAxiom(term));
                self.add_len_axiom(tm, term);
            }
            // instantiate distributivity for concats the argument is already
            // equated to, regardless of callback order
            let mut concats: Vec<TermId> = Vec::new();
            for eq in self.eqs.iter() {
                if eq.lhs == x && tm.as_concat(eq.rhs).is_some() {
                    concats.push(eq.rhs);
                }
                if eq.rhs == x && tm.as_concat(eq.lhs).is_some() {
                    concats.push(eq.lhs);
                }
            }
            let (r, _) = self.rep.find(x, &mut self.dm);
            if tm.as_concat(r).is_some() {
                concats.push(r);
            }
            for c in concats {
                self.add_len_concat_axiom(tm, c);
            }
        }
    }

    fn push_scope(&mut self) {
        self.rep.push_scope();
        self.exclude.push_scope();
        self.dm.push_scope();
        self.trail_limits.push(self.trail.len());
        self.trail.push(Undo::AxiomsHead(self.axioms_head));
        self.eqs.push_scope();
    }

    fn pop_scopes(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let start = self.trail_limits[self.trail_limits.len() - n];
        let undos: Vec<Undo> = self.trail.split_off(start);
        for undo in undos.into_iter().rev() {
            self.apply_undo(undo);
        }
        self.trail_limits.truncate(self.trail_limits.len() - n);
        self.dm.pop_scopes(n);
        self.rep.pop_scopes(n);
        self.exclude.pop_scopes(n);
        self.eqs.pop_scopes(n);
        // a backtrack invalidates anything still in flight
        self.conflict = None;
        self.outbox.clear();
        self.splits.clear();
    }

    fn restart(&mut self) {
        // deductions are preserved across restarts
    }

    fn final_check(&mut self, tm: &mut TermStore) -> FinalCheckStatus {
        tracing::debug!(
            "seq final check: {} pending equations, {} negative constraints",
            self.eqs.len(),
            self.ineqs.len()
        );
        if !self.check_ineqs(tm) {
            return FinalCheckStatus::Continue;
        }
        if self.simplify_and_solve_eqs(tm) {
            return FinalCheckStatus::Continue;
        }
        if self.conflict.is_some() {
            return FinalCheckStatus::Continue;
        }
        if self.branch_variable(tm) {
            return FinalCheckStatus::Continue;
        }
        if self.split_variable() {
            return FinalCheckStatus::Continue;
        }
        if self.conflict.is_some() {
            return FinalCheckStatus::Continue;
        }
        if !self.eqs.is_empty() || self.incomplete {
            return FinalCheckStatus::GiveUp;
        }
        FinalCheckStatus::Done
    }

    fn can_propagate(&self) -> bool {
        self.axioms_head < self.axioms.len()
    }

    fn propagate(&mut self, tm: &mut TermStore) {
        while self.axioms_head < self.axioms.len() && self.conflict.is_none() {
            let fml = self.axioms[self.axioms_head];
            self.assert_axiom(tm, fml);
            self.axioms_head += 1;
        }
    }

    fn init_model(&mut self, tm: &TermStore) {
        self.factory = Some(SeqValueFactory::new(tm.string_constants()));
    }

    fn mk_value(&mut self, tm: &mut TermStore, term: TermId) -> TermId {
        self.model_completion = true;
        let (e, _) = self.canonize(tm, term);
        self.model_completion = false;
        e
    }

    fn conflict(&self) -> Option<&Justification> {
        self.conflict.as_ref()
    }

    fn take_propagations(&mut self) -> Vec<Propagation> {
        std::mem::take(&mut self.outbox)
    }

    fn take_splits(&mut self) -> Vec<SplitRequest> {
        std::mem::take(&mut self.splits)
    }

    fn collect_statistics(&self, st: &mut Statistics) {
        st.update("seq num splits", self.stats.num_splits);
        st.update("seq num reductions", self.stats.num_reductions);
    }

    fn display(&self, tm: &TermStore, out: &mut dyn fmt::Write) -> fmt::Result {
        if !self.eqs.is_empty() {
            writeln!(out, "Equations:")?;
            for eq in self.eqs.iter() {
                writeln!(out, "{} = {}", tm.display(eq.lhs), tm.display(eq.rhs))?;
            }
        }
        if !self.ineqs.is_empty() {
            writeln!(out, "Negative constraints:")?;
            for &a in &self.ineqs {
                writeln!(out, "{}", tm.display(a))?;
            }
        }
        writeln!(out, "Solved equations:")?;
        self.rep.display(tm, out)?;
        self.exclude.display(tm, out)?;
        Ok(())
    }
}
