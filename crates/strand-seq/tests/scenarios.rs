//! End-to-end scenarios driving the sequence engine the way a DPLL(T) host
//! would: internalize terms, assert merges and assignments, run final checks
//! and drain the propagations the engine produces.

use strand_core::{
    FinalCheckStatus, Propagation, SequenceTheory, Sort, TermId, TermStore, TheoryLit,
};
use strand_seq::SeqSolver;

fn axiom_formulas(solver: &mut SeqSolver, tm: &mut TermStore) -> Vec<TermId> {
    solver.propagate(tm);
    solver
        .take_propagations()
        .into_iter()
        .filter_map(|p| match p {
            Propagation::Axiom { formula } => Some(formula),
            _ => None,
        })
        .collect()
}

/// "ab" ++ x = "a" ++ y reduces and solves to y |-> "b" ++ x.
#[test]
fn reduction_solves_aligned_concat() {
    let mut tm = TermStore::new();
    let mut solver = SeqSolver::new();

    let x = tm.mk_var("x", Sort::string());
    let y = tm.mk_var("y", Sort::string());
    let ab = tm.mk_string("ab");
    let a = tm.mk_string("a");
    let lhs = tm.mk_concat(ab, x);
    let rhs = tm.mk_concat(a, y);

    solver.internalize_term(&mut tm, lhs);
    solver.internalize_term(&mut tm, rhs);
    solver.new_eq(&mut tm, lhs, rhs);

    assert_eq!(solver.final_check(&mut tm), FinalCheckStatus::Continue);
    assert_eq!(solver.pending_eqs(), 0);
    assert!(solver.conflict().is_none());
    assert_eq!(solver.final_check(&mut tm), FinalCheckStatus::Done);

    // the model reflects the solved form: y starts with "b"
    solver.init_model(&tm);
    let value = solver.mk_value(&mut tm, y);
    let s = tm.as_string(value).expect("a ground string value");
    assert!(s.starts_with('b'));
}

/// "ab" ++ x = "ac" ++ y conflicts at the second character; the conflict
/// justification names exactly the asserted equality.
#[test]
fn literal_mismatch_reports_conflict() {
    let mut tm = TermStore::new();
    let mut solver = SeqSolver::new();

    let x = tm.mk_var("x", Sort::string());
    let y = tm.mk_var("y", Sort::string());
    let ab = tm.mk_string("ab");
    let ac = tm.mk_string("ac");
    let lhs = tm.mk_concat(ab, x);
    let rhs = tm.mk_concat(ac, y);

    solver.internalize_term(&mut tm, lhs);
    solver.internalize_term(&mut tm, rhs);
    solver.new_eq(&mut tm, lhs, rhs);

    assert_eq!(solver.final_check(&mut tm), FinalCheckStatus::Continue);
    let conflict = solver.conflict().expect("a theory conflict");
    assert_eq!(conflict.eqs, vec![(lhs, rhs)]);
    assert!(conflict.lits.is_empty());
}

/// x = "ab" together with the disequality x != "ab": the engine first
/// solves the equation, then the disequality canonicalizes to true and the
/// corresponding literal is propagated positively against the host.
#[test]
fn ineq_propagates_once_equation_resolves() {
    let mut tm = TermStore::new();
    let mut solver = SeqSolver::new();

    let x = tm.mk_var("x", Sort::string());
    let ab = tm.mk_string("ab");
    solver.internalize_term(&mut tm, x);
    solver.internalize_term(&mut tm, ab);
    solver.new_eq(&mut tm, x, ab);
    solver.new_diseq(&mut tm, x, ab);

    // first pass: sigma picks up x |-> "ab"
    assert_eq!(solver.final_check(&mut tm), FinalCheckStatus::Continue);
    solver.take_propagations();

    // second pass: the negative constraint evaluates to true
    assert_eq!(solver.final_check(&mut tm), FinalCheckStatus::Continue);
    let props = solver.take_propagations();
    let atom = tm.mk_eq(x, ab);
    let lit_prop = props
        .iter()
        .find_map(|p| match p {
            Propagation::Lit { lit, just } => Some((lit, just)),
            _ => None,
        })
        .expect("a literal propagation");
    assert_eq!(*lit_prop.0, TheoryLit::new(atom, true));
    assert_eq!(lit_prop.1.eqs, vec![(x, ab)]);
}

/// Asserting contains(a, b) expands to b = x ++ a ++ y with interned
/// skolem witnesses, justified by the assigned literal.
#[test]
fn contains_assignment_expands_via_skolems() {
    let mut tm = TermStore::new();
    let mut solver = SeqSolver::new();

    let a = tm.mk_var("a", Sort::string());
    let b = tm.mk_var("b", Sort::string());
    let atom = tm.mk_contains(a, b);
    solver.internalize_atom(&mut tm, atom);
    solver.assign_literal(&mut tm, atom, true).unwrap();

    let props = solver.take_propagations();
    let x = tm.mk_skolem("contains_left", &[a, b], Sort::string());
    let y = tm.mk_skolem("contains_right", &[a, b], Sort::string());
    let xa = tm.mk_concat(x, a);
    let expected = tm.mk_concat(xa, y);

    let eq_prop = props
        .iter()
        .find_map(|p| match p {
            Propagation::Eq { lhs, rhs, just } => Some((*lhs, *rhs, just)),
            _ => None,
        })
        .expect("an equality propagation");
    assert_eq!(eq_prop.0, expected);
    assert_eq!(eq_prop.1, b);
    assert_eq!(eq_prop.2.lits, vec![TheoryLit::new(atom, true)]);
    assert!(eq_prop.2.eqs.is_empty());
}

/// z = x ++ y with len(z), len(x), len(y) relevant: the queued axioms
/// include the distributivity instance and the basic length axioms.
#[test]
fn length_distributes_over_concat() {
    let mut tm = TermStore::new();
    let mut solver = SeqSolver::new();

    let z = tm.mk_var("z", Sort::string());
    let x = tm.mk_var("x", Sort::string());
    let y = tm.mk_var("y", Sort::string());
    let c = tm.mk_concat(x, y);
    solver.apply_sort_cnstr(&mut tm, z);
    solver.internalize_term(&mut tm, c);
    solver.new_eq(&mut tm, z, c);

    let lz = tm.mk_length(z);
    solver.internalize_term(&mut tm, lz);
    solver.relevant(&mut tm, lz);
    let lx = tm.mk_length(x);
    solver.internalize_term(&mut tm, lx);
    solver.relevant(&mut tm, lx);
    let ly = tm.mk_length(y);
    solver.internalize_term(&mut tm, ly);
    solver.relevant(&mut tm, ly);

    let axioms = axiom_formulas(&mut solver, &mut tm);

    // len(x) + len(y) = len(x ++ y), modulo the congruence z = x ++ y
    let lc = tm.mk_length(c);
    let sum = tm.mk_add(vec![lx, ly]);
    let distrib = tm.mk_eq(sum, lc);
    assert!(axioms.contains(&distrib), "missing distributivity axiom");

    // len(x) >= 0
    let zero = tm.mk_int(0);
    let nonneg = tm.mk_ge(lx, zero);
    assert!(axioms.contains(&nonneg), "missing non-negativity axiom");

    // len(x) = 0 => x = empty (and the converse)
    let eq_zero = tm.mk_eq(zero, lx);
    let empty = tm.mk_empty(Sort::string());
    let eq_empty = tm.mk_eq(x, empty);
    let not_eq_zero = tm.mk_not(eq_zero);
    let fwd = tm.mk_or(vec![not_eq_zero, eq_empty]);
    assert!(axioms.contains(&fwd), "missing zero-iff-empty axiom");
    let not_eq_empty = tm.mk_not(eq_empty);
    let bwd = tm.mk_or(vec![not_eq_empty, eq_zero]);
    assert!(axioms.contains(&bwd), "missing empty-iff-zero axiom");
}

/// Internalizing index(s, t) eagerly queues the four index-of axioms.
#[test]
fn index_internalization_queues_four_axioms() {
    let mut tm = TermStore::new();
    let mut solver = SeqSolver::new();

    let s = tm.mk_var("s", Sort::string());
    let t = tm.mk_var("t", Sort::string());
    let i = tm.mk_index(s, t);
    solver.internalize_term(&mut tm, i);

    assert!(solver.can_propagate());
    let axioms = axiom_formulas(&mut solver, &mut tm);
    assert_eq!(axioms.len(), 4);

    // contains(s, t) \/ i = -1
    let cnt = tm.mk_contains(s, t);
    let minus_one = tm.mk_int(-1);
    let eq_m1 = tm.mk_eq(i, minus_one);
    let first = tm.mk_or(vec![cnt, eq_m1]);
    assert!(axioms.contains(&first));

    // !contains(s, t) \/ s = empty \/ t = x ++ s ++ y
    let x = tm.mk_skolem("contains_left", &[s, t], Sort::string());
    let y = tm.mk_skolem("contains_right", &[s, t], Sort::string());
    let xsy = tm.mk_concat_list(&[x, s, y], &Sort::string());
    let split = tm.mk_eq(t, xsy);
    let not_cnt = tm.mk_not(cnt);
    let empty = tm.mk_empty(Sort::string());
    let eq_empty = tm.mk_eq(s, empty);
    let third = tm.mk_or(vec![not_cnt, eq_empty, split]);
    assert!(axioms.contains(&third));

    // a second internalization does not requeue
    solver.internalize_term(&mut tm, i);
    assert!(!solver.can_propagate());
}

/// Replace mirrors the index-of axioms with an r = a fallback.
#[test]
fn replace_axioms() {
    let mut tm = TermStore::new();
    let mut solver = SeqSolver::new();

    let a = tm.mk_var("a", Sort::string());
    let s = tm.mk_var("s", Sort::string());
    let t = tm.mk_var("t", Sort::string());
    let r = tm.mk_replace(a, s, t);
    solver.internalize_term(&mut tm, r);

    let axioms = axiom_formulas(&mut solver, &mut tm);
    assert_eq!(axioms.len(), 4);

    let cnt = tm.mk_contains(s, a);
    let eq_same = tm.mk_eq(r, a);
    let fallback = tm.mk_or(vec![cnt, eq_same]);
    assert!(axioms.contains(&fallback), "missing r = a fallback");

    let x = tm.mk_skolem("contains_left", &[s, a], Sort::string());
    let y = tm.mk_skolem("contains_right", &[s, a], Sort::string());
    let xty = tm.mk_concat_list(&[x, t, y], &Sort::string());
    let eq_r = tm.mk_eq(r, xty);
    let not_cnt = tm.mk_not(cnt);
    let replaced = tm.mk_or(vec![not_cnt, eq_r]);
    assert!(axioms.contains(&replaced), "missing r = x ++ t ++ y axiom");
}

/// Prefix and suffix assignments expand through their skolem witnesses.
#[test]
fn prefix_suffix_expansion() {
    let mut tm = TermStore::new();
    let mut solver = SeqSolver::new();

    let a = tm.mk_var("a", Sort::string());
    let b = tm.mk_var("b", Sort::string());
    let atom = tm.mk_prefix(a, b);
    solver.internalize_atom(&mut tm, atom);
    solver.assign_literal(&mut tm, atom, true).unwrap();

    let props = solver.take_propagations();
    let p = tm.mk_skolem("prefix", &[a, b], Sort::string());
    let expected = tm.mk_concat(a, p);
    assert!(props
        .iter()
        .any(|pr| matches!(pr, Propagation::Eq { lhs, rhs, .. } if *lhs == expected && *rhs == b)));

    let atom = tm.mk_suffix(a, b);
    solver.internalize_atom(&mut tm, atom);
    solver.assign_literal(&mut tm, atom, true).unwrap();
    let props = solver.take_propagations();
    let p = tm.mk_skolem("suffix", &[a, b], Sort::string());
    let expected = tm.mk_concat(p, a);
    assert!(props
        .iter()
        .any(|pr| matches!(pr, Propagation::Eq { lhs, rhs, .. } if *lhs == expected && *rhs == b)));
}

/// A negatively asserted predicate lands among the negative constraints and
/// is refuted by propagation once it canonicalizes to true.
#[test]
fn negative_predicate_refutation() {
    let mut tm = TermStore::new();
    let mut solver = SeqSolver::new();

    let x = tm.mk_var("x", Sort::string());
    let ab = tm.mk_string("ab");
    let a = tm.mk_string("a");
    let atom = tm.mk_prefix(a, x);
    solver.internalize_atom(&mut tm, atom);
    solver.internalize_term(&mut tm, ab);
    solver.assign_literal(&mut tm, atom, false).unwrap();
    solver.new_eq(&mut tm, x, ab);

    // solve x |-> "ab", then prefix("a", "ab") evaluates to true
    assert_eq!(solver.final_check(&mut tm), FinalCheckStatus::Continue);
    solver.take_propagations();
    assert_eq!(solver.final_check(&mut tm), FinalCheckStatus::Continue);
    let props = solver.take_propagations();
    assert!(props
        .iter()
        .any(|p| matches!(p, Propagation::Lit { lit, .. } if lit.term == atom && lit.value)));
}

/// Branching walks candidate prefixes of a literal until the host accepts.
#[test]
fn branching_enumerates_literal_prefixes() {
    let mut tm = TermStore::new();
    let mut solver = SeqSolver::new();

    let x = tm.mk_var("x", Sort::string());
    let y = tm.mk_var("y", Sort::string());
    let abc = tm.mk_string("abc");
    let xy = tm.mk_concat(x, y);
    solver.internalize_term(&mut tm, xy);
    solver.internalize_term(&mut tm, abc);
    solver.new_eq(&mut tm, xy, abc);

    let empty = tm.mk_empty(Sort::string());
    let mut proposed = Vec::new();
    for _ in 0..6 {
        let status = solver.final_check(&mut tm);
        if status != FinalCheckStatus::Continue {
            break;
        }
        let splits = solver.take_splits();
        if splits.is_empty() {
            break;
        }
        assert_eq!(splits.len(), 1);
        proposed.push(splits[0]);
        // the host refutes every candidate
        solver.new_diseq(&mut tm, splits[0].lhs, splits[0].rhs);
    }

    // first x = empty, then x = eps ++ "a", x = eps ++ "ab", x = "abc"
    assert!(proposed.len() >= 4);
    assert_eq!(proposed[0].rhs, empty);
    let a = tm.mk_string("a");
    let eps_a = tm.mk_concat(empty, a);
    assert_eq!(proposed[1].rhs, eps_a);
    let ab = tm.mk_string("ab");
    let eps_ab = tm.mk_concat(empty, ab);
    assert_eq!(proposed[2].rhs, eps_ab);
    assert_eq!(proposed[3].rhs, abc);
    assert!(proposed.iter().all(|s| s.lhs == x));
}
