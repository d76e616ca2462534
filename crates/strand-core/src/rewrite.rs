//! Sequence rewriting.
//!
//! [`SeqRewriter`] normalizes terms bottom-up: concatenation trees are
//! flattened and right-associated, empty parts dropped and adjacent string
//! literals fused; the sequence predicates and `length` evaluate on literals;
//! integer and Boolean connectives fold constants. [`SeqRewriter::reduce_eq`]
//! reduces a sequence equation by cancelling matching prefixes and suffixes
//! of the two concatenation spines, failing on a literal mismatch at an
//! aligned position.

use std::collections::VecDeque;

use hashbrown::HashMap;
use num_bigint::BigInt;
use num_traits::Zero;

use crate::term::{Sort, TermData, TermId, TermStore};

/// Byte length of the longest common prefix of two strings.
fn common_prefix(a: &str, b: &str) -> usize {
    let mut n = 0;
    let mut bs = b.chars();
    for (i, ca) in a.char_indices() {
        match bs.next() {
            Some(cb) if cb == ca => n = i + ca.len_utf8(),
            _ => break,
        }
    }
    n
}

/// Byte length of the longest common suffix of two strings.
fn common_suffix(a: &str, b: &str) -> usize {
    let mut n = 0;
    let mut ar = a.chars().rev();
    let mut br = b.chars().rev();
    loop {
        match (ar.next(), br.next()) {
            (Some(x), Some(y)) if x == y => n += x.len_utf8(),
            _ => break,
        }
    }
    n
}

/// Bottom-up normalizer for the sequence fragment.
#[derive(Debug, Default)]
pub struct SeqRewriter;

impl SeqRewriter {
    /// Create a rewriter.
    #[must_use]
    pub fn new() -> Self {
        SeqRewriter
    }

    /// Normalize a term.
    pub fn rewrite(&self, tm: &mut TermStore, t: TermId) -> TermId {
        let mut memo = HashMap::new();
        self.rw(tm, t, &mut memo)
    }

    fn rw(&self, tm: &mut TermStore, t: TermId, memo: &mut HashMap<TermId, TermId>) -> TermId {
        if let Some(&r) = memo.get(&t) {
            return r;
        }
        let result = match tm.get(t).clone() {
            TermData::Const(_) => {
                // the empty string literal and the empty-sequence constant
                // must not coexist in normal forms
                if tm.as_string(t).is_some_and(str::is_empty) {
                    tm.mk_empty(Sort::string())
                } else {
                    t
                }
            }
            TermData::Var(_) => t,
            TermData::App(sym, args) => {
                let new_args: Vec<TermId> = args.iter().map(|&a| self.rw(tm, a, memo)).collect();
                let t2 = if new_args == args {
                    t
                } else {
                    let sort = tm.sort(t).clone();
                    tm.mk_app(sym, new_args, sort)
                };
                self.simplify(tm, t2, memo)
            }
        };
        memo.insert(t, result);
        result
    }

    /// Head simplification; `t`'s arguments are already in normal form.
    fn simplify(&self, tm: &mut TermStore, t: TermId, memo: &mut HashMap<TermId, TermId>) -> TermId {
        if tm.as_concat(t).is_some() {
            return self.normalize_concat(tm, t);
        }
        if let Some((a, b)) = tm.as_eq(t) {
            return self.simplify_eq_atom(tm, t, a, b);
        }
        if let Some(x) = tm.as_length(t) {
            return self.simplify_length(tm, t, x, memo);
        }
        if let Some((a, b)) = tm.as_prefix(t) {
            if tm.is_empty_seq(a) {
                return tm.true_term();
            }
            if let (Some(sa), Some(sb)) = (tm.as_string(a), tm.as_string(b)) {
                let v = sb.starts_with(sa);
                return tm.mk_bool(v);
            }
            if tm.is_empty_seq(b) && self.definitely_nonempty(tm, a) {
                return tm.false_term();
            }
            return t;
        }
        if let Some((a, b)) = tm.as_suffix(t) {
            if tm.is_empty_seq(a) {
                return tm.true_term();
            }
            if let (Some(sa), Some(sb)) = (tm.as_string(a), tm.as_string(b)) {
                let v = sb.ends_with(sa);
                return tm.mk_bool(v);
            }
            if tm.is_empty_seq(b) && self.definitely_nonempty(tm, a) {
                return tm.false_term();
            }
            return t;
        }
        if let Some((a, b)) = tm.as_contains(t) {
            // contains(a, b): a occurs as a contiguous subsequence of b
            if tm.is_empty_seq(a) {
                return tm.true_term();
            }
            if let (Some(sa), Some(sb)) = (tm.as_string(a), tm.as_string(b)) {
                let v = sb.contains(sa);
                return tm.mk_bool(v);
            }
            if tm.is_empty_seq(b) && self.definitely_nonempty(tm, a) {
                return tm.false_term();
            }
            return t;
        }
        if let Some(x) = tm.as_not(t) {
            if tm.is_true(x) {
                return tm.false_term();
            }
            if tm.is_false(x) {
                return tm.true_term();
            }
            if let Some(inner) = tm.as_not(x) {
                return inner;
            }
            return t;
        }
        if let Some(args) = tm.as_and(t).map(<[TermId]>::to_vec) {
            let mut kept = Vec::new();
            for a in args {
                if tm.is_false(a) {
                    return tm.false_term();
                }
                if !tm.is_true(a) {
                    kept.push(a);
                }
            }
            return match kept.len() {
                0 => tm.true_term(),
                1 => kept[0],
                _ => tm.mk_and(kept),
            };
        }
        if let Some(args) = tm.as_or(t).map(<[TermId]>::to_vec) {
            let mut kept = Vec::new();
            for a in args {
                if tm.is_true(a) {
                    return tm.true_term();
                }
                if !tm.is_false(a) {
                    kept.push(a);
                }
            }
            return match kept.len() {
                0 => tm.false_term(),
                1 => kept[0],
                _ => tm.mk_or(kept),
            };
        }
        if let Some(args) = tm.as_add(t).map(<[TermId]>::to_vec) {
            return self.simplify_add(tm, t, &args);
        }
        if let Some((a, b)) = tm.as_le(t) {
            if let (Some(x), Some(y)) = (tm.as_int(a), tm.as_int(b)) {
                let v = x <= y;
                return tm.mk_bool(v);
            }
            return t;
        }
        if let Some((a, b)) = tm.as_ge(t) {
            if let (Some(x), Some(y)) = (tm.as_int(a), tm.as_int(b)) {
                let v = x >= y;
                return tm.mk_bool(v);
            }
            return t;
        }
        t
    }

    /// Whether a normalized term denotes a sequence of length >= 1.
    fn definitely_nonempty(&self, tm: &TermStore, t: TermId) -> bool {
        tm.as_string(t).is_some_and(|s| !s.is_empty()) || tm.as_unit(t).is_some()
    }

    fn normalize_concat(&self, tm: &mut TermStore, t: TermId) -> TermId {
        let sort = tm.sort(t).clone();
        let spine = tm.concat_spine(t);
        let mut parts: Vec<TermId> = Vec::new();
        for p in spine {
            if tm.is_empty_seq(p) || tm.as_string(p).is_some_and(str::is_empty) {
                continue;
            }
            let fused = match (
                parts.last().and_then(|&prev| tm.as_string(prev)),
                tm.as_string(p),
            ) {
                (Some(a), Some(b)) => Some(format!("{a}{b}")),
                _ => None,
            };
            if let Some(s) = fused {
                let lit = tm.mk_string(s);
                *parts.last_mut().expect("fused onto an existing part") = lit;
            } else {
                parts.push(p);
            }
        }
        tm.mk_concat_list(&parts, &sort)
    }

    fn simplify_eq_atom(&self, tm: &mut TermStore, t: TermId, a: TermId, b: TermId) -> TermId {
        if a == b {
            return tm.true_term();
        }
        if let (TermData::Const(ca), TermData::Const(cb)) = (tm.get(a), tm.get(b)) {
            if ca != cb {
                return tm.false_term();
            }
        }
        let empty_vs_nonempty = (tm.is_empty_seq(a) && self.definitely_nonempty(tm, b))
            || (tm.is_empty_seq(b) && self.definitely_nonempty(tm, a));
        if empty_vs_nonempty {
            return tm.false_term();
        }
        t
    }

    fn simplify_length(
        &self,
        tm: &mut TermStore,
        t: TermId,
        x: TermId,
        memo: &mut HashMap<TermId, TermId>,
    ) -> TermId {
        if let Some(n) = tm.as_string(x).map(|s| s.chars().count()) {
            return tm.mk_int(n as i64);
        }
        if tm.is_empty_seq(x) {
            return tm.mk_int(0);
        }
        if tm.as_unit(x).is_some() {
            return tm.mk_int(1);
        }
        if let Some((l, r)) = tm.as_concat(x) {
            let ll = tm.mk_length(l);
            let ll = self.rw(tm, ll, memo);
            let lr = tm.mk_length(r);
            let lr = self.rw(tm, lr, memo);
            let sum = tm.mk_add(vec![ll, lr]);
            return self.rw(tm, sum, memo);
        }
        t
    }

    fn simplify_add(&self, tm: &mut TermStore, t: TermId, args: &[TermId]) -> TermId {
        let mut sum = BigInt::zero();
        let mut rest: Vec<TermId> = Vec::new();
        let mut nconsts = 0usize;
        for &a in args {
            if let Some(i) = tm.as_int(a) {
                sum += i;
                nconsts += 1;
            } else {
                rest.push(a);
            }
        }
        if nconsts == 0 {
            return t;
        }
        if rest.is_empty() {
            return tm.mk_int(sum);
        }
        if sum.is_zero() {
            return if rest.len() == 1 {
                rest[0]
            } else {
                tm.mk_add(rest)
            };
        }
        rest.push(tm.mk_int(sum));
        tm.mk_add(rest)
    }

    /// Reduce the equation `l = r` to residual subequations.
    ///
    /// Returns `None` when the equation is inconsistent (a literal mismatch
    /// at an aligned position, or one side provably shorter). Returns
    /// `Some(vec![])` when the equation is discharged. Unit elements cancel
    /// into element subequations.
    pub fn reduce_eq(
        &self,
        tm: &mut TermStore,
        l: TermId,
        r: TermId,
    ) -> Option<Vec<(TermId, TermId)>> {
        let keep = |tm: &TermStore, t: TermId| {
            !tm.is_empty_seq(t) && !tm.as_string(t).is_some_and(str::is_empty)
        };
        let mut ls: VecDeque<TermId> = tm
            .concat_spine(l)
            .into_iter()
            .filter(|&p| keep(tm, p))
            .collect();
        let mut rs: VecDeque<TermId> = tm
            .concat_spine(r)
            .into_iter()
            .filter(|&p| keep(tm, p))
            .collect();
        let mut out = Vec::new();

        // cancel matching fronts
        loop {
            let (a, b) = match (ls.front().copied(), rs.front().copied()) {
                (Some(a), Some(b)) => (a, b),
                _ => break,
            };
            if a == b {
                ls.pop_front();
                rs.pop_front();
                continue;
            }
            let lits = (
                tm.as_string(a).map(str::to_owned),
                tm.as_string(b).map(str::to_owned),
            );
            if let (Some(sa), Some(sb)) = lits {
                let n = common_prefix(&sa, &sb);
                if n == 0 {
                    return None;
                }
                ls.pop_front();
                rs.pop_front();
                if n < sb.len() {
                    let rest = tm.mk_string(&sb[n..]);
                    rs.push_front(rest);
                }
                if n < sa.len() {
                    let rest = tm.mk_string(&sa[n..]);
                    ls.push_front(rest);
                }
                continue;
            }
            if let (Some(ea), Some(eb)) = (tm.as_unit(a), tm.as_unit(b)) {
                ls.pop_front();
                rs.pop_front();
                out.push((ea, eb));
                continue;
            }
            break;
        }

        // cancel matching backs
        loop {
            let (a, b) = match (ls.back().copied(), rs.back().copied()) {
                (Some(a), Some(b)) => (a, b),
                _ => break,
            };
            if a == b {
                ls.pop_back();
                rs.pop_back();
                continue;
            }
            let lits = (
                tm.as_string(a).map(str::to_owned),
                tm.as_string(b).map(str::to_owned),
            );
            if let (Some(sa), Some(sb)) = lits {
                let n = common_suffix(&sa, &sb);
                if n == 0 {
                    return None;
                }
                ls.pop_back();
                rs.pop_back();
                if n < sb.len() {
                    let rest = tm.mk_string(&sb[..sb.len() - n]);
                    rs.push_back(rest);
                }
                if n < sa.len() {
                    let rest = tm.mk_string(&sa[..sa.len() - n]);
                    ls.push_back(rest);
                }
                continue;
            }
            if let (Some(ea), Some(eb)) = (tm.as_unit(a), tm.as_unit(b)) {
                ls.pop_back();
                rs.pop_back();
                out.push((ea, eb));
                continue;
            }
            break;
        }

        // one side exhausted against definite content on the other
        if ls.is_empty() != rs.is_empty() {
            let other = if ls.is_empty() { &rs } else { &ls };
            if other.iter().any(|&p| self.definitely_nonempty(tm, p)) {
                return None;
            }
        }
        if ls.is_empty() && rs.is_empty() {
            return Some(out);
        }
        let sort = tm.sort(l).clone();
        let ls: Vec<TermId> = ls.into();
        let rs: Vec<TermId> = rs.into();
        let l2 = tm.mk_concat_list(&ls, &sort);
        let r2 = tm.mk_concat_list(&rs, &sort);
        out.push((l2, r2));
        Some(out)
    }
}
