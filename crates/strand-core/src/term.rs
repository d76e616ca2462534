//! Hash-consed terms, sorts and symbols.
//!
//! Terms are interned: building the same term twice returns the same
//! [`TermId`], so identity comparison is id comparison. The store also owns
//! the sequence-operator vocabulary (concatenation, literals, predicates,
//! length, index-of, replace, extract, regex membership) and the skolem
//! namespace used by the theory solver. Skolems are interned by their symbolic
//! name together with their argument tuple, so two requests for the same
//! witness yield the same term.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use num_bigint::BigInt;

/// An interned function or operator name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Create a symbol from a name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Symbol(Arc::from(name.as_ref()))
    }

    /// The symbol's name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sort (type) of a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sort {
    /// Booleans.
    Bool,
    /// Unbounded integers.
    Int,
    /// Alphabet elements.
    Char,
    /// Finite sequences over an element sort. Strings are `Seq Char`.
    Seq(Box<Sort>),
    /// Regular languages (opaque to the sequence engine).
    RegLan,
}

impl Sort {
    /// The sort of string literals.
    pub fn string() -> Self {
        Sort::Seq(Box::new(Sort::Char))
    }

    /// Whether this is a sequence sort.
    pub fn is_seq(&self) -> bool {
        matches!(self, Sort::Seq(_))
    }

    /// The element sort of a sequence sort.
    pub fn seq_elem(&self) -> Option<&Sort> {
        match self {
            Sort::Seq(elem) => Some(elem),
            _ => None,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Int => write!(f, "Int"),
            Sort::Char => write!(f, "Char"),
            Sort::Seq(elem) => write!(f, "(Seq {elem})"),
            Sort::RegLan => write!(f, "RegLan"),
        }
    }
}

/// A constant value embedded in a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// Boolean constant.
    Bool(bool),
    /// Integer constant.
    Int(BigInt),
    /// String (sequence-of-char) literal.
    Str(String),
}

/// The shape of a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermData {
    /// A constant.
    Const(Constant),
    /// An uninterpreted constant, named.
    Var(String),
    /// An operator or function applied to arguments.
    App(Symbol, Vec<TermId>),
}

/// Identity of an interned term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(u32);

impl TermId {
    /// The id as a vector index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

struct Term {
    data: TermData,
    sort: Sort,
}

// Operator vocabulary. The `seq.sk.` prefix reserves the skolem namespace.
const OP_EQ: &str = "=";
const OP_NOT: &str = "not";
const OP_AND: &str = "and";
const OP_OR: &str = "or";
const OP_ADD: &str = "+";
const OP_LE: &str = "<=";
const OP_GE: &str = ">=";
const OP_CONCAT: &str = "seq.++";
const OP_EMPTY: &str = "seq.empty";
const OP_UNIT: &str = "seq.unit";
const OP_LEN: &str = "seq.len";
const OP_PREFIX: &str = "seq.prefixof";
const OP_SUFFIX: &str = "seq.suffixof";
const OP_CONTAINS: &str = "seq.contains";
const OP_INDEX: &str = "seq.indexof";
const OP_REPLACE: &str = "seq.replace";
const OP_EXTRACT: &str = "seq.extract";
const OP_IN_RE: &str = "seq.in_re";
const SKOLEM_NS: &str = "seq.sk.";

/// Interning store for terms.
pub struct TermStore {
    terms: Vec<Term>,
    table: HashMap<(TermData, Sort), TermId>,
    symbols: HashMap<String, Symbol>,
    true_id: TermId,
    false_id: TermId,
}

impl TermStore {
    /// Create a store with the Boolean constants pre-interned.
    pub fn new() -> Self {
        let mut store = TermStore {
            terms: Vec::new(),
            table: HashMap::new(),
            symbols: HashMap::new(),
            true_id: TermId(0),
            false_id: TermId(0),
        };
        store.true_id = store.intern(TermData::Const(Constant::Bool(true)), Sort::Bool);
        store.false_id = store.intern(TermData::Const(Constant::Bool(false)), Sort::Bool);
        store
    }

    fn intern(&mut self, data: TermData, sort: Sort) -> TermId {
        if let Some(&id) = self.table.get(&(data.clone(), sort.clone())) {
            return id;
        }
        let id = TermId(self.terms.len() as u32);
        self.terms.push(Term {
            data: data.clone(),
            sort: sort.clone(),
        });
        self.table.insert((data, sort), id);
        id
    }

    fn symbol(&mut self, name: &str) -> Symbol {
        if let Some(sym) = self.symbols.get(name) {
            return sym.clone();
        }
        let sym = Symbol::new(name);
        self.symbols.insert(name.to_string(), sym.clone());
        sym
    }

    /// The shape of a term.
    pub fn get(&self, t: TermId) -> &TermData {
        &self.terms[t.index()].data
    }

    /// The sort of a term.
    pub fn sort(&self, t: TermId) -> &Sort {
        &self.terms[t.index()].sort
    }

    /// Number of interned terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the store holds no terms (never, after construction).
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    // ------------------------------------------------------------------
    // Boolean and arithmetic constructors
    // ------------------------------------------------------------------

    /// The `true` constant.
    pub fn true_term(&self) -> TermId {
        self.true_id
    }

    /// The `false` constant.
    pub fn false_term(&self) -> TermId {
        self.false_id
    }

    /// A Boolean constant.
    pub fn mk_bool(&mut self, b: bool) -> TermId {
        if b {
            self.true_id
        } else {
            self.false_id
        }
    }

    /// An integer constant.
    pub fn mk_int(&mut self, value: impl Into<BigInt>) -> TermId {
        self.intern(TermData::Const(Constant::Int(value.into())), Sort::Int)
    }

    /// A string literal, of sort `Seq Char`.
    pub fn mk_string(&mut self, value: impl Into<String>) -> TermId {
        self.intern(TermData::Const(Constant::Str(value.into())), Sort::string())
    }

    /// An uninterpreted constant of the given sort.
    pub fn mk_var(&mut self, name: impl Into<String>, sort: Sort) -> TermId {
        self.intern(TermData::Var(name.into()), sort)
    }

    /// A function application with an explicit result sort.
    pub fn mk_app(&mut self, sym: Symbol, args: Vec<TermId>, sort: Sort) -> TermId {
        self.intern(TermData::App(sym, args), sort)
    }

    fn mk_op(&mut self, op: &str, args: Vec<TermId>, sort: Sort) -> TermId {
        let sym = self.symbol(op);
        self.intern(TermData::App(sym, args), sort)
    }

    /// Equality atom; arguments are id-ordered so `a = b` and `b = a` intern
    /// to the same term.
    pub fn mk_eq(&mut self, a: TermId, b: TermId) -> TermId {
        debug_assert_eq!(self.sort(a), self.sort(b));
        let (a, b) = if b < a { (b, a) } else { (a, b) };
        self.mk_op(OP_EQ, vec![a, b], Sort::Bool)
    }

    /// Negation.
    pub fn mk_not(&mut self, a: TermId) -> TermId {
        self.mk_op(OP_NOT, vec![a], Sort::Bool)
    }

    /// N-ary conjunction.
    pub fn mk_and(&mut self, args: Vec<TermId>) -> TermId {
        self.mk_op(OP_AND, args, Sort::Bool)
    }

    /// N-ary disjunction.
    pub fn mk_or(&mut self, args: Vec<TermId>) -> TermId {
        self.mk_op(OP_OR, args, Sort::Bool)
    }

    /// N-ary integer addition.
    pub fn mk_add(&mut self, args: Vec<TermId>) -> TermId {
        self.mk_op(OP_ADD, args, Sort::Int)
    }

    /// Integer `a <= b`.
    pub fn mk_le(&mut self, a: TermId, b: TermId) -> TermId {
        self.mk_op(OP_LE, vec![a, b], Sort::Bool)
    }

    /// Integer `a >= b`.
    pub fn mk_ge(&mut self, a: TermId, b: TermId) -> TermId {
        self.mk_op(OP_GE, vec![a, b], Sort::Bool)
    }

    // ------------------------------------------------------------------
    // Sequence constructors
    // ------------------------------------------------------------------

    /// The empty sequence of the given sequence sort.
    pub fn mk_empty(&mut self, sort: Sort) -> TermId {
        debug_assert!(sort.is_seq());
        self.mk_op(OP_EMPTY, Vec::new(), sort)
    }

    /// A singleton sequence holding one element.
    pub fn mk_unit(&mut self, elem: TermId) -> TermId {
        let sort = Sort::Seq(Box::new(self.sort(elem).clone()));
        self.mk_op(OP_UNIT, vec![elem], sort)
    }

    /// Binary concatenation.
    pub fn mk_concat(&mut self, a: TermId, b: TermId) -> TermId {
        debug_assert!(self.sort(a).is_seq());
        debug_assert_eq!(self.sort(a), self.sort(b));
        let sort = self.sort(a).clone();
        self.mk_op(OP_CONCAT, vec![a, b], sort)
    }

    /// Right-folded concatenation of a slice of parts. An empty slice yields
    /// the empty sequence of `sort`.
    pub fn mk_concat_list(&mut self, parts: &[TermId], sort: &Sort) -> TermId {
        match parts.split_last() {
            None => self.mk_empty(sort.clone()),
            Some((&last, init)) => {
                let mut acc = last;
                for &p in init.iter().rev() {
                    acc = self.mk_concat(p, acc);
                }
                acc
            }
        }
    }

    /// Sequence length.
    pub fn mk_length(&mut self, a: TermId) -> TermId {
        debug_assert!(self.sort(a).is_seq());
        self.mk_op(OP_LEN, vec![a], Sort::Int)
    }

    /// `a` is a prefix of `b`.
    pub fn mk_prefix(&mut self, a: TermId, b: TermId) -> TermId {
        self.mk_op(OP_PREFIX, vec![a, b], Sort::Bool)
    }

    /// `a` is a suffix of `b`.
    pub fn mk_suffix(&mut self, a: TermId, b: TermId) -> TermId {
        self.mk_op(OP_SUFFIX, vec![a, b], Sort::Bool)
    }

    /// `a` occurs as a contiguous subsequence of `b`.
    pub fn mk_contains(&mut self, a: TermId, b: TermId) -> TermId {
        self.mk_op(OP_CONTAINS, vec![a, b], Sort::Bool)
    }

    /// First position of `s` in `t`, or -1.
    pub fn mk_index(&mut self, s: TermId, t: TermId) -> TermId {
        self.mk_op(OP_INDEX, vec![s, t], Sort::Int)
    }

    /// `a` with the first occurrence of `s` replaced by `t`.
    pub fn mk_replace(&mut self, a: TermId, s: TermId, t: TermId) -> TermId {
        let sort = self.sort(a).clone();
        self.mk_op(OP_REPLACE, vec![a, s, t], sort)
    }

    /// Subsequence of `s` starting at `i` of length `l`.
    pub fn mk_extract(&mut self, s: TermId, i: TermId, l: TermId) -> TermId {
        let sort = self.sort(s).clone();
        self.mk_op(OP_EXTRACT, vec![s, i, l], sort)
    }

    /// Regular-language membership.
    pub fn mk_in_re(&mut self, a: TermId, r: TermId) -> TermId {
        self.mk_op(OP_IN_RE, vec![a, r], Sort::Bool)
    }

    /// A theory-introduced skolem, interned by name and argument tuple.
    pub fn mk_skolem(&mut self, name: &str, args: &[TermId], sort: Sort) -> TermId {
        let full = format!("{SKOLEM_NS}{name}");
        let sym = self.symbol(&full);
        self.intern(TermData::App(sym, args.to_vec()), sort)
    }

    // ------------------------------------------------------------------
    // Recognizers
    // ------------------------------------------------------------------

    fn as_app(&self, t: TermId, op: &str) -> Option<&[TermId]> {
        match self.get(t) {
            TermData::App(sym, args) if sym.name() == op => Some(args),
            _ => None,
        }
    }

    /// Whether `t` is the `true` constant.
    pub fn is_true(&self, t: TermId) -> bool {
        t == self.true_id
    }

    /// Whether `t` is the `false` constant.
    pub fn is_false(&self, t: TermId) -> bool {
        t == self.false_id
    }

    /// The integer value of an integer constant.
    pub fn as_int(&self, t: TermId) -> Option<&BigInt> {
        match self.get(t) {
            TermData::Const(Constant::Int(i)) => Some(i),
            _ => None,
        }
    }

    /// The contents of a string literal.
    pub fn as_string(&self, t: TermId) -> Option<&str> {
        match self.get(t) {
            TermData::Const(Constant::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Whether `t` is an uninterpreted constant.
    pub fn is_uninterp(&self, t: TermId) -> bool {
        matches!(self.get(t), TermData::Var(_))
    }

    /// Both sides of a binary concatenation.
    pub fn as_concat(&self, t: TermId) -> Option<(TermId, TermId)> {
        self.as_app(t, OP_CONCAT).map(|args| (args[0], args[1]))
    }

    /// Whether `t` is an empty-sequence constant.
    pub fn is_empty_seq(&self, t: TermId) -> bool {
        self.as_app(t, OP_EMPTY).is_some()
    }

    /// The element of a singleton sequence.
    pub fn as_unit(&self, t: TermId) -> Option<TermId> {
        self.as_app(t, OP_UNIT).map(|args| args[0])
    }

    /// The argument of a length application.
    pub fn as_length(&self, t: TermId) -> Option<TermId> {
        self.as_app(t, OP_LEN).map(|args| args[0])
    }

    /// The two sides of an equality atom.
    pub fn as_eq(&self, t: TermId) -> Option<(TermId, TermId)> {
        self.as_app(t, OP_EQ).map(|args| (args[0], args[1]))
    }

    /// The argument of a negation.
    pub fn as_not(&self, t: TermId) -> Option<TermId> {
        self.as_app(t, OP_NOT).map(|args| args[0])
    }

    /// The conjuncts of a conjunction.
    pub fn as_and(&self, t: TermId) -> Option<&[TermId]> {
        self.as_app(t, OP_AND)
    }

    /// The disjuncts of a disjunction.
    pub fn as_or(&self, t: TermId) -> Option<&[TermId]> {
        self.as_app(t, OP_OR)
    }

    /// The summands of an addition.
    pub fn as_add(&self, t: TermId) -> Option<&[TermId]> {
        self.as_app(t, OP_ADD)
    }

    /// The sides of `<=`.
    pub fn as_le(&self, t: TermId) -> Option<(TermId, TermId)> {
        self.as_app(t, OP_LE).map(|args| (args[0], args[1]))
    }

    /// The sides of `>=`.
    pub fn as_ge(&self, t: TermId) -> Option<(TermId, TermId)> {
        self.as_app(t, OP_GE).map(|args| (args[0], args[1]))
    }

    /// The arguments of a prefix predicate.
    pub fn as_prefix(&self, t: TermId) -> Option<(TermId, TermId)> {
        self.as_app(t, OP_PREFIX).map(|args| (args[0], args[1]))
    }

    /// The arguments of a suffix predicate.
    pub fn as_suffix(&self, t: TermId) -> Option<(TermId, TermId)> {
        self.as_app(t, OP_SUFFIX).map(|args| (args[0], args[1]))
    }

    /// The arguments of a containment predicate.
    pub fn as_contains(&self, t: TermId) -> Option<(TermId, TermId)> {
        self.as_app(t, OP_CONTAINS).map(|args| (args[0], args[1]))
    }

    /// The arguments of an index-of application.
    pub fn as_index(&self, t: TermId) -> Option<(TermId, TermId)> {
        self.as_app(t, OP_INDEX).map(|args| (args[0], args[1]))
    }

    /// The arguments of a replace application.
    pub fn as_replace(&self, t: TermId) -> Option<(TermId, TermId, TermId)> {
        self.as_app(t, OP_REPLACE)
            .map(|args| (args[0], args[1], args[2]))
    }

    /// The arguments of an extract application.
    pub fn as_extract(&self, t: TermId) -> Option<(TermId, TermId, TermId)> {
        self.as_app(t, OP_EXTRACT)
            .map(|args| (args[0], args[1], args[2]))
    }

    /// The arguments of a regex membership atom.
    pub fn as_in_re(&self, t: TermId) -> Option<(TermId, TermId)> {
        self.as_app(t, OP_IN_RE).map(|args| (args[0], args[1]))
    }

    /// The name and arguments of a skolem term.
    pub fn as_skolem(&self, t: TermId) -> Option<(&str, &[TermId])> {
        match self.get(t) {
            TermData::App(sym, args) if sym.name().starts_with(SKOLEM_NS) => {
                Some((&sym.name()[SKOLEM_NS.len()..], args))
            }
            _ => None,
        }
    }

    /// Whether the head of `t` belongs to the sequence vocabulary.
    pub fn is_seq_op(&self, t: TermId) -> bool {
        matches!(self.get(t), TermData::App(sym, _) if sym.name().starts_with("seq."))
    }

    /// Flatten a concatenation tree into its leaves, left to right. A
    /// non-concatenation term yields a singleton spine.
    pub fn concat_spine(&self, t: TermId) -> Vec<TermId> {
        let mut out = Vec::new();
        self.spine_into(t, &mut out);
        out
    }

    fn spine_into(&self, t: TermId, out: &mut Vec<TermId>) {
        if let Some((l, r)) = self.as_concat(t) {
            self.spine_into(l, out);
            self.spine_into(r, out);
        } else {
            out.push(t);
        }
    }

    /// All string literals currently interned.
    pub fn string_constants(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().filter_map(|t| match &t.data {
            TermData::Const(Constant::Str(s)) => Some(s.as_str()),
            _ => None,
        })
    }

    /// A displayable rendering of `t`.
    pub fn display(&self, t: TermId) -> TermDisplay<'_> {
        TermDisplay { store: self, t }
    }
}

impl Default for TermStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders a term SMT-LIB style.
pub struct TermDisplay<'a> {
    store: &'a TermStore,
    t: TermId,
}

impl fmt::Display for TermDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.store.get(self.t) {
            TermData::Const(Constant::Bool(b)) => write!(f, "{b}"),
            TermData::Const(Constant::Int(i)) => write!(f, "{i}"),
            TermData::Const(Constant::Str(s)) => write!(f, "{s:?}"),
            TermData::Var(name) => write!(f, "{name}"),
            TermData::App(sym, args) if args.is_empty() => write!(f, "{sym}"),
            TermData::App(sym, args) => {
                write!(f, "({sym}")?;
                for &a in args {
                    write!(f, " {}", self.store.display(a))?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consing() {
        let mut tm = TermStore::new();
        let a = tm.mk_string("ab");
        let b = tm.mk_string("ab");
        assert_eq!(a, b);

        let x = tm.mk_var("x", Sort::string());
        let y = tm.mk_var("x", Sort::string());
        assert_eq!(x, y);

        let c1 = tm.mk_concat(a, x);
        let c2 = tm.mk_concat(b, y);
        assert_eq!(c1, c2);
        assert_ne!(c1, a);
    }

    #[test]
    fn test_eq_is_argument_ordered() {
        let mut tm = TermStore::new();
        let x = tm.mk_var("x", Sort::Int);
        let y = tm.mk_var("y", Sort::Int);
        assert_eq!(tm.mk_eq(x, y), tm.mk_eq(y, x));
    }

    #[test]
    fn test_skolem_identity() {
        let mut tm = TermStore::new();
        let a = tm.mk_var("a", Sort::string());
        let b = tm.mk_var("b", Sort::string());
        let s1 = tm.mk_skolem("contains_left", &[a, b], Sort::string());
        let s2 = tm.mk_skolem("contains_left", &[a, b], Sort::string());
        let s3 = tm.mk_skolem("contains_right", &[a, b], Sort::string());
        let s4 = tm.mk_skolem("contains_left", &[b, a], Sort::string());
        assert_eq!(s1, s2);
        assert_ne!(s1, s3);
        assert_ne!(s1, s4);

        let (name, args) = tm.as_skolem(s1).unwrap();
        assert_eq!(name, "contains_left");
        assert_eq!(args, &[a, b]);
        assert!(tm.as_skolem(a).is_none());
    }

    #[test]
    fn test_concat_spine() {
        let mut tm = TermStore::new();
        let x = tm.mk_var("x", Sort::string());
        let y = tm.mk_var("y", Sort::string());
        let z = tm.mk_var("z", Sort::string());
        let xy = tm.mk_concat(x, y);
        let xyz = tm.mk_concat(xy, z);
        assert_eq!(tm.concat_spine(xyz), vec![x, y, z]);
        assert_eq!(tm.concat_spine(x), vec![x]);
    }

    #[test]
    fn test_concat_list_folds_right() {
        let mut tm = TermStore::new();
        let sort = Sort::string();
        let x = tm.mk_var("x", sort.clone());
        let y = tm.mk_var("y", sort.clone());
        let z = tm.mk_var("z", sort.clone());

        let empty = tm.mk_concat_list(&[], &sort);
        assert!(tm.is_empty_seq(empty));

        let single = tm.mk_concat_list(&[x], &sort);
        assert_eq!(single, x);

        let yz = tm.mk_concat(y, z);
        let expected = tm.mk_concat(x, yz);
        assert_eq!(tm.mk_concat_list(&[x, y, z], &sort), expected);
    }

    #[test]
    fn test_sorts() {
        let mut tm = TermStore::new();
        let s = tm.mk_string("a");
        assert_eq!(tm.sort(s), &Sort::string());

        let n = tm.mk_length(s);
        assert_eq!(tm.sort(n), &Sort::Int);

        let c = tm.mk_var("c", Sort::Char);
        let u = tm.mk_unit(c);
        assert_eq!(tm.sort(u), &Sort::string());

        let p = tm.mk_prefix(s, u);
        assert_eq!(tm.sort(p), &Sort::Bool);
    }

    #[test]
    fn test_display() {
        let mut tm = TermStore::new();
        let x = tm.mk_var("x", Sort::string());
        let s = tm.mk_string("ab");
        let c = tm.mk_concat(s, x);
        assert_eq!(format!("{}", tm.display(c)), "(seq.++ \"ab\" x)");

        let e = tm.mk_empty(Sort::string());
        assert_eq!(format!("{}", tm.display(e)), "seq.empty");
    }

    #[test]
    fn test_string_constants() {
        let mut tm = TermStore::new();
        tm.mk_string("ab");
        tm.mk_string("cd");
        tm.mk_var("x", Sort::string());
        let mut consts: Vec<&str> = tm.string_constants().collect();
        consts.sort_unstable();
        assert_eq!(consts, vec!["ab", "cd"]);
    }
}
