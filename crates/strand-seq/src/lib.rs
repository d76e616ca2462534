//! Strand seq - decision procedure for the theory of finite sequences
//!
//! A passive theory plug-in for a DPLL(T)-style host: the host internalizes
//! terms, reports merges, splits and truth assignments, and asks for a final
//! verdict; the solver answers with propagated literals and equalities,
//! quantifier-free axioms over skolem witnesses, case-split requests and
//! conflict justifications.
//!
//! The solving core keeps asserted sequence equalities in a solved form:
//!
//! - **Canonicalization** expands terms under the current substitution and
//!   normalizes them with the sequence rewriter, accumulating the dependency
//!   (the set of host equalities) that justifies the result.
//! - **Reduction** cancels matching prefixes and suffixes of an equation's
//!   concatenation spines and detects literal conflicts.
//! - **Unit solving** turns `x = t` into a binding when `x` is a variable
//!   that does not occur in `t`.
//! - **Branching** proposes case splits (`x = empty`, literal prefixes,
//!   alignment prefixes) when reduction gets stuck.
//!
//! Every mutation is either trailed or lives in a per-scope frame, so
//! `pop_scopes` restores the solver exactly to the matching push.
//!
//! ## Example
//!
//! ```
//! use strand_core::{FinalCheckStatus, SequenceTheory, Sort, TermStore};
//! use strand_seq::SeqSolver;
//!
//! let mut tm = TermStore::new();
//! let mut solver = SeqSolver::new();
//!
//! // assert "ab" ++ x = "a" ++ y
//! let x = tm.mk_var("x", Sort::string());
//! let y = tm.mk_var("y", Sort::string());
//! let ab = tm.mk_string("ab");
//! let a = tm.mk_string("a");
//! let lhs = tm.mk_concat(ab, x);
//! let rhs = tm.mk_concat(a, y);
//! solver.internalize_term(&mut tm, lhs);
//! solver.internalize_term(&mut tm, rhs);
//! solver.new_eq(&mut tm, lhs, rhs);
//!
//! // the equation reduces and solves: y |-> "b" ++ x
//! assert_eq!(solver.final_check(&mut tm), FinalCheckStatus::Continue);
//! assert_eq!(solver.final_check(&mut tm), FinalCheckStatus::Done);
//! assert_eq!(solver.pending_eqs(), 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dependency;
pub mod eqs;
pub mod exclusion;
pub mod model;
pub mod solution;
pub mod solver;

pub use dependency::{DepId, DepManager};
pub use eqs::{EqStore, PendingEq};
pub use exclusion::ExclusionTable;
pub use model::SeqValueFactory;
pub use solution::SolutionMap;
pub use solver::{SeqSolver, SeqStats};
