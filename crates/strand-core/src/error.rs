//! Error types for theory solvers.

use thiserror::Error;

use crate::term::TermId;

/// Host protocol violations observed by a theory solver.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TheoryError {
    /// The host delivered a truth assignment for an atom whose head symbol
    /// the theory does not own.
    #[error("theory does not own atom {atom:?} ({head})")]
    UnexpectedAtom {
        /// The offending atom.
        atom: TermId,
        /// Its head, for diagnostics.
        head: String,
    },
}

/// Result type for theory operations.
pub type TheoryResult<T> = Result<T, TheoryError>;
