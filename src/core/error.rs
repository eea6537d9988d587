//! Error taxonomy for catalog, ledger and recommender operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{BookId, Fingerprint, LoanId};

/// Errors surfaced by library operations
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Book not found: {0}")]
    BookNotFound(BookId),

    #[error("Loan not found: {0}")]
    LoanNotFound(LoanId),

    #[error("Duplicate book: fingerprint {fingerprint} already belongs to book {existing}")]
    Duplicate {
        fingerprint: Fingerprint,
        existing: BookId,
    },

    #[error("Book {book_id} is not available: already on loan {loan_id}")]
    BookUnavailable { book_id: BookId, loan_id: LoanId },

    #[error("Book {book_id} has an open loan {loan_id} and cannot be removed")]
    OpenLoan { book_id: BookId, loan_id: LoanId },

    #[error("Book {0} has been removed from the catalog")]
    BookRemoved(BookId),

    #[error("Loan {loan_id} was already returned at {returned_at}")]
    AlreadyReturned {
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    },

    #[error("Book {0} is not currently borrowed")]
    NotBorrowed(BookId),

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`LibraryError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown book or loan id
    NotFound,

    /// Fingerprint collision
    Duplicate,

    /// Borrow-state invariant would be violated
    Conflict,

    /// Malformed query, filter or parameter
    Input,

    /// Underlying database failure
    Storage,
}

impl LibraryError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BookNotFound(_) | Self::LoanNotFound(_) => ErrorKind::NotFound,
            Self::Duplicate { .. } => ErrorKind::Duplicate,
            Self::BookUnavailable { .. }
            | Self::OpenLoan { .. }
            | Self::BookRemoved(_)
            | Self::AlreadyReturned { .. }
            | Self::NotBorrowed(_) => ErrorKind::Conflict,
            Self::InvalidInput { .. } => ErrorKind::Input,
            Self::Storage(_) | Self::Io(_) => ErrorKind::Storage,
        }
    }

    /// True for state-invariant violations
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

/// Result alias for library operations
pub type Result<T, E = LibraryError> = std::result::Result<T, E>;

/// Reject blank strings for a required field
pub(crate) fn require_non_blank(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LibraryError::invalid(field, "must not be blank"));
    }
    Ok(())
}

/// True when SQLite refused a write because of a UNIQUE/CHECK/FK constraint
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
