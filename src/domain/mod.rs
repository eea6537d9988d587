//! Domain types for the library catalog.
//!
//! This module contains the core data structures:
//! - Book: Catalog entries and their duplicate fingerprint
//! - Loan: Borrow records and derived overdue state

pub mod book;
pub mod loan;

// Re-export commonly used types
pub use book::{normalize, Book, BookId, BookMetadata, BookUpdate, Fingerprint};
pub use loan::{Loan, LoanId, LoanStatus};
