//! libris - library catalog, borrow ledger and recommender
//!
//! Three cooperating parts share one SQLite database:
//! - The catalog stores books, rejects duplicates by content fingerprint,
//!   soft-deletes and searches them.
//! - The ledger records borrows and returns, keeps at most one open loan
//!   per book and answers overdue and history queries.
//! - The recommender ranks books by TF-IDF cosine similarity over their
//!   text, seeded by a book, a genre, an author or a borrower's history.
//!
//! # Modules
//!
//! - `core`: Database handle, shared errors, the [`Library`] facade
//! - `domain`: Data structures (Book, Loan, Fingerprint)
//! - `library`: Catalog and Ledger
//! - `recommend`: Tokenizer, TF-IDF vectors, Recommender
//! - `transfer`: CSV/JSON import and export, overdue log
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! libris add "Dune" "Frank Herbert" --genre "Science Fiction"
//! libris borrow 1 ana --days 14
//! libris recommend book 1 --top 5
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod library;
pub mod recommend;
pub mod transfer;

// Re-export main types at crate root for convenience
pub use core::{ErrorKind, Library, LibraryError, Result};
pub use domain::{Book, BookId, BookMetadata, BookUpdate, Fingerprint, Loan, LoanId, LoanStatus};
pub use library::{Catalog, Ledger, SearchFilter};
pub use recommend::{RecommendOptions, Recommendation, Recommender};
