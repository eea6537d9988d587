//! Catalog store and borrow ledger.
//!
//! Both components share one [`crate::core::Database`]:
//!
//! ```text
//! books.db
//! ├── books   # owned by Catalog (fingerprint-deduplicated, soft-deleted)
//! └── loans   # owned by Ledger (at most one open loan per book)
//! ```

pub mod catalog;
pub mod ledger;

pub use catalog::{Catalog, MatchField, SearchFilter, SearchHit, SearchResults};
pub use ledger::Ledger;
