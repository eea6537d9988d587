//! Core storage plumbing.
//!
//! This module contains:
//! - Database: SQLite connection, schema and transactions
//! - Library: Explicitly constructed handle tying the components together
//! - Error: Error taxonomy shared by every operation

pub mod database;
pub mod error;
pub mod library;

// Re-export commonly used types
pub use database::Database;
pub use error::{ErrorKind, LibraryError, Result};
pub use library::Library;
