//! Canonical file locations for libris.
//!
//! Single source of truth - import this instead of hardcoding paths.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use libris::config::paths;
//!
//! let db = paths::database()?;
//! let log = paths::overdue_log()?;
//! ```
//!
//! ## Layout (defaults)
//!
//! ```text
//! ~/.libris/
//! ├── books.db              # catalog + ledger (SQLite)
//! ├── logs/overdue.log      # appended overdue reports
//! └── exports/              # books.csv / books.json dumps
//! ```

use std::path::PathBuf;

use anyhow::Result;

use super::config;

/// SQLite database file
pub fn database() -> Result<PathBuf> {
    Ok(config()?.database.clone())
}

/// Overdue report log
pub fn overdue_log() -> Result<PathBuf> {
    Ok(config()?.overdue_log.clone())
}

/// Directory for catalog dumps
pub fn exports_dir() -> Result<PathBuf> {
    Ok(config()?.exports.clone())
}

/// Default dump file for a format extension (e.g. `exports/books.csv`)
pub fn default_export(extension: &str) -> Result<PathBuf> {
    Ok(exports_dir()?.join(format!("books.{extension}")))
}
