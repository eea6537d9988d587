//! Explicitly constructed handle over one library database.
//!
//! Every instance is isolated; tests open as many in-memory libraries as
//! they like. Cloning is cheap and shares the underlying connection.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::database::Database;
use super::error::Result;
use crate::library::{Catalog, Ledger};
use crate::recommend::Recommender;

/// Catalog, ledger and recommender over a shared database
#[derive(Debug, Clone)]
pub struct Library {
    catalog: Catalog,
    ledger: Ledger,
}

impl Library {
    /// Open (or create) a library stored at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::open(path)?;
        info!(path = %path.display(), "Opened library database");
        Ok(Self::from_database(Arc::new(db)))
    }

    /// Open a private in-memory library
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Arc::new(Database::open_in_memory()?)))
    }

    /// Build from an existing database handle
    pub fn from_database(db: Arc<Database>) -> Self {
        Self {
            catalog: Catalog::new(db.clone()),
            ledger: Ledger::new(db),
        }
    }

    /// Book records
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Loans and borrow state
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Similarity recommender reading from this library
    pub fn recommender(&self) -> Recommender {
        Recommender::new(self.catalog.clone(), self.ledger.clone())
    }
}
