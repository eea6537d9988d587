//! SQLite-backed storage shared by the catalog and the ledger.
//!
//! One connection sits behind a mutex. Every public operation holds the
//! lock for the duration of its transaction, which serializes writers
//! (including racing borrows of the same book). The partial unique indexes
//! below repeat the two invariants at the storage level.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};

use super::error::Result;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS books (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        author TEXT NOT NULL,
        genre TEXT NOT NULL DEFAULT '',
        isbn TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        fingerprint TEXT NOT NULL,
        deleted INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS loans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        book_id INTEGER NOT NULL,
        borrower_id TEXT NOT NULL,
        borrowed_at TEXT NOT NULL,
        due_date TEXT NOT NULL,
        returned_at TEXT,
        FOREIGN KEY (book_id) REFERENCES books(id)
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_books_live_fingerprint
        ON books(fingerprint) WHERE deleted = 0;
    CREATE INDEX IF NOT EXISTS idx_loans_book ON loans(book_id);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_loans_open_book
        ON loans(book_id) WHERE returned_at IS NULL;
    CREATE INDEX IF NOT EXISTS idx_loans_borrower ON loans(borrower_id);
"#;

/// Owner of the SQLite connection
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database file and apply the schema
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(conn)
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-transaction rolls back on drop, so the data behind a
        // poisoned lock is still consistent.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run read-only work against the connection
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock();
        f(&conn)
    }

    /// Run work inside an immediate transaction; commits only on `Ok`
    pub(crate) fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_schema_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("books.db");

        Database::open(&path).unwrap();
        let db = Database::open(&path).unwrap();

        let tables: i64 = db
            .read(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('books', 'loans')",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let db = Database::open_in_memory().unwrap();

        let result: Result<()> = db.write(|tx| {
            tx.execute(
                "INSERT INTO books (title, author, fingerprint, created_at, updated_at)
                 VALUES ('t', 'a', 'fp', '2024-01-01', '2024-01-01')",
                [],
            )?;
            Err(crate::core::LibraryError::invalid("test", "forced failure"))
        });
        assert!(result.is_err());

        let count: i64 = db
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_open_loan_index_rejects_second_open_loan() {
        let db = Database::open_in_memory().unwrap();

        let result = db.write(|tx| {
            tx.execute(
                "INSERT INTO books (title, author, fingerprint, created_at, updated_at)
                 VALUES ('t', 'a', 'fp', '2024-01-01', '2024-01-01')",
                [],
            )?;
            let book_id = tx.last_insert_rowid();
            for borrower in ["a", "b"] {
                tx.execute(
                    "INSERT INTO loans (book_id, borrower_id, borrowed_at, due_date)
                     VALUES (?1, ?2, '2024-01-01', '2024-01-15')",
                    rusqlite::params![book_id, borrower],
                )?;
            }
            Ok(())
        });

        match result {
            Err(crate::core::LibraryError::Storage(e)) => {
                assert!(crate::core::error::is_constraint_violation(&e))
            }
            other => panic!("expected constraint violation, got {:?}", other),
        }
    }
}
