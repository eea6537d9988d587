//! Borrow ledger: loan lifecycle per book.
//!
//! ```text
//! Available ──borrow──▶ Borrowed ──return──▶ Available
//!                          │
//!                   (due date passes)
//!                          ▼
//!                       Overdue ──return──▶ Available
//! ```
//!
//! At most one open loan exists per book. The check runs under the
//! database lock, and a partial unique index on open loans backs it up.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row, Transaction};
use tracing::{debug, info, instrument};

use super::catalog::open_loan_id;
use crate::core::error::{is_constraint_violation, require_non_blank, LibraryError, Result};
use crate::core::Database;
use crate::domain::{BookId, Loan, LoanId};

const LOAN_COLUMNS: &str = "id, book_id, borrower_id, borrowed_at, due_date, returned_at";

fn loan_from_row(row: &Row<'_>) -> rusqlite::Result<Loan> {
    Ok(Loan {
        id: LoanId(row.get(0)?),
        book_id: BookId(row.get(1)?),
        borrower_id: row.get(2)?,
        borrowed_at: row.get(3)?,
        due_date: row.get(4)?,
        returned_at: row.get(5)?,
    })
}

fn load_loan(conn: &rusqlite::Connection, id: LoanId) -> Result<Loan> {
    conn.query_row(
        &format!("SELECT {LOAN_COLUMNS} FROM loans WHERE id = ?1"),
        params![id.get()],
        loan_from_row,
    )
    .optional()?
    .ok_or(LibraryError::LoanNotFound(id))
}

fn close_loan(tx: &Transaction<'_>, loan: &mut Loan, returned_at: DateTime<Utc>) -> Result<()> {
    if let Some(previous) = loan.returned_at {
        return Err(LibraryError::AlreadyReturned {
            loan_id: loan.id,
            returned_at: previous,
        });
    }

    tx.execute(
        "UPDATE loans SET returned_at = ?2 WHERE id = ?1 AND returned_at IS NULL",
        params![loan.id.get(), returned_at],
    )?;
    loan.returned_at = Some(returned_at);
    Ok(())
}

/// Insert an open loan. The partial unique index on open loans rejects a
/// second one even when the caller's availability check was skipped or
/// raced by another connection; that rejection surfaces as `BookUnavailable`.
fn insert_open_loan(
    tx: &Transaction<'_>,
    book_id: BookId,
    borrower_id: &str,
    borrowed_at: DateTime<Utc>,
    due_date: NaiveDate,
) -> Result<LoanId> {
    let inserted = tx.execute(
        "INSERT INTO loans (book_id, borrower_id, borrowed_at, due_date)
         VALUES (?1, ?2, ?3, ?4)",
        params![book_id.get(), borrower_id, borrowed_at, due_date],
    );
    match inserted {
        Ok(_) => Ok(LoanId(tx.last_insert_rowid())),
        Err(e) if is_constraint_violation(&e) => match open_loan_id(tx, book_id)? {
            Some(loan_id) => Err(LibraryError::BookUnavailable { book_id, loan_id }),
            None => Err(e.into()),
        },
        Err(e) => Err(e.into()),
    }
}

/// Loan storage and borrow-state transitions
#[derive(Debug, Clone)]
pub struct Ledger {
    db: Arc<Database>,
}

impl Ledger {
    /// Create a ledger over a shared database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Lend an available book until `due_date`
    pub fn borrow(&self, book_id: BookId, borrower_id: &str, due_date: NaiveDate) -> Result<LoanId> {
        self.borrow_at(book_id, borrower_id, due_date, Utc::now())
            .map(|loan| loan.id)
    }

    /// Lend an available book for a number of days from today
    pub fn borrow_for_days(&self, book_id: BookId, borrower_id: &str, days: u32) -> Result<Loan> {
        if days == 0 {
            return Err(LibraryError::invalid("loan days", "must be at least 1"));
        }

        let now = Utc::now();
        let due_date = now
            .date_naive()
            .checked_add_days(Days::new(u64::from(days)))
            .ok_or_else(|| LibraryError::invalid("loan days", format!("{days} is out of range")))?;

        self.borrow_at(book_id, borrower_id, due_date, now)
    }

    /// Lend a book with an explicit borrow timestamp
    #[instrument(skip(self))]
    pub fn borrow_at(
        &self,
        book_id: BookId,
        borrower_id: &str,
        due_date: NaiveDate,
        borrowed_at: DateTime<Utc>,
    ) -> Result<Loan> {
        require_non_blank("borrower_id", borrower_id)?;
        let borrower_id = borrower_id.trim().to_string();

        let loan = self.db.write(|tx| {
            let deleted: Option<bool> = tx
                .query_row(
                    "SELECT deleted FROM books WHERE id = ?1",
                    params![book_id.get()],
                    |row| row.get(0),
                )
                .optional()?;
            match deleted {
                None => return Err(LibraryError::BookNotFound(book_id)),
                Some(true) => return Err(LibraryError::BookRemoved(book_id)),
                Some(false) => {}
            }

            if let Some(loan_id) = open_loan_id(tx, book_id)? {
                return Err(LibraryError::BookUnavailable { book_id, loan_id });
            }

            let loan_id = insert_open_loan(tx, book_id, &borrower_id, borrowed_at, due_date)?;

            Ok(Loan {
                id: loan_id,
                book_id,
                borrower_id: borrower_id.clone(),
                borrowed_at,
                due_date,
                returned_at: None,
            })
        })?;

        info!(loan_id = %loan.id, %due_date, "Book borrowed");
        Ok(loan)
    }

    /// Close a loan now
    pub fn return_book(&self, loan_id: LoanId) -> Result<()> {
        self.return_at(loan_id, Utc::now()).map(|_| ())
    }

    /// Close a loan with an explicit return timestamp
    #[instrument(skip(self))]
    pub fn return_at(&self, loan_id: LoanId, returned_at: DateTime<Utc>) -> Result<Loan> {
        let loan = self.db.write(|tx| {
            let mut loan = load_loan(tx, loan_id)?;
            close_loan(tx, &mut loan, returned_at)?;
            Ok(loan)
        })?;

        info!(book_id = %loan.book_id, "Book returned");
        Ok(loan)
    }

    /// Close whichever loan is open on a book
    #[instrument(skip(self))]
    pub fn return_by_book(&self, book_id: BookId) -> Result<Loan> {
        let loan = self.db.write(|tx| {
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT id FROM books WHERE id = ?1",
                    params![book_id.get()],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(LibraryError::BookNotFound(book_id));
            }

            let loan_id = open_loan_id(tx, book_id)?.ok_or(LibraryError::NotBorrowed(book_id))?;
            let mut loan = load_loan(tx, loan_id)?;
            close_loan(tx, &mut loan, Utc::now())?;
            Ok(loan)
        })?;

        info!(loan_id = %loan.id, "Book returned");
        Ok(loan)
    }

    /// Fetch a loan by id
    pub fn get_loan(&self, loan_id: LoanId) -> Result<Loan> {
        self.db.read(|conn| load_loan(conn, loan_id))
    }

    /// The open loan on a book, if it is borrowed
    pub fn open_loan_for(&self, book_id: BookId) -> Result<Option<Loan>> {
        self.db.read(|conn| match open_loan_id(conn, book_id)? {
            Some(loan_id) => load_loan(conn, loan_id).map(Some),
            None => Ok(None),
        })
    }

    /// Open loans whose due date is strictly before `as_of`
    ///
    /// Ordered by due date, then loan id. Writing the overdue report is
    /// left to [`crate::transfer::OverdueLog`].
    pub fn list_overdue(&self, as_of: NaiveDate) -> Result<Vec<Loan>> {
        let loans = self.db.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOAN_COLUMNS} FROM loans
                 WHERE returned_at IS NULL AND due_date < ?1
                 ORDER BY due_date, id"
            ))?;
            let loans = stmt
                .query_map(params![as_of], loan_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(loans)
        })?;

        debug!(%as_of, count = loans.len(), "Computed overdue loans");
        Ok(loans)
    }

    /// Every loan of a borrower, newest first
    pub fn history_for(&self, borrower_id: &str) -> Result<Vec<Loan>> {
        require_non_blank("borrower_id", borrower_id)?;

        self.db.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOAN_COLUMNS} FROM loans
                 WHERE borrower_id = ?1
                 ORDER BY borrowed_at DESC, id DESC"
            ))?;
            let loans = stmt
                .query_map(params![borrower_id.trim()], loan_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(loans)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::domain::BookMetadata;
    use crate::library::Catalog;
    use chrono::TimeZone;

    fn setup() -> (Catalog, Ledger) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        (Catalog::new(db.clone()), Ledger::new(db))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn add(catalog: &Catalog, title: &str) -> BookId {
        catalog
            .add_book(BookMetadata::new(title, "Author"))
            .unwrap()
    }

    #[test]
    fn test_open_loan_index_maps_to_unavailable() {
        let (catalog, ledger) = setup();
        let book = add(&catalog, "Dune");
        let first = ledger.borrow(book, "ana", date(2024, 3, 10)).unwrap();

        // Insert directly, without the availability check in borrow_at
        let err = ledger
            .db
            .write(|tx| insert_open_loan(tx, book, "ben", Utc::now(), date(2024, 3, 20)))
            .unwrap_err();
        match err {
            LibraryError::BookUnavailable { book_id, loan_id } => {
                assert_eq!(book_id, book);
                assert_eq!(loan_id, first);
            }
            other => panic!("expected BookUnavailable, got {other:?}"),
        }
        assert_eq!(ledger.history_for("ben").unwrap().len(), 0);
    }

    #[test]
    fn test_borrow_and_return_cycle() {
        let (catalog, ledger) = setup();
        let book = add(&catalog, "Dune");

        let loan_id = ledger.borrow(book, "ana", date(2024, 3, 10)).unwrap();
        assert!(!catalog.get_book(book).unwrap().available);
        assert_eq!(ledger.open_loan_for(book).unwrap().unwrap().id, loan_id);

        ledger.return_book(loan_id).unwrap();
        assert!(catalog.get_book(book).unwrap().available);
        assert!(ledger.open_loan_for(book).unwrap().is_none());
        assert!(ledger.get_loan(loan_id).unwrap().returned_at.is_some());

        // Available again
        ledger.borrow(book, "ben", date(2024, 4, 10)).unwrap();
    }

    #[test]
    fn test_second_borrow_conflicts() {
        let (catalog, ledger) = setup();
        let book = add(&catalog, "Dune");
        let first = ledger.borrow(book, "ana", date(2024, 3, 10)).unwrap();

        let err = ledger.borrow(book, "ben", date(2024, 3, 12)).unwrap_err();
        match err {
            LibraryError::BookUnavailable { book_id, loan_id } => {
                assert_eq!(book_id, book);
                assert_eq!(loan_id, first);
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_borrow_missing_or_removed_book() {
        let (catalog, ledger) = setup();

        let err = ledger.borrow(BookId(99), "ana", date(2024, 3, 10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let book = add(&catalog, "Gone");
        catalog.remove_book(book).unwrap();
        let err = ledger.borrow(book, "ana", date(2024, 3, 10)).unwrap_err();
        assert!(matches!(err, LibraryError::BookRemoved(_)));
    }

    #[test]
    fn test_blank_borrower_rejected() {
        let (catalog, ledger) = setup();
        let book = add(&catalog, "Dune");
        let err = ledger.borrow(book, " ", date(2024, 3, 10)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert!(catalog.get_book(book).unwrap().available);
    }

    #[test]
    fn test_return_twice() {
        let (catalog, ledger) = setup();
        let book = add(&catalog, "Dune");
        let loan = ledger.borrow(book, "ana", date(2024, 3, 10)).unwrap();

        ledger.return_book(loan).unwrap();
        let err = ledger.return_book(loan).unwrap_err();
        assert!(matches!(err, LibraryError::AlreadyReturned { .. }));

        let err = ledger.return_book(LoanId(1234)).unwrap_err();
        assert!(matches!(err, LibraryError::LoanNotFound(LoanId(1234))));
    }

    #[test]
    fn test_return_by_book() {
        let (catalog, ledger) = setup();
        let book = add(&catalog, "Dune");

        let err = ledger.return_by_book(book).unwrap_err();
        assert!(matches!(err, LibraryError::NotBorrowed(_)));

        let loan_id = ledger.borrow(book, "ana", date(2024, 3, 10)).unwrap();
        let loan = ledger.return_by_book(book).unwrap();
        assert_eq!(loan.id, loan_id);
        assert!(!loan.is_open());
    }

    #[test]
    fn test_remove_blocked_by_open_loan() {
        let (catalog, ledger) = setup();
        let book = add(&catalog, "Dune");
        let loan = ledger.borrow(book, "ana", date(2024, 3, 10)).unwrap();

        let err = catalog.remove_book(book).unwrap_err();
        assert!(matches!(err, LibraryError::OpenLoan { .. }));

        ledger.return_book(loan).unwrap();
        catalog.remove_book(book).unwrap();
    }

    #[test]
    fn test_list_overdue_boundaries() {
        let (catalog, ledger) = setup();
        let a = add(&catalog, "A");
        let b = add(&catalog, "B");
        let c = add(&catalog, "C");

        ledger.borrow(a, "ana", date(2024, 3, 10)).unwrap();
        ledger.borrow(b, "ben", date(2024, 3, 5)).unwrap();
        let closed = ledger.borrow(c, "cy", date(2024, 3, 1)).unwrap();
        ledger.return_book(closed).unwrap();

        let overdue = ledger.list_overdue(date(2024, 3, 10)).unwrap();
        let books: Vec<BookId> = overdue.iter().map(|l| l.book_id).collect();
        assert_eq!(books, vec![b]);

        let overdue = ledger.list_overdue(date(2024, 3, 11)).unwrap();
        let books: Vec<BookId> = overdue.iter().map(|l| l.book_id).collect();
        assert_eq!(books, vec![b, a]);

        assert!(ledger.list_overdue(date(2024, 3, 1)).unwrap().is_empty());
    }

    #[test]
    fn test_borrow_for_days() {
        let (catalog, ledger) = setup();
        let book = add(&catalog, "Dune");

        let err = ledger.borrow_for_days(book, "ana", 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);

        let loan = ledger.borrow_for_days(book, "ana", 14).unwrap();
        assert_eq!((loan.due_date - loan.borrowed_at.date_naive()).num_days(), 14);
    }

    #[test]
    fn test_history_newest_first() {
        let (catalog, ledger) = setup();
        let a = add(&catalog, "A");
        let b = add(&catalog, "B");
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();

        let first = ledger.borrow_at(a, "ana", date(2024, 1, 15), t1).unwrap();
        ledger.return_at(first.id, t1).unwrap();
        ledger.borrow_at(b, "ana", date(2024, 2, 15), t2).unwrap();
        ledger.borrow_at(a, "ben", date(2024, 2, 15), t2).unwrap();

        let history = ledger.history_for("ana").unwrap();
        let books: Vec<BookId> = history.iter().map(|l| l.book_id).collect();
        assert_eq!(books, vec![b, a]);
        assert!(history[0].is_open());
        assert!(!history[1].is_open());

        assert!(ledger.history_for("nobody").unwrap().is_empty());
    }
}
