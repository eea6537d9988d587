//! Loan records and their derived borrow state.
//!
//! A loan is open until `returned_at` is set; after that it never changes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::book::BookId;

/// Storage-assigned loan identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(pub i64);

impl LoanId {
    /// Get the raw integer value
    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for LoanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for LoanId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(LoanId)
    }
}

/// A single borrow of a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,

    /// Borrowed book (owned by the catalog)
    pub book_id: BookId,

    pub borrower_id: String,

    pub borrowed_at: DateTime<Utc>,

    pub due_date: NaiveDate,

    /// Absent while the loan is open
    pub returned_at: Option<DateTime<Utc>>,
}

impl Loan {
    /// True while the book has not come back
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    /// Open and past due as of the given date
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        self.is_open() && self.due_date < as_of
    }

    /// Borrow state as of the given date
    pub fn status(&self, as_of: NaiveDate) -> LoanStatus {
        match self.returned_at {
            Some(_) => LoanStatus::Returned,
            None if self.due_date < as_of => LoanStatus::Overdue,
            None => LoanStatus::Borrowed,
        }
    }
}

/// Derived state of a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// Open and within its due date
    Borrowed,

    /// Open with the due date passed
    Overdue,

    /// Closed
    Returned,
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoanStatus::Borrowed => write!(f, "borrowed"),
            LoanStatus::Overdue => write!(f, "overdue"),
            LoanStatus::Returned => write!(f, "returned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn loan(due: NaiveDate, returned: bool) -> Loan {
        Loan {
            id: LoanId(1),
            book_id: BookId(7),
            borrower_id: "ana".to_string(),
            borrowed_at: Utc::now(),
            due_date: due,
            returned_at: returned.then(Utc::now),
        }
    }

    #[test]
    fn test_overdue_is_strictly_after_due_date() {
        let l = loan(date(2024, 3, 10), false);
        assert!(!l.is_overdue(date(2024, 3, 9)));
        assert!(!l.is_overdue(date(2024, 3, 10)));
        assert!(l.is_overdue(date(2024, 3, 11)));
    }

    #[test]
    fn test_returned_loan_is_never_overdue() {
        let l = loan(date(2024, 3, 10), true);
        assert!(!l.is_open());
        assert!(!l.is_overdue(date(2030, 1, 1)));
        assert_eq!(l.status(date(2030, 1, 1)), LoanStatus::Returned);
    }

    #[test]
    fn test_status_transitions() {
        let l = loan(date(2024, 3, 10), false);
        assert_eq!(l.status(date(2024, 3, 1)), LoanStatus::Borrowed);
        assert_eq!(l.status(date(2024, 4, 1)), LoanStatus::Overdue);
    }
}
