//! Append-only overdue report.
//!
//! The ledger only computes the overdue set; this module turns it into
//! human-readable lines and appends one block per check:
//!
//! ```text
//! --- Overdue loans as of 2024-03-11 (2) ---
//! book=3 title="Emma" borrower=ben due=2024-03-05 days_overdue=6 loan=2
//! book=1 title="Dune" borrower=ana due=2024-03-10 days_overdue=1 loan=1
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::TransferError;
use crate::core::{Library, Result};
use crate::domain::Loan;

/// An overdue loan with the title of its book
#[derive(Debug, Clone)]
pub struct OverdueEntry {
    pub loan: Loan,
    pub title: String,
}

impl OverdueEntry {
    /// Whole days past the due date
    pub fn days_overdue(&self, as_of: NaiveDate) -> i64 {
        (as_of - self.loan.due_date).num_days()
    }
}

/// Overdue loans as of a date, joined with book titles
pub fn collect_overdue(library: &Library, as_of: NaiveDate) -> Result<Vec<OverdueEntry>> {
    library
        .ledger()
        .list_overdue(as_of)?
        .into_iter()
        .map(|loan| {
            let title = library.catalog().get_book(loan.book_id)?.title;
            Ok(OverdueEntry { loan, title })
        })
        .collect()
}

/// Render one report block; empty when nothing is overdue
pub fn render_report(as_of: NaiveDate, entries: &[OverdueEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut report = format!("--- Overdue loans as of {} ({}) ---\n", as_of, entries.len());
    for entry in entries {
        report.push_str(&format!(
            "book={} title={:?} borrower={} due={} days_overdue={} loan={}\n",
            entry.loan.book_id,
            entry.title,
            entry.loan.borrower_id,
            entry.loan.due_date,
            entry.days_overdue(as_of),
            entry.loan.id,
        ));
    }
    report
}

/// Text log that overdue reports are appended to
#[derive(Debug, Clone)]
pub struct OverdueLog {
    path: PathBuf,
}

impl OverdueLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Log at the configured location
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::new(crate::config::paths::overdue_log()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one report block in a single write; returns the entries logged
    pub async fn append_report(
        &self,
        as_of: NaiveDate,
        entries: &[OverdueEntry],
    ) -> Result<usize, TransferError> {
        let report = render_report(as_of, entries);
        if report.is_empty() {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(report.as_bytes()).await?;
        file.flush().await?;

        info!(path = %self.path.display(), entries = entries.len(), "Overdue report appended");
        Ok(entries.len())
    }
}
