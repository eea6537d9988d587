//! File-level collaborators around the core: bulk import, export and the
//! overdue log.

pub mod exchange;
pub mod overdue_log;

use thiserror::Error;

use crate::core::LibraryError;

pub use exchange::{
    export, export_records, import, import_records, BookRecord, DuplicateRow, Format,
    ImportReport, RejectedRow,
};
pub use overdue_log::{collect_overdue, render_report, OverdueEntry, OverdueLog};

/// Errors from import/export and log writing
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),

    #[error(transparent)]
    Library(#[from] LibraryError),
}
