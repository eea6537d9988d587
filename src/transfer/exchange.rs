//! CSV/JSON export and bulk import of book records.
//!
//! Exports carry only caller-settable fields plus the id; fingerprint and
//! availability are always recomputed on the way back in. Import goes
//! through [`Catalog::add_book`] row by row, so duplicates and bad rows are
//! reported without aborting the file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use super::TransferError;
use crate::core::LibraryError;
use crate::domain::{Book, BookId, BookMetadata, Fingerprint};
use crate::library::Catalog;

/// Serialization used for a dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Header row plus one row per book
    Csv,

    /// Pretty-printed array of objects
    Json,
}

impl Format {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "csv" => Some(Format::Csv),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Csv => write!(f, "csv"),
            Format::Json => write!(f, "json"),
        }
    }
}

/// Interchange row for one book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Source id; informational only, never imported
    #[serde(default)]
    pub id: Option<i64>,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub description: String,
}

impl From<&Book> for BookRecord {
    fn from(book: &Book) -> Self {
        Self {
            id: Some(book.id.get()),
            title: book.title.clone(),
            author: book.author.clone(),
            genre: book.genre.clone(),
            isbn: book.isbn.clone(),
            description: book.description.clone(),
        }
    }
}

impl From<BookRecord> for BookMetadata {
    fn from(record: BookRecord) -> Self {
        Self {
            title: record.title,
            author: record.author,
            genre: record.genre,
            isbn: record.isbn,
            description: record.description,
        }
    }
}

/// A row skipped because its fingerprint is already cataloged
#[derive(Debug, Clone)]
pub struct DuplicateRow {
    /// 1-based data row (header excluded)
    pub row: usize,
    pub title: String,
    pub fingerprint: Fingerprint,
    pub existing: BookId,
}

/// A row that could not be parsed or added
#[derive(Debug, Clone)]
pub struct RejectedRow {
    /// 1-based data row (header excluded)
    pub row: usize,
    pub message: String,
}

/// Outcome of a bulk import
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub imported: Vec<BookId>,
    pub duplicates: Vec<DuplicateRow>,
    pub rejected: Vec<RejectedRow>,
}

impl ImportReport {
    /// Rows seen in total
    pub fn total(&self) -> usize {
        self.imported.len() + self.duplicates.len() + self.rejected.len()
    }
}

/// Serialize records as CSV with a header row
pub fn records_to_csv(records: &[BookRecord]) -> Result<Vec<u8>, TransferError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| TransferError::Io(e.into_error()))
}

/// Parse CSV records; row-level failures are returned per row
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<Result<BookRecord, String>>, TransferError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    for required in ["title", "author"] {
        if !headers.iter().any(|h| h == required) {
            return Err(TransferError::MissingColumn(required));
        }
    }

    Ok(reader
        .deserialize::<BookRecord>()
        .map(|row| row.map_err(|e| e.to_string()))
        .collect())
}

/// Feed parsed rows through `add_book`
pub fn import_records(
    catalog: &Catalog,
    rows: impl IntoIterator<Item = Result<BookRecord, String>>,
) -> Result<ImportReport, TransferError> {
    let mut report = ImportReport::default();

    for (index, row) in rows.into_iter().enumerate() {
        let row_number = index + 1;
        let record = match row {
            Ok(record) => record,
            Err(message) => {
                warn!(row = row_number, %message, "Skipping unreadable row");
                report.rejected.push(RejectedRow {
                    row: row_number,
                    message,
                });
                continue;
            }
        };

        let title = record.title.clone();
        match catalog.add_book(record.into()) {
            Ok(id) => report.imported.push(id),
            Err(LibraryError::Duplicate {
                fingerprint,
                existing,
            }) => {
                warn!(row = row_number, %title, %existing, "Skipping duplicate book");
                report.duplicates.push(DuplicateRow {
                    row: row_number,
                    title,
                    fingerprint,
                    existing,
                });
            }
            Err(e @ LibraryError::InvalidInput { .. }) => {
                warn!(row = row_number, error = %e, "Skipping invalid row");
                report.rejected.push(RejectedRow {
                    row: row_number,
                    message: e.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        imported = report.imported.len(),
        duplicates = report.duplicates.len(),
        rejected = report.rejected.len(),
        "Import finished"
    );
    Ok(report)
}

/// Every live book as an interchange record
pub fn export_records(catalog: &Catalog) -> Result<Vec<BookRecord>, TransferError> {
    Ok(catalog.list_books()?.iter().map(BookRecord::from).collect())
}

/// Write every live book to `path`; returns the number of books written
pub async fn export(catalog: &Catalog, path: &Path, format: Format) -> Result<usize, TransferError> {
    let records = export_records(catalog)?;
    let bytes = match format {
        Format::Csv => records_to_csv(&records)?,
        Format::Json => serde_json::to_vec_pretty(&records)?,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, bytes).await?;

    info!(path = %path.display(), %format, books = records.len(), "Catalog exported");
    Ok(records.len())
}

/// Read books from `path` and add each one
pub async fn import(catalog: &Catalog, path: &Path, format: Format) -> Result<ImportReport, TransferError> {
    let bytes = fs::read(path).await?;

    let rows = match format {
        Format::Csv => parse_csv(&bytes)?,
        Format::Json => {
            let values: Vec<serde_json::Value> = serde_json::from_slice(&bytes)?;
            values
                .into_iter()
                .map(|value| serde_json::from_value::<BookRecord>(value).map_err(|e| e.to_string()))
                .collect()
        }
    };

    import_records(catalog, rows)
}
