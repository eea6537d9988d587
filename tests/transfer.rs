//! Import/Export Integration Tests
//!
//! CSV and JSON dumps written to disk and loaded into a fresh library.

use libris::core::Library;
use libris::domain::BookMetadata;
use libris::transfer::{self, Format, OverdueLog};
use chrono::NaiveDate;
use tempfile::TempDir;

fn seeded() -> Library {
    let library = Library::open_in_memory().unwrap();
    library
        .catalog()
        .add_book(
            BookMetadata::new("Dune", "Frank Herbert")
                .with_genre("Science Fiction")
                .with_isbn("9780441013593")
                .with_description("Desert planet, \"spice\", politics."),
        )
        .unwrap();
    library
        .catalog()
        .add_book(BookMetadata::new("Emma", "Jane Austen").with_genre("Classic"))
        .unwrap();
    library
}

async fn round_trip(format: Format, file: &str) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("out").join(file);
    let source = seeded();

    let written = transfer::export(source.catalog(), &path, format).await.unwrap();
    assert_eq!(written, 2);

    let target = Library::open_in_memory().unwrap();
    let report = transfer::import(target.catalog(), &path, format).await.unwrap();
    assert_eq!(report.imported.len(), 2);
    assert!(report.duplicates.is_empty());
    assert!(report.rejected.is_empty());

    let original: Vec<_> = source.catalog().list_books().unwrap().iter().map(|b| b.metadata()).collect();
    let copied: Vec<_> = target.catalog().list_books().unwrap().iter().map(|b| b.metadata()).collect();
    assert_eq!(original, copied);

    // Importing the same file again only finds duplicates
    let again = transfer::import(target.catalog(), &path, format).await.unwrap();
    assert!(again.imported.is_empty());
    assert_eq!(again.duplicates.len(), 2);
}

#[tokio::test]
async fn test_csv_round_trip() {
    round_trip(Format::Csv, "books.csv").await;
}

#[tokio::test]
async fn test_json_round_trip() {
    round_trip(Format::Json, "books.json").await;
}

#[tokio::test]
async fn test_import_reports_bad_rows() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("books.json");
    tokio::fs::write(
        &path,
        r#"[
            {"title": "Dune", "author": "Frank Herbert"},
            {"title": "No Author"},
            {"title": "", "author": "Anonymous"}
        ]"#,
    )
    .await
    .unwrap();

    let library = Library::open_in_memory().unwrap();
    let report = transfer::import(library.catalog(), &path, Format::Json).await.unwrap();
    assert_eq!(report.imported.len(), 1);
    assert_eq!(report.rejected.len(), 2);
    assert_eq!(report.rejected[0].row, 2);
}

#[tokio::test]
async fn test_overdue_log_appends_report() {
    let temp = TempDir::new().unwrap();
    let library = seeded();
    let dune = library.catalog().list_books().unwrap()[0].id;
    library
        .ledger()
        .borrow(dune, "ana", NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
        .unwrap();

    let as_of = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
    let entries = transfer::collect_overdue(&library, as_of).unwrap();
    let log = OverdueLog::new(temp.path().join("overdue.log"));
    assert_eq!(log.append_report(as_of, &entries).await.unwrap(), 1);

    let content = tokio::fs::read_to_string(log.path()).await.unwrap();
    assert!(content.starts_with("--- Overdue loans as of 2024-03-15 (1) ---"));
    assert!(content.contains("title=\"Dune\" borrower=ana due=2024-03-10 days_overdue=5"));
}
