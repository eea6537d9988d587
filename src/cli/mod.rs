//! Command-line interface for libris.
//!
//! Provides commands for cataloging books, recording loans, reporting
//! overdue items, recommending similar titles and moving the catalog in
//! and out of CSV/JSON files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use crate::config;
use crate::core::Library;
use crate::domain::{Book, BookId, BookMetadata, BookUpdate, Loan, LoanId};
use crate::library::SearchFilter;
use crate::recommend::{RecommendOptions, Recommendation};
use crate::transfer::{self, Format, OverdueLog};

/// libris - Library catalog, loans and recommendations
#[derive(Parser, Debug)]
#[command(name = "libris")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database file (overrides config)
    #[arg(long, global = true, env = "LIBRIS_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a book to the catalog
    Add {
        title: String,
        author: String,

        #[arg(short, long, default_value = "")]
        genre: String,

        #[arg(short, long, default_value = "")]
        isbn: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Show one book and its loan state
    Show {
        book_id: BookId,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change fields of a book
    Update {
        book_id: BookId,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        author: Option<String>,

        #[arg(short, long)]
        genre: Option<String>,

        #[arg(short, long)]
        isbn: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Remove a book (soft delete)
    Remove { book_id: BookId },

    /// Search titles, authors, genres and descriptions
    Search {
        /// Search text (blank lists every book)
        #[arg(default_value = "")]
        query: String,

        /// Only books that can be borrowed now
        #[arg(long, conflicts_with = "on_loan")]
        available: bool,

        /// Only books currently on loan
        #[arg(long)]
        on_loan: bool,

        /// Restrict to a genre
        #[arg(short, long)]
        genre: Option<String>,
    },

    /// Lend a book
    Borrow {
        book_id: BookId,
        borrower: String,

        /// Loan period in days (defaults to loans.default_days)
        #[arg(long, conflicts_with = "due")]
        days: Option<u32>,

        /// Explicit due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,
    },

    /// Return a loan
    Return {
        /// Loan ID
        #[arg(required_unless_present = "book")]
        loan_id: Option<LoanId>,

        /// Return whatever open loan this book has
        #[arg(long, conflicts_with = "loan_id")]
        book: Option<BookId>,
    },

    /// List overdue loans
    Overdue {
        /// Reference date (defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Also append the report to the overdue log
        #[arg(long)]
        log: bool,
    },

    /// Show a borrower's loans, newest first
    History { borrower: String },

    /// Recommend similar books
    Recommend {
        #[command(subcommand)]
        mode: RecommendMode,

        /// Maximum results (defaults to recommend.default_top_k)
        #[arg(short = 'k', long, global = true)]
        top: Option<usize>,

        /// Skip books that are on loan
        #[arg(long, global = true)]
        available: bool,
    },

    /// Write the catalog to a file
    Export {
        /// Output path (defaults to exports/books.<format>)
        path: Option<PathBuf>,

        /// File format (guessed from the extension otherwise)
        #[arg(short, long, value_enum)]
        format: Option<FileFormat>,
    },

    /// Add books from a file
    Import {
        path: PathBuf,

        /// File format (guessed from the extension otherwise)
        #[arg(short, long, value_enum)]
        format: Option<FileFormat>,
    },

    /// Show resolved configuration (debug)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum RecommendMode {
    /// Books similar to a book
    Book { book_id: BookId },

    /// Books similar to a genre
    Genre { genre: String },

    /// Books similar to an author's work
    Author { author: String },

    /// Books similar to what a borrower has read
    History { borrower: String },
}

/// File format for CLI (maps to Format)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FileFormat {
    Csv,
    Json,
}

impl From<FileFormat> for Format {
    fn from(f: FileFormat) -> Self {
        match f {
            FileFormat::Csv => Format::Csv,
            FileFormat::Json => Format::Json,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let Cli { db, command } = self;
        if matches!(command, Commands::Config) {
            return show_config().await;
        }

        let library = open_library(db)?;

        match command {
            Commands::Add {
                title,
                author,
                genre,
                isbn,
                description,
            } => {
                let metadata = BookMetadata::new(title, author)
                    .with_genre(genre)
                    .with_isbn(isbn)
                    .with_description(description);
                add_book(&library, metadata).await
            }
            Commands::Show { book_id, json } => {
                show_book(&library, book_id, json).await
            }
            Commands::Update {
                book_id,
                title,
                author,
                genre,
                isbn,
                description,
            } => {
                let update = BookUpdate {
                    title,
                    author,
                    genre,
                    isbn,
                    description,
                };
                update_book(&library, book_id, update).await
            }
            Commands::Remove { book_id } => {
                library.catalog().remove_book(book_id)?;
                println!("Removed book {}", book_id);
                Ok(())
            }
            Commands::Search {
                query,
                available,
                on_loan,
                genre,
            } => {
                let mut filter = SearchFilter::default();
                if available {
                    filter = filter.with_available(true);
                } else if on_loan {
                    filter = filter.with_available(false);
                }
                if let Some(genre) = genre {
                    filter = filter.with_genre(genre);
                }
                search_books(&library, &query, &filter).await
            }
            Commands::Borrow {
                book_id,
                borrower,
                days,
                due,
            } => {
                borrow_book(&library, book_id, &borrower, days, due).await
            }
            Commands::Return { loan_id, book } => {
                return_loan(&library, loan_id, book).await
            }
            Commands::Overdue { as_of, log } => {
                list_overdue(&library, as_of, log).await
            }
            Commands::History { borrower } => {
                show_history(&library, &borrower).await
            }
            Commands::Recommend {
                mode,
                top,
                available,
            } => {
                recommend(&library, mode, top, available).await
            }
            Commands::Export { path, format } => {
                export_catalog(&library, path, format).await
            }
            Commands::Import { path, format } => {
                import_catalog(&library, &path, format).await
            }
            Commands::Config => show_config().await,
        }
    }
}

/// Open the database named on the command line or in config
fn open_library(db: Option<PathBuf>) -> Result<Library> {
    let path = match db {
        Some(path) => path,
        None => config::paths::database()?,
    };
    Library::open(&path).with_context(|| format!("Failed to open database: {}", path.display()))
}

/// Resolve a CLI format flag, falling back to the file extension
fn resolve_format(path: &std::path::Path, format: Option<FileFormat>) -> Result<Format> {
    match format {
        Some(format) => Ok(format.into()),
        None => Format::from_path(path).with_context(|| {
            format!(
                "Cannot tell the format of {}; pass --format csv|json",
                path.display()
            )
        }),
    }
}

fn print_book_row(book: &Book) {
    let state = if book.deleted {
        "removed"
    } else if book.available {
        "available"
    } else {
        "on loan"
    };
    println!(
        "{:<6} {:<36} {:<24} {:<16} {}",
        book.id,
        truncate(&book.title, 36),
        truncate(&book.author, 24),
        truncate(&book.genre, 16),
        state
    );
}

fn print_loan_row(loan: &Loan, title: &str, today: NaiveDate) {
    println!(
        "{:<6} {:<6} {:<30} {:<12} {:<10} {}",
        loan.id,
        loan.book_id,
        truncate(title, 30),
        loan.borrower_id,
        loan.due_date,
        loan.status(today)
    );
}

/// Truncate a string for table output
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

async fn add_book(library: &Library, metadata: BookMetadata) -> Result<()> {
    let id = library.catalog().add_book(metadata)?;
    println!("Added book {}", id);
    Ok(())
}

async fn show_book(library: &Library, book_id: BookId, json: bool) -> Result<()> {
    let book = library.catalog().get_book(book_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&book)?);
        return Ok(());
    }

    println!("Book ID:     {}", book.id);
    println!("Title:       {}", book.title);
    println!("Author:      {}", book.author);
    if !book.genre.is_empty() {
        println!("Genre:       {}", book.genre);
    }
    if !book.isbn.is_empty() {
        println!("ISBN:        {}", book.isbn);
    }
    println!("Fingerprint: {}", book.fingerprint);
    println!("Added:       {}", book.created_at.format("%Y-%m-%d %H:%M"));
    println!("Updated:     {}", book.updated_at.format("%Y-%m-%d %H:%M"));
    if book.deleted {
        println!("Status:      removed");
    } else if let Some(loan) = library.ledger().open_loan_for(book_id)? {
        println!(
            "Status:      on loan to {} (loan {}, due {})",
            loan.borrower_id, loan.id, loan.due_date
        );
    } else {
        println!("Status:      available");
    }
    if !book.description.is_empty() {
        println!();
        println!("{}", book.description);
    }

    Ok(())
}

async fn update_book(library: &Library, book_id: BookId, update: BookUpdate) -> Result<()> {
    if update.is_empty() {
        anyhow::bail!("Nothing to update; pass at least one of --title, --author, --genre, --isbn, --description");
    }
    let book = library.catalog().update_book(book_id, update)?;
    println!("Updated book {} ({})", book.id, book.title);
    Ok(())
}

async fn search_books(library: &Library, query: &str, filter: &SearchFilter) -> Result<()> {
    let results = library.catalog().search(query, filter)?;

    if results.is_empty() {
        println!("No books found");
        return Ok(());
    }

    println!(
        "{:<6} {:<36} {:<24} {:<16} {}",
        "ID", "TITLE", "AUTHOR", "GENRE", "STATE"
    );
    println!("{}", "-".repeat(95));
    for book in results.iter() {
        print_book_row(book);
    }
    println!("\n{} book(s)", results.len());

    Ok(())
}

async fn borrow_book(
    library: &Library,
    book_id: BookId,
    borrower: &str,
    days: Option<u32>,
    due: Option<NaiveDate>,
) -> Result<()> {
    let loan = match due {
        Some(due) => {
            let loan_id = library.ledger().borrow(book_id, borrower, due)?;
            library.ledger().get_loan(loan_id)?
        }
        None => {
            let days = match days {
                Some(days) => days,
                None => config::config()?.default_loan_days,
            };
            library.ledger().borrow_for_days(book_id, borrower, days)?
        }
    };

    println!(
        "Loan {}: book {} to {}, due {}",
        loan.id, loan.book_id, loan.borrower_id, loan.due_date
    );
    Ok(())
}

async fn return_loan(library: &Library, loan_id: Option<LoanId>, book: Option<BookId>) -> Result<()> {
    let loan = match (loan_id, book) {
        (Some(loan_id), _) => {
            library.ledger().return_book(loan_id)?;
            library.ledger().get_loan(loan_id)?
        }
        (None, Some(book_id)) => library.ledger().return_by_book(book_id)?,
        (None, None) => anyhow::bail!("Pass a loan ID or --book <id>"),
    };

    let today = Utc::now().date_naive();
    let late = if loan.due_date < today {
        format!(" ({} days late)", (today - loan.due_date).num_days())
    } else {
        String::new()
    };
    println!("Returned loan {} (book {}){}", loan.id, loan.book_id, late);
    Ok(())
}

async fn list_overdue(library: &Library, as_of: Option<NaiveDate>, log: bool) -> Result<()> {
    let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
    let entries = transfer::collect_overdue(library, as_of)?;

    if entries.is_empty() {
        println!("No overdue loans as of {}", as_of);
    } else {
        println!(
            "{:<6} {:<6} {:<30} {:<12} {:<10} {}",
            "LOAN", "BOOK", "TITLE", "BORROWER", "DUE", "DAYS"
        );
        println!("{}", "-".repeat(75));
        for entry in &entries {
            println!(
                "{:<6} {:<6} {:<30} {:<12} {:<10} {}",
                entry.loan.id,
                entry.loan.book_id,
                truncate(&entry.title, 30),
                entry.loan.borrower_id,
                entry.loan.due_date,
                entry.days_overdue(as_of)
            );
        }
    }

    if log {
        let overdue_log = OverdueLog::open_default()?;
        let written = overdue_log.append_report(as_of, &entries).await?;
        eprintln!(
            "[{} entr{} appended to {}]",
            written,
            if written == 1 { "y" } else { "ies" },
            overdue_log.path().display()
        );
    }

    Ok(())
}

async fn show_history(library: &Library, borrower: &str) -> Result<()> {
    let loans = library.ledger().history_for(borrower)?;

    if loans.is_empty() {
        println!("No loans for {}", borrower.trim());
        return Ok(());
    }

    let today = Utc::now().date_naive();
    println!(
        "{:<6} {:<6} {:<30} {:<12} {:<10} {}",
        "LOAN", "BOOK", "TITLE", "BORROWER", "DUE", "STATUS"
    );
    println!("{}", "-".repeat(80));
    for loan in &loans {
        let title = library.catalog().get_book(loan.book_id)?.title;
        print_loan_row(loan, &title, today);
    }

    Ok(())
}

async fn recommend(
    library: &Library,
    mode: RecommendMode,
    top: Option<usize>,
    available: bool,
) -> Result<()> {
    let top_k = match top {
        Some(top) => top,
        None => config::config()?.default_top_k,
    };
    let mut options = RecommendOptions::top(top_k);
    if available {
        options = options.available_only();
    }

    let recommender = library.recommender();
    let results: Vec<Recommendation> = match mode {
        RecommendMode::Book { book_id } => recommender.by_book(book_id, options)?,
        RecommendMode::Genre { genre } => recommender.by_genre(&genre, options)?,
        RecommendMode::Author { author } => recommender.by_author(&author, options)?,
        RecommendMode::History { borrower } => recommender.by_history(&borrower, options)?,
    };

    if results.is_empty() {
        println!("No recommendations");
        return Ok(());
    }

    println!("{:<7} {:<6} {:<36} {}", "SCORE", "ID", "TITLE", "AUTHOR");
    println!("{}", "-".repeat(75));
    for rec in &results {
        println!(
            "{:<7.3} {:<6} {:<36} {}",
            rec.score,
            rec.book.id,
            truncate(&rec.book.title, 36),
            rec.book.author
        );
    }

    Ok(())
}

async fn export_catalog(
    library: &Library,
    path: Option<PathBuf>,
    format: Option<FileFormat>,
) -> Result<()> {
    let (path, format) = match path {
        Some(path) => {
            let format = resolve_format(&path, format)?;
            (path, format)
        }
        None => {
            let format: Format = format.unwrap_or(FileFormat::Csv).into();
            (config::paths::default_export(&format.to_string())?, format)
        }
    };

    let written = transfer::export(library.catalog(), &path, format).await?;
    println!("Exported {} book(s) to {}", written, path.display());
    Ok(())
}

async fn import_catalog(library: &Library, path: &std::path::Path, format: Option<FileFormat>) -> Result<()> {
    let format = resolve_format(path, format)?;
    let report = transfer::import(library.catalog(), path, format)
        .await
        .with_context(|| format!("Failed to import {}", path.display()))?;

    println!(
        "Imported {} of {} row(s): {} duplicate(s), {} rejected",
        report.imported.len(),
        report.total(),
        report.duplicates.len(),
        report.rejected.len()
    );
    for dup in &report.duplicates {
        println!("  row {}: \"{}\" duplicates book {}", dup.row, dup.title, dup.existing);
    }
    for rejected in &report.rejected {
        println!("  row {}: {}", rejected.row, rejected.message);
    }

    Ok(())
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("libris configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:        {}", cfg.home.display());
    println!("  Database:    {}", cfg.database.display());
    println!("  Overdue log: {}", cfg.overdue_log.display());
    println!("  Exports:     {}", cfg.exports.display());
    println!();
    println!("Defaults:");
    println!("  Loan period: {} days", cfg.default_loan_days);
    println!("  Top-k:       {}", cfg.default_top_k);

    Ok(())
}
