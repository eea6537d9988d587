//! Catalog store: the source of truth for book records.
//!
//! Books are keyed by a storage-assigned id and deduplicated by fingerprint.
//! Removal is a soft delete; removed books stay readable through
//! [`Catalog::get_book`] but drop out of search and listing.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row, Transaction};
use tracing::{debug, info};

use crate::core::error::{require_non_blank, LibraryError, Result};
use crate::core::Database;
use crate::domain::{normalize, Book, BookId, BookMetadata, BookUpdate, Fingerprint, LoanId};

/// Columns selected for every book query; `available` is derived from loans
const BOOK_COLUMNS: &str = "b.id, b.title, b.author, b.genre, b.isbn, b.description, \
     b.fingerprint, b.deleted, b.created_at, b.updated_at, \
     NOT EXISTS (SELECT 1 FROM loans l WHERE l.book_id = b.id AND l.returned_at IS NULL)";

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: BookId(row.get(0)?),
        title: row.get(1)?,
        author: row.get(2)?,
        genre: row.get(3)?,
        isbn: row.get(4)?,
        description: row.get(5)?,
        fingerprint: Fingerprint::from_stored(row.get(6)?),
        deleted: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        available: row.get(10)?,
    })
}

fn load_book(conn: &rusqlite::Connection, id: BookId) -> Result<Book> {
    conn.query_row(
        &format!("SELECT {BOOK_COLUMNS} FROM books b WHERE b.id = ?1"),
        params![id.get()],
        book_from_row,
    )
    .optional()?
    .ok_or(LibraryError::BookNotFound(id))
}

/// Live book holding a fingerprint, ignoring `exclude`
fn live_fingerprint_owner(
    tx: &Transaction<'_>,
    fingerprint: &Fingerprint,
    exclude: Option<BookId>,
) -> Result<Option<BookId>> {
    let owner = tx
        .query_row(
            "SELECT id FROM books WHERE fingerprint = ?1 AND deleted = 0 AND id != ?2",
            params![fingerprint.as_str(), exclude.map_or(-1, BookId::get)],
            |row| row.get(0).map(BookId),
        )
        .optional()?;
    Ok(owner)
}

/// Id of the open loan on a book, if any
pub(crate) fn open_loan_id(conn: &rusqlite::Connection, book_id: BookId) -> Result<Option<LoanId>> {
    let loan = conn
        .query_row(
            "SELECT id FROM loans WHERE book_id = ?1 AND returned_at IS NULL",
            params![book_id.get()],
            |row| row.get(0).map(LoanId),
        )
        .optional()?;
    Ok(loan)
}

/// Narrowing options for [`Catalog::search`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// `Some(true)` keeps only available books, `Some(false)` only borrowed ones
    pub available: Option<bool>,

    /// Keep only books in this genre (case/whitespace-insensitive)
    pub genre: Option<String>,
}

impl SearchFilter {
    /// Filter on availability
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = Some(available);
        self
    }

    /// Filter on genre
    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if let Some(genre) = &self.genre {
            require_non_blank("genre filter", genre)?;
        }
        Ok(())
    }

    fn accepts(&self, book: &Book) -> bool {
        if let Some(available) = self.available {
            if book.available != available {
                return false;
            }
        }
        match &self.genre {
            Some(genre) => normalize(&book.genre) == normalize(genre),
            None => true,
        }
    }
}

/// Which field produced a search hit, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchField {
    /// Title equals the query
    ExactTitle,
    Title,
    Author,
    Genre,
    Description,
    /// Blank query; everything matches
    All,
}

impl MatchField {
    fn classify(book: &Book, query_lower: &str) -> Option<Self> {
        if query_lower.is_empty() {
            return Some(Self::All);
        }

        let title = book.title.to_lowercase();
        if title.trim() == query_lower {
            Some(Self::ExactTitle)
        } else if title.contains(query_lower) {
            Some(Self::Title)
        } else if book.author.to_lowercase().contains(query_lower) {
            Some(Self::Author)
        } else if book.genre.to_lowercase().contains(query_lower) {
            Some(Self::Genre)
        } else if book.description.to_lowercase().contains(query_lower) {
            Some(Self::Description)
        } else {
            None
        }
    }
}

/// A search result with the field that matched
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub book: Book,
    pub matched: MatchField,
}

impl SearchHit {
    fn into_book(self) -> Book {
        self.book
    }
}

/// Ranked search output. Iterating does not consume it, so it can be
/// walked any number of times.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    hits: Vec<SearchHit>,
}

impl SearchResults {
    /// Books in rank order
    pub fn iter(&self) -> impl Iterator<Item = &Book> + '_ {
        self.hits.iter().map(|hit| &hit.book)
    }

    /// Hits with their match field
    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

impl IntoIterator for SearchResults {
    type Item = Book;
    type IntoIter = std::iter::Map<std::vec::IntoIter<SearchHit>, fn(SearchHit) -> Book>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter().map(SearchHit::into_book as fn(SearchHit) -> Book)
    }
}

/// Durable book storage
#[derive(Debug, Clone)]
pub struct Catalog {
    db: Arc<Database>,
}

impl Catalog {
    /// Create a catalog over a shared database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Add a new book, rejecting live duplicates by fingerprint
    pub fn add_book(&self, metadata: BookMetadata) -> Result<BookId> {
        require_non_blank("title", &metadata.title)?;
        require_non_blank("author", &metadata.author)?;

        let fingerprint = metadata.fingerprint();
        let id = self.db.write(|tx| {
            if let Some(existing) = live_fingerprint_owner(tx, &fingerprint, None)? {
                return Err(LibraryError::Duplicate {
                    fingerprint: fingerprint.clone(),
                    existing,
                });
            }

            let now = Utc::now();
            tx.execute(
                "INSERT INTO books (title, author, genre, isbn, description, fingerprint, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    metadata.title,
                    metadata.author,
                    metadata.genre,
                    metadata.isbn,
                    metadata.description,
                    fingerprint.as_str(),
                    now,
                ],
            )?;
            Ok(BookId(tx.last_insert_rowid()))
        })?;

        info!(book_id = %id, title = %metadata.title, "Book added");
        Ok(id)
    }

    /// Fetch a book by id, including soft-deleted ones
    pub fn get_book(&self, id: BookId) -> Result<Book> {
        self.db.read(|conn| load_book(conn, id))
    }

    /// Apply a partial update and return the stored result
    pub fn update_book(&self, id: BookId, update: BookUpdate) -> Result<Book> {
        if let Some(title) = &update.title {
            require_non_blank("title", title)?;
        }
        if let Some(author) = &update.author {
            require_non_blank("author", author)?;
        }

        let book = self.db.write(|tx| {
            let current = load_book(tx, id)?;
            if current.deleted {
                return Err(LibraryError::BookRemoved(id));
            }
            if update.is_empty() {
                return Ok(current);
            }

            let title = update.title.clone().unwrap_or(current.title);
            let author = update.author.clone().unwrap_or(current.author);
            let isbn = update.isbn.clone().unwrap_or(current.isbn);
            let genre = update.genre.clone().unwrap_or(current.genre);
            let description = update.description.clone().unwrap_or(current.description);

            let fingerprint = Fingerprint::compute(&title, &author, &isbn);
            if fingerprint != current.fingerprint {
                if let Some(existing) = live_fingerprint_owner(tx, &fingerprint, Some(id))? {
                    return Err(LibraryError::Duplicate {
                        fingerprint,
                        existing,
                    });
                }
            }

            tx.execute(
                "UPDATE books
                 SET title = ?2, author = ?3, genre = ?4, isbn = ?5, description = ?6,
                     fingerprint = ?7, updated_at = ?8
                 WHERE id = ?1",
                params![
                    id.get(),
                    title,
                    author,
                    genre,
                    isbn,
                    description,
                    fingerprint.as_str(),
                    Utc::now(),
                ],
            )?;
            load_book(tx, id)
        })?;

        info!(book_id = %id, "Book updated");
        Ok(book)
    }

    /// Soft-delete a book that has no open loan
    pub fn remove_book(&self, id: BookId) -> Result<()> {
        self.db.write(|tx| {
            let current = load_book(tx, id)?;
            if current.deleted {
                return Err(LibraryError::BookRemoved(id));
            }
            if let Some(loan_id) = open_loan_id(tx, id)? {
                return Err(LibraryError::OpenLoan {
                    book_id: id,
                    loan_id,
                });
            }

            tx.execute(
                "UPDATE books SET deleted = 1, updated_at = ?2 WHERE id = ?1",
                params![id.get(), Utc::now()],
            )?;
            Ok(())
        })?;

        info!(book_id = %id, "Book removed");
        Ok(())
    }

    /// All live books in insertion order
    pub fn list_books(&self) -> Result<Vec<Book>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOK_COLUMNS} FROM books b WHERE b.deleted = 0 ORDER BY b.id"
            ))?;
            let books = stmt
                .query_map([], book_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(books)
        })
    }

    /// Number of live books
    pub fn count(&self) -> Result<usize> {
        self.db.read(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM books WHERE deleted = 0", [], |row| {
                    row.get(0)
                })?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
    }

    /// Search live books (case-insensitive substring match)
    ///
    /// Matches title, author, genre and description. Ranking is by match
    /// field (exact title, title, author, genre, description) and then by
    /// insertion order. A blank query lists every book the filter accepts.
    pub fn search(&self, query: &str, filter: &SearchFilter) -> Result<SearchResults> {
        filter.validate()?;
        let query_lower = query.trim().to_lowercase();

        let mut hits: Vec<SearchHit> = self
            .list_books()?
            .into_iter()
            .filter(|book| filter.accepts(book))
            .filter_map(|book| {
                MatchField::classify(&book, &query_lower).map(|matched| SearchHit { book, matched })
            })
            .collect();

        // Stable sort keeps insertion order inside each tier
        hits.sort_by_key(|hit| hit.matched);

        debug!(query = %query, hits = hits.len(), "Catalog search");
        Ok(SearchResults { hits })
    }
}
