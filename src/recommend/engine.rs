//! Ranking of catalog books by description similarity.
//!
//! Each request snapshots the live catalog, builds a fresh
//! [`TfIdfIndex`] and ranks candidates against a query vector. Nothing is
//! cached between requests, so results may trail concurrent writes.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use super::vector::{TermVector, TfIdfIndex};
use crate::core::error::{require_non_blank, LibraryError, Result};
use crate::domain::{normalize, Book, BookId};
use crate::library::{Catalog, Ledger};

/// Default number of results
pub const DEFAULT_TOP_K: usize = 10;

/// Options shared by every query mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommendOptions {
    /// Maximum number of results; must be at least 1
    pub top_k: usize,

    /// Drop books that are currently on loan
    pub available_only: bool,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            available_only: false,
        }
    }
}

impl RecommendOptions {
    /// Options with a custom result limit
    pub fn top(top_k: usize) -> Self {
        Self {
            top_k,
            ..Self::default()
        }
    }

    /// Only suggest books that can be borrowed right now
    pub fn available_only(mut self) -> Self {
        self.available_only = true;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(LibraryError::invalid("top_k", "must be at least 1"));
        }
        Ok(())
    }
}

/// A suggested book with its similarity score
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub book: Book,
    pub score: f64,
}

/// Corpus snapshot used by one request
struct Snapshot {
    books: Vec<Book>,
    index: TfIdfIndex,
}

impl Snapshot {
    fn take(catalog: &Catalog) -> Result<Self> {
        let books = catalog.list_books()?;
        let index = TfIdfIndex::build(books.iter().map(|b| (b.id, b.description.as_str())));
        Ok(Self { books, index })
    }

    /// Too small for any comparison
    fn is_degenerate(&self) -> bool {
        self.books.len() < 2
    }

    /// Score candidates against `query`, best first, ties by ascending id
    fn rank<'a>(
        &'a self,
        query: &TermVector,
        candidates: impl Iterator<Item = &'a Book>,
        options: RecommendOptions,
    ) -> Vec<Recommendation> {
        let mut scored: Vec<(&Book, f64)> = candidates
            .filter(|book| !options.available_only || book.available)
            .filter_map(|book| {
                let score = self.index.vector(book.id)?.cosine(query);
                (score > 0.0).then_some((book, score))
            })
            .collect();

        scored.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        scored
            .into_iter()
            .take(options.top_k)
            .map(|(book, score)| Recommendation {
                book: book.clone(),
                score,
            })
            .collect()
    }
}

/// Content-based recommender over a catalog and its loan history
#[derive(Debug, Clone)]
pub struct Recommender {
    catalog: Catalog,
    ledger: Ledger,
}

impl Recommender {
    pub fn new(catalog: Catalog, ledger: Ledger) -> Self {
        Self { catalog, ledger }
    }

    /// Books whose descriptions resemble the given book's
    pub fn by_book(&self, book_id: BookId, options: RecommendOptions) -> Result<Vec<Recommendation>> {
        options.validate()?;
        let snapshot = Snapshot::take(&self.catalog)?;
        if snapshot.is_degenerate() {
            return Ok(Vec::new());
        }

        let Some(query) = snapshot.index.vector(book_id) else {
            return Err(LibraryError::invalid(
                "book id",
                format!("{book_id} is not a live catalog book"),
            ));
        };

        let results = snapshot.rank(
            query,
            snapshot.books.iter().filter(|b| b.id != book_id),
            options,
        );
        debug!(%book_id, results = results.len(), "Recommended by book");
        Ok(results)
    }

    /// Most representative books of a genre
    pub fn by_genre(&self, genre: &str, options: RecommendOptions) -> Result<Vec<Recommendation>> {
        require_non_blank("genre", genre)?;
        self.by_pool(options, |book| normalize(&book.genre) == normalize(genre))
    }

    /// Most representative books of an author
    pub fn by_author(&self, author: &str, options: RecommendOptions) -> Result<Vec<Recommendation>> {
        require_non_blank("author", author)?;
        self.by_pool(options, |book| normalize(&book.author) == normalize(author))
    }

    /// Rank a pool of books by closeness to the pool's own centroid
    fn by_pool(
        &self,
        options: RecommendOptions,
        in_pool: impl Fn(&Book) -> bool,
    ) -> Result<Vec<Recommendation>> {
        options.validate()?;
        let snapshot = Snapshot::take(&self.catalog)?;
        if snapshot.is_degenerate() {
            return Ok(Vec::new());
        }

        let pool: Vec<&Book> = snapshot.books.iter().filter(|b| in_pool(*b)).collect();
        let centroid = TermVector::centroid(
            pool.iter()
                .filter_map(|book| snapshot.index.vector(book.id)),
        );

        let results = snapshot.rank(&centroid, pool.into_iter(), options);
        debug!(results = results.len(), "Recommended by pool");
        Ok(results)
    }

    /// Unread books resembling everything a borrower has borrowed
    pub fn by_history(&self, borrower_id: &str, options: RecommendOptions) -> Result<Vec<Recommendation>> {
        options.validate()?;
        require_non_blank("borrower_id", borrower_id)?;

        let history = self.ledger.history_for(borrower_id)?;
        let snapshot = Snapshot::take(&self.catalog)?;
        if snapshot.is_degenerate() || history.is_empty() {
            return Ok(Vec::new());
        }

        let borrowed: BTreeSet<BookId> = history.iter().map(|loan| loan.book_id).collect();
        // Books removed since they were borrowed no longer contribute
        let centroid =
            TermVector::centroid(borrowed.iter().filter_map(|id| snapshot.index.vector(*id)));

        let results = snapshot.rank(
            &centroid,
            snapshot.books.iter().filter(|b| !borrowed.contains(&b.id)),
            options,
        );
        debug!(borrower = %borrower_id, results = results.len(), "Recommended by history");
        Ok(results)
    }

    /// Pairwise similarity of two live books (0 if either is unknown)
    pub fn similarity(&self, a: BookId, b: BookId) -> Result<f64> {
        let snapshot = Snapshot::take(&self.catalog)?;
        Ok(snapshot.index.similarity(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorKind, Library};
    use crate::domain::BookMetadata;
    use chrono::NaiveDate;

    fn add(library: &Library, title: &str, author: &str, genre: &str, description: &str) -> BookId {
        library
            .catalog()
            .add_book(
                BookMetadata::new(title, author)
                    .with_genre(genre)
                    .with_description(description),
            )
            .unwrap()
    }

    fn seeded() -> (Library, [BookId; 4]) {
        let library = Library::open_in_memory().unwrap();
        let dune = add(&library, "Dune", "Herbert", "scifi", "A desert planet, spice, politics and empire");
        let messiah = add(&library, "Dune Messiah", "Herbert", "scifi", "Empire politics on a desert planet");
        let foundation = add(&library, "Foundation", "Asimov", "scifi", "A galactic empire falls; psychohistory");
        let holmes = add(&library, "A Study in Scarlet", "Doyle", "mystery", "A detective in foggy London");
        (library, [dune, messiah, foundation, holmes])
    }

    #[test]
    fn test_by_book_ranks_similar_first() {
        let (library, [dune, messiah, foundation, _]) = seeded();
        let results = library
            .recommender()
            .by_book(dune, RecommendOptions::default())
            .unwrap();

        let ids: Vec<BookId> = results.iter().map(|r| r.book.id).collect();
        assert_eq!(ids, vec![messiah, foundation]);
        assert!(results[0].score > results[1].score);
        assert!(results.iter().all(|r| r.book.id != dune));
    }

    #[test]
    fn test_by_book_unknown_is_input_error() {
        let (library, _) = seeded();
        let err = library
            .recommender()
            .by_book(BookId(999), RecommendOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let (library, [dune, ..]) = seeded();
        let err = library
            .recommender()
            .by_book(dune, RecommendOptions::top(0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_top_k_truncates() {
        let (library, [dune, messiah, ..]) = seeded();
        let results = library
            .recommender()
            .by_book(dune, RecommendOptions::top(1))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].book.id, messiah);
    }

    #[test]
    fn test_available_only_skips_borrowed() {
        let (library, [dune, messiah, foundation, _]) = seeded();
        library
            .ledger()
            .borrow(messiah, "ana", NaiveDate::from_ymd_opt(2030, 1, 1).unwrap())
            .unwrap();

        let results = library
            .recommender()
            .by_book(dune, RecommendOptions::default().available_only())
            .unwrap();
        let ids: Vec<BookId> = results.iter().map(|r| r.book.id).collect();
        assert_eq!(ids, vec![foundation]);
    }

    #[test]
    fn test_by_genre_restricts_pool() {
        let (library, [_, _, _, holmes]) = seeded();
        let results = library
            .recommender()
            .by_genre("SciFi", RecommendOptions::default())
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.book.genre == "scifi"));
        assert!(results.iter().all(|r| r.book.id != holmes));
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_by_author() {
        let (library, [dune, messiah, ..]) = seeded();
        let results = library
            .recommender()
            .by_author("herbert", RecommendOptions::default())
            .unwrap();
        let mut ids: Vec<BookId> = results.iter().map(|r| r.book.id).collect();
        ids.sort();
        assert_eq!(ids, vec![dune, messiah]);

        let err = library
            .recommender()
            .by_author("  ", RecommendOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_by_history_excludes_borrowed() {
        let (library, [dune, messiah, foundation, _]) = seeded();
        let loan = library
            .ledger()
            .borrow(dune, "ana", NaiveDate::from_ymd_opt(2030, 1, 1).unwrap())
            .unwrap();
        library.ledger().return_book(loan).unwrap();

        let results = library
            .recommender()
            .by_history("ana", RecommendOptions::default())
            .unwrap();
        let ids: Vec<BookId> = results.iter().map(|r| r.book.id).collect();
        assert_eq!(ids, vec![messiah, foundation]);

        assert!(library
            .recommender()
            .by_history("nobody", RecommendOptions::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_single_book_corpus_is_empty() {
        let library = Library::open_in_memory().unwrap();
        let only = add(&library, "Dune", "Herbert", "scifi", "desert spice");
        library
            .ledger()
            .borrow(only, "ana", NaiveDate::from_ymd_opt(2030, 1, 1).unwrap())
            .unwrap();

        let recommender = library.recommender();
        let options = RecommendOptions::default();
        assert!(recommender.by_book(only, options).unwrap().is_empty());
        assert!(recommender.by_genre("scifi", options).unwrap().is_empty());
        assert!(recommender.by_author("Herbert", options).unwrap().is_empty());
        assert!(recommender.by_history("ana", options).unwrap().is_empty());
    }

    #[test]
    fn test_empty_description_yields_nothing() {
        let (library, _) = seeded();
        let blank = add(&library, "Untitled", "Nobody", "misc", "");
        let results = library
            .recommender()
            .by_book(blank, RecommendOptions::default())
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_ties_break_by_id() {
        let library = Library::open_in_memory().unwrap();
        let query = add(&library, "Q", "A", "g", "whale ocean");
        let first = add(&library, "X", "B", "g", "whale");
        let second = add(&library, "Y", "C", "g", "whale");
        add(&library, "Z", "D", "g", "mountain");

        let results = library
            .recommender()
            .by_book(query, RecommendOptions::default())
            .unwrap();
        let ids: Vec<BookId> = results.iter().map(|r| r.book.id).collect();
        assert_eq!(ids, vec![first, second]);
        assert_eq!(results[0].score, results[1].score);
    }
}
