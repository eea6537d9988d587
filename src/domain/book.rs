//! Book records and the fingerprint used for duplicate detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Storage-assigned book identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub i64);

impl BookId {
    /// Get the raw integer value
    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BookId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(BookId)
    }
}

/// Duplicate-detection key (SHA256 of normalized title/author/ISBN, first 16 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a title/author/ISBN triple.
    ///
    /// Each field is passed through [`normalize`] first, so "Dune " and
    /// "dune" produce the same key. Fields are joined with a unit separator
    /// so that moving characters between fields changes the key.
    pub fn compute(title: &str, author: &str, isbn: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize(title).as_bytes());
        hasher.update([0x1f]);
        hasher.update(normalize(author).as_bytes());
        hasher.update([0x1f]);
        hasher.update(normalize(isbn).as_bytes());
        let result = hasher.finalize();

        Self(hex::encode(&result[..16]))
    }

    /// Wrap a stored fingerprint string
    pub(crate) fn from_stored(value: String) -> Self {
        Self(value)
    }

    /// Get the hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lower-case a field and collapse every whitespace run to a single space.
pub fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Caller-supplied metadata for a new book
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub description: String,
}

impl BookMetadata {
    /// Create metadata with the two required fields
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            ..Self::default()
        }
    }

    /// Set the genre
    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = genre.into();
        self
    }

    /// Set the ISBN
    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = isbn.into();
        self
    }

    /// Set the free-text description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Fingerprint of this metadata
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(&self.title, &self.author, &self.isbn)
    }
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
}

impl BookUpdate {
    /// True when the update touches a fingerprint field
    pub fn changes_identity(&self) -> bool {
        self.title.is_some() || self.author.is_some() || self.isbn.is_some()
    }

    /// True when nothing would change
    pub fn is_empty(&self) -> bool {
        !self.changes_identity() && self.genre.is_none() && self.description.is_none()
    }
}

/// A catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub isbn: String,
    pub description: String,

    /// Derived from title/author/ISBN at write time
    pub fingerprint: Fingerprint,

    /// True iff no open loan references this book
    pub available: bool,

    /// Soft-delete marker; removed books stay readable for audit
    pub deleted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Metadata view of this book (everything a caller can set)
    pub fn metadata(&self) -> BookMetadata {
        BookMetadata {
            title: self.title.clone(),
            author: self.author.clone(),
            genre: self.genre.clone(),
            isbn: self.isbn.clone(),
            description: self.description.clone(),
        }
    }
}
