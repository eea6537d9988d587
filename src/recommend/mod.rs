//! Content-based book recommendations.
//!
//! A deterministic TF-IDF/cosine computation over book descriptions; no
//! model is trained or stored. Three query modes:
//!
//! 1. **By book**: rank others against one book's vector
//! 2. **By genre/author**: rank a pool against its own centroid
//! 3. **By history**: rank unread books against the centroid of a
//!    borrower's past loans

pub mod engine;
pub mod text;
pub mod vector;

pub use engine::{RecommendOptions, Recommendation, Recommender, DEFAULT_TOP_K};
pub use text::tokenize;
pub use vector::{TermVector, TfIdfIndex};
