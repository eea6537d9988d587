//! Sparse TF-IDF vectors and cosine similarity.
//!
//! ```text
//! idf(t)       = ln((1 + N) / (1 + df(t))) + 1
//! weight(t, b) = tf(t, b) × idf(t)
//! cosine(a, b) = (a · b) / (‖a‖ ‖b‖)        0 if either side is all-zero
//! ```
//!
//! Vectors are `BTreeMap`s so shared terms are always summed in the same
//! order, which keeps `cosine(a, b) == cosine(b, a)` exact.

use std::collections::{BTreeMap, HashMap};

use super::text::tokenize;
use crate::domain::BookId;

/// Sparse term → weight map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermVector {
    weights: BTreeMap<String, f64>,
}

impl TermVector {
    /// Build from explicit weights; zero entries are dropped
    pub fn from_weights(weights: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            weights: weights.into_iter().filter(|(_, w)| *w != 0.0).collect(),
        }
    }

    /// Weight of a term (0 when absent)
    pub fn weight(&self, term: &str) -> f64 {
        self.weights.get(term).copied().unwrap_or(0.0)
    }

    /// Number of non-zero terms
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// True for the all-zero vector
    pub fn is_zero(&self) -> bool {
        self.weights.is_empty()
    }

    /// Iterate terms in sorted order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.weights.iter().map(|(t, w)| (t.as_str(), *w))
    }

    /// Dot product over shared terms
    pub fn dot(&self, other: &Self) -> f64 {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .weights
            .iter()
            .filter_map(|(term, w)| large.weights.get(term).map(|v| w * v))
            .sum()
    }

    /// Euclidean magnitude
    pub fn norm(&self) -> f64 {
        self.weights.values().map(|w| w * w).sum::<f64>().sqrt()
    }

    /// Cosine similarity in `[0, 1]`; 0 when either vector is zero
    pub fn cosine(&self, other: &Self) -> f64 {
        let norm_a = self.norm();
        let norm_b = other.norm();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        (self.dot(other) / (norm_a * norm_b)).min(1.0)
    }

    /// Element-wise average; the zero vector when `vectors` is empty
    pub fn centroid<'a>(vectors: impl IntoIterator<Item = &'a TermVector>) -> Self {
        let mut sums: BTreeMap<String, f64> = BTreeMap::new();
        let mut count = 0usize;

        for vector in vectors {
            count += 1;
            for (term, weight) in &vector.weights {
                *sums.entry(term.clone()).or_insert(0.0) += weight;
            }
        }

        if count == 0 {
            return Self::default();
        }

        let n = count as f64;
        Self::from_weights(sums.into_iter().map(|(t, w)| (t, w / n)))
    }
}

/// Smoothed inverse document frequency; at least 1, so a term shared by
/// every document still counts
fn smoothed_idf(documents: usize, doc_freq: usize) -> f64 {
    ((1.0 + documents as f64) / (1.0 + doc_freq as f64)).ln() + 1.0
}

/// TF-IDF vectors for a corpus snapshot
#[derive(Debug, Clone, Default)]
pub struct TfIdfIndex {
    vectors: BTreeMap<BookId, TermVector>,
}

impl TfIdfIndex {
    /// Weight every document in the corpus against the whole corpus
    pub fn build<'a>(corpus: impl IntoIterator<Item = (BookId, &'a str)>) -> Self {
        let documents: Vec<(BookId, HashMap<String, usize>)> = corpus
            .into_iter()
            .map(|(id, text)| {
                let mut tf: HashMap<String, usize> = HashMap::new();
                for term in tokenize(text) {
                    *tf.entry(term).or_insert(0) += 1;
                }
                (id, tf)
            })
            .collect();

        let mut df: HashMap<&str, usize> = HashMap::new();
        for (_, tf) in &documents {
            for term in tf.keys() {
                *df.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let n = documents.len();
        let vectors = documents
            .iter()
            .map(|(id, tf)| {
                let weights = tf.iter().map(|(term, &count)| {
                    let doc_freq = df.get(term.as_str()).copied().unwrap_or(1);
                    (term.clone(), count as f64 * smoothed_idf(n, doc_freq))
                });
                (*id, TermVector::from_weights(weights))
            })
            .collect();

        Self { vectors }
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Vector of one document
    pub fn vector(&self, id: BookId) -> Option<&TermVector> {
        self.vectors.get(&id)
    }

    /// Pairwise similarity; 0 when either id is unknown
    pub fn similarity(&self, a: BookId, b: BookId) -> f64 {
        match (self.vectors.get(&a), self.vectors.get(&b)) {
            (Some(va), Some(vb)) => va.cosine(vb),
            _ => 0.0,
        }
    }

    /// All documents in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (BookId, &TermVector)> + '_ {
        self.vectors.iter().map(|(id, v)| (*id, v))
    }
}
