//! Description tokenizer.
//!
//! Text is lower-cased, apostrophes are dropped ("don't" → "dont") and the
//! rest is split on anything that is not alphanumeric. Common English
//! function words are filtered out.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Stop words removed before weighting
const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has", "have", "he",
    "her", "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "me", "more",
    "most", "my", "no", "not", "of", "on", "one", "or", "our", "out", "over", "she", "so", "some",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "to", "too", "up", "us", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| ENGLISH_STOP_WORDS.iter().copied().collect())
}

/// True if the (lower-case) word is filtered out
pub fn is_stop_word(word: &str) -> bool {
    stop_words().contains(word)
}

/// Split text into normalized terms
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace(['\'', '\u{2019}'], "")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty() && !is_stop_word(token))
        .map(str::to_string)
        .collect()
}
