//! String utilities shared by the indexes, coref stages, and name filters.

use once_cell::sync::Lazy;
use regex::Regex;

static UNICODE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{P}+").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Replace Unicode punctuation with spaces and trim.
#[must_use]
pub fn replace_punct(s: &str) -> String {
    UNICODE_PUNCT.replace_all(s, " ").trim().to_string()
}

/// Remove Unicode punctuation.
#[must_use]
pub fn remove_punct(s: &str) -> String {
    UNICODE_PUNCT.replace_all(s, "").into_owned()
}

/// Collapse any whitespace run to a single space.
#[must_use]
pub fn single_space(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").into_owned()
}

/// Character n-grams of a string.
///
/// Returns an empty list when the string is shorter than `n`.
#[must_use]
pub fn ngrams(s: &str, n: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    if n == 0 || chars.len() < n {
        return Vec::new();
    }
    (0..=chars.len() - n)
        .map(|i| chars[i..i + n].iter().collect())
        .collect()
}

/// Case-insensitive key used by the exact-match index, coref grouping,
/// and the caching generator.
#[must_use]
pub fn fold_case(s: &str) -> String {
    s.to_lowercase()
}

/// True when every character is ASCII.
#[must_use]
pub fn is_ascii(s: &str) -> bool {
    s.chars().all(|c| (c as u32) <= 127)
}
