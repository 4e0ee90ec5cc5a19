//! Shared lexical helpers for the validator and the fact extractor.
//!
//! These deliberately operate on surface text: sentence splitting on
//! terminal punctuation and word-boundary name matching. Character name
//! matching falls back to the first and last tokens of a name, which can
//! false-positive on characters sharing a common first name; that
//! behavior is part of the documented heuristic contract.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SENTENCE_SPLIT: Regex = Regex::new(r"[.!?]+").expect("valid regex");
}

/// Split content into trimmed, non-empty sentences.
pub(crate) fn sentences(content: &str) -> Vec<&str> {
    SENTENCE_SPLIT
        .split(content)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lowercased variations of a name used for mention matching: the full
/// name, the first token, and the last token.
pub(crate) fn name_variants(name: &str) -> Vec<String> {
    let full = name.to_lowercase();
    let mut variants = vec![full.clone()];

    if let Some(first) = full.split_whitespace().next() {
        if !variants.contains(&first.to_string()) {
            variants.push(first.to_string());
        }
    }
    if let Some(last) = full.split_whitespace().last() {
        if !variants.contains(&last.to_string()) {
            variants.push(last.to_string());
        }
    }

    variants
}

/// Whether `word` occurs in `text` on word boundaries, ignoring case.
pub(crate) fn contains_word(text: &str, word: &str) -> bool {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(word));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}

/// All sentences of `content` that mention `name` (or its first/last
/// token) on a word boundary.
pub(crate) fn mention_sentences<'a>(content: &'a str, name: &str) -> Vec<&'a str> {
    let variants = name_variants(name);
    sentences(content)
        .into_iter()
        .filter(|sentence| variants.iter().any(|v| contains_word(sentence, v)))
        .collect()
}
