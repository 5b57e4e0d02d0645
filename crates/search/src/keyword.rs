use std::collections::BTreeSet;
use unicode_segmentation::UnicodeSegmentation;

/// Terms shorter than this carry no signal (`a`, `i`, `x`)
const MIN_TERM_CHARS: usize = 2;

/// Lower-cased search terms of `text`.
///
/// Words come from Unicode word boundaries and are further split on
/// `snake_case` and `camelCase` / `PascalCase` humps, so `validateUser`
/// yields `validate` and `user`. Acronym runs stay together: `HTTPServer`
/// yields `http` and `server`.
pub fn terms(text: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for word in text.unicode_words() {
        for part in word.split('_') {
            for piece in split_camel_case(part) {
                if piece.chars().count() >= MIN_TERM_CHARS {
                    out.insert(piece.to_lowercase());
                }
            }
        }
    }
    out
}

/// Fraction of distinct `query_terms` present in `text`, in `[0, 1]`
pub fn keyword_overlap(query_terms: &BTreeSet<String>, text: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let chunk_terms = terms(text);
    let hits = query_terms
        .iter()
        .filter(|term| chunk_terms.contains(*term))
        .count();
    hits as f32 / query_terms.len() as f32
}

fn split_camel_case(word: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = word.char_indices().collect();
    let mut parts = Vec::new();
    let mut start = 0;

    for i in 1..chars.len() {
        let (idx, ch) = chars[i];
        let prev = chars[i - 1].1;
        let next_is_lower = chars.get(i + 1).is_some_and(|(_, c)| c.is_lowercase());

        let boundary = ch.is_uppercase()
            && (prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower));
        if boundary {
            parts.push(&word[start..idx]);
            start = idx;
        }
    }
    if start < word.len() {
        parts.push(&word[start..]);
    }
    parts
}
