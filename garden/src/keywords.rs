//! Stop-word filtered keyword extraction.
//!
//! This is the stand-in for real NLP: fragments without caller-supplied
//! keywords, and every similarity query, go through `extract_keywords`.

use indexmap::IndexMap;

/// Default number of keywords kept per text.
pub const DEFAULT_MAX_KEYWORDS: usize = 5;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "can", "this", "that", "these",
    "those", "i", "you", "he", "she", "it", "we", "they",
];

const TRIM_CHARS: &[char] = &['.', ',', '!', '?', ';', ':'];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

/// Extracts up to `max_keywords` terms from `text`, most frequent first.
///
/// Tokens are lower-cased whitespace splits; stop words and tokens of
/// length <= 3 are dropped before punctuation is trimmed. Frequency ties
/// keep first-occurrence order.
pub fn extract_keywords(text: &str, max_keywords: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut counts: IndexMap<&str, usize> = IndexMap::new();

    for word in lowered.split_whitespace() {
        if is_stop_word(word) || word.chars().count() <= 3 {
            continue;
        }
        let term = word.trim_matches(TRIM_CHARS);
        if term.is_empty() {
            continue;
        }
        *counts.entry(term).or_insert(0) += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    // stable: equal counts stay in first-seen order
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(max_keywords)
        .map(|(term, _)| term.to_string())
        .collect()
}

/// Normalizes caller-supplied keywords: trimmed, lower-cased, de-duplicated
/// preserving first occurrence, empties dropped.
pub fn normalize_keywords<I, T>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for keyword in keywords {
        let term = keyword.as_ref().trim().to_lowercase();
        if !term.is_empty() && !out.contains(&term) {
            out.push(term);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_significant_terms_only() {
        let keywords = extract_keywords("The agent was writing Python code for the pipeline", 5);
        assert_eq!(keywords, vec!["agent", "writing", "python", "code", "pipeline"]);
    }

    #[test]
    fn test_frequency_ranking_and_limit() {
        let keywords = extract_keywords(
            "memory graph memory nodes graph memory edges weights",
            3,
        );
        assert_eq!(keywords, vec!["memory", "graph", "nodes"]);
    }

    #[test]
    fn test_punctuation_trimmed_after_length_check() {
        // "data." has length 5 so it survives the length filter, then trims to "data"
        let keywords = extract_keywords("Data. Python!", 5);
        assert_eq!(keywords, vec!["data", "python"]);
        // "fun!" is long enough before trimming, "fun" would not be
        assert_eq!(extract_keywords("fun!", 5), vec!["fun"]);
    }

    #[test]
    fn test_short_and_stop_words_dropped() {
        assert!(extract_keywords("it is a cat and the dog", 5).is_empty());
        assert!(extract_keywords("", 5).is_empty());
        assert!(extract_keywords("....", 5).is_empty());
    }

    #[test]
    fn test_normalize_keywords_dedupes_case_insensitively() {
        let keywords = normalize_keywords(["Python", " python ", "Pipeline", ""]);
        assert_eq!(keywords, vec!["python", "pipeline"]);
    }
}
