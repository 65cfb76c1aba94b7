//! Similarity scoring contract.
//!
//! `IndexedMemory::retrieve_similar` only ever talks to a
//! `SimilarityScorer`, so a vector-similarity backend can replace the
//! keyword heuristic without touching callers.

use crate::keywords::{extract_keywords, DEFAULT_MAX_KEYWORDS};
use crate::types::IdentityFragment;
use std::collections::HashSet;

/// Scores candidate fragments against a free-text query.
///
/// Implementations return one score per candidate, in candidate order.
/// A score of zero (or less) means "unrelated" and the candidate is dropped.
pub trait SimilarityScorer: Send + Sync {
    fn name(&self) -> &str;

    fn score_candidates(&self, query: &str, candidates: &[&IdentityFragment]) -> Vec<f64>;
}

/// Keyword-overlap heuristic:
/// `|Q ∩ F| / max(|Q|, |F|) * confidence`.
#[derive(Debug, Clone)]
pub struct KeywordOverlapScorer {
    max_query_keywords: usize,
}

impl KeywordOverlapScorer {
    pub fn new(max_query_keywords: usize) -> Self {
        Self { max_query_keywords }
    }

    fn overlap_score(query_terms: &HashSet<String>, fragment: &IdentityFragment) -> f64 {
        let fragment_terms: HashSet<&str> = fragment.keywords.iter().map(String::as_str).collect();
        let overlap = query_terms
            .iter()
            .filter(|term| fragment_terms.contains(term.as_str()))
            .count();
        if overlap == 0 {
            return 0.0;
        }
        let denominator = query_terms.len().max(fragment_terms.len()) as f64;
        (overlap as f64 / denominator) * fragment.confidence
    }
}

impl Default for KeywordOverlapScorer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEYWORDS)
    }
}

impl SimilarityScorer for KeywordOverlapScorer {
    fn name(&self) -> &str {
        "keyword-overlap"
    }

    fn score_candidates(&self, query: &str, candidates: &[&IdentityFragment]) -> Vec<f64> {
        let query_terms: HashSet<String> = extract_keywords(query, self.max_query_keywords)
            .into_iter()
            .collect();
        if query_terms.is_empty() {
            return vec![0.0; candidates.len()];
        }
        candidates
            .iter()
            .map(|fragment| Self::overlap_score(&query_terms, fragment))
            .collect()
    }
}
