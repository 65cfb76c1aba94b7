//! Hypergraph memory substrate.
//!
//! `IndexedMemory` owns every fragment and refinement edge for its whole
//! lifetime. Storage is append-only: there is no delete, and the aspect and
//! source indexes are extended on each insert rather than recomputed. The
//! only full rebuild happens in `import`.
//!
//! This type is not synchronized; concurrent access goes through
//! `crate::sync::SyncCoordinator`.

pub mod scoring;
pub mod snapshot;

use crate::error::{GardenError, GardenResult};
use crate::keywords::{extract_keywords, normalize_keywords, DEFAULT_MAX_KEYWORDS};
use crate::types::{
    EdgeId, FragmentId, IdentityAspect, IdentityFragment, NewEdge, NewFragment, RefinementEdge,
};
use chrono::Utc;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub use scoring::{KeywordOverlapScorer, SimilarityScorer};
pub use snapshot::{MemorySnapshot, MemoryStatistics};

/// Fragment/edge store with aspect and source indexes.
pub struct IndexedMemory {
    fragments: IndexMap<FragmentId, IdentityFragment>,
    edges: IndexMap<EdgeId, RefinementEdge>,
    aspect_index: HashMap<IdentityAspect, Vec<FragmentId>>,
    source_index: HashMap<String, Vec<FragmentId>>,
    scorer: Arc<dyn SimilarityScorer>,
    max_keywords: usize,
}

impl std::fmt::Debug for IndexedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedMemory")
            .field("fragments_len", &self.fragments.len())
            .field("edges_len", &self.edges.len())
            .field("scorer", &self.scorer.name())
            .field("max_keywords", &self.max_keywords)
            .finish()
    }
}

impl Default for IndexedMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexedMemory {
    pub fn new() -> Self {
        Self::with_scorer(Arc::new(KeywordOverlapScorer::default()))
    }

    /// Create an empty store ranking `retrieve_similar` with `scorer`.
    pub fn with_scorer(scorer: Arc<dyn SimilarityScorer>) -> Self {
        Self {
            fragments: IndexMap::new(),
            edges: IndexMap::new(),
            aspect_index: HashMap::new(),
            source_index: HashMap::new(),
            scorer,
            max_keywords: DEFAULT_MAX_KEYWORDS,
        }
    }

    /// Keyword-overlap store extracting up to `max_keywords` terms from both
    /// fragment content and queries.
    pub fn with_keyword_limit(max_keywords: usize) -> Self {
        let max_keywords = max_keywords.max(1);
        Self::with_scorer(Arc::new(KeywordOverlapScorer::new(max_keywords)))
            .with_max_keywords(max_keywords)
    }

    /// Builder: cap on keywords extracted from fragment content. Queries
    /// follow the scorer's own cap.
    pub fn with_max_keywords(mut self, max_keywords: usize) -> Self {
        self.max_keywords = max_keywords.max(1);
        self
    }

    /// Build a store from a snapshot (see [`IndexedMemory::import`]).
    pub fn from_snapshot(snapshot: MemorySnapshot) -> GardenResult<Self> {
        let mut memory = Self::new();
        memory.import(snapshot)?;
        Ok(memory)
    }

    pub fn scorer(&self) -> &Arc<dyn SimilarityScorer> {
        &self.scorer
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, fragment_id: &str) -> bool {
        self.fragments.contains_key(fragment_id)
    }

    pub fn get_fragment(&self, fragment_id: &str) -> Option<&IdentityFragment> {
        self.fragments.get(fragment_id)
    }

    pub fn get_edge(&self, edge_id: &str) -> Option<&RefinementEdge> {
        self.edges.get(edge_id)
    }

    /// All fragments in insertion order.
    pub fn fragments(&self) -> impl Iterator<Item = &IdentityFragment> {
        self.fragments.values()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &RefinementEdge> {
        self.edges.values()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    pub fn add_fragment(&mut self, new: NewFragment) -> GardenResult<FragmentId> {
        // an empty or all-blank list counts as omitted
        let keywords = new
            .keywords
            .map(normalize_keywords)
            .filter(|keywords| !keywords.is_empty())
            .unwrap_or_else(|| extract_keywords(&new.content, self.max_keywords));

        let fragment = IdentityFragment {
            id: Uuid::new_v4().to_string(),
            source: new.source,
            aspect: new.aspect,
            content: new.content,
            confidence: clamp_confidence(new.confidence),
            keywords,
            timestamp: Utc::now(),
            metadata: new.metadata.unwrap_or_default(),
        };
        let fragment_id = fragment.id.clone();

        debug!(
            fragment_id = %fragment_id,
            source = %fragment.source,
            aspect = %fragment.aspect,
            confidence = fragment.confidence,
            "Adding identity fragment"
        );

        self.insert_fragment(fragment);
        Ok(fragment_id)
    }

    pub fn add_refinement_edge(&mut self, new: NewEdge) -> GardenResult<EdgeId> {
        if !self.contains(&new.child_id) {
            return Err(GardenError::UnknownFragment(new.child_id));
        }
        if let Some(parent_id) = new.parent_id.as_ref() {
            if !self.contains(parent_id) {
                return Err(GardenError::UnknownFragment(parent_id.clone()));
            }
        }

        let edge = RefinementEdge {
            id: Uuid::new_v4().to_string(),
            parent_id: new.parent_id,
            child_id: new.child_id,
            refinement_type: new.refinement_type,
            confidence_gain: new.confidence_gain,
            timestamp: Utc::now(),
            metadata: new.metadata.unwrap_or_default(),
        };
        let edge_id = edge.id.clone();

        debug!(
            edge_id = %edge_id,
            parent_id = ?edge.parent_id,
            child_id = %edge.child_id,
            refinement_type = %edge.refinement_type,
            "Adding refinement edge"
        );

        self.edges.insert(edge_id.clone(), edge);
        Ok(edge_id)
    }

    /// Append to the primary store and both index buckets.
    fn insert_fragment(&mut self, fragment: IdentityFragment) {
        self.aspect_index
            .entry(fragment.aspect)
            .or_default()
            .push(fragment.id.clone());
        self.source_index
            .entry(fragment.source.clone())
            .or_default()
            .push(fragment.id.clone());
        self.fragments.insert(fragment.id.clone(), fragment);
    }

    // ------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------

    fn bucket<'a>(&'a self, ids: Option<&'a Vec<FragmentId>>) -> Vec<&'a IdentityFragment> {
        ids.map(|ids| ids.iter().filter_map(|id| self.fragments.get(id)).collect())
            .unwrap_or_default()
    }

    /// Highest confidence first; the stable sort keeps insertion order on ties.
    fn top_by_confidence(mut fragments: Vec<&IdentityFragment>, top_k: usize) -> Vec<&IdentityFragment> {
        fragments.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        fragments.truncate(top_k);
        fragments
    }

    pub fn retrieve_by_aspect(&self, aspect: IdentityAspect, top_k: usize) -> Vec<&IdentityFragment> {
        Self::top_by_confidence(self.bucket(self.aspect_index.get(&aspect)), top_k)
    }

    pub fn retrieve_by_source(&self, source: &str, top_k: usize) -> Vec<&IdentityFragment> {
        Self::top_by_confidence(self.bucket(self.source_index.get(source)), top_k)
    }

    /// Rank fragments against `query` with the configured scorer.
    ///
    /// `aspect` and `source` narrow the candidate set; when both are given
    /// a fragment must match both. Candidates scoring zero never qualify.
    pub fn retrieve_similar(
        &self,
        query: &str,
        aspect: Option<IdentityAspect>,
        source: Option<&str>,
        top_k: usize,
    ) -> Vec<&IdentityFragment> {
        if top_k == 0 {
            return Vec::new();
        }

        let candidates: Vec<&IdentityFragment> = match (aspect, source) {
            (Some(aspect), source) => self
                .bucket(self.aspect_index.get(&aspect))
                .into_iter()
                .filter(|f| source.map_or(true, |s| f.source == s))
                .collect(),
            (None, Some(source)) => self.bucket(self.source_index.get(source)),
            (None, None) => self.fragments.values().collect(),
        };

        let scores = self.scorer.score_candidates(query, &candidates);
        let mut scored: Vec<(f64, &IdentityFragment)> = scores
            .into_iter()
            .zip(candidates)
            .filter(|(score, _)| score.is_finite() && *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);

        debug!(
            query = %query,
            aspect = ?aspect,
            source = ?source,
            results = scored.len(),
            scorer = self.scorer.name(),
            "Similarity retrieval"
        );

        scored.into_iter().map(|(_, fragment)| fragment).collect()
    }

    /// Edges whose child is `fragment_id`.
    pub fn get_refinement_chain(&self, fragment_id: &str) -> Vec<&RefinementEdge> {
        self.edges
            .values()
            .filter(|edge| edge.child_id == fragment_id)
            .collect()
    }

    /// Edges whose parent is `fragment_id`.
    pub fn get_refinements_from(&self, fragment_id: &str) -> Vec<&RefinementEdge> {
        self.edges
            .values()
            .filter(|edge| edge.parent_id.as_deref() == Some(fragment_id))
            .collect()
    }

    // ------------------------------------------------------------------
    // Statistics / snapshot
    // ------------------------------------------------------------------

    pub fn statistics(&self) -> MemoryStatistics {
        let aspect_distribution: BTreeMap<IdentityAspect, usize> = IdentityAspect::ALL
            .iter()
            .map(|aspect| {
                let count = self.aspect_index.get(aspect).map_or(0, Vec::len);
                (*aspect, count)
            })
            .collect();

        let source_distribution: BTreeMap<String, usize> = self
            .source_index
            .iter()
            .map(|(source, ids)| (source.clone(), ids.len()))
            .collect();

        let mut refinement_type_distribution = BTreeMap::new();
        for edge in self.edges.values() {
            *refinement_type_distribution
                .entry(edge.refinement_type)
                .or_insert(0) += 1;
        }

        let avg_confidence = if self.fragments.is_empty() {
            0.0
        } else {
            let total: f64 = self.fragments.values().map(|f| f.confidence).sum();
            total / self.fragments.len() as f64
        };

        MemoryStatistics {
            total_fragments: self.fragments.len(),
            total_tuples: self.edges.len(),
            aspect_distribution,
            source_distribution,
            refinement_type_distribution,
            avg_confidence,
        }
    }

    pub fn export(&self) -> MemorySnapshot {
        MemorySnapshot {
            metadata: self.statistics(),
            fragments: self.fragments.clone(),
            tuples: self.edges.clone(),
        }
    }

    /// Replace the store's contents with `snapshot`.
    ///
    /// All-or-nothing: the snapshot is validated while building a fresh
    /// store, and `self` is only swapped once everything checks out.
    /// Indexes are rebuilt in snapshot order.
    pub fn import(&mut self, snapshot: MemorySnapshot) -> GardenResult<()> {
        let mut rebuilt = Self::with_scorer(self.scorer.clone());
        rebuilt.max_keywords = self.max_keywords;

        for (_, fragment) in snapshot.fragments {
            if rebuilt.contains(&fragment.id) {
                return Err(GardenError::DuplicateId(fragment.id));
            }
            rebuilt.insert_fragment(fragment);
        }

        for (_, edge) in snapshot.tuples {
            if rebuilt.edges.contains_key(&edge.id) {
                return Err(GardenError::DuplicateId(edge.id));
            }
            if !rebuilt.contains(&edge.child_id) {
                return Err(GardenError::UnknownFragment(edge.child_id));
            }
            if let Some(parent_id) = edge.parent_id.as_ref() {
                if !rebuilt.contains(parent_id) {
                    return Err(GardenError::UnknownFragment(parent_id.clone()));
                }
            }
            rebuilt.edges.insert(edge.id.clone(), edge);
        }

        debug!(
            fragments = rebuilt.fragments.len(),
            edges = rebuilt.edges.len(),
            "Imported hypergraph snapshot"
        );

        *self = rebuilt;
        Ok(())
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
