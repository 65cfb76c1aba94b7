//! Per-collaborator facade over a shared `SyncCoordinator`.

use super::SyncCoordinator;
use crate::types::{
    EdgeId, FragmentId, IdentityAspect, IdentityFragment, NewEdge, NewFragment, RefinementType,
};
use std::sync::Arc;

/// A producer's handle on the garden. Every write is attributed to `name`.
#[derive(Debug, Clone)]
pub struct CollaboratorPort {
    name: String,
    sync: Arc<SyncCoordinator>,
}

impl CollaboratorPort {
    pub fn new(name: impl Into<String>, sync: Arc<SyncCoordinator>) -> Self {
        Self {
            name: name.into(),
            sync,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.sync
    }

    /// Store a fragment sourced from this collaborator.
    #[must_use]
    pub fn remember(
        &self,
        aspect: IdentityAspect,
        content: impl Into<String>,
        confidence: f64,
        keywords: Option<Vec<String>>,
    ) -> Option<FragmentId> {
        let mut new = NewFragment::new(self.name.as_str(), aspect, content, confidence);
        new.keywords = keywords;
        self.sync.add_fragment(new)
    }

    /// Similarity search restricted to this collaborator's own fragments.
    pub fn recall(
        &self,
        query: &str,
        aspect: Option<IdentityAspect>,
        top_k: usize,
    ) -> Vec<IdentityFragment> {
        self.sync
            .retrieve_similar(query, aspect, Some(self.name.as_str()), top_k)
    }

    #[must_use]
    pub fn refine(
        &self,
        parent_id: Option<FragmentId>,
        child_id: impl Into<FragmentId>,
        refinement_type: RefinementType,
        confidence_gain: f64,
    ) -> Option<EdgeId> {
        self.sync.add_refinement_edge(
            &self.name,
            NewEdge::new(parent_id, child_id, refinement_type, confidence_gain),
        )
    }

    pub fn get_my_memories(&self, top_k: usize) -> Vec<IdentityFragment> {
        self.sync.retrieve_by_source(&self.name, top_k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypergraph::IndexedMemory;

    fn shared() -> Arc<SyncCoordinator> {
        Arc::new(SyncCoordinator::new(IndexedMemory::new()))
    }

    #[test]
    fn test_recall_only_sees_own_fragments() {
        let sync = shared();
        let coder = CollaboratorPort::new("OpenHands", sync.clone());
        let researcher = CollaboratorPort::new("ii-researcher", sync);

        let mine = coder
            .remember(
                IdentityAspect::TechnicalCapability,
                "python pipeline",
                0.9,
                Some(vec!["python".into(), "pipeline".into()]),
            )
            .unwrap();
        researcher
            .remember(
                IdentityAspect::KnowledgeDomain,
                "python research",
                0.9,
                Some(vec!["python".into(), "research".into()]),
            )
            .unwrap();

        let recalled = coder.recall("python", None, 10);
        assert_eq!(recalled.len(), 1);
        assert_eq!(recalled[0].id, mine);
        assert_eq!(researcher.get_my_memories(10).len(), 1);
    }

    #[test]
    fn test_refine_is_attributed_to_port() {
        let sync = shared();
        let port = CollaboratorPort::new("ii-agent", sync.clone());
        let a = port
            .remember(IdentityAspect::CognitiveFunction, "plan tasks carefully", 0.6, None)
            .unwrap();
        let b = port
            .remember(IdentityAspect::CognitiveFunction, "plan tasks in parallel", 0.7, None)
            .unwrap();

        let edge = port.refine(Some(a), b.clone(), RefinementType::Elaboration, 0.1);
        assert!(edge.is_some());
        assert_eq!(sync.get_refinement_chain(&b).len(), 1);

        let history = sync.transaction_history(Some("ii-agent"), 10);
        assert_eq!(history.len(), 3);
        assert!(port.refine(None, "ghost", RefinementType::Correction, 0.0).is_none());
    }
}
