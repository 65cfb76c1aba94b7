use garden::hypergraph::IndexedMemory;
use garden::types::{IdentityAspect, NewEdge, NewFragment, RefinementType};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn seeded_memory() -> IndexedMemory {
    let mut memory = IndexedMemory::new();
    let samples = [
        ("OpenHands", IdentityAspect::TechnicalCapability, "Generated Python code for data processing pipeline", 0.85),
        ("OpenHands", IdentityAspect::BehavioralPattern, "Writes tests before refactoring legacy modules", 0.7),
        ("ii-researcher", IdentityAspect::KnowledgeDomain, "Research on transformer attention mechanisms", 0.9),
        ("ii-researcher", IdentityAspect::KnowledgeDomain, "Survey of Python tooling for research pipelines", 0.6),
        ("ii-agent", IdentityAspect::CognitiveFunction, "Breaks complex problems into smaller steps", 0.75),
        ("ii-agent", IdentityAspect::ValuePrinciple, "Prefers honest answers over confident guesses", 0.95),
        ("AAR_Core", IdentityAspect::MetaReflection, "Reflection about recent pipeline work", 0.5),
    ];
    for (source, aspect, content, confidence) in samples {
        memory
            .add_fragment(NewFragment::new(source, aspect, content, confidence))
            .unwrap();
    }
    memory
}

#[test]
fn test_retrieve_by_aspect_is_pure() {
    let memory = seeded_memory();
    for aspect in IdentityAspect::ALL {
        let results = memory.retrieve_by_aspect(aspect, 100);
        assert!(results.iter().all(|f| f.aspect == aspect), "impure bucket for {}", aspect);
        assert_eq!(results.len(), memory.statistics().aspect_distribution[&aspect]);
    }
}

#[test]
fn test_retrieve_similar_never_returns_zero_overlap() {
    let memory = seeded_memory();
    for query in ["python pipeline", "honest answers", "transformer research", "nothing matches here"] {
        let query_terms = garden::keywords::extract_keywords(query, 5);
        for fragment in memory.retrieve_similar(query, None, None, 10) {
            assert!(
                fragment.keywords.iter().any(|k| query_terms.contains(k)),
                "{:?} returned for {:?} without shared keywords",
                fragment.keywords,
                query
            );
        }
    }
    assert!(memory.retrieve_similar("nothing matches here", None, None, 10).is_empty());
}

#[test]
fn test_export_import_round_trip() {
    let mut memory = seeded_memory();
    let ids: Vec<String> = memory.fragments().map(|f| f.id.clone()).collect();
    memory
        .add_refinement_edge(NewEdge::new(Some(ids[0].clone()), ids[3].clone(), RefinementType::Integration, 0.1))
        .unwrap();
    memory
        .add_refinement_edge(NewEdge::new(None, ids[2].clone(), RefinementType::Elaboration, 0.05))
        .unwrap();

    let json = serde_json::to_string_pretty(&memory.export()).unwrap();
    let restored = IndexedMemory::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();

    assert_eq!(restored.statistics(), memory.statistics());
    let fragment_ids = |m: &IndexedMemory| m.fragments().map(|f| f.id.clone()).collect::<BTreeSet<_>>();
    let edge_ids = |m: &IndexedMemory| m.edges().map(|e| e.id.clone()).collect::<BTreeSet<_>>();
    assert_eq!(fragment_ids(&restored), fragment_ids(&memory));
    assert_eq!(edge_ids(&restored), edge_ids(&memory));

    // indexes are rebuilt, not just the primary store
    assert_eq!(
        restored.retrieve_by_source("ii-researcher", 10).len(),
        memory.retrieve_by_source("ii-researcher", 10).len()
    );
}

#[test]
fn test_import_accepts_legacy_field_names() {
    let json = r#"{
        "fragments": {
            "f-1": {
                "id": "f-1",
                "framework_source": "OpenHands",
                "aspect": "technical_capability",
                "content": "Rust services",
                "confidence": 0.8,
                "keywords": ["rust", "services"],
                "timestamp": "2025-01-01T00:00:00Z",
                "metadata": {}
            }
        },
        "tuples": {}
    }"#;
    let memory = IndexedMemory::from_snapshot(serde_json::from_str(json).unwrap()).unwrap();
    assert_eq!(memory.get_fragment("f-1").unwrap().source, "OpenHands");
    assert_eq!(memory.statistics().source_distribution["OpenHands"], 1);
}

#[test]
fn test_import_accepts_offsetless_timestamps_and_empty_metadata() {
    let json = r#"{
        "metadata": {},
        "fragments": {
            "f-1": {
                "id": "f-1",
                "source": "ii-agent",
                "aspect": "value_principle",
                "content": "Be candid",
                "confidence": 0.9,
                "keywords": ["candid"],
                "timestamp": "2025-01-01T12:00:00.123456"
            },
            "f-2": {
                "id": "f-2",
                "source": "ii-agent",
                "aspect": "value_principle",
                "content": "Be candid and kind",
                "confidence": 0.7,
                "keywords": ["candid", "kind"],
                "timestamp": "2025-01-02T08:30:00"
            }
        },
        "tuples": {
            "e-1": {
                "id": "e-1",
                "parent_id": "f-1",
                "child_id": "f-2",
                "refinement_type": "elaboration",
                "confidence_gain": 0.1,
                "timestamp": "2025-01-02T08:30:00.5"
            }
        }
    }"#;
    let memory = IndexedMemory::from_snapshot(serde_json::from_str(json).unwrap()).unwrap();

    let fragment = memory.get_fragment("f-1").unwrap();
    assert_eq!(fragment.timestamp.to_rfc3339(), "2025-01-01T12:00:00.123456+00:00");
    let chain = memory.get_refinement_chain("f-2");
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].timestamp.to_rfc3339(), "2025-01-02T08:30:00.500+00:00");

    // metadata is recomputed, not taken from the empty object
    let stats = memory.statistics();
    assert_eq!(stats.total_fragments, 2);
    assert_eq!(stats.total_tuples, 1);
}

#[test]
fn test_python_pipeline_scenario() {
    let mut memory = IndexedMemory::new();
    let a = memory
        .add_fragment(
            NewFragment::new("OpenHands", IdentityAspect::TechnicalCapability, "Python data pipeline", 0.9)
                .with_keywords(["python", "pipeline"]),
        )
        .unwrap();
    let b = memory
        .add_fragment(
            NewFragment::new("ii-researcher", IdentityAspect::KnowledgeDomain, "Python research", 0.8)
                .with_keywords(["python", "research"]),
        )
        .unwrap();
    memory
        .add_refinement_edge(NewEdge::new(Some(a.clone()), b.clone(), RefinementType::Integration, 0.1))
        .unwrap();

    let ranked: Vec<&str> = memory
        .retrieve_similar("python pipeline", None, None, 10)
        .iter()
        .map(|f| f.id.as_str())
        .collect();
    assert_eq!(ranked, vec![a.as_str(), b.as_str()]);

    let chain = memory.get_refinement_chain(&b);
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].parent_id.as_deref(), Some(a.as_str()));
}
