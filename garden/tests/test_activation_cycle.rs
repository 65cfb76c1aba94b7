use garden::aar::{Action, ActivationEngine, EnginePhase, Interaction, Stimulus};
use garden::config::ActivationConfig;
use garden::hypergraph::IndexedMemory;
use garden::sync::{CollaboratorPort, SyncCoordinator};
use garden::types::{IdentityAspect, RefinementType};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn shared() -> Arc<SyncCoordinator> {
    Arc::new(SyncCoordinator::new(IndexedMemory::new()))
}

fn kw(words: &[&str]) -> Option<Vec<String>> {
    Some(words.iter().map(|w| w.to_string()).collect())
}

#[test]
fn test_act_gain_is_activation_minus_baseline() {
    let sync = shared();
    let port = CollaboratorPort::new("OpenHands", sync.clone());
    let a = port
        .remember(IdentityAspect::TechnicalCapability, "Python pipelines", 0.9, kw(&["python", "pipeline"]))
        .unwrap();

    let mut engine = ActivationEngine::new(sync.clone());
    engine.agent_mut().set_activation(0.7);
    engine.agent_mut().focus_on(vec![a.clone()]);

    let outcome = engine
        .act(Action::new("generate_code", "OpenHands", "Wrote a streaming parser"))
        .unwrap();
    assert_eq!(outcome.related_fragments, 1);
    assert!((outcome.activation - 0.7).abs() < 1e-12);

    let chain = sync.get_refinement_chain(&outcome.fragment_id);
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].parent_id.as_deref(), Some(a.as_str()));
    assert_eq!(chain[0].refinement_type, RefinementType::Integration);
    assert!((chain[0].confidence_gain - 0.2).abs() < 1e-9);

    let fragment = sync.get_fragment(&outcome.fragment_id).unwrap();
    assert_eq!(fragment.aspect, IdentityAspect::TechnicalCapability);
    assert!((fragment.confidence - 0.7).abs() < 1e-12);
}

#[test]
fn test_act_with_stale_focus_still_records_fragment() {
    let sync = shared();
    let mut engine = ActivationEngine::new(sync.clone());
    engine.agent_mut().focus_on(vec!["no-such-fragment".to_string()]);

    let outcome = engine
        .act(Action::new("coordinate", "ii-agent", "Split the work across two helpers"))
        .unwrap();
    assert!(sync.get_fragment(&outcome.fragment_id).is_some());
    assert!(sync.get_refinement_chain(&outcome.fragment_id).is_empty());
    assert_eq!(sync.sync_statistics().failed_transactions, 1);
}

#[test]
fn test_propagation_is_monotonic() {
    let sync = shared();
    let port = CollaboratorPort::new("ii-researcher", sync.clone());
    let seed = port
        .remember(IdentityAspect::KnowledgeDomain, "graph memory", 1.0, kw(&["graph", "memory"]))
        .unwrap();
    let neighbour = port
        .remember(IdentityAspect::KnowledgeDomain, "graph search", 0.5, kw(&["graph", "search"]))
        .unwrap();

    let mut engine = ActivationEngine::new(sync);
    engine.perceive(Stimulus::new("question", "graph memory").with_intensity(1.0));
    let after_strong = engine.arena().activation(&neighbour);
    // neighbour was reached by propagation: 1.0 * 0.8 * 0.5, then directly activated at 1.0 * 0.5
    assert!(after_strong > 0.0);

    engine.perceive(Stimulus::new("question", "memory").with_intensity(0.1));
    // a weak stimulus re-activates the seed lower, but propagation never lowers the neighbour
    assert!(engine.arena().activation(&neighbour) >= after_strong);
    assert!(engine.arena().activation(&seed) < 1.0);
}

#[test]
fn test_perceive_focuses_on_retrieved_fragments() {
    let sync = shared();
    let coder = CollaboratorPort::new("OpenHands", sync.clone());
    let researcher = CollaboratorPort::new("ii-researcher", sync.clone());
    let code = coder
        .remember(IdentityAspect::TechnicalCapability, "rust code", 0.8, kw(&["rust", "code"]))
        .unwrap();
    researcher
        .remember(IdentityAspect::KnowledgeDomain, "rust research", 0.8, kw(&["rust", "research"]))
        .unwrap();

    let mut engine = ActivationEngine::new(sync);
    let focus = engine.perceive(Stimulus::new("task", "rust code").from_source("OpenHands"));
    assert_eq!(focus, vec![code.clone()]);
    assert_eq!(engine.agent().attention_focus, vec![code.clone()]);
    assert_eq!(engine.phase(), EnginePhase::Perceiving);
    assert!((engine.arena().activation(&code) - 0.5 * 0.8).abs() < 1e-12);
    assert!((engine.agent().activation - 1.0).abs() < 1e-12);
}

#[test]
fn test_full_cycle_produces_reflection() {
    let sync = shared();
    let coder = CollaboratorPort::new("OpenHands", sync.clone());
    let researcher = CollaboratorPort::new("ii-researcher", sync.clone());
    coder
        .remember(IdentityAspect::TechnicalCapability, "Python data pipeline", 0.85, kw(&["python", "pipeline", "data"]))
        .unwrap();
    coder
        .remember(IdentityAspect::TechnicalCapability, "Python test harness", 0.7, kw(&["python", "tests"]))
        .unwrap();
    researcher
        .remember(IdentityAspect::KnowledgeDomain, "Python ecosystem survey", 0.9, kw(&["python", "survey"]))
        .unwrap();

    let config = ActivationConfig {
        perceive_top_k: 5,
        ..ActivationConfig::default()
    };
    let mut engine = ActivationEngine::with_config(sync.clone(), config);
    engine.set_goal("Build reliable pipelines");

    let focus = engine.perceive(Stimulus::new("task", "python pipeline").with_intensity(0.3));
    assert!(!focus.is_empty());
    let outcome = engine
        .act(Action::new("generate_code", "OpenHands", "Implemented a python pipeline stage"))
        .unwrap();
    assert_eq!(outcome.related_fragments, focus.len());

    let reflection = engine.reflect().unwrap();
    assert_eq!(engine.phase(), EnginePhase::Idle);
    assert_eq!(reflection.current_goal.as_deref(), Some("Build reliable pipelines"));
    assert_eq!(reflection.interaction_count, 2);
    assert_eq!(reflection.dominant_aspects[0], IdentityAspect::TechnicalCapability);
    assert_eq!(reflection.active_sources[0], "OpenHands");
    assert!(reflection.top_fragments.len() <= 5);
    assert!(reflection
        .top_fragments
        .windows(2)
        .all(|pair| pair[0].activation >= pair[1].activation));

    let stored = sync.retrieve_similar("self reflection state", Some(IdentityAspect::MetaReflection), None, 5);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].source, "AAR_Core");
    assert_eq!(stored[0].content, reflection.summary());

    let narrative = engine.get_emergent_self().unwrap();
    assert!(narrative.contains("Current goal: Build reliable pipelines"));
    assert_eq!(sync.retrieve_by_aspect(IdentityAspect::MetaReflection, 10).len(), 2);

    assert!(matches!(engine.interaction_history()[0], Interaction::Perception { .. }));
    assert!(matches!(engine.interaction_history()[1], Interaction::Action { .. }));
}
