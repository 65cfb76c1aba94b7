//! Agent-Arena-Relation activation engine.
//!
//! The agent carries an activation level, a goal and an attention focus.
//! The arena carries transient per-fragment activation on top of the shared
//! memory. The engine drives both through a perceive → act → reflect cycle:
//!
//! - `perceive` pulls fragments similar to a stimulus into the arena and
//!   spreads activation to fragments of the same aspect.
//! - `act` records what the agent did as a new fragment, linked to the
//!   fragment currently in focus.
//! - `reflect` summarizes the most activated fragments and stores that
//!   summary back as a `meta_reflection` fragment.
//!
//! Every mutation goes through the shared `SyncCoordinator`. The engine
//! itself is single-owner (`&mut self`).

pub mod agent;
pub mod arena;
pub mod reflection;

use crate::config::ActivationConfig;
use crate::error::{GardenError, GardenResult};
use crate::sync::SyncCoordinator;
use crate::types::{FragmentId, IdentityAspect, Metadata, NewEdge, NewFragment, RefinementType};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, warn};

pub use agent::AgentState;
pub use arena::ArenaState;
pub use reflection::{ActiveFragment, SelfReflection};

/// Activation assumed for a stimulus built without an explicit intensity.
pub const DEFAULT_STIMULUS_INTENSITY: f64 = 0.5;

/// Aspects a reflection reports, and the sources alongside them.
const DOMINANT_TALLY: usize = 3;

/// Keywords attached to every reflection fragment.
const REFLECTION_KEYWORDS: [&str; 3] = ["self", "reflection", "state"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    Idle,
    Perceiving,
    Acting,
    Reflecting,
}

/// Something the engine perceives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stimulus {
    /// Free-form label (`task`, `question`, `feedback`, ...)
    pub kind: String,
    pub content: String,
    /// Restricts retrieval to one collaborator's fragments
    pub source: Option<String>,
    pub intensity: f64,
}

impl Stimulus {
    pub fn new(kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
            source: None,
            intensity: DEFAULT_STIMULUS_INTENSITY,
        }
    }

    pub fn from_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = intensity;
        self
    }
}

/// Something the engine did, recorded as a fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action kind; selects the fragment aspect via [`aspect_for_action`]
    pub kind: String,
    pub source: String,
    pub content: String,
}

impl Action {
    pub fn new(kind: impl Into<String>, source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            source: source.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub fragment_id: FragmentId,
    pub activation: f64,
    /// Size of the attention focus when the action ran.
    pub related_fragments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Interaction {
    Perception {
        stimulus: Stimulus,
        activated_fragments: usize,
        agent_activation: f64,
        timestamp: DateTime<Utc>,
    },
    Action {
        action: Action,
        fragment_id: FragmentId,
        agent_activation: f64,
        timestamp: DateTime<Utc>,
    },
}

/// Fragment aspect recorded for an action kind.
pub fn aspect_for_action(kind: &str) -> IdentityAspect {
    match kind {
        "generate_code" => IdentityAspect::TechnicalCapability,
        "research" => IdentityAspect::KnowledgeDomain,
        "reason" => IdentityAspect::CognitiveFunction,
        "coordinate" => IdentityAspect::BehavioralPattern,
        "create" => IdentityAspect::PersonalityTrait,
        "reflect" => IdentityAspect::MetaReflection,
        _ => IdentityAspect::CognitiveFunction,
    }
}

/// The relation between one agent and the shared arena.
#[derive(Debug)]
pub struct ActivationEngine {
    sync: Arc<SyncCoordinator>,
    config: ActivationConfig,
    agent: AgentState,
    arena: ArenaState,
    phase: EnginePhase,
    interactions: Vec<Interaction>,
}

impl ActivationEngine {
    pub fn new(sync: Arc<SyncCoordinator>) -> Self {
        Self::with_config(sync, ActivationConfig::default())
    }

    pub fn with_config(sync: Arc<SyncCoordinator>, config: ActivationConfig) -> Self {
        Self {
            sync,
            agent: AgentState::new(config.initial_activation),
            arena: ArenaState::new(),
            phase: EnginePhase::Idle,
            interactions: Vec::new(),
            config,
        }
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.sync
    }

    pub fn config(&self) -> &ActivationConfig {
        &self.config
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn agent(&self) -> &AgentState {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut AgentState {
        &mut self.agent
    }

    pub fn arena(&self) -> &ArenaState {
        &self.arena
    }

    pub fn interaction_history(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn set_goal(&mut self, goal: impl Into<String>) {
        self.agent.set_goal(goal);
    }

    /// Drop all arena activation. Agent state is left untouched.
    pub fn reset_activation(&mut self) {
        self.arena.clear();
    }

    /// Pull fragments relevant to `stimulus` into the arena.
    ///
    /// Returns the ids of the directly activated fragments, which also
    /// become the new attention focus.
    pub fn perceive(&mut self, stimulus: Stimulus) -> Vec<FragmentId> {
        self.phase = EnginePhase::Perceiving;

        let intensity = agent::clamp_unit(stimulus.intensity);
        self.agent.stimulate(intensity);

        let relevant = self.sync.retrieve_similar(
            &stimulus.content,
            None,
            stimulus.source.as_deref(),
            self.config.perceive_top_k,
        );

        for fragment in &relevant {
            self.arena
                .activate(&fragment.id, intensity * fragment.confidence);
            self.spread_from(&fragment.id, &fragment.content, fragment.aspect);
        }

        let focus: Vec<FragmentId> = relevant.into_iter().map(|f| f.id).collect();
        debug!(
            stimulus = %stimulus.kind,
            activated = focus.len(),
            agent_activation = self.agent.activation,
            "Perceived stimulus"
        );

        self.agent.focus_on(focus.clone());
        self.interactions.push(Interaction::Perception {
            activated_fragments: focus.len(),
            agent_activation: self.agent.activation,
            timestamp: Utc::now(),
            stimulus,
        });
        focus
    }

    /// One propagation pass from `source_id` to fragments of the same aspect.
    fn spread_from(&mut self, source_id: &str, content: &str, aspect: IdentityAspect) {
        let source_activation = self.arena.activation(source_id);
        let related = self
            .sync
            .retrieve_similar(content, Some(aspect), None, self.config.propagation_fanout);

        for fragment in related.iter().filter(|f| f.id != source_id) {
            self.arena.propagate(
                &fragment.id,
                source_activation * self.config.propagation_decay * fragment.confidence,
            );
        }
    }

    /// Record `action` as a fragment and link it to the current focus.
    pub fn act(&mut self, action: Action) -> GardenResult<ActionOutcome> {
        self.phase = EnginePhase::Acting;

        let activation = self.agent.activation;
        let aspect = aspect_for_action(&action.kind);
        let mut metadata = Metadata::new();
        metadata.insert("action_type".to_string(), action.kind.clone().into());

        let fragment_id = self
            .sync
            .add_fragment(
                NewFragment::new(action.source.as_str(), aspect, action.content.as_str(), activation)
                    .with_metadata(metadata),
            )
            .ok_or_else(|| GardenError::TransactionFailure {
                operation: "add_fragment".to_string(),
            })?;

        if let Some(parent_id) = self.agent.attention_focus.first().cloned() {
            let edge = NewEdge::new(
                Some(parent_id.clone()),
                fragment_id.clone(),
                RefinementType::Integration,
                activation - 0.5,
            );
            if self.sync.add_refinement_edge(&action.source, edge).is_none() {
                warn!(
                    parent_id = %parent_id,
                    child_id = %fragment_id,
                    "Could not link action to focused fragment"
                );
            }
        }

        self.arena.activate(&fragment_id, activation);

        let outcome = ActionOutcome {
            fragment_id: fragment_id.clone(),
            activation,
            related_fragments: self.agent.attention_focus.len(),
        };
        debug!(
            action = %action.kind,
            fragment_id = %fragment_id,
            aspect = %aspect,
            "Recorded action"
        );
        self.interactions.push(Interaction::Action {
            action,
            fragment_id,
            agent_activation: activation,
            timestamp: Utc::now(),
        });
        Ok(outcome)
    }

    /// The `top_k` most activated fragments still present in memory.
    ///
    /// All ids are resolved in one coordinator read, so a concurrent
    /// `load` cannot split the result across two stores.
    pub fn most_activated(&self, top_k: usize) -> Vec<ActiveFragment> {
        let ranked = self.arena.most_activated(top_k);
        self.sync.with_memory(|memory| {
            ranked
                .into_iter()
                .filter_map(|(id, activation)| {
                    let fragment = memory.get_fragment(&id)?;
                    Some(ActiveFragment {
                        fragment_id: fragment.id.clone(),
                        content: fragment.content.clone(),
                        aspect: fragment.aspect,
                        source: fragment.source.clone(),
                        confidence: fragment.confidence,
                        activation,
                    })
                })
                .collect()
        })
    }

    /// Summarize the current self-state and store the summary as a
    /// `meta_reflection` fragment.
    pub fn reflect(&mut self) -> GardenResult<SelfReflection> {
        self.phase = EnginePhase::Reflecting;

        let active = self.most_activated(self.config.reflection_window);
        let reflection = SelfReflection {
            agent_activation: self.agent.activation,
            current_goal: self.agent.current_goal.clone(),
            active_fragments_count: active.len(),
            dominant_aspects: top_counts(active.iter().map(|f| f.aspect), DOMINANT_TALLY),
            active_sources: top_counts(active.iter().map(|f| f.source.clone()), DOMINANT_TALLY),
            top_fragments: active
                .iter()
                .take(self.config.reflection_top_fragments)
                .cloned()
                .collect(),
            interaction_count: self.interactions.len(),
        };

        let stored = self.sync.add_fragment(
            NewFragment::new(
                self.config.reflection_source.as_str(),
                IdentityAspect::MetaReflection,
                reflection.summary(),
                self.agent.activation,
            )
            .with_keywords(REFLECTION_KEYWORDS),
        );

        self.phase = EnginePhase::Idle;
        match stored {
            Some(fragment_id) => {
                debug!(
                    fragment_id = %fragment_id,
                    active = reflection.active_fragments_count,
                    "Stored self-reflection"
                );
                Ok(reflection)
            }
            None => Err(GardenError::TransactionFailure {
                operation: "add_fragment".to_string(),
            }),
        }
    }

    /// Reflect once and render the result as a narrative.
    pub fn get_emergent_self(&mut self) -> GardenResult<String> {
        Ok(self.reflect()?.narrative())
    }
}

/// Most frequent items first; equal counts keep first-seen order.
fn top_counts<T, I>(items: I, limit: usize) -> Vec<T>
where
    T: Hash + Eq,
    I: IntoIterator<Item = T>,
{
    let mut counts: IndexMap<T, usize> = IndexMap::new();
    for item in items {
        *counts.entry(item).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1))
        .take(limit)
        .map(|(item, _)| item)
        .collect()
}
