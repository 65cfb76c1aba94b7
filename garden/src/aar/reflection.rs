//! Self-reflection snapshot and its narrative rendering.

use crate::types::{FragmentId, IdentityAspect};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the most activated fragments at reflection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveFragment {
    pub fragment_id: FragmentId,
    pub content: String,
    pub aspect: IdentityAspect,
    pub source: String,
    pub confidence: f64,
    pub activation: f64,
}

/// What the engine believes about itself at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfReflection {
    pub agent_activation: f64,
    pub current_goal: Option<String>,
    pub active_fragments_count: usize,
    /// Most frequent aspects among the active fragments, at most three.
    pub dominant_aspects: Vec<IdentityAspect>,
    /// Most frequent sources among the active fragments, at most three.
    pub active_sources: Vec<String>,
    pub top_fragments: Vec<ActiveFragment>,
    pub interaction_count: usize,
}

impl SelfReflection {
    /// Summary line stored as the reflection fragment's content.
    pub fn summary(&self) -> String {
        format!(
            "Current self-state: {} active fragments, dominant aspects: {}, agent activation: {:.2}",
            self.active_fragments_count,
            join(&self.dominant_aspects),
            self.agent_activation
        )
    }

    /// Multi-line description of the agent, arena and top fragments.
    pub fn narrative(&self) -> String {
        self.to_string()
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for SelfReflection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Emergent self (agent-arena relation)")?;
        writeln!(f)?;
        writeln!(f, "Agent:")?;
        writeln!(f, "  - Activation level: {:.2}", self.agent_activation)?;
        writeln!(
            f,
            "  - Current goal: {}",
            self.current_goal.as_deref().unwrap_or("Exploring")
        )?;
        writeln!(f, "  - Interactions: {}", self.interaction_count)?;
        writeln!(f)?;
        writeln!(f, "Arena:")?;
        writeln!(f, "  - Active fragments: {}", self.active_fragments_count)?;
        writeln!(f, "  - Dominant aspects: {}", join(&self.dominant_aspects))?;
        writeln!(f, "  - Active sources: {}", join(&self.active_sources))?;
        writeln!(f)?;
        write!(f, "Top fragments:")?;
        for (rank, fragment) in self.top_fragments.iter().take(3).enumerate() {
            write!(
                f,
                "\n{}. [{}] {}\n   (source: {}, confidence: {:.2}, activation: {:.2})",
                rank + 1,
                fragment.aspect,
                fragment.content,
                fragment.source,
                fragment.confidence,
                fragment.activation
            )?;
        }
        Ok(())
    }
}
