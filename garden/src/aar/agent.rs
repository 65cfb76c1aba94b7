use crate::types::FragmentId;
use serde::{Deserialize, Serialize};

/// Agent: the urge to act.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Always within [0, 1].
    pub activation: f64,
    pub current_goal: Option<String>,
    pub attention_focus: Vec<FragmentId>,
}

impl AgentState {
    pub fn new(initial_activation: f64) -> Self {
        Self {
            activation: clamp_unit(initial_activation),
            current_goal: None,
            attention_focus: Vec::new(),
        }
    }

    /// Add `intensity` to the activation level, saturating at 1.
    pub fn stimulate(&mut self, intensity: f64) {
        self.activation = clamp_unit(self.activation + intensity);
    }

    pub fn set_activation(&mut self, level: f64) {
        self.activation = clamp_unit(level);
    }

    pub fn set_goal(&mut self, goal: impl Into<String>) {
        self.current_goal = Some(goal.into());
        self.attention_focus.clear();
    }

    pub fn focus_on(&mut self, fragments: Vec<FragmentId>) {
        self.attention_focus = fragments;
    }
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
