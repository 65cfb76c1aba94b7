//! Arena: transient activation over fragments.
//!
//! Activation lives here, never on the stored fragment, so it can be
//! cleared without touching persisted confidence.

use crate::types::FragmentId;
use itertools::Itertools;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ArenaState {
    activation: HashMap<FragmentId, f64>,
    /// Fragment ids in first-activation order.
    active: Vec<FragmentId>,
}

impl ArenaState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Activation of `fragment_id`, 0 when never activated.
    pub fn activation(&self, fragment_id: &str) -> f64 {
        self.activation.get(fragment_id).copied().unwrap_or(0.0)
    }

    /// Overwrite the activation of `fragment_id`.
    pub fn activate(&mut self, fragment_id: &str, level: f64) {
        self.write(fragment_id, level, false);
    }

    /// Raise the activation of `fragment_id` to at least `level`; never
    /// lowers it.
    pub fn propagate(&mut self, fragment_id: &str, level: f64) {
        self.write(fragment_id, level, true);
    }

    fn write(&mut self, fragment_id: &str, level: f64, keep_max: bool) {
        let level = if level.is_finite() { level } else { 0.0 };
        match self.activation.get_mut(fragment_id) {
            Some(current) => {
                *current = if keep_max { current.max(level) } else { level };
            }
            None => {
                self.activation.insert(fragment_id.to_string(), level);
                self.active.push(fragment_id.to_string());
            }
        }
    }

    /// Highest activations first; ties keep first-activation order.
    pub fn most_activated(&self, top_k: usize) -> Vec<(FragmentId, f64)> {
        self.active
            .iter()
            .map(|id| (id.clone(), self.activation(id)))
            .sorted_by(|a, b| b.1.total_cmp(&a.1))
            .take(top_k)
            .collect()
    }

    pub fn clear(&mut self) {
        self.activation.clear();
        self.active.clear();
    }
}
