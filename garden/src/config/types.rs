use crate::error::{GardenError, GardenResult};
use crate::keywords::DEFAULT_MAX_KEYWORDS;
use crate::sync::DEFAULT_HISTORY_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration, one section per component.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GardenConfig {
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub activation: ActivationConfig,
}

impl GardenConfig {
    /// Read a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> GardenResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GardenError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> GardenResult<Self> {
        toml::from_str(content).map_err(|e| GardenError::Config(e.to_string()))
    }

    /// Location of the checkpoint file: `snapshot_file` under `data_dir`.
    pub fn snapshot_path(&self) -> PathBuf {
        self.memory.data_dir.join(&self.memory.snapshot_file)
    }
}

/// Storage and retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    /// Directory holding the snapshot file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,
    /// Keywords extracted from content when none are supplied
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            snapshot_file: default_snapshot_file(),
            max_keywords: default_max_keywords(),
            default_top_k: default_top_k(),
        }
    }
}

/// Transaction auditing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// JSONL transaction log; no durable log when absent
    #[serde(default)]
    pub transaction_log: Option<PathBuf>,
    /// Transactions kept in memory for `transaction_history`
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            transaction_log: None,
            history_capacity: default_history_capacity(),
        }
    }
}

/// Tunables of the activation engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivationConfig {
    /// Fragments retrieved per stimulus
    #[serde(default = "default_perceive_top_k")]
    pub perceive_top_k: usize,
    /// Related fragments reached by one propagation pass
    #[serde(default = "default_propagation_fanout")]
    pub propagation_fanout: usize,
    #[serde(default = "default_propagation_decay")]
    pub propagation_decay: f64,
    /// Most-activated fragments considered by `reflect`
    #[serde(default = "default_reflection_window")]
    pub reflection_window: usize,
    #[serde(default = "default_reflection_top_fragments")]
    pub reflection_top_fragments: usize,
    #[serde(default = "default_initial_activation")]
    pub initial_activation: f64,
    /// Source recorded on reflection fragments
    #[serde(default = "default_reflection_source")]
    pub reflection_source: String,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            perceive_top_k: default_perceive_top_k(),
            propagation_fanout: default_propagation_fanout(),
            propagation_decay: default_propagation_decay(),
            reflection_window: default_reflection_window(),
            reflection_top_fragments: default_reflection_top_fragments(),
            initial_activation: default_initial_activation(),
            reflection_source: default_reflection_source(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("garden_data")
}

fn default_snapshot_file() -> String {
    "garden_memory.json".to_string()
}

fn default_max_keywords() -> usize {
    DEFAULT_MAX_KEYWORDS
}

fn default_top_k() -> usize {
    10
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_perceive_top_k() -> usize {
    5
}

fn default_propagation_fanout() -> usize {
    10
}

fn default_propagation_decay() -> f64 {
    0.8
}

fn default_reflection_window() -> usize {
    10
}

fn default_reflection_top_fragments() -> usize {
    5
}

fn default_initial_activation() -> f64 {
    0.5
}

fn default_reflection_source() -> String {
    "AAR_Core".to_string()
}
