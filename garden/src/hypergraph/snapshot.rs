//! Snapshot and statistics wire types.
//!
//! A snapshot is the full, round-trippable state of an `IndexedMemory`:
//! `{ metadata, fragments: { id: record }, tuples: { id: record } }`.
//! Maps keep insertion order so a re-imported store ranks ties the same way.

use crate::error::{GardenError, GardenResult};
use crate::types::{EdgeId, FragmentId, IdentityAspect, IdentityFragment, RefinementEdge, RefinementType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tempfile::NamedTempFile;

/// Aggregate counts over the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryStatistics {
    pub total_fragments: usize,
    pub total_tuples: usize,
    /// Every aspect is listed, including those with zero fragments.
    pub aspect_distribution: BTreeMap<IdentityAspect, usize>,
    #[serde(alias = "framework_distribution")]
    pub source_distribution: BTreeMap<String, usize>,
    pub refinement_type_distribution: BTreeMap<RefinementType, usize>,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemorySnapshot {
    /// Informational only; recomputed on import.
    #[serde(default)]
    pub metadata: MemoryStatistics,
    #[serde(default)]
    pub fragments: IndexMap<FragmentId, IdentityFragment>,
    #[serde(default)]
    pub tuples: IndexMap<EdgeId, RefinementEdge>,
}

impl MemorySnapshot {
    /// Write the snapshot as pretty JSON, creating parent directories.
    ///
    /// The JSON goes to a temporary file next to `path`, which is then
    /// renamed over it: an existing checkpoint is either fully replaced or
    /// left as it was.
    pub fn write_to(&self, path: &Path) -> GardenResult<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|e| GardenError::snapshot_io(parent, e))?;

        let staged = NamedTempFile::new_in(parent).map_err(|e| GardenError::snapshot_io(parent, e))?;
        let mut writer = BufWriter::new(staged);
        serde_json::to_writer_pretty(&mut writer, self)?;
        let staged = writer
            .into_inner()
            .map_err(|e| GardenError::snapshot_io(path, e.into_error()))?;
        staged
            .as_file()
            .sync_all()
            .map_err(|e| GardenError::snapshot_io(path, e))?;
        staged
            .persist(path)
            .map_err(|e| GardenError::snapshot_io(path, e.error))?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> GardenResult<Self> {
        let file = File::open(path).map_err(|e| GardenError::snapshot_io(path, e))?;
        let snapshot = serde_json::from_reader(BufReader::new(file))?;
        Ok(snapshot)
    }
}
