//! Error taxonomy for the memory substrate.
//!
//! Validation errors (`InvalidAspect`, `UnknownFragment`, ...) are returned
//! directly by `IndexedMemory`. Inside the `SyncCoordinator` they are turned
//! into failed transactions and a `None` result instead.

use std::path::PathBuf;
use thiserror::Error;

pub type GardenResult<T> = Result<T, GardenError>;

#[derive(Debug, Error)]
pub enum GardenError {
    #[error("Invalid identity aspect: {0}")]
    InvalidAspect(String),

    #[error("Invalid refinement type: {0}")]
    InvalidRefinementType(String),

    #[error("Unknown fragment: {0}")]
    UnknownFragment(String),

    #[error("Duplicate id in snapshot: {0}")]
    DuplicateId(String),

    #[error("Transaction failed during {operation}: no result was produced")]
    TransactionFailure { operation: String },

    #[error("Snapshot IO error at {}: {source}", path.display())]
    SnapshotIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GardenError {
    pub(crate) fn snapshot_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GardenError::SnapshotIo {
            path: path.into(),
            source,
        }
    }
}

/// Error a subscriber callback reports back to the coordinator.
///
/// These never reach the caller of the triggering operation; the
/// coordinator logs them and moves on to the next subscriber.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Subscriber error: {message}")]
pub struct SubscriberError {
    pub message: String,
}

impl SubscriberError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
