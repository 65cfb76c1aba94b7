//! Transaction records and the append-only transaction log.
//!
//! A `PendingTransaction` is created before a mutation runs and must be
//! consumed into exactly one terminal `Transaction` (completed or failed).
//! Only terminal records reach the log, one JSON object per line:
//! `{transaction_id, framework, operation, timestamp, status, data}`.

use crate::error::{GardenError, GardenResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionOperation {
    AddFragment,
    AddTuple,
    LoadCheckpoint,
}

impl TransactionOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionOperation::AddFragment => "add_fragment",
            TransactionOperation::AddTuple => "add_tuple",
            TransactionOperation::LoadCheckpoint => "load_checkpoint",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// One audited mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub transaction_id: String,
    /// Collaborator on whose behalf the mutation ran.
    #[serde(rename = "framework")]
    pub actor: String,
    pub operation: TransactionOperation,
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
    pub data: Map<String, Value>,
}

impl Transaction {
    pub fn is_completed(&self) -> bool {
        self.status == TransactionStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == TransactionStatus::Failed
    }

    /// Id produced by a completed mutation, if any.
    pub fn result_id(&self) -> Option<&str> {
        ["fragment_id", "tuple_id"]
            .iter()
            .find_map(|key| self.data.get(*key).and_then(Value::as_str))
    }
}

/// A transaction that has not reached a terminal state yet.
#[derive(Debug)]
#[must_use = "a pending transaction must be completed or failed"]
pub struct PendingTransaction {
    record: Transaction,
}

impl PendingTransaction {
    pub fn begin(actor: impl Into<String>, operation: TransactionOperation, data: Map<String, Value>) -> Self {
        Self {
            record: Transaction {
                transaction_id: Uuid::new_v4().to_string(),
                actor: actor.into(),
                operation,
                timestamp: Utc::now(),
                status: TransactionStatus::Pending,
                data,
            },
        }
    }

    pub fn transaction_id(&self) -> &str {
        &self.record.transaction_id
    }

    /// Mark completed, recording `result_key: result_value` in the payload.
    pub fn complete(mut self, result_key: &str, result_value: impl Into<Value>) -> Transaction {
        self.record.data.insert(result_key.to_string(), result_value.into());
        self.record.status = TransactionStatus::Completed;
        self.record
    }

    pub fn fail(mut self, error: &GardenError) -> Transaction {
        self.record
            .data
            .insert("error".to_string(), Value::String(error.to_string()));
        self.record.status = TransactionStatus::Failed;
        self.record
    }
}

/// Durable append-only JSONL writer.
#[derive(Debug)]
pub struct TransactionLog {
    path: PathBuf,
    file: File,
}

impl TransactionLog {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: impl AsRef<Path>) -> GardenResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| GardenError::snapshot_io(parent, e))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| GardenError::snapshot_io(&path, e))?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line.
    pub fn append(&mut self, transaction: &Transaction) -> GardenResult<()> {
        let mut line = serde_json::to_string(transaction)?;
        line.push('\n');
        // one write call per record keeps lines whole
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| GardenError::snapshot_io(&self.path, e))
    }

    /// Parse every record of a log file, in append order.
    pub fn read_all(path: impl AsRef<Path>) -> GardenResult<Vec<Transaction>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| GardenError::snapshot_io(path, e))?;
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| GardenError::snapshot_io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("aspect".into(), json!("self_reference"));
        data
    }

    #[test]
    fn test_pending_transaction_completes_once() {
        let pending = PendingTransaction::begin("OpenHands", TransactionOperation::AddFragment, payload());
        let id = pending.transaction_id().to_string();
        let done = pending.complete("fragment_id", "frag-1");
        assert_eq!(done.transaction_id, id);
        assert!(done.is_completed());
        assert_eq!(done.result_id(), Some("frag-1"));
    }

    #[test]
    fn test_failed_transaction_records_error() {
        let pending = PendingTransaction::begin("x", TransactionOperation::AddTuple, Map::new());
        let failed = pending.fail(&GardenError::UnknownFragment("ghost".into()));
        assert!(failed.is_failed());
        assert_eq!(failed.result_id(), None);
        assert_eq!(failed.data["error"], json!("Unknown fragment: ghost"));
    }

    #[test]
    fn test_log_line_format() {
        let record = PendingTransaction::begin("OpenHands", TransactionOperation::AddFragment, payload())
            .complete("fragment_id", "frag-1");
        let value: Value = serde_json::to_value(&record).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        for key in ["transaction_id", "framework", "operation", "timestamp", "status", "data"] {
            assert!(keys.contains(&key), "missing {}", key);
        }
        assert_eq!(value["operation"], json!("add_fragment"));
        assert_eq!(value["status"], json!("completed"));
    }

    #[test]
    fn test_log_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("memory_sync.log");
        {
            let mut log = TransactionLog::open(&path).unwrap();
            for i in 0..3 {
                let record = PendingTransaction::begin("a", TransactionOperation::AddFragment, Map::new())
                    .complete("fragment_id", format!("f{}", i));
                log.append(&record).unwrap();
            }
        }
        // reopening appends rather than truncating
        let mut log = TransactionLog::open(&path).unwrap();
        let failed = PendingTransaction::begin("b", TransactionOperation::AddTuple, Map::new())
            .fail(&GardenError::UnknownFragment("nope".into()));
        log.append(&failed).unwrap();

        let records = TransactionLog::read_all(&path).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].result_id(), Some("f0"));
        assert!(records[3].is_failed());
        assert_eq!(records[3].actor, "b");
    }
}
