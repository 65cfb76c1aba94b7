//! Synchronized multi-collaborator access to the hypergraph.
//!
//! Every coordinator call runs inside one reentrant exclusive-access domain
//! (`parking_lot::ReentrantMutex`). The domain guards the store, the
//! transaction history, the log writer and the subscriber registry, so the
//! order in which mutations complete is the order in which they appear in
//! the log.
//!
//! The shared state sits in a `RefCell` inside the mutex. Each operation
//! keeps its `RefCell` borrow short and always releases it before
//! notifying subscribers: callbacks run inside the critical section but may
//! call back into the coordinator from the same thread.

pub mod events;
pub mod port;
pub mod transaction;

use crate::config::GardenConfig;
use crate::error::{GardenResult, SubscriberError};
use crate::hypergraph::{IndexedMemory, MemorySnapshot, MemoryStatistics};
use crate::types::{
    EdgeId, FragmentId, FragmentRequest, IdentityAspect, IdentityFragment, NewEdge, NewFragment,
    RefinementEdge,
};
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use tracing::{debug, info, warn};

pub use events::{EventKind, MemoryEvent, Subscriber, SubscriberRegistry};
pub use port::CollaboratorPort;
pub use transaction::{
    PendingTransaction, Transaction, TransactionLog, TransactionOperation, TransactionStatus,
};

/// Default cap on the in-memory transaction history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

/// Transaction counters for one actor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActorStatistics {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncStatistics {
    pub total_transactions: usize,
    pub completed_transactions: usize,
    pub failed_transactions: usize,
    pub success_rate: f64,
    pub framework_statistics: BTreeMap<String, ActorStatistics>,
    pub memory_statistics: MemoryStatistics,
}

/// Bounded history buffer; counters stay exact after eviction.
#[derive(Debug)]
struct TransactionHistory {
    entries: VecDeque<Transaction>,
    capacity: usize,
    per_actor: BTreeMap<String, ActorStatistics>,
}

impl TransactionHistory {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            per_actor: BTreeMap::new(),
        }
    }

    fn push(&mut self, transaction: Transaction) {
        let stats = self.per_actor.entry(transaction.actor.clone()).or_default();
        stats.total += 1;
        if transaction.is_completed() {
            stats.completed += 1;
        } else if transaction.is_failed() {
            stats.failed += 1;
        }

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(transaction);
    }

    fn recent(&self, actor: Option<&str>, limit: usize) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = self
            .entries
            .iter()
            .rev()
            .filter(|t| actor.map_or(true, |a| t.actor == a))
            .take(limit)
            .cloned()
            .collect();
        out.reverse();
        out
    }
}

/// Everything behind the exclusive-access domain.
struct SyncState {
    memory: IndexedMemory,
    history: TransactionHistory,
    log: Option<TransactionLog>,
    subscribers: SubscriberRegistry,
}

/// Serializes access to an `IndexedMemory`, auditing every mutation and
/// publishing events.
pub struct SyncCoordinator {
    state: ReentrantMutex<RefCell<SyncState>>,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.state.lock();
        let state = guard.borrow();
        f.debug_struct("SyncCoordinator")
            .field("memory", &state.memory)
            .field("history_len", &state.history.entries.len())
            .field("log", &state.log.as_ref().map(|l| l.path().to_path_buf()))
            .field("subscribers", &state.subscribers)
            .finish()
    }
}

impl SyncCoordinator {
    /// Coordinator without a durable log (history is kept in memory only).
    pub fn new(memory: IndexedMemory) -> Self {
        Self::build(memory, None, DEFAULT_HISTORY_CAPACITY)
    }

    /// Coordinator appending every transaction to `log`.
    pub fn with_log(memory: IndexedMemory, log: TransactionLog) -> Self {
        Self::build(memory, Some(log), DEFAULT_HISTORY_CAPACITY)
    }

    /// Build from configuration: opens the transaction log when one is
    /// configured and restores the snapshot file when it exists.
    pub fn from_config(config: &GardenConfig) -> GardenResult<Self> {
        let memory = IndexedMemory::with_keyword_limit(config.memory.max_keywords);
        let log = match config.sync.transaction_log.as_ref() {
            Some(path) => Some(TransactionLog::open(path)?),
            None => None,
        };
        let coordinator = Self::build(memory, log, config.sync.history_capacity);

        let snapshot_path = config.snapshot_path();
        if snapshot_path.exists() {
            coordinator.load(&snapshot_path)?;
        }
        Ok(coordinator)
    }

    fn build(memory: IndexedMemory, log: Option<TransactionLog>, history_capacity: usize) -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(SyncState {
                memory,
                history: TransactionHistory::new(history_capacity),
                log,
                subscribers: SubscriberRegistry::new(),
            })),
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Record a terminal transaction in the history and the durable log.
    /// Must be called with the domain held and no outstanding borrow.
    fn record(&self, state: &RefCell<SyncState>, transaction: Transaction) {
        let mut state = state.borrow_mut();
        if let Some(log) = state.log.as_mut() {
            if let Err(e) = log.append(&transaction) {
                warn!(
                    transaction_id = %transaction.transaction_id,
                    error = %e,
                    "Failed to append transaction to log"
                );
            }
        }
        if transaction.is_failed() {
            warn!(
                transaction_id = %transaction.transaction_id,
                actor = %transaction.actor,
                operation = transaction.operation.as_str(),
                error = ?transaction.data.get("error"),
                "Transaction failed"
            );
        }
        state.history.push(transaction);
    }

    fn notify(&self, state: &RefCell<SyncState>, event: MemoryEvent) {
        let subscribers = state.borrow().subscribers.snapshot(event.kind());
        if subscribers.is_empty() {
            return;
        }
        let failures = events::dispatch(&subscribers, &event);
        if failures > 0 {
            debug!(event = %event.kind(), failures, "Event delivered with subscriber failures");
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Add a fragment as a logged transaction.
    ///
    /// Returns `None` when the underlying store rejected the fragment; the
    /// failure is recorded in the transaction log.
    #[must_use]
    pub fn add_fragment(&self, new: NewFragment) -> Option<FragmentId> {
        self.add_fragment_request(FragmentRequest::from(new))
    }

    /// Add a fragment from an untyped request; an out-of-set aspect
    /// produces a failed transaction.
    #[must_use]
    pub fn add_fragment_request(&self, request: FragmentRequest) -> Option<FragmentId> {
        let guard = self.state.lock();
        let state: &RefCell<SyncState> = &guard;

        let mut data = Map::new();
        data.insert("aspect".into(), json!(request.aspect));
        data.insert("content".into(), json!(request.content));
        data.insert("confidence".into(), json!(request.confidence));
        data.insert("keywords".into(), json!(request.keywords));
        data.insert("metadata".into(), json!(request.metadata));
        let pending = PendingTransaction::begin(
            request.source.clone(),
            TransactionOperation::AddFragment,
            data,
        );

        let outcome = NewFragment::try_from(request).and_then(|new| {
            let source = new.source.clone();
            let aspect = new.aspect;
            let mut state = state.borrow_mut();
            state
                .memory
                .add_fragment(new)
                .map(|id| (id, source, aspect))
        });

        match outcome {
            Ok((fragment_id, source, aspect)) => {
                self.record(state, pending.complete("fragment_id", fragment_id.clone()));
                self.notify(
                    state,
                    MemoryEvent::FragmentAdded {
                        fragment_id: fragment_id.clone(),
                        source,
                        aspect,
                    },
                );
                Some(fragment_id)
            }
            Err(err) => {
                self.record(state, pending.fail(&err));
                None
            }
        }
    }

    /// Add a refinement edge on behalf of `actor` as a logged transaction.
    #[must_use]
    pub fn add_refinement_edge(&self, actor: &str, new: NewEdge) -> Option<EdgeId> {
        let guard = self.state.lock();
        let state: &RefCell<SyncState> = &guard;

        let mut data = Map::new();
        data.insert("parent_id".into(), json!(new.parent_id));
        data.insert("child_id".into(), json!(new.child_id));
        data.insert("refinement_type".into(), json!(new.refinement_type));
        data.insert("confidence_gain".into(), json!(new.confidence_gain));
        let pending = PendingTransaction::begin(actor, TransactionOperation::AddTuple, data);

        let parent_id = new.parent_id.clone();
        let child_id = new.child_id.clone();
        let outcome = state.borrow_mut().memory.add_refinement_edge(new);

        match outcome {
            Ok(tuple_id) => {
                self.record(state, pending.complete("tuple_id", tuple_id.clone()));
                self.notify(
                    state,
                    MemoryEvent::TupleAdded {
                        tuple_id: tuple_id.clone(),
                        parent_id,
                        child_id,
                    },
                );
                Some(tuple_id)
            }
            Err(err) => {
                self.record(state, pending.fail(&err));
                None
            }
        }
    }

    /// Add several fragments under a single lock acquisition.
    ///
    /// Each entry is its own transaction; the result has one slot per
    /// request, `None` where that entry failed.
    pub fn batch_add_fragments(&self, requests: Vec<FragmentRequest>) -> Vec<Option<FragmentId>> {
        let _guard = self.state.lock();
        let total = requests.len();
        let results: Vec<Option<FragmentId>> = requests
            .into_iter()
            .map(|request| self.add_fragment_request(request))
            .collect();
        debug!(
            total,
            added = results.iter().filter(|r| r.is_some()).count(),
            "Batch fragment addition finished"
        );
        results
    }

    // ------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------

    /// Run `f` against the store inside the exclusive domain. Crate-private:
    /// `f` holds the state borrow, so it must not call back into the
    /// coordinator.
    pub(crate) fn with_memory<R>(&self, f: impl FnOnce(&IndexedMemory) -> R) -> R {
        let guard = self.state.lock();
        let state = guard.borrow();
        f(&state.memory)
    }

    pub fn retrieve_similar(
        &self,
        query: &str,
        aspect: Option<IdentityAspect>,
        source: Option<&str>,
        top_k: usize,
    ) -> Vec<IdentityFragment> {
        self.with_memory(|m| {
            m.retrieve_similar(query, aspect, source, top_k)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    pub fn retrieve_by_aspect(&self, aspect: IdentityAspect, top_k: usize) -> Vec<IdentityFragment> {
        self.with_memory(|m| m.retrieve_by_aspect(aspect, top_k).into_iter().cloned().collect())
    }

    pub fn retrieve_by_source(&self, source: &str, top_k: usize) -> Vec<IdentityFragment> {
        self.with_memory(|m| m.retrieve_by_source(source, top_k).into_iter().cloned().collect())
    }

    pub fn get_fragment(&self, fragment_id: &str) -> Option<IdentityFragment> {
        self.with_memory(|m| m.get_fragment(fragment_id).cloned())
    }

    pub fn get_refinement_chain(&self, fragment_id: &str) -> Vec<RefinementEdge> {
        self.with_memory(|m| m.get_refinement_chain(fragment_id).into_iter().cloned().collect())
    }

    pub fn statistics(&self) -> MemoryStatistics {
        self.with_memory(IndexedMemory::statistics)
    }

    pub fn export(&self) -> MemorySnapshot {
        self.with_memory(IndexedMemory::export)
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Register `callback` for `kind`. Callbacks run synchronously, in
    /// registration order, inside the critical section.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F)
    where
        F: Fn(&MemoryEvent) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let guard = self.state.lock();
        guard.borrow_mut().subscribers.register(kind, callback);
    }

    // ------------------------------------------------------------------
    // Checkpointing
    // ------------------------------------------------------------------

    /// Write the full snapshot to `path` and fire `memory_saved`.
    pub fn save(&self, path: impl AsRef<Path>) -> GardenResult<()> {
        let path = path.as_ref();
        let guard = self.state.lock();
        let state: &RefCell<SyncState> = &guard;

        let snapshot = state.borrow().memory.export();
        snapshot.write_to(path)?;
        info!(
            path = %path.display(),
            fragments = snapshot.fragments.len(),
            tuples = snapshot.tuples.len(),
            "Saved memory checkpoint"
        );

        self.notify(
            state,
            MemoryEvent::MemorySaved {
                path: path.to_path_buf(),
            },
        );
        Ok(())
    }

    /// Replace the store with the snapshot at `path` and fire
    /// `memory_loaded`. Recorded as a `load_checkpoint` transaction; errors
    /// are also returned to the caller.
    pub fn load(&self, path: impl AsRef<Path>) -> GardenResult<()> {
        let path = path.as_ref();
        let guard = self.state.lock();
        let state: &RefCell<SyncState> = &guard;

        let mut data = Map::new();
        data.insert("filepath".into(), json!(path.display().to_string()));
        let pending = PendingTransaction::begin("sync_protocol", TransactionOperation::LoadCheckpoint, data);

        let outcome = MemorySnapshot::read_from(path)
            .and_then(|snapshot| state.borrow_mut().memory.import(snapshot));

        match outcome {
            Ok(()) => {
                let fragments = state.borrow().memory.len();
                self.record(state, pending.complete("fragments", Value::from(fragments)));
                info!(path = %path.display(), fragments, "Loaded memory checkpoint");
                self.notify(
                    state,
                    MemoryEvent::MemoryLoaded {
                        path: path.to_path_buf(),
                    },
                );
                Ok(())
            }
            Err(err) => {
                self.record(state, pending.fail(&err));
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    /// Most recent terminal transactions, oldest first, optionally for one
    /// actor only.
    pub fn transaction_history(&self, actor: Option<&str>, limit: usize) -> Vec<Transaction> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.history.recent(actor, limit)
    }

    pub fn sync_statistics(&self) -> SyncStatistics {
        let guard = self.state.lock();
        let state = guard.borrow();

        let framework_statistics = state.history.per_actor.clone();
        let total_transactions: usize = framework_statistics.values().map(|s| s.total).sum();
        let completed_transactions: usize = framework_statistics.values().map(|s| s.completed).sum();
        let failed_transactions: usize = framework_statistics.values().map(|s| s.failed).sum();
        let success_rate = if total_transactions > 0 {
            completed_transactions as f64 / total_transactions as f64
        } else {
            0.0
        };

        SyncStatistics {
            total_transactions,
            completed_transactions,
            failed_transactions,
            success_rate,
            framework_statistics,
            memory_statistics: state.memory.statistics(),
        }
    }
}
