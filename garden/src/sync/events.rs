//! Memory events and the subscriber registry.

use crate::error::SubscriberError;
use crate::types::{EdgeId, FragmentId, IdentityAspect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    FragmentAdded,
    TupleAdded,
    MemorySaved,
    MemoryLoaded,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::FragmentAdded => "fragment_added",
            EventKind::TupleAdded => "tuple_added",
            EventKind::MemorySaved => "memory_saved",
            EventKind::MemoryLoaded => "memory_loaded",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MemoryEvent {
    FragmentAdded {
        fragment_id: FragmentId,
        source: String,
        aspect: IdentityAspect,
    },
    TupleAdded {
        tuple_id: EdgeId,
        parent_id: Option<FragmentId>,
        child_id: FragmentId,
    },
    MemorySaved {
        path: PathBuf,
    },
    MemoryLoaded {
        path: PathBuf,
    },
}

impl MemoryEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MemoryEvent::FragmentAdded { .. } => EventKind::FragmentAdded,
            MemoryEvent::TupleAdded { .. } => EventKind::TupleAdded,
            MemoryEvent::MemorySaved { .. } => EventKind::MemorySaved,
            MemoryEvent::MemoryLoaded { .. } => EventKind::MemoryLoaded,
        }
    }
}

/// Observer callback. Runs inside the coordinator's critical section.
pub type Subscriber = Arc<dyn Fn(&MemoryEvent) -> Result<(), SubscriberError> + Send + Sync>;

/// Callbacks per event kind, kept in registration order.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: HashMap<EventKind, Vec<Subscriber>>,
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<EventKind, usize> = self
            .subscribers
            .iter()
            .map(|(kind, subs)| (*kind, subs.len()))
            .collect();
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &counts)
            .finish()
    }
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, kind: EventKind, callback: F)
    where
        F: Fn(&MemoryEvent) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.subscribers
            .entry(kind)
            .or_default()
            .push(Arc::new(callback));
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.subscribers.get(&kind).map_or(0, Vec::len)
    }

    /// Cheap clone of the callbacks for `kind`, so they can run without
    /// the registry being borrowed.
    pub fn snapshot(&self, kind: EventKind) -> Vec<Subscriber> {
        self.subscribers.get(&kind).cloned().unwrap_or_default()
    }
}

/// Run every subscriber for `event`, each inside its own failure boundary.
///
/// Returns the number of subscribers that failed (error or panic).
pub(crate) fn dispatch(subscribers: &[Subscriber], event: &MemoryEvent) -> usize {
    let mut failures = 0;
    for (position, subscriber) in subscribers.iter().enumerate() {
        match catch_unwind(AssertUnwindSafe(|| subscriber(event))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                failures += 1;
                warn!(event = %event.kind(), subscriber = position, error = %err, "Subscriber callback failed");
            }
            Err(panic) => {
                failures += 1;
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                let err = SubscriberError::new(format!("callback panicked: {}", message));
                warn!(event = %event.kind(), subscriber = position, error = %err, "Subscriber callback failed");
            }
        }
    }
    failures
}
