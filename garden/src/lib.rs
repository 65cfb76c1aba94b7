// Garden of Memory
// Identity hypergraph shared by independent collaborators

pub mod aar;
pub mod config;
pub mod error;
pub mod hypergraph;
pub mod keywords;
pub mod sync;
pub mod types;

pub use aar::{Action, ActionOutcome, ActivationEngine, EnginePhase, SelfReflection, Stimulus};
pub use config::GardenConfig;
pub use error::{GardenError, GardenResult, SubscriberError};
pub use hypergraph::{
    IndexedMemory, KeywordOverlapScorer, MemorySnapshot, MemoryStatistics, SimilarityScorer,
};
pub use sync::{
    CollaboratorPort, EventKind, MemoryEvent, SyncCoordinator, SyncStatistics, Transaction,
    TransactionLog,
};
pub use types::{
    EdgeId, FragmentId, FragmentRequest, IdentityAspect, IdentityFragment, NewEdge, NewFragment,
    RefinementEdge, RefinementType,
};
