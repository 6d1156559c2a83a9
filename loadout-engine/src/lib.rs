//! Inventory transfer and loadout orchestration engine.
//!
//! Moves items between per-character inventories, equipped slots and the
//! shared vault through a remote API that enforces bucket capacity,
//! exclusivity, non-transferable items and eventual consistency.
//!
//! # Architecture
//!
//! Components, leaves first:
//!
//! - **Catalog**: read-only item and bucket metadata
//! - **InventoryStore**: local cache of where every instance is, with
//!   two-phase optimistic updates
//! - **SpaceManager**: capacity accounting and move-aside planning (pure)
//! - **ConflictResolver**: exclusivity checks and replacement finding (pure)
//! - **MoveSession**: per-operation involved items and reservations
//! - **TransferExecutor**: remote mutations with retry and ghost-success
//!   reconciliation
//! - **Mover**: the move state machine, routing character-to-character
//!   moves through the vault
//! - **BuildOrchestrator**: the apply-loadout workflow
//! - **ProfileSync**: canonical refreshes driven by visibility,
//!   connectivity and heartbeat signals
//!
//! # Example
//!
//! ```
//! use loadout_engine::remote::mock::MockRemote;
//! use loadout_engine::{BuildOrchestrator, EngineConfig, InMemoryCatalog};
//! use loadout_types::{MembershipId, ProfileSnapshot};
//! use std::sync::Arc;
//!
//! let config = EngineConfig::default();
//! let catalog = InMemoryCatalog::new();
//! let snapshot = ProfileSnapshot::empty(MembershipId::new(1));
//! let remote = MockRemote::new(&snapshot, catalog.buckets().cloned(), config.space.clone());
//!
//! let engine = BuildOrchestrator::new(
//!     Arc::new(remote),
//!     Arc::new(catalog),
//!     MembershipId::new(1),
//!     config,
//! );
//! assert!(!engine.sync().workflow_active());
//! ```

pub mod catalog;
pub mod config;
pub mod conflict;
mod error;
pub mod inventory;
pub mod mover;
pub mod orchestrator;
pub mod profile;
pub mod remote;
pub mod session;
pub mod space;
pub mod transfer;

pub use catalog::{Catalog, CatalogFile, InMemoryCatalog, LegacyRemap};
pub use config::{EngineConfig, RetryConfig, SettleConfig, SpaceConfig, SyncConfig};
pub use conflict::ConflictResolver;
pub use error::{
    EngineError, EngineResult, ErrorClass, PlatformErrorCode, RemoteError, RemoteResult,
};
pub use inventory::{Change, InventoryStore, PendingId, SharedInventory, SnapshotOutcome};
pub use mover::Mover;
pub use orchestrator::{
    ApplyReport, BuildOrchestrator, CancelToken, FailedItem, FailureStage, MissingItem,
    MissingReason, NoProgress, ProgressSink, SocketFailure,
};
pub use profile::{
    ProfileSync, RefreshKind, RefreshOutcome, SyncDecision, SyncSignal, WorkflowGuard,
};
pub use remote::{
    EquipStatus, HttpRemoteApi, HttpRemoteConfig, ProfileScope, RemoteApi, SocketPlugRequest,
    TransferRequest,
};
pub use session::MoveSession;
pub use space::{Relocation, SpaceManager, SpacePlan};
pub use transfer::{EquipOutcome, EquipResult, ExpectedOutcome, TransferExecutor, Verification};
