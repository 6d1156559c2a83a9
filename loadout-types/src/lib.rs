//! Core type definitions for the loadout engine.
//!
//! This crate defines the plain data model shared by the engine and its
//! front ends:
//! - Identifier newtypes (item instances, hashes, buckets, characters)
//! - Catalog metadata (`ItemDefinition`, `BucketDefinition`)
//! - Owned item instances and where they live (`StoreId`, `Location`)
//! - The canonical remote state (`ProfileSnapshot`)
//! - Declarative loadout templates (`BuildTemplate`)
//!
//! Nothing here talks to the network or mutates shared state; that is the
//! engine's job.

mod ids;
mod item;
mod snapshot;
mod store;
mod template;

pub use ids::{
    BucketHash, CharacterId, ItemHash, ItemInstanceId, MembershipId, PlugHash, SessionId,
};
pub use item::{ClassType, DamageType, ItemCategory, ItemDefinition, ItemInstance, TierType};
pub use snapshot::{CharacterSnapshot, ProfileSnapshot};
pub use store::{buckets, BucketDefinition, Location, StoreId, VaultPool};
pub use template::{BuildTemplate, ModSelection, SocketPlug, SubclassSelection, TargetItem};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid store: {0}")]
    InvalidStore(String),
}
