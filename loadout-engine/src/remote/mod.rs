//! Remote inventory API.
//!
//! The engine talks to the authoritative store only through `RemoteApi`.
//! `HttpRemoteApi` speaks the platform's REST API; `mock::MockRemote` is an
//! in-memory server for tests that enforces the same rules.

mod components;
pub mod http;
pub mod mock;

use crate::error::{RemoteError, RemoteResult};
use async_trait::async_trait;
use loadout_types::{
    CharacterId, ItemHash, ItemInstanceId, MembershipId, PlugHash, ProfileSnapshot,
};
use serde::{Deserialize, Serialize};

pub use http::{HttpRemoteApi, HttpRemoteConfig};

/// Moves an item between a character and the vault.
///
/// The platform has no character-to-character transfer; `character` is the
/// non-vault side of the hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub item: ItemInstanceId,
    pub item_hash: ItemHash,
    pub character: CharacterId,
    pub to_vault: bool,
    pub stack_size: u32,
}

/// Inserts a plug into a socket of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketPlugRequest {
    pub item: ItemInstanceId,
    pub character: CharacterId,
    pub socket_index: u32,
    pub plug: PlugHash,
}

/// Per-item result of a bulk equip.
#[derive(Debug, Clone, PartialEq)]
pub struct EquipStatus {
    pub item: ItemInstanceId,
    pub error: Option<RemoteError>,
}

impl EquipStatus {
    pub fn ok(item: ItemInstanceId) -> Self {
        Self { item, error: None }
    }

    pub fn failed(item: ItemInstanceId, error: RemoteError) -> Self {
        Self {
            item,
            error: Some(error),
        }
    }
}

/// How much of the profile to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileScope {
    /// Everything, including character metadata.
    Full,
    /// Item locations, instance state and character classes.
    Inventory,
}

/// The remote mutation and fetch surface.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Moves one item between a character and the vault.
    async fn transfer_item(&self, request: &TransferRequest) -> RemoteResult<()>;

    /// Equips an item already on the character.
    async fn equip_item(&self, item: ItemInstanceId, character: CharacterId) -> RemoteResult<()>;

    /// Equips several items in one call.
    async fn equip_items(
        &self,
        items: &[ItemInstanceId],
        character: CharacterId,
    ) -> RemoteResult<Vec<EquipStatus>>;

    /// Inserts a plug into a socket.
    async fn insert_socket_plug(&self, request: &SocketPlugRequest) -> RemoteResult<()>;

    /// Sets an item's lock flag.
    async fn set_lock_state(
        &self,
        item: ItemInstanceId,
        character: CharacterId,
        locked: bool,
    ) -> RemoteResult<()>;

    /// Fetches the canonical profile.
    async fn fetch_profile(
        &self,
        membership: MembershipId,
        scope: ProfileScope,
    ) -> RemoteResult<ProfileSnapshot>;
}
