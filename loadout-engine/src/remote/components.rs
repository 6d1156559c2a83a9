//! Profile component payloads.
//!
//! A profile fetch returns one map per requested component, keyed by
//! character id or item instance id. `ProfileResponse::into_snapshot` joins
//! them with catalog metadata into a `ProfileSnapshot`.

use crate::catalog::Catalog;
use crate::error::{RemoteError, RemoteResult};
use chrono::{DateTime, Utc};
use loadout_types::{
    buckets, BucketHash, CharacterId, CharacterSnapshot, ClassType, ItemHash, ItemInstance,
    ItemInstanceId, MembershipId, PlugHash, ProfileSnapshot,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing::debug;

/// Bit 0 of `state`.
const STATE_LOCKED: u32 = 1;

/// Components requested for each refresh scope. Characters (200) ride along
/// with the inventory scope so a delta refresh keeps class information.
pub const FULL_COMPONENTS: &str = "100,102,200,201,205,300,305";
pub const INVENTORY_COMPONENTS: &str = "102,200,201,205,300,305";

#[derive(Debug, Deserialize)]
struct Component<T> {
    data: Option<T>,
}

impl<T> Default for Component<T> {
    fn default() -> Self {
        Self { data: None }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ItemList {
    #[serde(default)]
    items: Vec<ItemComponent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemComponent {
    item_hash: ItemHash,
    /// Absent for non-instanced stacks.
    item_instance_id: Option<String>,
    #[serde(default)]
    bucket_hash: Option<BucketHash>,
    #[serde(default)]
    state: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CharacterComponent {
    class_type: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceComponent {
    #[serde(default)]
    primary_stat: Option<Stat>,
}

#[derive(Debug, Deserialize)]
struct Stat {
    value: u32,
}

#[derive(Debug, Default, Deserialize)]
struct SocketsComponent {
    #[serde(default)]
    sockets: Vec<SocketState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocketState {
    plug_hash: Option<PlugHash>,
    #[serde(default = "enabled")]
    is_enabled: bool,
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
struct ItemComponents {
    #[serde(default)]
    instances: Component<HashMap<String, InstanceComponent>>,
    #[serde(default)]
    sockets: Component<HashMap<String, SocketsComponent>>,
}

/// The `Response` of a profile fetch.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    response_minted_timestamp: DateTime<Utc>,
    #[serde(default)]
    profile_inventory: Component<ItemList>,
    #[serde(default)]
    characters: Component<BTreeMap<String, CharacterComponent>>,
    #[serde(default)]
    character_inventories: Component<HashMap<String, ItemList>>,
    #[serde(default)]
    character_equipment: Component<HashMap<String, ItemList>>,
    #[serde(default)]
    item_components: ItemComponents,
}

impl ProfileResponse {
    /// Builds a snapshot. Items the catalog does not know and non-instanced
    /// stacks are left out.
    pub fn into_snapshot(
        self,
        membership: MembershipId,
        catalog: &dyn Catalog,
    ) -> RemoteResult<ProfileSnapshot> {
        let instances = self.item_components.instances.data.unwrap_or_default();
        let sockets = self.item_components.sockets.data.unwrap_or_default();
        let mut inventories = self.character_inventories.data.unwrap_or_default();
        let mut equipment = self.character_equipment.data.unwrap_or_default();
        let mut builder = Builder {
            catalog,
            instances: &instances,
            sockets: &sockets,
            skipped: 0,
        };

        let mut characters = Vec::new();
        for (key, character) in self.characters.data.unwrap_or_default() {
            let id: CharacterId = parse_id(&key)?;
            let mut snapshot = CharacterSnapshot::new(id, class_from_code(character.class_type));
            if let Some(list) = inventories.remove(&key) {
                snapshot.inventory = builder.build_all(list.items)?;
            }
            if let Some(list) = equipment.remove(&key) {
                snapshot.equipped = builder.build_all(list.items)?;
            }
            characters.push(snapshot);
        }
        if !inventories.is_empty() || !equipment.is_empty() {
            return Err(RemoteError::Malformed(
                "character items without a character entry".to_string(),
            ));
        }

        let vault_items = self
            .profile_inventory
            .data
            .unwrap_or_default()
            .items
            .into_iter()
            .filter(|item| item.bucket_hash == Some(buckets::VAULT_GENERAL))
            .collect();
        let vault = builder.build_all(vault_items)?;

        if builder.skipped > 0 {
            debug!("Left {} untracked items out of the snapshot", builder.skipped);
        }
        Ok(ProfileSnapshot {
            membership_id: membership,
            minted: self.response_minted_timestamp,
            characters,
            vault,
        })
    }
}

struct Builder<'a> {
    catalog: &'a dyn Catalog,
    instances: &'a HashMap<String, InstanceComponent>,
    sockets: &'a HashMap<String, SocketsComponent>,
    skipped: usize,
}

impl Builder<'_> {
    fn build_all(&mut self, items: Vec<ItemComponent>) -> RemoteResult<Vec<ItemInstance>> {
        let mut built = Vec::with_capacity(items.len());
        for item in items {
            if let Some(instance) = self.build(item)? {
                built.push(instance);
            }
        }
        Ok(built)
    }

    fn build(&mut self, item: ItemComponent) -> RemoteResult<Option<ItemInstance>> {
        let Some(key) = item.item_instance_id else {
            self.skipped += 1;
            return Ok(None);
        };
        let Some(def) = self.catalog.item(item.item_hash) else {
            self.skipped += 1;
            return Ok(None);
        };
        let id: ItemInstanceId = parse_id(&key)?;
        let power = self
            .instances
            .get(&key)
            .and_then(|instance| instance.primary_stat.as_ref())
            .map_or(0, |stat| stat.value);
        let mut instance = ItemInstance::from_definition(id, def)
            .with_power(power)
            .with_locked(item.state & STATE_LOCKED != 0);
        if let Some(component) = self.sockets.get(&key) {
            instance.sockets = component
                .sockets
                .iter()
                .map(|socket| socket.plug_hash.filter(|_| socket.is_enabled))
                .collect();
        }
        Ok(Some(instance))
    }
}

fn parse_id<T: FromStr>(raw: &str) -> RemoteResult<T> {
    raw.parse()
        .map_err(|_| RemoteError::Malformed(format!("bad id {raw}")))
}

/// Platform class codes: 0 titan, 1 hunter, 2 warlock.
fn class_from_code(code: i32) -> ClassType {
    match code {
        0 => ClassType::Titan,
        1 => ClassType::Hunter,
        2 => ClassType::Warlock,
        _ => ClassType::Any,
    }
}
