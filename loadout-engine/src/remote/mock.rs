//! An in-memory remote for testing.
//!
//! `MockRemote` is an authoritative store with the platform's rules: raw
//! bucket capacity, one equipped item per bucket, exclusivity on equip,
//! non-transferable items, and no direct character-to-character transfer.
//! Faults can be scripted per operation, either plainly failing or applying
//! the mutation anyway and still reporting an error (ghost success).

use super::{EquipStatus, ProfileScope, RemoteApi, SocketPlugRequest, TransferRequest};
use crate::config::SpaceConfig;
use crate::error::{PlatformErrorCode, RemoteError, RemoteResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use loadout_types::{
    BucketDefinition, BucketHash, CharacterId, CharacterSnapshot, ClassType, ItemInstance,
    ItemInstanceId, Location, MembershipId, ProfileSnapshot, StoreId,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Platform code used for "item is equipped" and "wrong class" refusals.
const ACTION_FORBIDDEN: i32 = 1634;

/// Kinds of remote operation, for fault scripting and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Transfer,
    Equip,
    EquipBulk,
    InsertPlug,
    SetLock,
    FetchProfile,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Transfer(TransferRequest),
    Equip {
        item: ItemInstanceId,
        character: CharacterId,
    },
    EquipBulk {
        items: Vec<ItemInstanceId>,
        character: CharacterId,
    },
    InsertPlug(SocketPlugRequest),
    SetLock {
        item: ItemInstanceId,
        locked: bool,
    },
    FetchProfile,
}

impl RemoteCall {
    pub fn op(&self) -> RemoteOp {
        match self {
            RemoteCall::Transfer(_) => RemoteOp::Transfer,
            RemoteCall::Equip { .. } => RemoteOp::Equip,
            RemoteCall::EquipBulk { .. } => RemoteOp::EquipBulk,
            RemoteCall::InsertPlug(_) => RemoteOp::InsertPlug,
            RemoteCall::SetLock { .. } => RemoteOp::SetLock,
            RemoteCall::FetchProfile => RemoteOp::FetchProfile,
        }
    }
}

#[derive(Debug, Clone)]
struct Fault {
    op: RemoteOp,
    error: RemoteError,
    apply: bool,
}

#[derive(Debug)]
struct World {
    membership: MembershipId,
    characters: Vec<(CharacterId, ClassType)>,
    items: BTreeMap<ItemInstanceId, (ItemInstance, Location)>,
    buckets: HashMap<BucketHash, BucketDefinition>,
    space: SpaceConfig,
    minted: DateTime<Utc>,
    restricted_location: bool,
    lock_bug: bool,
    calls: Vec<RemoteCall>,
    faults: VecDeque<Fault>,
    stale_fetches: u32,
    seed: ProfileSnapshot,
}

fn not_found() -> RemoteError {
    RemoteError::domain(PlatformErrorCode::ItemNotFound)
}

fn forbidden() -> RemoteError {
    RemoteError::domain(PlatformErrorCode::Other(ACTION_FORBIDDEN))
}

impl World {
    fn take_fault(&mut self, op: RemoteOp) -> Option<Fault> {
        let index = self.faults.iter().position(|f| f.op == op)?;
        self.faults.remove(index)
    }

    fn class_of(&self, character: CharacterId) -> Option<ClassType> {
        self.characters
            .iter()
            .find(|(id, _)| *id == character)
            .map(|(_, class)| *class)
    }

    fn vault_count(&self, bucket: BucketHash) -> Option<(u32, u32)> {
        let pool = self.buckets.get(&bucket)?.vault_pool?;
        let used = self
            .items
            .values()
            .filter(|(item, loc)| {
                loc.store == StoreId::Vault
                    && self.buckets.get(&item.bucket).and_then(|b| b.vault_pool) == Some(pool)
            })
            .count();
        Some((used as u32, self.space.vault_capacity(pool)))
    }

    fn character_count(&self, character: CharacterId, bucket: BucketHash) -> (u32, u32) {
        let used = self
            .items
            .values()
            .filter(|(item, loc)| {
                item.bucket == bucket && *loc == Location::inventory(character)
            })
            .count();
        let capacity = self.buckets.get(&bucket).map_or(0, |b| b.capacity);
        (used as u32, capacity)
    }

    fn transfer(&mut self, request: &TransferRequest) -> RemoteResult<()> {
        let (item, location) = self.items.get(&request.item).cloned().ok_or_else(not_found)?;
        if item.hash != request.item_hash || self.class_of(request.character).is_none() {
            return Err(not_found());
        }
        if item.non_transferable {
            return Err(RemoteError::domain(PlatformErrorCode::ItemNotTransferrable));
        }

        let destination = if request.to_vault {
            if location.store != StoreId::Character(request.character) {
                return Err(not_found());
            }
            if location.equipped {
                return Err(forbidden());
            }
            let (used, capacity) = self
                .vault_count(item.bucket)
                .ok_or_else(|| RemoteError::domain(PlatformErrorCode::ItemNotTransferrable))?;
            if used >= capacity {
                return Err(RemoteError::domain(PlatformErrorCode::NoRoomInDestination));
            }
            Location::vault()
        } else {
            if location.store != StoreId::Vault {
                return Err(not_found());
            }
            let (used, capacity) = self.character_count(request.character, item.bucket);
            if used >= capacity {
                return Err(RemoteError::domain(PlatformErrorCode::NoRoomInDestination));
            }
            Location::inventory(request.character)
        };

        let duplicates = self
            .items
            .values()
            .filter(|(other, _)| other.hash == item.hash && other.bucket == item.bucket)
            .count();
        if let Some(entry) = self.items.get_mut(&request.item) {
            entry.1 = destination;
            if self.lock_bug && duplicates > 1 {
                entry.0.locked = false;
            }
        }
        Ok(())
    }

    fn equip(&mut self, id: ItemInstanceId, character: CharacterId) -> RemoteResult<()> {
        if self.restricted_location {
            return Err(RemoteError::domain(
                PlatformErrorCode::CannotPerformActionAtThisLocation,
            ));
        }
        let (item, location) = self.items.get(&id).cloned().ok_or_else(not_found)?;
        let class = self.class_of(character).ok_or_else(not_found)?;
        if location.store != StoreId::Character(character) {
            return Err(not_found());
        }
        if location.equipped {
            return Err(RemoteError::domain(PlatformErrorCode::ItemAlreadyEquipped));
        }
        if !item.class_type.allows(class) {
            return Err(forbidden());
        }
        let conflict = self.items.values().any(|(other, loc)| {
            loc.is_equipped_on(character)
                && other.bucket != item.bucket
                && other.shares_exclusivity(&item)
        });
        if conflict {
            return Err(RemoteError::domain(PlatformErrorCode::UniqueEquipRestricted));
        }

        for (other, loc) in self.items.values_mut() {
            if loc.is_equipped_on(character) && other.bucket == item.bucket {
                *loc = Location::inventory(character);
            }
        }
        if let Some(entry) = self.items.get_mut(&id) {
            entry.1 = Location::equipped(character);
        }
        Ok(())
    }

    fn insert_plug(&mut self, request: &SocketPlugRequest) -> RemoteResult<()> {
        let (item, _) = self.items.get_mut(&request.item).ok_or_else(not_found)?;
        let socket = item
            .sockets
            .get_mut(request.socket_index as usize)
            .ok_or_else(not_found)?;
        *socket = Some(request.plug);
        Ok(())
    }

    fn set_lock(&mut self, id: ItemInstanceId, locked: bool) -> RemoteResult<()> {
        let (item, _) = self.items.get_mut(&id).ok_or_else(not_found)?;
        item.locked = locked;
        Ok(())
    }

    fn snapshot(&self) -> ProfileSnapshot {
        let mut snapshot = ProfileSnapshot::empty(self.membership);
        snapshot.minted = self.minted;
        snapshot.characters = self
            .characters
            .iter()
            .map(|(id, class)| CharacterSnapshot::new(*id, *class))
            .collect();
        for (item, location) in self.items.values() {
            match location.store {
                StoreId::Vault => snapshot.vault.push(item.clone()),
                StoreId::Character(id) => {
                    if let Some(character) = snapshot.characters.iter_mut().find(|c| c.id == id) {
                        if location.equipped {
                            character.equipped.push(item.clone());
                        } else {
                            character.inventory.push(item.clone());
                        }
                    }
                }
            }
        }
        snapshot
    }
}

/// In-memory authoritative store.
#[derive(Debug)]
pub struct MockRemote {
    world: Mutex<World>,
}

impl MockRemote {
    /// Seeds the server from a snapshot and bucket definitions.
    pub fn new(
        snapshot: &ProfileSnapshot,
        buckets: impl IntoIterator<Item = BucketDefinition>,
        space: SpaceConfig,
    ) -> Self {
        let items = snapshot
            .items()
            .map(|(item, location)| (item.id, (item.clone(), location)))
            .collect();
        let world = World {
            membership: snapshot.membership_id,
            characters: snapshot
                .characters
                .iter()
                .map(|c| (c.id, c.class_type))
                .collect(),
            items,
            buckets: buckets.into_iter().map(|b| (b.hash, b)).collect(),
            space,
            minted: snapshot.minted,
            restricted_location: false,
            lock_bug: false,
            calls: Vec::new(),
            faults: VecDeque::new(),
            stale_fetches: 0,
            seed: snapshot.clone(),
        };
        Self {
            world: Mutex::new(world),
        }
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next `op` call fails with `error` and changes nothing.
    pub fn fail_next(&self, op: RemoteOp, error: RemoteError) {
        self.world().faults.push_back(Fault {
            op,
            error,
            apply: false,
        });
    }

    /// The next `op` call applies its mutation but still returns `error`.
    pub fn ghost_next(&self, op: RemoteOp, error: RemoteError) {
        self.world().faults.push_back(Fault {
            op,
            error,
            apply: true,
        });
    }

    /// Makes equips fail as if the character were somewhere restricted.
    pub fn set_restricted_location(&self, restricted: bool) {
        self.world().restricted_location = restricted;
    }

    /// Clears lock flags on transfers of items that have duplicates.
    pub fn set_lock_bug(&self, enabled: bool) {
        self.world().lock_bug = enabled;
    }

    /// The next `count` fetches return the seed snapshot, as a lagging
    /// replica would.
    pub fn serve_stale_fetches(&self, count: u32) {
        self.world().stale_fetches = count;
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.world().calls.clone()
    }

    /// Mutating calls only (no fetches).
    pub fn mutations(&self) -> Vec<RemoteCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.op() != RemoteOp::FetchProfile)
            .collect()
    }

    /// Number of calls of one kind.
    pub fn count(&self, op: RemoteOp) -> usize {
        self.world().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn clear_calls(&self) {
        self.world().calls.clear();
    }

    /// Authoritative location of an item.
    pub fn location_of(&self, id: ItemInstanceId) -> Option<Location> {
        self.world().items.get(&id).map(|(_, loc)| *loc)
    }

    /// Authoritative state of an item.
    pub fn item(&self, id: ItemInstanceId) -> Option<ItemInstance> {
        self.world().items.get(&id).map(|(item, _)| item.clone())
    }

    /// Current authoritative state.
    pub fn snapshot(&self) -> ProfileSnapshot {
        self.world().snapshot()
    }

    fn run<T>(
        &self,
        call: RemoteCall,
        apply: impl FnOnce(&mut World) -> RemoteResult<T>,
    ) -> RemoteResult<T> {
        let mut world = self.world();
        let op = call.op();
        world.calls.push(call);
        match world.take_fault(op) {
            Some(fault) if !fault.apply => Err(fault.error),
            Some(fault) => {
                apply(&mut world)?;
                Err(fault.error)
            }
            None => apply(&mut world),
        }
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn transfer_item(&self, request: &TransferRequest) -> RemoteResult<()> {
        self.run(RemoteCall::Transfer(*request), |world| world.transfer(request))
    }

    async fn equip_item(&self, item: ItemInstanceId, character: CharacterId) -> RemoteResult<()> {
        self.run(RemoteCall::Equip { item, character }, |world| {
            world.equip(item, character)
        })
    }

    async fn equip_items(
        &self,
        items: &[ItemInstanceId],
        character: CharacterId,
    ) -> RemoteResult<Vec<EquipStatus>> {
        let call = RemoteCall::EquipBulk {
            items: items.to_vec(),
            character,
        };
        self.run(call, |world| {
            Ok(items
                .iter()
                .map(|item| match world.equip(*item, character) {
                    Ok(()) => EquipStatus::ok(*item),
                    Err(error) => EquipStatus::failed(*item, error),
                })
                .collect())
        })
    }

    async fn insert_socket_plug(&self, request: &SocketPlugRequest) -> RemoteResult<()> {
        self.run(RemoteCall::InsertPlug(*request), |world| {
            world.insert_plug(request)
        })
    }

    async fn set_lock_state(
        &self,
        item: ItemInstanceId,
        _character: CharacterId,
        locked: bool,
    ) -> RemoteResult<()> {
        self.run(RemoteCall::SetLock { item, locked }, |world| {
            world.set_lock(item, locked)
        })
    }

    async fn fetch_profile(
        &self,
        _membership: MembershipId,
        _scope: ProfileScope,
    ) -> RemoteResult<ProfileSnapshot> {
        self.run(RemoteCall::FetchProfile, |world| {
            if world.stale_fetches > 0 {
                world.stale_fetches -= 1;
                return Ok(world.seed.clone());
            }
            world.minted += Duration::seconds(1);
            Ok(world.snapshot())
        })
    }
}
