//! Local cache of where every item instance is.
//!
//! Every instance lives in exactly one map entry, so it can never be
//! reachable from two stores at once. Optimistic updates are two-phase:
//! `begin` applies the change and remembers the prior entries, then the
//! caller either `commit`s (forget the priors) or `rollback`s (restore them).
//! A snapshot replacement bumps the generation, after which outstanding
//! pending changes are obsolete and rollback becomes a no-op: canonical
//! state already superseded them.

use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use loadout_types::{
    BucketHash, CharacterId, ClassType, ItemHash, ItemInstance, ItemInstanceId, Location,
    PlugHash, ProfileSnapshot, StoreId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Inventory shared between the executor, planners and profile sync.
pub type SharedInventory = Arc<RwLock<InventoryStore>>;

#[derive(Debug, Clone)]
struct Entry {
    item: ItemInstance,
    location: Location,
}

/// Handle to an optimistic change awaiting commit or rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingId(u64);

/// A narrow optimistic mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Move {
        item: ItemInstanceId,
        to: Location,
    },
    /// Equips `item`; whatever was equipped in its bucket drops to inventory.
    Equip {
        item: ItemInstanceId,
        character: CharacterId,
    },
    Lock {
        item: ItemInstanceId,
        locked: bool,
    },
    Plug {
        item: ItemInstanceId,
        socket_index: u32,
        plug: PlugHash,
    },
}

#[derive(Debug)]
struct PendingChange {
    generation: u64,
    prior: Vec<(ItemInstanceId, Entry)>,
}

/// Result of applying a canonical snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Applied,
    /// Older than the snapshot already applied; ignored.
    Stale,
}

/// The mutable local cache.
#[derive(Debug, Default)]
pub struct InventoryStore {
    items: HashMap<ItemInstanceId, Entry>,
    characters: BTreeMap<CharacterId, ClassType>,
    minted: Option<DateTime<Utc>>,
    generation: u64,
    pending: HashMap<PendingId, PendingChange>,
    next_pending: u64,
}

impl InventoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store populated from a snapshot.
    pub fn from_snapshot(snapshot: &ProfileSnapshot) -> Self {
        let mut store = Self::new();
        store.apply_snapshot(snapshot);
        store
    }

    /// Wraps the store for sharing.
    pub fn shared(self) -> SharedInventory {
        Arc::new(RwLock::new(self))
    }

    /// Replaces all state with canonical remote state.
    pub fn apply_snapshot(&mut self, snapshot: &ProfileSnapshot) -> SnapshotOutcome {
        if self.minted.is_some_and(|current| snapshot.minted < current) {
            debug!(
                "Ignoring stale snapshot minted {} (have {:?})",
                snapshot.minted, self.minted
            );
            return SnapshotOutcome::Stale;
        }

        self.items.clear();
        self.characters.clear();
        for character in &snapshot.characters {
            self.characters.insert(character.id, character.class_type);
        }
        for (item, location) in snapshot.items() {
            self.items.insert(
                item.id,
                Entry {
                    item: item.clone(),
                    location,
                },
            );
        }
        self.minted = Some(snapshot.minted);
        self.generation += 1;
        self.pending.clear();

        debug!(
            "Applied snapshot: {} items, {} characters, generation {}",
            self.items.len(),
            self.characters.len(),
            self.generation
        );
        SnapshotOutcome::Applied
    }

    /// Bumped on every applied snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mint time of the last applied snapshot.
    pub fn minted(&self) -> Option<DateTime<Utc>> {
        self.minted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    // ── Queries ──────────────────────────────────────────────────

    pub fn get(&self, id: ItemInstanceId) -> Option<&ItemInstance> {
        self.items.get(&id).map(|e| &e.item)
    }

    pub fn location(&self, id: ItemInstanceId) -> Option<Location> {
        self.items.get(&id).map(|e| e.location)
    }

    /// Item and location together.
    pub fn entry(&self, id: ItemInstanceId) -> Option<(&ItemInstance, Location)> {
        self.items.get(&id).map(|e| (&e.item, e.location))
    }

    /// Known characters in id order.
    pub fn characters(&self) -> impl Iterator<Item = CharacterId> + '_ {
        self.characters.keys().copied()
    }

    pub fn class_of(&self, character: CharacterId) -> Option<ClassType> {
        self.characters.get(&character).copied()
    }

    /// Every item with its location.
    pub fn items(&self) -> impl Iterator<Item = (&ItemInstance, Location)> {
        self.items.values().map(|e| (&e.item, e.location))
    }

    /// Items held by a store, equipped or not.
    pub fn items_in_store(&self, store: StoreId) -> impl Iterator<Item = (&ItemInstance, Location)> {
        self.items().filter(move |(_, loc)| loc.store == store)
    }

    /// Unequipped items of one bucket in a store.
    pub fn unequipped_in(
        &self,
        store: StoreId,
        bucket: BucketHash,
    ) -> impl Iterator<Item = &ItemInstance> {
        self.items_in_store(store)
            .filter(move |(item, loc)| !loc.equipped && item.bucket == bucket)
            .map(|(item, _)| item)
    }

    /// The item equipped in a bucket of a character.
    pub fn equipped_in(&self, character: CharacterId, bucket: BucketHash) -> Option<&ItemInstance> {
        self.equipped_on(character).find(|item| item.bucket == bucket)
    }

    /// Everything equipped on a character.
    pub fn equipped_on(&self, character: CharacterId) -> impl Iterator<Item = &ItemInstance> {
        self.items()
            .filter(move |(_, loc)| loc.is_equipped_on(character))
            .map(|(item, _)| item)
    }

    /// All instances of an item hash.
    pub fn instances_of(&self, hash: ItemHash) -> Vec<(&ItemInstance, Location)> {
        self.items().filter(|(item, _)| item.hash == hash).collect()
    }

    /// Number of instances sharing both hash and bucket.
    pub fn count_duplicates(&self, hash: ItemHash, bucket: BucketHash) -> usize {
        self.items()
            .filter(|(item, _)| item.hash == hash && item.bucket == bucket)
            .count()
    }

    // ── Optimistic updates ───────────────────────────────────────

    /// Applies a change and records how to undo it.
    pub fn begin(&mut self, change: Change) -> EngineResult<PendingId> {
        let mut prior = Vec::new();
        match change {
            Change::Move { item, to } => {
                let entry = self
                    .items
                    .get_mut(&item)
                    .ok_or(EngineError::ItemNotFound(item))?;
                prior.push((item, entry.clone()));
                entry.location = to;
            }
            Change::Equip { item, character } => {
                let (bucket, location) = self
                    .entry(item)
                    .map(|(i, loc)| (i.bucket, loc))
                    .ok_or(EngineError::ItemNotFound(item))?;
                if location.store != StoreId::Character(character) {
                    return Err(EngineError::NotOnCharacter { item, character });
                }
                let displaced = self
                    .equipped_in(character, bucket)
                    .map(|i| i.id)
                    .filter(|id| *id != item);
                if let Some(displaced) = displaced {
                    if let Some(entry) = self.items.get_mut(&displaced) {
                        prior.push((displaced, entry.clone()));
                        entry.location = Location::inventory(character);
                    }
                }
                if let Some(entry) = self.items.get_mut(&item) {
                    prior.push((item, entry.clone()));
                    entry.location = Location::equipped(character);
                }
            }
            Change::Lock { item, locked } => {
                let entry = self
                    .items
                    .get_mut(&item)
                    .ok_or(EngineError::ItemNotFound(item))?;
                prior.push((item, entry.clone()));
                entry.item.locked = locked;
            }
            Change::Plug {
                item,
                socket_index,
                plug,
            } => {
                let entry = self
                    .items
                    .get_mut(&item)
                    .ok_or(EngineError::ItemNotFound(item))?;
                let index = socket_index as usize;
                if index >= entry.item.sockets.len() {
                    return Err(EngineError::InvalidSocket { item, socket_index });
                }
                prior.push((item, entry.clone()));
                entry.item.sockets[index] = Some(plug);
            }
        }

        let id = PendingId(self.next_pending);
        self.next_pending += 1;
        self.pending.insert(
            id,
            PendingChange {
                generation: self.generation,
                prior,
            },
        );
        Ok(id)
    }

    /// Keeps a pending change. Returns false if it was already gone.
    pub fn commit(&mut self, id: PendingId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Undoes a pending change unless a snapshot superseded it.
    /// Returns true if prior state was restored.
    pub fn rollback(&mut self, id: PendingId) -> bool {
        let Some(change) = self.pending.remove(&id) else {
            return false;
        };
        if change.generation != self.generation {
            return false;
        }
        // Restore in reverse so the first recorded prior wins.
        for (item, entry) in change.prior.into_iter().rev() {
            self.items.insert(item, entry);
        }
        true
    }

    /// Changes awaiting commit or rollback.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
