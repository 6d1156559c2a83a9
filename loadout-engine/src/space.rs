//! Capacity accounting and move-aside planning.
//!
//! The planner is pure: it reads the inventory plus the session's
//! reservations and says what single relocation, if any, would make room.
//! The mover executes that relocation and asks again, up to a fixed depth.

use crate::catalog::Catalog;
use crate::config::SpaceConfig;
use crate::inventory::InventoryStore;
use crate::session::MoveSession;
use loadout_types::{BucketHash, ItemInstance, ItemInstanceId, StoreId, VaultPool};
use std::collections::HashSet;

/// One relocation that frees a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub item: ItemInstanceId,
    pub bucket: BucketHash,
    pub from: StoreId,
    pub to: StoreId,
}

/// What the planner wants done next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpacePlan {
    /// Every store on the route has room.
    Ready,
    /// Perform this relocation, then plan again.
    Relocate(Relocation),
    /// No legal relocation frees this store.
    Blocked { store: StoreId, bucket: BucketHash },
}

/// Capacity view over an inventory.
pub struct SpaceManager<'a> {
    inventory: &'a InventoryStore,
    catalog: &'a dyn Catalog,
    config: &'a SpaceConfig,
    protected: &'a HashSet<ItemInstanceId>,
}

impl<'a> SpaceManager<'a> {
    /// `protected` holds items referenced by saved loadouts; they are moved
    /// aside last.
    pub fn new(
        inventory: &'a InventoryStore,
        catalog: &'a dyn Catalog,
        config: &'a SpaceConfig,
        protected: &'a HashSet<ItemInstanceId>,
    ) -> Self {
        Self {
            inventory,
            catalog,
            config,
            protected,
        }
    }

    /// Key under which reservations for `bucket` in `store` are counted.
    /// Vault buckets share their pool.
    pub fn reservation_key(&self, bucket: BucketHash, store: StoreId) -> BucketHash {
        match store {
            StoreId::Vault => self
                .catalog
                .vault_pool(bucket)
                .map_or(bucket, VaultPool::bucket_hash),
            StoreId::Character(_) => bucket,
        }
    }

    /// Raw capacity of a bucket in a store.
    pub fn capacity(&self, bucket: BucketHash, store: StoreId) -> u32 {
        match store {
            StoreId::Vault => self
                .catalog
                .vault_pool(bucket)
                .map_or(0, |pool| self.config.vault_capacity(pool)),
            StoreId::Character(_) => self.catalog.bucket(bucket).map_or(0, |b| b.capacity),
        }
    }

    /// Slots in use. Equipped items do not count.
    pub fn occupancy(&self, bucket: BucketHash, store: StoreId) -> u32 {
        let count = match store {
            StoreId::Vault => match self.catalog.vault_pool(bucket) {
                Some(pool) => self
                    .inventory
                    .items_in_store(StoreId::Vault)
                    .filter(|(item, _)| self.catalog.vault_pool(item.bucket) == Some(pool))
                    .count(),
                None => self.inventory.unequipped_in(StoreId::Vault, bucket).count(),
            },
            StoreId::Character(_) => self.inventory.unequipped_in(store, bucket).count(),
        };
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn margin(&self, bucket: BucketHash) -> u32 {
        match self.catalog.bucket(bucket) {
            Some(def) if def.equippable || def.stackable => self.config.safety_margin,
            _ => 0,
        }
    }

    /// Free slots after reservations and the safety margin.
    pub fn space_in_bucket(&self, bucket: BucketHash, store: StoreId, session: &MoveSession) -> u32 {
        let reserved = session.reserved(store, self.reservation_key(bucket, store));
        self.capacity(bucket, store).saturating_sub(
            self.occupancy(bucket, store)
                .saturating_add(reserved)
                .saturating_add(self.margin(bucket)),
        )
    }

    /// Items that could be moved out of `store` to free a `bucket` slot.
    pub fn find_move_aside_candidates(
        &self,
        bucket: BucketHash,
        store: StoreId,
        session: &MoveSession,
    ) -> Vec<&'a ItemInstance> {
        let inventory = self.inventory;
        let pool = self.catalog.vault_pool(bucket);
        inventory
            .items_in_store(store)
            .filter(|(item, loc)| {
                let same_slot = match store {
                    StoreId::Vault => match pool {
                        Some(pool) => self.catalog.vault_pool(item.bucket) == Some(pool),
                        None => item.bucket == bucket,
                    },
                    StoreId::Character(_) => item.bucket == bucket,
                };
                same_slot && !loc.equipped && !item.non_transferable && session.is_available(item.id)
            })
            .map(|(item, _)| item)
            .collect()
    }

    /// Orders candidates so the first is the one to move: not in a saved
    /// loadout, unequipped, lowest tier, lowest power.
    pub fn sort_move_aside_candidates(&self, candidates: &mut [&ItemInstance]) {
        candidates.sort_by_key(|item| {
            let equipped = self
                .inventory
                .location(item.id)
                .is_some_and(|loc| loc.equipped);
            (
                self.protected.contains(&item.id),
                equipped,
                item.tier,
                item.power,
                item.id,
            )
        });
    }

    /// Plans room for moving `item` from `from` to `to`.
    ///
    /// A character-to-character move passes through the vault, so both the
    /// vault and the destination must have room.
    pub fn plan_space(
        &self,
        item: &ItemInstance,
        from: StoreId,
        to: StoreId,
        amount: u32,
        session: &MoveSession,
    ) -> SpacePlan {
        if from == to {
            return SpacePlan::Ready;
        }
        let route = match (from, to) {
            (StoreId::Character(a), StoreId::Character(b)) if a != b => vec![StoreId::Vault, to],
            _ => vec![to],
        };
        for store in route {
            if self.space_in_bucket(item.bucket, store, session) < amount {
                return self.relocation_for(item.bucket, store, to, session);
            }
        }
        SpacePlan::Ready
    }

    fn relocation_for(
        &self,
        bucket: BucketHash,
        store: StoreId,
        destination: StoreId,
        session: &MoveSession,
    ) -> SpacePlan {
        match store {
            StoreId::Character(_) => {
                let mut candidates = self.find_move_aside_candidates(bucket, store, session);
                self.sort_move_aside_candidates(&mut candidates);
                let Some(first) = candidates.first() else {
                    return SpacePlan::Blocked { store, bucket };
                };
                if self.space_in_bucket(bucket, StoreId::Vault, session) >= 1 {
                    SpacePlan::Relocate(Relocation {
                        item: first.id,
                        bucket,
                        from: store,
                        to: StoreId::Vault,
                    })
                } else {
                    // The vault is the tighter store; free it first.
                    self.vault_relocation(bucket, destination, session)
                }
            }
            StoreId::Vault => self.vault_relocation(bucket, destination, session),
        }
    }

    fn vault_relocation(
        &self,
        bucket: BucketHash,
        destination: StoreId,
        session: &MoveSession,
    ) -> SpacePlan {
        let mut candidates = self.find_move_aside_candidates(bucket, StoreId::Vault, session);
        self.sort_move_aside_candidates(&mut candidates);
        for candidate in candidates {
            for character in self.inventory.characters() {
                let target = StoreId::Character(character);
                if target == destination {
                    continue;
                }
                if self.space_in_bucket(candidate.bucket, target, session) >= 1 {
                    return SpacePlan::Relocate(Relocation {
                        item: candidate.id,
                        bucket: candidate.bucket,
                        from: StoreId::Vault,
                        to: target,
                    });
                }
            }
        }
        SpacePlan::Blocked {
            store: StoreId::Vault,
            bucket,
        }
    }
}
