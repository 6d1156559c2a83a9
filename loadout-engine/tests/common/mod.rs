//! Shared fixtures for engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use loadout_engine::remote::mock::MockRemote;
use loadout_engine::{
    BuildOrchestrator, EngineConfig, EquipStatus, InMemoryCatalog, InventoryStore, ProfileScope,
    RefreshKind, RemoteApi, RemoteResult, SocketPlugRequest, TransferRequest,
};
use loadout_types::{
    buckets, BucketDefinition, BucketHash, CharacterId, CharacterSnapshot, ClassType, DamageType,
    ItemCategory, ItemDefinition, ItemHash, ItemInstance, ItemInstanceId, Location, MembershipId,
    ProfileSnapshot, StoreId, TierType, VaultPool,
};
use std::sync::Arc;
use std::time::Duration;

pub const MEMBERSHIP: MembershipId = MembershipId::new(4611686018467284386);
pub const TITAN: CharacterId = CharacterId::new(2305843009261519001);
pub const HUNTER: CharacterId = CharacterId::new(2305843009261519002);
pub const WARLOCK: CharacterId = CharacterId::new(2305843009261519003);

/// A bucket that shares the general vault pool but takes no safety margin.
pub const MATERIALS: BucketHash = BucketHash::new(375726501);

/// Builds a catalog and a profile snapshot item by item.
pub struct Fixture {
    pub catalog: InMemoryCatalog,
    pub snapshot: ProfileSnapshot,
    pub config: EngineConfig,
    next_id: u64,
    next_hash: u32,
}

impl Fixture {
    /// Three characters (titan, hunter, warlock), empty vault, standard buckets.
    pub fn new() -> Self {
        let mut snapshot = ProfileSnapshot::empty(MEMBERSHIP);
        snapshot.minted = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        snapshot.characters = vec![
            CharacterSnapshot::new(TITAN, ClassType::Titan),
            CharacterSnapshot::new(HUNTER, ClassType::Hunter),
            CharacterSnapshot::new(WARLOCK, ClassType::Warlock),
        ];
        Self {
            catalog: InMemoryCatalog::new(),
            snapshot,
            config: EngineConfig::default(),
            next_id: 6917529000000000001,
            next_hash: 100_000,
        }
    }

    /// Adds the non-equippable materials bucket to the catalog.
    pub fn with_materials_bucket(mut self) -> Self {
        self.catalog.insert_bucket(BucketDefinition {
            hash: MATERIALS,
            name: "Materials".to_string(),
            capacity: 50,
            equippable: false,
            stackable: false,
            vault_pool: Some(VaultPool::General),
        });
        self
    }

    fn fresh_hash(&mut self) -> ItemHash {
        self.next_hash += 1;
        ItemHash::new(self.next_hash)
    }

    /// Registers an item definition.
    pub fn define(
        &mut self,
        name: &str,
        bucket: BucketHash,
        tier: TierType,
        exclusivity: Option<&str>,
    ) -> ItemDefinition {
        let category = if bucket == buckets::KINETIC
            || bucket == buckets::ENERGY
            || bucket == buckets::POWER
        {
            ItemCategory::Weapon
        } else if bucket == MATERIALS {
            ItemCategory::Consumable
        } else {
            ItemCategory::Armor
        };
        let def = ItemDefinition {
            hash: self.fresh_hash(),
            name: name.to_string(),
            bucket,
            tier,
            class_type: ClassType::Any,
            category,
            exclusivity: exclusivity.map(str::to_string),
            damage_type: None,
            non_transferable: false,
        };
        self.catalog.insert_item(def.clone());
        def
    }

    pub fn legendary(&mut self, name: &str, bucket: BucketHash) -> ItemDefinition {
        self.define(name, bucket, TierType::Legendary, None)
    }

    pub fn exotic(&mut self, name: &str, bucket: BucketHash, label: &str) -> ItemDefinition {
        self.define(name, bucket, TierType::Exotic, Some(label))
    }

    /// Registers a subclass definition (never transferable).
    pub fn subclass(&mut self, name: &str, class: ClassType, damage: DamageType) -> ItemDefinition {
        let def = ItemDefinition {
            hash: self.fresh_hash(),
            name: name.to_string(),
            bucket: buckets::SUBCLASS,
            tier: TierType::Legendary,
            class_type: class,
            category: ItemCategory::Subclass,
            exclusivity: None,
            damage_type: Some(damage),
            non_transferable: true,
        };
        self.catalog.insert_item(def.clone());
        def
    }

    /// Places a new instance of `def` at `location`.
    pub fn add(&mut self, def: &ItemDefinition, location: Location) -> ItemInstanceId {
        self.next_id += 1;
        let id = ItemInstanceId::new(self.next_id);
        let instance = ItemInstance::from_definition(id, def).with_sockets(4);
        self.place(instance, location);
        id
    }

    /// Places a new instance with a given power level.
    pub fn add_powered(&mut self, def: &ItemDefinition, location: Location, power: u32) -> ItemInstanceId {
        self.next_id += 1;
        let id = ItemInstanceId::new(self.next_id);
        let instance = ItemInstance::from_definition(id, def)
            .with_sockets(4)
            .with_power(power);
        self.place(instance, location);
        id
    }

    /// Places a fully built instance.
    pub fn place(&mut self, instance: ItemInstance, location: Location) {
        match location.store {
            StoreId::Vault => self.snapshot.vault.push(instance),
            StoreId::Character(id) => {
                let character = self
                    .snapshot
                    .characters
                    .iter_mut()
                    .find(|c| c.id == id)
                    .expect("unknown character");
                if location.equipped {
                    character.equipped.push(instance);
                } else {
                    character.inventory.push(instance);
                }
            }
        }
    }

    /// Adds `count` distinct legendaries of `bucket` at `location`.
    pub fn fill(&mut self, bucket: BucketHash, location: Location, count: usize) -> Vec<ItemInstanceId> {
        (0..count)
            .map(|i| {
                let def = self.legendary(&format!("Filler {i}"), bucket);
                self.add_powered(&def, location, 1500 + i as u32)
            })
            .collect()
    }

    pub fn inventory(&self) -> InventoryStore {
        InventoryStore::from_snapshot(&self.snapshot)
    }

    pub fn remote(&self) -> Arc<MockRemote> {
        Arc::new(MockRemote::new(
            &self.snapshot,
            self.catalog.buckets().cloned(),
            self.config.space.clone(),
        ))
    }

    /// An engine over a mock remote, with the profile already loaded.
    pub async fn engine(&self) -> Harness {
        let remote = self.remote();
        let engine = BuildOrchestrator::new(
            remote.clone() as Arc<dyn RemoteApi>,
            Arc::new(self.catalog.clone()),
            MEMBERSHIP,
            self.config.clone(),
        );
        engine
            .sync()
            .force_refresh(RefreshKind::Full)
            .await
            .expect("initial refresh");
        remote.clear_calls();
        Harness { engine, remote }
    }
}

pub struct Harness {
    pub engine: BuildOrchestrator,
    pub remote: Arc<MockRemote>,
}

impl Harness {
    pub async fn location(&self, item: ItemInstanceId) -> Option<Location> {
        self.engine.inventory().read().await.location(item)
    }
}

/// Delegates to another remote after a fixed delay on profile fetches.
pub struct SlowRemote {
    pub inner: Arc<MockRemote>,
    pub delay: Duration,
}

#[async_trait]
impl RemoteApi for SlowRemote {
    async fn transfer_item(&self, request: &TransferRequest) -> RemoteResult<()> {
        self.inner.transfer_item(request).await
    }

    async fn equip_item(&self, item: ItemInstanceId, character: CharacterId) -> RemoteResult<()> {
        self.inner.equip_item(item, character).await
    }

    async fn equip_items(
        &self,
        items: &[ItemInstanceId],
        character: CharacterId,
    ) -> RemoteResult<Vec<EquipStatus>> {
        self.inner.equip_items(items, character).await
    }

    async fn insert_socket_plug(&self, request: &SocketPlugRequest) -> RemoteResult<()> {
        self.inner.insert_socket_plug(request).await
    }

    async fn set_lock_state(
        &self,
        item: ItemInstanceId,
        character: CharacterId,
        locked: bool,
    ) -> RemoteResult<()> {
        self.inner.set_lock_state(item, character, locked).await
    }

    async fn fetch_profile(
        &self,
        membership: MembershipId,
        scope: ProfileScope,
    ) -> RemoteResult<ProfileSnapshot> {
        tokio::time::sleep(self.delay).await;
        self.inner.fetch_profile(membership, scope).await
    }
}

/// Equipped items on `character` that share an exclusivity label.
pub fn exclusivity_violations(inventory: &InventoryStore, character: CharacterId) -> usize {
    let equipped: Vec<&ItemInstance> = inventory.equipped_on(character).collect();
    let mut violations = 0;
    for (i, a) in equipped.iter().enumerate() {
        for b in &equipped[i + 1..] {
            if a.shares_exclusivity(b) {
                violations += 1;
            }
        }
    }
    violations
}
