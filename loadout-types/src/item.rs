//! Item metadata and owned item instances.

use crate::ids::{BucketHash, ItemHash, ItemInstanceId, PlugHash};
use serde::{Deserialize, Serialize};

/// Rarity tier. Ordered from least to most rare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierType {
    Basic,
    Common,
    Rare,
    Legendary,
    Exotic,
}

/// Character class an item is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassType {
    Titan,
    Hunter,
    Warlock,
    /// No restriction.
    Any,
}

impl ClassType {
    /// Returns true if an item restricted to `self` may be equipped by a
    /// character of class `character`.
    #[must_use]
    pub fn allows(self, character: ClassType) -> bool {
        self == ClassType::Any || character == ClassType::Any || self == character
    }
}

/// Element / damage type. Subclasses are identified by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Kinetic,
    Arc,
    Solar,
    Void,
    Stasis,
    Strand,
}

/// Broad category of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Weapon,
    Armor,
    Subclass,
    Ghost,
    Consumable,
    Modification,
}

/// Read-only catalog metadata for an item type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub hash: ItemHash,
    pub name: String,
    pub bucket: BucketHash,
    pub tier: TierType,
    pub class_type: ClassType,
    pub category: ItemCategory,
    /// Only one equipped item per label, across buckets.
    #[serde(default)]
    pub exclusivity: Option<String>,
    #[serde(default)]
    pub damage_type: Option<DamageType>,
    /// Subclasses and similar items that can never change store.
    #[serde(default)]
    pub non_transferable: bool,
}

/// One owned item instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInstance {
    pub id: ItemInstanceId,
    pub hash: ItemHash,
    pub name: String,
    pub bucket: BucketHash,
    pub tier: TierType,
    pub class_type: ClassType,
    pub category: ItemCategory,
    #[serde(default)]
    pub exclusivity: Option<String>,
    #[serde(default)]
    pub damage_type: Option<DamageType>,
    #[serde(default)]
    pub non_transferable: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub power: u32,
    /// Current plug per socket index; `None` for an empty socket.
    #[serde(default)]
    pub sockets: Vec<Option<PlugHash>>,
}

impl ItemInstance {
    /// Creates an instance of a catalog definition with default instance state.
    pub fn from_definition(id: ItemInstanceId, def: &ItemDefinition) -> Self {
        Self {
            id,
            hash: def.hash,
            name: def.name.clone(),
            bucket: def.bucket,
            tier: def.tier,
            class_type: def.class_type,
            category: def.category,
            exclusivity: def.exclusivity.clone(),
            damage_type: def.damage_type,
            non_transferable: def.non_transferable,
            locked: false,
            power: 0,
            sockets: Vec::new(),
        }
    }

    /// Sets the power level.
    #[must_use]
    pub fn with_power(mut self, power: u32) -> Self {
        self.power = power;
        self
    }

    /// Sets the lock flag.
    #[must_use]
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Sets the number of (empty) sockets.
    #[must_use]
    pub fn with_sockets(mut self, count: usize) -> Self {
        self.sockets = vec![None; count];
        self
    }

    /// Whether this item carries an exclusivity label.
    pub fn is_exclusive(&self) -> bool {
        self.exclusivity.is_some()
    }

    /// Whether this item and `other` share an exclusivity label.
    pub fn shares_exclusivity(&self, other: &ItemInstance) -> bool {
        match (&self.exclusivity, &other.exclusivity) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// The plug currently in `socket_index`, if any.
    pub fn plug_at(&self, socket_index: u32) -> Option<PlugHash> {
        self.sockets.get(socket_index as usize).copied().flatten()
    }
}
