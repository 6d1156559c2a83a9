//! Stores, locations and bucket metadata.

use crate::ids::{BucketHash, CharacterId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A place that can hold items: the shared vault or one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreId {
    Vault,
    Character(CharacterId),
}

impl StoreId {
    /// Returns true for the vault.
    pub fn is_vault(&self) -> bool {
        matches!(self, StoreId::Vault)
    }

    /// Returns the character, if this is a character store.
    pub fn character(&self) -> Option<CharacterId> {
        match self {
            StoreId::Vault => None,
            StoreId::Character(id) => Some(*id),
        }
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreId::Vault => write!(f, "vault"),
            StoreId::Character(id) => write!(f, "character {id}"),
        }
    }
}

impl FromStr for StoreId {
    type Err = crate::Error;

    /// Parses `vault` or a character id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("vault") {
            return Ok(StoreId::Vault);
        }
        s.parse::<CharacterId>()
            .map(StoreId::Character)
            .map_err(|_| crate::Error::InvalidStore(s.to_string()))
    }
}

/// Where an item instance currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub store: StoreId,
    /// Always false in the vault.
    pub equipped: bool,
}

impl Location {
    pub fn vault() -> Self {
        Self {
            store: StoreId::Vault,
            equipped: false,
        }
    }

    pub fn inventory(character: CharacterId) -> Self {
        Self {
            store: StoreId::Character(character),
            equipped: false,
        }
    }

    pub fn equipped(character: CharacterId) -> Self {
        Self {
            store: StoreId::Character(character),
            equipped: true,
        }
    }

    /// Returns true if equipped on the given character.
    pub fn is_equipped_on(&self, character: CharacterId) -> bool {
        self.equipped && self.store == StoreId::Character(character)
    }
}

/// Vault capacity pools. Equipment shares one large pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultPool {
    General,
    Consumables,
    Modifications,
}

impl VaultPool {
    /// The vault bucket hash that represents this pool remotely.
    pub fn bucket_hash(self) -> BucketHash {
        match self {
            VaultPool::General => buckets::VAULT_GENERAL,
            VaultPool::Consumables => buckets::CONSUMABLES,
            VaultPool::Modifications => buckets::MODIFICATIONS,
        }
    }
}

/// Catalog metadata for an equipment bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketDefinition {
    pub hash: BucketHash,
    pub name: String,
    /// Per-character inventory slots. Equipped items are not counted.
    pub capacity: u32,
    /// Items in this bucket can be equipped.
    #[serde(default)]
    pub equippable: bool,
    /// Items in this bucket stack (consumables).
    #[serde(default)]
    pub stackable: bool,
    /// Vault pool, or `None` if items of this bucket cannot be vaulted.
    #[serde(default)]
    pub vault_pool: Option<VaultPool>,
}

/// Well-known bucket hashes.
pub mod buckets {
    use super::{BucketDefinition, VaultPool};
    use crate::ids::BucketHash;

    pub const KINETIC: BucketHash = BucketHash::new(1498876634);
    pub const ENERGY: BucketHash = BucketHash::new(2465295065);
    pub const POWER: BucketHash = BucketHash::new(953998645);
    pub const HELMET: BucketHash = BucketHash::new(3448274439);
    pub const GAUNTLETS: BucketHash = BucketHash::new(3551918588);
    pub const CHEST: BucketHash = BucketHash::new(14239492);
    pub const LEGS: BucketHash = BucketHash::new(20886954);
    pub const CLASS_ITEM: BucketHash = BucketHash::new(1585787867);
    pub const GHOST: BucketHash = BucketHash::new(4023194814);
    pub const SUBCLASS: BucketHash = BucketHash::new(3284755031);
    pub const CONSUMABLES: BucketHash = BucketHash::new(1469714392);
    pub const MODIFICATIONS: BucketHash = BucketHash::new(3313201758);
    pub const VAULT_GENERAL: BucketHash = BucketHash::new(138197802);

    fn equipment(hash: BucketHash, name: &str) -> BucketDefinition {
        BucketDefinition {
            hash,
            name: name.to_string(),
            capacity: 9,
            equippable: true,
            stackable: false,
            vault_pool: Some(VaultPool::General),
        }
    }

    /// The standard set of bucket definitions.
    pub fn standard() -> Vec<BucketDefinition> {
        vec![
            equipment(KINETIC, "Kinetic Weapons"),
            equipment(ENERGY, "Energy Weapons"),
            equipment(POWER, "Power Weapons"),
            equipment(HELMET, "Helmet"),
            equipment(GAUNTLETS, "Gauntlets"),
            equipment(CHEST, "Chest Armor"),
            equipment(LEGS, "Leg Armor"),
            equipment(CLASS_ITEM, "Class Armor"),
            equipment(GHOST, "Ghost"),
            BucketDefinition {
                hash: SUBCLASS,
                name: "Subclass".to_string(),
                capacity: 3,
                equippable: true,
                stackable: false,
                vault_pool: None,
            },
            BucketDefinition {
                hash: CONSUMABLES,
                name: "Consumables".to_string(),
                capacity: 50,
                equippable: false,
                stackable: true,
                vault_pool: Some(VaultPool::Consumables),
            },
            BucketDefinition {
                hash: MODIFICATIONS,
                name: "Modifications".to_string(),
                capacity: 50,
                equippable: false,
                stackable: true,
                vault_pool: Some(VaultPool::Modifications),
            },
        ]
    }
}
