//! Read-only item and bucket metadata.
//!
//! The engine never owns the catalog; it only looks things up. Front ends
//! provide whatever backs it. `InMemoryCatalog` covers tests and the CLI.

use crate::error::EngineResult;
use loadout_types::{
    buckets, BucketDefinition, BucketHash, ItemDefinition, ItemHash, VaultPool,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Lookup of item and bucket metadata.
pub trait Catalog: Send + Sync {
    /// Item definition by hash.
    fn item(&self, hash: ItemHash) -> Option<&ItemDefinition>;

    /// Bucket definition by hash.
    fn bucket(&self, hash: BucketHash) -> Option<&BucketDefinition>;

    /// Current hash for an item whose hash changed between content revisions.
    fn remap_legacy(&self, hash: ItemHash) -> Option<ItemHash>;

    /// Vault pool of a bucket, if its items can be vaulted.
    fn vault_pool(&self, bucket: BucketHash) -> Option<VaultPool> {
        self.bucket(bucket).and_then(|b| b.vault_pool)
    }
}

/// A single legacy-hash mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRemap {
    pub from: ItemHash,
    pub to: ItemHash,
}

/// On-disk catalog format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub items: Vec<ItemDefinition>,
    /// Falls back to the standard buckets when empty.
    #[serde(default)]
    pub buckets: Vec<BucketDefinition>,
    #[serde(default)]
    pub legacy_hashes: Vec<LegacyRemap>,
}

/// A catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    items: HashMap<ItemHash, ItemDefinition>,
    buckets: HashMap<BucketHash, BucketDefinition>,
    legacy: HashMap<ItemHash, ItemHash>,
}

impl InMemoryCatalog {
    /// Creates a catalog with the standard buckets and no items.
    pub fn new() -> Self {
        let mut catalog = Self::default();
        for bucket in buckets::standard() {
            catalog.buckets.insert(bucket.hash, bucket);
        }
        catalog
    }

    /// Loads a catalog from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let file: CatalogFile = serde_json::from_str(&raw)?;
        Ok(Self::from_file(file))
    }

    /// Builds a catalog from its file representation.
    pub fn from_file(file: CatalogFile) -> Self {
        let mut catalog = if file.buckets.is_empty() {
            Self::new()
        } else {
            Self::default()
        };
        for bucket in file.buckets {
            catalog.buckets.insert(bucket.hash, bucket);
        }
        for item in file.items {
            catalog.items.insert(item.hash, item);
        }
        for remap in file.legacy_hashes {
            catalog.legacy.insert(remap.from, remap.to);
        }
        catalog
    }

    /// Adds or replaces an item definition.
    pub fn insert_item(&mut self, def: ItemDefinition) {
        self.items.insert(def.hash, def);
    }

    /// Adds or replaces a bucket definition.
    pub fn insert_bucket(&mut self, def: BucketDefinition) {
        self.buckets.insert(def.hash, def);
    }

    /// Records that `from` is now known as `to`.
    pub fn insert_legacy(&mut self, from: ItemHash, to: ItemHash) {
        self.legacy.insert(from, to);
    }

    /// All bucket definitions.
    pub fn buckets(&self) -> impl Iterator<Item = &BucketDefinition> {
        self.buckets.values()
    }
}

impl Catalog for InMemoryCatalog {
    fn item(&self, hash: ItemHash) -> Option<&ItemDefinition> {
        self.items.get(&hash)
    }

    fn bucket(&self, hash: BucketHash) -> Option<&BucketDefinition> {
        self.buckets.get(&hash)
    }

    fn remap_legacy(&self, hash: ItemHash) -> Option<ItemHash> {
        self.legacy.get(&hash).copied()
    }
}
