//! Declarative loadout templates.
//!
//! A template names what should end up equipped; it says nothing about how
//! to get there. The engine computes the plan.

use crate::ids::{BucketHash, ItemHash, PlugHash};
use crate::item::DamageType;
use serde::{Deserialize, Serialize};

/// A plug to insert into a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketPlug {
    pub socket_index: u32,
    pub plug: PlugHash,
}

/// A target item, by catalog hash, with optional per-item socket choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetItem {
    pub hash: ItemHash,
    #[serde(default)]
    pub plugs: Vec<SocketPlug>,
}

impl TargetItem {
    pub fn new(hash: ItemHash) -> Self {
        Self {
            hash,
            plugs: Vec::new(),
        }
    }
}

/// Subclass choice with ability/aspect/fragment plugs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubclassSelection {
    pub hash: ItemHash,
    /// Used to find a substitute subclass when `hash` is not on the character.
    #[serde(default)]
    pub damage_type: Option<DamageType>,
    #[serde(default)]
    pub plugs: Vec<SocketPlug>,
}

/// A general modification applied to whatever is equipped in `bucket`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModSelection {
    pub bucket: BucketHash,
    pub plug: SocketPlug,
}

/// A named target configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildTemplate {
    pub name: String,
    #[serde(default)]
    pub items: Vec<TargetItem>,
    #[serde(default)]
    pub subclass: Option<SubclassSelection>,
    #[serde(default)]
    pub mods: Vec<ModSelection>,
}

impl BuildTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            subclass: None,
            mods: Vec::new(),
        }
    }

    /// Parses a template from JSON.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
