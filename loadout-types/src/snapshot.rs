//! Canonical remote profile state.

use crate::ids::{CharacterId, ItemInstanceId, MembershipId};
use crate::item::{ClassType, ItemInstance};
use crate::store::Location;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full inventory/equipment snapshot as returned by the remote profile fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub membership_id: MembershipId,
    /// When the remote minted this response.
    pub minted: DateTime<Utc>,
    pub characters: Vec<CharacterSnapshot>,
    pub vault: Vec<ItemInstance>,
}

/// One character's items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub id: CharacterId,
    pub class_type: ClassType,
    #[serde(default)]
    pub inventory: Vec<ItemInstance>,
    #[serde(default)]
    pub equipped: Vec<ItemInstance>,
}

impl CharacterSnapshot {
    pub fn new(id: CharacterId, class_type: ClassType) -> Self {
        Self {
            id,
            class_type,
            inventory: Vec::new(),
            equipped: Vec::new(),
        }
    }
}

impl ProfileSnapshot {
    /// Creates an empty snapshot minted now.
    pub fn empty(membership_id: MembershipId) -> Self {
        Self {
            membership_id,
            minted: Utc::now(),
            characters: Vec::new(),
            vault: Vec::new(),
        }
    }

    /// Iterates every item with its location.
    pub fn items(&self) -> impl Iterator<Item = (&ItemInstance, Location)> {
        let vault = self.vault.iter().map(|item| (item, Location::vault()));
        let characters = self.characters.iter().flat_map(|c| {
            c.inventory
                .iter()
                .map(move |item| (item, Location::inventory(c.id)))
                .chain(c.equipped.iter().map(move |item| (item, Location::equipped(c.id))))
        });
        vault.chain(characters)
    }

    /// Finds where an instance is, if present.
    pub fn location_of(&self, id: ItemInstanceId) -> Option<Location> {
        self.items()
            .find(|(item, _)| item.id == id)
            .map(|(_, location)| location)
    }
}
