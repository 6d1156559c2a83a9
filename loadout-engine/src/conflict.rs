//! Exclusivity conflict detection and replacement finding.
//!
//! Two equipped items sharing an exclusivity label in different buckets are
//! a conflict. Within one bucket there is nothing to resolve: equipping
//! swaps the old item out.

use crate::inventory::InventoryStore;
use crate::session::MoveSession;
use loadout_types::{CharacterId, ItemInstance, Location, StoreId};

/// Pure conflict queries over an inventory.
pub struct ConflictResolver<'a> {
    inventory: &'a InventoryStore,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(inventory: &'a InventoryStore) -> Self {
        Self { inventory }
    }

    /// Equipped items on `character` that would conflict with equipping `item`.
    pub fn conflicts_for(&self, item: &ItemInstance, character: CharacterId) -> Vec<&'a ItemInstance> {
        if !item.is_exclusive() {
            return Vec::new();
        }
        self.inventory
            .equipped_on(character)
            .filter(|other| {
                other.id != item.id && other.bucket != item.bucket && other.shares_exclusivity(item)
            })
            .collect()
    }

    /// True if `item` can be equipped on `character` without dequipping anything.
    pub fn can_equip_exotic(&self, item: &ItemInstance, character: CharacterId) -> bool {
        self.conflicts_for(item, character).is_empty()
    }

    /// Finds an item to equip in place of `displaced` on `character`.
    ///
    /// Candidates share the bucket, are not equipped, fit the character's
    /// class, are not already committed to the session, and carry no
    /// exclusivity label. With `allow_exclusive`, a labelled candidate is
    /// accepted if it would not itself conflict. Items already on the
    /// character win over vault items; then higher tier and power.
    pub fn find_replacement_item(
        &self,
        displaced: &ItemInstance,
        character: CharacterId,
        session: &MoveSession,
        allow_exclusive: bool,
    ) -> Option<&'a ItemInstance> {
        let class = self.inventory.class_of(character)?;
        let home = StoreId::Character(character);

        self.inventory
            .items()
            .filter(|(candidate, loc)| {
                candidate.id != displaced.id
                    && candidate.bucket == displaced.bucket
                    && !loc.equipped
                    && (loc.store == home || *loc == Location::vault())
                    && candidate.class_type.allows(class)
                    && session.is_available(candidate.id)
                    && self.exclusivity_ok(candidate, displaced, character, allow_exclusive)
            })
            .max_by_key(|(candidate, loc)| {
                (loc.store == home, candidate.tier, candidate.power, candidate.id)
            })
            .map(|(candidate, _)| candidate)
    }

    fn exclusivity_ok(
        &self,
        candidate: &ItemInstance,
        displaced: &ItemInstance,
        character: CharacterId,
        allow_exclusive: bool,
    ) -> bool {
        if !candidate.is_exclusive() {
            return true;
        }
        if !allow_exclusive {
            return false;
        }
        // The displaced item is leaving, so it does not count as a conflict.
        self.conflicts_for(candidate, character)
            .iter()
            .all(|other| other.id == displaced.id)
    }
}
