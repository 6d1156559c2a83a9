//! Property-based tests for the inventory invariants.
//!
//! Random sequences of moves are run against the mock remote. Whatever
//! succeeds or fails along the way:
//! - every instance stays in exactly one location, and the local cache
//!   agrees with the remote
//! - no unequipped bucket holds more than its capacity minus the safety
//!   margin, on characters and in the vault pool
//! - no character ends up wearing two items with the same exclusivity label

mod common;

use common::{exclusivity_violations, Fixture, HUNTER, TITAN, WARLOCK};
use loadout_engine::{MoveSession, SpaceManager};
use loadout_types::{buckets, BucketHash, CharacterId, ItemInstanceId, Location, StoreId};
use proptest::prelude::*;
use std::collections::HashSet;

const CHARACTERS: [CharacterId; 3] = [TITAN, HUNTER, WARLOCK];
const WEAPON_BUCKETS: [BucketHash; 3] = [buckets::KINETIC, buckets::ENERGY, buckets::POWER];

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

/// One requested move: (item index, destination index, equip).
/// Destination 0 is the vault, 1..=3 are the characters.
fn move_strategy() -> impl Strategy<Value = (usize, usize, bool)> {
    (0usize..64, 0usize..4, any::<bool>())
}

fn destination(index: usize) -> StoreId {
    match index {
        0 => StoreId::Vault,
        n => StoreId::Character(CHARACTERS[n - 1]),
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

/// Every character wears a legendary in each weapon bucket and the titan's
/// kinetic bucket is one short of its usable space. One exotic per weapon bucket sits in
/// the vault or on a character.
fn crowded_account(exotic_homes: [usize; 3]) -> (Fixture, Vec<ItemInstanceId>) {
    let mut fx = Fixture::new();
    let mut items = Vec::new();

    for character in CHARACTERS {
        for bucket in WEAPON_BUCKETS {
            items.extend(fx.fill(bucket, Location::equipped(character), 1));
            items.extend(fx.fill(bucket, Location::inventory(character), 2));
        }
    }
    items.extend(fx.fill(buckets::KINETIC, Location::inventory(TITAN), 5));

    for (bucket, home) in WEAPON_BUCKETS.into_iter().zip(exotic_homes) {
        let exotic = fx.exotic("Exotic", bucket, "exotic_weapon");
        let location = match destination(home) {
            StoreId::Vault => Location::vault(),
            StoreId::Character(c) => Location::inventory(c),
        };
        items.push(fx.add(&exotic, location));
    }
    (fx, items)
}

// =============================================================================
// MOVE SEQUENCES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn moves_preserve_inventory_invariants(
        exotic_homes in [0usize..4, 0usize..4, 0usize..4],
        moves in prop::collection::vec(move_strategy(), 1..12),
    ) {
        let (fx, items) = crowded_account(exotic_homes);
        let protected = HashSet::new();

        runtime().block_on(async {
            let h = fx.engine().await;

            for (item, store, equip) in moves {
                let item = items[item % items.len()];
                let mut session = MoveSession::new(3);
                // Refusals are fine; the invariants must hold either way.
                let _ = h
                    .engine
                    .mover()
                    .move_item(item, destination(store), equip, &mut session)
                    .await;

                let inventory = h.engine.inventory().read().await;
                prop_assert_eq!(inventory.len(), items.len());
                prop_assert_eq!(inventory.pending_count(), 0);

                for id in &items {
                    let local = inventory.location(*id);
                    prop_assert!(local.is_some(), "{} lost", id);
                    prop_assert_eq!(local, h.remote.location_of(*id), "{} diverged", id);
                }

                let space = SpaceManager::new(&inventory, &fx.catalog, &fx.config.space, &protected);
                let margin = fx.config.space.safety_margin;
                let vault_used = space.occupancy(buckets::KINETIC, StoreId::Vault);
                prop_assert!(vault_used + margin <= space.capacity(buckets::KINETIC, StoreId::Vault));
                for character in CHARACTERS {
                    let store = StoreId::Character(character);
                    for bucket in WEAPON_BUCKETS {
                        let used = space.occupancy(bucket, store);
                        let capacity = space.capacity(bucket, store);
                        prop_assert!(
                            used + margin <= capacity,
                            "{} holds {} of {} in bucket {}", character, used, capacity, bucket
                        );
                        prop_assert!(inventory.equipped_in(character, bucket).is_some());
                    }
                    prop_assert_eq!(exclusivity_violations(&inventory, character), 0);
                }
            }
            Ok(())
        })?;
    }

    #[test]
    fn equipping_exotics_never_doubles_up(
        exotic_homes in [0usize..4, 0usize..4, 0usize..4],
        order in Just(vec![0usize, 1, 2]).prop_shuffle(),
        target in 1usize..4,
    ) {
        let (fx, items) = crowded_account(exotic_homes);
        let exotics = &items[items.len() - 3..];
        let StoreId::Character(character) = destination(target) else {
            unreachable!("targets are characters");
        };

        runtime().block_on(async {
            let h = fx.engine().await;

            for index in order {
                let exotic = exotics[index];
                let mut session = MoveSession::new(3);
                h.engine
                    .mover()
                    .move_item(exotic, StoreId::Character(character), true, &mut session)
                    .await
                    .unwrap();

                let inventory = h.engine.inventory().read().await;
                prop_assert_eq!(inventory.location(exotic), Some(Location::equipped(character)));
                prop_assert_eq!(exclusivity_violations(&inventory, character), 0);
            }
            Ok(())
        })?;
    }
}
