mod common;

use common::{exclusivity_violations, Fixture, HUNTER, MATERIALS, TITAN};
use loadout_engine::remote::mock::{RemoteCall, RemoteOp};
use loadout_engine::{EngineError, MoveSession, TransferRequest};
use loadout_types::{buckets, ClassType, DamageType, Location, StoreId, TierType};
use std::collections::HashSet;

fn session() -> MoveSession {
    MoveSession::new(3)
}

// ── Routing ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn character_to_character_goes_through_vault() {
    let mut fx = Fixture::new();
    let gun = fx.legendary("Gun", buckets::KINETIC);
    let spare = fx.legendary("Spare", buckets::KINETIC);
    let id = fx.add(&gun, Location::equipped(TITAN));
    let spare_id = fx.add(&spare, Location::inventory(TITAN));
    let h = fx.engine().await;

    h.engine
        .mover()
        .move_item(id, StoreId::Character(HUNTER), false, &mut session())
        .await
        .unwrap();

    assert_eq!(
        h.remote.mutations(),
        vec![
            RemoteCall::Equip {
                item: spare_id,
                character: TITAN
            },
            RemoteCall::Transfer(TransferRequest {
                item: id,
                item_hash: gun.hash,
                character: TITAN,
                to_vault: true,
                stack_size: 1,
            }),
            RemoteCall::Transfer(TransferRequest {
                item: id,
                item_hash: gun.hash,
                character: HUNTER,
                to_vault: false,
                stack_size: 1,
            }),
        ]
    );
    assert_eq!(h.location(id).await, Some(Location::inventory(HUNTER)));
    assert_eq!(h.location(spare_id).await, Some(Location::equipped(TITAN)));
}

#[tokio::test(start_paused = true)]
async fn character_to_character_with_equip_ends_equipped() {
    let mut fx = Fixture::new();
    let gun = fx.legendary("Gun", buckets::KINETIC);
    let worn = fx.legendary("Worn", buckets::KINETIC);
    let id = fx.add(&gun, Location::inventory(HUNTER));
    let worn_id = fx.add(&worn, Location::equipped(TITAN));
    let h = fx.engine().await;

    h.engine
        .mover()
        .move_item(id, StoreId::Character(TITAN), true, &mut session())
        .await
        .unwrap();

    assert_eq!(h.location(id).await, Some(Location::equipped(TITAN)));
    assert_eq!(h.remote.location_of(id), Some(Location::equipped(TITAN)));
    assert_eq!(h.location(worn_id).await, Some(Location::inventory(TITAN)));
    assert_eq!(h.remote.count(RemoteOp::Transfer), 2);
    assert_eq!(h.remote.count(RemoteOp::Equip), 1);
}

#[tokio::test(start_paused = true)]
async fn same_store_equip_makes_no_transfer() {
    let mut fx = Fixture::new();
    let gun = fx.legendary("Gun", buckets::KINETIC);
    let id = fx.add(&gun, Location::inventory(TITAN));
    let h = fx.engine().await;

    h.engine
        .mover()
        .move_item(id, StoreId::Character(TITAN), true, &mut session())
        .await
        .unwrap();

    assert_eq!(
        h.remote.mutations(),
        vec![RemoteCall::Equip {
            item: id,
            character: TITAN
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn equip_in_vault_is_invalid() {
    let mut fx = Fixture::new();
    let gun = fx.legendary("Gun", buckets::KINETIC);
    let id = fx.add(&gun, Location::inventory(TITAN));
    let h = fx.engine().await;

    let result = h
        .engine
        .mover()
        .move_item(id, StoreId::Vault, true, &mut session())
        .await;
    assert!(matches!(result, Err(EngineError::InvalidRoute { .. })));
    assert!(h.remote.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn subclass_cannot_move() {
    let mut fx = Fixture::new();
    let solar = fx.subclass("Sunbreaker", ClassType::Titan, DamageType::Solar);
    let id = fx.add(&solar, Location::inventory(TITAN));
    let h = fx.engine().await;

    let result = h
        .engine
        .mover()
        .move_item(id, StoreId::Vault, false, &mut session())
        .await;
    assert!(matches!(result, Err(EngineError::NotTransferable(item)) if item == id));
}

#[tokio::test(start_paused = true)]
async fn equipped_item_without_replacement_stays() {
    let mut fx = Fixture::new();
    let gun = fx.legendary("Gun", buckets::KINETIC);
    let id = fx.add(&gun, Location::equipped(TITAN));
    let h = fx.engine().await;

    let result = h
        .engine
        .mover()
        .move_item(id, StoreId::Vault, false, &mut session())
        .await;
    assert!(matches!(result, Err(EngineError::NoReplacement(item)) if item == id));
    assert_eq!(h.location(id).await, Some(Location::equipped(TITAN)));
}

#[tokio::test(start_paused = true)]
async fn exotic_is_dequipped_with_a_non_exotic() {
    let mut fx = Fixture::new();
    let exotic = fx.exotic("Exotic", buckets::KINETIC, "exotic_weapon");
    let other_exotic = fx.exotic("Other Exotic", buckets::KINETIC, "exotic_weapon");
    let plain = fx.define("Plain", buckets::KINETIC, TierType::Rare, None);
    let id = fx.add(&exotic, Location::equipped(TITAN));
    fx.add_powered(&other_exotic, Location::inventory(TITAN), 2000);
    let plain_id = fx.add_powered(&plain, Location::inventory(TITAN), 1000);
    let h = fx.engine().await;

    h.engine
        .mover()
        .move_item(id, StoreId::Vault, false, &mut session())
        .await
        .unwrap();

    assert_eq!(
        h.remote.mutations()[0],
        RemoteCall::Equip {
            item: plain_id,
            character: TITAN
        }
    );
    assert_eq!(h.location(id).await, Some(Location::vault()));
}

// ── Space ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn full_destination_moves_weakest_item_aside() {
    let mut fx = Fixture::new();
    let gun = fx.legendary("Gun", buckets::KINETIC);
    let id = fx.add(&gun, Location::vault());
    let held = fx.fill(buckets::KINETIC, Location::inventory(TITAN), 8);
    let h = fx.engine().await;

    h.engine
        .mover()
        .move_item(id, StoreId::Character(TITAN), false, &mut session())
        .await
        .unwrap();

    let transfers: Vec<_> = h
        .remote
        .mutations()
        .into_iter()
        .filter_map(|c| match c {
            RemoteCall::Transfer(r) => Some((r.item, r.to_vault)),
            _ => None,
        })
        .collect();
    assert_eq!(transfers, vec![(held[0], true), (id, false)]);
    assert_eq!(h.location(held[0]).await, Some(Location::vault()));
    assert_eq!(h.location(id).await, Some(Location::inventory(TITAN)));
}

#[tokio::test(start_paused = true)]
async fn saved_loadout_items_are_moved_aside_last() {
    let mut fx = Fixture::new();
    let gun = fx.legendary("Gun", buckets::KINETIC);
    let id = fx.add(&gun, Location::vault());
    let held = fx.fill(buckets::KINETIC, Location::inventory(TITAN), 8);
    let h = fx.engine().await;
    h.engine
        .set_saved_loadout_items(HashSet::from([held[0]]))
        .await;

    h.engine
        .mover()
        .move_item(id, StoreId::Character(TITAN), false, &mut session())
        .await
        .unwrap();

    assert_eq!(h.location(held[0]).await, Some(Location::inventory(TITAN)));
    assert_eq!(h.location(held[1]).await, Some(Location::vault()));
}

#[tokio::test(start_paused = true)]
async fn no_movable_candidate_is_no_space() {
    let mut fx = Fixture::new();
    let gun = fx.legendary("Gun", buckets::KINETIC);
    let id = fx.add(&gun, Location::vault());
    let mut stuck = fx.legendary("Stuck", buckets::KINETIC);
    stuck.non_transferable = true;
    for _ in 0..8 {
        fx.add(&stuck, Location::inventory(TITAN));
    }
    let h = fx.engine().await;

    let result = h
        .engine
        .mover()
        .move_item(id, StoreId::Character(TITAN), false, &mut session())
        .await;
    assert!(matches!(
        result,
        Err(EngineError::NoSpace { store, bucket })
            if store == StoreId::Character(TITAN) && bucket == buckets::KINETIC
    ));
    assert!(h.remote.mutations().is_empty());
}

fn crowded_vault(depth: usize) -> Fixture {
    let mut fx = Fixture::new().with_materials_bucket();
    fx.config.space.vault_general_capacity = 20;
    fx.config.space.safety_margin = 12;
    fx.config.space.move_aside_max_depth = depth;
    fx.fill(MATERIALS, Location::vault(), 20);
    fx
}

#[tokio::test(start_paused = true)]
async fn move_aside_stops_at_depth_bound() {
    let mut fx = crowded_vault(10);
    let gun = fx.legendary("Gun", buckets::KINETIC);
    let id = fx.add(&gun, Location::inventory(TITAN));
    let h = fx.engine().await;

    let result = h
        .engine
        .mover()
        .move_item(id, StoreId::Vault, false, &mut session())
        .await;

    assert!(matches!(
        result,
        Err(EngineError::MoveAsideLimit { item, depth: 10 }) if item == id
    ));
    assert_eq!(h.remote.count(RemoteOp::Transfer), 10);
    assert_eq!(h.location(id).await, Some(Location::inventory(TITAN)));
}

#[tokio::test(start_paused = true)]
async fn shallower_depth_bound_is_honored() {
    let mut fx = crowded_vault(3);
    let gun = fx.legendary("Gun", buckets::KINETIC);
    let id = fx.add(&gun, Location::inventory(TITAN));
    let h = fx.engine().await;

    let result = h
        .engine
        .mover()
        .move_item(id, StoreId::Vault, false, &mut session())
        .await;

    assert!(matches!(result, Err(EngineError::MoveAsideLimit { depth: 3, .. })));
    assert_eq!(h.remote.count(RemoteOp::Transfer), 3);
}

// ── Exclusivity ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn conflicting_exotic_is_replaced_before_equip() {
    let mut fx = Fixture::new();
    let worn = fx.exotic("Worn Exotic", buckets::ENERGY, "exotic_weapon");
    let incoming = fx.exotic("Incoming Exotic", buckets::KINETIC, "exotic_weapon");
    let spare = fx.legendary("Spare", buckets::ENERGY);
    let worn_id = fx.add(&worn, Location::equipped(TITAN));
    let incoming_id = fx.add(&incoming, Location::vault());
    let spare_id = fx.add(&spare, Location::inventory(TITAN));
    let h = fx.engine().await;

    h.engine
        .mover()
        .move_item(incoming_id, StoreId::Character(TITAN), true, &mut session())
        .await
        .unwrap();

    let ops: Vec<_> = h.remote.mutations().iter().map(RemoteCall::op).collect();
    assert_eq!(ops, vec![RemoteOp::Equip, RemoteOp::Transfer, RemoteOp::Equip]);
    assert_eq!(h.location(spare_id).await, Some(Location::equipped(TITAN)));
    assert_eq!(h.location(worn_id).await, Some(Location::inventory(TITAN)));
    assert_eq!(h.location(incoming_id).await, Some(Location::equipped(TITAN)));

    let inventory = h.engine.inventory().read().await;
    assert_eq!(exclusivity_violations(&inventory, TITAN), 0);
}

#[tokio::test(start_paused = true)]
async fn conflict_without_replacement_is_unresolved() {
    let mut fx = Fixture::new();
    let worn = fx.exotic("Worn Exotic", buckets::ENERGY, "exotic_weapon");
    let incoming = fx.exotic("Incoming Exotic", buckets::KINETIC, "exotic_weapon");
    let worn_id = fx.add(&worn, Location::equipped(TITAN));
    let incoming_id = fx.add(&incoming, Location::vault());
    let h = fx.engine().await;

    let result = h
        .engine
        .mover()
        .move_item(incoming_id, StoreId::Character(TITAN), true, &mut session())
        .await;

    assert!(matches!(
        result,
        Err(EngineError::ExclusivityUnresolved { item, conflicting })
            if item == incoming_id && conflicting == worn_id
    ));
    assert!(h.remote.mutations().is_empty());
    assert_eq!(h.location(incoming_id).await, Some(Location::vault()));
}

#[tokio::test(start_paused = true)]
async fn replacement_is_fetched_from_vault() {
    let mut fx = Fixture::new();
    let worn = fx.exotic("Worn Exotic", buckets::ENERGY, "exotic_weapon");
    let incoming = fx.exotic("Incoming Exotic", buckets::KINETIC, "exotic_weapon");
    let spare = fx.legendary("Spare", buckets::ENERGY);
    fx.add(&worn, Location::equipped(TITAN));
    let incoming_id = fx.add(&incoming, Location::inventory(TITAN));
    let spare_id = fx.add(&spare, Location::vault());
    let h = fx.engine().await;

    h.engine
        .mover()
        .move_item(incoming_id, StoreId::Character(TITAN), true, &mut session())
        .await
        .unwrap();

    assert_eq!(h.location(spare_id).await, Some(Location::equipped(TITAN)));
    assert_eq!(h.location(incoming_id).await, Some(Location::equipped(TITAN)));
    let inventory = h.engine.inventory().read().await;
    assert_eq!(exclusivity_violations(&inventory, TITAN), 0);
}

#[tokio::test(start_paused = true)]
async fn conflict_in_an_incoming_bucket_is_left_alone() {
    let mut fx = Fixture::new();
    let worn = fx.exotic("Worn Exotic", buckets::ENERGY, "exotic_weapon");
    let incoming = fx.exotic("Incoming Exotic", buckets::KINETIC, "exotic_weapon");
    let worn_id = fx.add(&worn, Location::equipped(TITAN));
    let incoming_id = fx.add(&incoming, Location::inventory(TITAN));
    let h = fx.engine().await;
    let item = h.engine.inventory().read().await.get(incoming_id).unwrap().clone();

    h.engine
        .mover()
        .resolve_exclusivity_around(&item, TITAN, &[buckets::ENERGY], &mut session())
        .await
        .unwrap();
    assert!(h.remote.calls().is_empty());
    assert_eq!(h.location(worn_id).await, Some(Location::equipped(TITAN)));

    let result = h
        .engine
        .mover()
        .resolve_exclusivity_around(&item, TITAN, &[buckets::POWER], &mut session())
        .await;
    assert!(matches!(result, Err(EngineError::ExclusivityUnresolved { .. })));
}

#[tokio::test(start_paused = true)]
async fn nothing_to_clear_makes_no_call() {
    let mut fx = Fixture::new();
    let incoming = fx.exotic("Incoming Exotic", buckets::KINETIC, "exotic_weapon");
    let incoming_id = fx.add(&incoming, Location::inventory(TITAN));
    let h = fx.engine().await;
    let item = h.engine.inventory().read().await.get(incoming_id).unwrap().clone();

    h.engine
        .mover()
        .resolve_exclusivity(&item, TITAN, &mut session())
        .await
        .unwrap();
    assert!(h.remote.calls().is_empty());
}
