mod common;

use common::{exclusivity_violations, Fixture, SlowRemote, HUNTER, MEMBERSHIP, TITAN};
use loadout_engine::remote::mock::RemoteOp;
use loadout_engine::{
    BuildOrchestrator, CancelToken, EngineError, FailureStage, MissingItem, MissingReason,
    NoProgress, PlatformErrorCode, RemoteApi, RemoteError,
};
use loadout_types::{
    buckets, BuildTemplate, CharacterId, ClassType, DamageType, ItemHash, Location, ModSelection,
    PlugHash, SocketPlug, SubclassSelection, TargetItem,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn template(name: &str, hashes: &[ItemHash]) -> BuildTemplate {
    let mut template = BuildTemplate::new(name);
    template.items = hashes.iter().copied().map(TargetItem::new).collect();
    template
}

// ── Happy path ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn loadout_is_gathered_and_equipped() {
    let mut fx = Fixture::new();
    let worn = fx.legendary("Worn", buckets::KINETIC);
    let kinetic = fx.legendary("Target Kinetic", buckets::KINETIC);
    let energy = fx.legendary("Target Energy", buckets::ENERGY);
    let worn_id = fx.add(&worn, Location::equipped(TITAN));
    let kinetic_id = fx.add(&kinetic, Location::vault());
    let energy_id = fx.add(&energy, Location::inventory(HUNTER));
    let h = fx.engine().await;

    let report = h
        .engine
        .apply_loadout(
            &template("Raid", &[kinetic.hash, energy.hash]),
            TITAN,
            &NoProgress,
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert!(report.success, "{report:?}");
    assert!(report.equipped.contains(&kinetic_id));
    assert!(report.equipped.contains(&energy_id));
    assert_eq!(h.remote.location_of(kinetic_id), Some(Location::equipped(TITAN)));
    assert_eq!(h.remote.location_of(energy_id), Some(Location::equipped(TITAN)));
    assert_eq!(h.remote.location_of(worn_id), Some(Location::inventory(TITAN)));
    assert_eq!(h.remote.count(RemoteOp::EquipBulk), 1);
    assert!(!h.engine.sync().workflow_active());
}

#[tokio::test(start_paused = true)]
async fn equipped_targets_need_no_mutation() {
    let mut fx = Fixture::new();
    let kinetic = fx.legendary("Kinetic", buckets::KINETIC);
    let id = fx.add(&kinetic, Location::equipped(TITAN));
    let h = fx.engine().await;

    let report = h
        .engine
        .apply_loadout(&template("Same", &[kinetic.hash]), TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.equipped, vec![id]);
    assert!(h.remote.mutations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn prefers_instance_already_on_character() {
    let mut fx = Fixture::new();
    let kinetic = fx.legendary("Kinetic", buckets::KINETIC);
    fx.add_powered(&kinetic, Location::vault(), 2000);
    let held = fx.add_powered(&kinetic, Location::inventory(TITAN), 1000);
    let h = fx.engine().await;

    let report = h
        .engine
        .apply_loadout(&template("Local", &[kinetic.hash]), TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(report.equipped, vec![held]);
    assert_eq!(h.remote.count(RemoteOp::Transfer), 0);
}

#[tokio::test(start_paused = true)]
async fn exotic_swap_clears_conflict_first() {
    let mut fx = Fixture::new();
    let worn = fx.exotic("Worn Exotic", buckets::ENERGY, "exotic_weapon");
    let wanted = fx.exotic("Wanted Exotic", buckets::KINETIC, "exotic_weapon");
    let spare = fx.legendary("Spare Energy", buckets::ENERGY);
    let worn_id = fx.add(&worn, Location::equipped(TITAN));
    let wanted_id = fx.add(&wanted, Location::vault());
    let spare_id = fx.add(&spare, Location::inventory(TITAN));
    let h = fx.engine().await;

    let report = h
        .engine
        .apply_loadout(&template("Swap", &[wanted.hash]), TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert!(report.success, "{report:?}");
    assert_eq!(h.remote.location_of(wanted_id), Some(Location::equipped(TITAN)));
    assert_eq!(h.remote.location_of(spare_id), Some(Location::equipped(TITAN)));
    assert_eq!(h.remote.location_of(worn_id), Some(Location::inventory(TITAN)));
    let inventory = h.engine.inventory().read().await;
    assert_eq!(exclusivity_violations(&inventory, TITAN), 0);
}

#[tokio::test(start_paused = true)]
async fn loadout_item_makes_way_for_its_own_exotic() {
    let mut fx = Fixture::new();
    let worn = fx.exotic("Worn Exotic Chest", buckets::CHEST, "exotic_armor");
    let helmet = fx.exotic("Exotic Helmet", buckets::HELMET, "exotic_armor");
    let chest = fx.legendary("Legendary Chest", buckets::CHEST);
    let worn_id = fx.add(&worn, Location::equipped(TITAN));
    let helmet_id = fx.add(&helmet, Location::vault());
    let chest_id = fx.add(&chest, Location::vault());
    let h = fx.engine().await;

    let report = h
        .engine
        .apply_loadout(
            &template("Own Chest", &[helmet.hash, chest.hash]),
            TITAN,
            &NoProgress,
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert!(report.success, "{report:?}");
    assert!(report.failed.is_empty());
    assert_eq!(h.remote.location_of(helmet_id), Some(Location::equipped(TITAN)));
    assert_eq!(h.remote.location_of(chest_id), Some(Location::equipped(TITAN)));
    assert_eq!(h.remote.location_of(worn_id), Some(Location::inventory(TITAN)));
    assert_eq!(h.remote.count(RemoteOp::Equip), 0);
    let inventory = h.engine.inventory().read().await;
    assert_eq!(exclusivity_violations(&inventory, TITAN), 0);
}

#[tokio::test(start_paused = true)]
async fn exotic_target_without_any_replacement_fails_at_conflict() {
    let mut fx = Fixture::new();
    let worn = fx.exotic("Worn Exotic Chest", buckets::CHEST, "exotic_armor");
    let helmet = fx.exotic("Exotic Helmet", buckets::HELMET, "exotic_armor");
    fx.add(&worn, Location::equipped(TITAN));
    let helmet_id = fx.add(&helmet, Location::vault());
    let h = fx.engine().await;

    let report = h
        .engine
        .apply_loadout(&template("Stuck", &[helmet.hash]), TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].item, helmet_id);
    assert_eq!(report.failed[0].stage, FailureStage::Conflict);
    assert_eq!(h.remote.location_of(helmet_id), Some(Location::vault()));
}

#[tokio::test(start_paused = true)]
async fn ghost_transfer_does_not_fail_the_loadout() {
    let mut fx = Fixture::new();
    let kinetic = fx.legendary("Kinetic", buckets::KINETIC);
    let id = fx.add(&kinetic, Location::vault());
    let h = fx.engine().await;
    h.remote.ghost_next(RemoteOp::Transfer, RemoteError::transport(500));

    let report = h
        .engine
        .apply_loadout(&template("Ghost", &[kinetic.hash]), TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert!(report.success, "{report:?}");
    assert_eq!(h.remote.count(RemoteOp::Transfer), 1);
    assert_eq!(h.remote.location_of(id), Some(Location::equipped(TITAN)));
}

// ── Resolution ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn unowned_items_are_reported_missing() {
    let mut fx = Fixture::new();
    let kinetic = fx.legendary("Kinetic", buckets::KINETIC);
    let ghost_hash = ItemHash::new(424242);
    let id = fx.add(&kinetic, Location::vault());
    let h = fx.engine().await;

    let report = h
        .engine
        .apply_loadout(
            &template("Partial", &[kinetic.hash, ghost_hash]),
            TITAN,
            &NoProgress,
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(
        report.missing,
        vec![MissingItem {
            hash: ghost_hash,
            reason: MissingReason::NotOwned
        }]
    );
    assert_eq!(report.equipped, vec![id]);
}

#[tokio::test(start_paused = true)]
async fn class_restricted_items_are_missing() {
    let mut fx = Fixture::new();
    let mut cloak = fx.legendary("Cloak", buckets::CLASS_ITEM);
    cloak.class_type = ClassType::Hunter;
    fx.add(&cloak, Location::vault());
    let h = fx.engine().await;

    let report = h
        .engine
        .apply_loadout(&template("Wrong Class", &[cloak.hash]), TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(report.missing.len(), 1);
    assert!(h.remote.mutations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn legacy_hashes_are_remapped() {
    let mut fx = Fixture::new();
    let kinetic = fx.legendary("Reissued", buckets::KINETIC);
    let old_hash = ItemHash::new(99_001);
    fx.catalog.insert_legacy(old_hash, kinetic.hash);
    let id = fx.add(&kinetic, Location::vault());
    let h = fx.engine().await;

    let report = h
        .engine
        .apply_loadout(&template("Old", &[old_hash]), TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert!(report.success, "{report:?}");
    assert_eq!(report.equipped, vec![id]);
}

#[tokio::test(start_paused = true)]
async fn clashing_targets_keep_the_first() {
    let mut fx = Fixture::new();
    let first = fx.exotic("First", buckets::KINETIC, "exotic_weapon");
    let second = fx.exotic("Second", buckets::ENERGY, "exotic_weapon");
    let first_id = fx.add(&first, Location::vault());
    let second_id = fx.add(&second, Location::vault());
    let h = fx.engine().await;

    let report = h
        .engine
        .apply_loadout(
            &template("Greedy", &[first.hash, second.hash]),
            TITAN,
            &NoProgress,
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].item, second_id);
    assert_eq!(report.failed[0].stage, FailureStage::Conflict);
    assert_eq!(report.equipped, vec![first_id]);
    assert_eq!(h.remote.location_of(second_id), Some(Location::vault()));
}

#[tokio::test(start_paused = true)]
async fn unknown_character_is_an_error() {
    let fx = Fixture::new();
    let h = fx.engine().await;

    let result = h
        .engine
        .apply_loadout(
            &template("Nobody", &[]),
            CharacterId::new(1),
            &NoProgress,
            &CancelToken::new(),
        )
        .await;
    assert!(matches!(result, Err(EngineError::UnknownCharacter(_))));
    assert!(!h.engine.sync().workflow_active());
}

// ── Subclass ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn subclass_is_equipped_and_configured() {
    let mut fx = Fixture::new();
    let striker = fx.subclass("Striker", ClassType::Titan, DamageType::Arc);
    let sunbreaker = fx.subclass("Sunbreaker", ClassType::Titan, DamageType::Solar);
    fx.add(&striker, Location::equipped(TITAN));
    let sun_id = fx.add(&sunbreaker, Location::inventory(TITAN));
    let h = fx.engine().await;

    let aspect = SocketPlug {
        socket_index: 2,
        plug: PlugHash::new(5_000_001),
    };
    let mut loadout = BuildTemplate::new("Solar");
    loadout.subclass = Some(SubclassSelection {
        hash: sunbreaker.hash,
        damage_type: Some(DamageType::Solar),
        plugs: vec![aspect],
    });

    let report = h
        .engine
        .apply_loadout(&loadout, TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert!(report.success, "{report:?}");
    assert_eq!(report.equipped, vec![sun_id]);
    assert_eq!(h.remote.location_of(sun_id), Some(Location::equipped(TITAN)));
    assert_eq!(h.remote.item(sun_id).unwrap().plug_at(2), Some(aspect.plug));
}

#[tokio::test(start_paused = true)]
async fn subclass_falls_back_by_damage_type() {
    let mut fx = Fixture::new();
    let sunbreaker = fx.subclass("Sunbreaker", ClassType::Titan, DamageType::Solar);
    let prismatic = fx.subclass("Other Solar", ClassType::Titan, DamageType::Solar);
    let sun_id = fx.add(&sunbreaker, Location::inventory(TITAN));
    let h = fx.engine().await;

    let mut loadout = BuildTemplate::new("Fallback");
    loadout.subclass = Some(SubclassSelection {
        hash: prismatic.hash,
        damage_type: Some(DamageType::Solar),
        plugs: Vec::new(),
    });

    let report = h
        .engine
        .apply_loadout(&loadout, TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert!(report.missing.is_empty());
    assert_eq!(h.remote.location_of(sun_id), Some(Location::equipped(TITAN)));
}

#[tokio::test(start_paused = true)]
async fn subclass_elsewhere_is_missing() {
    let mut fx = Fixture::new();
    let sunbreaker = fx.subclass("Sunbreaker", ClassType::Titan, DamageType::Solar);
    let h = fx.engine().await;

    let mut loadout = BuildTemplate::new("Absent");
    loadout.subclass = Some(SubclassSelection {
        hash: sunbreaker.hash,
        damage_type: None,
        plugs: Vec::new(),
    });

    let report = h
        .engine
        .apply_loadout(&loadout, TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(
        report.missing,
        vec![MissingItem {
            hash: sunbreaker.hash,
            reason: MissingReason::SubclassNotOnCharacter
        }]
    );
    assert!(!report.success);
}

// ── Restricted location ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn restricted_location_requires_orbit() {
    let mut fx = Fixture::new();
    let kinetic = fx.legendary("Kinetic", buckets::KINETIC);
    let id = fx.add(&kinetic, Location::vault());
    let h = fx.engine().await;
    h.remote.set_restricted_location(true);

    let report = h
        .engine
        .apply_loadout(&template("Orbit", &[kinetic.hash]), TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert!(report.orbit_required);
    assert!(!report.success);
    assert!(report.failed.is_empty());
    // Transfers still happen; only the equip is refused.
    assert_eq!(h.remote.location_of(id), Some(Location::inventory(TITAN)));
}

// ── Failures ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_move_is_retried_once_against_fresh_state() {
    let mut fx = Fixture::new();
    let kinetic = fx.legendary("Kinetic", buckets::KINETIC);
    let id = fx.add(&kinetic, Location::vault());
    let h = fx.engine().await;
    for _ in 0..2 {
        h.remote.fail_next(
            RemoteOp::Transfer,
            RemoteError::domain(PlatformErrorCode::ItemNotFound),
        );
    }

    let report = h
        .engine
        .apply_loadout(&template("Retry", &[kinetic.hash]), TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert!(report.success, "{report:?}");
    assert_eq!(h.remote.count(RemoteOp::Transfer), 3);
    assert_eq!(h.remote.location_of(id), Some(Location::equipped(TITAN)));
}

#[tokio::test(start_paused = true)]
async fn persistent_move_failure_is_reported() {
    let mut fx = Fixture::new();
    let kinetic = fx.legendary("Kinetic", buckets::KINETIC);
    let energy = fx.legendary("Energy", buckets::ENERGY);
    let kinetic_id = fx.add(&kinetic, Location::vault());
    let energy_id = fx.add(&energy, Location::inventory(TITAN));
    let h = fx.engine().await;
    for _ in 0..2 {
        h.remote.fail_next(RemoteOp::Transfer, RemoteError::transport(400));
    }

    let report = h
        .engine
        .apply_loadout(
            &template("Broken", &[kinetic.hash, energy.hash]),
            TITAN,
            &NoProgress,
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].item, kinetic_id);
    assert_eq!(report.failed[0].stage, FailureStage::Move);
    assert_eq!(report.equipped, vec![energy_id]);
}

#[tokio::test(start_paused = true)]
async fn move_retry_is_charged_to_the_session() {
    let mut fx = Fixture::new();
    fx.config.retry.max_retries = 0;
    let kinetic = fx.legendary("Kinetic", buckets::KINETIC);
    let id = fx.add(&kinetic, Location::vault());
    let h = fx.engine().await;
    h.remote.fail_next(
        RemoteOp::Transfer,
        RemoteError::domain(PlatformErrorCode::ItemNotFound),
    );

    let report = h
        .engine
        .apply_loadout(&template("No Budget", &[kinetic.hash]), TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].stage, FailureStage::Move);
    assert_eq!(h.remote.count(RemoteOp::Transfer), 1);
    assert_eq!(h.remote.location_of(id), Some(Location::vault()));
}

#[tokio::test(start_paused = true)]
async fn item_plug_failure_fails_the_loadout() {
    let mut fx = Fixture::new();
    let kinetic = fx.legendary("Kinetic", buckets::KINETIC);
    let id = fx.add(&kinetic, Location::vault());
    let h = fx.engine().await;

    let mut loadout = BuildTemplate::new("Bad Socket");
    let mut target = TargetItem::new(kinetic.hash);
    target.plugs = vec![SocketPlug {
        socket_index: 9,
        plug: PlugHash::new(6_000_002),
    }];
    loadout.items = vec![target];

    let report = h
        .engine
        .apply_loadout(&loadout, TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(report.equipped, vec![id]);
    assert_eq!(report.socket_failures.len(), 1);
    assert_eq!(report.socket_failures[0].item, Some(id));
    assert!(report.mod_failures.is_empty());
    assert!(!report.success);
    assert_eq!(h.remote.count(RemoteOp::InsertPlug), 0);
}

// ── Mods ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn mods_go_to_whatever_is_equipped() {
    let mut fx = Fixture::new();
    let helmet = fx.legendary("Helmet", buckets::HELMET);
    let helmet_id = fx.add(&helmet, Location::equipped(TITAN));
    let h = fx.engine().await;

    let resist = SocketPlug {
        socket_index: 3,
        plug: PlugHash::new(6_000_001),
    };
    let mut loadout = BuildTemplate::new("Mods");
    loadout.mods = vec![
        ModSelection {
            bucket: buckets::HELMET,
            plug: resist,
        },
        ModSelection {
            bucket: buckets::CHEST,
            plug: resist,
        },
    ];

    let report = h
        .engine
        .apply_loadout(&loadout, TITAN, &NoProgress, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(h.remote.item(helmet_id).unwrap().plug_at(3), Some(resist.plug));
    assert!(report.socket_failures.is_empty());
    assert_eq!(report.mod_failures.len(), 1);
    assert_eq!(report.mod_failures[0].item, None);
    assert!(report.success, "{report:?}");
}

// ── Cancellation and queueing ───────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cancelled_before_start_is_an_error() {
    let fx = Fixture::new();
    let h = fx.engine().await;
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = h
        .engine
        .apply_loadout(&template("Never", &[]), TITAN, &NoProgress, &cancel)
        .await;
    assert!(matches!(result, Err(EngineError::Cancelled)));
    assert!(h.remote.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_between_moves() {
    let mut fx = Fixture::new();
    let kinetic = fx.legendary("Kinetic", buckets::KINETIC);
    let energy = fx.legendary("Energy", buckets::ENERGY);
    fx.add(&kinetic, Location::vault());
    let energy_id = fx.add(&energy, Location::vault());
    let h = fx.engine().await;

    let cancel = CancelToken::new();
    let token = cancel.clone();
    let sink = move |step: &str, _percent: u8| {
        if step.starts_with("Moving") {
            token.cancel();
        }
    };

    let report = h
        .engine
        .apply_loadout(&template("Halt", &[kinetic.hash, energy.hash]), TITAN, &sink, &cancel)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(!report.success);
    assert_eq!(h.remote.count(RemoteOp::Transfer), 1);
    assert_eq!(h.remote.count(RemoteOp::EquipBulk), 0);
    assert_eq!(h.remote.location_of(energy_id), Some(Location::vault()));
}

#[tokio::test(start_paused = true)]
async fn second_application_is_refused_while_one_runs() {
    let fx = Fixture::new();
    let inner = fx.remote();
    let slow = Arc::new(SlowRemote {
        inner,
        delay: Duration::from_secs(2),
    });
    let engine = BuildOrchestrator::new(
        slow as Arc<dyn RemoteApi>,
        Arc::new(fx.catalog.clone()),
        MEMBERSHIP,
        fx.config.clone(),
    );
    let loadout = template("Busy", &[]);
    let first_cancel = CancelToken::new();
    let second_cancel = CancelToken::new();
    let (first, second) = tokio::join!(
        engine.apply_loadout(&loadout, TITAN, &NoProgress, &first_cancel),
        engine.try_apply_loadout(&loadout, TITAN, &NoProgress, &second_cancel),
    );

    assert!(first.unwrap().success);
    assert!(matches!(second, Err(EngineError::WorkflowBusy)));
}

// ── Progress and report ─────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn progress_is_monotonic() {
    let mut fx = Fixture::new();
    let kinetic = fx.legendary("Kinetic", buckets::KINETIC);
    let energy = fx.legendary("Energy", buckets::ENERGY);
    fx.add(&kinetic, Location::vault());
    fx.add(&energy, Location::vault());
    let h = fx.engine().await;

    let steps = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let steps = Arc::clone(&steps);
        move |step: &str, percent: u8| steps.lock().unwrap().push((step.to_string(), percent))
    };
    h.engine
        .apply_loadout(&template("Progress", &[kinetic.hash, energy.hash]), TITAN, &sink, &CancelToken::new())
        .await
        .unwrap();

    let steps = steps.lock().unwrap().clone();
    assert_eq!(steps.first().unwrap(), &("Refreshing inventory".to_string(), 0));
    assert_eq!(steps.last().unwrap(), &("Done".to_string(), 100));
    assert!(steps.windows(2).all(|w| w[0].1 <= w[1].1), "{steps:?}");
    assert_eq!(steps.iter().filter(|(s, _)| s.starts_with("Moving")).count(), 2);
}

#[tokio::test(start_paused = true)]
async fn report_serializes_for_front_ends() {
    let mut fx = Fixture::new();
    let kinetic = fx.legendary("Kinetic", buckets::KINETIC);
    fx.add(&kinetic, Location::vault());
    let h = fx.engine().await;

    let report = h
        .engine
        .apply_loadout(
            &template("Json", &[kinetic.hash, ItemHash::new(7)]),
            TITAN,
            &NoProgress,
            &CancelToken::new(),
        )
        .await
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["loadout"], "Json");
    assert_eq!(json["success"], false);
    assert_eq!(json["missing"][0]["reason"], "not_owned");
    assert_eq!(json["equipped"].as_array().unwrap().len(), 1);
}
