//! Applying a whole loadout to a character.
//!
//! `BuildOrchestrator::apply_loadout` resolves a declarative template to
//! owned instances and drives the mover and executor through ordered
//! phases: refresh, resolve, subclass lookup, proactive dequip, in-loadout
//! conflicts, sequential moves, bulk equip, subclass swap, sockets and mods.
//! Only one application runs at a time. Partial success is reported, never
//! rolled back.

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::inventory::{InventoryStore, SharedInventory};
use crate::mover::Mover;
use crate::profile::{ProfileSync, RefreshKind};
use crate::remote::RemoteApi;
use crate::session::MoveSession;
use crate::transfer::{EquipResult, TransferExecutor};
use loadout_types::{
    BucketHash, BuildTemplate, CharacterId, ClassType, ItemCategory, ItemHash, ItemInstance, ItemInstanceId,
    MembershipId, PlugHash, SocketPlug, StoreId, SubclassSelection,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Receives `(step description, percent complete)` updates.
pub trait ProgressSink: Send + Sync {
    fn report(&self, step: &str, percent: u8);
}

impl<F> ProgressSink for F
where
    F: Fn(&str, u8) + Send + Sync,
{
    fn report(&self, step: &str, percent: u8) {
        self(step, percent)
    }
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _step: &str, _percent: u8) {}
}

/// Advisory cancellation flag, checked between phases.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    /// No owned instance usable by the character.
    NotOwned,
    /// Subclasses never move; this one is not on the character.
    SubclassNotOnCharacter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingItem {
    pub hash: ItemHash,
    pub reason: MissingReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Conflict,
    Move,
    Equip,
    Subclass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub item: ItemInstanceId,
    pub hash: ItemHash,
    pub stage: FailureStage,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocketFailure {
    /// `None` when no item was found to take the plug.
    pub item: Option<ItemInstanceId>,
    pub socket_index: u32,
    pub plug: PlugHash,
    pub error: String,
}

/// Structured result of one loadout application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub loadout: String,
    pub character: CharacterId,
    pub missing: Vec<MissingItem>,
    pub failed: Vec<FailedItem>,
    pub equipped: Vec<ItemInstanceId>,
    /// Item and subclass plugs that did not go in.
    pub socket_failures: Vec<SocketFailure>,
    /// General mods that did not go in. These never affect `success`.
    pub mod_failures: Vec<SocketFailure>,
    /// Some equips were refused because of where the character is.
    pub orbit_required: bool,
    pub cancelled: bool,
    /// Every item resolved, moved and equipped with its plugs, the subclass
    /// included, without cancellation or an orbit refusal.
    pub success: bool,
}

impl ApplyReport {
    fn new(loadout: &str, character: CharacterId) -> Self {
        Self {
            loadout: loadout.to_string(),
            character,
            missing: Vec::new(),
            failed: Vec::new(),
            equipped: Vec::new(),
            socket_failures: Vec::new(),
            mod_failures: Vec::new(),
            orbit_required: false,
            cancelled: false,
            success: false,
        }
    }

    fn finish(mut self) -> Self {
        self.success = !self.cancelled
            && !self.orbit_required
            && self.missing.is_empty()
            && self.failed.is_empty()
            && self.socket_failures.is_empty();
        self
    }

    fn fail(&mut self, item: &ItemInstance, stage: FailureStage, error: impl ToString) {
        self.failed.push(FailedItem {
            item: item.id,
            hash: item.hash,
            stage,
            error: error.to_string(),
        });
    }
}

#[derive(Debug, Clone)]
struct Target {
    instance: ItemInstance,
    plugs: Vec<SocketPlug>,
}

/// Drives whole-loadout application.
pub struct BuildOrchestrator {
    inventory: SharedInventory,
    catalog: Arc<dyn Catalog>,
    sync: Arc<ProfileSync>,
    executor: Arc<TransferExecutor>,
    mover: Mover,
    config: EngineConfig,
    queue: Mutex<()>,
}

impl BuildOrchestrator {
    /// Wires the engine components around a remote and a catalog.
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        catalog: Arc<dyn Catalog>,
        membership: MembershipId,
        config: EngineConfig,
    ) -> Self {
        let inventory = InventoryStore::new().shared();
        let sync = Arc::new(ProfileSync::new(
            Arc::clone(&remote),
            Arc::clone(&inventory),
            membership,
            config.sync.clone(),
        ));
        let executor = Arc::new(TransferExecutor::new(
            remote,
            Arc::clone(&inventory),
            Arc::clone(&sync),
            config.retry.clone(),
            config.settle.clone(),
        ));
        let mover = Mover::new(
            Arc::clone(&inventory),
            Arc::clone(&catalog),
            Arc::clone(&executor),
            config.space.clone(),
        );
        Self {
            inventory,
            catalog,
            sync,
            executor,
            mover,
            config,
            queue: Mutex::new(()),
        }
    }

    pub fn inventory(&self) -> &SharedInventory {
        &self.inventory
    }

    pub fn sync(&self) -> &Arc<ProfileSync> {
        &self.sync
    }

    pub fn executor(&self) -> &Arc<TransferExecutor> {
        &self.executor
    }

    pub fn mover(&self) -> &Mover {
        &self.mover
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Items referenced by saved loadouts are moved aside last.
    pub async fn set_saved_loadout_items(&self, items: HashSet<ItemInstanceId>) {
        self.mover.set_protected(items).await;
    }

    /// Like `apply_loadout`, but fails with `WorkflowBusy` instead of
    /// waiting for a running application.
    pub async fn try_apply_loadout(
        &self,
        template: &BuildTemplate,
        character: CharacterId,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> EngineResult<ApplyReport> {
        let _queue = self.queue.try_lock().map_err(|_| EngineError::WorkflowBusy)?;
        self.run_workflow(template, character, progress, cancel).await
    }

    /// Applies `template` to `character`, waiting for any application
    /// already running.
    ///
    /// Errors are returned only when nothing could be attempted (the
    /// initial refresh failed, the character is unknown, or cancellation
    /// came before the first phase). Everything else lands in the report.
    pub async fn apply_loadout(
        &self,
        template: &BuildTemplate,
        character: CharacterId,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> EngineResult<ApplyReport> {
        let _queue = self.queue.lock().await;
        self.run_workflow(template, character, progress, cancel).await
    }

    async fn run_workflow(
        &self,
        template: &BuildTemplate,
        character: CharacterId,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> EngineResult<ApplyReport> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let _workflow = self.sync.begin_workflow();
        let mut report = ApplyReport::new(&template.name, character);
        let mut session = MoveSession::new(self.config.retry.max_retries);
        info!(
            "Applying loadout '{}' to {} (session {})",
            template.name,
            character,
            session.id()
        );

        // 1. Canonical state.
        progress.report("Refreshing inventory", 0);
        self.sync.force_refresh(RefreshKind::Full).await?;
        let class = self
            .inventory
            .read()
            .await
            .class_of(character)
            .ok_or(EngineError::UnknownCharacter(character))?;

        // 2 and 3. Resolve targets and the subclass.
        progress.report("Resolving items", 5);
        let mut targets = self.resolve_targets(template, character, class, &mut report).await;
        let subclass = match &template.subclass {
            Some(selection) => self.resolve_subclass(selection, character, &mut report).await,
            None => None,
        };
        for target in &targets {
            session.involve(target.instance.id);
        }
        if let Some(subclass) = &subclass {
            session.involve(subclass.id);
        }
        if self.cancelled(cancel, &mut report) {
            return Ok(report.finish());
        }

        // 4 and 5. Targets that clash with each other, then equipped items
        // that clash with targets.
        progress.report("Clearing exclusivity conflicts", 10);
        self.drop_internal_conflicts(&mut targets, &mut report);
        // Equipping these swaps out whatever is worn in their buckets.
        let incoming: Vec<BucketHash> = targets
            .iter()
            .filter(|t| !t.instance.is_exclusive())
            .map(|t| t.instance.bucket)
            .collect();
        let mut cleared = Vec::with_capacity(targets.len());
        for target in targets {
            if !target.instance.is_exclusive() {
                cleared.push(target);
                continue;
            }
            match self
                .mover
                .resolve_exclusivity_around(&target.instance, character, &incoming, &mut session)
                .await
            {
                Ok(()) => cleared.push(target),
                Err(e) => {
                    warn!("Cannot clear conflicts for {}: {}", target.instance.id, e);
                    session.exclude(target.instance.id);
                    report.fail(&target.instance, FailureStage::Conflict, e);
                }
            }
        }
        let targets = cleared;
        if self.cancelled(cancel, &mut report) {
            return Ok(report.finish());
        }

        // 6. Sequential moves.
        let moved = self
            .move_targets(targets, character, &mut session, progress, cancel, &mut report)
            .await;
        if self.cancelled(cancel, &mut report) {
            return Ok(report.finish());
        }

        // 7. Bulk equip.
        progress.report("Equipping items", 70);
        self.equip_targets(&moved, character, &mut report).await;
        if self.cancelled(cancel, &mut report) {
            return Ok(report.finish());
        }

        // 8. Subclass swap.
        let subclass_ready = match &subclass {
            Some(subclass) => {
                progress.report("Equipping subclass", 80);
                self.equip_subclass(subclass, character, &mut report).await
            }
            None => false,
        };
        if self.cancelled(cancel, &mut report) {
            return Ok(report.finish());
        }

        // 9. Sockets, strictly one call at a time.
        progress.report("Configuring sockets", 85);
        if let (Some(subclass), Some(selection)) = (&subclass, &template.subclass) {
            if subclass_ready {
                self.insert_plugs(
                    subclass.id,
                    &selection.plugs,
                    character,
                    &mut report.socket_failures,
                )
                .await;
            }
        }
        for target in &moved {
            self.insert_plugs(
                target.instance.id,
                &target.plugs,
                character,
                &mut report.socket_failures,
            )
            .await;
        }
        if self.cancelled(cancel, &mut report) {
            return Ok(report.finish());
        }

        // 10. General mods.
        progress.report("Applying mods", 95);
        for selection in &template.mods {
            let holder = self
                .inventory
                .read()
                .await
                .equipped_in(character, selection.bucket)
                .map(|item| item.id);
            match holder {
                Some(item) => {
                    let plugs = std::slice::from_ref(&selection.plug);
                    self.insert_plugs(item, plugs, character, &mut report.mod_failures)
                        .await;
                }
                None => report.mod_failures.push(SocketFailure {
                    item: None,
                    socket_index: selection.plug.socket_index,
                    plug: selection.plug.plug,
                    error: format!("nothing equipped in bucket {}", selection.bucket),
                }),
            }
        }

        if let Err(e) = self.sync.force_refresh(RefreshKind::Delta).await {
            warn!("Final refresh failed: {}", e);
        }
        progress.report("Done", 100);

        let report = report.finish();
        info!(
            "Loadout '{}' on {}: {} equipped, {} missing, {} failed, success {} ({:?})",
            report.loadout,
            character,
            report.equipped.len(),
            report.missing.len(),
            report.failed.len(),
            report.success,
            session.started_at().elapsed()
        );
        Ok(report)
    }

    fn cancelled(&self, cancel: &CancelToken, report: &mut ApplyReport) -> bool {
        if cancel.is_cancelled() {
            info!("Loadout '{}' cancelled", report.loadout);
            report.cancelled = true;
        }
        report.cancelled
    }

    /// Picks one owned instance per target hash. Instances on the character
    /// win, equipped first, then the vault, then other characters.
    async fn resolve_targets(
        &self,
        template: &BuildTemplate,
        character: CharacterId,
        class: ClassType,
        report: &mut ApplyReport,
    ) -> Vec<Target> {
        let inventory = self.inventory.read().await;
        let home = StoreId::Character(character);
        let mut chosen = HashSet::new();
        let mut targets = Vec::new();

        for target in &template.items {
            let hash = self.catalog.remap_legacy(target.hash).unwrap_or(target.hash);
            if hash != target.hash {
                debug!("Remapped legacy hash {} to {}", target.hash, hash);
            }
            let best = inventory
                .instances_of(hash)
                .into_iter()
                .filter(|(item, loc)| {
                    !chosen.contains(&item.id)
                        && item.class_type.allows(class)
                        && item.category != ItemCategory::Subclass
                        && (loc.store == home || !item.non_transferable)
                })
                .max_by_key(|(item, loc)| {
                    let rank = match loc.store {
                        StoreId::Character(c) if c == character => 2 + u8::from(loc.equipped),
                        StoreId::Vault => 1,
                        StoreId::Character(_) => 0,
                    };
                    (rank, item.power, item.id)
                });

            match best {
                Some((item, _)) => {
                    chosen.insert(item.id);
                    targets.push(Target {
                        instance: item.clone(),
                        plugs: target.plugs.clone(),
                    });
                }
                None => {
                    debug!("No usable instance of {}", hash);
                    report.missing.push(MissingItem {
                        hash: target.hash,
                        reason: MissingReason::NotOwned,
                    });
                }
            }
        }
        targets
    }

    /// Subclasses never move: the selection must already be on the
    /// character, or another subclass of the same damage type stands in.
    async fn resolve_subclass(
        &self,
        selection: &SubclassSelection,
        character: CharacterId,
        report: &mut ApplyReport,
    ) -> Option<ItemInstance> {
        let inventory = self.inventory.read().await;
        let hash = self.catalog.remap_legacy(selection.hash).unwrap_or(selection.hash);
        let home = StoreId::Character(character);
        let on_character = |item: &ItemInstance| {
            inventory
                .location(item.id)
                .is_some_and(|loc| loc.store == home)
        };

        let exact = inventory
            .instances_of(hash)
            .into_iter()
            .map(|(item, _)| item)
            .find(|item| on_character(item));
        let found = exact.or_else(|| {
            let damage = selection.damage_type?;
            let fallback = inventory.items_in_store(home).map(|(item, _)| item).find(|item| {
                item.category == ItemCategory::Subclass && item.damage_type == Some(damage)
            });
            if let Some(item) = fallback {
                info!("Using {} ({}) in place of subclass {}", item.id, item.name, hash);
            }
            fallback
        });

        if found.is_none() {
            report.missing.push(MissingItem {
                hash: selection.hash,
                reason: MissingReason::SubclassNotOnCharacter,
            });
        }
        found.cloned()
    }

    /// Keeps the first of any targets that share an exclusivity label.
    fn drop_internal_conflicts(&self, targets: &mut Vec<Target>, report: &mut ApplyReport) {
        let mut kept: Vec<Target> = Vec::with_capacity(targets.len());
        for target in targets.drain(..) {
            let clash = kept.iter().find(|k| {
                k.instance.bucket != target.instance.bucket
                    && k.instance.shares_exclusivity(&target.instance)
            });
            match clash {
                Some(other) => {
                    let reason = format!("conflicts with {} in the same loadout", other.instance.id);
                    warn!("Dropping {}: {}", target.instance.id, reason);
                    report.fail(&target.instance, FailureStage::Conflict, reason);
                }
                None => kept.push(target),
            }
        }
        *targets = kept;
    }

    /// Moves targets one at a time. A failed move gets one retry against
    /// refreshed state while the session retry budget lasts.
    async fn move_targets(
        &self,
        targets: Vec<Target>,
        character: CharacterId,
        session: &mut MoveSession,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
        report: &mut ApplyReport,
    ) -> Vec<Target> {
        let destination = StoreId::Character(character);
        let total = targets.len().max(1);
        let mut moved = Vec::with_capacity(targets.len());
        let mut issued = false;

        for (index, target) in targets.into_iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let percent = 15 + (55 * index / total) as u8;
            progress.report(&format!("Moving {}", target.instance.name), percent);

            let at_home = self
                .inventory
                .read()
                .await
                .location(target.instance.id)
                .is_some_and(|loc| loc.store == destination);
            if at_home {
                moved.push(target);
                continue;
            }
            if issued {
                tokio::time::sleep(self.config.settle.between_moves()).await;
            }
            issued = true;

            let id = target.instance.id;
            let mut result = self.mover.move_item(id, destination, false, session).await;
            if let Err(e) = &result {
                if session.try_retry() {
                    warn!("Move of {} failed ({}); retrying against fresh state", id, e);
                    if let Err(e) = self.sync.force_refresh(RefreshKind::Delta).await {
                        warn!("Refresh before retry failed: {}", e);
                    }
                    result = self.mover.move_item(id, destination, false, session).await;
                } else {
                    warn!("Move of {} failed ({}); session retries spent", id, e);
                }
            }
            match result {
                Ok(()) => moved.push(target),
                Err(e) => {
                    session.exclude(id);
                    report.fail(&target.instance, FailureStage::Move, e);
                }
            }
        }
        moved
    }

    async fn equip_targets(
        &self,
        targets: &[Target],
        character: CharacterId,
        report: &mut ApplyReport,
    ) {
        if targets.is_empty() {
            return;
        }
        // Plain items first, so a worn exclusive item they replace is gone
        // before an exclusive target goes on.
        let mut ordered: Vec<&Target> = targets.iter().collect();
        ordered.sort_by_key(|t| t.instance.is_exclusive());
        let ids: Vec<ItemInstanceId> = ordered.iter().map(|t| t.instance.id).collect();
        let outcomes = match self.executor.equip_items(&ids, character).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                warn!("Bulk equip failed: {}", e);
                for target in targets {
                    report.fail(&target.instance, FailureStage::Equip, &e);
                }
                return;
            }
        };

        for outcome in outcomes {
            let Some(target) = targets.iter().find(|t| t.instance.id == outcome.item) else {
                continue;
            };
            match outcome.status {
                EquipResult::Equipped => report.equipped.push(outcome.item),
                EquipResult::OrbitRequired => report.orbit_required = true,
                EquipResult::Failed(error) => {
                    report.fail(&target.instance, FailureStage::Equip, error)
                }
            }
        }
    }

    /// Returns true once the subclass is equipped and has settled.
    async fn equip_subclass(
        &self,
        subclass: &ItemInstance,
        character: CharacterId,
        report: &mut ApplyReport,
    ) -> bool {
        let equipped = self
            .inventory
            .read()
            .await
            .location(subclass.id)
            .is_some_and(|loc| loc.is_equipped_on(character));
        if equipped {
            return true;
        }

        match self.executor.equip_item(subclass.id, character).await {
            Ok(()) => {
                debug!("Waiting for subclass {} to settle", subclass.id);
                tokio::time::sleep(self.config.settle.subclass_settle()).await;
                report.equipped.push(subclass.id);
                true
            }
            Err(e) if e.is_restricted_location() => {
                report.orbit_required = true;
                false
            }
            Err(e) => {
                report.fail(subclass, FailureStage::Subclass, e);
                false
            }
        }
    }

    async fn insert_plugs(
        &self,
        item: ItemInstanceId,
        plugs: &[SocketPlug],
        character: CharacterId,
        failures: &mut Vec<SocketFailure>,
    ) {
        for plug in plugs {
            if let Err(e) = self
                .executor
                .insert_socket_plug(item, character, plug.socket_index, plug.plug)
                .await
            {
                warn!("Socket {} of {} failed: {}", plug.socket_index, item, e);
                failures.push(SocketFailure {
                    item: Some(item),
                    socket_index: plug.socket_index,
                    plug: plug.plug,
                    error: e.to_string(),
                });
            }
        }
    }
}
