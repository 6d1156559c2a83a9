//! Remote mutations with optimistic local state.
//!
//! Every mutation follows the same path: apply the intended change to the
//! inventory, issue the remote call, then commit or roll back. Failures are
//! classified. Retryable ones are retried with backoff. Ambiguous ones (5xx,
//! network) may have been applied, so they are reconciled by re-reading
//! canonical state and comparing it with the intended outcome.

use crate::config::{RetryConfig, SettleConfig};
use crate::error::{EngineError, EngineResult, ErrorClass, PlatformErrorCode, RemoteError};
use crate::inventory::{Change, PendingId, SharedInventory};
use crate::profile::{ProfileSync, RefreshKind};
use crate::remote::{EquipStatus, RemoteApi, SocketPlugRequest, TransferRequest};
use loadout_types::{CharacterId, ItemInstanceId, Location, PlugHash, StoreId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// State a mutation is supposed to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedOutcome {
    /// The item sits unequipped in this store (or the vault).
    InStore {
        item: ItemInstanceId,
        store: StoreId,
    },
    Equipped {
        item: ItemInstanceId,
        character: CharacterId,
    },
    Plugged {
        item: ItemInstanceId,
        socket_index: u32,
        plug: PlugHash,
    },
    Locked {
        item: ItemInstanceId,
        locked: bool,
    },
}

/// Result of comparing local state with an expected outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Matches,
    Mismatch,
}

impl Verification {
    pub fn matches(self) -> bool {
        self == Verification::Matches
    }
}

/// Per-item result of a bulk equip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipOutcome {
    pub item: ItemInstanceId,
    pub status: EquipResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EquipResult {
    Equipped,
    /// Refused because of where the character is.
    OrbitRequired,
    Failed(String),
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Transfer(TransferRequest),
    Equip {
        item: ItemInstanceId,
        character: CharacterId,
    },
    Plug(SocketPlugRequest),
    Lock {
        item: ItemInstanceId,
        character: CharacterId,
        locked: bool,
    },
}

impl Mutation {
    fn item(&self) -> ItemInstanceId {
        match self {
            Mutation::Transfer(r) => r.item,
            Mutation::Equip { item, .. } | Mutation::Lock { item, .. } => *item,
            Mutation::Plug(r) => r.item,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Mutation::Transfer(_) => "transfer",
            Mutation::Equip { .. } => "equip",
            Mutation::Plug(_) => "insert plug",
            Mutation::Lock { .. } => "set lock",
        }
    }

    fn change(&self) -> Change {
        match *self {
            Mutation::Transfer(r) => Change::Move {
                item: r.item,
                to: if r.to_vault {
                    Location::vault()
                } else {
                    Location::inventory(r.character)
                },
            },
            Mutation::Equip { item, character } => Change::Equip { item, character },
            Mutation::Plug(r) => Change::Plug {
                item: r.item,
                socket_index: r.socket_index,
                plug: r.plug,
            },
            Mutation::Lock { item, locked, .. } => Change::Lock { item, locked },
        }
    }

    fn expected(&self) -> ExpectedOutcome {
        match *self {
            Mutation::Transfer(r) => ExpectedOutcome::InStore {
                item: r.item,
                store: if r.to_vault {
                    StoreId::Vault
                } else {
                    StoreId::Character(r.character)
                },
            },
            Mutation::Equip { item, character } => ExpectedOutcome::Equipped { item, character },
            Mutation::Plug(r) => ExpectedOutcome::Plugged {
                item: r.item,
                socket_index: r.socket_index,
                plug: r.plug,
            },
            Mutation::Lock { item, locked, .. } => ExpectedOutcome::Locked { item, locked },
        }
    }

    async fn dispatch(&self, remote: &dyn RemoteApi) -> Result<(), RemoteError> {
        match self {
            Mutation::Transfer(r) => remote.transfer_item(r).await,
            Mutation::Equip { item, character } => remote.equip_item(*item, *character).await,
            Mutation::Plug(r) => remote.insert_socket_plug(r).await,
            Mutation::Lock {
                item,
                character,
                locked,
            } => remote.set_lock_state(*item, *character, *locked).await,
        }
    }
}

/// Retry budget for a retryable failure. "Item not found" is usually a
/// propagation delay and gets a single retry.
fn retry_budget(error: &RemoteError, config: &RetryConfig) -> u32 {
    match error.code() {
        Some(PlatformErrorCode::ItemNotFound) => config.max_retries.min(1),
        _ => config.max_retries,
    }
}

fn is_restricted(error: &RemoteError) -> bool {
    error.code() == Some(PlatformErrorCode::CannotPerformActionAtThisLocation)
}

/// Issues remote mutations.
pub struct TransferExecutor {
    remote: Arc<dyn RemoteApi>,
    inventory: SharedInventory,
    sync: Arc<ProfileSync>,
    retry: RetryConfig,
    settle: SettleConfig,
}

impl TransferExecutor {
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        inventory: SharedInventory,
        sync: Arc<ProfileSync>,
        retry: RetryConfig,
        settle: SettleConfig,
    ) -> Self {
        Self {
            remote,
            inventory,
            sync,
            retry,
            settle,
        }
    }

    pub fn inventory(&self) -> &SharedInventory {
        &self.inventory
    }

    pub fn sync(&self) -> &Arc<ProfileSync> {
        &self.sync
    }

    // ── Operations ───────────────────────────────────────────────

    /// Moves an item one hop, between a character and the vault.
    ///
    /// Items with duplicates in the same bucket get their lock flag written
    /// back after the move; the remote is known to drop it.
    pub async fn transfer_item(&self, item: ItemInstanceId, to: StoreId) -> EngineResult<()> {
        let (instance, from, duplicates) = {
            let inventory = self.inventory.read().await;
            let (instance, from) = inventory.entry(item).ok_or(EngineError::ItemNotFound(item))?;
            let duplicates = inventory.count_duplicates(instance.hash, instance.bucket);
            (instance.clone(), from, duplicates)
        };

        if from.store == to {
            return Ok(());
        }
        if instance.non_transferable {
            return Err(EngineError::NotTransferable(item));
        }
        if from.equipped {
            return Err(EngineError::StillEquipped(item));
        }

        let (character, to_vault) = match (from.store, to) {
            (StoreId::Character(c), StoreId::Vault) => (c, true),
            (StoreId::Vault, StoreId::Character(c)) => (c, false),
            _ => return Err(EngineError::InvalidRoute { from: from.store, to }),
        };

        info!("Transferring {} ({}) from {} to {}", item, instance.name, from.store, to);
        let request = TransferRequest {
            item,
            item_hash: instance.hash,
            character,
            to_vault,
            stack_size: 1,
        };
        self.execute(Mutation::Transfer(request)).await?;

        if instance.locked && duplicates > 1 {
            debug!("Restoring lock on {} after transfer", item);
            let restore = Mutation::Lock {
                item,
                character,
                locked: true,
            };
            if let Err(e) = self.execute(restore).await {
                warn!("Failed to restore lock on {}: {}", item, e);
            }
        }
        Ok(())
    }

    /// Equips an item already on the character. A no-op if it is already
    /// equipped there.
    pub async fn equip_item(&self, item: ItemInstanceId, character: CharacterId) -> EngineResult<()> {
        let location = self
            .inventory
            .read()
            .await
            .location(item)
            .ok_or(EngineError::ItemNotFound(item))?;

        if location.is_equipped_on(character) {
            debug!("{} already equipped on {}", item, character);
            return Ok(());
        }
        if location.store != StoreId::Character(character) {
            return Err(EngineError::NotOnCharacter { item, character });
        }

        info!("Equipping {} on {}", item, character);
        self.execute(Mutation::Equip { item, character }).await
    }

    /// Inserts a plug. A no-op if the socket already holds it.
    pub async fn insert_socket_plug(
        &self,
        item: ItemInstanceId,
        character: CharacterId,
        socket_index: u32,
        plug: PlugHash,
    ) -> EngineResult<()> {
        let current = self
            .inventory
            .read()
            .await
            .get(item)
            .ok_or(EngineError::ItemNotFound(item))?
            .plug_at(socket_index);
        if current == Some(plug) {
            debug!("Socket {} of {} already holds {}", socket_index, item, plug);
            return Ok(());
        }

        debug!("Inserting {} into socket {} of {}", plug, socket_index, item);
        self.execute(Mutation::Plug(SocketPlugRequest {
            item,
            character,
            socket_index,
            plug,
        }))
        .await
    }

    /// Sets an item's lock flag. Vault items are addressed through the
    /// first known character.
    pub async fn set_lock_state(&self, item: ItemInstanceId, locked: bool) -> EngineResult<()> {
        let (current, character) = {
            let inventory = self.inventory.read().await;
            let (instance, location) =
                inventory.entry(item).ok_or(EngineError::ItemNotFound(item))?;
            let character = match location.store {
                StoreId::Character(c) => Some(c),
                StoreId::Vault => inventory.characters().next(),
            };
            (instance.locked, character)
        };
        if current == locked {
            return Ok(());
        }
        let character = character.ok_or(EngineError::ItemNotFound(item))?;

        self.execute(Mutation::Lock {
            item,
            character,
            locked,
        })
        .await
    }

    /// Equips several items in one remote call.
    ///
    /// Items already equipped are reported without being sent. A refusal
    /// because of the character's location is reported as `OrbitRequired`.
    pub async fn equip_items(
        &self,
        items: &[ItemInstanceId],
        character: CharacterId,
    ) -> EngineResult<Vec<EquipOutcome>> {
        let mut outcomes = Vec::with_capacity(items.len());
        let mut send = Vec::new();
        {
            let inventory = self.inventory.read().await;
            for &item in items {
                match inventory.location(item) {
                    Some(loc) if loc.is_equipped_on(character) => outcomes.push(EquipOutcome {
                        item,
                        status: EquipResult::Equipped,
                    }),
                    Some(loc) if loc.store == StoreId::Character(character) => send.push(item),
                    Some(_) => outcomes.push(EquipOutcome {
                        item,
                        status: EquipResult::Failed(format!("not on character {character}")),
                    }),
                    None => outcomes.push(EquipOutcome {
                        item,
                        status: EquipResult::Failed("not found".to_string()),
                    }),
                }
            }
        }
        if send.is_empty() {
            return Ok(outcomes);
        }

        info!("Bulk equipping {} items on {}", send.len(), character);
        let mut unconfirmed = send;
        for round in 0..2 {
            let (done, ambiguous) = self.bulk_equip_round(&unconfirmed, character).await?;
            outcomes.extend(done);
            if ambiguous.is_empty() {
                return Ok(outcomes);
            }

            let wait = if round == 0 {
                self.settle.ghost_settle()
            } else {
                self.settle.ghost_second_settle()
            };
            tokio::time::sleep(wait).await;
            self.sync.force_refresh(RefreshKind::Delta).await?;

            let inventory = self.inventory.read().await;
            unconfirmed = Vec::new();
            for item in ambiguous {
                if inventory.location(item).is_some_and(|l| l.is_equipped_on(character)) {
                    info!("Bulk equip of {} applied despite error", item);
                    outcomes.push(EquipOutcome {
                        item,
                        status: EquipResult::Equipped,
                    });
                } else {
                    unconfirmed.push(item);
                }
            }
            if unconfirmed.is_empty() {
                return Ok(outcomes);
            }
        }

        for item in unconfirmed {
            outcomes.push(EquipOutcome {
                item,
                status: EquipResult::Failed("equip not confirmed after server errors".into()),
            });
        }
        Ok(outcomes)
    }

    /// One bulk equip call with retries. Returns settled outcomes and items
    /// whose state is unknown after an ambiguous failure.
    async fn bulk_equip_round(
        &self,
        items: &[ItemInstanceId],
        character: CharacterId,
    ) -> EngineResult<(Vec<EquipOutcome>, Vec<ItemInstanceId>)> {
        let mut attempt = 0;
        loop {
            let pending = self.begin_all(items, character).await;
            let result = self.remote.equip_items(items, character).await;

            let error = match result {
                Ok(statuses) => {
                    let outcomes = self.settle_statuses(pending, statuses).await;
                    return Ok((outcomes, Vec::new()));
                }
                Err(e) => e,
            };
            self.rollback_all(&pending).await;

            match error.classify() {
                ErrorClass::Retryable if attempt < retry_budget(&error, &self.retry) => {
                    attempt += 1;
                    warn!("Bulk equip failed ({}), retry {}", error, attempt);
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                }
                ErrorClass::Ambiguous => {
                    warn!("Bulk equip returned {}; verifying", error);
                    return Ok((Vec::new(), items.to_vec()));
                }
                _ => {
                    let status = if is_restricted(&error) {
                        EquipResult::OrbitRequired
                    } else {
                        EquipResult::Failed(error.to_string())
                    };
                    let outcomes = items
                        .iter()
                        .map(|&item| EquipOutcome {
                            item,
                            status: status.clone(),
                        })
                        .collect();
                    return Ok((outcomes, Vec::new()));
                }
            }
        }
    }

    async fn begin_all(
        &self,
        items: &[ItemInstanceId],
        character: CharacterId,
    ) -> Vec<(ItemInstanceId, Option<PendingId>)> {
        let mut inventory = self.inventory.write().await;
        items
            .iter()
            .map(|&item| (item, inventory.begin(Change::Equip { item, character }).ok()))
            .collect()
    }

    async fn rollback_all(&self, pending: &[(ItemInstanceId, Option<PendingId>)]) {
        let mut inventory = self.inventory.write().await;
        for (_, id) in pending.iter().rev() {
            if let Some(id) = id {
                inventory.rollback(*id);
            }
        }
    }

    async fn settle_statuses(
        &self,
        pending: Vec<(ItemInstanceId, Option<PendingId>)>,
        statuses: Vec<EquipStatus>,
    ) -> Vec<EquipOutcome> {
        let mut inventory = self.inventory.write().await;
        let mut outcomes = Vec::with_capacity(pending.len());
        for (item, id) in pending.into_iter().rev() {
            let error = match statuses.iter().find(|s| s.item == item) {
                Some(status) => status.error.clone(),
                None => Some(RemoteError::Malformed(format!("no status for {item}"))),
            };
            let status = match error {
                None => EquipResult::Equipped,
                Some(e) if e.classify() == ErrorClass::AlreadyApplied => EquipResult::Equipped,
                Some(e) if is_restricted(&e) => EquipResult::OrbitRequired,
                Some(e) => EquipResult::Failed(e.to_string()),
            };
            if let Some(id) = id {
                if status == EquipResult::Equipped {
                    inventory.commit(id);
                } else {
                    inventory.rollback(id);
                }
            }
            outcomes.push(EquipOutcome { item, status });
        }
        outcomes.reverse();
        outcomes
    }

    /// Compares local state with an expected outcome.
    pub async fn verify_outcome(&self, expected: ExpectedOutcome) -> Verification {
        let inventory = self.inventory.read().await;
        let matches = match expected {
            ExpectedOutcome::InStore { item, store } => inventory
                .location(item)
                .is_some_and(|loc| loc.store == store && !loc.equipped),
            ExpectedOutcome::Equipped { item, character } => inventory
                .location(item)
                .is_some_and(|loc| loc.is_equipped_on(character)),
            ExpectedOutcome::Plugged {
                item,
                socket_index,
                plug,
            } => inventory
                .get(item)
                .is_some_and(|i| i.plug_at(socket_index) == Some(plug)),
            ExpectedOutcome::Locked { item, locked } => {
                inventory.get(item).is_some_and(|i| i.locked == locked)
            }
        };
        if matches {
            Verification::Matches
        } else {
            Verification::Mismatch
        }
    }

    // ── Execution ────────────────────────────────────────────────

    async fn begin(&self, mutation: &Mutation) -> EngineResult<PendingId> {
        self.inventory.write().await.begin(mutation.change())
    }

    async fn finish(&self, pending: PendingId, success: bool) {
        let mut inventory = self.inventory.write().await;
        if success {
            inventory.commit(pending);
        } else {
            inventory.rollback(pending);
        }
    }

    async fn execute(&self, mutation: Mutation) -> EngineResult<()> {
        let mut attempt = 0;
        loop {
            let pending = self.begin(&mutation).await?;
            let error = match mutation.dispatch(self.remote.as_ref()).await {
                Ok(()) => {
                    self.finish(pending, true).await;
                    return Ok(());
                }
                Err(e) => e,
            };

            match error.classify() {
                ErrorClass::AlreadyApplied => {
                    debug!("{} of {} already applied", mutation.name(), mutation.item());
                    self.finish(pending, true).await;
                    return Ok(());
                }
                ErrorClass::Retryable => {
                    self.finish(pending, false).await;
                    if attempt >= retry_budget(&error, &self.retry) {
                        return Err(EngineError::RemoteFailed {
                            attempts: attempt + 1,
                            source: error,
                        });
                    }
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "{} of {} failed ({}), retry {} in {:?}",
                        mutation.name(),
                        mutation.item(),
                        error,
                        attempt,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                ErrorClass::Ambiguous => {
                    self.finish(pending, false).await;
                    return self.reconcile(mutation, error).await;
                }
                ErrorClass::Terminal => {
                    self.finish(pending, false).await;
                    warn!("{} of {} rejected: {}", mutation.name(), mutation.item(), error);
                    return Err(EngineError::from_terminal(error));
                }
            }
        }
    }

    /// Settles an ambiguous failure: re-read canonical state and compare.
    /// On a mismatch the call is retried once after a longer settle window.
    async fn reconcile(&self, mutation: Mutation, error: RemoteError) -> EngineResult<()> {
        let expected = mutation.expected();
        warn!(
            "{} of {} returned {}; checking for ghost success",
            mutation.name(),
            mutation.item(),
            error
        );

        if self.settle_and_verify(self.settle.ghost_settle(), expected).await? {
            info!("{} of {} applied despite error", mutation.name(), mutation.item());
            return Ok(());
        }

        debug!("{} of {} not applied; retrying once", mutation.name(), mutation.item());
        tokio::time::sleep(self.settle.ghost_second_settle()).await;
        let pending = self.begin(&mutation).await?;
        let retry_error = match mutation.dispatch(self.remote.as_ref()).await {
            Ok(()) => {
                self.finish(pending, true).await;
                return Ok(());
            }
            Err(e) => e,
        };
        self.finish(pending, false).await;

        match retry_error.classify() {
            ErrorClass::AlreadyApplied => Ok(()),
            ErrorClass::Ambiguous => {
                if self.settle_and_verify(self.settle.ghost_second_settle(), expected).await? {
                    info!("{} of {} applied on retry", mutation.name(), mutation.item());
                    Ok(())
                } else {
                    Err(EngineError::GhostMismatch(mutation.item()))
                }
            }
            ErrorClass::Terminal => Err(EngineError::from_terminal(retry_error)),
            ErrorClass::Retryable => Err(EngineError::RemoteFailed {
                attempts: 2,
                source: retry_error,
            }),
        }
    }

    async fn settle_and_verify(
        &self,
        wait: std::time::Duration,
        expected: ExpectedOutcome,
    ) -> EngineResult<bool> {
        tokio::time::sleep(wait).await;
        self.sync.force_refresh(RefreshKind::Delta).await?;
        Ok(self.verify_outcome(expected).await.matches())
    }
}
