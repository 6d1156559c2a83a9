//! The move state machine.
//!
//! `move_item` turns "put this item there, maybe equipped" into single-hop
//! transfers and equips. Character-to-character moves always pass through
//! the vault. Before each hop the destination is made roomy enough through
//! a bounded move-aside loop, and exclusivity conflicts at an equip target
//! are resolved by equipping non-exclusive replacements.

use crate::catalog::Catalog;
use crate::config::SpaceConfig;
use crate::conflict::ConflictResolver;
use crate::error::{EngineError, EngineResult};
use crate::inventory::SharedInventory;
use crate::session::MoveSession;
use crate::space::{SpaceManager, SpacePlan};
use crate::transfer::TransferExecutor;
use loadout_types::{BucketHash, CharacterId, ItemInstance, ItemInstanceId, Location, StoreId};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

type MoveFuture<'a> = Pin<Box<dyn Future<Output = EngineResult<()>> + Send + 'a>>;

/// Plans and executes item moves.
pub struct Mover {
    inventory: SharedInventory,
    catalog: Arc<dyn Catalog>,
    executor: Arc<TransferExecutor>,
    space: SpaceConfig,
    protected: RwLock<HashSet<ItemInstanceId>>,
}

impl Mover {
    pub fn new(
        inventory: SharedInventory,
        catalog: Arc<dyn Catalog>,
        executor: Arc<TransferExecutor>,
        space: SpaceConfig,
    ) -> Self {
        Self {
            inventory,
            catalog,
            executor,
            space,
            protected: RwLock::new(HashSet::new()),
        }
    }

    /// Replaces the set of items referenced by saved loadouts.
    pub async fn set_protected(&self, items: HashSet<ItemInstanceId>) {
        *self.protected.write().await = items;
    }

    pub fn executor(&self) -> &Arc<TransferExecutor> {
        &self.executor
    }

    async fn entry(&self, item: ItemInstanceId) -> EngineResult<(ItemInstance, Location)> {
        self.inventory
            .read()
            .await
            .entry(item)
            .map(|(instance, location)| (instance.clone(), location))
            .ok_or(EngineError::ItemNotFound(item))
    }

    /// Moves `item` to `to`, equipping it there if `equip` is set.
    pub fn move_item<'a>(
        &'a self,
        item: ItemInstanceId,
        to: StoreId,
        equip: bool,
        session: &'a mut MoveSession,
    ) -> MoveFuture<'a> {
        Box::pin(async move {
            let (instance, from) = self.entry(item).await?;
            session.involve(item);

            let equip_on = match (equip, to) {
                (false, _) => None,
                (true, StoreId::Character(c)) => Some(c),
                (true, StoreId::Vault) => {
                    return Err(EngineError::InvalidRoute {
                        from: from.store,
                        to,
                    });
                }
            };

            if from.store == to {
                if let Some(character) = equip_on {
                    self.equip(&instance, character, session).await?;
                }
                return Ok(());
            }
            if instance.non_transferable {
                return Err(EngineError::NotTransferable(item));
            }

            debug!("Moving {} from {} to {} (equip: {})", item, from.store, to, equip);
            match (from.store, to) {
                (StoreId::Character(source), StoreId::Vault) => {
                    if from.equipped {
                        self.dequip_item(&instance, source, session).await?;
                    }
                    self.ensure_can_move_to_store(&instance, from.store, to, 1, session)
                        .await?;
                    self.executor.transfer_item(item, to).await
                }
                (StoreId::Vault, StoreId::Character(destination)) => {
                    self.ensure_can_move_to_store(&instance, from.store, to, 1, session)
                        .await?;
                    if equip_on.is_some() {
                        self.resolve_exclusivity(&instance, destination, session)
                            .await?;
                    }
                    self.executor.transfer_item(item, to).await?;
                    if equip_on.is_some() {
                        self.executor.equip_item(item, destination).await?;
                    }
                    Ok(())
                }
                (StoreId::Character(source), StoreId::Character(destination)) => {
                    if from.equipped {
                        self.dequip_item(&instance, source, session).await?;
                    }
                    self.ensure_can_move_to_store(&instance, from.store, StoreId::Vault, 1, session)
                        .await?;
                    self.executor.transfer_item(item, StoreId::Vault).await?;

                    self.ensure_can_move_to_store(&instance, StoreId::Vault, to, 1, session)
                        .await?;
                    if equip_on.is_some() {
                        self.resolve_exclusivity(&instance, destination, session)
                            .await?;
                    }
                    self.executor.transfer_item(item, to).await?;

                    if equip_on.is_some() {
                        self.executor.equip_item(item, destination).await?;
                        self.confirm_equipped(item, destination).await?;
                    }
                    Ok(())
                }
                // Same-store pairs returned above.
                (StoreId::Vault, StoreId::Vault) => Ok(()),
            }
        })
    }

    /// Re-checks that a two-hop move ended equipped and issues one corrective
    /// equip if it did not.
    async fn confirm_equipped(&self, item: ItemInstanceId, character: CharacterId) -> EngineResult<()> {
        let (_, location) = self.entry(item).await?;
        if location.is_equipped_on(character) {
            return Ok(());
        }
        warn!("{} not equipped on {} after move; re-equipping", item, character);
        self.executor.equip_item(item, character).await?;
        let (_, location) = self.entry(item).await?;
        if location.is_equipped_on(character) {
            Ok(())
        } else {
            Err(EngineError::NotEquipped(item))
        }
    }

    /// Equips an item already on the character, resolving conflicts first.
    pub async fn equip(
        &self,
        item: &ItemInstance,
        character: CharacterId,
        session: &mut MoveSession,
    ) -> EngineResult<()> {
        self.resolve_exclusivity(item, character, session).await?;
        self.executor.equip_item(item.id, character).await
    }

    /// Takes an equipped item off `character` by equipping a replacement in
    /// its bucket. An exclusive item is only replaced by a non-exclusive one.
    pub async fn dequip_item(
        &self,
        item: &ItemInstance,
        character: CharacterId,
        session: &mut MoveSession,
    ) -> EngineResult<()> {
        let replacement = {
            let inventory = self.inventory.read().await;
            ConflictResolver::new(&inventory)
                .find_replacement_item(item, character, session, !item.is_exclusive())
                .map(|r| r.id)
        };
        let replacement = replacement.ok_or(EngineError::NoReplacement(item.id))?;
        info!("Dequipping {} from {} with {}", item.id, character, replacement);
        self.bring_and_equip(replacement, character, session).await
    }

    /// Clears every exclusivity conflict that equipping `item` on
    /// `character` would create.
    pub async fn resolve_exclusivity(
        &self,
        item: &ItemInstance,
        character: CharacterId,
        session: &mut MoveSession,
    ) -> EngineResult<()> {
        self.resolve_exclusivity_around(item, character, &[], session)
            .await
    }

    /// Like `resolve_exclusivity`, but leaves alone conflicting items in
    /// `incoming` buckets: something else is about to be equipped there.
    pub async fn resolve_exclusivity_around(
        &self,
        item: &ItemInstance,
        character: CharacterId,
        incoming: &[BucketHash],
        session: &mut MoveSession,
    ) -> EngineResult<()> {
        let conflicts: Vec<ItemInstance> = {
            let inventory = self.inventory.read().await;
            let resolver = ConflictResolver::new(&inventory);
            if resolver.can_equip_exotic(item, character) {
                return Ok(());
            }
            resolver
                .conflicts_for(item, character)
                .into_iter()
                .filter(|conflicting| !incoming.contains(&conflicting.bucket))
                .cloned()
                .collect()
        };

        for conflicting in conflicts {
            let replacement = {
                let inventory = self.inventory.read().await;
                ConflictResolver::new(&inventory)
                    .find_replacement_item(&conflicting, character, session, false)
                    .map(|r| r.id)
            };
            let Some(replacement) = replacement else {
                warn!(
                    "No replacement for {} to make way for {} on {}",
                    conflicting.id, item.id, character
                );
                return Err(EngineError::ExclusivityUnresolved {
                    item: item.id,
                    conflicting: conflicting.id,
                });
            };
            info!(
                "Replacing {} with {} to make way for {}",
                conflicting.id, replacement, item.id
            );
            self.bring_and_equip(replacement, character, session).await?;
        }
        Ok(())
    }

    async fn bring_and_equip(
        &self,
        replacement: ItemInstanceId,
        character: CharacterId,
        session: &mut MoveSession,
    ) -> EngineResult<()> {
        session.involve(replacement);
        let (_, location) = self.entry(replacement).await?;
        if location.store != StoreId::Character(character) {
            self.move_item(replacement, StoreId::Character(character), false, session)
                .await?;
        }
        self.executor.equip_item(replacement, character).await
    }

    /// Makes room for `amount` of `item` in every store on the route from
    /// `from` to `to`, relocating at most `move_aside_max_depth` items.
    pub async fn ensure_can_move_to_store(
        &self,
        item: &ItemInstance,
        from: StoreId,
        to: StoreId,
        amount: u32,
        session: &mut MoveSession,
    ) -> EngineResult<()> {
        let max_depth = self.space.move_aside_max_depth;
        for depth in 0..=max_depth {
            let (plan, reservation) = {
                let inventory = self.inventory.read().await;
                let protected = self.protected.read().await;
                let space =
                    SpaceManager::new(&inventory, self.catalog.as_ref(), &self.space, &protected);
                let plan = space.plan_space(item, from, to, amount, session);
                let reservation = match plan {
                    SpacePlan::Relocate(r) => Some(space.reservation_key(r.bucket, r.to)),
                    _ => None,
                };
                (plan, reservation)
            };

            let relocation = match plan {
                SpacePlan::Ready => return Ok(()),
                SpacePlan::Blocked { store, bucket } => {
                    warn!("No way to make room in bucket {} of {}", bucket, store);
                    return Err(EngineError::NoSpace { store, bucket });
                }
                SpacePlan::Relocate(relocation) => relocation,
            };
            if depth == max_depth {
                break;
            }

            info!(
                "Moving {} aside from {} to {} to make room for {}",
                relocation.item, relocation.from, relocation.to, item.id
            );
            session.involve(relocation.item);
            let key = reservation.unwrap_or(relocation.bucket);
            session.reserve(relocation.to, key, 1);
            let result = self.executor.transfer_item(relocation.item, relocation.to).await;
            session.release(relocation.to, key, 1);
            result?;
        }

        warn!("Gave up making room for {} after {} relocations", item.id, max_depth);
        Err(EngineError::MoveAsideLimit {
            item: item.id,
            depth: max_depth,
        })
    }
}
