//! Move sessions.
//!
//! A session lives for one logical operation (a single move or a whole
//! loadout application). Items committed to the operation are "involved" and
//! are never picked as move-aside candidates, which rules out cycles.

use loadout_types::{BucketHash, ItemInstanceId, SessionId, StoreId};
use std::collections::{HashMap, HashSet};
use tokio::time::Instant;

/// Transactional context shared across one batch of operations.
#[derive(Debug)]
pub struct MoveSession {
    id: SessionId,
    involved: HashSet<ItemInstanceId>,
    excluded: HashSet<ItemInstanceId>,
    reservations: HashMap<(StoreId, BucketHash), u32>,
    retries: u32,
    max_retries: u32,
    started_at: Instant,
}

impl MoveSession {
    /// Creates a session allowing `max_retries` session-level retries.
    pub fn new(max_retries: u32) -> Self {
        Self {
            id: SessionId::new(),
            involved: HashSet::new(),
            excluded: HashSet::new(),
            reservations: HashMap::new(),
            retries: 0,
            max_retries,
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Marks an item as committed to this batch.
    pub fn involve(&mut self, item: ItemInstanceId) {
        self.involved.insert(item);
    }

    pub fn is_involved(&self, item: ItemInstanceId) -> bool {
        self.involved.contains(&item)
    }

    /// Keeps an item out of every selection in this session.
    pub fn exclude(&mut self, item: ItemInstanceId) {
        self.excluded.insert(item);
    }

    pub fn is_excluded(&self, item: ItemInstanceId) -> bool {
        self.excluded.contains(&item)
    }

    /// True if the item may be chosen as a move-aside or replacement candidate.
    pub fn is_available(&self, item: ItemInstanceId) -> bool {
        !self.is_involved(item) && !self.is_excluded(item)
    }

    /// Holds a slot for an item that is about to arrive.
    pub fn reserve(&mut self, store: StoreId, bucket: BucketHash, amount: u32) {
        *self.reservations.entry((store, bucket)).or_default() += amount;
    }

    /// Releases a held slot once the arrival shows up in the inventory.
    pub fn release(&mut self, store: StoreId, bucket: BucketHash, amount: u32) {
        if let Some(count) = self.reservations.get_mut(&(store, bucket)) {
            *count = count.saturating_sub(amount);
            if *count == 0 {
                self.reservations.remove(&(store, bucket));
            }
        }
    }

    pub fn reserved(&self, store: StoreId, bucket: BucketHash) -> u32 {
        self.reservations.get(&(store, bucket)).copied().unwrap_or(0)
    }

    /// Counts a retry. Returns false once the budget is spent.
    pub fn try_retry(&mut self) -> bool {
        if self.retries >= self.max_retries {
            return false;
        }
        self.retries += 1;
        true
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}
