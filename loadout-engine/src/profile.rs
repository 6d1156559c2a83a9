//! Profile synchronization.
//!
//! Refreshes the local inventory from canonical remote state. Three signals
//! pick the cadence: visibility, connectivity and a heartbeat. Refreshes are
//! single-flight and are suppressed while a loadout workflow is running.

use crate::config::SyncConfig;
use crate::error::{EngineError, EngineResult};
use crate::inventory::{SharedInventory, SnapshotOutcome};
use crate::remote::{ProfileScope, RemoteApi};
use loadout_types::MembershipId;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How much state a refresh pulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// Characters and every item component.
    Full,
    /// Item locations and instance state, plus character classes.
    Delta,
}

impl RefreshKind {
    fn scope(self) -> ProfileScope {
        match self {
            RefreshKind::Full => ProfileScope::Full,
            RefreshKind::Delta => ProfileScope::Inventory,
        }
    }
}

/// What a refresh request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot replaced local state.
    Applied,
    /// The fetched snapshot was older than local state and was dropped.
    Stale,
    /// Suppressed (workflow in flight, offline, or nothing to do).
    Skipped,
    /// Another refresh finished while this one waited; its result stands.
    Joined,
}

/// External signals that drive refresh cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSignal {
    Visibility(bool),
    Connectivity(bool),
    Heartbeat,
}

/// Result of feeding a signal to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    Refresh(RefreshKind),
    Idle,
}

#[derive(Debug)]
struct SignalState {
    hidden_since: Option<Instant>,
    online: bool,
}

/// Keeps the inventory in step with the remote profile.
pub struct ProfileSync {
    remote: Arc<dyn RemoteApi>,
    inventory: SharedInventory,
    membership: MembershipId,
    config: SyncConfig,
    gate: Mutex<()>,
    completed: AtomicU64,
    workflows: Arc<AtomicUsize>,
    signals: StdMutex<SignalState>,
    stopped: AtomicBool,
}

/// Suppresses background refreshes until dropped.
#[derive(Debug)]
pub struct WorkflowGuard {
    workflows: Arc<AtomicUsize>,
}

impl Drop for WorkflowGuard {
    fn drop(&mut self) {
        self.workflows.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ProfileSync {
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        inventory: SharedInventory,
        membership: MembershipId,
        config: SyncConfig,
    ) -> Self {
        Self {
            remote,
            inventory,
            membership,
            config,
            gate: Mutex::new(()),
            completed: AtomicU64::new(0),
            workflows: Arc::new(AtomicUsize::new(0)),
            signals: StdMutex::new(SignalState {
                hidden_since: None,
                online: true,
            }),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn inventory(&self) -> &SharedInventory {
        &self.inventory
    }

    /// Marks a workflow as running for the guard's lifetime.
    pub fn begin_workflow(&self) -> WorkflowGuard {
        self.workflows.fetch_add(1, Ordering::SeqCst);
        WorkflowGuard {
            workflows: Arc::clone(&self.workflows),
        }
    }

    pub fn workflow_active(&self) -> bool {
        self.workflows.load(Ordering::SeqCst) > 0
    }

    pub fn is_online(&self) -> bool {
        self.lock_signals().online
    }

    /// Number of refreshes that have fetched a snapshot.
    pub fn completed_refreshes(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    fn lock_signals(&self) -> std::sync::MutexGuard<'_, SignalState> {
        self.signals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Background refresh. Skipped during a workflow or while offline; joins
    /// a refresh that is already running instead of starting another.
    pub async fn refresh(&self, kind: RefreshKind) -> EngineResult<RefreshOutcome> {
        if self.workflow_active() {
            debug!("Skipping {:?} refresh: workflow in flight", kind);
            return Ok(RefreshOutcome::Skipped);
        }
        if !self.is_online() {
            debug!("Skipping {:?} refresh: offline", kind);
            return Ok(RefreshOutcome::Skipped);
        }

        let seen = self.completed.load(Ordering::SeqCst);
        let _gate = self.gate.lock().await;
        if self.completed.load(Ordering::SeqCst) != seen {
            debug!("Joined a concurrent refresh");
            return Ok(RefreshOutcome::Joined);
        }
        self.fetch_and_apply(kind).await
    }

    /// Refresh that runs even during a workflow. Waits for any refresh in
    /// flight, then fetches anew so the result post-dates the caller's
    /// last remote call.
    pub async fn force_refresh(&self, kind: RefreshKind) -> EngineResult<RefreshOutcome> {
        let _gate = self.gate.lock().await;
        self.fetch_and_apply(kind).await
    }

    async fn fetch_and_apply(&self, kind: RefreshKind) -> EngineResult<RefreshOutcome> {
        debug!("Fetching profile {} ({:?})", self.membership, kind);
        let snapshot = self
            .remote
            .fetch_profile(self.membership, kind.scope())
            .await
            .map_err(EngineError::Remote)?;
        let outcome = self.inventory.write().await.apply_snapshot(&snapshot);
        self.completed.fetch_add(1, Ordering::SeqCst);

        Ok(match outcome {
            SnapshotOutcome::Applied => RefreshOutcome::Applied,
            SnapshotOutcome::Stale => {
                warn!("Profile fetch returned a stale snapshot ({})", snapshot.minted);
                RefreshOutcome::Stale
            }
        })
    }

    /// Feeds a signal to the cadence state machine.
    pub fn decide(&self, signal: SyncSignal, now: Instant) -> SyncDecision {
        let mut state = self.lock_signals();
        match signal {
            SyncSignal::Visibility(false) => {
                state.hidden_since.get_or_insert(now);
                SyncDecision::Idle
            }
            SyncSignal::Visibility(true) => match state.hidden_since.take() {
                Some(since) => {
                    let away = now.saturating_duration_since(since);
                    if away >= self.config.long_absence() {
                        SyncDecision::Refresh(RefreshKind::Full)
                    } else if away >= self.config.short_absence() {
                        SyncDecision::Refresh(RefreshKind::Delta)
                    } else {
                        SyncDecision::Idle
                    }
                }
                None => SyncDecision::Idle,
            },
            SyncSignal::Connectivity(false) => {
                state.online = false;
                SyncDecision::Idle
            }
            SyncSignal::Connectivity(true) => {
                let was_offline = !state.online;
                state.online = true;
                if was_offline {
                    SyncDecision::Refresh(RefreshKind::Full)
                } else {
                    SyncDecision::Idle
                }
            }
            SyncSignal::Heartbeat => {
                if state.hidden_since.is_some() || !state.online {
                    SyncDecision::Idle
                } else {
                    SyncDecision::Refresh(RefreshKind::Delta)
                }
            }
        }
    }

    /// Decides on a signal and performs the resulting refresh.
    pub async fn on_signal(&self, signal: SyncSignal) -> EngineResult<RefreshOutcome> {
        match self.decide(signal, Instant::now()) {
            SyncDecision::Refresh(kind) => {
                debug!("{:?} -> {:?} refresh", signal, kind);
                self.refresh(kind).await
            }
            SyncDecision::Idle => Ok(RefreshOutcome::Skipped),
        }
    }

    /// Asks a running `run` loop to exit after its current step.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Consumes signals and heartbeats until the channel closes or `stop`
    /// is called.
    pub async fn run(self: Arc<Self>, mut signals: mpsc::Receiver<SyncSignal>) {
        let mut heartbeat = tokio::time::interval(self.config.heartbeat());
        // The first tick completes immediately.
        heartbeat.tick().await;
        info!("Profile sync started for {}", self.membership);

        loop {
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }

            let signal = tokio::select! {
                signal = signals.recv() => match signal {
                    Some(signal) => signal,
                    None => break,
                },
                _ = heartbeat.tick() => SyncSignal::Heartbeat,
            };

            if let Err(e) = self.on_signal(signal).await {
                warn!("Refresh after {:?} failed: {}", signal, e);
            }
        }

        info!("Profile sync stopped for {}", self.membership);
    }
}
