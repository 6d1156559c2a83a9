//! File loading and terminal output for the loadout CLI.

use anyhow::{Context, Result};
use loadout_engine::{
    ApplyReport, EngineConfig, HttpRemoteConfig, InMemoryCatalog, InventoryStore, MoveSession,
    ProgressSink, SpaceManager, SpacePlan,
};
use loadout_types::{BucketHash, BuildTemplate, ItemInstanceId, ProfileSnapshot, StoreId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

/// Contents of the `--config` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub engine: EngineConfig,
    pub remote: HttpRemoteConfig,
}

impl CliConfig {
    /// Loads and validates the config file.
    pub fn load(path: &Path) -> Result<Self> {
        let config: CliConfig = load_json(path)?;
        config
            .engine
            .validate()
            .with_context(|| format!("Invalid engine config in {}", path.display()))?;
        Ok(config)
    }
}

/// Reads a JSON file into `T`.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_catalog(path: &Path) -> Result<InMemoryCatalog> {
    InMemoryCatalog::from_json_file(path)
        .with_context(|| format!("Failed to load catalog {}", path.display()))
}

pub fn load_template(path: &Path) -> Result<BuildTemplate> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    BuildTemplate::from_json(&raw).with_context(|| format!("Failed to parse loadout {}", path.display()))
}

/// Prints workflow progress to stderr.
#[derive(Debug, Default)]
pub struct TerminalProgress;

impl ProgressSink for TerminalProgress {
    fn report(&self, step: &str, percent: u8) {
        eprintln!("[{percent:>3}%] {step}");
    }
}

/// Human-readable summary of an application.
pub fn render_report(report: &ApplyReport) -> String {
    let mut out = String::new();
    let status = if report.success {
        "applied"
    } else if report.cancelled {
        "cancelled"
    } else {
        "incomplete"
    };
    let _ = writeln!(
        out,
        "Loadout '{}' on {}: {}",
        report.loadout, report.character, status
    );
    let _ = writeln!(out, "  equipped: {}", report.equipped.len());
    for missing in &report.missing {
        let _ = writeln!(out, "  missing {} ({:?})", missing.hash, missing.reason);
    }
    for failed in &report.failed {
        let _ = writeln!(
            out,
            "  failed {} at {:?}: {}",
            failed.item, failed.stage, failed.error
        );
    }
    let sockets = report.socket_failures.iter().map(|s| ("plug", s));
    let mods = report.mod_failures.iter().map(|s| ("mod", s));
    for (kind, socket) in sockets.chain(mods) {
        let target = socket
            .item
            .map_or_else(|| "no item".to_string(), |id| id.to_string());
        let _ = writeln!(
            out,
            "  {} {} into socket {} of {}: {}",
            kind, socket.plug, socket.socket_index, target, socket.error
        );
    }
    if report.orbit_required {
        let _ = writeln!(out, "  some items can only be equipped from orbit");
    }
    out
}

/// Capacity view of one bucket in one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpaceSummary {
    pub bucket: BucketHash,
    pub store: String,
    pub capacity: u32,
    pub occupancy: u32,
    pub space: u32,
    /// Planner output for moving `item` into the store, if one was given.
    pub plan: Option<String>,
}

/// Computes free space in `bucket` of `store`, and optionally what the
/// planner would do to make room for `item`.
pub fn plan_space(
    snapshot: &ProfileSnapshot,
    catalog: &InMemoryCatalog,
    config: &EngineConfig,
    bucket: BucketHash,
    store: StoreId,
    item: Option<ItemInstanceId>,
) -> Result<SpaceSummary> {
    let inventory = InventoryStore::from_snapshot(snapshot);
    let protected = HashSet::new();
    let space = SpaceManager::new(&inventory, catalog, &config.space, &protected);
    let session = MoveSession::new(0);

    let plan = match item {
        None => None,
        Some(id) => {
            let (instance, location) = inventory
                .entry(id)
                .with_context(|| format!("Item {id} is not in the snapshot"))?;
            let plan = match space.plan_space(instance, location.store, store, 1, &session) {
                SpacePlan::Ready => "ready".to_string(),
                SpacePlan::Relocate(r) => {
                    format!("move {} from {} to {} first", r.item, r.from, r.to)
                }
                SpacePlan::Blocked { store, bucket } => {
                    format!("blocked: no room in bucket {bucket} of {store}")
                }
            };
            Some(plan)
        }
    };

    Ok(SpaceSummary {
        bucket,
        store: store.to_string(),
        capacity: space.capacity(bucket, store),
        occupancy: space.occupancy(bucket, store),
        space: space.space_in_bucket(bucket, store, &session),
        plan,
    })
}
