//! Loadout CLI
//!
//! Applies a saved loadout to a character, or inspects bucket capacity in a
//! profile snapshot.
//!
//! Usage:
//!   loadout-cli apply --config cfg.json --catalog catalog.json \
//!       --loadout raid.json --membership 4611686018467284386 --character 2305843009261519001
//!   loadout-cli plan-space --snapshot profile.json --catalog catalog.json \
//!       --bucket 1498876634 --store vault

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use loadout_cli::{
    load_catalog, load_json, load_template, plan_space, render_report, CliConfig, TerminalProgress,
};
use loadout_engine::remote::mock::MockRemote;
use loadout_engine::{BuildOrchestrator, CancelToken, EngineConfig, HttpRemoteApi, RemoteApi};
use loadout_types::{BucketHash, CharacterId, ItemInstanceId, MembershipId, ProfileSnapshot, StoreId};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "loadout-cli")]
#[command(about = "Apply loadouts through the inventory engine")]
struct Args {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a loadout to a character
    Apply {
        /// Engine and remote configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Item and bucket catalog (JSON)
        #[arg(long)]
        catalog: PathBuf,

        /// Loadout template (JSON)
        #[arg(long)]
        loadout: PathBuf,

        #[arg(long)]
        membership: MembershipId,

        #[arg(long)]
        character: CharacterId,

        /// API key; overrides the config file
        #[arg(long, env = "LOADOUT_API_KEY")]
        api_key: Option<String>,

        /// Bearer token; overrides the config file
        #[arg(long, env = "LOADOUT_ACCESS_TOKEN")]
        access_token: Option<String>,

        /// Run against an in-memory server seeded from this snapshot
        #[arg(long)]
        offline: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show free space in a bucket
    PlanSpace {
        /// Profile snapshot (JSON)
        #[arg(long)]
        snapshot: PathBuf,

        #[arg(long)]
        catalog: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        bucket: BucketHash,

        /// `vault` or a character id
        #[arg(long)]
        store: StoreId,

        /// Also plan room for moving this item into the store
        #[arg(long)]
        item: Option<ItemInstanceId>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    match args.command {
        Command::Apply {
            config,
            catalog,
            loadout,
            membership,
            character,
            api_key,
            access_token,
            offline,
            json,
        } => {
            let mut config = match config {
                Some(path) => CliConfig::load(&path)?,
                None => CliConfig::default(),
            };
            if let Some(key) = api_key {
                config.remote.api_key = key;
            }
            if access_token.is_some() {
                config.remote.access_token = access_token;
            }
            let catalog = Arc::new(load_catalog(&catalog)?);
            let template = load_template(&loadout)?;

            let remote: Arc<dyn RemoteApi> = match offline {
                Some(path) => {
                    let snapshot: ProfileSnapshot = load_json(&path)?;
                    if snapshot.membership_id != membership {
                        bail!(
                            "Snapshot belongs to {}, not {}",
                            snapshot.membership_id,
                            membership
                        );
                    }
                    info!("Running offline against {}", path.display());
                    Arc::new(MockRemote::new(
                        &snapshot,
                        catalog.buckets().cloned(),
                        config.engine.space.clone(),
                    ))
                }
                None => {
                    if config.remote.api_key.is_empty() {
                        warn!("No API key configured; requests will likely be rejected");
                    }
                    Arc::new(
                        HttpRemoteApi::new(config.remote.clone(), catalog.clone())
                            .context("Failed to create HTTP client")?,
                    )
                }
            };

            let engine =
                BuildOrchestrator::new(remote, catalog, membership, config.engine);
            info!("Applying '{}' to {}", template.name, character);
            let report = engine
                .apply_loadout(&template, character, &TerminalProgress, &CancelToken::new())
                .await
                .context("Loadout application failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_report(&report));
            }
            if !report.success {
                std::process::exit(2);
            }
        }

        Command::PlanSpace {
            snapshot,
            catalog,
            config,
            bucket,
            store,
            item,
        } => {
            let engine_config = match config {
                Some(path) => CliConfig::load(&path)?.engine,
                None => EngineConfig::default(),
            };
            let snapshot: ProfileSnapshot = load_json(&snapshot)?;
            let catalog = load_catalog(&catalog)?;
            let summary = plan_space(&snapshot, &catalog, &engine_config, bucket, store, item)?;

            println!(
                "{}: {} free ({} of {} used)",
                summary.store, summary.space, summary.occupancy, summary.capacity
            );
            if let Some(plan) = summary.plan {
                println!("plan: {plan}");
            }
        }
    }

    Ok(())
}
