//! Engine configuration.
//!
//! All timings are plain milliseconds/seconds so a config file stays readable.
//! Every field has a default; a JSON file only needs the values it overrides.

use crate::error::{EngineError, EngineResult};
use loadout_types::VaultPool;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry: RetryConfig,
    pub settle: SettleConfig,
    pub space: SpaceConfig,
    pub sync: SyncConfig,
}

impl EngineConfig {
    /// Loads configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make the engine loop or never act.
    pub fn validate(&self) -> EngineResult<()> {
        if self.space.move_aside_max_depth == 0 {
            return Err(EngineError::Config(
                "space.move_aside_max_depth must be at least 1".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(EngineError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        if self.sync.short_absence_secs > self.sync.long_absence_secs {
            return Err(EngineError::Config(
                "sync.short_absence_secs must not exceed sync.long_absence_secs".into(),
            ));
        }
        Ok(())
    }
}

/// Retry policy for retryable remote failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 2000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based), scaled and capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay_ms.saturating_mul(u64::from(attempt.max(1)));
        Duration::from_millis(scaled.min(self.max_delay_ms))
    }
}

/// Fixed waits that let the remote store settle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Wait before re-fetching after an ambiguous failure.
    pub ghost_settle_ms: u64,
    /// Wait before the single retry that follows a mismatch.
    pub ghost_second_settle_ms: u64,
    /// Wait between consecutive loadout moves.
    pub between_moves_ms: u64,
    /// Wait after a subclass swap before configuring its sockets.
    pub subclass_settle_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            ghost_settle_ms: 1500,
            ghost_second_settle_ms: 3000,
            between_moves_ms: 250,
            subclass_settle_ms: 2000,
        }
    }
}

impl SettleConfig {
    pub fn ghost_settle(&self) -> Duration {
        Duration::from_millis(self.ghost_settle_ms)
    }

    pub fn ghost_second_settle(&self) -> Duration {
        Duration::from_millis(self.ghost_second_settle_ms)
    }

    pub fn between_moves(&self) -> Duration {
        Duration::from_millis(self.between_moves_ms)
    }

    pub fn subclass_settle(&self) -> Duration {
        Duration::from_millis(self.subclass_settle_ms)
    }
}

/// Capacity accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Slots held back in equippable and stackable buckets.
    pub safety_margin: u32,
    pub move_aside_max_depth: usize,
    pub vault_general_capacity: u32,
    pub vault_consumables_capacity: u32,
    pub vault_modifications_capacity: u32,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            safety_margin: 1,
            move_aside_max_depth: 10,
            vault_general_capacity: 600,
            vault_consumables_capacity: 50,
            vault_modifications_capacity: 50,
        }
    }
}

impl SpaceConfig {
    /// Raw vault capacity of a pool.
    pub fn vault_capacity(&self, pool: VaultPool) -> u32 {
        match pool {
            VaultPool::General => self.vault_general_capacity,
            VaultPool::Consumables => self.vault_consumables_capacity,
            VaultPool::Modifications => self.vault_modifications_capacity,
        }
    }
}

/// Profile refresh cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Hidden at least this long: full refresh on return.
    pub long_absence_secs: u64,
    /// Hidden at least this long: delta refresh on return.
    pub short_absence_secs: u64,
    pub heartbeat_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            long_absence_secs: 600,
            short_absence_secs: 30,
            heartbeat_secs: 300,
        }
    }
}

impl SyncConfig {
    pub fn long_absence(&self) -> Duration {
        Duration::from_secs(self.long_absence_secs)
    }

    pub fn short_absence(&self) -> Duration {
        Duration::from_secs(self.short_absence_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}
