//! Simulator configuration file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use accrue_types::BudgetMode;

/// Complete simulator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Scenario file, used when none is given on the command line.
    #[serde(default)]
    pub scenario: String,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Event bus settings.
    #[serde(default)]
    pub events: EventsConfig,
    /// In-memory tokens and their initial holdings.
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    /// Pools created before the scenario runs.
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace" | "debug" | "info" | "warn" | "error". `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path. Empty = in-memory.
    #[serde(default)]
    pub db_path: String,
}

/// Event bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Broadcast buffer size.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

/// An in-memory token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub name: String,
    /// Initial balances by holder.
    #[serde(default)]
    pub balances: BTreeMap<String, u64>,
}

/// A pool to create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub id: String,
    pub stake_token: String,
    pub reward_token: String,
    #[serde(default)]
    pub emission_rate: u64,
    #[serde(default)]
    pub budget_mode: BudgetMode,
    /// Clock time at which the pool is created.
    #[serde(default)]
    pub start_time: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_capacity() -> usize {
    1000
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl SimConfig {
    /// Load configuration from `path`, or from `$ACCRUE_CONFIG` when no path
    /// is given.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = path.or_else(|| std::env::var("ACCRUE_CONFIG").ok().map(PathBuf::from));
        let config = match config_path {
            Some(p) if p.exists() => Self::from_toml(&std::fs::read_to_string(&p)?)?,
            _ => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check that names are unique and pools reference known tokens.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut tokens = BTreeSet::new();
        for token in &self.tokens {
            if !tokens.insert(token.name.as_str()) {
                anyhow::bail!("duplicate token '{}'", token.name);
            }
        }

        let mut pools = BTreeSet::new();
        for pool in &self.pools {
            if !pools.insert(pool.id.as_str()) {
                anyhow::bail!("duplicate pool '{}'", pool.id);
            }
            for token in [&pool.stake_token, &pool.reward_token] {
                if !tokens.contains(token.as_str()) {
                    anyhow::bail!("pool '{}' references unknown token '{}'", pool.id, token);
                }
            }
        }

        if self.events.capacity == 0 {
            anyhow::bail!("events.capacity must be positive");
        }
        Ok(())
    }

    /// Database path, or `None` for an in-memory database.
    pub fn db_path(&self) -> Option<&Path> {
        if self.storage.db_path.is_empty() {
            None
        } else {
            Some(Path::new(&self.storage.db_path))
        }
    }
}
