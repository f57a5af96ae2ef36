//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file. The RPC API key may be supplied
//! through the `ANKR_API_KEY` environment variable instead of the file.
//!
//! # Example
//!
//! ```no_run
//! use easyswap_sync::config::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

mod logging;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::Address;
use serde::Deserialize;

use crate::chain::ChainIdentity;
use crate::domain::ProjectScope;
use crate::error::{ConfigError, Result};
use crate::kv::{NodeConf, MAX_NODE_WEIGHT};

pub use logging::{LogFormat, LoggingConfig};

/// Environment variable that overrides `ankr_cfg.api_key`.
pub const ANKR_API_KEY_ENV: &str = "ANKR_API_KEY";

/// Cache cluster topology.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KvConfig {
    /// Cache nodes; each key is dispatched to exactly one of them.
    #[serde(default)]
    pub redis: Vec<NodeConf>,
}

/// Relational store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long construction waits for the first connection.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_db_path() -> String {
    "easyswap-sync.db".into()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl DbConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Chain identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub id: u64,
    pub name: String,
}

/// RPC provider endpoint. The full URL is `https_url` followed by `api_key`.
#[derive(Clone, Deserialize)]
pub struct AnkrConfig {
    pub https_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl fmt::Debug for AnkrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnkrConfig")
            .field("https_url", &self.https_url)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "****" })
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

/// Deployed marketplace contracts.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractConfig {
    /// Order-book contract whose events are indexed.
    pub dex_address: String,
    #[serde(default)]
    pub vault_address: String,
}

impl ContractConfig {
    /// Parse the order-book contract address.
    pub fn dex_address(&self) -> Result<Address> {
        Address::from_str(self.dex_address.trim()).map_err(|e| {
            ConfigError::InvalidValue {
                field: "contract_cfg.dex_address",
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Order-book indexer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// First block to index when no progress has been stored yet.
    #[serde(default)]
    pub start_block: u64,
    /// Maximum number of blocks fetched per log query.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    /// Pause between polls once the indexer has caught up.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Track collections first seen on chain instead of dropping their events.
    #[serde(default)]
    pub auto_track_collections: bool,
}

fn default_batch_size() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

impl SyncConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_block: 0,
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
            auto_track_collections: false,
        }
    }
}

/// Order manager settings.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderManagerConfig {
    #[serde(default = "default_expiry_check_interval_ms")]
    pub expiry_check_interval_ms: u64,
    /// Capacity of the indexer → order manager event queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_expiry_check_interval_ms() -> u64 {
    10_000
}

fn default_queue_capacity() -> usize {
    1024
}

impl OrderManagerConfig {
    #[must_use]
    pub fn expiry_check_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_check_interval_ms)
    }
}

impl Default for OrderManagerConfig {
    fn default() -> Self {
        Self {
            expiry_check_interval_ms: default_expiry_check_interval_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub kv: KvConfig,
    #[serde(default)]
    pub db: DbConfig,
    pub chain_cfg: ChainConfig,
    pub ankr_cfg: AnkrConfig,
    pub project_cfg: ProjectConfig,
    pub contract_cfg: ContractConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub order_manager: OrderManagerConfig,
}

impl Config {
    /// Load configuration from a TOML file, applying environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;

        let mut config: Self = toml::from_str(&content).map_err(ConfigError::Parse)?;

        if let Ok(api_key) = std::env::var(ANKR_API_KEY_ENV) {
            config.ankr_cfg.api_key = api_key;
        }

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a TOML string. No environment overrides.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the service relies on at construction time.
    pub fn validate(&self) -> Result<()> {
        if self.kv.redis.is_empty() {
            return Err(ConfigError::MissingField { field: "kv.redis" }.into());
        }
        if let Some(node) = self
            .kv
            .redis
            .iter()
            .find(|n| !(1..=MAX_NODE_WEIGHT).contains(&n.weight))
        {
            return Err(ConfigError::InvalidValue {
                field: "kv.redis.weight",
                reason: format!(
                    "node {} has weight {}, expected 1..={MAX_NODE_WEIGHT}",
                    node.host, node.weight
                ),
            }
            .into());
        }
        if self.chain_cfg.name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "chain_cfg.name",
            }
            .into());
        }
        if self.project_cfg.name.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "project_cfg.name",
            }
            .into());
        }
        if self.ankr_cfg.https_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "ankr_cfg.https_url",
            }
            .into());
        }
        self.contract_cfg.dex_address()?;
        if self.sync.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sync.batch_size",
                reason: "must be greater than zero".into(),
            }
            .into());
        }
        if self.sync.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sync.poll_interval_ms",
                reason: "must be greater than zero".into(),
            }
            .into());
        }
        if self.order_manager.expiry_check_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "order_manager.expiry_check_interval_ms",
                reason: "must be greater than zero".into(),
            }
            .into());
        }
        if self.order_manager.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "order_manager.queue_capacity",
                reason: "must be greater than zero".into(),
            }
            .into());
        }
        Ok(())
    }

    /// The (chain, project) scope this deployment operates in.
    #[must_use]
    pub fn scope(&self) -> ProjectScope {
        ProjectScope::new(self.chain_cfg.name.clone(), self.project_cfg.name.clone())
    }

    /// The configured chain identity.
    #[must_use]
    pub fn chain(&self) -> ChainIdentity {
        ChainIdentity::new(self.chain_cfg.id, self.chain_cfg.name.clone())
    }

    /// Initialize logging with the configured settings. A subscriber that
    /// is already installed is left in place.
    pub fn init_logging(&self) {
        if !self.logging.init() {
            tracing::debug!("Tracing subscriber already installed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::kv::NodeKind;

    const MINIMAL: &str = r#"
[[kv.redis]]
host = "127.0.0.1:6379"
type = "node"

[chain_cfg]
id = 11155111
name = "sepolia"

[ankr_cfg]
https_url = "https://rpc.ankr.com/eth_sepolia/"

[project_cfg]
name = "easyswap"

[contract_cfg]
dex_address = "0xcEE5AA84032D4a53a0F9d2c33F36701c3eAD5895"
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::parse_toml(MINIMAL).unwrap();
        assert_eq!(config.kv.redis.len(), 1);
        assert_eq!(config.kv.redis[0].kind, NodeKind::Node);
        assert_eq!(config.kv.redis[0].weight, crate::kv::DEFAULT_NODE_WEIGHT);
        assert_eq!(config.db.max_connections, 5);
        assert_eq!(config.sync.batch_size, 10);
        assert!(!config.sync.auto_track_collections);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.scope(), ProjectScope::new("sepolia", "easyswap"));
        assert_eq!(config.chain().id, 11155111);
    }

    #[test]
    fn rejects_missing_cache_nodes() {
        let toml = MINIMAL.replace(
            "[[kv.redis]]\nhost = \"127.0.0.1:6379\"\ntype = \"node\"\n",
            "[kv]\n",
        );
        let err = Config::parse_toml(&toml).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingField { field: "kv.redis" })
        ));
    }

    #[test]
    fn absent_kv_section_reports_missing_cache_nodes() {
        let toml = MINIMAL.replace(
            "[[kv.redis]]\nhost = \"127.0.0.1:6379\"\ntype = \"node\"\n",
            "",
        );
        assert!(!toml.contains("kv"));
        let err = Config::parse_toml(&toml).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingField { field: "kv.redis" })
        ));
    }

    #[test]
    fn rejects_invalid_dex_address() {
        let toml = MINIMAL.replace(
            "0xcEE5AA84032D4a53a0F9d2c33F36701c3eAD5895",
            "not-an-address",
        );
        let err = Config::parse_toml(&toml).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "contract_cfg.dex_address",
                ..
            })
        ));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let toml = format!("{MINIMAL}\n[sync]\nbatch_size = 0\n");
        let err = Config::parse_toml(&toml).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "sync.batch_size",
                ..
            })
        ));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let ankr = AnkrConfig {
            https_url: "https://rpc.ankr.com/eth/".into(),
            api_key: "super-secret".into(),
        };
        let rendered = format!("{ankr:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("****"));
    }
}
