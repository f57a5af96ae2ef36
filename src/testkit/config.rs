//! Canonical test configurations.
//!
//! Every test config uses in-process cache nodes and short intervals so
//! loops react within milliseconds.

use std::path::Path;

use crate::config::Config;

/// Order-book contract address used by test configs and log builders.
pub const DEX_ADDRESS: &str = "0xcEE5AA84032D4a53a0F9d2c33F36701c3eAD5895";

/// Chain name used for `chain_id` in test configs.
pub fn chain_name(chain_id: u64) -> &'static str {
    match chain_id {
        1 => "eth",
        10 => "optimism",
        11_155_111 => "sepolia",
        _ => "testnet",
    }
}

/// TOML for a deployment on `chain_id` storing data in `db_path`.
///
/// One in-process cache node with the default weight, a local RPC URL
/// that is never dialed when a mock client is injected, and 10 ms poll
/// and expiry intervals.
pub fn toml(chain_id: u64, db_path: &Path) -> String {
    format!(
        r#"
[logging]
level = "debug"

[[kv.redis]]
host = "cache-0"
type = "memory"

[db]
path = "{db}"
max_connections = 4
connect_timeout_ms = 2000

[chain_cfg]
id = {chain_id}
name = "{name}"

[ankr_cfg]
https_url = "http://127.0.0.1:8545/"
api_key = ""

[project_cfg]
name = "easyswap"

[contract_cfg]
dex_address = "{DEX_ADDRESS}"

[sync]
start_block = 0
batch_size = 10
poll_interval_ms = 10

[order_manager]
expiry_check_interval_ms = 10
"#,
        db = db_path.display(),
        name = chain_name(chain_id),
    )
}

/// Parsed [`toml`] config.
pub fn config(chain_id: u64, db_path: &Path) -> Config {
    Config::parse_toml(&toml(chain_id, db_path)).expect("valid test config")
}
