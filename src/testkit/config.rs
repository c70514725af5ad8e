//! Canonical test configurations.
//!
//! Single source of truth for config structs used across tests.

use std::time::Duration;

use crate::application::ingest::{ConnectorSettings, RetryPolicy};
use crate::infrastructure::config::settings::{Config, StorageConfig};

/// Address of the `aave` protocol contract in [`config`].
pub const AAVE_ADDRESS: &str = "0x00000000000000000000000000000000000000aa";

/// Address of the `comp` protocol contract in [`config`].
pub const COMP_ADDRESS: &str = "0x00000000000000000000000000000000000000cc";

/// Two networks, one protocol each, memory storage.
pub const TOML: &str = r#"
storage = { backend = "memory" }

[logging]
level = "warn"

[[networks]]
id = "ethereum"
rpc_url = "http://127.0.0.1:8545"

[[networks]]
id = "arbitrum"
rpc_url = "http://127.0.0.1:8546"

[[protocols]]
id = "aave"
network = "ethereum"
addresses = ["0x00000000000000000000000000000000000000AA"]
security_incidents = 1
related = ["comp"]
snapshot_space = "aave.eth"

[[protocols]]
id = "comp"
network = "arbitrum"
addresses = ["0x00000000000000000000000000000000000000cc"]
tally_organization = "compound"

[ingest]
poll_interval_ms = 10
initial_delay_ms = 1
max_delay_ms = 1
confirmations = 0

[governance]
poll_interval_secs = 1
"#;

/// Parsed [`TOML`].
pub fn config() -> Config {
    Config::parse_toml(TOML).expect("canonical test config parses")
}

/// Parsed [`TOML`] with SQLite storage at `path`.
pub fn sqlite_config(path: &std::path::Path) -> Config {
    let mut config = config();
    config.storage = StorageConfig::Sqlite {
        path: path.to_path_buf(),
    };
    config
}

/// Zero-confirmation connector that never sleeps between retries.
pub fn connector() -> ConnectorSettings {
    ConnectorSettings {
        confirmations: 0,
        batch_size: 100,
        poll_interval: Duration::from_millis(5),
        retry: RetryPolicy {
            initial_delay_ms: 1,
            max_delay_ms: 1,
            backoff_multiplier: 1.0,
        },
        stale_after: 5,
        down_after: 15,
        start_block: Some(1),
    }
}
