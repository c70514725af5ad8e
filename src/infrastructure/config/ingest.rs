//! `[ingest]` section: polling, retry and liveness thresholds.

use std::collections::HashMap;
use std::time::Duration;

use alloy_primitives::B256;
use serde::Deserialize;

use super::network::NetworkConfig;
use crate::application::ingest::{ConnectorSettings, RetryPolicy};
use crate::domain::event::EventKind;
use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub poll_interval_ms: u64,
    pub batch_size: u64,
    pub confirmations: u64,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Consecutive failed polls before a network is `stale`.
    pub stale_after: u32,
    /// Consecutive failed polls before a network is `down`.
    pub down_after: u32,
    pub trigger_capacity: usize,
    pub rpc_timeout_ms: u64,
    /// Extra topic-0 signatures, e.g. `"0xabc..." = "parameter_change"`.
    pub signatures: HashMap<String, EventKind>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 12_000,
            batch_size: 500,
            confirmations: 2,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            stale_after: 5,
            down_after: 15,
            trigger_capacity: 256,
            rpc_timeout_ms: 10_000,
            signatures: HashMap::new(),
        }
    }
}

impl IngestConfig {
    /// Configured signatures as topic hashes.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is not a 32-byte hex topic.
    pub fn signature_table(&self) -> Result<Vec<(B256, EventKind)>, ConfigError> {
        self.signatures
            .iter()
            .map(|(topic, kind)| {
                topic
                    .parse::<B256>()
                    .map(|hash| (hash, *kind))
                    .map_err(|e| ConfigError::InvalidValue {
                        field: "ingest.signatures",
                        reason: format!("{topic}: {e}"),
                    })
            })
            .collect()
    }

    #[must_use]
    pub fn connector_settings(&self, network: &NetworkConfig) -> ConnectorSettings {
        ConnectorSettings {
            confirmations: network.confirmations.unwrap_or(self.confirmations),
            batch_size: self.batch_size,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            retry: RetryPolicy {
                initial_delay_ms: self.initial_delay_ms,
                max_delay_ms: self.max_delay_ms,
                backoff_multiplier: self.backoff_multiplier,
            },
            stale_after: self.stale_after,
            down_after: self.down_after,
            start_block: network.start_block,
        }
    }
}
