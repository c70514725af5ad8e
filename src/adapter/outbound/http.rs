//! Shared HTTP client construction for upstream adapters.

use std::time::Duration;

use reqwest::Client;
use tracing::warn;

/// Build a client with the given request timeout, falling back to defaults
/// if the builder fails.
#[must_use]
pub fn client(timeout_ms: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .connect_timeout(Duration::from_millis(timeout_ms.min(5_000)))
        .build()
        .unwrap_or_else(|err| {
            warn!(error = %err, "Failed to build HTTP client, using defaults");
            Client::new()
        })
}
