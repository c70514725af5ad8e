//! `[market]` and `[distribution]` sections.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub coingecko_url: String,
    pub defillama_url: String,
    /// CoinGecko id of the asset used as the broad-market index.
    pub index_asset: String,
    pub request_timeout_ms: u64,
    /// From `COINGECKO_API_KEY`; never read from the file.
    #[serde(skip)]
    pub coingecko_api_key: Option<String>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            coingecko_url: "https://api.coingecko.com/api/v3".into(),
            defillama_url: "https://api.llama.fi".into(),
            index_asset: "bitcoin".into(),
            request_timeout_ms: 10_000,
            coingecko_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Queue depth per subscriber before it is dropped.
    pub subscriber_buffer: usize,
    /// Events kept for pull snapshots.
    pub recent_events: usize,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 256,
            recent_events: 100,
        }
    }
}
