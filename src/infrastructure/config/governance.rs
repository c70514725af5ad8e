//! `[governance]` section.

use serde::Deserialize;

use crate::application::governance::OutcomePredictor;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub poll_interval_secs: u64,
    pub snapshot_enabled: bool,
    pub snapshot_url: String,
    /// Tally is only polled when `TALLY_API_KEY` is set.
    pub tally_url: String,
    /// Nearest analogues consulted per prediction.
    pub neighbours: usize,
    pub min_analogues: usize,
    /// Distance multiplier for analogues from other protocols.
    pub cross_protocol_penalty: f64,
    pub request_timeout_ms: u64,
    /// From `TALLY_API_KEY`; never read from the file.
    #[serde(skip)]
    pub tally_api_key: Option<String>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            snapshot_enabled: true,
            snapshot_url: "https://hub.snapshot.org/graphql".into(),
            tally_url: "https://api.tally.xyz".into(),
            neighbours: 5,
            min_analogues: 3,
            cross_protocol_penalty: 0.5,
            request_timeout_ms: 10_000,
            tally_api_key: None,
        }
    }
}

impl GovernanceConfig {
    #[must_use]
    pub fn predictor(&self) -> OutcomePredictor {
        OutcomePredictor::new(self.neighbours, self.min_analogues, self.cross_protocol_penalty)
    }
}
