//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings. The
//! file is TOML; upstream API keys come from the environment
//! (`TALLY_API_KEY`, `COINGECKO_API_KEY`) and never from the file.
//!
//! # Example
//!
//! ```no_run
//! use upwatch::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use super::forecast::ForecastConfig;
use super::governance::GovernanceConfig;
use super::ingest::IngestConfig;
use super::logging::LoggingConfig;
use super::market::{DistributionConfig, MarketConfig};
use super::network::{NetworkConfig, ProtocolConfig};
use super::risk::{GuidanceConfig, RiskConfig, MAX_LOOKBACK_DAYS};
use crate::domain::id::ProtocolId;
use crate::error::{ConfigError, Result};

/// Where entities are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    Memory,
    Sqlite { path: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("upwatch.db"),
        }
    }
}

/// Main application configuration.
///
/// Load from a TOML file using [`Config::load`] or parse directly with
/// [`Config::parse_toml`]. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub networks: Vec<NetworkConfig>,
    pub protocols: Vec<ProtocolConfig>,
    pub ingest: IngestConfig,
    pub governance: GovernanceConfig,
    pub risk: RiskConfig,
    pub forecast: ForecastConfig,
    pub guidance: GuidanceConfig,
    pub distribution: DistributionConfig,
    pub market: MarketConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Parse and validate TOML content, then pick up API keys from the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.governance.tally_api_key = non_empty_env("TALLY_API_KEY");
        config.market.coingecko_api_key = non_empty_env("COINGECKO_API_KEY");
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML is malformed,
    /// or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    pub fn init_logging(&self) {
        self.logging.init();
    }

    /// Governance space or organization → protocol.
    #[must_use]
    pub fn governance_spaces(&self) -> HashMap<String, ProtocolId> {
        let mut spaces = HashMap::new();
        for p in &self.protocols {
            for space in [&p.snapshot_space, &p.tally_organization].into_iter().flatten() {
                spaces.insert(space.clone(), ProtocolId::new(p.id.clone()));
            }
        }
        spaces
    }

    /// Check every value that would otherwise fail at request time.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        self.validate_topology()?;
        self.risk.weights()?;

        let ingest = &self.ingest;
        if ingest.initial_delay_ms == 0 {
            return Err(invalid("ingest.initial_delay_ms", "must be greater than 0"));
        }
        if ingest.max_delay_ms < ingest.initial_delay_ms {
            return Err(invalid("ingest.max_delay_ms", "must be >= initial_delay_ms"));
        }
        if ingest.backoff_multiplier < 1.0 {
            return Err(invalid("ingest.backoff_multiplier", "must be >= 1.0"));
        }
        if ingest.stale_after == 0 {
            return Err(invalid("ingest.stale_after", "must be greater than 0"));
        }
        if ingest.down_after < ingest.stale_after {
            return Err(invalid("ingest.down_after", "must be >= stale_after"));
        }
        if ingest.batch_size == 0 || ingest.trigger_capacity == 0 {
            return Err(invalid("ingest", "batch_size and trigger_capacity must be greater than 0"));
        }
        ingest.signature_table()?;

        let forecast = &self.forecast;
        if !(forecast.confidence > 0.0 && forecast.confidence < 1.0) {
            return Err(invalid("forecast.confidence", "must be in (0, 1)"));
        }
        if forecast.min_observations < 10 {
            return Err(invalid("forecast.min_observations", "must be at least 10"));
        }
        if forecast.horizon == 0 {
            return Err(invalid("forecast.horizon", "must be greater than 0"));
        }
        if forecast.fit_timeout_ms == 0 {
            return Err(invalid("forecast.fit_timeout_ms", "must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&forecast.correlation_threshold) {
            return Err(invalid("forecast.correlation_threshold", "must be in [0, 1]"));
        }
        if forecast.regime_window < 2 || forecast.liquidity_fallback_window < 2 {
            return Err(invalid("forecast", "regime and fallback windows need at least 2 points"));
        }
        if !(1..=MAX_LOOKBACK_DAYS).contains(&forecast.impact_window_days) {
            return Err(invalid(
                "forecast.impact_window_days",
                format!("must be between 1 and {MAX_LOOKBACK_DAYS}"),
            ));
        }
        if !(1..=MAX_LOOKBACK_DAYS).contains(&forecast.evaluation_days) {
            return Err(invalid(
                "forecast.evaluation_days",
                format!("must be between 1 and {MAX_LOOKBACK_DAYS}"),
            ));
        }

        if !(self.risk.sentiment_alert_threshold > 0.0 && self.risk.sentiment_alert_threshold <= 1.0) {
            return Err(invalid("risk.sentiment_alert_threshold", "must be in (0, 1]"));
        }
        self.risk.sentiment()?;
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.risk.lookback_days) {
            return Err(invalid(
                "risk.lookback_days",
                format!("must be between 1 and {MAX_LOOKBACK_DAYS}"),
            ));
        }

        let risk = &self.risk;
        if risk.learned_model {
            if risk.training_min_samples < 5 {
                return Err(invalid("risk.training_min_samples", "must be at least 5"));
            }
            if risk.training_window < risk.training_min_samples {
                return Err(invalid("risk.training_window", "must be >= training_min_samples"));
            }
            if !(risk.ridge_penalty.is_finite() && risk.ridge_penalty > 0.0) {
                return Err(invalid("risk.ridge_penalty", "must be greater than 0"));
            }
            if risk.retrain_interval_secs == 0 {
                return Err(invalid("risk.retrain_interval_secs", "must be greater than 0"));
            }
        }

        let g = &self.guidance;
        g.settings()?;
        if !(g.critical_window_hours <= g.elevated_window_hours
            && g.elevated_window_hours <= g.nominal_window_hours)
        {
            return Err(invalid(
                "guidance",
                "windows must be positive and ordered critical <= elevated <= nominal",
            ));
        }
        if g.min_stop_loss <= 0.0 || g.stop_loss_multiplier <= 0.0 {
            return Err(invalid("guidance", "stop-loss settings must be greater than 0"));
        }

        if self.distribution.subscriber_buffer == 0 {
            return Err(invalid("distribution.subscriber_buffer", "must be greater than 0"));
        }
        if let StorageConfig::Sqlite { path } = &self.storage {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::MissingField { field: "storage.path" }.into());
            }
        }
        Ok(())
    }

    fn validate_topology(&self) -> Result<()> {
        let mut networks = HashSet::new();
        for n in &self.networks {
            if n.id.is_empty() {
                return Err(ConfigError::MissingField { field: "networks.id" }.into());
            }
            if !networks.insert(n.id.as_str()) {
                return Err(invalid("networks.id", format!("duplicate network {}", n.id)));
            }
            Url::parse(&n.rpc_url)
                .map_err(|e| invalid("networks.rpc_url", format!("{}: {e}", n.id)))?;
        }
        let mut protocols = HashSet::new();
        for p in &self.protocols {
            if !protocols.insert(p.id.as_str()) {
                return Err(invalid("protocols.id", format!("duplicate protocol {}", p.id)));
            }
            if p.id.contains(':') {
                return Err(invalid("protocols.id", format!("{} must not contain ':'", p.id)));
            }
            if !networks.contains(p.network.as_str()) {
                return Err(invalid(
                    "protocols.network",
                    format!("{} references unknown network {}", p.id, p.network),
                ));
            }
            if p.addresses.is_empty() {
                return Err(invalid("protocols.addresses", format!("{} has no addresses", p.id)));
            }
            if p.holder_concentration.is_some_and(|c| !(0.0..=1.0).contains(&c)) {
                return Err(invalid(
                    "protocols.holder_concentration",
                    format!("{} must be in [0, 1]", p.id),
                ));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
    .into()
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
