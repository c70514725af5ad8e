//! `[risk]` and `[guidance]` sections.

use chrono::Duration;
use serde::Deserialize;

use crate::application::guidance::GuidanceSettings;
use crate::application::risk::scoring::ScoringSettings;
use crate::application::risk::RidgeRegression;
use crate::application::sentiment::SentimentAnalyzer;
use crate::domain::risk::RiskWeights;
use crate::error::ConfigError;

/// Longest configurable window, in hours.
pub const MAX_WINDOW_HOURS: i64 = 24 * 366;
/// Longest price and TVL history, in days.
pub const MAX_LOOKBACK_DAYS: u32 = 365;

/// `hours` as a duration in `1..=MAX_WINDOW_HOURS`.
///
/// # Errors
///
/// [`ConfigError::InvalidValue`] when out of range.
pub fn window_hours(field: &'static str, hours: i64) -> Result<Duration, ConfigError> {
    if !(1..=MAX_WINDOW_HOURS).contains(&hours) {
        return Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be between 1 and {MAX_WINDOW_HOURS} hours"),
        });
    }
    Duration::try_hours(hours).ok_or_else(|| ConfigError::InvalidValue {
        field,
        reason: "out of range".into(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    pub technical: f64,
    pub governance: f64,
    pub market: f64,
    pub liquidity: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            technical: 0.25,
            governance: 0.25,
            market: 0.25,
            liquidity: 0.25,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub weights: WeightsConfig,
    pub model_version: String,
    /// Days of price and TVL history per assessment.
    pub lookback_days: u32,
    pub sentiment_window_hours: i64,
    pub sentiment_alert_threshold: f64,
    pub complexity_bytes: f64,
    pub volatility_ceiling: f64,
    pub tvl_volatility_ceiling: f64,
    /// Score overall risk with a ridge regression fitted on past
    /// assessments instead of the weighted sum.
    pub learned_model: bool,
    pub training_min_samples: usize,
    pub training_window: usize,
    pub ridge_penalty: f64,
    pub retrain_interval_secs: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            weights: WeightsConfig::default(),
            model_version: concat!("upwatch-", env!("CARGO_PKG_VERSION")).into(),
            lookback_days: 30,
            sentiment_window_hours: 24,
            sentiment_alert_threshold: 0.6,
            complexity_bytes: 4_096.0,
            volatility_ceiling: 1.5,
            tvl_volatility_ceiling: 0.1,
            learned_model: false,
            training_min_samples: 50,
            training_window: 1_000,
            ridge_penalty: 1.0,
            retrain_interval_secs: 3_600,
        }
    }
}

impl RiskConfig {
    /// The overall-score model, when enabled.
    #[must_use]
    pub fn risk_model(&self) -> Option<RidgeRegression> {
        self.learned_model.then_some(RidgeRegression {
            min_samples: self.training_min_samples,
            penalty: self.ridge_penalty,
        })
    }

    /// # Errors
    ///
    /// [`ConfigError::InvalidWeights`] unless the weights are finite,
    /// non-negative and sum to 1.
    pub fn weights(&self) -> Result<RiskWeights, ConfigError> {
        let w = self.weights;
        RiskWeights::new(w.technical, w.governance, w.market, w.liquidity)
            .map_err(ConfigError::InvalidWeights)
    }

    #[must_use]
    pub fn scoring(&self) -> ScoringSettings {
        ScoringSettings {
            complexity_bytes: self.complexity_bytes,
            volatility_ceiling: self.volatility_ceiling,
            tvl_volatility_ceiling: self.tvl_volatility_ceiling,
        }
    }

    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] if the window is out of range.
    pub fn sentiment(&self) -> Result<SentimentAnalyzer, ConfigError> {
        let window = window_hours("risk.sentiment_window_hours", self.sentiment_window_hours)?;
        Ok(SentimentAnalyzer::new(window, self.sentiment_alert_threshold))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    pub nominal_window_hours: i64,
    pub elevated_window_hours: i64,
    pub critical_window_hours: i64,
    pub stop_loss_multiplier: f64,
    pub min_stop_loss: f64,
    pub default_stop_loss: f64,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        let defaults = GuidanceSettings::default();
        Self {
            nominal_window_hours: defaults.nominal_window.num_hours(),
            elevated_window_hours: defaults.elevated_window.num_hours(),
            critical_window_hours: defaults.critical_window.num_hours(),
            stop_loss_multiplier: defaults.stop_loss_multiplier,
            min_stop_loss: defaults.min_stop_loss,
            default_stop_loss: defaults.default_stop_loss,
        }
    }
}

impl GuidanceConfig {
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] if a window is out of range.
    pub fn settings(&self) -> Result<GuidanceSettings, ConfigError> {
        Ok(GuidanceSettings {
            nominal_window: window_hours("guidance.nominal_window_hours", self.nominal_window_hours)?,
            elevated_window: window_hours("guidance.elevated_window_hours", self.elevated_window_hours)?,
            critical_window: window_hours("guidance.critical_window_hours", self.critical_window_hours)?,
            stop_loss_multiplier: self.stop_loss_multiplier,
            min_stop_loss: self.min_stop_loss,
            default_stop_loss: self.default_stop_loss,
            ..GuidanceSettings::default()
        })
    }
}
