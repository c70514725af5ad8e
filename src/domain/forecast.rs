//! Volatility and liquidity forecast records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ProtocolId;

/// Model that actually produced a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastModel {
    Garch,
    Egarch,
    Arima,
    Fallback,
}

impl ForecastModel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Garch => "garch",
            Self::Egarch => "egarch",
            Self::Arima => "arima",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ForecastModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed interval around a point forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub low: f64,
    pub high: f64,
    /// Two-sided level, e.g. 0.95.
    pub level: f64,
}

impl ConfidenceInterval {
    /// `point ± z·se`, with `low` optionally clamped at `floor`.
    #[must_use]
    pub fn around(point: f64, z: f64, se: f64, level: f64, floor: Option<f64>) -> Self {
        let half = (z * se).abs();
        let mut low = point - half;
        if let Some(floor) = floor {
            low = low.max(floor);
        }
        Self {
            low: low.min(point),
            high: point + half,
            level,
        }
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }
}

/// Outcome of the unit-root test run before fitting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationarityResult {
    /// `None` when the series was too short to test.
    pub statistic: Option<f64>,
    pub critical_value: Option<f64>,
    pub stationary: bool,
    /// Differencing applied before the series tested stationary.
    pub differences: u8,
}

impl StationarityResult {
    /// Placeholder for series too short to test.
    #[must_use]
    pub const fn untested() -> Self {
        Self {
            statistic: None,
            critical_value: None,
            stationary: false,
            differences: 0,
        }
    }
}

/// Named fitted parameter, e.g. `alpha = 0.08`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameter {
    pub name: String,
    pub value: f64,
}

impl ModelParameter {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Annualized volatility forecast for one protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityForecast {
    pub protocol: ProtocolId,
    pub model: ForecastModel,
    /// Annualized volatility as a fraction (0.8 = 80%).
    pub point: f64,
    pub interval: ConfidenceInterval,
    /// Steps ahead, in observation periods.
    pub horizon: u32,
    pub stationarity: StationarityResult,
    pub parameters: Vec<ModelParameter>,
    pub observations: usize,
    pub degraded: bool,
    /// Timestamp of the last input observation.
    pub series_end: Option<DateTime<Utc>>,
    pub computed_at: DateTime<Utc>,
}

impl VolatilityForecast {
    /// Per-period volatility over the forecast horizon.
    #[must_use]
    pub fn horizon_sigma(&self, periods_per_year: f64) -> f64 {
        self.point * (f64::from(self.horizon.max(1)) / periods_per_year).sqrt()
    }
}

/// Liquidity regime of the recent TVL trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiquidityRegime {
    Accumulation,
    Distribution,
    Stable,
}

/// Related protocol whose TVL moves with the forecast one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedSource {
    pub protocol: ProtocolId,
    pub correlation: f64,
}

/// TVL forecast for one protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityForecast {
    pub protocol: ProtocolId,
    pub model: ForecastModel,
    /// Forecast TVL at the horizon.
    pub point: f64,
    pub interval: ConfidenceInterval,
    pub horizon: u32,
    pub stationarity: StationarityResult,
    /// `(p, d, q)` when ARIMA produced the result.
    pub order: Option<(u8, u8, u8)>,
    pub current_tvl: f64,
    pub predicted_change_pct: f64,
    pub regime: LiquidityRegime,
    pub correlated_sources: Vec<CorrelatedSource>,
    pub degraded: bool,
    pub series_end: Option<DateTime<Utc>>,
    pub computed_at: DateTime<Utc>,
}

/// Direction of an estimated cross-protocol TVL flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowDirection {
    /// Liquidity moves toward the target protocol.
    Inflow,
    Outflow,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEstimate {
    pub source: ProtocolId,
    pub target: ProtocolId,
    pub direction: FlowDirection,
    /// Absolute TVL expected to move.
    pub magnitude: f64,
}

/// Change in realized volatility between two windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityShift {
    HighVolatilityRegime,
    ModerateIncrease,
    LowVolatilityRegime,
    ModerateDecrease,
    Stable,
}

impl VolatilityShift {
    /// Classify a relative change (`0.5` = +50%).
    #[must_use]
    pub fn from_change(change: f64) -> Self {
        if change > 0.5 {
            Self::HighVolatilityRegime
        } else if change > 0.1 {
            Self::ModerateIncrease
        } else if change < -0.5 {
            Self::LowVolatilityRegime
        } else if change < -0.1 {
            Self::ModerateDecrease
        } else {
            Self::Stable
        }
    }
}

/// Error metrics of a forecast against realized values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastAccuracy {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub samples: usize,
}

/// Which forecast a performance report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastEntity {
    Volatility,
    Liquidity,
}

/// Stored forecasts scored against what the market then did.
///
/// Volatility is compared in annualized fractions, liquidity in TVL change
/// percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub protocol: ProtocolId,
    pub entity: ForecastEntity,
    /// Stored forecasts inside the evaluation period.
    pub predictions: usize,
    pub accuracy: ForecastAccuracy,
    pub mean_predicted: f64,
    pub mean_actual: f64,
    pub evaluated_at: DateTime<Utc>,
}
