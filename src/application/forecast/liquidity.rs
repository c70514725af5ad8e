//! Liquidity predictor: ARIMA on TVL, cross-protocol correlation and regime.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::domain::forecast::{
    ConfidenceInterval, CorrelatedSource, FlowDirection, FlowEstimate, ForecastModel,
    LiquidityForecast, LiquidityRegime, StationarityResult,
};
use crate::domain::id::ProtocolId;
use crate::domain::impact::{LiquidityImpact, LiquidityTransition};
use crate::domain::series::Series;
use crate::error::ForecastError;
use crate::port::outbound::model::{LevelForecast, LevelModel};

use super::arima::Arima;
use super::optimize::SimplexConfig;
use super::stats::{
    mean, pct_changes, pearson, stationarity_with_differencing, std_dev, z_for_confidence,
};

#[derive(Debug, Clone, Copy)]
pub struct LiquiditySettings {
    pub min_observations: usize,
    pub confidence: f64,
    /// Trailing points used for the linear fallback.
    pub fallback_window: usize,
    pub correlation_window: usize,
    pub correlation_threshold: f64,
    /// Trailing changes used for regime classification.
    pub regime_window: usize,
}

impl Default for LiquiditySettings {
    fn default() -> Self {
        Self {
            min_observations: 30,
            confidence: 0.95,
            fallback_window: 14,
            correlation_window: 30,
            correlation_threshold: 0.7,
            regime_window: 7,
        }
    }
}

/// Model output before the forecast record is assembled.
struct Projection {
    model: ForecastModel,
    order: Option<(u8, u8, u8)>,
    level: LevelForecast,
}

#[derive(Clone)]
pub struct LiquidityPredictor {
    settings: LiquiditySettings,
    model: Arc<dyn LevelModel>,
}

impl LiquidityPredictor {
    #[must_use]
    pub fn new(settings: LiquiditySettings, max_p: u8, max_q: u8) -> Self {
        Self::with_model(
            settings,
            Arc::new(Arima::new(max_p, max_q, SimplexConfig::default())),
        )
    }

    #[must_use]
    pub fn with_model(settings: LiquiditySettings, model: Arc<dyn LevelModel>) -> Self {
        Self { settings, model }
    }

    #[must_use]
    pub const fn settings(&self) -> &LiquiditySettings {
        &self.settings
    }

    /// Forecast TVL `horizon` steps ahead.
    ///
    /// `related` pairs each related protocol with its TVL series.
    #[must_use]
    pub fn forecast(
        &self,
        protocol: &ProtocolId,
        tvl: &Series,
        horizon: u32,
        related: &[(ProtocolId, Series)],
    ) -> LiquidityForecast {
        let values = tvl.values();
        let stationarity = stationarity_with_differencing(&values);
        let projection = match self.fit(&values, &stationarity, horizon) {
            Ok(p) => p,
            Err(e) => {
                info!(protocol = %protocol, reason = %e, "Liquidity fallback");
                self.extrapolate(&values, horizon)
            }
        };
        self.assemble(protocol, tvl, horizon, related, stationarity, projection)
    }

    /// The linear-extrapolation forecast, skipping the model entirely.
    #[must_use]
    pub fn fallback(
        &self,
        protocol: &ProtocolId,
        tvl: &Series,
        horizon: u32,
        related: &[(ProtocolId, Series)],
    ) -> LiquidityForecast {
        let values = tvl.values();
        let stationarity = stationarity_with_differencing(&values);
        let projection = self.extrapolate(&values, horizon);
        self.assemble(protocol, tvl, horizon, related, stationarity, projection)
    }

    fn fit(
        &self,
        values: &[f64],
        stationarity: &StationarityResult,
        horizon: u32,
    ) -> Result<Projection, ForecastError> {
        if values.len() < self.settings.min_observations {
            return Err(ForecastError::InsufficientData {
                have: values.len(),
                need: self.settings.min_observations,
            });
        }
        if !stationarity.stationary {
            return Err(ForecastError::ModelFit {
                model: "adf",
                reason: "not stationary after one difference".into(),
            });
        }
        let fitted = self.model.fit(values, stationarity.differences)?;
        Ok(Projection {
            model: self.model.tag(),
            order: Some(fitted.order()),
            level: fitted.forecast(horizon),
        })
    }

    /// Least-squares line through the recent window, σ = residual std · √h.
    fn extrapolate(&self, values: &[f64], horizon: u32) -> Projection {
        let recent = &values[values.len().saturating_sub(self.settings.fallback_window)..];
        let h = f64::from(horizon.max(1));
        let level = match recent.len() {
            0 => LevelForecast {
                mean: 0.0,
                variance: 0.0,
            },
            1 => LevelForecast {
                mean: recent[0],
                variance: 0.0,
            },
            n => {
                let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
                let (mx, my) = (mean(&xs), mean(recent));
                let sxx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
                let sxy: f64 = xs.iter().zip(recent).map(|(x, y)| (x - mx) * (y - my)).sum();
                let slope = sxy / sxx;
                let intercept = my - slope * mx;
                let residuals: Vec<f64> = xs
                    .iter()
                    .zip(recent)
                    .map(|(x, y)| y - (intercept + slope * x))
                    .collect();
                let sigma = std_dev(&residuals) * h.sqrt();
                LevelForecast {
                    mean: intercept + slope * ((n - 1) as f64 + h),
                    variance: sigma * sigma,
                }
            }
        };
        Projection {
            model: ForecastModel::Fallback,
            order: None,
            level,
        }
    }

    fn assemble(
        &self,
        protocol: &ProtocolId,
        tvl: &Series,
        horizon: u32,
        related: &[(ProtocolId, Series)],
        stationarity: StationarityResult,
        projection: Projection,
    ) -> LiquidityForecast {
        let values = tvl.values();
        let current = values.last().copied().unwrap_or(0.0);
        let point = projection.level.mean.max(0.0);
        let z = z_for_confidence(self.settings.confidence);
        let interval = ConfidenceInterval::around(
            point,
            z,
            projection.level.variance.max(0.0).sqrt(),
            self.settings.confidence,
            Some(0.0),
        );
        let predicted_change_pct = if current > 0.0 {
            (point - current) / current * 100.0
        } else {
            0.0
        };
        LiquidityForecast {
            protocol: protocol.clone(),
            model: projection.model,
            point,
            interval,
            horizon,
            stationarity,
            order: projection.order,
            current_tvl: current,
            predicted_change_pct,
            regime: classify_regime(&values, self.settings.regime_window),
            correlated_sources: self.correlated_sources(&values, related),
            degraded: projection.model == ForecastModel::Fallback,
            series_end: tvl.last_at(),
            computed_at: Utc::now(),
        }
    }

    /// Related protocols whose recent TVL changes correlate above threshold.
    #[must_use]
    pub fn correlated_sources(
        &self,
        values: &[f64],
        related: &[(ProtocolId, Series)],
    ) -> Vec<CorrelatedSource> {
        let window = self.settings.correlation_window + 1;
        let own = pct_changes(&values[values.len().saturating_sub(window)..]);
        let mut sources: Vec<CorrelatedSource> = related
            .iter()
            .filter_map(|(id, series)| {
                let other = series.values();
                let theirs = pct_changes(&other[other.len().saturating_sub(window)..]);
                let correlation = pearson(&own, &theirs)?;
                debug!(related = %id, correlation, "TVL correlation");
                (correlation > self.settings.correlation_threshold).then(|| CorrelatedSource {
                    protocol: id.clone(),
                    correlation,
                })
            })
            .collect();
        sources.sort_by(|a, b| b.correlation.total_cmp(&a.correlation));
        sources
    }
}

/// Regime of the trailing `window` TVL changes.
///
/// The trend is the mean change; its volatility unit is the standard error
/// `std / √k`. A trend within one unit of zero is stable.
#[must_use]
pub fn classify_regime(values: &[f64], window: usize) -> LiquidityRegime {
    let changes = pct_changes(values);
    let recent = &changes[changes.len().saturating_sub(window.max(2))..];
    if recent.len() < 2 {
        return LiquidityRegime::Stable;
    }
    let trend = mean(recent);
    let unit = std_dev(recent) / (recent.len() as f64).sqrt();
    if trend.abs() <= unit {
        LiquidityRegime::Stable
    } else if trend > 0.0 {
        LiquidityRegime::Accumulation
    } else {
        LiquidityRegime::Distribution
    }
}

/// TVL level and dispersion before and after an upgrade. `None` when either
/// window is empty.
#[must_use]
pub fn liquidity_shift(before: &[f64], after: &[f64]) -> Option<LiquidityImpact> {
    if before.is_empty() || after.is_empty() {
        return None;
    }
    let relative = |pre: f64, post: f64| if pre > 0.0 { (post - pre) / pre } else { 0.0 };
    let (pre_mean_tvl, post_mean_tvl) = (mean(before), mean(after));
    let (pre_tvl_std, post_tvl_std) = (std_dev(before), std_dev(after));
    let tvl_change = relative(pre_mean_tvl, post_mean_tvl);
    let volatility_change = relative(pre_tvl_std, post_tvl_std);
    Some(LiquidityImpact {
        pre_mean_tvl,
        post_mean_tvl,
        tvl_change,
        pre_tvl_std,
        post_tvl_std,
        volatility_change,
        transition: LiquidityTransition::classify(tvl_change, volatility_change),
    })
}

/// Expected TVL movement between two protocols' forecasts.
///
/// Liquidity leaving `source` while `target` grows is an inflow to the
/// target, and the reverse an outflow. Magnitude is the smaller of the two
/// absolute changes.
#[must_use]
pub fn estimate_flow(source: &LiquidityForecast, target: &LiquidityForecast) -> FlowEstimate {
    let from = source.point - source.current_tvl;
    let to = target.point - target.current_tvl;
    let (direction, magnitude) = if from < 0.0 && to > 0.0 {
        (FlowDirection::Inflow, from.abs().min(to))
    } else if from > 0.0 && to < 0.0 {
        (FlowDirection::Outflow, from.min(to.abs()))
    } else {
        (FlowDirection::Neutral, 0.0)
    };
    FlowEstimate {
        source: source.protocol.clone(),
        target: target.protocol.clone(),
        direction,
        magnitude,
    }
}
