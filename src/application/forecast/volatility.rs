//! Volatility predictor: GARCH, then EGARCH, then the sample estimator.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::domain::forecast::{
    ConfidenceInterval, ForecastModel, ModelParameter, StationarityResult, VolatilityForecast,
    VolatilityShift,
};
use crate::domain::id::ProtocolId;
use crate::domain::impact::VolatilityImpact;
use crate::domain::series::Series;
use crate::error::ForecastError;
use crate::port::outbound::model::VarianceModel;

use super::egarch::Egarch;
use super::garch::Garch;
use super::optimize::SimplexConfig;
use super::stats::{adf_test, log_returns, std_dev, z_for_confidence};

/// Winning model, per-period variance and fitted parameters.
type Fit = (ForecastModel, f64, Vec<ModelParameter>);

#[derive(Debug, Clone, Copy)]
pub struct VolatilitySettings {
    /// Fewer returns than this skip model fitting.
    pub min_observations: usize,
    pub confidence: f64,
    /// Trailing returns used by the sample estimator.
    pub fallback_window: usize,
    pub periods_per_year: f64,
}

impl Default for VolatilitySettings {
    fn default() -> Self {
        Self {
            min_observations: 30,
            confidence: 0.95,
            fallback_window: 30,
            periods_per_year: 365.0,
        }
    }
}

/// Returns and the stationarity verdict computed before any fit.
#[derive(Debug, Clone)]
pub struct PreparedReturns {
    pub returns: Vec<f64>,
    pub stationarity: StationarityResult,
}

#[derive(Clone)]
pub struct VolatilityPredictor {
    settings: VolatilitySettings,
    /// Tried in order; the first that fits wins.
    models: Vec<Arc<dyn VarianceModel>>,
}

impl VolatilityPredictor {
    #[must_use]
    pub fn new(settings: VolatilitySettings) -> Self {
        let simplex = SimplexConfig::default();
        Self::with_models(
            settings,
            vec![Arc::new(Garch::new(simplex)), Arc::new(Egarch::new(simplex))],
        )
    }

    #[must_use]
    pub fn with_models(settings: VolatilitySettings, models: Vec<Arc<dyn VarianceModel>>) -> Self {
        Self { settings, models }
    }

    #[must_use]
    pub const fn settings(&self) -> &VolatilitySettings {
        &self.settings
    }

    #[must_use]
    pub fn prepare(&self, prices: &Series) -> PreparedReturns {
        let returns = log_returns(&prices.values());
        let stationarity = adf_test(&returns);
        PreparedReturns {
            returns,
            stationarity,
        }
    }

    /// Full forecast: model chain with fallback.
    #[must_use]
    pub fn forecast(&self, protocol: &ProtocolId, prices: &Series, horizon: u32) -> VolatilityForecast {
        let prepared = self.prepare(prices);
        match self.fit_chain(&prepared, horizon) {
            Ok(forecast) => self.finish(protocol, prices, horizon, &prepared, forecast),
            Err(e) => {
                info!(protocol = %protocol, reason = %e, "Volatility fallback");
                self.fallback(protocol, prices, horizon, &prepared)
            }
        }
    }

    fn fit_chain(
        &self,
        prepared: &PreparedReturns,
        horizon: u32,
    ) -> Result<Fit, ForecastError> {
        let n = prepared.returns.len();
        if n < self.settings.min_observations {
            return Err(ForecastError::InsufficientData {
                have: n,
                need: self.settings.min_observations,
            });
        }
        if !prepared.stationarity.stationary {
            return Err(ForecastError::ModelFit {
                model: "adf",
                reason: "returns are not stationary".into(),
            });
        }
        let mut last = None;
        for model in &self.models {
            match model.fit(&prepared.returns) {
                Ok(fitted) => {
                    let var = fitted.forecast_variance(horizon);
                    if var.is_finite() && var > 0.0 {
                        return Ok((model.tag(), var, fitted.parameters()));
                    }
                    last = Some(ForecastError::ModelFit {
                        model: "variance",
                        reason: format!("{} produced variance {var}", model.tag()),
                    });
                }
                Err(e) => {
                    debug!(model = %model.tag(), error = %e, "Variance model rejected");
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or(ForecastError::ModelFit {
            model: "variance",
            reason: "no models configured".into(),
        }))
    }

    fn finish(
        &self,
        protocol: &ProtocolId,
        prices: &Series,
        horizon: u32,
        prepared: &PreparedReturns,
        (model, variance, parameters): Fit,
    ) -> VolatilityForecast {
        let point = (variance * self.settings.periods_per_year).sqrt();
        VolatilityForecast {
            protocol: protocol.clone(),
            model,
            point,
            interval: self.interval(point, prepared.returns.len()),
            horizon,
            stationarity: prepared.stationarity,
            parameters,
            observations: prepared.returns.len(),
            degraded: false,
            series_end: prices.last_at(),
            computed_at: Utc::now(),
        }
    }

    /// Annualized sample standard deviation of recent returns.
    #[must_use]
    pub fn fallback(
        &self,
        protocol: &ProtocolId,
        prices: &Series,
        horizon: u32,
        prepared: &PreparedReturns,
    ) -> VolatilityForecast {
        let returns = &prepared.returns;
        let recent = &returns[returns.len().saturating_sub(self.settings.fallback_window)..];
        let point = std_dev(recent) * self.settings.periods_per_year.sqrt();
        VolatilityForecast {
            protocol: protocol.clone(),
            model: ForecastModel::Fallback,
            point,
            interval: self.interval(point, recent.len()),
            horizon,
            stationarity: prepared.stationarity,
            parameters: Vec::new(),
            observations: returns.len(),
            degraded: true,
            series_end: prices.last_at(),
            computed_at: Utc::now(),
        }
    }

    /// `point ± z·se` with `se = point / √(2n)`, floored at zero.
    fn interval(&self, point: f64, n: usize) -> ConfidenceInterval {
        let z = z_for_confidence(self.settings.confidence);
        let se = if n > 0 {
            point / (2.0 * n as f64).sqrt()
        } else {
            point
        };
        ConfidenceInterval::around(point, z, se, self.settings.confidence, Some(0.0))
    }

    /// Realized-volatility change between two price windows.
    #[must_use]
    pub fn regime_shift(&self, before: &[f64], after: &[f64]) -> VolatilityImpact {
        let pre = self.realized(before);
        let post = self.realized(after);
        let change = if pre > 0.0 { (post - pre) / pre } else { 0.0 };
        VolatilityImpact {
            pre,
            post,
            change,
            shift: VolatilityShift::from_change(change),
        }
    }

    /// Annualized sample std of the log returns of `prices`.
    #[must_use]
    pub fn realized(&self, prices: &[f64]) -> f64 {
        std_dev(&log_returns(prices)) * self.settings.periods_per_year.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol() -> ProtocolId {
        ProtocolId::from("uniswap_v3")
    }

    #[test]
    fn short_series_uses_fallback() {
        let prices = Series::daily(&[100.0, 101.0, 99.0, 102.0, 98.0, 103.0, 97.0, 104.0], Utc::now());
        let forecast = VolatilityPredictor::new(VolatilitySettings::default()).forecast(&protocol(), &prices, 1);
        assert_eq!(forecast.model, ForecastModel::Fallback);
        assert!(forecast.degraded);
        assert!(forecast.interval.contains(forecast.point));
        assert!(forecast.point > 0.0);
        assert!(forecast.interval.low >= 0.0);
    }

    #[test]
    fn fallback_is_annualized_sample_std() {
        let values = [100.0, 110.0, 100.0, 110.0];
        let prices = Series::daily(&values, Utc::now());
        let predictor = VolatilityPredictor::new(VolatilitySettings::default());
        let forecast = predictor.forecast(&protocol(), &prices, 1);
        let r = log_returns(&values);
        let expected = std_dev(&r) * 365f64.sqrt();
        assert!((forecast.point - expected).abs() < 1e-12);
    }

    #[test]
    fn flat_prices_give_zero_width_interval() {
        let prices = Series::daily(&[50.0; 10], Utc::now());
        let forecast = VolatilityPredictor::new(VolatilitySettings::default()).forecast(&protocol(), &prices, 3);
        assert_eq!(forecast.point, 0.0);
        assert_eq!(forecast.interval.low, 0.0);
        assert_eq!(forecast.interval.high, 0.0);
    }

    #[test]
    fn regime_shift_detects_increase() {
        let predictor = VolatilityPredictor::new(VolatilitySettings::default());
        let calm = [100.0, 100.5, 100.0, 100.5, 100.0, 100.5];
        let wild = [100.0, 105.0, 98.0, 106.0, 95.0, 108.0];
        let impact = predictor.regime_shift(&calm, &wild);
        assert!(impact.change > 0.5);
        assert!(impact.post > impact.pre);
        assert_eq!(impact.shift, VolatilityShift::HighVolatilityRegime);

        let flat = predictor.regime_shift(&[100.0; 5], &wild);
        assert_eq!(flat.change, 0.0);
        assert_eq!(flat.shift, VolatilityShift::Stable);
    }

    #[test]
    fn empty_model_chain_falls_back() {
        let predictor = VolatilityPredictor::with_models(
            VolatilitySettings {
                min_observations: 5,
                ..VolatilitySettings::default()
            },
            Vec::new(),
        );
        let values: Vec<f64> = (0..80).map(|i| 100.0 + if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let forecast = predictor.forecast(&protocol(), &Series::daily(&values, Utc::now()), 1);
        assert_eq!(forecast.model, ForecastModel::Fallback);
    }
}
