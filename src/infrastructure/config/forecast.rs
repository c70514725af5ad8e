//! `[forecast]` section.

use std::time::Duration;

use serde::Deserialize;

use crate::application::forecast::{
    FitPool, ForecastService, LiquidityPredictor, LiquiditySettings, VolatilityPredictor,
    VolatilitySettings,
};
use crate::application::PipelineSettings;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub min_observations: usize,
    pub confidence: f64,
    /// Forecast horizon in days.
    pub horizon: u32,
    pub history_days: u32,
    /// Concurrent model fits; 0 means half the CPUs.
    pub fit_workers: usize,
    pub fit_timeout_ms: u64,
    /// Returns used by the volatility fallback.
    pub fallback_window: usize,
    pub arima_max_p: u8,
    pub arima_max_q: u8,
    /// Points used by the liquidity trend fallback.
    pub liquidity_fallback_window: usize,
    pub correlation_window: usize,
    pub correlation_threshold: f64,
    pub regime_window: usize,
    /// Re-evaluations processed at once.
    pub max_concurrent: usize,
    /// Days on each side of an upgrade compared by impact analysis.
    pub impact_window_days: u32,
    /// Days of stored forecasts scored by the protocol report.
    pub evaluation_days: u32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        let vol = VolatilitySettings::default();
        let liq = LiquiditySettings::default();
        Self {
            min_observations: vol.min_observations,
            confidence: vol.confidence,
            horizon: 1,
            history_days: 90,
            fit_workers: 0,
            fit_timeout_ms: 5_000,
            fallback_window: vol.fallback_window,
            arima_max_p: 2,
            arima_max_q: 2,
            liquidity_fallback_window: liq.fallback_window,
            correlation_window: liq.correlation_window,
            correlation_threshold: liq.correlation_threshold,
            regime_window: liq.regime_window,
            max_concurrent: 4,
            impact_window_days: 30,
            evaluation_days: 30,
        }
    }
}

impl ForecastConfig {
    #[must_use]
    pub fn service(&self) -> ForecastService {
        let volatility = VolatilityPredictor::new(VolatilitySettings {
            min_observations: self.min_observations,
            confidence: self.confidence,
            fallback_window: self.fallback_window,
            ..VolatilitySettings::default()
        });
        let liquidity = LiquidityPredictor::new(
            LiquiditySettings {
                min_observations: self.min_observations,
                confidence: self.confidence,
                fallback_window: self.liquidity_fallback_window,
                correlation_window: self.correlation_window,
                correlation_threshold: self.correlation_threshold,
                regime_window: self.regime_window,
            },
            self.arima_max_p,
            self.arima_max_q,
        );
        let pool = FitPool::new(self.fit_workers, Duration::from_millis(self.fit_timeout_ms));
        ForecastService::new(volatility, liquidity, pool)
    }

    #[must_use]
    pub fn pipeline(&self) -> PipelineSettings {
        PipelineSettings {
            horizon: self.horizon,
            history_days: self.history_days,
            max_concurrent: self.max_concurrent,
            impact_window_days: self.impact_window_days,
            evaluation_days: self.evaluation_days,
        }
    }
}
