//! Volatility and liquidity forecasting.
//!
//! Predictors are synchronous and deterministic. [`ForecastService`] runs
//! them on the [`FitPool`] and substitutes the fallback estimator when a fit
//! misses its deadline.

pub mod arima;
pub mod egarch;
pub mod evaluation;
pub mod garch;
pub mod liquidity;
pub mod optimize;
pub mod pool;
pub mod stats;
pub mod volatility;

use tracing::info;

use crate::domain::forecast::{LiquidityForecast, VolatilityForecast};
use crate::domain::id::ProtocolId;
use crate::domain::series::Series;

pub use evaluation::{evaluate, liquidity_performance, volatility_performance};
pub use liquidity::{
    classify_regime, estimate_flow, liquidity_shift, LiquidityPredictor, LiquiditySettings,
};
pub use pool::FitPool;
pub use volatility::{VolatilityPredictor, VolatilitySettings};

#[derive(Clone)]
pub struct ForecastService {
    volatility: VolatilityPredictor,
    liquidity: LiquidityPredictor,
    pool: FitPool,
}

impl ForecastService {
    #[must_use]
    pub fn new(volatility: VolatilityPredictor, liquidity: LiquidityPredictor, pool: FitPool) -> Self {
        Self {
            volatility,
            liquidity,
            pool,
        }
    }

    #[must_use]
    pub const fn volatility_predictor(&self) -> &VolatilityPredictor {
        &self.volatility
    }

    #[must_use]
    pub const fn liquidity_predictor(&self) -> &LiquidityPredictor {
        &self.liquidity
    }

    pub async fn volatility(
        &self,
        protocol: &ProtocolId,
        prices: Series,
        horizon: u32,
    ) -> VolatilityForecast {
        let predictor = self.volatility.clone();
        let id = protocol.clone();
        let series = prices.clone();
        match self
            .pool
            .run(move || predictor.forecast(&id, &series, horizon))
            .await
        {
            Ok(forecast) => {
                info!(
                    protocol = %protocol,
                    model = %forecast.model,
                    point = forecast.point,
                    "Volatility forecast"
                );
                forecast
            }
            Err(e) => {
                info!(protocol = %protocol, reason = %e, "Volatility fit abandoned, using fallback");
                let prepared = self.volatility.prepare(&prices);
                self.volatility.fallback(protocol, &prices, horizon, &prepared)
            }
        }
    }

    pub async fn liquidity(
        &self,
        protocol: &ProtocolId,
        tvl: Series,
        horizon: u32,
        related: Vec<(ProtocolId, Series)>,
    ) -> LiquidityForecast {
        let predictor = self.liquidity.clone();
        let id = protocol.clone();
        let series = tvl.clone();
        let others = related.clone();
        match self
            .pool
            .run(move || predictor.forecast(&id, &series, horizon, &others))
            .await
        {
            Ok(forecast) => {
                info!(
                    protocol = %protocol,
                    model = %forecast.model,
                    regime = ?forecast.regime,
                    "Liquidity forecast"
                );
                forecast
            }
            Err(e) => {
                info!(protocol = %protocol, reason = %e, "Liquidity fit abandoned, using fallback");
                self.liquidity.fallback(protocol, &tvl, horizon, &related)
            }
        }
    }
}
