//! Forecast accuracy against realized values.
//!
//! Stored forecasts are replayed against the market series that followed
//! them. A forecast whose horizon has not yet been observed is skipped.

use chrono::{DateTime, Duration, Utc};

use crate::domain::forecast::{
    ForecastAccuracy, ForecastEntity, LiquidityForecast, ModelPerformance, VolatilityForecast,
};
use crate::domain::id::ProtocolId;
use crate::domain::series::Series;
use crate::error::ForecastError;

use super::stats::{errors, mean};
use super::volatility::VolatilityPredictor;

/// Stored forecasts required inside the evaluation period.
pub const MIN_PREDICTIONS: usize = 10;
/// Forecasts that must have a realized counterpart.
pub const MIN_REALIZED: usize = 5;
/// Realized volatility is measured over at least this many days so a
/// one-day horizon still yields a dispersion.
const MIN_VOLATILITY_DAYS: i64 = 7;

/// MSE, RMSE and MAE over the paired prefix of both slices.
#[must_use]
pub fn evaluate(predicted: &[f64], actual: &[f64]) -> ForecastAccuracy {
    let (mse, rmse, mae, samples) = errors(predicted, actual);
    ForecastAccuracy {
        mse,
        rmse,
        mae,
        samples,
    }
}

/// Volatility forecasts computed at or after `since`, scored against the
/// annualized realized volatility of `prices` over each horizon.
///
/// # Errors
///
/// [`ForecastError::InsufficientData`] when fewer than [`MIN_PREDICTIONS`]
/// forecasts fall in the period or fewer than [`MIN_REALIZED`] have been
/// realized.
pub fn volatility_performance(
    protocol: &ProtocolId,
    history: &[VolatilityForecast],
    prices: &Series,
    predictor: &VolatilityPredictor,
    since: DateTime<Utc>,
) -> Result<ModelPerformance, ForecastError> {
    let period: Vec<&VolatilityForecast> = history.iter().filter(|f| f.computed_at >= since).collect();
    let pairs = period.iter().filter_map(|f| {
        let start = f.series_end.unwrap_or(f.computed_at);
        let days = i64::from(f.horizon).max(MIN_VOLATILITY_DAYS);
        let window = prices.between(start, start + Duration::days(days));
        (window.len() >= 3).then(|| (f.point, predictor.realized(&window)))
    });
    performance(protocol, ForecastEntity::Volatility, period.len(), pairs)
}

/// Liquidity forecasts computed at or after `since`, scored on TVL change
/// percent over each horizon.
///
/// # Errors
///
/// As for [`volatility_performance`].
pub fn liquidity_performance(
    protocol: &ProtocolId,
    history: &[LiquidityForecast],
    tvl: &Series,
    since: DateTime<Utc>,
) -> Result<ModelPerformance, ForecastError> {
    let period: Vec<&LiquidityForecast> = history.iter().filter(|f| f.computed_at >= since).collect();
    let pairs = period.iter().filter_map(|f| {
        let start = f.series_end.unwrap_or(f.computed_at);
        let days = i64::from(f.horizon.max(1));
        let window = tvl.between(start, start + Duration::days(days));
        match (window.first(), window.last()) {
            (Some(&first), Some(&last)) if window.len() >= 2 && first > 0.0 => {
                Some((f.predicted_change_pct, (last - first) / first * 100.0))
            }
            _ => None,
        }
    });
    performance(protocol, ForecastEntity::Liquidity, period.len(), pairs)
}

fn performance(
    protocol: &ProtocolId,
    entity: ForecastEntity,
    predictions: usize,
    pairs: impl Iterator<Item = (f64, f64)>,
) -> Result<ModelPerformance, ForecastError> {
    if predictions < MIN_PREDICTIONS {
        return Err(ForecastError::InsufficientData {
            have: predictions,
            need: MIN_PREDICTIONS,
        });
    }
    let (predicted, actual): (Vec<f64>, Vec<f64>) = pairs.unzip();
    if actual.len() < MIN_REALIZED {
        return Err(ForecastError::InsufficientData {
            have: actual.len(),
            need: MIN_REALIZED,
        });
    }
    Ok(ModelPerformance {
        protocol: protocol.clone(),
        entity,
        predictions,
        accuracy: evaluate(&predicted, &actual),
        mean_predicted: mean(&predicted),
        mean_actual: mean(&actual),
        evaluated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::forecast::VolatilitySettings;
    use crate::domain::forecast::ForecastModel;
    use crate::testkit::domain::{liquidity, volatility};

    #[test]
    fn perfect_forecast_has_zero_error() {
        let acc = evaluate(&[0.4, 0.5], &[0.4, 0.5]);
        assert_eq!(acc.samples, 2);
        assert_eq!(acc.mse, 0.0);
        assert_eq!(acc.mae, 0.0);
    }

    #[test]
    fn mismatched_lengths_use_common_prefix() {
        let acc = evaluate(&[1.0, 2.0, 3.0], &[1.0]);
        assert_eq!(acc.samples, 1);
    }

    fn protocol() -> ProtocolId {
        ProtocolId::from("aave")
    }

    /// TVL growing 1% a day for 40 days, ending now.
    fn growing_tvl(now: DateTime<Utc>) -> Series {
        let values: Vec<f64> = (0..40).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        Series::daily(&values, now)
    }

    fn liquidity_history(now: DateTime<Utc>, count: i64, change_pct: f64) -> Vec<LiquidityForecast> {
        (0..count)
            .map(|i| {
                let mut f = liquidity("aave", 100.0, 100.0 + change_pct);
                f.predicted_change_pct = change_pct;
                f.series_end = Some(now - Duration::days(20 - i));
                f.computed_at = now - Duration::days(20 - i);
                f
            })
            .collect()
    }

    #[test]
    fn liquidity_forecasts_scored_on_realized_change() {
        let now = Utc::now();
        let tvl = growing_tvl(now);
        let history = liquidity_history(now, 12, 1.0);

        let report = liquidity_performance(&protocol(), &history, &tvl, now - Duration::days(30)).unwrap();
        assert_eq!(report.entity, ForecastEntity::Liquidity);
        assert_eq!(report.predictions, 12);
        assert_eq!(report.accuracy.samples, 12);
        assert!(report.accuracy.mae < 1e-6, "mae {}", report.accuracy.mae);
        assert!((report.mean_actual - 1.0).abs() < 1e-6);
    }

    #[test]
    fn too_few_forecasts_is_insufficient() {
        let now = Utc::now();
        let history = liquidity_history(now, 9, 1.0);
        let err = liquidity_performance(&protocol(), &history, &growing_tvl(now), now - Duration::days(30))
            .unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { have: 9, need: MIN_PREDICTIONS }));
    }

    #[test]
    fn unrealized_forecasts_are_skipped() {
        let now = Utc::now();
        let mut history = liquidity_history(now, 12, 1.0);
        // Horizons ending after the last observation have no realized value.
        for f in &mut history[..9] {
            f.series_end = Some(now + Duration::days(1));
        }
        let err = liquidity_performance(&protocol(), &history, &growing_tvl(now), now - Duration::days(30))
            .unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { have: 3, need: MIN_REALIZED }));
    }

    #[test]
    fn volatility_forecasts_scored_on_realized_dispersion() {
        let now = Utc::now();
        let prices = Series::daily(&crate::testkit::domain::zigzag_prices(60, 100.0, 2.0), now);
        let predictor = VolatilityPredictor::new(VolatilitySettings::default());
        let history: Vec<VolatilityForecast> = (0..10)
            .map(|i| {
                let mut f = volatility("aave", 0.5, ForecastModel::Garch);
                f.series_end = Some(now - Duration::days(40 - i));
                f.computed_at = now - Duration::days(40 - i);
                f
            })
            .collect();

        let report =
            volatility_performance(&protocol(), &history, &prices, &predictor, now - Duration::days(45))
                .unwrap();
        assert_eq!(report.entity, ForecastEntity::Volatility);
        assert_eq!(report.accuracy.samples, 10);
        assert_eq!(report.mean_predicted, 0.5);
        assert!(report.mean_actual > 0.0);

        let later = volatility_performance(&protocol(), &history, &prices, &predictor, now);
        assert!(later.is_err());
    }
}
