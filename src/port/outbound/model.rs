//! Statistical model strategies.
//!
//! Each model is an interchangeable `fit`/`forecast` capability. Predictors
//! hold an ordered list of them and walk it until one fits, so swapping an
//! implementation never changes the predictor's contract.

use crate::domain::forecast::{ForecastModel, ModelParameter};
use crate::domain::risk::ComponentScores;
use crate::error::ForecastError;

/// Conditional-variance model over a return series.
pub trait VarianceModel: Send + Sync {
    fn tag(&self) -> ForecastModel;

    /// Fit on raw (fractional) returns.
    fn fit(&self, returns: &[f64]) -> Result<Box<dyn FittedVariance>, ForecastError>;
}

pub trait FittedVariance: Send {
    /// Mean per-period variance over the next `horizon` steps, in squared
    /// fractional-return units.
    fn forecast_variance(&self, horizon: u32) -> f64;

    fn parameters(&self) -> Vec<ModelParameter>;
}

/// Level model over a series such as TVL.
pub trait LevelModel: Send + Sync {
    fn tag(&self) -> ForecastModel;

    /// Fit with `differences` already decided by the stationarity test.
    fn fit(&self, values: &[f64], differences: u8) -> Result<Box<dyn FittedLevel>, ForecastError>;
}

/// Point forecast and its variance `horizon` steps ahead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelForecast {
    pub mean: f64,
    pub variance: f64,
}

pub trait FittedLevel: Send {
    fn forecast(&self, horizon: u32) -> LevelForecast;

    /// `(p, d, q)`.
    fn order(&self) -> (u8, u8, u8);
}

/// One past assessment: component scores and the overall score it carried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskSample {
    pub components: ComponentScores,
    pub overall: f64,
}

/// Learned mapping from component scores to an overall score. The weighted
/// sum is the fallback whenever no model is fitted.
pub trait RiskModel: Send + Sync {
    fn name(&self) -> &'static str;

    fn fit(&self, samples: &[RiskSample]) -> Result<Box<dyn FittedRisk>, ForecastError>;
}

pub trait FittedRisk: Send + Sync {
    /// Overall score in `[0, 100]`.
    fn predict(&self, components: &ComponentScores) -> f64;

    /// Samples the fit used.
    fn samples(&self) -> usize;
}
