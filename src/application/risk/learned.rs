//! Ridge regression from component scores to the overall score.
//!
//! Features are standardized before fitting so the penalty treats every
//! component alike. Predictions are clamped to `[0, 100]`.

use nalgebra::{DMatrix, DVector};

use crate::application::forecast::stats::{mean, std_dev};
use crate::domain::risk::{ComponentScores, RiskComponent};
use crate::error::ForecastError;
use crate::port::outbound::model::{FittedRisk, RiskModel, RiskSample};

const FEATURES: usize = RiskComponent::ALL.len();

#[derive(Debug, Clone, Copy)]
pub struct RidgeRegression {
    /// Fewest samples accepted for a fit.
    pub min_samples: usize,
    /// L2 penalty on the standardized coefficients.
    pub penalty: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self {
            min_samples: 50,
            penalty: 1.0,
        }
    }
}

fn features(scores: &ComponentScores) -> [f64; FEATURES] {
    RiskComponent::ALL.map(|c| scores.get(c))
}

impl RiskModel for RidgeRegression {
    fn name(&self) -> &'static str {
        "ridge"
    }

    fn fit(&self, samples: &[RiskSample]) -> Result<Box<dyn FittedRisk>, ForecastError> {
        let samples: Vec<&RiskSample> = samples
            .iter()
            .filter(|s| s.overall.is_finite() && features(&s.components).iter().all(|v| v.is_finite()))
            .collect();
        let n = samples.len();
        if n < self.min_samples.max(FEATURES + 1) {
            return Err(ForecastError::InsufficientData {
                have: n,
                need: self.min_samples.max(FEATURES + 1),
            });
        }

        let rows: Vec<[f64; FEATURES]> = samples.iter().map(|s| features(&s.components)).collect();
        let mut centers = [0.0; FEATURES];
        let mut scales = [1.0; FEATURES];
        for j in 0..FEATURES {
            let column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            centers[j] = mean(&column);
            let sd = std_dev(&column);
            // A constant component carries no signal; leave it unscaled.
            scales[j] = if sd > f64::EPSILON { sd } else { 1.0 };
        }

        let x = DMatrix::from_fn(n, FEATURES, |i, j| (rows[i][j] - centers[j]) / scales[j]);
        let targets: Vec<f64> = samples.iter().map(|s| s.overall).collect();
        let intercept = mean(&targets);
        let y = DVector::from_iterator(n, targets.iter().map(|t| t - intercept));

        let xt = x.transpose();
        let gram = &xt * &x + DMatrix::identity(FEATURES, FEATURES) * self.penalty;
        let inverse = gram.try_inverse().ok_or_else(|| ForecastError::ModelFit {
            model: "ridge",
            reason: "singular normal equations".into(),
        })?;
        let beta = inverse * (&xt * &y);

        let mut coefficients = [0.0; FEATURES];
        for (j, c) in coefficients.iter_mut().enumerate() {
            *c = beta[j];
        }
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ForecastError::ModelFit {
                model: "ridge",
                reason: "non-finite coefficients".into(),
            });
        }
        Ok(Box::new(FittedRidge {
            intercept,
            centers,
            scales,
            coefficients,
            samples: n,
        }))
    }
}

#[derive(Debug, Clone)]
struct FittedRidge {
    intercept: f64,
    centers: [f64; FEATURES],
    scales: [f64; FEATURES],
    coefficients: [f64; FEATURES],
    samples: usize,
}

impl FittedRisk for FittedRidge {
    fn predict(&self, components: &ComponentScores) -> f64 {
        let x = features(components);
        let raw = (0..FEATURES).fold(self.intercept, |acc, j| {
            acc + self.coefficients[j] * (x[j] - self.centers[j]) / self.scales[j]
        });
        if raw.is_finite() {
            raw.clamp(0.0, 100.0)
        } else {
            self.intercept.clamp(0.0, 100.0)
        }
    }

    fn samples(&self) -> usize {
        self.samples
    }
}
