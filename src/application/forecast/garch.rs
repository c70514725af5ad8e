//! GARCH(1,1) fitted by maximum likelihood.
//!
//! Returns are scaled to percent and demeaned before fitting; forecasts are
//! scaled back to fractional units.

use crate::domain::forecast::{ForecastModel, ModelParameter};
use crate::error::ForecastError;
use crate::port::outbound::model::{FittedVariance, VarianceModel};

use super::optimize::{nelder_mead, SimplexConfig};
use super::stats::{mean, variance};

pub(crate) const SCALE: f64 = 100.0;
/// Persistence at or above this is treated as a failed (integrated) fit.
pub(crate) const MAX_PERSISTENCE: f64 = 0.999;

#[derive(Debug, Clone, Copy, Default)]
pub struct Garch {
    simplex: SimplexConfig,
}

impl Garch {
    #[must_use]
    pub const fn new(simplex: SimplexConfig) -> Self {
        Self { simplex }
    }
}

/// Scale to percent and remove the mean.
pub(crate) fn prepare(returns: &[f64]) -> Vec<f64> {
    let scaled: Vec<f64> = returns.iter().map(|r| r * SCALE).collect();
    let m = mean(&scaled);
    scaled.into_iter().map(|r| r - m).collect()
}

fn conditional_variances(eps: &[f64], omega: f64, alpha: f64, beta: f64, init: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(eps.len());
    let mut h = init;
    for (t, _) in eps.iter().enumerate() {
        if t > 0 {
            h = omega + alpha * eps[t - 1].powi(2) + beta * h;
        }
        out.push(h);
    }
    out
}

fn neg_log_likelihood(eps: &[f64], params: &[f64], init: f64) -> f64 {
    let (omega, alpha, beta) = (params[0], params[1], params[2]);
    if omega <= 0.0 || alpha < 0.0 || beta < 0.0 || alpha + beta >= 1.0 {
        return f64::INFINITY;
    }
    conditional_variances(eps, omega, alpha, beta, init)
        .iter()
        .zip(eps)
        .map(|(h, e)| {
            if *h <= 0.0 {
                f64::INFINITY
            } else {
                0.5 * (h.ln() + e * e / h)
            }
        })
        .sum()
}

impl VarianceModel for Garch {
    fn tag(&self) -> ForecastModel {
        ForecastModel::Garch
    }

    fn fit(&self, returns: &[f64]) -> Result<Box<dyn FittedVariance>, ForecastError> {
        let eps = prepare(returns);
        let init = variance(&eps);
        if init <= 0.0 || !init.is_finite() {
            return Err(ForecastError::ModelFit {
                model: "garch",
                reason: "zero sample variance".into(),
            });
        }
        let start = [init * 0.1, 0.1, 0.8];
        let min = nelder_mead(|p| neg_log_likelihood(&eps, p, init), &start, self.simplex);
        let (omega, alpha, beta) = (min.x[0], min.x[1], min.x[2]);
        if !min.converged {
            return Err(ForecastError::ModelFit {
                model: "garch",
                reason: format!("no convergence after {} iterations", min.iterations),
            });
        }
        if !min.value.is_finite() || [omega, alpha, beta].iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFit {
                model: "garch",
                reason: "non-finite likelihood".into(),
            });
        }
        if alpha + beta >= MAX_PERSISTENCE {
            return Err(ForecastError::ModelFit {
                model: "garch",
                reason: format!("persistence {:.4} too close to one", alpha + beta),
            });
        }
        let hs = conditional_variances(&eps, omega, alpha, beta, init);
        let last_h = hs.last().copied().unwrap_or(init);
        let last_eps = eps.last().copied().unwrap_or(0.0);
        Ok(Box::new(FittedGarch {
            omega,
            alpha,
            beta,
            next: omega + alpha * last_eps.powi(2) + beta * last_h,
        }))
    }
}

#[derive(Debug, Clone, Copy)]
struct FittedGarch {
    omega: f64,
    alpha: f64,
    beta: f64,
    /// One-step-ahead variance, percent units.
    next: f64,
}

impl FittedVariance for FittedGarch {
    fn forecast_variance(&self, horizon: u32) -> f64 {
        let persistence = self.alpha + self.beta;
        let long_run = self.omega / (1.0 - persistence);
        let horizon = horizon.max(1);
        let total: f64 = (0..horizon)
            .map(|k| long_run + persistence.powi(k as i32) * (self.next - long_run))
            .sum();
        total / f64::from(horizon) / (SCALE * SCALE)
    }

    fn parameters(&self) -> Vec<ModelParameter> {
        vec![
            ModelParameter::new("omega", self.omega),
            ModelParameter::new("alpha", self.alpha),
            ModelParameter::new("beta", self.beta),
        ]
    }
}
