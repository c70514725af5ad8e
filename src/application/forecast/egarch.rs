//! EGARCH(1,1,1): log-variance with an asymmetric shock term.
//!
//! ```text
//! ln h_t = ω + α(|z_{t-1}| − √(2/π)) + γ·z_{t-1} + β·ln h_{t-1}
//! ```

use std::f64::consts::FRAC_2_PI;

use crate::domain::forecast::{ForecastModel, ModelParameter};
use crate::error::ForecastError;
use crate::port::outbound::model::{FittedVariance, VarianceModel};

use super::garch::{prepare, MAX_PERSISTENCE, SCALE};
use super::optimize::{nelder_mead, SimplexConfig};
use super::stats::variance;

/// Log-variance is clamped to this magnitude to keep `exp` finite.
const LOG_VARIANCE_BOUND: f64 = 50.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct Egarch {
    simplex: SimplexConfig,
}

impl Egarch {
    #[must_use]
    pub const fn new(simplex: SimplexConfig) -> Self {
        Self { simplex }
    }
}

#[derive(Debug, Clone, Copy)]
struct Params {
    omega: f64,
    alpha: f64,
    gamma: f64,
    beta: f64,
}

impl Params {
    fn from_slice(p: &[f64]) -> Self {
        Self {
            omega: p[0],
            alpha: p[1],
            gamma: p[2],
            beta: p[3],
        }
    }

    fn step(&self, log_h: f64, eps: f64) -> f64 {
        let z = eps / (log_h.exp()).sqrt();
        let next = self.omega
            + self.alpha * (z.abs() - FRAC_2_PI.sqrt())
            + self.gamma * z
            + self.beta * log_h;
        next.clamp(-LOG_VARIANCE_BOUND, LOG_VARIANCE_BOUND)
    }
}

fn log_variances(eps: &[f64], p: Params, init: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(eps.len());
    let mut log_h = init;
    for t in 0..eps.len() {
        if t > 0 {
            log_h = p.step(log_h, eps[t - 1]);
        }
        out.push(log_h);
    }
    out
}

fn neg_log_likelihood(eps: &[f64], raw: &[f64], init: f64) -> f64 {
    let p = Params::from_slice(raw);
    if p.beta.abs() >= 1.0 || p.alpha < -1.0 {
        return f64::INFINITY;
    }
    log_variances(eps, p, init)
        .iter()
        .zip(eps)
        .map(|(lh, e)| 0.5 * (lh + e * e / lh.exp()))
        .sum()
}

impl VarianceModel for Egarch {
    fn tag(&self) -> ForecastModel {
        ForecastModel::Egarch
    }

    fn fit(&self, returns: &[f64]) -> Result<Box<dyn FittedVariance>, ForecastError> {
        let eps = prepare(returns);
        let sample = variance(&eps);
        if sample <= 0.0 || !sample.is_finite() {
            return Err(ForecastError::ModelFit {
                model: "egarch",
                reason: "zero sample variance".into(),
            });
        }
        let init = sample.ln();
        let start = [init * 0.1, 0.1, 0.0, 0.9];
        let min = nelder_mead(|p| neg_log_likelihood(&eps, p, init), &start, self.simplex);
        if !min.converged {
            return Err(ForecastError::ModelFit {
                model: "egarch",
                reason: format!("no convergence after {} iterations", min.iterations),
            });
        }
        if !min.value.is_finite() || min.x.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFit {
                model: "egarch",
                reason: "non-finite likelihood".into(),
            });
        }
        let params = Params::from_slice(&min.x);
        if params.beta.abs() >= MAX_PERSISTENCE {
            return Err(ForecastError::ModelFit {
                model: "egarch",
                reason: format!("persistence {:.4} too close to one", params.beta),
            });
        }
        let lhs = log_variances(&eps, params, init);
        let last = lhs.last().copied().unwrap_or(init);
        let last_eps = eps.last().copied().unwrap_or(0.0);
        Ok(Box::new(FittedEgarch {
            params,
            next_log: params.step(last, last_eps),
        }))
    }
}

#[derive(Debug, Clone, Copy)]
struct FittedEgarch {
    params: Params,
    next_log: f64,
}

impl FittedVariance for FittedEgarch {
    /// Shocks beyond the first step are replaced by their expectation, so the
    /// log-variance decays geometrically toward `ω / (1 − β)`.
    fn forecast_variance(&self, horizon: u32) -> f64 {
        let horizon = horizon.max(1);
        let mut log_h = self.next_log;
        let mut total = 0.0;
        for k in 0..horizon {
            if k > 0 {
                log_h = (self.params.omega + self.params.beta * log_h)
                    .clamp(-LOG_VARIANCE_BOUND, LOG_VARIANCE_BOUND);
            }
            total += log_h.exp();
        }
        total / f64::from(horizon) / (SCALE * SCALE)
    }

    fn parameters(&self) -> Vec<ModelParameter> {
        vec![
            ModelParameter::new("omega", self.params.omega),
            ModelParameter::new("alpha", self.params.alpha),
            ModelParameter::new("gamma", self.params.gamma),
            ModelParameter::new("beta", self.params.beta),
        ]
    }
}
