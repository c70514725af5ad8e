//! ARIMA(p, d, q) by conditional sum of squares, order chosen by AIC.
//!
//! `d` comes from the stationarity test; `p` and `q` are searched over a
//! small fixed grid so fitting time stays bounded.

use tracing::debug;

use crate::domain::forecast::ForecastModel;
use crate::error::ForecastError;
use crate::port::outbound::model::{FittedLevel, LevelForecast, LevelModel};

use super::optimize::{nelder_mead, SimplexConfig};
use super::stats::{diff, mean, variance};

#[derive(Debug, Clone, Copy)]
pub struct Arima {
    max_p: u8,
    max_q: u8,
    simplex: SimplexConfig,
}

impl Default for Arima {
    fn default() -> Self {
        Self::new(2, 2, SimplexConfig::default())
    }
}

impl Arima {
    #[must_use]
    pub const fn new(max_p: u8, max_q: u8, simplex: SimplexConfig) -> Self {
        Self {
            max_p,
            max_q,
            simplex,
        }
    }

    fn fit_order(&self, w: &[f64], p: usize, q: usize) -> Option<Candidate> {
        let mu0 = mean(w);
        let mut start = vec![mu0];
        start.extend(std::iter::repeat(0.1).take(p));
        start.extend(std::iter::repeat(0.1).take(q));
        let min = nelder_mead(|x| css(w, x, p, q), &start, self.simplex);
        if !min.converged || !min.value.is_finite() {
            return None;
        }
        let n_eff = (w.len() - p) as f64;
        let sigma2 = min.value / n_eff;
        if sigma2 <= 0.0 || !sigma2.is_finite() {
            return None;
        }
        let k = (p + q + 1) as f64;
        Some(Candidate {
            mu: min.x[0],
            phi: min.x[1..=p].to_vec(),
            theta: min.x[1 + p..].to_vec(),
            sigma2,
            aic: n_eff * sigma2.ln() + 2.0 * k,
        })
    }
}

struct Candidate {
    mu: f64,
    phi: Vec<f64>,
    theta: Vec<f64>,
    sigma2: f64,
    aic: f64,
}

/// Residuals of the ARMA recursion with pre-sample shocks set to zero.
fn residuals(w: &[f64], mu: f64, phi: &[f64], theta: &[f64]) -> Vec<f64> {
    let p = phi.len();
    let mut e = vec![0.0; w.len()];
    for t in p..w.len() {
        let mut pred = mu;
        for (i, ph) in phi.iter().enumerate() {
            pred += ph * (w[t - 1 - i] - mu);
        }
        for (j, th) in theta.iter().enumerate() {
            if t > j {
                pred += th * e[t - 1 - j];
            }
        }
        e[t] = w[t] - pred;
    }
    e
}

fn css(w: &[f64], x: &[f64], p: usize, q: usize) -> f64 {
    let phi = &x[1..=p];
    let theta = &x[1 + p..1 + p + q];
    if phi.iter().map(|v| v.abs()).sum::<f64>() >= 1.0
        || theta.iter().map(|v| v.abs()).sum::<f64>() >= 1.0
    {
        return f64::INFINITY;
    }
    residuals(w, x[0], phi, theta)[p..].iter().map(|e| e * e).sum()
}

impl LevelModel for Arima {
    fn tag(&self) -> ForecastModel {
        ForecastModel::Arima
    }

    fn fit(&self, values: &[f64], differences: u8) -> Result<Box<dyn FittedLevel>, ForecastError> {
        if differences > 1 {
            return Err(ForecastError::ModelFit {
                model: "arima",
                reason: format!("unsupported differencing order {differences}"),
            });
        }
        let w = if differences == 1 {
            diff(values)
        } else {
            values.to_vec()
        };
        let need = usize::from(self.max_p.max(self.max_q)) + 5;
        if w.len() < need {
            return Err(ForecastError::InsufficientData {
                have: w.len(),
                need,
            });
        }
        if variance(&w) <= 0.0 {
            return Err(ForecastError::ModelFit {
                model: "arima",
                reason: "constant series".into(),
            });
        }

        let mut best: Option<(usize, usize, Candidate)> = None;
        for p in 0..=usize::from(self.max_p) {
            for q in 0..=usize::from(self.max_q) {
                let Some(c) = self.fit_order(&w, p, q) else {
                    continue;
                };
                debug!(p, d = differences, q, aic = c.aic, "ARIMA candidate");
                if best.as_ref().map_or(true, |(_, _, b)| c.aic < b.aic) {
                    best = Some((p, q, c));
                }
            }
        }
        let (p, q, c) = best.ok_or_else(|| ForecastError::ModelFit {
            model: "arima",
            reason: "no order converged".into(),
        })?;
        let e = residuals(&w, c.mu, &c.phi, &c.theta);
        Ok(Box::new(FittedArima {
            order: (p as u8, differences, q as u8),
            mu: c.mu,
            phi: c.phi,
            theta: c.theta,
            sigma2: c.sigma2,
            history: w,
            shocks: e,
            last_level: values.last().copied().unwrap_or(0.0),
        }))
    }
}

#[derive(Debug, Clone)]
struct FittedArima {
    order: (u8, u8, u8),
    mu: f64,
    phi: Vec<f64>,
    theta: Vec<f64>,
    sigma2: f64,
    /// Series the ARMA part was fitted on (differenced when `d = 1`).
    history: Vec<f64>,
    shocks: Vec<f64>,
    last_level: f64,
}

impl FittedArima {
    /// MA(∞) weights ψ_0..ψ_{h-1} of the ARMA part.
    fn psi_weights(&self, h: usize) -> Vec<f64> {
        let mut psi = vec![0.0; h];
        if h == 0 {
            return psi;
        }
        psi[0] = 1.0;
        for j in 1..h {
            let mut v = self.theta.get(j - 1).copied().unwrap_or(0.0);
            for (i, ph) in self.phi.iter().enumerate() {
                if j > i {
                    v += ph * psi[j - 1 - i];
                }
            }
            psi[j] = v;
        }
        psi
    }
}

impl FittedLevel for FittedArima {
    fn forecast(&self, horizon: u32) -> LevelForecast {
        let h = horizon.max(1) as usize;
        let mut w = self.history.clone();
        let mut e = self.shocks.clone();
        for _ in 0..h {
            let t = w.len();
            let mut pred = self.mu;
            for (i, ph) in self.phi.iter().enumerate() {
                if t > i {
                    pred += ph * (w[t - 1 - i] - self.mu);
                }
            }
            for (j, th) in self.theta.iter().enumerate() {
                if t > j {
                    pred += th * e[t - 1 - j];
                }
            }
            w.push(pred);
            e.push(0.0);
        }
        let ahead = &w[self.history.len()..];
        let mut psi = self.psi_weights(h);
        let mean = if self.order.1 == 1 {
            let mut acc = 0.0;
            for p in &mut psi {
                acc += *p;
                *p = acc;
            }
            self.last_level + ahead.iter().sum::<f64>()
        } else {
            ahead.last().copied().unwrap_or(self.last_level)
        };
        let variance = self.sigma2 * psi.iter().map(|p| p * p).sum::<f64>();
        LevelForecast { mean, variance }
    }

    fn order(&self) -> (u8, u8, u8) {
        self.order
    }
}
