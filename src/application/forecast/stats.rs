//! Descriptive statistics, transforms and the unit-root test.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::Statistics;

use crate::domain::forecast::StationarityResult;

/// Shortest series the unit-root test will run on.
pub const MIN_ADF_OBSERVATIONS: usize = 10;

#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().mean()
}

/// Sample variance (n - 1 denominator). Zero for fewer than two values.
#[must_use]
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().variance()
}

#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().std_dev()
}

/// `ln(p_t / p_{t-1})`, skipping pairs with a non-positive price.
#[must_use]
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}

/// `(v_t - v_{t-1}) / v_{t-1}`, skipping zero bases.
#[must_use]
pub fn pct_changes(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

#[must_use]
pub fn diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Pearson correlation over the common tail of both slices.
///
/// `None` when fewer than three paired points exist or either side is
/// constant.
#[must_use]
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 3 {
        return None;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];
    let (sa, sb) = (a.iter().std_dev(), b.iter().std_dev());
    if sa <= f64::EPSILON || sb <= f64::EPSILON {
        return None;
    }
    let cov = a.iter().covariance(b.iter());
    Some((cov / (sa * sb)).clamp(-1.0, 1.0))
}

/// Two-sided standard normal quantile for a confidence level, e.g.
/// `0.95 → 1.96`.
#[must_use]
pub fn z_for_confidence(level: f64) -> f64 {
    let level = level.clamp(1e-6, 1.0 - 1e-9);
    Normal::new(0.0, 1.0).map_or(f64::NAN, |normal| normal.inverse_cdf(0.5 + level / 2.0))
}

/// Ordinary least squares. Returns coefficients and their standard errors.
///
/// `rows` are regressor vectors of equal width. `None` if the normal matrix
/// is singular or there are no residual degrees of freedom.
pub(crate) fn ols(rows: &[Vec<f64>], y: &[f64]) -> Option<(Vec<f64>, Vec<f64>)> {
    let n = rows.len();
    let k = rows.first()?.len();
    if n != y.len() || n <= k || rows.iter().any(|r| r.len() != k) {
        return None;
    }
    let x = DMatrix::from_row_iterator(n, k, rows.iter().flatten().copied());
    let y = DVector::from_column_slice(y);
    let xt = x.transpose();
    let inv = (&xt * &x).try_inverse()?;
    let beta = &inv * (&xt * &y);
    let rss = (&y - &x * &beta).norm_squared();
    let sigma2 = rss / (n - k) as f64;
    let se = (0..k).map(|i| (sigma2 * inv[(i, i)]).max(0.0).sqrt()).collect();
    Some((beta.iter().copied().collect(), se))
}

/// Augmented Dickey-Fuller test with a constant and one lagged difference.
///
/// Regresses `Δy_t = a + g·y_{t-1} + d·Δy_{t-1}` and compares the t-statistic
/// of `g` with the 5% MacKinnon critical value adjusted for sample size.
/// Series shorter than [`MIN_ADF_OBSERVATIONS`] or with a singular design come
/// back untested (non-stationary).
#[must_use]
pub fn adf_test(values: &[f64]) -> StationarityResult {
    if values.len() < MIN_ADF_OBSERVATIONS {
        return StationarityResult::untested();
    }
    let dy = diff(values);
    let mut rows = Vec::with_capacity(dy.len());
    let mut y = Vec::with_capacity(dy.len());
    for t in 1..dy.len() {
        rows.push(vec![1.0, values[t], dy[t - 1]]);
        y.push(dy[t]);
    }
    let Some((beta, se)) = ols(&rows, &y) else {
        return StationarityResult::untested();
    };
    if se[1] <= 0.0 || !se[1].is_finite() {
        return StationarityResult::untested();
    }
    let statistic = beta[1] / se[1];
    let t = y.len() as f64;
    let critical = -2.8621 - 2.738 / t - 8.36 / (t * t);
    StationarityResult {
        statistic: Some(statistic),
        critical_value: Some(critical),
        stationary: statistic.is_finite() && statistic < critical,
        differences: 0,
    }
}

/// Test `values`, differencing once if the level series is not stationary.
#[must_use]
pub fn stationarity_with_differencing(values: &[f64]) -> StationarityResult {
    let level = adf_test(values);
    if level.stationary {
        return level;
    }
    let once = adf_test(&diff(values));
    if once.stationary {
        return StationarityResult {
            differences: 1,
            ..once
        };
    }
    level
}

/// Mean squared, root mean squared and mean absolute error.
#[must_use]
pub fn errors(predicted: &[f64], actual: &[f64]) -> (f64, f64, f64, usize) {
    let n = predicted.len().min(actual.len());
    if n == 0 {
        return (0.0, 0.0, 0.0, 0);
    }
    let mut sq = 0.0;
    let mut abs = 0.0;
    for (p, a) in predicted.iter().zip(actual).take(n) {
        sq += (p - a).powi(2);
        abs += (p - a).abs();
    }
    let mse = sq / n as f64;
    (mse, mse.sqrt(), abs / n as f64, n)
}
