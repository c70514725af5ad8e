//! Time series supplied by the market data feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single timestamped observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub at: DateTime<Utc>,
    pub value: f64,
}

impl Observation {
    pub fn new(at: DateTime<Utc>, value: f64) -> Self {
        Self { at, value }
    }
}

/// An ordered series of observations (price, TVL, index level).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    points: Vec<Observation>,
}

impl Series {
    /// Build a series, sorting by timestamp and dropping non-finite values.
    #[must_use]
    pub fn new(mut points: Vec<Observation>) -> Self {
        points.retain(|p| p.value.is_finite());
        points.sort_by_key(|p| p.at);
        Self { points }
    }

    /// Build a series from bare values spaced one day apart, ending at `end`.
    #[must_use]
    pub fn daily(values: &[f64], end: DateTime<Utc>) -> Self {
        let n = values.len() as i64;
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| Observation::new(end - chrono::Duration::days(n - 1 - i as i64), *v))
            .collect();
        Self::new(points)
    }

    #[must_use]
    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Timestamp of the newest observation.
    #[must_use]
    pub fn last_at(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.at)
    }

    /// Values observed in `[start, end]`.
    #[must_use]
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<f64> {
        let from = self.points.partition_point(|p| p.at < start);
        let to = self.points.partition_point(|p| p.at <= end);
        self.points[from..to.max(from)].iter().map(|p| p.value).collect()
    }

    /// The trailing `n` observations.
    #[must_use]
    pub fn tail(&self, n: usize) -> &[Observation] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }
}
