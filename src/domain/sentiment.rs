//! Scored social samples and their aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ProtocolId;

/// Coarse sentiment label derived from polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Label a polarity: beyond ±0.1 is positive/negative.
    #[must_use]
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > 0.1 {
            Self::Positive
        } else if polarity < -0.1 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

/// Counts extracted from the raw text before cleaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStats {
    pub words: usize,
    pub hashtags: usize,
    pub mentions: usize,
    pub urls: usize,
}

/// A scored text sample. Immutable once scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSample {
    /// Content hash of the cleaned text.
    pub text_hash: String,
    pub protocol: Option<ProtocolId>,
    /// In [-1, 1].
    pub polarity: f64,
    /// In [0, 1].
    pub subjectivity: f64,
    /// Non-negative engagement weight.
    pub engagement: f64,
    pub label: SentimentLabel,
    pub stats: TextStats,
    pub timestamp: DateTime<Utc>,
}

/// Direction of sentiment between the two halves of a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    #[default]
    Flat,
}

/// Engagement-weighted aggregate over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub polarity: f64,
    pub trend: Trend,
    pub samples: usize,
}

impl SentimentSummary {
    /// The neutral summary: no samples, zero polarity, flat trend.
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            polarity: 0.0,
            trend: Trend::Flat,
            samples: 0,
        }
    }
}

impl Default for SentimentSummary {
    fn default() -> Self {
        Self::neutral()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_thresholds() {
        assert_eq!(SentimentLabel::from_polarity(0.5), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_polarity(-0.5), SentimentLabel::Negative);
        assert_eq!(SentimentLabel::from_polarity(0.1), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_polarity(-0.1), SentimentLabel::Neutral);
    }

    #[test]
    fn neutral_summary_is_flat() {
        let summary = SentimentSummary::default();
        assert_eq!(summary.polarity, 0.0);
        assert_eq!(summary.trend, Trend::Flat);
    }
}
