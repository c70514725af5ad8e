//! Text scoring and engagement-weighted aggregation.

mod lexicon;

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use uuid::Uuid;

use crate::domain::id::ProtocolId;
use crate::domain::sentiment::{
    SentimentLabel, SentimentSample, SentimentSummary, TextStats, Trend,
};

/// Half-window mean difference beyond which the trend is not flat.
pub const TREND_EPSILON: f64 = 0.05;
/// Tokens after a negation that it still flips.
const NEGATION_SCOPE: usize = 3;
const NEGATION_FACTOR: f64 = -0.75;

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("static pattern"));
static MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\w+").expect("static pattern"));
static HASHTAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#(\w+)").expect("static pattern"));
static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static pattern"));
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s']").expect("static pattern"));

/// Strip URLs, mentions, hashtag markers and markup, then lowercase.
///
/// Hashtag words are kept without the `#`; mentions are removed entirely.
#[must_use]
pub fn clean(text: &str) -> String {
    let text = MARKUP.replace_all(text, " ");
    let text = URL.replace_all(&text, " ");
    let text = MENTION.replace_all(&text, " ");
    let text = HASHTAG.replace_all(&text, "$1");
    let text = PUNCTUATION.replace_all(&text, "");
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[must_use]
pub fn text_stats(text: &str) -> TextStats {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    TextStats {
        words: tokens.len(),
        hashtags: tokens.iter().filter(|t| t.starts_with('#') && t.len() > 1).count(),
        mentions: tokens.iter().filter(|t| t.starts_with('@') && t.len() > 1).count(),
        urls: tokens.iter().filter(|t| URL.is_match(t)).count(),
    }
}

/// Polarity and subjectivity of already-cleaned text.
///
/// Polarity is the mean valence of matched words after negation and
/// intensifier adjustment; subjectivity is their mean subjectivity.
#[must_use]
pub fn polarity_subjectivity(cleaned: &str) -> (f64, f64) {
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    let mut total = 0.0;
    let mut subjective = 0.0;
    let mut matched = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        let Some((mut polarity, subjectivity)) = lexicon::valence(token) else {
            continue;
        };
        if let Some(prev) = i.checked_sub(1).and_then(|j| lexicon::intensity(tokens[j])) {
            polarity *= prev;
        }
        let negated = tokens[i.saturating_sub(NEGATION_SCOPE)..i]
            .iter()
            .any(|t| lexicon::is_negation(t));
        if negated {
            polarity *= NEGATION_FACTOR;
        }
        total += polarity.clamp(-1.0, 1.0);
        subjective += subjectivity;
        matched += 1;
    }
    if matched == 0 {
        return (0.0, 0.0);
    }
    let n = matched as f64;
    ((total / n).clamp(-1.0, 1.0), (subjective / n).clamp(0.0, 1.0))
}

/// Stable content hash of cleaned text.
#[must_use]
pub fn text_hash(cleaned: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, cleaned.as_bytes()).to_string()
}

#[derive(Debug, Clone, Copy)]
pub struct SentimentAnalyzer {
    /// Trailing window for aggregation.
    window: Duration,
    /// |polarity| above this raises an alert.
    alert_threshold: f64,
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new(Duration::hours(24), 0.6)
    }
}

impl SentimentAnalyzer {
    #[must_use]
    pub const fn new(window: Duration, alert_threshold: f64) -> Self {
        Self {
            window,
            alert_threshold,
        }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub const fn alert_threshold(&self) -> f64 {
        self.alert_threshold
    }

    /// Score one text.
    #[must_use]
    pub fn score(
        &self,
        text: &str,
        protocol: Option<ProtocolId>,
        engagement: f64,
        timestamp: DateTime<Utc>,
    ) -> SentimentSample {
        let cleaned = clean(text);
        let (polarity, subjectivity) = polarity_subjectivity(&cleaned);
        SentimentSample {
            text_hash: text_hash(&cleaned),
            protocol,
            polarity,
            subjectivity,
            engagement: if engagement.is_finite() { engagement.max(0.0) } else { 0.0 },
            label: SentimentLabel::from_polarity(polarity),
            stats: text_stats(text),
            timestamp,
        }
    }

    /// Engagement-weighted polarity over the window ending at `now`, with the
    /// trend from comparing the older and newer halves of the window.
    ///
    /// The halves split at `now - window / 2`. With either half empty the
    /// trend is flat.
    #[must_use]
    pub fn aggregate(&self, samples: &[SentimentSample], now: DateTime<Utc>) -> SentimentSummary {
        let since = now - self.window;
        let mut recent: Vec<&SentimentSample> = samples
            .iter()
            .filter(|s| s.timestamp >= since && s.timestamp <= now)
            .collect();
        if recent.is_empty() {
            return SentimentSummary::neutral();
        }
        recent.sort_by_key(|s| s.timestamp);
        let polarity = weighted_polarity(&recent);

        let midpoint = now - self.window / 2;
        let split = recent.partition_point(|s| s.timestamp < midpoint);
        let (older, newer) = recent.split_at(split);
        let trend = if older.is_empty() || newer.is_empty() {
            Trend::Flat
        } else {
            let delta = weighted_polarity(newer) - weighted_polarity(older);
            if delta > TREND_EPSILON {
                Trend::Rising
            } else if delta < -TREND_EPSILON {
                Trend::Falling
            } else {
                Trend::Flat
            }
        };
        SentimentSummary {
            polarity,
            trend,
            samples: recent.len(),
        }
    }

    /// Samples strong enough to alert on.
    #[must_use]
    pub fn alerts<'a>(&self, samples: &'a [SentimentSample]) -> Vec<&'a SentimentSample> {
        samples
            .iter()
            .filter(|s| s.polarity.abs() > self.alert_threshold)
            .collect()
    }
}

/// Weighted by engagement; unweighted when every weight is zero.
fn weighted_polarity(samples: &[&SentimentSample]) -> f64 {
    let weight: f64 = samples.iter().map(|s| s.engagement).sum();
    if weight > 0.0 {
        samples.iter().map(|s| s.polarity * s.engagement).sum::<f64>() / weight
    } else if samples.is_empty() {
        0.0
    } else {
        samples.iter().map(|s| s.polarity).sum::<f64>() / samples.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> SentimentAnalyzer {
        SentimentAnalyzer::default()
    }

    #[test]
    fn cleaning_strips_urls_mentions_and_markup() {
        let cleaned = clean("<b>Great</b> upgrade @alice https://x.io/p #DeFi www.example.com");
        assert_eq!(cleaned, "great upgrade defi");
    }

    #[test]
    fn cleaning_keeps_apostrophes_and_drops_punctuation() {
        assert_eq!(clean("Don't   PANIC!!! (yet)"), "don't panic yet");
        assert_eq!(clean("see HTTPS://Example.com/x?y=1, now"), "see now");
    }

    #[test]
    fn polarity_ignores_noise() {
        let a = analyzer().score("Great upgrade", None, 1.0, Utc::now());
        let b = analyzer().score("great   upgrade @bob https://t.co/x", None, 1.0, Utc::now());
        assert_eq!(a.polarity, b.polarity);
        assert_eq!(a.text_hash, b.text_hash);
    }

    #[test]
    fn negation_flips_sign() {
        let (pos, _) = polarity_subjectivity("this is safe");
        let (neg, _) = polarity_subjectivity("this is not safe");
        assert!(pos > 0.0);
        assert!(neg < 0.0);
    }

    #[test]
    fn intensifier_strengthens() {
        let (plain, _) = polarity_subjectivity("bad");
        let (very, _) = polarity_subjectivity("very bad");
        assert!(very < plain);
    }

    #[test]
    fn unknown_words_are_neutral() {
        let sample = analyzer().score("the quick brown fox", None, 0.0, Utc::now());
        assert_eq!(sample.polarity, 0.0);
        assert_eq!(sample.subjectivity, 0.0);
        assert_eq!(sample.label, SentimentLabel::Neutral);
    }

    #[test]
    fn stats_count_raw_tokens() {
        let stats = text_stats("gm @alice #defi #eth https://x.io");
        assert_eq!(stats.words, 5);
        assert_eq!(stats.mentions, 1);
        assert_eq!(stats.hashtags, 2);
        assert_eq!(stats.urls, 1);
    }

    #[test]
    fn empty_aggregate_is_neutral() {
        let summary = analyzer().aggregate(&[], Utc::now());
        assert_eq!(summary.polarity, 0.0);
        assert_eq!(summary.trend, Trend::Flat);
    }

    #[test]
    fn aggregate_weights_by_engagement_and_detects_trend() {
        let now = Utc::now();
        let a = analyzer();
        let samples = vec![
            a.score("terrible scam", None, 1.0, now - Duration::hours(20)),
            a.score("bad bug", None, 1.0, now - Duration::hours(16)),
            a.score("great upgrade", None, 10.0, now - Duration::hours(6)),
            a.score("excellent", None, 10.0, now),
        ];
        let summary = a.aggregate(&samples, now);
        assert_eq!(summary.samples, 4);
        assert!(summary.polarity > 0.5);
        assert_eq!(summary.trend, Trend::Rising);
    }

    fn sample_at(polarity: f64, timestamp: DateTime<Utc>) -> SentimentSample {
        SentimentSample {
            text_hash: format!("{polarity}-{timestamp}"),
            protocol: None,
            polarity,
            subjectivity: 0.5,
            engagement: 1.0,
            label: SentimentLabel::from_polarity(polarity),
            stats: TextStats::default(),
            timestamp,
        }
    }

    #[test]
    fn trend_compares_window_halves_not_sample_halves() {
        let now = Utc::now();
        let samples = vec![
            sample_at(-0.2, now - Duration::hours(20)),
            sample_at(0.8, now - Duration::hours(6)),
            sample_at(-0.4, now - Duration::hours(3)),
            sample_at(-0.4, now - Duration::hours(1)),
        ];
        let summary = analyzer().aggregate(&samples, now);
        assert_eq!(summary.samples, 4);
        assert_eq!(summary.trend, Trend::Rising);
    }

    #[test]
    fn one_sided_window_is_flat() {
        let now = Utc::now();
        let samples = vec![
            sample_at(-0.9, now - Duration::hours(3)),
            sample_at(0.9, now - Duration::hours(1)),
        ];
        assert_eq!(analyzer().aggregate(&samples, now).trend, Trend::Flat);
    }

    #[test]
    fn samples_outside_window_are_ignored() {
        let now = Utc::now();
        let a = analyzer();
        let samples = vec![a.score("terrible", None, 1.0, now - Duration::days(3))];
        assert_eq!(a.aggregate(&samples, now), SentimentSummary::neutral());
    }

    #[test]
    fn alerts_on_strong_polarity() {
        let a = analyzer();
        let now = Utc::now();
        let samples = vec![a.score("scam", None, 1.0, now), a.score("upgrade", None, 1.0, now)];
        assert_eq!(a.alerts(&samples).len(), 1);
    }
}
