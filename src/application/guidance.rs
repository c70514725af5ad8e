//! Execution guidance: a pure function of the latest assessment and
//! forecasts.

use chrono::{DateTime, Duration, Utc};

use crate::domain::forecast::{LiquidityForecast, LiquidityRegime, VolatilityForecast};
use crate::domain::guidance::{ExecutionGuidance, ExecutionWindow, GuidanceAction};
use crate::domain::risk::{RiskAssessment, RiskComponent, RiskLevel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceSettings {
    pub nominal_window: Duration,
    pub elevated_window: Duration,
    pub critical_window: Duration,
    /// Stop distance in horizon standard deviations.
    pub stop_loss_multiplier: f64,
    pub min_stop_loss: f64,
    /// Used when no volatility forecast exists yet.
    pub default_stop_loss: f64,
    pub periods_per_year: f64,
}

impl Default for GuidanceSettings {
    fn default() -> Self {
        Self {
            nominal_window: Duration::hours(72),
            elevated_window: Duration::hours(24),
            critical_window: Duration::hours(6),
            stop_loss_multiplier: 2.0,
            min_stop_loss: 0.01,
            default_stop_loss: 0.05,
            periods_per_year: 365.0,
        }
    }
}

impl GuidanceSettings {
    #[must_use]
    pub fn window_for(&self, level: RiskLevel) -> Duration {
        match level {
            RiskLevel::Nominal => self.nominal_window,
            RiskLevel::Elevated => self.elevated_window,
            RiskLevel::Critical => self.critical_window,
        }
    }
}

/// Build guidance for the assessment's upgrade.
///
/// The entry window narrows as the level worsens and the stop-loss widens
/// with forecast volatility. Missing or degraded forecasts, or a partial
/// assessment, mark the result partial. `computed_at` is the newest input
/// timestamp, so identical inputs give identical guidance.
#[must_use]
pub fn guide(
    assessment: &RiskAssessment,
    volatility: Option<&VolatilityForecast>,
    liquidity: Option<&LiquidityForecast>,
    settings: &GuidanceSettings,
) -> ExecutionGuidance {
    let computed_at = latest_input(assessment, volatility, liquidity);
    let level = assessment.level;
    let action = GuidanceAction::for_level(level);
    let window = ExecutionWindow {
        opens_at: computed_at,
        closes_at: computed_at + settings.window_for(level),
    };
    let stop_loss = volatility.map_or(settings.default_stop_loss, |v| {
        let sigma = v.horizon_sigma(settings.periods_per_year);
        if sigma.is_finite() {
            (settings.stop_loss_multiplier * sigma).max(settings.min_stop_loss)
        } else {
            settings.default_stop_loss
        }
    });
    let dominant_driver = assessment
        .factors
        .first()
        .map(|f| f.component)
        .unwrap_or_else(|| strongest(assessment));
    let partial = assessment.partial
        || volatility.map_or(true, |v| v.degraded)
        || liquidity.map_or(true, |l| l.degraded);

    let mut recommendation = format!(
        "{}: {} risk ({:.0}) driven by {} ({:.0}); stop-loss {:.1}%; entry window {}h",
        action.as_str(),
        level,
        assessment.composite,
        dominant_driver,
        assessment.components.get(dominant_driver),
        stop_loss * 100.0,
        settings.window_for(level).num_hours(),
    );
    if let Some(l) = liquidity {
        if l.regime == LiquidityRegime::Distribution {
            recommendation.push_str("; TVL in distribution regime");
        }
    }
    if partial {
        recommendation.push_str(" [partial inputs]");
    }

    ExecutionGuidance {
        upgrade: assessment.upgrade.clone(),
        level,
        action,
        window,
        stop_loss,
        dominant_driver,
        recommendation,
        partial,
        computed_at,
    }
}

fn latest_input(
    assessment: &RiskAssessment,
    volatility: Option<&VolatilityForecast>,
    liquidity: Option<&LiquidityForecast>,
) -> DateTime<Utc> {
    [
        Some(assessment.computed_at),
        volatility.map(|v| v.computed_at),
        liquidity.map(|l| l.computed_at),
    ]
    .into_iter()
    .flatten()
    .max()
    .unwrap_or(assessment.computed_at)
}

fn strongest(assessment: &RiskAssessment) -> RiskComponent {
    let mut best = (RiskComponent::Technical, assessment.components.technical);
    for (component, score) in assessment.components.iter().skip(1) {
        if score > best.1 {
            best = (component, score);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::forecast::ForecastModel;
    use crate::testkit::domain::{assessment, liquidity, volatility};

    fn at_level(composite: f64) -> RiskAssessment {
        let mut a = assessment("aave:1", composite, Utc::now());
        a.level = RiskLevel::classify(composite);
        a.partial = false;
        a
    }

    #[test]
    fn window_narrows_as_risk_worsens() {
        let settings = GuidanceSettings::default();
        let vol = volatility("aave", 0.5, ForecastModel::Garch);
        let liq = liquidity("aave", 100.0, 101.0);
        let nominal = guide(&at_level(20.0), Some(&vol), Some(&liq), &settings);
        let elevated = guide(&at_level(50.0), Some(&vol), Some(&liq), &settings);
        let critical = guide(&at_level(90.0), Some(&vol), Some(&liq), &settings);

        assert!(nominal.window.duration() > elevated.window.duration());
        assert!(elevated.window.duration() > critical.window.duration());
        assert_eq!(critical.action, GuidanceAction::Avoid);
        assert!(critical.recommendation.starts_with("AVOID"));
    }

    #[test]
    fn stop_loss_widens_with_volatility() {
        let settings = GuidanceSettings::default();
        let a = at_level(50.0);
        let calm = guide(&a, Some(&volatility("aave", 0.2, ForecastModel::Garch)), None, &settings);
        let wild = guide(&a, Some(&volatility("aave", 1.2, ForecastModel::Garch)), None, &settings);
        assert!(wild.stop_loss > calm.stop_loss);
        assert!(calm.stop_loss >= settings.min_stop_loss);
    }

    #[test]
    fn missing_or_degraded_inputs_are_partial() {
        let settings = GuidanceSettings::default();
        let a = at_level(50.0);
        let vol = volatility("aave", 0.5, ForecastModel::Fallback);
        let g = guide(&a, Some(&vol), None, &settings);
        assert!(g.partial);
        assert!(g.recommendation.ends_with("[partial inputs]"));
    }

    #[test]
    fn computed_at_is_latest_input_and_output_is_deterministic() {
        let settings = GuidanceSettings::default();
        let a = at_level(50.0);
        let mut vol = volatility("aave", 0.5, ForecastModel::Garch);
        vol.computed_at = a.computed_at + Duration::minutes(3);
        let first = guide(&a, Some(&vol), None, &settings);
        let second = guide(&a, Some(&vol), None, &settings);
        assert_eq!(first, second);
        assert_eq!(first.computed_at, vol.computed_at);
        assert_eq!(first.window.opens_at, vol.computed_at);
    }
}
