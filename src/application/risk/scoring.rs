//! Component scoring, factor identification and recommendations.
//!
//! Everything here is a pure function of already-gathered inputs. A
//! component whose inputs are absent scores [`NEUTRAL_SCORE`] and is reported
//! as missing.

use crate::application::governance::OutcomePrediction;
use crate::domain::event::{EventKind, UpgradeEvent};
use crate::domain::governance::{GovernanceProposal, ProposalStatus};
use crate::domain::risk::{
    ComponentScores, RiskComponent, RiskFactor, RiskLevel, CRITICAL_THRESHOLD,
    ELEVATED_THRESHOLD, NEUTRAL_SCORE,
};
use crate::domain::sentiment::SentimentSummary;

/// Normalisation ceilings: an input at or above its ceiling maps to 1.
#[derive(Debug, Clone, Copy)]
pub struct ScoringSettings {
    /// Calldata bytes treated as maximally complex.
    pub complexity_bytes: f64,
    /// Annualized volatility treated as maximal.
    pub volatility_ceiling: f64,
    /// Standard deviation of daily TVL changes treated as maximal.
    pub tvl_volatility_ceiling: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            complexity_bytes: 4_096.0,
            volatility_ceiling: 1.5,
            tvl_volatility_ceiling: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketInputs {
    /// Annualized realized volatility.
    pub volatility: f64,
    /// Correlation of returns with the broad market, if computable.
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LiquidityInputs {
    /// Share held by top holders, in [0, 1].
    pub concentration: Option<f64>,
    /// Standard deviation of recent daily TVL changes.
    pub tvl_change_std: Option<f64>,
}

/// Everything the engine gathered for one upgrade.
#[derive(Debug, Clone, Default)]
pub struct RiskInputs {
    pub events: Vec<UpgradeEvent>,
    pub security_incidents: u32,
    pub proposal: Option<GovernanceProposal>,
    pub prediction: Option<OutcomePrediction>,
    pub market: Option<MarketInputs>,
    pub sentiment: Option<SentimentSummary>,
    pub liquidity: LiquidityInputs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub scores: ComponentScores,
    pub missing: Vec<RiskComponent>,
}

fn unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn pct(v: f64) -> f64 {
    (v * 100.0).clamp(0.0, 100.0)
}

const fn kind_weight(kind: EventKind) -> f64 {
    match kind {
        EventKind::UpgradeExecuted => 1.0,
        EventKind::UpgradeProposed => 0.8,
        EventKind::ParameterChange => 0.5,
        EventKind::Other => 0.3,
        EventKind::GovernanceVote => 0.2,
    }
}

const fn status_term(status: ProposalStatus) -> f64 {
    match status {
        ProposalStatus::Pending => 1.0,
        ProposalStatus::Voting => 0.6,
        ProposalStatus::Approved => 0.0,
        ProposalStatus::Rejected => 0.5,
        ProposalStatus::Expired => 0.8,
    }
}

/// Payload size and type mix, blended with prior security incidents.
#[must_use]
pub fn technical(events: &[UpgradeEvent], incidents: u32, settings: &ScoringSettings) -> Option<f64> {
    if events.is_empty() {
        return None;
    }
    let type_mix = events
        .iter()
        .map(|e| kind_weight(e.kind()))
        .fold(0.0, f64::max);
    let bytes: usize = events.iter().map(|e| e.payload.size_hint()).sum();
    let size = unit(bytes as f64 / settings.complexity_bytes);
    let complexity = 0.5 * type_mix + 0.5 * size;
    let security = (f64::from(incidents) * 0.2).min(1.0);
    Some(pct(complexity * 0.6 + security * 0.4))
}

/// Inverted success probability, quorum shortfall and lifecycle stage.
#[must_use]
pub fn governance(proposal: Option<&GovernanceProposal>, prediction: Option<&OutcomePrediction>) -> Option<f64> {
    let proposal = proposal?;
    let p = prediction.map_or(0.5, |p| p.probability);
    let shortfall = unit(1.0 - proposal.quorum_ratio());
    Some(pct(
        (1.0 - p) * 0.5 + shortfall * 0.3 + status_term(proposal.status()) * 0.2,
    ))
}

/// Realized volatility, market correlation and negative sentiment.
#[must_use]
pub fn market(
    inputs: Option<&MarketInputs>,
    sentiment: Option<&SentimentSummary>,
    settings: &ScoringSettings,
) -> Option<f64> {
    let inputs = inputs?;
    let vol = unit(inputs.volatility / settings.volatility_ceiling);
    let corr = unit(inputs.correlation.unwrap_or(0.0));
    let negative = sentiment.map_or(0.5, |s| unit((1.0 - s.polarity) / 2.0));
    Some(pct(vol * 0.6 + corr * 0.25 + negative * 0.15))
}

/// Holder concentration and TVL-trend volatility. A missing half is
/// substituted by 0.5; `complete` reports whether both were present.
#[must_use]
pub fn liquidity(inputs: &LiquidityInputs, settings: &ScoringSettings) -> Option<(f64, bool)> {
    if inputs.concentration.is_none() && inputs.tvl_change_std.is_none() {
        return None;
    }
    let concentration = inputs.concentration.map_or(0.5, unit);
    let trend = inputs
        .tvl_change_std
        .map_or(0.5, |s| unit(s / settings.tvl_volatility_ceiling));
    let complete = inputs.concentration.is_some() && inputs.tvl_change_std.is_some();
    Some((pct(concentration * 0.6 + trend * 0.4), complete))
}

#[must_use]
pub fn score(inputs: &RiskInputs, settings: &ScoringSettings) -> Scored {
    let mut missing = Vec::new();
    let mut take = |component: RiskComponent, value: Option<f64>| {
        value.unwrap_or_else(|| {
            missing.push(component);
            NEUTRAL_SCORE
        })
    };
    let technical = take(
        RiskComponent::Technical,
        technical(&inputs.events, inputs.security_incidents, settings),
    );
    let governance = take(
        RiskComponent::Governance,
        governance(inputs.proposal.as_ref(), inputs.prediction.as_ref()),
    );
    let market = take(
        RiskComponent::Market,
        market(inputs.market.as_ref(), inputs.sentiment.as_ref(), settings),
    );
    let liquidity = match liquidity(&inputs.liquidity, settings) {
        Some((value, complete)) => {
            if !complete {
                missing.push(RiskComponent::Liquidity);
            }
            value
        }
        None => {
            missing.push(RiskComponent::Liquidity);
            NEUTRAL_SCORE
        }
    };
    Scored {
        scores: ComponentScores {
            technical,
            governance,
            market,
            liquidity,
        },
        missing,
    }
}

/// Components at or above the critical threshold, highest first; otherwise
/// the single highest component. Ties keep declaration order. Independent of
/// the composite's classification.
#[must_use]
pub fn factors(scores: &ComponentScores) -> Vec<RiskFactor> {
    let mut flagged: Vec<RiskFactor> = scores
        .iter()
        .filter(|(_, s)| *s >= CRITICAL_THRESHOLD)
        .map(|(component, score)| RiskFactor { component, score })
        .collect();
    if flagged.is_empty() {
        let mut best = RiskFactor {
            component: RiskComponent::Technical,
            score: scores.technical,
        };
        for (component, score) in scores.iter().skip(1) {
            if score > best.score {
                best = RiskFactor { component, score };
            }
        }
        flagged.push(best);
    }
    flagged.sort_by(|a, b| b.score.total_cmp(&a.score));
    flagged
}

#[must_use]
pub fn recommendation(level: RiskLevel, leading: RiskComponent) -> String {
    match level {
        RiskLevel::Critical => format!(
            "CRITICAL risk led by {leading}: avoid new exposure until the upgrade settles"
        ),
        RiskLevel::Elevated => format!(
            "ELEVATED risk led by {leading}: reduce position size and monitor closely"
        ),
        RiskLevel::Nominal => format!(
            "NOMINAL risk, leading factor {leading}: proceed with standard monitoring"
        ),
    }
}

/// Mitigation steps for every component at medium (≥ 40) or high (≥ 70) risk.
#[must_use]
pub fn mitigations(scores: &ComponentScores) -> Vec<String> {
    let mut out = Vec::new();
    for (component, score) in scores.iter() {
        if score < ELEVATED_THRESHOLD {
            continue;
        }
        let high = score >= CRITICAL_THRESHOLD;
        let steps: &[&str] = match (component, high) {
            (RiskComponent::Technical, true) => &[
                "Conduct thorough smart contract audit before upgrade",
                "Implement emergency pause functionality",
            ],
            (RiskComponent::Technical, false) => &["Monitor smart contract events closely"],
            (RiskComponent::Governance, true) => &[
                "Increase governance participation incentives",
                "Extend proposal voting period",
            ],
            (RiskComponent::Governance, false) => &["Monitor governance proposal outcomes"],
            (RiskComponent::Market, true) => &[
                "Consider hedging strategies for price volatility",
                "Monitor market sentiment closely",
            ],
            (RiskComponent::Market, false) => &["Track price movements during upgrade"],
            (RiskComponent::Liquidity, true) => &[
                "Ensure sufficient liquidity before upgrade",
                "Monitor trading volume patterns",
            ],
            (RiskComponent::Liquidity, false) => &["Watch for unusual trading activity"],
        };
        out.extend(steps.iter().map(|s| (*s).to_string()));
    }
    if out.is_empty() {
        out.push("Continue monitoring all risk factors".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::{scores, upgrade_event, voting_proposal};

    #[test]
    fn empty_inputs_are_all_neutral() {
        let scored = score(&RiskInputs::default(), &ScoringSettings::default());
        assert_eq!(scored.scores, scores(50.0, 50.0, 50.0, 50.0));
        assert_eq!(scored.missing.len(), 4);
    }

    #[test]
    fn technical_uses_incidents_and_type_mix() {
        let events = vec![upgrade_event("ethereum", "aave", "0x1", 0)];
        let settings = ScoringSettings::default();
        let clean = technical(&events, 0, &settings).unwrap();
        let incidents = technical(&events, 5, &settings).unwrap();
        assert!(incidents > clean);
        assert!((incidents - clean - 40.0).abs() < 1e-9);
        // type 0.8, size 512/4096
        let expected = (0.5 * 0.8 + 0.5 * 0.125) * 0.6 * 100.0;
        assert!((clean - expected).abs() < 1e-9);
    }

    #[test]
    fn governance_inverts_success_probability() {
        let p = voting_proposal("1", "aave", 0.0);
        let likely = OutcomePrediction {
            probability: 0.9,
            low_confidence: false,
            analogues: 5,
        };
        let unlikely = OutcomePrediction {
            probability: 0.1,
            ..likely
        };
        let a = governance(Some(&p), Some(&likely)).unwrap();
        let b = governance(Some(&p), Some(&unlikely)).unwrap();
        assert!(b > a);
        assert!((a - (0.1 * 0.5 + 0.6 * 0.2) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn negative_sentiment_raises_market_score() {
        let inputs = MarketInputs {
            volatility: 0.75,
            correlation: Some(0.4),
        };
        let settings = ScoringSettings::default();
        let bad = SentimentSummary {
            polarity: -1.0,
            ..SentimentSummary::neutral()
        };
        let good = SentimentSummary {
            polarity: 1.0,
            ..SentimentSummary::neutral()
        };
        let with_bad = market(Some(&inputs), Some(&bad), &settings).unwrap();
        let with_good = market(Some(&inputs), Some(&good), &settings).unwrap();
        assert!((with_bad - with_good - 15.0).abs() < 1e-9);
    }

    #[test]
    fn half_missing_liquidity_is_partial() {
        let inputs = RiskInputs {
            liquidity: LiquidityInputs {
                concentration: Some(1.0),
                tvl_change_std: None,
            },
            ..RiskInputs::default()
        };
        let scored = score(&inputs, &ScoringSettings::default());
        assert!((scored.scores.liquidity - 80.0).abs() < 1e-9);
        assert!(scored.missing.contains(&RiskComponent::Liquidity));
    }

    #[test]
    fn factors_report_high_components_independent_of_level() {
        let f = factors(&scores(80.0, 20.0, 30.0, 10.0));
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].component, RiskComponent::Technical);

        let f = factors(&scores(75.0, 20.0, 90.0, 70.0));
        let order: Vec<_> = f.iter().map(|x| x.component).collect();
        assert_eq!(
            order,
            vec![RiskComponent::Market, RiskComponent::Technical, RiskComponent::Liquidity]
        );
    }

    #[test]
    fn single_max_ties_break_in_declaration_order() {
        let f = factors(&scores(30.0, 50.0, 50.0, 10.0));
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].component, RiskComponent::Governance);
    }

    #[test]
    fn mitigations_by_band() {
        let m = mitigations(&scores(80.0, 45.0, 10.0, 10.0));
        assert_eq!(m.len(), 3);
        assert_eq!(m[0], "Conduct thorough smart contract audit before upgrade");
        assert_eq!(m[2], "Monitor governance proposal outcomes");
        assert_eq!(
            mitigations(&scores(0.0, 0.0, 0.0, 0.0)),
            vec!["Continue monitoring all risk factors".to_string()]
        );
    }
}
