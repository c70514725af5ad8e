//! Builders for domain primitives used across tests.
//!
//! Concise factories for events, proposals, assessments and forecasts so
//! tests focus on assertions rather than construction boilerplate.

use chrono::{DateTime, Duration, Utc};

use crate::domain::event::{EventKey, EventPayload, UpgradeEvent};
use crate::domain::forecast::{
    ConfidenceInterval, ForecastModel, LiquidityForecast, LiquidityRegime, StationarityResult,
    VolatilityForecast,
};
use crate::domain::governance::{GovernanceProposal, Platform, ProposalStatus, TallySnapshot};
use crate::domain::id::{NetworkId, ProposalId, ProtocolId, TxHash, UpgradeId};
use crate::domain::impact::UpgradeImpact;
use crate::domain::risk::{ComponentScores, RiskAssessment, RiskLevel};

pub fn protocol(id: &str) -> ProtocolId {
    ProtocolId::from(id)
}

pub fn upgrade(id: &str) -> UpgradeId {
    UpgradeId::from(id)
}

/// An `upgrade_proposed` event for proposal `7` of `protocol`.
pub fn upgrade_event(network: &str, protocol_id: &str, tx: &str, log_index: u64) -> UpgradeEvent {
    let protocol = ProtocolId::from(protocol_id);
    let proposal = ProposalId::from("7");
    UpgradeEvent {
        key: EventKey {
            network: NetworkId::from(network),
            tx_hash: TxHash::normalized(tx),
            log_index,
        },
        upgrade: UpgradeId::for_proposal(&protocol, &proposal),
        protocol,
        block_number: 100 + log_index,
        payload: EventPayload::UpgradeProposed {
            proposal_id: Some(proposal),
            calldata_bytes: 512,
        },
        ingested_at: Utc::now(),
    }
}

/// A voting proposal that started a day ago and ends in three.
pub fn voting_proposal(id: &str, protocol_id: &str, quorum: f64) -> GovernanceProposal {
    let start = Utc::now() - Duration::days(1);
    GovernanceProposal::new(
        Platform::Snapshot,
        ProposalId::from(id),
        ProtocolId::from(protocol_id),
        format!("Proposal {id}"),
        ProposalStatus::Voting,
        quorum,
        start,
        start + Duration::days(4),
    )
}

pub fn tally(at: DateTime<Utc>, votes_for: f64, votes_against: f64) -> TallySnapshot {
    TallySnapshot {
        at,
        votes_for,
        votes_against,
        votes_abstain: 0.0,
    }
}

pub fn scores(technical: f64, governance: f64, market: f64, liquidity: f64) -> ComponentScores {
    ComponentScores {
        technical,
        governance,
        market,
        liquidity,
    }
}

/// A complete assessment with the given composite and timestamp.
pub fn assessment(upgrade_id: &str, composite: f64, computed_at: DateTime<Utc>) -> RiskAssessment {
    let upgrade = UpgradeId::from(upgrade_id);
    RiskAssessment {
        protocol: upgrade.protocol(),
        upgrade,
        components: scores(composite, composite, composite, composite),
        composite,
        level: RiskLevel::classify(composite),
        factors: Vec::new(),
        recommendation: String::new(),
        mitigations: Vec::new(),
        partial: false,
        missing_inputs: Vec::new(),
        model_version: "test".into(),
        computed_at,
    }
}

pub fn volatility(protocol_id: &str, point: f64, model: ForecastModel) -> VolatilityForecast {
    VolatilityForecast {
        protocol: ProtocolId::from(protocol_id),
        model,
        point,
        interval: ConfidenceInterval::around(point, 1.96, point * 0.1, 0.95, Some(0.0)),
        horizon: 1,
        stationarity: StationarityResult::untested(),
        parameters: Vec::new(),
        observations: 60,
        degraded: model == ForecastModel::Fallback,
        series_end: Some(Utc::now()),
        computed_at: Utc::now(),
    }
}

pub fn liquidity(protocol_id: &str, current: f64, point: f64) -> LiquidityForecast {
    LiquidityForecast {
        protocol: ProtocolId::from(protocol_id),
        model: ForecastModel::Arima,
        point,
        interval: ConfidenceInterval::around(point, 1.96, current * 0.05, 0.95, Some(0.0)),
        horizon: 1,
        stationarity: StationarityResult::untested(),
        order: Some((1, 1, 0)),
        current_tvl: current,
        predicted_change_pct: (point - current) / current * 100.0,
        regime: LiquidityRegime::Stable,
        correlated_sources: Vec::new(),
        degraded: false,
        series_end: Some(Utc::now()),
        computed_at: Utc::now(),
    }
}

/// Impact record with no measured windows.
pub fn impact(upgrade_id: &str, computed_at: DateTime<Utc>) -> UpgradeImpact {
    let upgrade = UpgradeId::from(upgrade_id);
    UpgradeImpact {
        protocol: upgrade.protocol(),
        upgrade,
        anchor: computed_at - Duration::days(1),
        volatility: None,
        liquidity: None,
        flows: Vec::new(),
        computed_at,
    }
}

/// `n` daily prices following a deterministic zig-zag around `start`.
pub fn zigzag_prices(n: usize, start: f64, amplitude: f64) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let wiggle = ((i * 7919) % 13) as f64 / 13.0 - 0.5;
            start * (1.0 + amplitude * wiggle)
        })
        .collect()
}
