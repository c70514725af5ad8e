//! Outcome prediction from analogous historical proposals.
//!
//! Each finished proposal is reduced to its tally at the same fraction of its
//! voting period as the proposal being predicted. The k nearest analogues by
//! (for-share, quorum ratio) vote on the outcome, weighted by inverse
//! distance. Analogues from other protocols count, but at a distance penalty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::governance::{GovernanceProposal, ProposalStatus, TallySnapshot};

/// Quorum ratios are capped here so a landslide turnout does not dominate
/// the distance.
const MAX_QUORUM_RATIO: f64 = 2.0;
const DISTANCE_FLOOR: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomePrediction {
    /// Probability the proposal is approved.
    pub probability: f64,
    /// Too few analogues; `probability` is the neutral 0.5.
    pub low_confidence: bool,
    pub analogues: usize,
}

impl OutcomePrediction {
    #[must_use]
    pub const fn neutral(analogues: usize) -> Self {
        Self {
            probability: 0.5,
            low_confidence: true,
            analogues,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OutcomePredictor {
    k: usize,
    min_analogues: usize,
    cross_protocol_penalty: f64,
}

impl Default for OutcomePredictor {
    fn default() -> Self {
        Self::new(5, 3, 0.5)
    }
}

impl OutcomePredictor {
    #[must_use]
    pub const fn new(k: usize, min_analogues: usize, cross_protocol_penalty: f64) -> Self {
        Self {
            k,
            min_analogues,
            cross_protocol_penalty,
        }
    }

    #[must_use]
    pub fn predict(
        &self,
        proposal: &GovernanceProposal,
        history: &[GovernanceProposal],
        now: DateTime<Utc>,
    ) -> OutcomePrediction {
        match proposal.status() {
            ProposalStatus::Approved => return certain(1.0),
            ProposalStatus::Rejected | ProposalStatus::Expired => return certain(0.0),
            ProposalStatus::Pending | ProposalStatus::Voting => {}
        }
        let progress = proposal.progress_at(now);
        let target = features(proposal.latest_tally(), proposal.quorum);

        let mut neighbours: Vec<(f64, f64)> = history
            .iter()
            .filter(|h| h.status().is_terminal() && h.key() != proposal.key())
            .filter_map(|h| {
                let at = h.starts_at + (h.ends_at - h.starts_at) * ((progress * 1_000.0) as i32) / 1_000;
                let tally = h.tally_at(at).or_else(|| h.tallies().first())?;
                let f = features(Some(tally), h.quorum);
                let mut d = ((f.0 - target.0).powi(2) + (f.1 - target.1).powi(2)).sqrt();
                if h.protocol != proposal.protocol {
                    d += self.cross_protocol_penalty;
                }
                let outcome = if h.status() == ProposalStatus::Approved { 1.0 } else { 0.0 };
                Some((d, outcome))
            })
            .collect();

        if neighbours.len() < self.min_analogues {
            return OutcomePrediction::neutral(neighbours.len());
        }
        neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));
        neighbours.truncate(self.k.max(1));
        let (mut num, mut den) = (0.0, 0.0);
        for (d, outcome) in &neighbours {
            let w = 1.0 / (d + DISTANCE_FLOOR);
            num += w * outcome;
            den += w;
        }
        OutcomePrediction {
            probability: (num / den).clamp(0.0, 1.0),
            low_confidence: false,
            analogues: neighbours.len(),
        }
    }
}

fn certain(probability: f64) -> OutcomePrediction {
    OutcomePrediction {
        probability,
        low_confidence: false,
        analogues: 0,
    }
}

fn features(tally: Option<&TallySnapshot>, quorum: f64) -> (f64, f64) {
    let Some(t) = tally else {
        return (0.5, 0.0);
    };
    let ratio = if quorum > 0.0 { t.total() / quorum } else { 1.0 };
    (t.for_share(), ratio.min(MAX_QUORUM_RATIO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::governance::Platform;
    use crate::domain::id::{ProposalId, ProtocolId};
    use chrono::Duration;

    fn finished(id: &str, protocol: &str, votes_for: f64, against: f64, status: ProposalStatus) -> GovernanceProposal {
        let start = Utc::now() - Duration::days(10);
        let mut p = GovernanceProposal::new(
            Platform::Snapshot,
            ProposalId::from(id),
            ProtocolId::from(protocol),
            "t",
            ProposalStatus::Voting,
            100.0,
            start,
            start + Duration::days(4),
        );
        p.record_tally(TallySnapshot {
            at: start + Duration::days(2),
            votes_for,
            votes_against: against,
            votes_abstain: 0.0,
        });
        p.transition(status).unwrap();
        p
    }

    fn live(votes_for: f64, against: f64) -> GovernanceProposal {
        let start = Utc::now() - Duration::days(2);
        let mut p = GovernanceProposal::new(
            Platform::Snapshot,
            ProposalId::from("live"),
            ProtocolId::from("aave"),
            "t",
            ProposalStatus::Voting,
            100.0,
            start,
            start + Duration::days(4),
        );
        p.record_tally(TallySnapshot {
            at: Utc::now(),
            votes_for,
            votes_against: against,
            votes_abstain: 0.0,
        });
        p
    }

    #[test]
    fn too_few_analogues_is_neutral() {
        let history = vec![finished("a", "aave", 90.0, 10.0, ProposalStatus::Approved)];
        let p = OutcomePredictor::default().predict(&live(80.0, 20.0), &history, Utc::now());
        assert_eq!(p.probability, 0.5);
        assert!(p.low_confidence);
        assert_eq!(p.analogues, 1);
    }

    #[test]
    fn similar_tallies_drive_prediction() {
        let history = vec![
            finished("a", "aave", 90.0, 10.0, ProposalStatus::Approved),
            finished("b", "aave", 85.0, 15.0, ProposalStatus::Approved),
            finished("c", "aave", 88.0, 12.0, ProposalStatus::Approved),
            finished("d", "aave", 10.0, 90.0, ProposalStatus::Rejected),
            finished("e", "aave", 15.0, 85.0, ProposalStatus::Rejected),
        ];
        let predictor = OutcomePredictor::new(3, 3, 0.5);
        let winning = predictor.predict(&live(87.0, 13.0), &history, Utc::now());
        assert!(!winning.low_confidence);
        assert!(winning.probability > 0.9);
        let losing = predictor.predict(&live(12.0, 88.0), &history, Utc::now());
        assert!(losing.probability < 0.5);
    }

    #[test]
    fn terminal_proposals_are_certain() {
        let done = finished("x", "aave", 90.0, 10.0, ProposalStatus::Approved);
        let p = OutcomePredictor::default().predict(&done, &[], Utc::now());
        assert_eq!(p.probability, 1.0);
        assert!(!p.low_confidence);
    }
}
