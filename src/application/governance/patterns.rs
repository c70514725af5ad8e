//! Historical voting statistics per protocol.

use chrono::{DateTime, Duration, Utc};

use crate::domain::governance::{GovernanceProposal, ProposalStatus, VotingPatterns};
use crate::domain::id::ProtocolId;

/// Summarise proposals that started within `period_days` of `now`; the
/// recent rate covers the last `recent_days`.
#[must_use]
pub fn analyze(
    protocol: &ProtocolId,
    proposals: &[GovernanceProposal],
    now: DateTime<Utc>,
    period_days: i64,
    recent_days: i64,
) -> VotingPatterns {
    let cutoff = now - Duration::days(period_days);
    let recent_cutoff = now - Duration::days(recent_days);
    let window: Vec<&GovernanceProposal> = proposals
        .iter()
        .filter(|p| &p.protocol == protocol && p.starts_at >= cutoff)
        .collect();
    let recent: Vec<&GovernanceProposal> = window
        .iter()
        .copied()
        .filter(|p| p.starts_at >= recent_cutoff)
        .collect();
    let participation: f64 = window
        .iter()
        .map(|p| p.latest_tally().map_or(0.0, |t| t.total()))
        .sum();
    VotingPatterns {
        protocol: protocol.clone(),
        total_proposals: window.len(),
        success_rate: success_rate(&window),
        average_participation: if window.is_empty() {
            0.0
        } else {
            participation / window.len() as f64
        },
        recent_success_rate: success_rate(&recent),
        period_days,
    }
}

fn success_rate(proposals: &[&GovernanceProposal]) -> f64 {
    let finished = proposals.iter().filter(|p| p.status().is_terminal()).count();
    if finished == 0 {
        return 0.0;
    }
    let approved = proposals
        .iter()
        .filter(|p| p.status() == ProposalStatus::Approved)
        .count();
    approved as f64 / finished as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::governance::{Platform, TallySnapshot};
    use crate::domain::id::ProposalId;

    fn proposal(id: &str, age_days: i64, status: ProposalStatus, votes: f64) -> GovernanceProposal {
        let start = Utc::now() - Duration::days(age_days);
        let mut p = GovernanceProposal::new(
            Platform::Tally,
            ProposalId::from(id),
            ProtocolId::from("comp"),
            "t",
            ProposalStatus::Voting,
            0.0,
            start,
            start + Duration::days(3),
        );
        p.record_tally(TallySnapshot {
            at: start,
            votes_for: votes,
            votes_against: 0.0,
            votes_abstain: 0.0,
        });
        p.transition(status).unwrap();
        p
    }

    #[test]
    fn empty_history() {
        let patterns = analyze(&ProtocolId::from("comp"), &[], Utc::now(), 90, 30);
        assert_eq!(patterns.total_proposals, 0);
        assert_eq!(patterns.success_rate, 0.0);
        assert_eq!(patterns.average_participation, 0.0);
    }

    #[test]
    fn rates_and_participation() {
        let proposals = vec![
            proposal("1", 60, ProposalStatus::Approved, 100.0),
            proposal("2", 50, ProposalStatus::Rejected, 200.0),
            proposal("3", 10, ProposalStatus::Approved, 300.0),
            proposal("4", 200, ProposalStatus::Approved, 900.0),
        ];
        let patterns = analyze(&ProtocolId::from("comp"), &proposals, Utc::now(), 90, 30);
        assert_eq!(patterns.total_proposals, 3);
        assert!((patterns.success_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!((patterns.average_participation - 200.0).abs() < 1e-12);
        assert_eq!(patterns.recent_success_rate, 1.0);
    }
}
