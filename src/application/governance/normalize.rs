//! Platform status strings to [`ProposalStatus`].

use crate::domain::governance::{Platform, ProposalStatus};
use crate::port::outbound::governance::RawProposal;

/// Normalise a raw proposal's status.
///
/// Snapshot only reports `closed` for finished proposals, so the outcome is
/// read off the final tally: quorum missed is `expired`, otherwise a
/// majority of decisive votes decides. `None` for unknown states.
#[must_use]
pub fn normalize_status(raw: &RawProposal) -> Option<ProposalStatus> {
    let state = raw.state.trim().to_ascii_lowercase();
    match raw.platform {
        Platform::Snapshot => match state.as_str() {
            "pending" => Some(ProposalStatus::Pending),
            "active" => Some(ProposalStatus::Voting),
            "closed" => Some(closed_outcome(raw)),
            _ => None,
        },
        Platform::Tally => match state.as_str() {
            "pending" => Some(ProposalStatus::Pending),
            "active" => Some(ProposalStatus::Voting),
            "succeeded" | "queued" | "executed" | "passed" => Some(ProposalStatus::Approved),
            "defeated" | "failed" => Some(ProposalStatus::Rejected),
            "expired" | "canceled" | "cancelled" => Some(ProposalStatus::Expired),
            _ => None,
        },
    }
}

fn closed_outcome(raw: &RawProposal) -> ProposalStatus {
    let total = raw.votes_for + raw.votes_against + raw.votes_abstain;
    if raw.quorum > 0.0 && total < raw.quorum {
        ProposalStatus::Expired
    } else if raw.votes_for > raw.votes_against {
        ProposalStatus::Approved
    } else {
        ProposalStatus::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn raw(platform: Platform, state: &str, votes_for: f64, against: f64, quorum: f64) -> RawProposal {
        let now = Utc::now();
        RawProposal {
            platform,
            id: "1".into(),
            space: "aave.eth".into(),
            title: "t".into(),
            state: state.into(),
            quorum,
            starts_at: now,
            ends_at: now,
            votes_for,
            votes_against: against,
            votes_abstain: 0.0,
            fetched_at: now,
        }
    }

    #[test]
    fn tally_states() {
        assert_eq!(normalize_status(&raw(Platform::Tally, "SUCCEEDED", 0.0, 0.0, 0.0)), Some(ProposalStatus::Approved));
        assert_eq!(normalize_status(&raw(Platform::Tally, "EXECUTED", 0.0, 0.0, 0.0)), Some(ProposalStatus::Approved));
        assert_eq!(normalize_status(&raw(Platform::Tally, "DEFEATED", 0.0, 0.0, 0.0)), Some(ProposalStatus::Rejected));
        assert_eq!(normalize_status(&raw(Platform::Tally, "CANCELED", 0.0, 0.0, 0.0)), Some(ProposalStatus::Expired));
        assert_eq!(normalize_status(&raw(Platform::Tally, "ACTIVE", 0.0, 0.0, 0.0)), Some(ProposalStatus::Voting));
        assert_eq!(normalize_status(&raw(Platform::Tally, "WEIRD", 0.0, 0.0, 0.0)), None);
    }

    #[test]
    fn snapshot_closed_reads_tally() {
        assert_eq!(normalize_status(&raw(Platform::Snapshot, "closed", 10.0, 2.0, 5.0)), Some(ProposalStatus::Approved));
        assert_eq!(normalize_status(&raw(Platform::Snapshot, "closed", 2.0, 10.0, 5.0)), Some(ProposalStatus::Rejected));
        assert_eq!(normalize_status(&raw(Platform::Snapshot, "closed", 1.0, 1.0, 5.0)), Some(ProposalStatus::Expired));
        assert_eq!(normalize_status(&raw(Platform::Snapshot, "active", 0.0, 0.0, 5.0)), Some(ProposalStatus::Voting));
    }
}
