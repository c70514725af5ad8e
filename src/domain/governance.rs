//! Governance proposals and their monotonic status lifecycle.
//!
//! ```text
//! pending ──► voting ──► approved
//!    │           ├─────► rejected
//!    │           └─────► expired
//!    └──────────────────► (any terminal)
//! ```
//!
//! Terminal states never change again. Attempting to leave one yields
//! [`DomainError::InvalidTransition`] and leaves the proposal untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::{ProposalId, ProtocolId, UpgradeId};

/// Governance platform a proposal lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Snapshot,
    Tally,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snapshot => write!(f, "snapshot"),
            Self::Tally => write!(f, "tally"),
        }
    }
}

/// Proposal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Voting,
    Approved,
    Rejected,
    Expired,
}

impl ProposalStatus {
    /// True for `approved`, `rejected` and `expired`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Expired)
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Voting => 1,
            Self::Approved | Self::Rejected | Self::Expired => 2,
        }
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Re-asserting the current status is always allowed.
    #[must_use]
    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        if *self == next {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Voting => "voting",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// A point-in-time vote tally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TallySnapshot {
    pub at: DateTime<Utc>,
    pub votes_for: f64,
    pub votes_against: f64,
    pub votes_abstain: f64,
}

impl TallySnapshot {
    /// Total votes cast, abstentions included (they count towards quorum).
    #[must_use]
    pub fn total(&self) -> f64 {
        self.votes_for + self.votes_against + self.votes_abstain
    }

    /// Share of decisive votes in favour, 0.5 when nothing decisive is cast.
    #[must_use]
    pub fn for_share(&self) -> f64 {
        let decisive = self.votes_for + self.votes_against;
        if decisive <= 0.0 {
            0.5
        } else {
            self.votes_for / decisive
        }
    }

    fn same_counts(&self, other: &TallySnapshot) -> bool {
        self.votes_for == other.votes_for
            && self.votes_against == other.votes_against
            && self.votes_abstain == other.votes_abstain
    }
}

/// Key identifying a proposal across platforms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalKey {
    pub platform: Platform,
    pub id: ProposalId,
}

/// A normalized governance proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceProposal {
    pub platform: Platform,
    pub id: ProposalId,
    pub protocol: ProtocolId,
    pub title: String,
    status: ProposalStatus,
    /// Votes required for the proposal to be valid, 0 when unknown.
    pub quorum: f64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Ordered by `at`.
    tallies: Vec<TallySnapshot>,
}

impl GovernanceProposal {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Platform,
        id: ProposalId,
        protocol: ProtocolId,
        title: impl Into<String>,
        status: ProposalStatus,
        quorum: f64,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        Self {
            platform,
            id,
            protocol,
            title: title.into(),
            status,
            quorum,
            starts_at,
            ends_at,
            tallies: Vec::new(),
        }
    }

    #[must_use]
    pub fn key(&self) -> ProposalKey {
        ProposalKey {
            platform: self.platform,
            id: self.id.clone(),
        }
    }

    /// The upgrade this proposal governs.
    #[must_use]
    pub fn upgrade_id(&self) -> UpgradeId {
        UpgradeId::for_proposal(&self.protocol, &self.id)
    }

    #[must_use]
    pub fn status(&self) -> ProposalStatus {
        self.status
    }

    #[must_use]
    pub fn tallies(&self) -> &[TallySnapshot] {
        &self.tallies
    }

    #[must_use]
    pub fn latest_tally(&self) -> Option<&TallySnapshot> {
        self.tallies.last()
    }

    /// Move to `next`, enforcing monotonic transitions.
    ///
    /// Returns `Ok(true)` when the status actually changed.
    ///
    /// # Errors
    ///
    /// [`DomainError::InvalidTransition`] when the move would revert or
    /// leave a terminal state. The proposal is not modified.
    pub fn transition(&mut self, next: ProposalStatus) -> Result<bool, DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                proposal: self.id.to_string(),
                from: self.status,
                to: next,
            });
        }
        let changed = self.status != next;
        self.status = next;
        Ok(changed)
    }

    /// Append a tally snapshot.
    ///
    /// Snapshots older than the latest one, or identical in counts to it,
    /// are ignored. Returns true when the snapshot was appended.
    pub fn record_tally(&mut self, snapshot: TallySnapshot) -> bool {
        if let Some(last) = self.tallies.last() {
            if snapshot.at < last.at || snapshot.same_counts(last) {
                return false;
            }
        }
        self.tallies.push(snapshot);
        true
    }

    /// Fraction of the voting period elapsed at `at`, clamped to [0, 1].
    #[must_use]
    pub fn progress_at(&self, at: DateTime<Utc>) -> f64 {
        let span = (self.ends_at - self.starts_at).num_seconds();
        if span <= 0 {
            return 1.0;
        }
        let elapsed = (at - self.starts_at).num_seconds();
        (elapsed as f64 / span as f64).clamp(0.0, 1.0)
    }

    /// Votes cast relative to quorum at the latest snapshot, 1.0 if no quorum.
    #[must_use]
    pub fn quorum_ratio(&self) -> f64 {
        let total = self.latest_tally().map_or(0.0, TallySnapshot::total);
        if self.quorum <= 0.0 {
            1.0
        } else {
            total / self.quorum
        }
    }

    /// The tally in effect at `at`: the latest snapshot taken at or before it.
    #[must_use]
    pub fn tally_at(&self, at: DateTime<Utc>) -> Option<&TallySnapshot> {
        self.tallies.iter().rev().find(|t| t.at <= at)
    }
}

/// Historical voting statistics for one protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingPatterns {
    pub protocol: ProtocolId,
    pub total_proposals: usize,
    /// Approved share of finished proposals.
    pub success_rate: f64,
    /// Mean votes cast per proposal at its latest tally.
    pub average_participation: f64,
    pub recent_success_rate: f64,
    pub period_days: i64,
}
