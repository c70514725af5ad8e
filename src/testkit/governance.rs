//! Scripted [`GovernanceSource`].

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::domain::governance::Platform;
use crate::error::SourceError;
use crate::port::outbound::governance::{GovernanceSource, RawProposal};

/// Returns whatever proposals the test last set.
pub struct ScriptedGovernanceSource {
    platform: Platform,
    proposals: Mutex<Vec<RawProposal>>,
    failing: AtomicBool,
}

impl ScriptedGovernanceSource {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            proposals: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_proposals(&self, proposals: Vec<RawProposal>) {
        *self.proposals.lock() = proposals;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl GovernanceSource for ScriptedGovernanceSource {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch_proposals(&self, spaces: &[String]) -> Result<Vec<RawProposal>, SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::transient("scripted", "platform offline"));
        }
        Ok(self
            .proposals
            .lock()
            .iter()
            .filter(|p| spaces.contains(&p.space))
            .cloned()
            .collect())
    }
}

/// A raw Snapshot proposal in `space` with the given state and tally.
pub fn raw_snapshot(
    id: &str,
    space: &str,
    state: &str,
    votes_for: f64,
    votes_against: f64,
    fetched_at: DateTime<Utc>,
) -> RawProposal {
    RawProposal {
        platform: Platform::Snapshot,
        id: id.into(),
        space: space.into(),
        title: format!("Proposal {id}"),
        state: state.into(),
        quorum: 100.0,
        starts_at: fetched_at - Duration::days(1),
        ends_at: fetched_at + Duration::days(2),
        votes_for,
        votes_against,
        votes_abstain: 0.0,
        fetched_at,
    }
}
