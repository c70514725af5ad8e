//! Governance tracking: proposal normalisation, tallies and outcome prediction.

pub mod normalize;
pub mod patterns;
pub mod prediction;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::governance::{GovernanceProposal, ProposalKey, TallySnapshot};
use crate::domain::id::{ProposalId, ProtocolId, UpgradeId};
use crate::error::PersistenceError;
use crate::port::outbound::governance::{GovernanceSource, RawProposal};
use crate::port::outbound::store::Store;

pub use normalize::normalize_status;
pub use crate::domain::governance::VotingPatterns;
pub use patterns::analyze;
pub use prediction::{OutcomePrediction, OutcomePredictor};

/// Polls governance platforms and keeps stored proposals current.
///
/// The only writer of [`GovernanceProposal`] records.
pub struct GovernanceTracker {
    sources: Vec<Arc<dyn GovernanceSource>>,
    store: Arc<dyn Store>,
    /// Platform space or organization → protocol.
    spaces: HashMap<String, ProtocolId>,
    predictor: OutcomePredictor,
}

impl GovernanceTracker {
    #[must_use]
    pub fn new(
        sources: Vec<Arc<dyn GovernanceSource>>,
        store: Arc<dyn Store>,
        spaces: HashMap<String, ProtocolId>,
        predictor: OutcomePredictor,
    ) -> Self {
        Self {
            sources,
            store,
            spaces,
            predictor,
        }
    }

    /// Fetch every platform once. Returns the upgrades whose proposal
    /// changed. A failing platform is logged and skipped.
    pub async fn poll(&self) -> Result<Vec<UpgradeId>, PersistenceError> {
        let spaces: Vec<String> = self.spaces.keys().cloned().collect();
        let fetches = self
            .sources
            .iter()
            .map(|source| source.fetch_proposals(&spaces));
        let results = futures_util::future::join_all(fetches).await;

        let mut changed = Vec::new();
        for (source, result) in self.sources.iter().zip(results) {
            let raws = match result {
                Ok(raws) => raws,
                Err(e) => {
                    warn!(platform = %source.platform(), error = %e, "Governance poll failed");
                    continue;
                }
            };
            for raw in raws {
                if let Some(upgrade) = self.apply(&raw).await? {
                    changed.push(upgrade);
                }
            }
        }
        Ok(changed)
    }

    /// Merge one raw proposal into the store. Returns its upgrade id when
    /// the status or tally changed.
    pub async fn apply(&self, raw: &RawProposal) -> Result<Option<UpgradeId>, PersistenceError> {
        let Some(protocol) = self.spaces.get(&raw.space) else {
            debug!(space = %raw.space, "Proposal for unmapped space ignored");
            return Ok(None);
        };
        let Some(status) = normalize_status(raw) else {
            warn!(platform = %raw.platform, id = %raw.id, state = %raw.state, "Unknown proposal state");
            return Ok(None);
        };
        let key = ProposalKey {
            platform: raw.platform,
            id: ProposalId::new(raw.id.clone()),
        };
        let existing = self.store.proposal(&key).await?;
        let is_new = existing.is_none();
        let mut proposal = existing.unwrap_or_else(|| {
            GovernanceProposal::new(
                raw.platform,
                key.id.clone(),
                protocol.clone(),
                raw.title.clone(),
                status,
                raw.quorum,
                raw.starts_at,
                raw.ends_at,
            )
        });

        let status_changed = match proposal.transition(status) {
            Ok(changed) => changed,
            Err(e) => {
                warn!(error = %e, "Rejected proposal status regression");
                false
            }
        };
        let tally_changed = proposal.record_tally(TallySnapshot {
            at: raw.fetched_at,
            votes_for: raw.votes_for,
            votes_against: raw.votes_against,
            votes_abstain: raw.votes_abstain,
        });
        if !(is_new || status_changed || tally_changed) {
            return Ok(None);
        }
        self.store.upsert_proposal(&proposal).await?;
        info!(
            platform = %proposal.platform,
            proposal = %proposal.id,
            status = %proposal.status(),
            "Proposal updated"
        );
        Ok(Some(proposal.upgrade_id()))
    }

    /// Success probability for a stored proposal.
    pub async fn predict(
        &self,
        proposal: &GovernanceProposal,
        now: DateTime<Utc>,
    ) -> Result<OutcomePrediction, PersistenceError> {
        let history = self.store.proposals().await?;
        Ok(self.predictor.predict(proposal, &history, now))
    }
}
