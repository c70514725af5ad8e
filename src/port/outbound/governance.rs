//! Governance platform port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::governance::Platform;
use crate::error::SourceError;

/// A proposal as reported by its platform, before normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProposal {
    pub platform: Platform,
    pub id: String,
    /// Snapshot space or Tally organization slug.
    pub space: String,
    pub title: String,
    /// Platform-specific status string, e.g. `active` or `SUCCEEDED`.
    pub state: String,
    pub quorum: f64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub votes_for: f64,
    pub votes_against: f64,
    pub votes_abstain: f64,
    pub fetched_at: DateTime<Utc>,
}

/// Source of proposals for one governance platform.
#[async_trait]
pub trait GovernanceSource: Send + Sync {
    fn platform(&self) -> Platform;

    /// Recent proposals for the given spaces.
    async fn fetch_proposals(&self, spaces: &[String]) -> Result<Vec<RawProposal>, SourceError>;
}
