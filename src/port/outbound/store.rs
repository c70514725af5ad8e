//! Persistence port.
//!
//! Current-state entities are upserted by key. Events, assessment and
//! forecast history and sentiment samples are append-only. Each write is
//! atomic per record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::event::UpgradeEvent;
use crate::domain::forecast::{LiquidityForecast, VolatilityForecast};
use crate::domain::governance::{GovernanceProposal, ProposalKey};
use crate::domain::guidance::ExecutionGuidance;
use crate::domain::id::{ProtocolId, UpgradeId};
use crate::domain::risk::RiskAssessment;
use crate::domain::sentiment::SentimentSample;
use crate::error::PersistenceError;

pub type StoreResult<T> = std::result::Result<T, PersistenceError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert an event unless its key already exists. Returns true if new.
    async fn insert_event(&self, event: &UpgradeEvent) -> StoreResult<bool>;

    /// Events linked to an upgrade, ordered by block number.
    async fn events_for_upgrade(&self, upgrade: &UpgradeId) -> StoreResult<Vec<UpgradeEvent>>;

    async fn upsert_proposal(&self, proposal: &GovernanceProposal) -> StoreResult<()>;

    async fn proposal(&self, key: &ProposalKey) -> StoreResult<Option<GovernanceProposal>>;

    async fn proposals(&self) -> StoreResult<Vec<GovernanceProposal>>;

    /// Append to history and replace the current assessment unless the
    /// stored one is newer (last writer wins by `computed_at`).
    async fn save_assessment(&self, assessment: &RiskAssessment) -> StoreResult<()>;

    async fn current_assessment(&self, upgrade: &UpgradeId) -> StoreResult<Option<RiskAssessment>>;

    /// Ordered by `computed_at`.
    async fn assessment_history(&self, upgrade: &UpgradeId) -> StoreResult<Vec<RiskAssessment>>;

    /// The `limit` most recent assessments across every upgrade, oldest
    /// first.
    async fn recent_assessments(&self, limit: usize) -> StoreResult<Vec<RiskAssessment>>;

    /// Append to forecast history and replace the current forecast unless the
    /// stored one is newer.
    async fn save_volatility(&self, forecast: &VolatilityForecast) -> StoreResult<()>;

    async fn latest_volatility(&self, protocol: &ProtocolId)
        -> StoreResult<Option<VolatilityForecast>>;

    /// Every saved volatility forecast for `protocol`, ordered by `computed_at`.
    async fn volatility_history(&self, protocol: &ProtocolId) -> StoreResult<Vec<VolatilityForecast>>;

    async fn save_liquidity(&self, forecast: &LiquidityForecast) -> StoreResult<()>;

    async fn latest_liquidity(&self, protocol: &ProtocolId)
        -> StoreResult<Option<LiquidityForecast>>;

    async fn liquidity_history(&self, protocol: &ProtocolId) -> StoreResult<Vec<LiquidityForecast>>;

    async fn save_guidance(&self, guidance: &ExecutionGuidance) -> StoreResult<()>;

    async fn latest_guidance(&self, upgrade: &UpgradeId) -> StoreResult<Option<ExecutionGuidance>>;

    async fn append_sentiment(&self, sample: &SentimentSample) -> StoreResult<()>;

    /// Samples at or after `since`, oldest first. `None` matches every protocol.
    async fn sentiment_since(
        &self,
        protocol: Option<&ProtocolId>,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<SentimentSample>>;
}
