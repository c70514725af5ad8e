//! A [`Store`] whose writes can be made to fail.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::adapter::outbound::memory::MemoryStore;
use crate::domain::event::UpgradeEvent;
use crate::domain::forecast::{LiquidityForecast, VolatilityForecast};
use crate::domain::governance::{GovernanceProposal, ProposalKey};
use crate::domain::guidance::ExecutionGuidance;
use crate::domain::id::{ProtocolId, UpgradeId};
use crate::domain::risk::RiskAssessment;
use crate::domain::sentiment::SentimentSample;
use crate::error::PersistenceError;
use crate::port::outbound::store::{Store, StoreResult};

/// Delegates to a [`MemoryStore`]; while failing, every write returns
/// [`PersistenceError::Unavailable`] and leaves the data untouched.
#[derive(Default)]
pub struct FailingStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let store = Self::default();
        store.set_failing(true);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn write(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::unavailable("disk full"));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn insert_event(&self, event: &UpgradeEvent) -> StoreResult<bool> {
        self.write()?;
        self.inner.insert_event(event).await
    }

    async fn events_for_upgrade(&self, upgrade: &UpgradeId) -> StoreResult<Vec<UpgradeEvent>> {
        self.inner.events_for_upgrade(upgrade).await
    }

    async fn upsert_proposal(&self, proposal: &GovernanceProposal) -> StoreResult<()> {
        self.write()?;
        self.inner.upsert_proposal(proposal).await
    }

    async fn proposal(&self, key: &ProposalKey) -> StoreResult<Option<GovernanceProposal>> {
        self.inner.proposal(key).await
    }

    async fn proposals(&self) -> StoreResult<Vec<GovernanceProposal>> {
        self.inner.proposals().await
    }

    async fn save_assessment(&self, assessment: &RiskAssessment) -> StoreResult<()> {
        self.write()?;
        self.inner.save_assessment(assessment).await
    }

    async fn current_assessment(&self, upgrade: &UpgradeId) -> StoreResult<Option<RiskAssessment>> {
        self.inner.current_assessment(upgrade).await
    }

    async fn assessment_history(&self, upgrade: &UpgradeId) -> StoreResult<Vec<RiskAssessment>> {
        self.inner.assessment_history(upgrade).await
    }

    async fn recent_assessments(&self, limit: usize) -> StoreResult<Vec<RiskAssessment>> {
        self.inner.recent_assessments(limit).await
    }

    async fn save_volatility(&self, forecast: &VolatilityForecast) -> StoreResult<()> {
        self.write()?;
        self.inner.save_volatility(forecast).await
    }

    async fn latest_volatility(&self, protocol: &ProtocolId) -> StoreResult<Option<VolatilityForecast>> {
        self.inner.latest_volatility(protocol).await
    }

    async fn volatility_history(&self, protocol: &ProtocolId) -> StoreResult<Vec<VolatilityForecast>> {
        self.inner.volatility_history(protocol).await
    }

    async fn save_liquidity(&self, forecast: &LiquidityForecast) -> StoreResult<()> {
        self.write()?;
        self.inner.save_liquidity(forecast).await
    }

    async fn latest_liquidity(&self, protocol: &ProtocolId) -> StoreResult<Option<LiquidityForecast>> {
        self.inner.latest_liquidity(protocol).await
    }

    async fn liquidity_history(&self, protocol: &ProtocolId) -> StoreResult<Vec<LiquidityForecast>> {
        self.inner.liquidity_history(protocol).await
    }

    async fn save_guidance(&self, guidance: &ExecutionGuidance) -> StoreResult<()> {
        self.write()?;
        self.inner.save_guidance(guidance).await
    }

    async fn latest_guidance(&self, upgrade: &UpgradeId) -> StoreResult<Option<ExecutionGuidance>> {
        self.inner.latest_guidance(upgrade).await
    }

    async fn append_sentiment(&self, sample: &SentimentSample) -> StoreResult<()> {
        self.write()?;
        self.inner.append_sentiment(sample).await
    }

    async fn sentiment_since(
        &self,
        protocol: Option<&ProtocolId>,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<SentimentSample>> {
        self.inner.sentiment_since(protocol, since).await
    }
}
