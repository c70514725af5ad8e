//! In-process store.
//!
//! Used when `storage = "memory"` and throughout the tests. Each record is
//! written under a single lock acquisition, so readers never observe a
//! partially written record.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::event::{EventKey, UpgradeEvent};
use crate::domain::forecast::{LiquidityForecast, VolatilityForecast};
use crate::domain::governance::{GovernanceProposal, ProposalKey};
use crate::domain::guidance::ExecutionGuidance;
use crate::domain::id::{ProtocolId, UpgradeId};
use crate::domain::risk::RiskAssessment;
use crate::domain::sentiment::SentimentSample;
use crate::port::outbound::store::{Store, StoreResult};

#[derive(Default)]
struct Inner {
    events: HashMap<EventKey, UpgradeEvent>,
    proposals: HashMap<ProposalKey, GovernanceProposal>,
    current: HashMap<UpgradeId, RiskAssessment>,
    history: HashMap<UpgradeId, Vec<RiskAssessment>>,
    volatility: HashMap<ProtocolId, VolatilityForecast>,
    volatility_history: HashMap<ProtocolId, Vec<VolatilityForecast>>,
    liquidity: HashMap<ProtocolId, LiquidityForecast>,
    liquidity_history: HashMap<ProtocolId, Vec<LiquidityForecast>>,
    guidance: HashMap<UpgradeId, ExecutionGuidance>,
    /// Keyed by (timestamp, insertion sequence).
    sentiment: BTreeMap<(DateTime<Utc>, u64), SentimentSample>,
    sequence: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.inner.read().events.len()
    }
}

/// Insert after every entry not later than `item`, keeping equal timestamps in
/// arrival order.
fn insert_ordered<T: Clone>(list: &mut Vec<T>, item: &T, at: impl Fn(&T) -> DateTime<Utc>) {
    let pos = list.partition_point(|x| at(x) <= at(item));
    list.insert(pos, item.clone());
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_event(&self, event: &UpgradeEvent) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        if inner.events.contains_key(&event.key) {
            return Ok(false);
        }
        inner.events.insert(event.key.clone(), event.clone());
        Ok(true)
    }

    async fn events_for_upgrade(&self, upgrade: &UpgradeId) -> StoreResult<Vec<UpgradeEvent>> {
        let inner = self.inner.read();
        let mut events: Vec<UpgradeEvent> = inner
            .events
            .values()
            .filter(|e| &e.upgrade == upgrade)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.block_number, e.key.log_index));
        Ok(events)
    }

    async fn upsert_proposal(&self, proposal: &GovernanceProposal) -> StoreResult<()> {
        self.inner
            .write()
            .proposals
            .insert(proposal.key(), proposal.clone());
        Ok(())
    }

    async fn proposal(&self, key: &ProposalKey) -> StoreResult<Option<GovernanceProposal>> {
        Ok(self.inner.read().proposals.get(key).cloned())
    }

    async fn proposals(&self) -> StoreResult<Vec<GovernanceProposal>> {
        Ok(self.inner.read().proposals.values().cloned().collect())
    }

    async fn save_assessment(&self, assessment: &RiskAssessment) -> StoreResult<()> {
        let mut inner = self.inner.write();
        insert_ordered(
            inner.history.entry(assessment.upgrade.clone()).or_default(),
            assessment,
            |a| a.computed_at,
        );
        let newer_stored = inner
            .current
            .get(&assessment.upgrade)
            .is_some_and(|c| c.computed_at > assessment.computed_at);
        if !newer_stored {
            inner
                .current
                .insert(assessment.upgrade.clone(), assessment.clone());
        }
        Ok(())
    }

    async fn current_assessment(&self, upgrade: &UpgradeId) -> StoreResult<Option<RiskAssessment>> {
        Ok(self.inner.read().current.get(upgrade).cloned())
    }

    async fn assessment_history(&self, upgrade: &UpgradeId) -> StoreResult<Vec<RiskAssessment>> {
        Ok(self
            .inner
            .read()
            .history
            .get(upgrade)
            .cloned()
            .unwrap_or_default())
    }

    async fn recent_assessments(&self, limit: usize) -> StoreResult<Vec<RiskAssessment>> {
        let inner = self.inner.read();
        let mut all: Vec<&RiskAssessment> = inner.history.values().flatten().collect();
        all.sort_by_key(|a| a.computed_at);
        let skip = all.len().saturating_sub(limit);
        Ok(all.into_iter().skip(skip).cloned().collect())
    }

    async fn save_volatility(&self, forecast: &VolatilityForecast) -> StoreResult<()> {
        let mut inner = self.inner.write();
        insert_ordered(
            inner.volatility_history.entry(forecast.protocol.clone()).or_default(),
            forecast,
            |f| f.computed_at,
        );
        let stale = inner
            .volatility
            .get(&forecast.protocol)
            .is_some_and(|f| f.computed_at > forecast.computed_at);
        if !stale {
            inner
                .volatility
                .insert(forecast.protocol.clone(), forecast.clone());
        }
        Ok(())
    }

    async fn latest_volatility(
        &self,
        protocol: &ProtocolId,
    ) -> StoreResult<Option<VolatilityForecast>> {
        Ok(self.inner.read().volatility.get(protocol).cloned())
    }

    async fn volatility_history(&self, protocol: &ProtocolId) -> StoreResult<Vec<VolatilityForecast>> {
        Ok(self
            .inner
            .read()
            .volatility_history
            .get(protocol)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_liquidity(&self, forecast: &LiquidityForecast) -> StoreResult<()> {
        let mut inner = self.inner.write();
        insert_ordered(
            inner.liquidity_history.entry(forecast.protocol.clone()).or_default(),
            forecast,
            |f| f.computed_at,
        );
        let stale = inner
            .liquidity
            .get(&forecast.protocol)
            .is_some_and(|f| f.computed_at > forecast.computed_at);
        if !stale {
            inner
                .liquidity
                .insert(forecast.protocol.clone(), forecast.clone());
        }
        Ok(())
    }

    async fn latest_liquidity(&self, protocol: &ProtocolId) -> StoreResult<Option<LiquidityForecast>> {
        Ok(self.inner.read().liquidity.get(protocol).cloned())
    }

    async fn liquidity_history(&self, protocol: &ProtocolId) -> StoreResult<Vec<LiquidityForecast>> {
        Ok(self
            .inner
            .read()
            .liquidity_history
            .get(protocol)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_guidance(&self, guidance: &ExecutionGuidance) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let stale = inner
            .guidance
            .get(&guidance.upgrade)
            .is_some_and(|g| g.computed_at > guidance.computed_at);
        if !stale {
            inner
                .guidance
                .insert(guidance.upgrade.clone(), guidance.clone());
        }
        Ok(())
    }

    async fn latest_guidance(&self, upgrade: &UpgradeId) -> StoreResult<Option<ExecutionGuidance>> {
        Ok(self.inner.read().guidance.get(upgrade).cloned())
    }

    async fn append_sentiment(&self, sample: &SentimentSample) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.sequence += 1;
        let seq = inner.sequence;
        inner.sentiment.insert((sample.timestamp, seq), sample.clone());
        Ok(())
    }

    async fn sentiment_since(
        &self,
        protocol: Option<&ProtocolId>,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<SentimentSample>> {
        let inner = self.inner.read();
        Ok(inner
            .sentiment
            .range((since, 0)..)
            .map(|(_, s)| s)
            .filter(|s| protocol.map_or(true, |p| s.protocol.as_ref() == Some(p)))
            .cloned()
            .collect())
    }
}
