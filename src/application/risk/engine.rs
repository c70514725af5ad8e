//! Risk engine: gathers inputs for one upgrade, fuses them and persists the
//! result. Assessments for the same upgrade never run concurrently.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::flight::SingleFlight;
use super::scoring::{self, LiquidityInputs, MarketInputs, RiskInputs, ScoringSettings};
use crate::application::distribution::{DistributionHub, Update};
use crate::application::forecast::stats;
use crate::application::governance::OutcomePredictor;
use crate::application::ingest::ProtocolRegistry;
use crate::application::sentiment::SentimentAnalyzer;
use crate::domain::id::{ProtocolId, UpgradeId};
use crate::domain::risk::{RiskAssessment, RiskComponent, RiskLevel, RiskWeights};
use crate::error::PersistenceError;
use crate::port::outbound::market::MarketDataFeed;
use crate::port::outbound::model::{FittedRisk, RiskModel, RiskSample};
use crate::port::outbound::store::Store;

/// Daily periods used to annualize realized volatility.
const PERIODS_PER_YEAR: f64 = 365.0;

/// Tunables for [`RiskEngine`].
#[derive(Debug, Clone)]
pub struct RiskEngineConfig {
    pub weights: RiskWeights,
    pub scoring: ScoringSettings,
    pub predictor: OutcomePredictor,
    pub sentiment: SentimentAnalyzer,
    pub model_version: String,
    /// Days of price and TVL history pulled per assessment.
    pub lookback_days: u32,
    /// Most recent assessments a learned model is fitted on.
    pub training_window: usize,
}

impl Default for RiskEngineConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            scoring: ScoringSettings::default(),
            predictor: OutcomePredictor::default(),
            sentiment: SentimentAnalyzer::default(),
            model_version: concat!("upwatch-", env!("CARGO_PKG_VERSION")).to_string(),
            lookback_days: 30,
            training_window: 1_000,
        }
    }
}

type Outcome = Result<RiskAssessment, PersistenceError>;

pub struct RiskEngine {
    store: Arc<dyn Store>,
    feed: Arc<dyn MarketDataFeed>,
    registry: Arc<ProtocolRegistry>,
    hub: Arc<DistributionHub>,
    config: RiskEngineConfig,
    flight: SingleFlight<UpgradeId, Outcome>,
    /// Last computed-at per upgrade, so history stays strictly increasing.
    last_computed: DashMap<UpgradeId, DateTime<Utc>>,
    /// Overall-score model; the weighted sum applies until it is fitted.
    model: Option<Arc<dyn RiskModel>>,
    fitted: RwLock<Option<Arc<dyn FittedRisk>>>,
}

impl RiskEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        feed: Arc<dyn MarketDataFeed>,
        registry: Arc<ProtocolRegistry>,
        hub: Arc<DistributionHub>,
        config: RiskEngineConfig,
    ) -> Self {
        Self {
            store,
            feed,
            registry,
            hub,
            config,
            flight: SingleFlight::new(),
            last_computed: DashMap::new(),
            model: None,
            fitted: RwLock::new(None),
        }
    }

    /// Score overall risk with `model` once [`retrain`](Self::retrain) has
    /// fitted it.
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn RiskModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Refit the overall-score model on the most recent complete
    /// assessments. Returns the sample count of the new fit, or `None` when
    /// no model is configured or the fit was rejected, in which case the
    /// previous fit (or the weighted sum) stays in use.
    pub async fn retrain(&self) -> Result<Option<usize>, PersistenceError> {
        let Some(model) = &self.model else {
            return Ok(None);
        };
        let samples: Vec<RiskSample> = self
            .store
            .recent_assessments(self.config.training_window)
            .await?
            .into_iter()
            .filter(|a| !a.partial)
            .map(|a| RiskSample {
                components: a.components,
                overall: a.composite,
            })
            .collect();
        match model.fit(&samples) {
            Ok(fitted) => {
                let n = fitted.samples();
                *self.fitted.write() = Some(Arc::from(fitted));
                info!(model = model.name(), samples = n, "Risk model fitted");
                Ok(Some(n))
            }
            Err(e) => {
                info!(model = model.name(), error = %e, "Risk model not refitted");
                Ok(None)
            }
        }
    }

    /// A fitted overall-score model is in use.
    #[must_use]
    pub fn learned(&self) -> bool {
        self.fitted.read().is_some()
    }

    #[must_use]
    pub fn weights(&self) -> &RiskWeights {
        &self.config.weights
    }

    /// Assessments currently being computed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.flight.in_flight()
    }

    /// Compute, persist and publish a fresh assessment for `upgrade`.
    ///
    /// Concurrent calls for the same upgrade share one computation. Missing
    /// inputs degrade to neutral component scores; only a failed write is an
    /// error, and that error carries the computed assessment.
    pub async fn assess(&self, upgrade: &UpgradeId) -> Outcome {
        self.flight
            .run(upgrade, move || async move {
                let now = Utc::now();
                let inputs = self.gather(upgrade, now).await;
                let assessment = self.evaluate(upgrade, &inputs, now).await;
                self.persist(assessment).await
            })
            .await
    }

    /// Save `assessment` as current, append it to history and publish it.
    /// Also the retry path after a failed [`assess`](Self::assess).
    pub async fn persist(&self, assessment: RiskAssessment) -> Outcome {
        match self.store.save_assessment(&assessment).await {
            Ok(()) => {
                info!(
                    upgrade = %assessment.upgrade,
                    composite = assessment.composite,
                    level = %assessment.level,
                    partial = assessment.partial,
                    "Risk assessment persisted"
                );
                self.hub.publish(Update::assessment(assessment.clone()));
                Ok(assessment)
            }
            Err(e) => {
                warn!(upgrade = %assessment.upgrade, error = %e, "Risk assessment not persisted");
                Err(PersistenceError::Assessment {
                    reason: e.to_string(),
                    assessment: Box::new(assessment),
                })
            }
        }
    }

    /// Assessment history, oldest first.
    pub async fn history(&self, upgrade: &UpgradeId) -> Result<Vec<RiskAssessment>, PersistenceError> {
        self.store.assessment_history(upgrade).await
    }

    pub async fn current(&self, upgrade: &UpgradeId) -> Result<Option<RiskAssessment>, PersistenceError> {
        self.store.current_assessment(upgrade).await
    }

    /// Fuse already-gathered inputs into an assessment.
    async fn evaluate(&self, upgrade: &UpgradeId, inputs: &RiskInputs, now: DateTime<Utc>) -> RiskAssessment {
        let scored = scoring::score(inputs, &self.config.scoring);
        let fitted = self.fitted.read().clone();
        let (composite, model_version) = match (fitted, &self.model) {
            (Some(fitted), Some(model)) => (
                fitted.predict(&scored.scores),
                format!("{}+{}", self.config.model_version, model.name()),
            ),
            _ => (
                self.config.weights.composite(&scored.scores),
                self.config.model_version.clone(),
            ),
        };
        let level = RiskLevel::classify(composite);
        let factors = scoring::factors(&scored.scores);
        let leading = factors
            .first()
            .map_or(RiskComponent::Technical, |f| f.component);

        let protocol = inputs
            .events
            .first()
            .map_or_else(|| upgrade.protocol(), |e| e.protocol.clone());
        let computed_at = self.next_timestamp(upgrade, now).await;

        debug!(
            upgrade = %upgrade,
            technical = scored.scores.technical,
            governance = scored.scores.governance,
            market = scored.scores.market,
            liquidity = scored.scores.liquidity,
            missing = scored.missing.len(),
            "Component scores"
        );

        RiskAssessment {
            upgrade: upgrade.clone(),
            protocol,
            components: scored.scores,
            composite,
            level,
            recommendation: scoring::recommendation(level, leading),
            mitigations: scoring::mitigations(&scored.scores),
            factors,
            partial: !scored.missing.is_empty(),
            missing_inputs: scored.missing,
            model_version,
            computed_at,
        }
    }

    /// `now`, or just after the previous assessment if the clock has not
    /// advanced past it.
    async fn next_timestamp(&self, upgrade: &UpgradeId, now: DateTime<Utc>) -> DateTime<Utc> {
        let previous = match self.last_computed.get(upgrade).map(|t| *t) {
            Some(t) => Some(t),
            None => match self.store.current_assessment(upgrade).await {
                Ok(current) => current.map(|a| a.computed_at),
                Err(e) => {
                    debug!(upgrade = %upgrade, error = %e, "Previous assessment unavailable");
                    None
                }
            },
        };
        let at = match previous {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        self.last_computed.insert(upgrade.clone(), at);
        at
    }

    /// Collect every input. A failing source leaves its input empty.
    async fn gather(&self, upgrade: &UpgradeId, now: DateTime<Utc>) -> RiskInputs {
        let events = self.store.events_for_upgrade(upgrade).await.unwrap_or_else(|e| {
            warn!(upgrade = %upgrade, error = %e, "Events unavailable");
            Vec::new()
        });
        let protocol = events
            .first()
            .map_or_else(|| upgrade.protocol(), |e| e.protocol.clone());
        let security_incidents = self
            .registry
            .get(&protocol)
            .map_or(0, |p| p.security_incidents);

        let (proposal, prediction) = match self.store.proposals().await {
            Ok(history) => {
                let proposal = history.iter().find(|p| &p.upgrade_id() == upgrade).cloned();
                let prediction = proposal
                    .as_ref()
                    .map(|p| self.config.predictor.predict(p, &history, now));
                (proposal, prediction)
            }
            Err(e) => {
                warn!(upgrade = %upgrade, error = %e, "Proposals unavailable");
                (None, None)
            }
        };

        let sentiment = match self
            .store
            .sentiment_since(Some(&protocol), now - self.config.sentiment.window())
            .await
        {
            Ok(samples) if !samples.is_empty() => Some(self.config.sentiment.aggregate(&samples, now)),
            Ok(_) => None,
            Err(e) => {
                warn!(upgrade = %upgrade, error = %e, "Sentiment unavailable");
                None
            }
        };

        RiskInputs {
            events,
            security_incidents,
            proposal,
            prediction,
            market: self.market_inputs(&protocol).await,
            sentiment,
            liquidity: self.liquidity_inputs(&protocol).await,
        }
    }

    async fn market_inputs(&self, protocol: &ProtocolId) -> Option<MarketInputs> {
        let days = self.config.lookback_days;
        let prices = match self.feed.price_series(protocol, days).await {
            Ok(series) => series.values(),
            Err(e) => {
                warn!(protocol = %protocol, error = %e, "Price series unavailable");
                return None;
            }
        };
        let returns = stats::log_returns(&prices);
        if returns.len() < 2 {
            debug!(protocol = %protocol, points = prices.len(), "Too few prices for realized volatility");
            return None;
        }
        let volatility = stats::std_dev(&returns) * PERIODS_PER_YEAR.sqrt();

        let correlation = match self.feed.market_index_series(days).await {
            Ok(index) => {
                stats::pearson(&returns, &stats::log_returns(&index.values()))
            }
            Err(e) => {
                debug!(error = %e, "Market index unavailable");
                None
            }
        };
        Some(MarketInputs {
            volatility,
            correlation,
        })
    }

    async fn liquidity_inputs(&self, protocol: &ProtocolId) -> LiquidityInputs {
        let concentration = self
            .feed
            .holder_concentration(protocol)
            .await
            .unwrap_or_else(|e| {
                warn!(protocol = %protocol, error = %e, "Holder concentration unavailable");
                None
            });
        let tvl_change_std = match self.feed.tvl_series(protocol, self.config.lookback_days).await {
            Ok(series) => {
                let changes = stats::pct_changes(&series.values());
                (changes.len() >= 2).then(|| stats::std_dev(&changes))
            }
            Err(e) => {
                warn!(protocol = %protocol, error = %e, "TVL series unavailable");
                None
            }
        };
        LiquidityInputs {
            concentration,
            tvl_change_std,
        }
    }
}
