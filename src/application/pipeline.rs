//! Event-to-assessment control flow: assess, refresh forecasts when the
//! market series advanced, regenerate guidance when any input advanced, and
//! broadcast.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::application::distribution::{DistributionHub, Update};
use crate::application::forecast::{
    estimate_flow, liquidity_performance, liquidity_shift, volatility_performance, ForecastService,
};
use crate::application::governance;
use crate::application::guidance::{guide, GuidanceSettings};
use crate::application::ingest::{LivenessBoard, ProtocolRegistry, TriggerReceiver};
use crate::application::risk::RiskEngine;
use crate::application::sentiment::SentimentAnalyzer;
use crate::domain::event::EventKind;
use crate::domain::forecast::{LiquidityForecast, ModelPerformance, VolatilityForecast};
use crate::domain::guidance::ExecutionGuidance;
use crate::domain::id::{ProtocolId, UpgradeId};
use crate::domain::impact::UpgradeImpact;
use crate::domain::risk::RiskAssessment;
use crate::domain::sentiment::SentimentSample;
use crate::domain::series::Series;
use crate::error::{ForecastError, PersistenceError, Result};
use crate::port::inbound::{HealthReport, ProtocolReport, Reevaluation, UpgradeMonitor};
use crate::port::outbound::market::MarketDataFeed;
use crate::port::outbound::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Forecast horizon in days.
    pub horizon: u32,
    /// Days of price and TVL history fed to the forecasters.
    pub history_days: u32,
    /// Re-evaluations running at once when draining triggers.
    pub max_concurrent: usize,
    /// Days compared on each side of an upgrade.
    pub impact_window_days: u32,
    /// Days of stored forecasts scored by the protocol report.
    pub evaluation_days: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            horizon: 1,
            history_days: 90,
            max_concurrent: 4,
            impact_window_days: 30,
            evaluation_days: 30,
        }
    }
}

pub struct Pipeline {
    engine: Arc<RiskEngine>,
    forecasts: ForecastService,
    store: Arc<dyn Store>,
    feed: Arc<dyn MarketDataFeed>,
    registry: Arc<ProtocolRegistry>,
    hub: Arc<DistributionHub>,
    board: Arc<LivenessBoard>,
    sentiment: SentimentAnalyzer,
    guidance: GuidanceSettings,
    settings: PipelineSettings,
}

/// Collaborators of a [`Pipeline`].
pub struct PipelineParts {
    pub engine: Arc<RiskEngine>,
    pub forecasts: ForecastService,
    pub store: Arc<dyn Store>,
    pub feed: Arc<dyn MarketDataFeed>,
    pub registry: Arc<ProtocolRegistry>,
    pub hub: Arc<DistributionHub>,
    pub board: Arc<LivenessBoard>,
    pub sentiment: SentimentAnalyzer,
    pub guidance: GuidanceSettings,
    pub settings: PipelineSettings,
}

impl Pipeline {
    #[must_use]
    pub fn new(parts: PipelineParts) -> Self {
        Self {
            engine: parts.engine,
            forecasts: parts.forecasts,
            store: parts.store,
            feed: parts.feed,
            registry: parts.registry,
            hub: parts.hub,
            board: parts.board,
            sentiment: parts.sentiment,
            guidance: parts.guidance,
            settings: parts.settings,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<RiskEngine> {
        &self.engine
    }

    #[must_use]
    pub fn hub(&self) -> &Arc<DistributionHub> {
        &self.hub
    }

    /// Drain re-evaluation triggers until shutdown. Work in flight when the
    /// signal arrives is abandoned.
    pub async fn run(self: Arc<Self>, mut triggers: TriggerReceiver, mut shutdown: watch::Receiver<bool>) {
        let limit = Arc::new(Semaphore::new(self.settings.max_concurrent.max(1)));
        let mut tasks = JoinSet::new();
        info!("Pipeline started");
        loop {
            let upgrade = tokio::select! {
                _ = shutdown.changed() => break,
                next = triggers.recv() => match next {
                    Some(upgrade) => upgrade,
                    None => break,
                },
            };
            let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
                break;
            };
            let pipeline = Arc::clone(&self);
            tasks.spawn(async move {
                let _permit = permit;
                if let Err(e) = pipeline.reevaluate(&upgrade).await {
                    warn!(upgrade = %upgrade, error = %e, "Re-evaluation failed");
                }
            });
            while tasks.try_join_next().is_some() {}
        }
        triggers.close();
        tasks.abort_all();
        info!("Pipeline stopped");
    }

    /// Assessment, then forecasts if the market series advanced, then
    /// guidance if any input advanced, then the upgrade's market impact.
    pub async fn reevaluate(&self, upgrade: &UpgradeId) -> Result<Reevaluation> {
        let assessment = self.engine.assess(upgrade).await?;
        let protocol = assessment.protocol.clone();

        let prices = self.prices(&protocol).await;
        let tvl = self.tvl(&protocol).await;
        let volatility = self.refresh_volatility(&protocol, prices.as_ref()).await;
        let liquidity = self.refresh_liquidity(&protocol, tvl.as_ref()).await;
        let (guidance, guidance_changed) = self
            .refresh_guidance(&assessment, volatility.as_ref(), liquidity.as_ref())
            .await;
        let impact = self
            .analyze_impact(upgrade, &protocol, prices.as_ref(), tvl.as_ref(), liquidity.as_ref())
            .await;

        Ok(Reevaluation {
            assessment,
            volatility,
            liquidity,
            guidance,
            guidance_changed,
            impact,
        })
    }

    async fn prices(&self, protocol: &ProtocolId) -> Option<Series> {
        match self.feed.price_series(protocol, self.settings.history_days).await {
            Ok(series) => Some(series),
            Err(e) => {
                warn!(protocol = %protocol, error = %e, "Price series unavailable");
                None
            }
        }
    }

    async fn tvl(&self, protocol: &ProtocolId) -> Option<Series> {
        match self.feed.tvl_series(protocol, self.settings.history_days).await {
            Ok(series) => Some(series),
            Err(e) => {
                warn!(protocol = %protocol, error = %e, "TVL series unavailable");
                None
            }
        }
    }

    async fn refresh_volatility(
        &self,
        protocol: &ProtocolId,
        prices: Option<&Series>,
    ) -> Option<VolatilityForecast> {
        let stored = self.load(self.store.latest_volatility(protocol).await, "volatility");
        let Some(prices) = prices else {
            debug!(protocol = %protocol, "Keeping last volatility forecast");
            return stored;
        };
        if !advanced(prices, stored.as_ref().and_then(|f| f.series_end)) {
            debug!(protocol = %protocol, "Price series unchanged");
            return stored;
        }
        let forecast = self
            .forecasts
            .volatility(protocol, prices.clone(), self.settings.horizon)
            .await;
        match self.store.save_volatility(&forecast).await {
            Ok(()) => {
                self.hub.publish(Update::volatility(forecast.clone()));
            }
            Err(e) => warn!(protocol = %protocol, error = %e, "Volatility forecast not persisted"),
        }
        Some(forecast)
    }

    async fn refresh_liquidity(
        &self,
        protocol: &ProtocolId,
        tvl: Option<&Series>,
    ) -> Option<LiquidityForecast> {
        let stored = self.load(self.store.latest_liquidity(protocol).await, "liquidity");
        let days = self.settings.history_days;
        let Some(tvl) = tvl else {
            debug!(protocol = %protocol, "Keeping last liquidity forecast");
            return stored;
        };
        if !advanced(tvl, stored.as_ref().and_then(|f| f.series_end)) {
            debug!(protocol = %protocol, "TVL series unchanged");
            return stored;
        }
        let mut related = Vec::new();
        let others = self
            .registry
            .get(protocol)
            .map(|p| p.related.clone())
            .unwrap_or_default();
        for other in others {
            match self.feed.tvl_series(&other, days).await {
                Ok(series) => related.push((other, series)),
                Err(e) => debug!(protocol = %other, error = %e, "Related TVL unavailable"),
            }
        }
        let forecast = self
            .forecasts
            .liquidity(protocol, tvl.clone(), self.settings.horizon, related)
            .await;
        match self.store.save_liquidity(&forecast).await {
            Ok(()) => {
                self.hub.publish(Update::liquidity(forecast.clone()));
            }
            Err(e) => warn!(protocol = %protocol, error = %e, "Liquidity forecast not persisted"),
        }
        Some(forecast)
    }

    async fn refresh_guidance(
        &self,
        assessment: &RiskAssessment,
        volatility: Option<&VolatilityForecast>,
        liquidity: Option<&LiquidityForecast>,
    ) -> (Option<ExecutionGuidance>, bool) {
        let stored = self.load(self.store.latest_guidance(&assessment.upgrade).await, "guidance");
        let fresh = guide(assessment, volatility, liquidity, &self.guidance);
        if let Some(previous) = stored {
            if fresh.computed_at <= previous.computed_at {
                return (Some(previous), false);
            }
        }
        match self.store.save_guidance(&fresh).await {
            Ok(()) => {
                self.hub.publish(Update::guidance(fresh.clone()));
            }
            Err(e) => warn!(upgrade = %assessment.upgrade, error = %e, "Guidance not persisted"),
        }
        (Some(fresh), true)
    }

    /// Price and TVL behaviour on either side of the upgrade, plus expected
    /// flows from related protocols. `None` when the upgrade has no events
    /// or neither side of the anchor has market data.
    async fn analyze_impact(
        &self,
        upgrade: &UpgradeId,
        protocol: &ProtocolId,
        prices: Option<&Series>,
        tvl: Option<&Series>,
        liquidity: Option<&LiquidityForecast>,
    ) -> Option<UpgradeImpact> {
        let events = self.load(self.store.events_for_upgrade(upgrade).await.map(Some), "events")?;
        let anchor = events
            .iter()
            .filter(|e| e.kind() == EventKind::UpgradeExecuted)
            .map(|e| e.ingested_at)
            .min()
            .or_else(|| events.iter().map(|e| e.ingested_at).min())?;

        let window = Duration::days(i64::from(self.settings.impact_window_days));
        let sides = |series: &Series| {
            (
                series.between(anchor - window, anchor),
                series.between(anchor, anchor + window),
            )
        };
        let volatility = prices.map(sides).and_then(|(before, after)| {
            (before.len() >= 3 && after.len() >= 3)
                .then(|| self.forecasts.volatility_predictor().regime_shift(&before, &after))
        });
        let liquidity_impact = tvl.map(sides).and_then(|(before, after)| liquidity_shift(&before, &after));
        if volatility.is_none() && liquidity_impact.is_none() {
            debug!(upgrade = %upgrade, "No market data around the upgrade");
            return None;
        }

        let mut flows = Vec::new();
        if let Some(own) = liquidity {
            let others = self
                .registry
                .get(protocol)
                .map(|p| p.related.clone())
                .unwrap_or_default();
            for other in &others {
                if let Some(source) = self.load(self.store.latest_liquidity(other).await, "liquidity") {
                    flows.push(estimate_flow(&source, own));
                }
            }
        }

        let impact = UpgradeImpact {
            upgrade: upgrade.clone(),
            protocol: protocol.clone(),
            anchor,
            volatility,
            liquidity: liquidity_impact,
            flows,
            computed_at: Utc::now(),
        };
        info!(
            upgrade = %upgrade,
            volatility_change = ?impact.volatility.map(|v| v.change),
            transition = ?impact.liquidity.map(|l| l.transition),
            "Upgrade impact"
        );
        self.hub.publish(Update::impact(impact.clone()));
        Some(impact)
    }

    /// Voting history and forecast accuracy for one protocol.
    pub async fn report(&self, protocol: &ProtocolId) -> Result<ProtocolReport> {
        let now = Utc::now();
        let proposals = self.store.proposals().await?;
        let voting = governance::analyze(protocol, &proposals, now, VOTING_PERIOD_DAYS, VOTING_RECENT_DAYS);

        let since = now - Duration::days(i64::from(self.settings.evaluation_days));
        let predictor = self.forecasts.volatility_predictor();
        let volatility = match self.prices(protocol).await {
            Some(prices) => {
                let history = self.store.volatility_history(protocol).await?;
                scored(
                    protocol,
                    "volatility",
                    volatility_performance(protocol, &history, &prices, predictor, since),
                )
            }
            None => None,
        };
        let liquidity = match self.tvl(protocol).await {
            Some(tvl) => {
                let history = self.store.liquidity_history(protocol).await?;
                scored(protocol, "liquidity", liquidity_performance(protocol, &history, &tvl, since))
            }
            None => None,
        };

        Ok(ProtocolReport {
            protocol: protocol.clone(),
            voting,
            volatility,
            liquidity,
            generated_at: now,
        })
    }

    fn load<T>(&self, read: std::result::Result<Option<T>, PersistenceError>, what: &str) -> Option<T> {
        read.unwrap_or_else(|e| {
            warn!(entity = what, error = %e, "Stored state unavailable");
            None
        })
    }
}

const VOTING_PERIOD_DAYS: i64 = 90;
const VOTING_RECENT_DAYS: i64 = 30;

fn scored(
    protocol: &ProtocolId,
    entity: &str,
    result: std::result::Result<ModelPerformance, ForecastError>,
) -> Option<ModelPerformance> {
    result
        .inspect_err(|e| debug!(protocol = %protocol, entity, error = %e, "Forecast performance unavailable"))
        .ok()
}

/// The series has a point newer than the one the last forecast used.
fn advanced(series: &Series, last_used: Option<DateTime<Utc>>) -> bool {
    match (series.last_at(), last_used) {
        (Some(end), Some(used)) => end > used,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

#[async_trait]
impl UpgradeMonitor for Pipeline {
    async fn assess(&self, upgrade: &UpgradeId) -> std::result::Result<RiskAssessment, PersistenceError> {
        self.engine.assess(upgrade).await
    }

    async fn reevaluate(&self, upgrade: &UpgradeId) -> Result<Reevaluation> {
        Pipeline::reevaluate(self, upgrade).await
    }

    async fn forecast_volatility(&self, protocol: &ProtocolId, horizon: u32) -> Result<VolatilityForecast> {
        let prices = self.feed.price_series(protocol, self.settings.history_days).await?;
        Ok(self.forecasts.volatility(protocol, prices, horizon).await)
    }

    async fn forecast_liquidity(&self, protocol: &ProtocolId, horizon: u32) -> Result<LiquidityForecast> {
        let days = self.settings.history_days;
        let tvl = self.feed.tvl_series(protocol, days).await?;
        let mut related = Vec::new();
        if let Some(p) = self.registry.get(protocol) {
            for other in &p.related {
                if let Ok(series) = self.feed.tvl_series(other, days).await {
                    related.push((other.clone(), series));
                }
            }
        }
        Ok(self.forecasts.liquidity(protocol, tvl, horizon, related).await)
    }

    async fn record_sentiment(
        &self,
        protocol: Option<ProtocolId>,
        text: &str,
        engagement: f64,
    ) -> Result<SentimentSample> {
        let sample = self.sentiment.score(text, protocol, engagement, Utc::now());
        self.store.append_sentiment(&sample).await?;
        for alert in self.sentiment.alerts(std::slice::from_ref(&sample)) {
            info!(
                protocol = ?alert.protocol,
                polarity = alert.polarity,
                label = ?alert.label,
                "Sentiment alert"
            );
            self.hub.publish(Update::sentiment_alert(alert.clone()));
        }
        Ok(sample)
    }

    async fn report(&self, protocol: &ProtocolId) -> Result<ProtocolReport> {
        Pipeline::report(self, protocol).await
    }

    fn health(&self) -> HealthReport {
        HealthReport::from_networks(
            self.board.snapshot(),
            self.hub.subscriber_count(),
            self.engine.in_flight(),
        )
    }
}
