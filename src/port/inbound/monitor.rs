//! Stable entry points into the assessment pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::forecast::{LiquidityForecast, ModelPerformance, VolatilityForecast};
use crate::domain::governance::VotingPatterns;
use crate::domain::guidance::ExecutionGuidance;
use crate::domain::id::{ProtocolId, UpgradeId};
use crate::domain::impact::UpgradeImpact;
use crate::domain::network::{Liveness, NetworkStatus};
use crate::domain::risk::RiskAssessment;
use crate::domain::sentiment::SentimentSample;
use crate::error::{PersistenceError, Result};

/// Everything one re-evaluation produced. Forecasts and guidance are the
/// latest available, refreshed or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reevaluation {
    pub assessment: RiskAssessment,
    pub volatility: Option<VolatilityForecast>,
    pub liquidity: Option<LiquidityForecast>,
    pub guidance: Option<ExecutionGuidance>,
    /// Guidance was recomputed in this pass.
    pub guidance_changed: bool,
    /// Market behaviour around the upgrade, when it has events and market
    /// data covers the anchor.
    pub impact: Option<UpgradeImpact>,
}

/// Governance activity and forecast accuracy for one protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolReport {
    pub protocol: ProtocolId,
    pub voting: VotingPatterns,
    /// Absent until enough stored forecasts have been realized.
    pub volatility: Option<ModelPerformance>,
    pub liquidity: Option<ModelPerformance>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// No network is `down`.
    pub healthy: bool,
    pub networks: Vec<NetworkStatus>,
    pub subscribers: usize,
    pub assessments_in_flight: usize,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    #[must_use]
    pub fn from_networks(
        networks: Vec<NetworkStatus>,
        subscribers: usize,
        assessments_in_flight: usize,
    ) -> Self {
        Self {
            healthy: networks.iter().all(|n| n.liveness != Liveness::Down),
            networks,
            subscribers,
            assessments_in_flight,
            checked_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait UpgradeMonitor: Send + Sync {
    /// Fresh risk assessment, single-flight per upgrade.
    async fn assess(&self, upgrade: &UpgradeId) -> std::result::Result<RiskAssessment, PersistenceError>;

    /// Assessment, forecast refresh, guidance and broadcast.
    async fn reevaluate(&self, upgrade: &UpgradeId) -> Result<Reevaluation>;

    async fn forecast_volatility(&self, protocol: &ProtocolId, horizon: u32) -> Result<VolatilityForecast>;

    async fn forecast_liquidity(&self, protocol: &ProtocolId, horizon: u32) -> Result<LiquidityForecast>;

    /// Score `text` and keep the sample.
    async fn record_sentiment(
        &self,
        protocol: Option<ProtocolId>,
        text: &str,
        engagement: f64,
    ) -> Result<SentimentSample>;

    /// Voting patterns plus volatility and liquidity forecast accuracy.
    async fn report(&self, protocol: &ProtocolId) -> Result<ProtocolReport>;

    fn health(&self) -> HealthReport;
}
