//! Pure domain types and their invariants.
//!
//! Nothing in here performs I/O. Lifecycle rules that must hold regardless of
//! which store or upstream source is wired in (monotonic proposal status,
//! weight validation, risk classification) live on the types themselves.

pub mod error;
pub mod event;
pub mod forecast;
pub mod governance;
pub mod guidance;
pub mod id;
pub mod impact;
pub mod network;
pub mod risk;
pub mod sentiment;
pub mod series;

pub use error::DomainError;
pub use event::{EventKey, EventKind, EventPayload, UpgradeEvent};
pub use forecast::{
    ConfidenceInterval, CorrelatedSource, FlowDirection, FlowEstimate, ForecastAccuracy,
    ForecastEntity, ForecastModel, LiquidityForecast, LiquidityRegime, ModelParameter,
    ModelPerformance, StationarityResult, VolatilityForecast, VolatilityShift,
};
pub use governance::{
    GovernanceProposal, Platform, ProposalKey, ProposalStatus, TallySnapshot, VotingPatterns,
};
pub use guidance::{ExecutionGuidance, ExecutionWindow, GuidanceAction};
pub use id::{NetworkId, ProposalId, ProtocolId, TxHash, UpgradeId};
pub use impact::{LiquidityImpact, LiquidityTransition, UpgradeImpact, VolatilityImpact};
pub use network::{Liveness, Network, NetworkStatus, Protocol};
pub use risk::{
    ComponentScores, RiskAssessment, RiskComponent, RiskFactor, RiskLevel, RiskWeights,
};
pub use sentiment::{SentimentLabel, SentimentSample, SentimentSummary, TextStats, Trend};
pub use series::{Observation, Series};
