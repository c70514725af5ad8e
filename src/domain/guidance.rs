//! Execution guidance derived from an assessment and forecasts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::UpgradeId;
use super::risk::{RiskComponent, RiskLevel};

/// Suggested action for a position exposed to the upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuidanceAction {
    Proceed,
    ReduceSize,
    Avoid,
}

impl GuidanceAction {
    #[must_use]
    pub const fn for_level(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Nominal => Self::Proceed,
            RiskLevel::Elevated => Self::ReduceSize,
            RiskLevel::Critical => Self::Avoid,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Proceed => "PROCEED",
            Self::ReduceSize => "REDUCE SIZE",
            Self::Avoid => "AVOID",
        }
    }
}

/// Window during which entering a position is considered acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionWindow {
    pub opens_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
}

impl ExecutionWindow {
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.closes_at - self.opens_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionGuidance {
    pub upgrade: UpgradeId,
    pub level: RiskLevel,
    pub action: GuidanceAction,
    pub window: ExecutionWindow,
    /// Stop-loss distance as a fraction of entry price.
    pub stop_loss: f64,
    pub dominant_driver: RiskComponent,
    pub recommendation: String,
    pub partial: bool,
    /// Latest timestamp among the inputs.
    pub computed_at: DateTime<Utc>,
}
