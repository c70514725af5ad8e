//! Update envelope relayed verbatim by any transport.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::event::UpgradeEvent;
use crate::domain::forecast::{LiquidityForecast, VolatilityForecast};
use crate::domain::guidance::ExecutionGuidance;
use crate::domain::impact::UpgradeImpact;
use crate::domain::network::NetworkStatus;
use crate::domain::risk::RiskAssessment;
use crate::domain::sentiment::SentimentSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    UpgradeNotification,
    RiskAlert,
    VolatilityUpdate,
    NetworkEvent,
    SystemStatus,
}

impl UpdateKind {
    pub const ALL: [UpdateKind; 5] = [
        Self::UpgradeNotification,
        Self::RiskAlert,
        Self::VolatilityUpdate,
        Self::NetworkEvent,
        Self::SystemStatus,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UpgradeNotification => "upgrade_notification",
            Self::RiskAlert => "risk_alert",
            Self::VolatilityUpdate => "volatility_update",
            Self::NetworkEvent => "network_event",
            Self::SystemStatus => "system_status",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity carried by an update. Degraded and partial flags travel with
/// the entity itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum UpdateData {
    Assessment(RiskAssessment),
    Volatility(VolatilityForecast),
    Liquidity(LiquidityForecast),
    Guidance(ExecutionGuidance),
    Impact(UpgradeImpact),
    Event(UpgradeEvent),
    Status(NetworkStatus),
    /// A sample whose polarity crossed the alert threshold.
    Sentiment(SentimentSample),
}

/// `{"type", "data", "timestamp"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub data: UpdateData,
    pub timestamp: DateTime<Utc>,
}

impl Update {
    #[must_use]
    pub fn assessment(assessment: RiskAssessment) -> Self {
        let timestamp = assessment.computed_at;
        Self {
            kind: UpdateKind::RiskAlert,
            data: UpdateData::Assessment(assessment),
            timestamp,
        }
    }

    #[must_use]
    pub fn volatility(forecast: VolatilityForecast) -> Self {
        let timestamp = forecast.computed_at;
        Self {
            kind: UpdateKind::VolatilityUpdate,
            data: UpdateData::Volatility(forecast),
            timestamp,
        }
    }

    /// Liquidity forecasts share the volatility channel.
    #[must_use]
    pub fn liquidity(forecast: LiquidityForecast) -> Self {
        let timestamp = forecast.computed_at;
        Self {
            kind: UpdateKind::VolatilityUpdate,
            data: UpdateData::Liquidity(forecast),
            timestamp,
        }
    }

    #[must_use]
    pub fn guidance(guidance: ExecutionGuidance) -> Self {
        let timestamp = guidance.computed_at;
        Self {
            kind: UpdateKind::UpgradeNotification,
            data: UpdateData::Guidance(guidance),
            timestamp,
        }
    }

    #[must_use]
    pub fn impact(impact: UpgradeImpact) -> Self {
        let timestamp = impact.computed_at;
        Self {
            kind: UpdateKind::UpgradeNotification,
            data: UpdateData::Impact(impact),
            timestamp,
        }
    }

    #[must_use]
    pub fn sentiment_alert(sample: SentimentSample) -> Self {
        let timestamp = sample.timestamp;
        Self {
            kind: UpdateKind::RiskAlert,
            data: UpdateData::Sentiment(sample),
            timestamp,
        }
    }

    #[must_use]
    pub fn event(event: UpgradeEvent) -> Self {
        let timestamp = event.ingested_at;
        Self {
            kind: UpdateKind::NetworkEvent,
            data: UpdateData::Event(event),
            timestamp,
        }
    }

    #[must_use]
    pub fn status(status: NetworkStatus) -> Self {
        let timestamp = status.at;
        Self {
            kind: UpdateKind::SystemStatus,
            data: UpdateData::Status(status),
            timestamp,
        }
    }

    /// Serialized envelope, as sent over a transport.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::NetworkId;
    use crate::domain::network::Liveness;

    #[test]
    fn envelope_has_type_data_timestamp() {
        let status = NetworkStatus {
            network: NetworkId::from("ethereum"),
            liveness: Liveness::Stale,
            consecutive_failures: 5,
            last_block: Some(100),
            last_error: Some("timeout".into()),
            at: Utc::now(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&Update::status(status).to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "system_status");
        assert_eq!(json["data"]["entity"], "status");
        assert_eq!(json["data"]["liveness"], "stale");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }
}
