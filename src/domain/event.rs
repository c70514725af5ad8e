//! Normalized on-chain upgrade events.
//!
//! Raw chain logs are decoded once, at the ingestion boundary, into the
//! closed [`EventPayload`] enum. Downstream code matches on variants rather
//! than probing fields.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{NetworkId, ProposalId, ProtocolId, TxHash, UpgradeId};

/// Event classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    UpgradeProposed,
    UpgradeExecuted,
    ParameterChange,
    GovernanceVote,
    Other,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        Self::UpgradeProposed,
        Self::UpgradeExecuted,
        Self::ParameterChange,
        Self::GovernanceVote,
        Self::Other,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UpgradeProposed => "upgrade_proposed",
            Self::UpgradeExecuted => "upgrade_executed",
            Self::ParameterChange => "parameter_change",
            Self::GovernanceVote => "governance_vote",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded event payload, one schema per event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    UpgradeProposed {
        proposal_id: Option<ProposalId>,
        /// Raw calldata size in bytes.
        calldata_bytes: usize,
    },
    UpgradeExecuted {
        proposal_id: Option<ProposalId>,
        /// New implementation address, when the log names one.
        implementation: Option<String>,
    },
    ParameterChange {
        /// Signature topic that matched.
        signature: String,
        calldata_bytes: usize,
    },
    GovernanceVote {
        proposal_id: ProposalId,
        voter: String,
        support: bool,
    },
    /// Unknown or malformed log. Recorded, never dropped.
    Other {
        reason: String,
        topics: Vec<String>,
        data: String,
    },
}

impl EventPayload {
    /// The event kind this payload belongs to.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::UpgradeProposed { .. } => EventKind::UpgradeProposed,
            Self::UpgradeExecuted { .. } => EventKind::UpgradeExecuted,
            Self::ParameterChange { .. } => EventKind::ParameterChange,
            Self::GovernanceVote { .. } => EventKind::GovernanceVote,
            Self::Other { .. } => EventKind::Other,
        }
    }

    /// The governance proposal referenced by this payload, if any.
    #[must_use]
    pub fn proposal_id(&self) -> Option<&ProposalId> {
        match self {
            Self::UpgradeProposed { proposal_id, .. } | Self::UpgradeExecuted { proposal_id, .. } => {
                proposal_id.as_ref()
            }
            Self::GovernanceVote { proposal_id, .. } => Some(proposal_id),
            Self::ParameterChange { .. } | Self::Other { .. } => None,
        }
    }

    /// Approximate payload size, used as a code-complexity proxy.
    #[must_use]
    pub fn size_hint(&self) -> usize {
        match self {
            Self::UpgradeProposed { calldata_bytes, .. }
            | Self::ParameterChange { calldata_bytes, .. } => *calldata_bytes,
            Self::UpgradeExecuted { implementation, .. } => {
                implementation.as_ref().map_or(0, String::len)
            }
            Self::GovernanceVote { .. } => 0,
            Self::Other { data, topics, .. } => {
                data.len() / 2 + topics.iter().map(|t| t.len() / 2).sum::<usize>()
            }
        }
    }
}

/// Uniqueness key of an event: (network, tx hash, log index).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub network: NetworkId,
    pub tx_hash: TxHash,
    pub log_index: u64,
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.network, self.tx_hash, self.log_index)
    }
}

/// A normalized on-chain event. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeEvent {
    pub key: EventKey,
    pub protocol: ProtocolId,
    pub upgrade: UpgradeId,
    pub block_number: u64,
    pub payload: EventPayload,
    pub ingested_at: DateTime<Utc>,
}

impl UpgradeEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    #[must_use]
    pub fn network(&self) -> &NetworkId {
        &self.key.network
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serializes_with_kind_tag() {
        let payload = EventPayload::GovernanceVote {
            proposal_id: ProposalId::from("7"),
            voter: "0xabc".into(),
            support: true,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "governance_vote");
        assert_eq!(json["proposal_id"], "7");
    }

    #[test]
    fn proposal_id_is_exposed_for_governance_payloads() {
        let executed = EventPayload::UpgradeExecuted {
            proposal_id: Some(ProposalId::from("12")),
            implementation: None,
        };
        assert_eq!(executed.proposal_id().map(ProposalId::as_str), Some("12"));

        let other = EventPayload::Other {
            reason: "unknown signature".into(),
            topics: vec![],
            data: String::new(),
        };
        assert!(other.proposal_id().is_none());
        assert_eq!(other.kind(), EventKind::Other);
    }
}
