//! Networks and the protocols registered on them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{NetworkId, ProtocolId};

/// Liveness of a network connector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    /// Polls are succeeding.
    #[default]
    Live,
    /// Repeated poll failures; data may lag.
    Stale,
    /// The connector has given up until it next succeeds.
    Down,
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Stale => write!(f, "stale"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// A blockchain network the ingestor connects to.
///
/// Created at configuration load. Only the event ingestor's health check
/// mutates [`Network::liveness`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: NetworkId,
    pub name: String,
    /// RPC endpoint reference (URL or an opaque handle).
    pub rpc_endpoint: String,
    pub liveness: Liveness,
}

impl Network {
    pub fn new(id: NetworkId, name: impl Into<String>, rpc_endpoint: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            rpc_endpoint: rpc_endpoint.into(),
            liveness: Liveness::Live,
        }
    }
}

/// A protocol whose contracts are watched for upgrade activity.
///
/// Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub id: ProtocolId,
    pub network: NetworkId,
    /// Contract addresses, lowercase hex.
    pub addresses: Vec<String>,
    /// Prior security-incident flags recorded for this protocol.
    pub security_incidents: u32,
    /// Protocols whose TVL is compared during flow analysis.
    pub related: Vec<ProtocolId>,
}

impl Protocol {
    /// True if `address` belongs to this protocol (case-insensitive).
    #[must_use]
    pub fn owns(&self, address: &str) -> bool {
        self.addresses
            .iter()
            .any(|a| a.eq_ignore_ascii_case(address))
    }
}

/// Connector health as reported to subscribers on every liveness change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub network: NetworkId,
    pub liveness: Liveness,
    pub consecutive_failures: u32,
    pub last_block: Option<u64>,
    pub last_error: Option<String>,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_owns_address_case_insensitively() {
        let protocol = Protocol {
            id: ProtocolId::from("aave_v3"),
            network: NetworkId::from("ethereum"),
            addresses: vec!["0x7fc66500c84a76ad7e9c93437bfc5ac33e2ddae9".into()],
            security_incidents: 0,
            related: vec![],
        };
        assert!(protocol.owns("0x7Fc66500c84A76Ad7e9c93437bFc5Ac33E2DDaE9"));
        assert!(!protocol.owns("0x0000000000000000000000000000000000000000"));
    }

    #[test]
    fn liveness_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Liveness::Stale).unwrap(), "\"stale\"");
        assert_eq!(Liveness::Down.to_string(), "down");
    }
}
