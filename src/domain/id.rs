//! Domain identifier types with proper encapsulation.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a new `", stringify!($name), "` from a string.")]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

string_id!(
    /// Network identifier (e.g. `ethereum`, `arbitrum`).
    NetworkId
);

string_id!(
    /// Protocol identifier (e.g. `aave_v3`).
    ProtocolId
);

string_id!(
    /// Upgrade identifier: the unit of risk assessment.
    ///
    /// Built as `<protocol>:<proposal id>` when an event references a
    /// governance proposal, `<protocol>:<tx hash>` otherwise.
    UpgradeId
);

string_id!(
    /// Governance proposal identifier as issued by the platform.
    ProposalId
);

string_id!(
    /// Transaction hash, normalised to lowercase hex.
    TxHash
);

impl UpgradeId {
    /// Upgrade id for an upgrade driven by a governance proposal.
    #[must_use]
    pub fn for_proposal(protocol: &ProtocolId, proposal: &ProposalId) -> Self {
        Self(format!("{protocol}:{proposal}"))
    }

    /// Upgrade id for an upgrade seen only as a transaction.
    #[must_use]
    pub fn for_transaction(protocol: &ProtocolId, tx: &TxHash) -> Self {
        Self(format!("{protocol}:{tx}"))
    }

    /// The protocol prefix of this upgrade id.
    #[must_use]
    pub fn protocol(&self) -> ProtocolId {
        let prefix = self.0.split(':').next().unwrap_or_default();
        ProtocolId::new(prefix)
    }
}

impl TxHash {
    /// Normalise a hash string: trimmed and lowercased.
    #[must_use]
    pub fn normalized(raw: &str) -> Self {
        Self(raw.trim().to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_id_for_proposal() {
        let id = UpgradeId::for_proposal(&ProtocolId::from("aave_v3"), &ProposalId::from("42"));
        assert_eq!(id.as_str(), "aave_v3:42");
        assert_eq!(id.protocol(), ProtocolId::from("aave_v3"));
    }

    #[test]
    fn tx_hash_is_normalized() {
        let tx = TxHash::normalized("  0xABCdef ");
        assert_eq!(tx.as_str(), "0xabcdef");
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = NetworkId::from("ethereum");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ethereum\"");
    }
}
