//! Registered protocols, indexed by id and by watched contract address.

use std::collections::HashMap;

use crate::domain::id::{NetworkId, ProtocolId};
use crate::domain::network::Protocol;

#[derive(Debug, Clone, Default)]
pub struct ProtocolRegistry {
    protocols: HashMap<ProtocolId, Protocol>,
    /// `(network, lowercase address)` → owning protocol.
    by_address: HashMap<(NetworkId, String), ProtocolId>,
}

impl ProtocolRegistry {
    #[must_use]
    pub fn new(protocols: impl IntoIterator<Item = Protocol>) -> Self {
        let mut registry = Self::default();
        for protocol in protocols {
            registry.register(protocol);
        }
        registry
    }

    fn register(&mut self, protocol: Protocol) {
        for address in &protocol.addresses {
            self.by_address.insert(
                (protocol.network.clone(), address.to_ascii_lowercase()),
                protocol.id.clone(),
            );
        }
        self.protocols.insert(protocol.id.clone(), protocol);
    }

    #[must_use]
    pub fn get(&self, id: &ProtocolId) -> Option<&Protocol> {
        self.protocols.get(id)
    }

    #[must_use]
    pub fn owner(&self, network: &NetworkId, address: &str) -> Option<&Protocol> {
        self.by_address
            .get(&(network.clone(), address.to_ascii_lowercase()))
            .and_then(|id| self.protocols.get(id))
    }

    /// Watched addresses on one network.
    #[must_use]
    pub fn addresses(&self, network: &NetworkId) -> Vec<String> {
        let mut out: Vec<String> = self
            .by_address
            .keys()
            .filter(|(n, _)| n == network)
            .map(|(_, a)| a.clone())
            .collect();
        out.sort();
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &Protocol> {
        self.protocols.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aave() -> Protocol {
        Protocol {
            id: ProtocolId::from("aave"),
            network: NetworkId::from("ethereum"),
            addresses: vec!["0xAbCd".into()],
            security_incidents: 1,
            related: Vec::new(),
        }
    }

    #[test]
    fn lookup_by_address_is_case_insensitive() {
        let registry = ProtocolRegistry::new([aave()]);
        let eth = NetworkId::from("ethereum");
        assert_eq!(registry.owner(&eth, "0xabcd").unwrap().id, ProtocolId::from("aave"));
        assert!(registry.owner(&NetworkId::from("arbitrum"), "0xabcd").is_none());
        assert_eq!(registry.addresses(&eth), vec!["0xabcd".to_string()]);
    }
}
