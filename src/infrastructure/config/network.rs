//! `[[networks]]` and `[[protocols]]` sections.

use serde::Deserialize;

use crate::domain::id::{NetworkId, ProtocolId};
use crate::domain::network::{Network, Protocol};

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// Overrides `ingest.confirmations`.
    #[serde(default)]
    pub confirmations: Option<u64>,
    #[serde(default)]
    pub start_block: Option<u64>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl NetworkConfig {
    #[must_use]
    pub fn to_network(&self) -> Network {
        Network::new(
            NetworkId::new(self.id.clone()),
            self.name.clone().unwrap_or_else(|| self.id.clone()),
            self.rpc_url.clone(),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolConfig {
    pub id: String,
    pub network: String,
    pub addresses: Vec<String>,
    /// Prior security incidents, feeding the technical score.
    #[serde(default)]
    pub security_incidents: u32,
    /// Protocols whose TVL is checked for correlated flows.
    #[serde(default)]
    pub related: Vec<String>,
    #[serde(default)]
    pub coingecko_id: Option<String>,
    #[serde(default)]
    pub defillama_slug: Option<String>,
    #[serde(default)]
    pub snapshot_space: Option<String>,
    #[serde(default)]
    pub tally_organization: Option<String>,
    /// Share of TVL held by top holders, when known out of band.
    #[serde(default)]
    pub holder_concentration: Option<f64>,
}

impl ProtocolConfig {
    #[must_use]
    pub fn to_protocol(&self) -> Protocol {
        Protocol {
            id: ProtocolId::new(self.id.clone()),
            network: NetworkId::new(self.network.clone()),
            addresses: self.addresses.iter().map(|a| a.to_ascii_lowercase()).collect(),
            security_incidents: self.security_incidents,
            related: self.related.iter().map(|r| ProtocolId::new(r.clone())).collect(),
        }
    }
}
