//! Multi-network event ingestion.
//!
//! Each network gets its own [`NetworkConnector`] task. Connectors share the
//! protocol registry, the classification table and the trigger queue, and
//! report their liveness to a [`LivenessBoard`].

pub mod classify;
pub mod connector;
pub mod registry;
pub mod trigger;

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use crate::domain::id::NetworkId;
use crate::domain::network::{Liveness, NetworkStatus};

pub use classify::EventClassifier;
pub use connector::{ConnectorSettings, IngestContext, NetworkConnector, PollReport, RetryPolicy};
pub use registry::ProtocolRegistry;
pub use trigger::{trigger_queue, Queued, TriggerReceiver, TriggerSender};

/// Latest liveness per network, written only by connectors.
#[derive(Debug, Default)]
pub struct LivenessBoard {
    statuses: RwLock<HashMap<NetworkId, NetworkStatus>>,
}

impl LivenessBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `network` as live, unless it is already known.
    pub fn register(&self, network: &NetworkId) {
        self.statuses
            .write()
            .entry(network.clone())
            .or_insert_with(|| NetworkStatus {
                network: network.clone(),
                liveness: Liveness::Live,
                consecutive_failures: 0,
                last_block: None,
                last_error: None,
                at: Utc::now(),
            });
    }

    pub fn update(&self, status: NetworkStatus) {
        self.statuses.write().insert(status.network.clone(), status);
    }

    #[must_use]
    pub fn liveness(&self, network: &NetworkId) -> Option<Liveness> {
        self.statuses.read().get(network).map(|s| s.liveness)
    }

    /// Every tracked network, sorted by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<NetworkStatus> {
        let mut all: Vec<NetworkStatus> = self.statuses.read().values().cloned().collect();
        all.sort_by(|a, b| a.network.cmp(&b.network));
        all
    }
}
