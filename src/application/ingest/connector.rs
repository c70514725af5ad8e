//! One connector per network: block cursor, classification, idempotent
//! insert, re-evaluation triggers and liveness.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::classify::EventClassifier;
use super::registry::ProtocolRegistry;
use super::trigger::TriggerSender;
use super::LivenessBoard;
use crate::application::distribution::{DistributionHub, Update};
use crate::domain::event::{EventKey, UpgradeEvent};
use crate::domain::id::{NetworkId, TxHash, UpgradeId};
use crate::domain::network::{Liveness, NetworkStatus};
use crate::error::{Error, Result};
use crate::port::outbound::chain::{ChainClient, RawLog};
use crate::port::outbound::store::Store;

/// Exponential backoff between failed polls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectorSettings {
    /// Blocks behind head treated as final.
    pub confirmations: u64,
    /// Most blocks fetched per poll.
    pub batch_size: u64,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    /// Consecutive failed polls before the network is `stale`.
    pub stale_after: u32,
    /// Consecutive failed polls before the network is `down`.
    pub down_after: u32,
    /// First block to ingest; `None` starts at the current safe head.
    pub start_block: Option<u64>,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            confirmations: 2,
            batch_size: 500,
            poll_interval: Duration::from_secs(12),
            retry: RetryPolicy::default(),
            stale_after: 5,
            down_after: 15,
            start_block: None,
        }
    }
}

/// What one successful poll did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub from_block: u64,
    pub to_block: u64,
    pub logs: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// The batch reached the safe head.
    pub caught_up: bool,
}

/// Shared collaborators of every connector.
#[derive(Clone)]
pub struct IngestContext {
    pub registry: Arc<ProtocolRegistry>,
    pub classifier: Arc<EventClassifier>,
    pub store: Arc<dyn Store>,
    pub hub: Arc<DistributionHub>,
    pub triggers: TriggerSender,
    pub board: Arc<LivenessBoard>,
}

pub struct NetworkConnector {
    network: NetworkId,
    client: Arc<dyn ChainClient>,
    ctx: IngestContext,
    settings: ConnectorSettings,
    /// Last fully ingested block.
    cursor: Option<u64>,
    failures: u32,
    liveness: Liveness,
    delay_ms: u64,
}

impl NetworkConnector {
    #[must_use]
    pub fn new(
        network: NetworkId,
        client: Arc<dyn ChainClient>,
        ctx: IngestContext,
        settings: ConnectorSettings,
    ) -> Self {
        ctx.board.register(&network);
        Self {
            cursor: settings.start_block.map(|b| b.saturating_sub(1)),
            delay_ms: settings.retry.initial_delay_ms,
            network,
            client,
            ctx,
            settings,
            failures: 0,
            liveness: Liveness::Live,
        }
    }

    #[must_use]
    pub fn network(&self) -> &NetworkId {
        &self.network
    }

    #[must_use]
    pub const fn liveness(&self) -> Liveness {
        self.liveness
    }

    #[must_use]
    pub const fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// Poll once and update liveness. A failure is returned after it has
    /// been counted; the cursor only moves on success.
    pub async fn poll_once(&mut self) -> Result<PollReport> {
        match self.fetch_batch().await {
            Ok(report) => {
                self.record_success();
                Ok(report)
            }
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    async fn fetch_batch(&mut self) -> Result<PollReport> {
        let head = self.client.latest_block().await?;
        let safe = head.saturating_sub(self.settings.confirmations);
        let Some(cursor) = self.cursor else {
            debug!(network = %self.network, block = safe, "Cursor initialised at safe head");
            self.cursor = Some(safe);
            return Ok(PollReport {
                from_block: safe,
                to_block: safe,
                caught_up: true,
                ..PollReport::default()
            });
        };
        if safe <= cursor {
            return Ok(PollReport {
                from_block: cursor,
                to_block: cursor,
                caught_up: true,
                ..PollReport::default()
            });
        }
        let from = cursor + 1;
        let to = safe.min(cursor + self.settings.batch_size.max(1));
        let addresses = self.ctx.registry.addresses(&self.network);
        let mut logs = self.client.logs(from, to, &addresses).await?;
        logs.sort_by_key(|l| (l.block_number, l.log_index));

        let mut report = PollReport {
            from_block: from,
            to_block: to,
            logs: logs.len(),
            caught_up: to == safe,
            ..PollReport::default()
        };
        for log in &logs {
            match self.ingest(log).await? {
                Some(true) => report.inserted += 1,
                Some(false) => report.duplicates += 1,
                None => {}
            }
        }
        self.cursor = Some(to);
        if report.inserted > 0 {
            info!(
                network = %self.network,
                from_block = from,
                to_block = to,
                inserted = report.inserted,
                duplicates = report.duplicates,
                "Events ingested"
            );
        }
        Ok(report)
    }

    /// `Some(true)` when new, `Some(false)` when already stored, `None`
    /// for logs from unregistered addresses.
    async fn ingest(&self, log: &RawLog) -> Result<Option<bool>> {
        let Some(protocol) = self.ctx.registry.owner(&self.network, &log.address) else {
            debug!(network = %self.network, address = %log.address, "Log from unwatched address");
            return Ok(None);
        };
        let payload = self.ctx.classifier.classify(log);
        let tx_hash = TxHash::normalized(&log.tx_hash);
        let upgrade = match payload.proposal_id() {
            Some(proposal) => UpgradeId::for_proposal(&protocol.id, proposal),
            None => UpgradeId::for_transaction(&protocol.id, &tx_hash),
        };
        let event = UpgradeEvent {
            key: EventKey {
                network: self.network.clone(),
                tx_hash,
                log_index: log.log_index,
            },
            protocol: protocol.id.clone(),
            upgrade,
            block_number: log.block_number,
            payload,
            ingested_at: Utc::now(),
        };
        if !self.ctx.store.insert_event(&event).await? {
            return Ok(Some(false));
        }
        debug!(event = %event.key, kind = %event.kind(), upgrade = %event.upgrade, "New upgrade event");
        let upgrade = event.upgrade.clone();
        self.ctx.hub.publish(Update::event(event));
        self.ctx.triggers.push(upgrade)?;
        Ok(Some(true))
    }

    fn record_success(&mut self) {
        self.failures = 0;
        self.delay_ms = self.settings.retry.initial_delay_ms;
        self.set_liveness(Liveness::Live, None);
    }

    fn record_failure(&mut self, e: &Error) {
        self.failures = self.failures.saturating_add(1);
        let next = if self.failures >= self.settings.down_after {
            Liveness::Down
        } else if self.failures >= self.settings.stale_after {
            Liveness::Stale
        } else {
            self.liveness
        };
        warn!(
            network = %self.network,
            failures = self.failures,
            error = %e,
            "Network poll failed"
        );
        self.set_liveness(next, Some(e.to_string()));
    }

    fn set_liveness(&mut self, next: Liveness, last_error: Option<String>) {
        if next == self.liveness {
            return;
        }
        let previous = self.liveness;
        self.liveness = next;
        let status = NetworkStatus {
            network: self.network.clone(),
            liveness: next,
            consecutive_failures: self.failures,
            last_block: self.cursor,
            last_error,
            at: Utc::now(),
        };
        if next == Liveness::Live {
            info!(network = %self.network, from = %previous, "Network recovered");
        } else {
            error!(network = %self.network, from = %previous, to = %next, "Network liveness degraded");
        }
        self.ctx.board.update(status.clone());
        self.ctx.hub.publish(Update::status(status));
    }

    /// Next backoff delay with up to 20% jitter; advances the backoff.
    fn next_delay(&mut self) -> Duration {
        let base = self.delay_ms;
        let jitter = if base >= 5 { rand::random::<u64>() % (base / 5 + 1) } else { 0 };
        let next = (base as f64 * self.settings.retry.backoff_multiplier) as u64;
        self.delay_ms = next.min(self.settings.retry.max_delay_ms).max(1);
        Duration::from_millis(base + jitter)
    }

    /// Poll until `shutdown` flips. Failures back off exponentially; a
    /// failing network never stops the others.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(network = %self.network, "Connector started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let wait = match self.poll_once().await {
                Ok(report) if !report.caught_up => Duration::ZERO,
                Ok(_) => self.settings.poll_interval,
                Err(Error::Shutdown) => break,
                Err(_) => self.next_delay(),
            };
            tokio::select! {
                _ = shutdown.changed() => break,
                () = tokio::time::sleep(wait) => {}
            }
        }
        info!(network = %self.network, "Connector stopped");
    }
}
