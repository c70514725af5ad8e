//! Distribution hub: fan-out of new state to subscribers plus a latest-state
//! cache for pull snapshots.
//!
//! Delivery is best-effort. Each subscriber owns a bounded channel; a full or
//! closed channel drops that subscriber without delaying anyone else.

pub mod message;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::event::UpgradeEvent;
use crate::domain::forecast::{LiquidityForecast, VolatilityForecast};
use crate::domain::guidance::ExecutionGuidance;
use crate::domain::id::{NetworkId, ProtocolId, UpgradeId};
use crate::domain::impact::UpgradeImpact;
use crate::domain::network::NetworkStatus;
use crate::domain::risk::RiskAssessment;

pub use message::{Update, UpdateData, UpdateKind};

struct Subscriber {
    tx: mpsc::Sender<Update>,
    /// `None` receives everything.
    kinds: Option<HashSet<UpdateKind>>,
}

impl Subscriber {
    fn wants(&self, kind: UpdateKind) -> bool {
        self.kinds.as_ref().map_or(true, |k| k.contains(&kind))
    }
}

/// A live subscription. Dropping the receiver unsubscribes on the next
/// broadcast.
#[derive(Debug)]
pub struct Subscription {
    pub id: Uuid,
    pub updates: mpsc::Receiver<Update>,
}

/// Latest of every entity type, for reconnecting or polling clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkState {
    pub assessments: Vec<RiskAssessment>,
    pub volatility: Vec<VolatilityForecast>,
    pub liquidity: Vec<LiquidityForecast>,
    pub guidance: Vec<ExecutionGuidance>,
    pub impacts: Vec<UpgradeImpact>,
    pub recent_events: Vec<UpgradeEvent>,
    pub networks: Vec<NetworkStatus>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Latest {
    assessments: HashMap<UpgradeId, RiskAssessment>,
    volatility: HashMap<ProtocolId, VolatilityForecast>,
    liquidity: HashMap<ProtocolId, LiquidityForecast>,
    guidance: HashMap<UpgradeId, ExecutionGuidance>,
    impacts: HashMap<UpgradeId, UpgradeImpact>,
    events: VecDeque<UpgradeEvent>,
    networks: HashMap<NetworkId, NetworkStatus>,
}

pub struct DistributionHub {
    subscribers: DashMap<Uuid, Subscriber>,
    latest: RwLock<Latest>,
    buffer: usize,
    recent_events: usize,
    closed: AtomicBool,
}

impl DistributionHub {
    /// `buffer` is each subscriber's queue depth; `recent_events` bounds the
    /// event tail kept for snapshots.
    #[must_use]
    pub fn new(buffer: usize, recent_events: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            latest: RwLock::new(Latest::default()),
            buffer: buffer.max(1),
            recent_events,
            closed: AtomicBool::new(false),
        }
    }

    /// Subscribe to every update kind, or only to `kinds`.
    pub fn subscribe(&self, kinds: Option<&[UpdateKind]>) -> Subscription {
        let (tx, updates) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        if self.is_closed() {
            // Sender dropped immediately; the receiver sees a closed channel.
            return Subscription { id, updates };
        }
        self.subscribers.insert(
            id,
            Subscriber {
                tx,
                kinds: kinds.map(|k| k.iter().copied().collect()),
            },
        );
        debug!(subscriber = %id, "Subscriber registered");
        Subscription { id, updates }
    }

    pub fn unsubscribe(&self, id: &Uuid) -> bool {
        self.subscribers.remove(id).is_some()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Cache the entity and broadcast it. Returns how many subscribers
    /// accepted the update.
    pub fn publish(&self, update: Update) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.remember(&update);

        let mut delivered = 0;
        let mut dropped = Vec::new();
        for entry in &self.subscribers {
            if !entry.wants(update.kind) {
                continue;
            }
            match entry.tx.try_send(update.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => dropped.push(*entry.key()),
            }
        }
        for id in dropped {
            if self.subscribers.remove(&id).is_some() {
                info!(subscriber = %id, kind = %update.kind, "Slow or closed subscriber dropped");
            }
        }
        delivered
    }

    fn remember(&self, update: &Update) {
        let mut latest = self.latest.write();
        match &update.data {
            UpdateData::Assessment(a) => {
                keep_newer(&mut latest.assessments, a.upgrade.clone(), a, |a| a.computed_at);
            }
            UpdateData::Volatility(f) => {
                keep_newer(&mut latest.volatility, f.protocol.clone(), f, |f| f.computed_at);
            }
            UpdateData::Liquidity(f) => {
                keep_newer(&mut latest.liquidity, f.protocol.clone(), f, |f| f.computed_at);
            }
            UpdateData::Guidance(g) => {
                keep_newer(&mut latest.guidance, g.upgrade.clone(), g, |g| g.computed_at);
            }
            UpdateData::Impact(i) => {
                keep_newer(&mut latest.impacts, i.upgrade.clone(), i, |i| i.computed_at);
            }
            UpdateData::Event(e) => {
                if self.recent_events > 0 {
                    if latest.events.len() == self.recent_events {
                        latest.events.pop_front();
                    }
                    latest.events.push_back(e.clone());
                }
            }
            UpdateData::Status(s) => {
                latest.networks.insert(s.network.clone(), s.clone());
            }
            UpdateData::Sentiment(_) => {}
        }
    }

    /// Latest of each entity type.
    #[must_use]
    pub fn bulk_state(&self) -> BulkState {
        let latest = self.latest.read();
        let mut state = BulkState {
            assessments: latest.assessments.values().cloned().collect(),
            volatility: latest.volatility.values().cloned().collect(),
            liquidity: latest.liquidity.values().cloned().collect(),
            guidance: latest.guidance.values().cloned().collect(),
            impacts: latest.impacts.values().cloned().collect(),
            recent_events: latest.events.iter().cloned().collect(),
            networks: latest.networks.values().cloned().collect(),
            timestamp: None,
        };
        state.assessments.sort_by(|a, b| a.upgrade.cmp(&b.upgrade));
        state.volatility.sort_by(|a, b| a.protocol.cmp(&b.protocol));
        state.liquidity.sort_by(|a, b| a.protocol.cmp(&b.protocol));
        state.guidance.sort_by(|a, b| a.upgrade.cmp(&b.upgrade));
        state.impacts.sort_by(|a, b| a.upgrade.cmp(&b.upgrade));
        state.networks.sort_by(|a, b| a.network.cmp(&b.network));
        state.timestamp = Some(Utc::now());
        state
    }

    /// Stop accepting updates and release every subscriber. Receivers drain
    /// what is already queued, then see the channel close.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let count = self.subscribers.len();
        self.subscribers.clear();
        info!(subscribers = count, "Distribution hub closed");
    }
}

fn keep_newer<K, V>(map: &mut HashMap<K, V>, key: K, value: &V, at: impl Fn(&V) -> DateTime<Utc>)
where
    K: std::hash::Hash + Eq,
    V: Clone,
{
    match map.get(&key) {
        Some(current) if at(current) > at(value) => {}
        _ => {
            map.insert(key, value.clone());
        }
    }
}

#[cfg(test)]
mod tests;
