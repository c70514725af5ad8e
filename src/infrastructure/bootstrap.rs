//! Composition root: builds adapters and application services from
//! configuration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::adapter::outbound::governance::{SnapshotSource, TallySource};
use crate::adapter::outbound::market::{HttpMarketFeed, MarketIds};
use crate::adapter::outbound::memory::MemoryStore;
use crate::adapter::outbound::rpc::JsonRpcChainClient;
use crate::adapter::outbound::sqlite::SqliteStore;
use crate::application::distribution::DistributionHub;
use crate::application::governance::GovernanceTracker;
use crate::application::ingest::{EventClassifier, LivenessBoard, ProtocolRegistry};
use crate::application::pipeline::{Pipeline, PipelineParts};
use crate::application::risk::{RiskEngine, RiskEngineConfig};
use crate::domain::id::{NetworkId, ProtocolId};
use crate::error::Result;
use crate::infrastructure::config::settings::{Config, StorageConfig};
use crate::port::outbound::chain::ChainClient;
use crate::port::outbound::governance::GovernanceSource;
use crate::port::outbound::market::MarketDataFeed;
use crate::port::outbound::store::Store;

/// Outbound adapters the services run against.
pub struct Adapters {
    pub store: Arc<dyn Store>,
    pub feed: Arc<dyn MarketDataFeed>,
    pub governance: Vec<Arc<dyn GovernanceSource>>,
    pub chains: HashMap<NetworkId, Arc<dyn ChainClient>>,
}

impl Adapters {
    /// Real upstream clients and the configured store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            store: build_store(config)?,
            feed: build_feed(config),
            governance: build_governance_sources(config),
            chains: build_chain_clients(config),
        })
    }
}

pub(crate) fn build_store(config: &Config) -> Result<Arc<dyn Store>> {
    match &config.storage {
        StorageConfig::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageConfig::Sqlite { path } => {
            let store = SqliteStore::open(path)?;
            info!(path = %path.display(), "Database initialized");
            Ok(Arc::new(store))
        }
    }
}

fn build_feed(config: &Config) -> Arc<dyn MarketDataFeed> {
    let ids: HashMap<ProtocolId, MarketIds> = config
        .protocols
        .iter()
        .map(|p| {
            (
                ProtocolId::new(p.id.clone()),
                MarketIds {
                    coingecko_id: p.coingecko_id.clone(),
                    defillama_slug: p.defillama_slug.clone(),
                    holder_concentration: p.holder_concentration,
                },
            )
        })
        .collect();
    let market = &config.market;
    Arc::new(
        HttpMarketFeed::new(
            &market.coingecko_url,
            &market.defillama_url,
            &market.index_asset,
            market.request_timeout_ms,
            ids,
        )
        .with_coingecko_key(market.coingecko_api_key.clone()),
    )
}

fn build_governance_sources(config: &Config) -> Vec<Arc<dyn GovernanceSource>> {
    let g = &config.governance;
    let mut sources: Vec<Arc<dyn GovernanceSource>> = Vec::new();
    if g.snapshot_enabled {
        sources.push(Arc::new(SnapshotSource::new(&g.snapshot_url, g.request_timeout_ms)));
    }
    match &g.tally_api_key {
        Some(key) => sources.push(Arc::new(TallySource::new(&g.tally_url, key, g.request_timeout_ms))),
        None => {
            if config.protocols.iter().any(|p| p.tally_organization.is_some()) {
                warn!("Tally organizations configured but TALLY_API_KEY not set, Tally disabled");
            }
        }
    }
    sources
}

fn build_chain_clients(config: &Config) -> HashMap<NetworkId, Arc<dyn ChainClient>> {
    config
        .networks
        .iter()
        .filter(|n| n.enabled)
        .map(|n| {
            let client: Arc<dyn ChainClient> = Arc::new(JsonRpcChainClient::new(
                &n.id,
                &n.rpc_url,
                config.ingest.rpc_timeout_ms,
            ));
            (NetworkId::new(n.id.clone()), client)
        })
        .collect()
}

/// Application services wired together.
pub struct Services {
    pub store: Arc<dyn Store>,
    pub registry: Arc<ProtocolRegistry>,
    pub classifier: Arc<EventClassifier>,
    pub hub: Arc<DistributionHub>,
    pub board: Arc<LivenessBoard>,
    pub tracker: Arc<GovernanceTracker>,
    pub engine: Arc<RiskEngine>,
    pub pipeline: Arc<Pipeline>,
}

impl Services {
    /// Wire services over the given adapters.
    ///
    /// # Errors
    ///
    /// Returns an error if the risk weights are invalid.
    pub fn assemble(config: &Config, adapters: &Adapters) -> Result<Self> {
        let registry = Arc::new(ProtocolRegistry::new(
            config.protocols.iter().map(|p| p.to_protocol()),
        ));
        let classifier = Arc::new(EventClassifier::with_signatures(
            config.ingest.signature_table()?,
        ));
        let hub = Arc::new(DistributionHub::new(
            config.distribution.subscriber_buffer,
            config.distribution.recent_events,
        ));
        let board = Arc::new(LivenessBoard::new());

        let tracker = Arc::new(GovernanceTracker::new(
            adapters.governance.clone(),
            Arc::clone(&adapters.store),
            config.governance_spaces(),
            config.governance.predictor(),
        ));

        let mut engine = RiskEngine::new(
            Arc::clone(&adapters.store),
            Arc::clone(&adapters.feed),
            Arc::clone(&registry),
            Arc::clone(&hub),
            RiskEngineConfig {
                weights: config.risk.weights()?,
                scoring: config.risk.scoring(),
                predictor: config.governance.predictor(),
                sentiment: config.risk.sentiment()?,
                model_version: config.risk.model_version.clone(),
                lookback_days: config.risk.lookback_days,
                training_window: config.risk.training_window,
            },
        );
        if let Some(model) = config.risk.risk_model() {
            engine = engine.with_model(Arc::new(model));
        }
        let engine = Arc::new(engine);

        let pipeline = Arc::new(Pipeline::new(PipelineParts {
            engine: Arc::clone(&engine),
            forecasts: config.forecast.service(),
            store: Arc::clone(&adapters.store),
            feed: Arc::clone(&adapters.feed),
            registry: Arc::clone(&registry),
            hub: Arc::clone(&hub),
            board: Arc::clone(&board),
            sentiment: config.risk.sentiment()?,
            guidance: config.guidance.settings()?,
            settings: config.forecast.pipeline(),
        }));

        info!(
            networks = config.networks.len(),
            protocols = registry.len(),
            governance_sources = adapters.governance.len(),
            "Services assembled"
        );

        Ok(Self {
            store: Arc::clone(&adapters.store),
            registry,
            classifier,
            hub,
            board,
            tracker,
            engine,
            pipeline,
        })
    }
}
