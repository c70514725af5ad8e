//! The whole service over scripted upstreams: chain logs and governance
//! polls flow through to stored assessments, and shutdown drains cleanly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use upwatch::adapter::outbound::memory::MemoryStore;
use upwatch::domain::governance::Platform;
use upwatch::domain::id::{NetworkId, UpgradeId};
use upwatch::infrastructure::bootstrap::Adapters;
use upwatch::infrastructure::runtime::run_with_adapters;
use upwatch::port::outbound::chain::ChainClient;
use upwatch::port::outbound::store::Store;
use upwatch::testkit::chain::{upgraded_log, ScriptedChainClient};
use upwatch::testkit::config::{self, AAVE_ADDRESS};
use upwatch::testkit::domain::{upgrade, zigzag_prices};
use upwatch::testkit::governance::{raw_snapshot, ScriptedGovernanceSource};
use upwatch::testkit::market::StaticFeed;

async fn wait_for_assessment(store: &MemoryStore, id: &UpgradeId) -> bool {
    for _ in 0..200 {
        if matches!(store.current_assessment(id).await, Ok(Some(_))) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn events_and_proposals_reach_assessments() {
    let mut cfg = config::config();
    for network in &mut cfg.networks {
        network.start_block = Some(1);
    }

    let store = Arc::new(MemoryStore::new());
    let ethereum = Arc::new(ScriptedChainClient::new(20));
    ethereum.push_log(upgraded_log(AAVE_ADDRESS, 12, "0xe1", 0, "0x1234"));
    let arbitrum = Arc::new(ScriptedChainClient::new(20));
    arbitrum.set_failing(true);

    let snapshot = Arc::new(ScriptedGovernanceSource::new(Platform::Snapshot));
    snapshot.set_proposals(vec![raw_snapshot("0x9", "aave.eth", "active", 40.0, 10.0, Utc::now())]);

    let mut chains: HashMap<NetworkId, Arc<dyn ChainClient>> = HashMap::new();
    chains.insert(NetworkId::from("ethereum"), ethereum.clone());
    chains.insert(NetworkId::from("arbitrum"), arbitrum.clone());
    let adapters = Adapters {
        store: store.clone(),
        feed: Arc::new(StaticFeed::new().with_prices("aave", &zigzag_prices(40, 100.0, 0.05))),
        governance: vec![snapshot],
        chains,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let service = tokio::spawn(async move { run_with_adapters(&cfg, adapters, shutdown_rx).await });

    assert!(wait_for_assessment(&store, &upgrade("aave:0xe1")).await, "chain event assessed");
    assert!(wait_for_assessment(&store, &upgrade("aave:0x9")).await, "proposal assessed");
    assert!(arbitrum.calls() > 0, "failing network keeps being retried");

    shutdown_tx.send(true).unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), service)
        .await
        .expect("service stops promptly")
        .unwrap();
    assert!(outcome.is_ok());

    let calls = ethereum.calls();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ethereum.calls(), calls, "no polling after shutdown");
}

#[tokio::test]
async fn dropping_the_shutdown_sender_stops_the_service() {
    let adapters = Adapters {
        store: Arc::new(MemoryStore::new()),
        feed: Arc::new(StaticFeed::new()),
        governance: Vec::new(),
        chains: HashMap::new(),
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cfg = config::config();
    let service = tokio::spawn(async move { run_with_adapters(&cfg, adapters, shutdown_rx).await });
    drop(shutdown_tx);
    let outcome = tokio::time::timeout(Duration::from_secs(5), service).await.unwrap().unwrap();
    assert!(outcome.is_ok());
}
