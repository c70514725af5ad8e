//! Connector behaviour against a scripted chain: idempotent ingestion,
//! triggers, liveness isolation between networks.

use std::sync::Arc;

use upwatch::adapter::outbound::memory::MemoryStore;
use upwatch::application::distribution::{DistributionHub, UpdateKind};
use upwatch::application::ingest::{
    trigger_queue, EventClassifier, IngestContext, LivenessBoard, NetworkConnector,
    ProtocolRegistry, TriggerReceiver,
};
use upwatch::domain::event::EventKind;
use upwatch::domain::id::{NetworkId, UpgradeId};
use upwatch::domain::network::Liveness;
use upwatch::port::outbound::chain::RawLog;
use upwatch::port::outbound::store::Store;
use upwatch::testkit::chain::{
    proposal_created_log, proposal_created_topic, upgraded_log, ScriptedChainClient,
};
use upwatch::testkit::config::{self, AAVE_ADDRESS, COMP_ADDRESS};

struct Harness {
    store: Arc<MemoryStore>,
    hub: Arc<DistributionHub>,
    board: Arc<LivenessBoard>,
    ctx: IngestContext,
    triggers: TriggerReceiver,
}

fn harness() -> Harness {
    let cfg = config::config();
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(DistributionHub::new(64, 16));
    let board = Arc::new(LivenessBoard::new());
    let (tx, rx) = trigger_queue(64);
    let ctx = IngestContext {
        registry: Arc::new(ProtocolRegistry::new(cfg.protocols.iter().map(|p| p.to_protocol()))),
        classifier: Arc::new(EventClassifier::default()),
        store: store.clone(),
        hub: Arc::clone(&hub),
        triggers: tx,
        board: Arc::clone(&board),
    };
    Harness {
        store,
        hub,
        board,
        ctx,
        triggers: rx,
    }
}

fn connector(h: &Harness, network: &str, client: Arc<ScriptedChainClient>) -> NetworkConnector {
    NetworkConnector::new(NetworkId::from(network), client, h.ctx.clone(), config::connector())
}

#[tokio::test]
async fn logs_are_ingested_once_and_trigger_reevaluation() {
    let mut h = harness();
    let chain = Arc::new(ScriptedChainClient::new(10));
    chain.push_log(proposal_created_log(AAVE_ADDRESS, 3, "0xAA01", 0, 42));
    chain.push_log(upgraded_log(AAVE_ADDRESS, 5, "0xaa02", 1, "0xbeef"));
    chain.push_log(upgraded_log("0x0000000000000000000000000000000000000fff", 6, "0xaa03", 0, "0x1"));

    let mut first = connector(&h, "ethereum", Arc::clone(&chain));
    let report = first.poll_once().await.unwrap();
    assert_eq!(report.logs, 2, "unwatched address is filtered by the node query");
    assert_eq!(report.inserted, 2);
    assert!(report.caught_up);
    assert_eq!(first.cursor(), Some(10));
    assert_eq!(h.store.event_count(), 2);

    // A second connector replaying the same range stores nothing new.
    let mut replay = connector(&h, "ethereum", Arc::clone(&chain));
    let report = replay.poll_once().await.unwrap();
    assert_eq!(report.inserted, 0);
    assert_eq!(report.duplicates, 2);
    assert_eq!(h.store.event_count(), 2);

    let proposal_upgrade = UpgradeId::from("aave:42");
    let events = h.store.events_for_upgrade(&proposal_upgrade).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), EventKind::UpgradeProposed);

    let tx_upgrade = UpgradeId::from("aave:0xaa02");
    assert_eq!(h.store.events_for_upgrade(&tx_upgrade).await.unwrap().len(), 1);

    assert_eq!(h.triggers.recv().await, Some(proposal_upgrade));
    assert_eq!(h.triggers.recv().await, Some(tx_upgrade));
    assert_eq!(h.hub.bulk_state().recent_events.len(), 2);
}

#[tokio::test]
async fn malformed_log_is_recorded_as_other() {
    let h = harness();
    let chain = Arc::new(ScriptedChainClient::new(4));
    chain.push_log(RawLog {
        address: AAVE_ADDRESS.into(),
        topics: vec![proposal_created_topic()],
        data: "0x12".into(),
        block_number: 2,
        tx_hash: "0xbad".into(),
        log_index: 0,
    });
    let mut c = connector(&h, "ethereum", chain);
    c.poll_once().await.unwrap();

    let events = h
        .store
        .events_for_upgrade(&UpgradeId::from("aave:0xbad"))
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), EventKind::Other);
}

#[tokio::test]
async fn failing_network_goes_stale_while_others_stay_live() {
    let h = harness();
    let mut sub = h.hub.subscribe(Some(&[UpdateKind::SystemStatus]));

    let broken = Arc::new(ScriptedChainClient::new(10));
    broken.set_failing(true);
    let healthy = Arc::new(ScriptedChainClient::new(10));

    let mut eth = connector(&h, "ethereum", Arc::clone(&broken));
    let mut arb = connector(&h, "arbitrum", Arc::clone(&healthy));

    for _ in 0..4 {
        assert!(eth.poll_once().await.is_err());
        arb.poll_once().await.unwrap();
    }
    assert_eq!(eth.liveness(), Liveness::Live);

    assert!(eth.poll_once().await.is_err());
    assert_eq!(eth.liveness(), Liveness::Stale);
    assert_eq!(eth.consecutive_failures(), 5);
    assert_eq!(eth.cursor(), Some(0), "cursor never moves on failure");

    arb.poll_once().await.unwrap();
    assert_eq!(arb.liveness(), Liveness::Live);
    assert_eq!(h.board.liveness(&NetworkId::from("ethereum")), Some(Liveness::Stale));
    assert_eq!(h.board.liveness(&NetworkId::from("arbitrum")), Some(Liveness::Live));

    let update = sub.updates.recv().await.unwrap();
    assert_eq!(update.kind, UpdateKind::SystemStatus);

    for _ in 5..15 {
        let _ = eth.poll_once().await;
    }
    assert_eq!(eth.liveness(), Liveness::Down);

    broken.set_failing(false);
    eth.poll_once().await.unwrap();
    assert_eq!(eth.liveness(), Liveness::Live);
    assert_eq!(eth.consecutive_failures(), 0);
}

#[tokio::test]
async fn cursor_respects_batch_size_and_confirmations() {
    let h = harness();
    let chain = Arc::new(ScriptedChainClient::new(250));
    chain.push_log(upgraded_log(COMP_ADDRESS, 150, "0xc1", 0, "0x2"));
    let mut settings = config::connector();
    settings.confirmations = 10;
    let mut c = NetworkConnector::new(NetworkId::from("arbitrum"), chain, h.ctx.clone(), settings);

    let first = c.poll_once().await.unwrap();
    assert_eq!((first.from_block, first.to_block), (1, 100));
    assert!(!first.caught_up);
    let second = c.poll_once().await.unwrap();
    assert_eq!((second.from_block, second.to_block), (101, 200));
    assert_eq!(second.inserted, 1);
    let third = c.poll_once().await.unwrap();
    assert_eq!((third.from_block, third.to_block), (201, 240));
    assert!(third.caught_up);
}
