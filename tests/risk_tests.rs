//! Risk engine behaviour over in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use upwatch::adapter::outbound::memory::MemoryStore;
use upwatch::application::distribution::{DistributionHub, UpdateKind};
use upwatch::application::ingest::ProtocolRegistry;
use upwatch::application::risk::{RidgeRegression, RiskEngine, RiskEngineConfig};
use upwatch::domain::risk::{RiskComponent, RiskWeights};
use upwatch::error::PersistenceError;
use upwatch::port::outbound::market::MarketDataFeed;
use upwatch::port::outbound::store::Store;
use upwatch::testkit::config;
use upwatch::testkit::domain::{
    assessment, scores, tally, upgrade, upgrade_event, voting_proposal, zigzag_prices,
};
use upwatch::testkit::market::StaticFeed;
use upwatch::testkit::store::FailingStore;

fn registry() -> Arc<ProtocolRegistry> {
    let cfg = config::config();
    Arc::new(ProtocolRegistry::new(cfg.protocols.iter().map(|p| p.to_protocol())))
}

fn engine(store: Arc<dyn Store>, feed: Arc<dyn MarketDataFeed>) -> (Arc<RiskEngine>, Arc<DistributionHub>) {
    let hub = Arc::new(DistributionHub::new(32, 8));
    let engine = RiskEngine::new(
        store,
        feed,
        registry(),
        Arc::clone(&hub),
        RiskEngineConfig::default(),
    );
    (Arc::new(engine), hub)
}

fn full_feed() -> StaticFeed {
    StaticFeed::new()
        .with_prices("aave", &zigzag_prices(30, 100.0, 0.1))
        .with_index(&zigzag_prices(30, 2_000.0, 0.05))
        .with_tvl("aave", &zigzag_prices(30, 5.0e8, 0.02))
        .with_concentration("aave", 0.35)
}

#[tokio::test]
async fn concurrent_requests_share_one_assessment() {
    let store = Arc::new(MemoryStore::new());
    store.insert_event(&upgrade_event("ethereum", "aave", "0x01", 0)).await.unwrap();
    let feed = Arc::new(full_feed().with_latency(Duration::from_millis(50)));
    let (engine, _hub) = engine(store.clone(), feed);
    let id = upgrade("aave:7");

    let (a, b, c) = tokio::join!(engine.assess(&id), engine.assess(&id), engine.assess(&id));
    let a = a.unwrap();
    assert_eq!(a, b.unwrap());
    assert_eq!(a, c.unwrap());
    assert_eq!(engine.in_flight(), 0);
    assert_eq!(engine.history(&id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn complete_inputs_give_a_complete_assessment() {
    let store = Arc::new(MemoryStore::new());
    store.insert_event(&upgrade_event("ethereum", "aave", "0x01", 0)).await.unwrap();
    let mut proposal = voting_proposal("7", "aave", 1_000.0);
    proposal.record_tally(tally(Utc::now(), 900.0, 100.0));
    store.upsert_proposal(&proposal).await.unwrap();

    let (engine, hub) = engine(store.clone(), Arc::new(full_feed()));
    let mut sub = hub.subscribe(Some(&[UpdateKind::RiskAlert]));

    let assessment = engine.assess(&upgrade("aave:7")).await.unwrap();
    assert!(!assessment.partial, "missing: {:?}", assessment.missing_inputs);
    assert_eq!(assessment.protocol.as_str(), "aave");
    assert!((0.0..=100.0).contains(&assessment.composite));
    assert!(!assessment.factors.is_empty());
    assert!(!assessment.recommendation.is_empty());

    let update = sub.updates.recv().await.unwrap();
    assert_eq!(update.kind, UpdateKind::RiskAlert);
    assert_eq!(
        engine.current(&upgrade("aave:7")).await.unwrap(),
        Some(assessment)
    );
}

#[tokio::test]
async fn unavailable_sources_degrade_to_neutral_scores() {
    let store = Arc::new(MemoryStore::new());
    store.insert_event(&upgrade_event("ethereum", "aave", "0x01", 0)).await.unwrap();
    let feed = StaticFeed::new();
    feed.set_failing(true);
    let (engine, _hub) = engine(store, Arc::new(feed));

    let assessment = engine.assess(&upgrade("aave:7")).await.unwrap();
    assert!(assessment.partial);
    for component in [RiskComponent::Governance, RiskComponent::Market, RiskComponent::Liquidity] {
        assert!(assessment.missing_inputs.contains(&component));
        assert_eq!(assessment.components.get(component), 50.0);
    }
    assert!(!assessment.missing_inputs.contains(&RiskComponent::Technical));
}

#[tokio::test]
async fn failed_write_returns_the_assessment_for_retry() {
    let store = Arc::new(FailingStore::failing());
    let (engine, _hub) = engine(store.clone(), Arc::new(full_feed()));
    let id = upgrade("aave:7");

    let err = engine.assess(&id).await.unwrap_err();
    let PersistenceError::Assessment { assessment, reason } = err else {
        panic!("expected an assessment-carrying error, got {err:?}");
    };
    assert!(reason.contains("disk full"));
    assert_eq!(assessment.upgrade, id);
    assert!(engine.current(&id).await.unwrap().is_none());

    store.set_failing(false);
    let saved = engine.persist(*assessment.clone()).await.unwrap();
    assert_eq!(saved, *assessment);
    assert_eq!(engine.history(&id).await.unwrap(), vec![saved]);
}

#[tokio::test]
async fn history_timestamps_strictly_increase() {
    let store = Arc::new(MemoryStore::new());
    let (engine, _hub) = engine(store, Arc::new(full_feed()));
    let id = upgrade("aave:0xfeed");

    for _ in 0..5 {
        engine.assess(&id).await.unwrap();
    }
    let history = engine.history(&id).await.unwrap();
    assert_eq!(history.len(), 5);
    assert!(history.windows(2).all(|w| w[0].computed_at < w[1].computed_at));
    assert_eq!(
        engine.current(&id).await.unwrap().map(|a| a.computed_at),
        history.last().map(|a| a.computed_at)
    );
}

#[tokio::test]
async fn learned_model_replaces_weighted_sum_once_fitted() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    for i in 0..60i64 {
        let f = i as f64;
        let mut past = assessment(&format!("comp:{i}"), 0.0, now - chrono::Duration::hours(100 - i));
        past.components = scores(
            (f * 37.0) % 100.0,
            (f * 53.0 + 11.0) % 100.0,
            (f * 71.0 + 29.0) % 100.0,
            (f * 13.0 + 47.0) % 100.0,
        );
        // Overall risk followed the technical component alone.
        past.composite = past.components.technical;
        store.save_assessment(&past).await.unwrap();
    }
    store.insert_event(&upgrade_event("ethereum", "aave", "0x01", 0)).await.unwrap();

    let hub = Arc::new(DistributionHub::new(32, 8));
    let engine = RiskEngine::new(
        store.clone(),
        Arc::new(full_feed()),
        registry(),
        hub,
        RiskEngineConfig::default(),
    )
    .with_model(Arc::new(RidgeRegression::default()));

    let before = engine.assess(&upgrade("aave:7")).await.unwrap();
    assert!(!engine.learned());
    assert!(before.partial);
    let weighted = RiskWeights::default().composite(&before.components);
    assert!((before.composite - weighted).abs() < 1e-9);

    // The partial assessment just stored is left out of training.
    assert_eq!(engine.retrain().await.unwrap(), Some(60));
    assert!(engine.learned());

    let after = engine.assess(&upgrade("aave:7")).await.unwrap();
    assert!(after.model_version.ends_with("+ridge"), "{}", after.model_version);
    assert!((after.composite - after.components.technical).abs() < 5.0);
}

#[tokio::test]
async fn retrain_without_model_or_history_keeps_weighted_sum() {
    let store = Arc::new(MemoryStore::new());
    let (plain, _hub) = engine(store.clone(), Arc::new(full_feed()));
    assert_eq!(plain.retrain().await.unwrap(), None);

    let hub = Arc::new(DistributionHub::new(32, 8));
    let learned = RiskEngine::new(store, Arc::new(full_feed()), registry(), hub, RiskEngineConfig::default())
        .with_model(Arc::new(RidgeRegression::default()));
    assert_eq!(learned.retrain().await.unwrap(), None);
    assert!(!learned.learned());
}
