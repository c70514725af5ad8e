use chrono::{Duration, Utc};
use tempfile::TempDir;

use super::store::SqliteStore;
use super::{create_pool, run_migrations};
use crate::domain::governance::{Platform, ProposalKey, ProposalStatus};
use crate::domain::id::ProposalId;
use crate::domain::forecast::ForecastModel;
use crate::port::outbound::store::Store;
use crate::testkit::domain::{
    assessment, liquidity, protocol, upgrade, upgrade_event, volatility, voting_proposal,
};

fn open() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let pool = create_pool(dir.path().join("store.db").to_str().unwrap()).unwrap();
    run_migrations(&pool).unwrap();
    (dir, SqliteStore::new(pool))
}

#[tokio::test]
async fn event_insert_is_idempotent() {
    let (_dir, store) = open();
    let event = upgrade_event("ethereum", "aave", "0xABC", 3);
    assert!(store.insert_event(&event).await.unwrap());
    assert!(!store.insert_event(&event).await.unwrap());

    let other = upgrade_event("arbitrum", "aave", "0xABC", 3);
    assert!(store.insert_event(&other).await.unwrap());

    let linked = store.events_for_upgrade(&event.upgrade).await.unwrap();
    assert_eq!(linked.len(), 2);
    assert_eq!(linked[0].payload, event.payload);
}

#[tokio::test]
async fn current_assessment_is_last_writer_by_timestamp() {
    let (_dir, store) = open();
    let now = Utc::now();
    store.save_assessment(&assessment("aave:7", 60.0, now)).await.unwrap();
    store
        .save_assessment(&assessment("aave:7", 20.0, now - Duration::seconds(5)))
        .await
        .unwrap();

    let current = store.current_assessment(&upgrade("aave:7")).await.unwrap().unwrap();
    assert_eq!(current.composite, 60.0);

    let history = store.assessment_history(&upgrade("aave:7")).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].computed_at < history[1].computed_at);
}

#[tokio::test]
async fn proposal_round_trips_with_status() {
    let (_dir, store) = open();
    let mut p = voting_proposal("1", "aave", 100.0);
    store.upsert_proposal(&p).await.unwrap();
    p.transition(ProposalStatus::Approved).unwrap();
    store.upsert_proposal(&p).await.unwrap();

    let key = ProposalKey {
        platform: Platform::Snapshot,
        id: ProposalId::from("1"),
    };
    let stored = store.proposal(&key).await.unwrap().unwrap();
    assert_eq!(stored.status(), ProposalStatus::Approved);
    assert_eq!(store.proposals().await.unwrap().len(), 1);
}

#[tokio::test]
async fn stale_forecast_does_not_overwrite_newer() {
    let (_dir, store) = open();
    let mut newer = volatility("aave", 0.8, ForecastModel::Garch);
    let mut older = volatility("aave", 0.3, ForecastModel::Fallback);
    older.computed_at = newer.computed_at - Duration::minutes(1);
    newer.computed_at += Duration::seconds(1);

    store.save_volatility(&newer).await.unwrap();
    store.save_volatility(&older).await.unwrap();
    let latest = store.latest_volatility(&protocol("aave")).await.unwrap().unwrap();
    assert_eq!(latest.model, ForecastModel::Garch);

    store.save_liquidity(&liquidity("aave", 100.0, 90.0)).await.unwrap();
    assert!(store.latest_liquidity(&protocol("aave")).await.unwrap().is_some());
    assert!(store.latest_liquidity(&protocol("comp")).await.unwrap().is_none());
}

#[tokio::test]
async fn sentiment_since_filters_by_protocol_and_time() {
    let (_dir, store) = open();
    let analyzer = crate::application::sentiment::SentimentAnalyzer::default();
    let now = Utc::now();
    for (text, proto, age) in [
        ("great upgrade", Some(protocol("aave")), 1),
        ("terrible exploit", Some(protocol("comp")), 1),
        ("ancient news", Some(protocol("aave")), 30),
    ] {
        let sample = analyzer.score(text, proto, 1.0, now - Duration::days(age));
        store.append_sentiment(&sample).await.unwrap();
    }

    let since = now - Duration::days(7);
    let aave = store.sentiment_since(Some(&protocol("aave")), since).await.unwrap();
    assert_eq!(aave.len(), 1);
    let all = store.sentiment_since(None, since).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn forecast_history_keeps_every_save_in_time_order() {
    let (_dir, store) = open();
    let newer = volatility("aave", 0.8, ForecastModel::Garch);
    let mut older = volatility("aave", 0.3, ForecastModel::Fallback);
    older.computed_at = newer.computed_at - Duration::minutes(1);

    store.save_volatility(&newer).await.unwrap();
    store.save_volatility(&older).await.unwrap();
    store.save_volatility(&volatility("comp", 0.5, ForecastModel::Egarch)).await.unwrap();

    let history = store.volatility_history(&protocol("aave")).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].model, ForecastModel::Fallback);
    assert_eq!(history[1].model, ForecastModel::Garch);

    store.save_liquidity(&liquidity("aave", 100.0, 90.0)).await.unwrap();
    assert_eq!(store.liquidity_history(&protocol("aave")).await.unwrap().len(), 1);
    assert!(store.liquidity_history(&protocol("comp")).await.unwrap().is_empty());
}

#[tokio::test]
async fn recent_assessments_span_upgrades_oldest_first() {
    let (_dir, store) = open();
    let now = Utc::now();
    for (i, id) in ["aave:1", "comp:2", "aave:1", "uni:3"].into_iter().enumerate() {
        let at = now + Duration::seconds(i64::try_from(i).unwrap());
        store.save_assessment(&assessment(id, 10.0 * (i + 1) as f64, at)).await.unwrap();
    }

    let recent = store.recent_assessments(3).await.unwrap();
    let composites: Vec<f64> = recent.iter().map(|a| a.composite).collect();
    assert_eq!(composites, vec![20.0, 30.0, 40.0]);
    assert_eq!(store.recent_assessments(10).await.unwrap().len(), 4);
}
