//! Re-evaluation flow through assembled services.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use upwatch::adapter::outbound::memory::MemoryStore;
use upwatch::application::distribution::{UpdateData, UpdateKind};
use upwatch::domain::event::EventPayload;
use upwatch::domain::forecast::{ForecastEntity, VolatilityShift};
use upwatch::domain::id::ProposalId;
use upwatch::domain::impact::LiquidityTransition;
use upwatch::domain::series::Series;
use upwatch::infrastructure::bootstrap::{Adapters, Services};
use upwatch::port::inbound::UpgradeMonitor;
use upwatch::port::outbound::store::Store;
use upwatch::testkit::config;
use upwatch::testkit::domain::{
    liquidity, protocol, upgrade, upgrade_event, voting_proposal, zigzag_prices,
};
use upwatch::testkit::market::StaticFeed;

fn services(store: Arc<MemoryStore>, feed: Arc<StaticFeed>) -> Services {
    let adapters = Adapters {
        store,
        feed,
        governance: Vec::new(),
        chains: HashMap::new(),
    };
    Services::assemble(&config::config(), &adapters).unwrap()
}

fn feed() -> Arc<StaticFeed> {
    Arc::new(
        StaticFeed::new()
            .with_prices("aave", &zigzag_prices(90, 100.0, 0.08))
            .with_index(&zigzag_prices(90, 2_000.0, 0.04))
            .with_tvl("aave", &zigzag_prices(90, 4.0e8, 0.03))
            .with_tvl("comp", &zigzag_prices(90, 1.0e8, 0.03))
            .with_concentration("aave", 0.4),
    )
}

#[tokio::test]
async fn reevaluation_produces_forecasts_and_guidance() {
    let store = Arc::new(MemoryStore::new());
    store.insert_event(&upgrade_event("ethereum", "aave", "0x01", 0)).await.unwrap();
    let s = services(store.clone(), feed());
    let mut sub = s.hub.subscribe(None);

    let result = s.pipeline.reevaluate(&upgrade("aave:7")).await.unwrap();
    let volatility = result.volatility.expect("volatility forecast");
    let liquidity = result.liquidity.expect("liquidity forecast");
    let guidance = result.guidance.expect("guidance");
    assert!(result.guidance_changed);
    assert!(volatility.interval.contains(volatility.point));
    assert!(liquidity.current_tvl > 0.0);
    assert_eq!(guidance.upgrade, result.assessment.upgrade);
    assert!(guidance.window.closes_at > guidance.window.opens_at);

    assert_eq!(store.latest_volatility(&protocol("aave")).await.unwrap(), Some(volatility));
    assert_eq!(store.latest_guidance(&upgrade("aave:7")).await.unwrap(), Some(guidance));

    let mut kinds = Vec::new();
    while let Ok(update) = sub.updates.try_recv() {
        kinds.push(update.kind);
    }
    assert!(kinds.contains(&UpdateKind::RiskAlert));
    assert!(kinds.contains(&UpdateKind::VolatilityUpdate));
    assert!(kinds.contains(&UpdateKind::UpgradeNotification));
}

#[tokio::test]
async fn unchanged_series_reuses_forecasts() {
    let store = Arc::new(MemoryStore::new());
    let s = services(store, feed());
    let id = upgrade("aave:0xabc");

    let first = s.pipeline.reevaluate(&id).await.unwrap();
    let second = s.pipeline.reevaluate(&id).await.unwrap();
    assert_eq!(first.volatility, second.volatility);
    assert_eq!(first.liquidity, second.liquidity);
    assert!(second.assessment.computed_at > first.assessment.computed_at);
    assert!(second.guidance_changed, "a newer assessment refreshes guidance");
}

#[tokio::test]
async fn advanced_series_refreshes_forecasts() {
    let store = Arc::new(MemoryStore::new());
    let feed = feed();
    let s = services(store, Arc::clone(&feed));
    let id = upgrade("aave:0xabc");

    let first = s.pipeline.reevaluate(&id).await.unwrap().volatility.unwrap();
    feed.set_prices(
        "aave",
        Series::daily(&zigzag_prices(91, 100.0, 0.08), Utc::now() + Duration::days(1)),
    );
    let second = s.pipeline.reevaluate(&id).await.unwrap().volatility.unwrap();
    assert!(second.series_end > first.series_end);
    assert!(second.computed_at > first.computed_at);
}

#[tokio::test]
async fn unavailable_market_data_keeps_last_forecast() {
    let store = Arc::new(MemoryStore::new());
    let feed = feed();
    let s = services(store, Arc::clone(&feed));
    let id = upgrade("aave:0xabc");

    let first = s.pipeline.reevaluate(&id).await.unwrap();
    feed.set_failing(true);
    let second = s.pipeline.reevaluate(&id).await.unwrap();
    assert_eq!(first.volatility, second.volatility);
    assert!(second.assessment.partial);
}

#[tokio::test]
async fn sentiment_samples_are_scored_and_kept() {
    let store = Arc::new(MemoryStore::new());
    let s = services(store.clone(), feed());

    let sample = s
        .pipeline
        .record_sentiment(Some(protocol("aave")), "Huge upgrade, bullish and secure", 3.0)
        .await
        .unwrap();
    assert!(sample.polarity > 0.0);

    let since = Utc::now() - Duration::hours(1);
    let kept = store.sentiment_since(Some(&protocol("aave")), since).await.unwrap();
    assert_eq!(kept, vec![sample]);
    assert!(store.sentiment_since(Some(&protocol("comp")), since).await.unwrap().is_empty());
}

#[tokio::test]
async fn health_reflects_subscribers() {
    let s = services(Arc::new(MemoryStore::new()), feed());
    let _sub = s.hub.subscribe(None);
    let report = s.pipeline.health();
    assert!(report.healthy);
    assert_eq!(report.subscribers, 1);
    assert_eq!(report.assessments_in_flight, 0);
}

#[tokio::test]
async fn executed_upgrade_reports_market_impact() {
    let now = Utc::now();
    let feed = feed();
    // Calm prices and flat TVL for fifty days, then wilder prices and a
    // higher TVL plateau for the last forty.
    let mut prices = zigzag_prices(50, 100.0, 0.01);
    prices.extend(zigzag_prices(40, 100.0, 0.2));
    feed.set_prices("aave", Series::daily(&prices, now));
    let mut tvl = vec![4.0e8; 50];
    tvl.extend(vec![6.0e8; 40]);
    feed.set_tvl("aave", Series::daily(&tvl, now));

    let store = Arc::new(MemoryStore::new());
    let mut event = upgrade_event("ethereum", "aave", "0x01", 0);
    event.payload = EventPayload::UpgradeExecuted {
        proposal_id: Some(ProposalId::from("7")),
        implementation: None,
    };
    event.ingested_at = now - Duration::hours(39 * 24 + 12);
    store.insert_event(&event).await.unwrap();
    store.save_liquidity(&liquidity("comp", 1.0e8, 0.9e8)).await.unwrap();

    let s = services(store, feed);
    let mut sub = s.hub.subscribe(Some(&[UpdateKind::UpgradeNotification]));
    let result = s.pipeline.reevaluate(&upgrade("aave:7")).await.unwrap();

    let impact = result.impact.expect("impact");
    assert_eq!(impact.anchor, event.ingested_at);
    let volatility = impact.volatility.expect("volatility impact");
    assert!(volatility.post > volatility.pre);
    assert_eq!(volatility.shift, VolatilityShift::HighVolatilityRegime);
    let liquidity = impact.liquidity.expect("liquidity impact");
    assert!((liquidity.tvl_change - 0.5).abs() < 1e-9);
    assert_eq!(liquidity.transition, LiquidityTransition::StableGrowth);
    assert_eq!(impact.flows.len(), 1);
    assert_eq!(impact.flows[0].source, protocol("comp"));

    let mut published = None;
    while let Ok(update) = sub.updates.try_recv() {
        if let UpdateData::Impact(i) = update.data {
            published = Some(i);
        }
    }
    assert_eq!(published.as_ref(), Some(&impact));
    assert_eq!(s.hub.bulk_state().impacts, vec![impact]);
}

#[tokio::test]
async fn upgrade_without_events_has_no_impact() {
    let s = services(Arc::new(MemoryStore::new()), feed());
    let result = s.pipeline.reevaluate(&upgrade("aave:0xabc")).await.unwrap();
    assert!(result.impact.is_none());
    assert!(s.hub.bulk_state().impacts.is_empty());
}

#[tokio::test]
async fn strong_sentiment_is_published_as_alert() {
    let s = services(Arc::new(MemoryStore::new()), feed());
    let mut sub = s.hub.subscribe(Some(&[UpdateKind::RiskAlert]));

    s.pipeline
        .record_sentiment(Some(protocol("aave")), "the upgrade shipped today", 1.0)
        .await
        .unwrap();
    assert!(sub.updates.try_recv().is_err(), "neutral text raises no alert");

    let sample = s
        .pipeline
        .record_sentiment(Some(protocol("aave")), "excellent", 1.0)
        .await
        .unwrap();
    let update = sub.updates.try_recv().expect("sentiment alert");
    assert_eq!(update.kind, UpdateKind::RiskAlert);
    assert_eq!(update.data, UpdateData::Sentiment(sample));
}

#[tokio::test]
async fn report_scores_realized_liquidity_forecasts() {
    let now = Utc::now();
    let feed = feed();
    feed.set_tvl("aave", Series::daily(&zigzag_prices(90, 4.0e8, 0.03), now));
    let store = Arc::new(MemoryStore::new());
    store.upsert_proposal(&voting_proposal("1", "aave", 100.0)).await.unwrap();
    store.upsert_proposal(&voting_proposal("2", "comp", 100.0)).await.unwrap();
    for i in 0..12 {
        let mut forecast = liquidity("aave", 4.0e8, 4.04e8);
        forecast.series_end = Some(now - Duration::days(20 - i));
        forecast.computed_at = now - Duration::days(20 - i);
        store.save_liquidity(&forecast).await.unwrap();
    }

    let s = services(store, feed);
    let report = s.pipeline.report(&protocol("aave")).await.unwrap();
    assert_eq!(report.protocol, protocol("aave"));
    assert_eq!(report.voting.total_proposals, 1);
    assert!(report.volatility.is_none(), "no stored volatility forecasts");
    let liquidity = report.liquidity.expect("liquidity performance");
    assert_eq!(liquidity.entity, ForecastEntity::Liquidity);
    assert_eq!(liquidity.predictions, 12);
    assert_eq!(liquidity.accuracy.samples, 12);
    assert!((liquidity.mean_predicted - 1.0).abs() < 1e-9);
}
