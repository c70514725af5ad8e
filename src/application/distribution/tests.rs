use chrono::{Duration, Utc};

use super::*;
use crate::domain::forecast::ForecastModel;
use crate::domain::id::NetworkId;
use crate::domain::network::Liveness;
use crate::testkit::domain::{assessment, impact, volatility};

fn status(network: &str, liveness: Liveness) -> NetworkStatus {
    NetworkStatus {
        network: NetworkId::from(network),
        liveness,
        consecutive_failures: 0,
        last_block: None,
        last_error: None,
        at: Utc::now(),
    }
}

#[tokio::test]
async fn broadcast_reaches_every_subscriber() {
    let hub = DistributionHub::new(8, 10);
    let mut a = hub.subscribe(None);
    let mut b = hub.subscribe(None);

    let delivered = hub.publish(Update::assessment(assessment("aave:1", 55.0, Utc::now())));
    assert_eq!(delivered, 2);
    assert_eq!(a.updates.recv().await.unwrap().kind, UpdateKind::RiskAlert);
    assert_eq!(b.updates.recv().await.unwrap().kind, UpdateKind::RiskAlert);
}

#[tokio::test]
async fn filtered_subscriber_only_sees_its_kinds() {
    let hub = DistributionHub::new(8, 10);
    let mut status_only = hub.subscribe(Some(&[UpdateKind::SystemStatus]));

    hub.publish(Update::assessment(assessment("aave:1", 55.0, Utc::now())));
    hub.publish(Update::status(status("ethereum", Liveness::Stale)));

    let update = status_only.updates.recv().await.unwrap();
    assert_eq!(update.kind, UpdateKind::SystemStatus);
    assert!(status_only.updates.try_recv().is_err());
}

#[test]
fn slow_subscriber_is_dropped_without_blocking_others() {
    let hub = DistributionHub::new(1, 10);
    let _slow = hub.subscribe(None);
    let mut fast = hub.subscribe(None);

    assert_eq!(hub.publish(Update::status(status("ethereum", Liveness::Live))), 2);
    fast.updates.try_recv().unwrap();

    // The slow subscriber's single slot is still full.
    assert_eq!(hub.publish(Update::status(status("ethereum", Liveness::Stale))), 1);
    assert_eq!(hub.subscriber_count(), 1);
    assert_eq!(fast.updates.try_recv().unwrap().kind, UpdateKind::SystemStatus);
}

#[test]
fn dropped_receiver_is_pruned() {
    let hub = DistributionHub::new(4, 10);
    let gone = hub.subscribe(None);
    drop(gone);
    assert_eq!(hub.publish(Update::status(status("ethereum", Liveness::Live))), 0);
    assert_eq!(hub.subscriber_count(), 0);
}

#[test]
fn bulk_state_keeps_latest_per_entity() {
    let hub = DistributionHub::new(4, 2);
    let now = Utc::now();
    hub.publish(Update::assessment(assessment("aave:1", 80.0, now)));
    // An older assessment arriving late does not replace the newer one.
    hub.publish(Update::assessment(assessment("aave:1", 20.0, now - Duration::minutes(5))));
    hub.publish(Update::volatility(volatility("aave", 0.6, ForecastModel::Garch)));
    hub.publish(Update::status(status("ethereum", Liveness::Live)));
    hub.publish(Update::status(status("ethereum", Liveness::Down)));

    let state = hub.bulk_state();
    assert_eq!(state.assessments.len(), 1);
    assert!((state.assessments[0].composite - 80.0).abs() < 1e-9);
    assert_eq!(state.volatility.len(), 1);
    assert_eq!(state.networks.len(), 1);
    assert_eq!(state.networks[0].liveness, Liveness::Down);
    assert!(state.timestamp.is_some());
}

#[tokio::test]
async fn close_releases_subscribers() {
    let hub = DistributionHub::new(4, 10);
    let mut sub = hub.subscribe(None);
    hub.publish(Update::status(status("ethereum", Liveness::Live)));
    hub.close();

    assert!(sub.updates.recv().await.is_some());
    assert!(sub.updates.recv().await.is_none());
    assert_eq!(hub.publish(Update::status(status("ethereum", Liveness::Live))), 0);
    assert!(hub.subscribe(None).updates.recv().await.is_none());
}

#[tokio::test]
async fn impacts_are_cached_and_sentiment_alerts_are_not() {
    let hub = DistributionHub::new(8, 10);
    let mut alerts = hub.subscribe(Some(&[UpdateKind::RiskAlert]));
    let now = Utc::now();

    hub.publish(Update::impact(impact("aave:1", now)));
    hub.publish(Update::impact(impact("aave:1", now - Duration::hours(1))));
    let sample = crate::application::sentiment::SentimentAnalyzer::default().score(
        "terrible exploit, funds drained",
        Some(ProtocolId::from("aave")),
        1.0,
        now,
    );
    hub.publish(Update::sentiment_alert(sample.clone()));

    let state = hub.bulk_state();
    assert_eq!(state.impacts.len(), 1);
    assert_eq!(state.impacts[0].computed_at, now);

    let update = alerts.updates.recv().await.unwrap();
    assert_eq!(update.data, UpdateData::Sentiment(sample));
    assert_eq!(update.timestamp, now);
}
