//! Service lifecycle: start connectors, governance polling and the
//! pipeline, then drain them on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::bootstrap::{Adapters, Services};
use crate::application::governance::GovernanceTracker;
use crate::application::ingest::{trigger_queue, IngestContext, NetworkConnector, TriggerSender};
use crate::application::risk::RiskEngine;
use crate::domain::id::NetworkId;
use crate::error::{Error, Result};
use crate::infrastructure::config::settings::Config;

/// Build real adapters from `config` and run until `shutdown` flips.
///
/// # Errors
///
/// Returns an error if adapters or services cannot be built.
pub async fn run_with_shutdown(config: Config, shutdown: watch::Receiver<bool>) -> Result<()> {
    let adapters = Adapters::from_config(&config)?;
    run_with_adapters(&config, adapters, shutdown).await
}

/// Run the service over the given adapters until `shutdown` flips or its
/// sender is dropped.
///
/// # Errors
///
/// Returns an error if services cannot be assembled.
pub async fn run_with_adapters(
    config: &Config,
    adapters: Adapters,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let services = Services::assemble(config, &adapters)?;
    let (triggers, trigger_rx) = trigger_queue(config.ingest.trigger_capacity);
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();

    let ctx = IngestContext {
        registry: Arc::clone(&services.registry),
        classifier: Arc::clone(&services.classifier),
        store: Arc::clone(&services.store),
        hub: Arc::clone(&services.hub),
        triggers: triggers.clone(),
        board: Arc::clone(&services.board),
    };
    for network in config.networks.iter().filter(|n| n.enabled) {
        let id = NetworkId::new(network.id.clone());
        let Some(client) = adapters.chains.get(&id) else {
            warn!(network = %id, "No chain client for network, skipping");
            continue;
        };
        let connector = NetworkConnector::new(
            id,
            Arc::clone(client),
            ctx.clone(),
            config.ingest.connector_settings(network),
        );
        tasks.spawn(connector.run(stop_rx.clone()));
    }

    if adapters.governance.is_empty() {
        info!("No governance sources configured");
    } else {
        tasks.spawn(poll_governance(
            Arc::clone(&services.tracker),
            triggers.clone(),
            Duration::from_secs(config.governance.poll_interval_secs.max(1)),
            stop_rx.clone(),
        ));
    }
    if config.risk.learned_model {
        tasks.spawn(retrain_risk_model(
            Arc::clone(&services.engine),
            Duration::from_secs(config.risk.retrain_interval_secs.max(1)),
            stop_rx.clone(),
        ));
    }
    drop(ctx);
    drop(triggers);

    tasks.spawn(Arc::clone(&services.pipeline).run(trigger_rx, stop_rx));
    info!(tasks = tasks.len(), "upwatch running");

    loop {
        match shutdown.changed().await {
            Ok(()) if *shutdown.borrow() => {
                info!("Shutdown signal received");
                break;
            }
            Ok(()) => {}
            Err(_) => {
                info!("Shutdown channel closed");
                break;
            }
        }
    }

    let _ = stop_tx.send(true);
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Task ended abnormally");
        }
    }
    services.hub.close();
    info!("upwatch stopped");
    Ok(())
}

/// Poll governance platforms on an interval and queue re-evaluation of every
/// upgrade whose proposal changed.
async fn poll_governance(
    tracker: Arc<GovernanceTracker>,
    triggers: TriggerSender,
    every: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = interval.tick() => {}
        }
        let changed = match tracker.poll().await {
            Ok(changed) => changed,
            Err(e) => {
                warn!(error = %e, "Governance poll could not be stored");
                continue;
            }
        };
        debug!(changed = changed.len(), "Governance poll complete");
        for upgrade in changed {
            match triggers.push(upgrade) {
                Ok(_) => {}
                Err(Error::Shutdown) => return,
                Err(e) => warn!(error = %e, "Failed to queue re-evaluation"),
            }
        }
    }
}

/// Refit the overall-score model at startup and then on an interval.
async fn retrain_risk_model(engine: Arc<RiskEngine>, every: Duration, mut stop: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = interval.tick() => {}
        }
        if let Err(e) = engine.retrain().await {
            warn!(error = %e, "Assessment history unavailable for retraining");
        }
    }
}
