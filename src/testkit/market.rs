//! Fixed-series [`MarketDataFeed`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::domain::id::ProtocolId;
use crate::domain::series::Series;
use crate::error::SourceError;
use crate::port::outbound::market::MarketDataFeed;

/// Market data from in-memory series. Protocols without a series fail the
/// way an unreachable upstream would.
#[derive(Default)]
pub struct StaticFeed {
    prices: RwLock<HashMap<ProtocolId, Series>>,
    tvl: RwLock<HashMap<ProtocolId, Series>>,
    index: RwLock<Option<Series>>,
    concentration: RwLock<HashMap<ProtocolId, f64>>,
    failing: AtomicBool,
    latency: RwLock<Option<Duration>>,
}

impl StaticFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Daily prices ending now.
    pub fn with_prices(self, protocol: &str, values: &[f64]) -> Self {
        self.set_prices(protocol, Series::daily(values, Utc::now()));
        self
    }

    pub fn with_tvl(self, protocol: &str, values: &[f64]) -> Self {
        self.set_tvl(protocol, Series::daily(values, Utc::now()));
        self
    }

    pub fn with_index(self, values: &[f64]) -> Self {
        *self.index.write() = Some(Series::daily(values, Utc::now()));
        self
    }

    pub fn with_concentration(self, protocol: &str, share: f64) -> Self {
        self.concentration.write().insert(ProtocolId::from(protocol), share);
        self
    }

    /// Delay every price request, so concurrent callers overlap.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.write() = Some(latency);
        self
    }

    pub fn set_prices(&self, protocol: &str, series: Series) {
        self.prices.write().insert(ProtocolId::from(protocol), series);
    }

    pub fn set_tvl(&self, protocol: &str, series: Series) {
        self.tvl.write().insert(ProtocolId::from(protocol), series);
    }

    /// Make every call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::transient("static", "feed offline"));
        }
        Ok(())
    }
}

fn tail(series: &Series, days: u32) -> Series {
    Series::new(series.tail(days as usize).to_vec())
}

#[async_trait]
impl MarketDataFeed for StaticFeed {
    async fn price_series(&self, protocol: &ProtocolId, days: u32) -> Result<Series, SourceError> {
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.check()?;
        self.prices
            .read()
            .get(protocol)
            .map(|s| tail(s, days))
            .ok_or_else(|| SourceError::transient("static", format!("no prices for {protocol}")))
    }

    async fn tvl_series(&self, protocol: &ProtocolId, days: u32) -> Result<Series, SourceError> {
        self.check()?;
        self.tvl
            .read()
            .get(protocol)
            .map(|s| tail(s, days))
            .ok_or_else(|| SourceError::transient("static", format!("no tvl for {protocol}")))
    }

    async fn market_index_series(&self, days: u32) -> Result<Series, SourceError> {
        self.check()?;
        self.index
            .read()
            .as_ref()
            .map(|s| tail(s, days))
            .ok_or_else(|| SourceError::transient("static", "no index series"))
    }

    async fn holder_concentration(
        &self,
        protocol: &ProtocolId,
    ) -> Result<Option<f64>, SourceError> {
        self.check()?;
        Ok(self.concentration.read().get(protocol).copied())
    }
}
