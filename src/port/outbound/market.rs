//! Market data port: price, TVL and holder distribution.

use async_trait::async_trait;

use crate::domain::id::ProtocolId;
use crate::domain::series::Series;
use crate::error::SourceError;

/// Supplier of market series. Any call may fail or return stale data.
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    /// Daily prices of the protocol's token.
    async fn price_series(&self, protocol: &ProtocolId, days: u32) -> Result<Series, SourceError>;

    /// Daily total value locked.
    async fn tvl_series(&self, protocol: &ProtocolId, days: u32) -> Result<Series, SourceError>;

    /// Daily prices of the broad market reference asset.
    async fn market_index_series(&self, days: u32) -> Result<Series, SourceError>;

    /// Share of TVL held by the top holders, in [0, 1]. `None` when unknown.
    async fn holder_concentration(&self, protocol: &ProtocolId)
        -> Result<Option<f64>, SourceError>;
}
