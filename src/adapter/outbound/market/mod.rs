//! HTTP market data feed: CoinGecko prices, DeFiLlama TVL.

mod feed;

pub use feed::{HttpMarketFeed, MarketIds};
