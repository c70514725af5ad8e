use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::adapter::outbound::http;
use crate::domain::id::ProtocolId;
use crate::domain::series::{Observation, Series};
use crate::error::SourceError;
use crate::port::outbound::market::MarketDataFeed;

const COINGECKO: &str = "coingecko";
const DEFILLAMA: &str = "defillama";

/// Responses are reused for this long; upstream data is daily.
const CACHE_TTL: Duration = Duration::from_secs(60);

/// Upstream identifiers for one protocol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketIds {
    pub coingecko_id: Option<String>,
    pub defillama_slug: Option<String>,
    pub holder_concentration: Option<f64>,
}

/// [`MarketDataFeed`] backed by the public CoinGecko and DeFiLlama APIs.
pub struct HttpMarketFeed {
    http: Client,
    coingecko_url: String,
    defillama_url: String,
    coingecko_api_key: Option<String>,
    index_asset: String,
    ids: HashMap<ProtocolId, MarketIds>,
    cache: DashMap<String, (Instant, Series)>,
}

impl HttpMarketFeed {
    #[must_use]
    pub fn new(
        coingecko_url: impl Into<String>,
        defillama_url: impl Into<String>,
        index_asset: impl Into<String>,
        timeout_ms: u64,
        ids: HashMap<ProtocolId, MarketIds>,
    ) -> Self {
        Self {
            http: http::client(timeout_ms),
            coingecko_url: coingecko_url.into().trim_end_matches('/').to_string(),
            defillama_url: defillama_url.into().trim_end_matches('/').to_string(),
            coingecko_api_key: None,
            index_asset: index_asset.into(),
            ids,
            cache: DashMap::new(),
        }
    }

    #[must_use]
    pub fn with_coingecko_key(mut self, key: Option<String>) -> Self {
        self.coingecko_api_key = key;
        self
    }

    fn ids(&self, protocol: &ProtocolId) -> Option<&MarketIds> {
        self.ids.get(protocol)
    }

    fn cached(&self, key: &str) -> Option<Series> {
        let entry = self.cache.get(key)?;
        let (at, series) = entry.value();
        (at.elapsed() < CACHE_TTL).then(|| series.clone())
    }

    async fn coingecko_prices(&self, coin: &str, days: u32) -> Result<Series, SourceError> {
        let url = format!(
            "{}/coins/{coin}/market_chart?vs_currency=usd&days={days}&interval=daily",
            self.coingecko_url
        );
        if let Some(series) = self.cached(&url) {
            return Ok(series);
        }
        let mut request = self.http.get(&url);
        if let Some(key) = &self.coingecko_api_key {
            request = request.header("x-cg-demo-api-key", key);
        }
        let chart: MarketChart = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SourceError::transient(COINGECKO, e))?
            .json()
            .await
            .map_err(|e| SourceError::transient(COINGECKO, e))?;
        let series = chart.into_series();
        debug!(coin, points = series.len(), "Fetched price history");
        self.cache.insert(url, (Instant::now(), series.clone()));
        Ok(series)
    }

    async fn defillama_tvl(&self, slug: &str, days: u32) -> Result<Series, SourceError> {
        let url = format!("{}/protocol/{slug}", self.defillama_url);
        let full = match self.cached(&url) {
            Some(series) => series,
            None => {
                let body: ProtocolTvl = self
                    .http
                    .get(&url)
                    .send()
                    .await
                    .and_then(reqwest::Response::error_for_status)
                    .map_err(|e| SourceError::transient(DEFILLAMA, e))?
                    .json()
                    .await
                    .map_err(|e| SourceError::transient(DEFILLAMA, e))?;
                let series = body.into_series();
                debug!(slug, points = series.len(), "Fetched TVL history");
                self.cache.insert(url, (Instant::now(), series.clone()));
                series
            }
        };
        Ok(Series::new(full.tail(days as usize).to_vec()))
    }
}

fn millis(ms: f64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms as i64).single()
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    #[serde(default)]
    prices: Vec<(f64, f64)>,
}

impl MarketChart {
    fn into_series(self) -> Series {
        Series::new(
            self.prices
                .into_iter()
                .filter_map(|(ms, price)| Some(Observation::new(millis(ms)?, price)))
                .collect(),
        )
    }
}

#[derive(Debug, Deserialize)]
struct ProtocolTvl {
    #[serde(default)]
    tvl: Vec<TvlPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TvlPoint {
    date: i64,
    #[serde(rename = "totalLiquidityUSD")]
    total_liquidity_usd: f64,
}

impl ProtocolTvl {
    fn into_series(self) -> Series {
        Series::new(
            self.tvl
                .into_iter()
                .filter_map(|p| {
                    let at = Utc.timestamp_opt(p.date, 0).single()?;
                    Some(Observation::new(at, p.total_liquidity_usd))
                })
                .collect(),
        )
    }
}

#[async_trait]
impl MarketDataFeed for HttpMarketFeed {
    async fn price_series(&self, protocol: &ProtocolId, days: u32) -> Result<Series, SourceError> {
        let coin = self
            .ids(protocol)
            .and_then(|ids| ids.coingecko_id.as_deref())
            .ok_or_else(|| SourceError::transient(COINGECKO, format!("no coin id for {protocol}")))?;
        self.coingecko_prices(coin, days).await
    }

    async fn tvl_series(&self, protocol: &ProtocolId, days: u32) -> Result<Series, SourceError> {
        let slug = self
            .ids(protocol)
            .and_then(|ids| ids.defillama_slug.as_deref())
            .ok_or_else(|| SourceError::transient(DEFILLAMA, format!("no slug for {protocol}")))?;
        self.defillama_tvl(slug, days).await
    }

    async fn market_index_series(&self, days: u32) -> Result<Series, SourceError> {
        self.coingecko_prices(&self.index_asset, days).await
    }

    async fn holder_concentration(
        &self,
        protocol: &ProtocolId,
    ) -> Result<Option<f64>, SourceError> {
        Ok(self
            .ids(protocol)
            .and_then(|ids| ids.holder_concentration)
            .map(|c| c.clamp(0.0, 1.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_chart_parses_millisecond_pairs() {
        let json = r#"{"prices":[[1700000000000,1.5],[1700086400000,1.6]],"market_caps":[]}"#;
        let chart: MarketChart = serde_json::from_str(json).unwrap();
        let series = chart.into_series();
        assert_eq!(series.values(), vec![1.5, 1.6]);
    }

    #[test]
    fn tvl_history_parses_daily_points() {
        let json = r#"{"name":"Aave","tvl":[
            {"date":1700000000,"totalLiquidityUSD":1000000.0},
            {"date":1700086400,"totalLiquidityUSD":1100000.0}]}"#;
        let body: ProtocolTvl = serde_json::from_str(json).unwrap();
        assert_eq!(body.into_series().len(), 2);
    }

    #[tokio::test]
    async fn unmapped_protocol_is_a_transient_error() {
        let feed = HttpMarketFeed::new("http://127.0.0.1:9", "http://127.0.0.1:9", "bitcoin", 100, HashMap::new());
        let err = feed.price_series(&ProtocolId::from("aave"), 30).await.unwrap_err();
        assert!(matches!(err, SourceError::Transient { .. }));
        assert_eq!(feed.holder_concentration(&ProtocolId::from("aave")).await.unwrap(), None);
    }
}
