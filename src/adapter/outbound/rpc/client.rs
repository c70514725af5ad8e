use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::dto::{quantity, LogDto, RpcRequest, RpcResponse};
use crate::adapter::outbound::http;
use crate::error::SourceError;
use crate::port::outbound::chain::{ChainClient, RawLog};

/// [`ChainClient`] over HTTP JSON-RPC (`eth_blockNumber`, `eth_getLogs`).
///
/// Every failure, including node-side errors, surfaces as
/// [`SourceError::Transient`] so the connector can back off and retry.
/// Responses that parse but make no sense are [`SourceError::Malformed`].
pub struct JsonRpcChainClient {
    http: Client,
    url: String,
    source_name: String,
    next_id: AtomicU64,
}

impl JsonRpcChainClient {
    #[must_use]
    pub fn new(network: &str, url: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            http: http::client(timeout_ms),
            url: url.into(),
            source_name: format!("rpc:{network}"),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, SourceError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SourceError::transient(&self.source_name, e))?;
        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| SourceError::transient(&self.source_name, e))?;

        if let Some(err) = body.error {
            debug!(method, code = err.code, "RPC error response");
            return Err(SourceError::transient(
                &self.source_name,
                format!("{method} failed ({}): {}", err.code, err.message),
            ));
        }
        body.result.ok_or_else(|| {
            SourceError::malformed(&self.source_name, format!("{method} returned no result"))
        })
    }

    fn to_raw(&self, log: LogDto) -> Result<RawLog, SourceError> {
        let field = |value: Option<&str>, name: &str| {
            value.and_then(quantity).ok_or_else(|| {
                SourceError::malformed(&self.source_name, format!("log missing {name}"))
            })
        };
        let block_number = field(log.block_number.as_deref(), "blockNumber")?;
        let log_index = field(log.log_index.as_deref(), "logIndex")?;
        let tx_hash = log.transaction_hash.ok_or_else(|| {
            SourceError::malformed(&self.source_name, "log missing transactionHash")
        })?;
        Ok(RawLog {
            address: log.address.to_ascii_lowercase(),
            topics: log.topics,
            data: log.data,
            block_number,
            tx_hash,
            log_index,
        })
    }
}

#[async_trait]
impl ChainClient for JsonRpcChainClient {
    async fn latest_block(&self) -> Result<u64, SourceError> {
        let raw: String = self.call("eth_blockNumber", json!([])).await?;
        quantity(&raw).ok_or_else(|| {
            SourceError::malformed(&self.source_name, format!("bad block number {raw:?}"))
        })
    }

    async fn logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &[String],
    ) -> Result<Vec<RawLog>, SourceError> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let filter = json!([{
            "fromBlock": format!("{from_block:#x}"),
            "toBlock": format!("{to_block:#x}"),
            "address": addresses,
        }]);
        let logs: Vec<LogDto> = self.call("eth_getLogs", filter).await?;

        let mut out = Vec::with_capacity(logs.len());
        for log in logs {
            if log.removed {
                continue;
            }
            match self.to_raw(log) {
                Ok(raw) => out.push(raw),
                Err(e) => warn!(error = %e, "Skipping pending or incomplete log"),
            }
        }
        Ok(out)
    }
}
