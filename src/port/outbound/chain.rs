//! Blockchain RPC port.

use async_trait::async_trait;

use crate::error::SourceError;

/// An undecoded EVM log as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    /// Emitting contract, lowercase hex.
    pub address: String,
    pub topics: Vec<String>,
    /// Hex-encoded data, `0x`-prefixed.
    pub data: String,
    pub block_number: u64,
    pub tx_hash: String,
    pub log_index: u64,
}

/// Read access to one network's chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current head block number.
    async fn latest_block(&self) -> Result<u64, SourceError>;

    /// Logs emitted by `addresses` in the inclusive block range.
    async fn logs(
        &self,
        from_block: u64,
        to_block: u64,
        addresses: &[String],
    ) -> Result<Vec<RawLog>, SourceError>;
}
