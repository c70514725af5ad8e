//! EVM JSON-RPC chain client.

mod client;
mod dto;

pub use client::JsonRpcChainClient;
