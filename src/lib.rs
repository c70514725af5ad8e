//! upwatch - protocol-upgrade risk monitoring.
//!
//! Watches smart-contract upgrade activity across EVM networks, follows the
//! governance proposals behind it, and keeps a per-upgrade risk assessment,
//! volatility and liquidity forecasts and execution guidance current for
//! live subscribers.
//!
//! # Architecture
//!
//! - [`domain`] - Pure types and their invariants: events, proposals,
//!   assessments, forecasts, guidance
//! - [`port`] - Traits toward collaborators (chain, governance platforms,
//!   market data, persistence) and the inbound monitor API
//! - [`application`] - Use cases: ingestion, governance tracking, sentiment,
//!   risk fusion, forecasting, guidance, distribution, the pipeline
//! - [`adapter`] - Port implementations: JSON-RPC, Snapshot, Tally,
//!   CoinGecko/DeFiLlama, in-memory and SQLite stores
//! - [`infrastructure`] - Configuration, composition root, runtime
//! - [`cli`] - Binary surface
//!
//! # Example
//!
//! ```no_run
//! use upwatch::infrastructure::config::settings::Config;
//!
//! let config = Config::load("config.toml").unwrap();
//! config.init_logging();
//! ```

pub mod adapter;
pub mod application;
pub mod cli;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
