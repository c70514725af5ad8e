//! Outbound adapters (driven side).

pub mod governance;
pub mod http;
pub mod market;
pub mod memory;
pub mod rpc;
pub mod sqlite;
