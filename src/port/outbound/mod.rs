//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the collaborators the pipeline depends on: chain
//! RPC, governance platforms, market data, persistence and the statistical
//! model strategies.

pub mod chain;
pub mod governance;
pub mod market;
pub mod model;
pub mod store;
