//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`domain`] - Builders for domain primitives: events, proposals,
//!   assessments, forecasts.
//! - [`config`] - Canonical test configurations.
//! - [`chain`] - `ScriptedChainClient`, a chain whose head and logs the test
//!   controls.
//! - [`market`] - `StaticFeed`, fixed market series per protocol.
//! - [`governance`] - `ScriptedGovernanceSource`.
//! - [`store`] - `FailingStore`, a memory store whose writes can be switched
//!   off.

pub mod chain;
pub mod config;
pub mod domain;
pub mod governance;
pub mod market;
pub mod store;
