//! Infrastructure layer.
//!
//! Configuration, composition and process lifecycle. No business logic.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root for runtime wiring
//! - [`config`] - Configuration loading and validation
//! - [`runtime`] - Task lifecycle and shutdown

pub mod bootstrap;
pub mod config;
pub mod runtime;
