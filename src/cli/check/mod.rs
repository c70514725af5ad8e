//! Diagnostic checks.

pub mod config;
