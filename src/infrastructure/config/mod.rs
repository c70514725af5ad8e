//! Configuration sections and loading.

pub mod forecast;
pub mod governance;
pub mod ingest;
pub mod logging;
pub mod market;
pub mod network;
pub mod risk;
pub mod settings;

pub use settings::{Config, StorageConfig};
