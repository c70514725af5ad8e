//! Inbound (driving) ports consumed by inbound adapters such as the CLI or
//! an external transport.
//!
//! - [`monitor`]: the upgrade-monitoring use cases

pub mod monitor;

pub use monitor::{HealthReport, ProtocolReport, Reevaluation, UpgradeMonitor};
