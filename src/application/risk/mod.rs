//! Risk engine: component scoring, weighted or learned fusion and
//! single-flight assessment per upgrade.

mod engine;
pub mod flight;
pub mod learned;
pub mod scoring;

pub use engine::{RiskEngine, RiskEngineConfig};
pub use flight::SingleFlight;
pub use learned::RidgeRegression;
