//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! ```text
//!   transport ──► inbound::UpgradeMonitor ──► application
//!                                                 │
//!        ┌──────────────┬──────────────┬──────────┴─────┬──────────────┐
//!        ▼              ▼              ▼                ▼              ▼
//!   ChainClient  GovernanceSource  MarketDataFeed     Store     Variance/LevelModel
//! ```

pub mod inbound;
pub mod outbound;
