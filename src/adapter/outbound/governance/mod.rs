//! Governance platform clients.

mod snapshot;
mod tally;

pub use snapshot::SnapshotSource;
pub use tally::TallySource;
