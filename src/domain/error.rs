//! Domain validation errors for core domain types.
//!
//! These errors are returned when a domain invariant would be violated:
//! a governance status regression or an invalid set of fusion weights.

use thiserror::Error;

use super::governance::ProposalStatus;

/// Errors that occur when domain invariants are violated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Governance status transitions are monotonic; terminal states are final.
    #[error("invalid transition for proposal {proposal}: {from} -> {to}")]
    InvalidTransition {
        /// The proposal whose transition was rejected.
        proposal: String,
        /// Current status (left unchanged).
        from: ProposalStatus,
        /// Requested status.
        to: ProposalStatus,
    },

    /// Fusion weights must be non-negative and sum to 1.
    #[error("invalid risk weights: {reason}")]
    InvalidWeights {
        /// What was wrong with the weights.
        reason: String,
    },
}
