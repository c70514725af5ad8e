//! Application services (use cases).
//!
//! These services orchestrate domain logic and talk to collaborators only
//! through the outbound ports.

pub mod distribution;
pub mod forecast;
pub mod governance;
pub mod guidance;
pub mod ingest;
pub mod pipeline;
pub mod risk;
pub mod sentiment;

pub use pipeline::{Pipeline, PipelineParts, PipelineSettings};
