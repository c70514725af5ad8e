use std::time::Duration;

use thiserror::Error;

use crate::domain::error::DomainError;
use crate::domain::risk::RiskAssessment;

/// Configuration errors. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("invalid risk weights: {0}")]
    InvalidWeights(#[source] DomainError),

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Upstream RPC or API failures. Retried with backoff.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("{source_name} unavailable: {reason}")]
    Transient { source_name: String, reason: String },

    #[error("{source_name} returned malformed response: {reason}")]
    Malformed { source_name: String, reason: String },
}

impl SourceError {
    pub fn transient(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transient {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Malformed {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Model fitting failures. Each one routes to the next model in the
/// fallback chain rather than failing the forecast.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("insufficient data: {have} observations, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("{model} fit failed: {reason}")]
    ModelFit { model: &'static str, reason: String },

    #[error("fit exceeded {0:?}")]
    Timeout(Duration),
}

/// Store unavailable. Retryable; the computed result rides along so the
/// caller can retry persistence without recomputing.
#[derive(Error, Debug, Clone)]
pub enum PersistenceError {
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("failed to persist assessment for {}: {reason}", .assessment.upgrade)]
    Assessment {
        reason: String,
        assessment: Box<RiskAssessment>,
    },
}

impl PersistenceError {
    pub fn unavailable(reason: impl ToString) -> Self {
        Self::Unavailable {
            reason: reason.to_string(),
        }
    }

    /// The computed assessment that failed to persist, if any.
    #[must_use]
    pub fn assessment(&self) -> Option<&RiskAssessment> {
        match self {
            Self::Assessment { assessment, .. } => Some(assessment),
            Self::Unavailable { .. } => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("unknown {kind}: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("shutting down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, Error>;
