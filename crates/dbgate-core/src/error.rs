use thiserror::Error;

use crate::domain::Key;

/// Errors a storage context reports to the façade.
///
/// The service never lets these escape: each call site turns them into a
/// failed [`Response`](crate::domain::Response). The variants stay distinct so
/// the failure message says *why* a write failed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no entity set registered for {0}")]
    SetNotFound(&'static str),

    #[error("{entity} with key {key} not found")]
    NotFound { entity: &'static str, key: Key },

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("query evaluation failed: {0}")]
    Query(String),

    #[error("internal storage error: {0}")]
    Internal(String),
}

/// Errors a mapping engine reports to the façade.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("no mapping rule from {source_type} to {target_type}")]
    MissingRule {
        source_type: &'static str,
        target_type: &'static str,
    },

    #[error("mapping rule failed: {0}")]
    Rule(String),
}

/// Errors raised while loading configuration or wiring the façade.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid connection string {0:?}")]
    InvalidConnectionString(String),

    #[error("unsupported connection scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
