//! Error types for inbox-pilot.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage-related errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// AI oracle errors.
///
/// Always recovered at the annotation stage boundary via the stage's
/// documented fallback value — these never escape the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Oracle {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed oracle response: {0}")]
    MalformedResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Mail/calendar provider errors.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Mail provider operation {operation} failed: {reason}")]
    Mail { operation: String, reason: String },

    #[error("Calendar provider operation {operation} failed: {reason}")]
    Calendar { operation: String, reason: String },
}

/// Activity ledger errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger write failed: {0}")]
    Write(#[from] StoreError),

    #[error("Undo dispatch for record {record_id} failed: {reason}")]
    UndoDispatch { record_id: Uuid, reason: String },
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Message {0} not found")]
    MessageNotFound(Uuid),
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
