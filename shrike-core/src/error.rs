//! Error types for shrike-core

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for review operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Git operation failed
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Text generation backend failed or returned unusable output
    #[error("Generation error: {0}")]
    Generation(String),

    /// Evidence retrieval failed
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Comment publication failed
    #[error("Publish error: {0}")]
    Publish(String),

    /// Audit record could not be written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Attempted an invalid workflow stage transition
    #[error("Invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Structured data failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
