//! Unified error types for the probe service.

use thiserror::Error;

/// Crate-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration is present but unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Probe execution error.
    #[error("probe error: {0}")]
    Probe(#[from] ProbeError),

    /// HTTP client construction error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while a probe talks to its storage backend.
///
/// Every variant ends up as the `detail` of a failed probe, so the
/// `Display` text is what an operator sees.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Transport-level failure (connect, timeout, TLS, body read).
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The storage service answered with a non-success status.
    #[error("storage service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The requested resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The storage call completed but returned nothing usable.
    #[error("{0}")]
    MissingResult(String),

    /// The queue accepted the call but reported an error code.
    #[error("Queue create failed with {0}")]
    QueueRejected(String),

    /// A response could not be decoded.
    #[error("malformed storage response: {0}")]
    Malformed(String),

    /// JSON encoding/decoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request is missing a parameter the probe needs.
    #[error("missing required parameter {0}")]
    MissingParameter(&'static str),

    /// Failure injected by the in-memory backend.
    #[error("{0}")]
    Injected(String),
}

/// Rejected test-record input. Only raised for hard-coded values.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid test record field {field}: {reason}")]
pub struct InvalidTestInput {
    /// Offending field name.
    pub field: &'static str,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
