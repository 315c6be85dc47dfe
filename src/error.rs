//! Tessera error types

use std::time::Duration;

/// Tessera error types
///
/// `Clone` so that a single outcome can be broadcast to every caller that
/// joined a shared (deduplicated or single-flight) operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TesseraError {
    // Model lifecycle errors
    #[error("failed to load model candidate '{candidate}': {message}")]
    LoadFailed { candidate: String, message: String },

    #[error("all {attempted} model candidates failed to load; last error: {last_error}")]
    AllCandidatesFailed { attempted: usize, last_error: String },

    #[error("no model candidates configured")]
    NoCandidates,

    /// The manager is in the error state and will not be retried implicitly.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    // Generation errors
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("empty response from model")]
    EmptyResponse,

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The caller abandoned the request. Never triggers fallback.
    #[error("operation cancelled")]
    Cancelled,

    // Persistence errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no inference backend configured")]
    NoBackend,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl TesseraError {
    /// Whether this error is a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TesseraError::Cancelled)
    }

    /// Whether the orchestration layer should answer with fallback content.
    ///
    /// Everything except cancellation falls back: the caller always gets
    /// usable text unless it abandoned the request.
    pub fn should_fall_back(&self) -> bool {
        !self.is_cancelled()
    }
}

impl From<serde_json::Error> for TesseraError {
    fn from(err: serde_json::Error) -> Self {
        TesseraError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for TesseraError {
    fn from(err: std::io::Error) -> Self {
        TesseraError::Storage(err.to_string())
    }
}

impl From<toml::de::Error> for TesseraError {
    fn from(err: toml::de::Error) -> Self {
        TesseraError::Configuration(err.to_string())
    }
}

/// Result type alias for Tessera operations
pub type Result<T> = std::result::Result<T, TesseraError>;
