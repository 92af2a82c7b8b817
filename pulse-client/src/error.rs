//! Ingestion error types.

use thiserror::Error;

/// Result type for ingestion operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors that can occur while buffering or delivering events.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected payload with code {code}")]
    Rejected { code: i64 },

    #[error("delivery failed after {attempts} attempts, last status {status}")]
    RetriesExhausted {
        attempts: u32,
        status: reqwest::StatusCode,
    },

    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid event: {0}")]
    Validation(#[from] pulse_types::ValidationError),

    #[error("consumer is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// True for failures caused by the network path rather than the payload.
    ///
    /// `flush_all` swallows these while draining makes progress; everything
    /// else propagates immediately.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            IngestError::Http(_)
                | IngestError::RetriesExhausted { .. }
                | IngestError::UnexpectedStatus(_)
        )
    }
}
