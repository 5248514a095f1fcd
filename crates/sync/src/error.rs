//! Error taxonomy for sync operations.

use std::time::Duration;

use thiserror::Error;
use wareflow_core::DomainError;

/// Everything that can go wrong talking to the backend or an external
/// system. Callers branch on the variant; the queue fallback path treats
/// all of them the same.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The request never completed: DNS, refused connection, dropped socket.
    #[error("network error: {0}")]
    Network(String),

    /// No response inside the per-attempt window.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// A success response whose body was not the expected JSON.
    #[error("unparseable response: {0}")]
    Parse(String),

    /// Invalid or missing configuration, including failed integration gates.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SyncError {
    /// Classify a transport-level failure from the HTTP client.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(timeout)
        } else if err.is_decode() {
            SyncError::Parse(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<DomainError> for SyncError {
    fn from(err: DomainError) -> Self {
        SyncError::Configuration(err.to_string())
    }
}
