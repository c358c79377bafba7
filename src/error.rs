//! Error types for the collector.
//!
//! These only surface from seams a caller drives directly (transports,
//! flushing). Capturing an error never returns one of these.

use std::time::Duration;
use thiserror::Error;

/// Main error type for collector operations.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Endpoint rejected report with status {0}")]
    Status(u16),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Delivery worker has shut down")]
    WorkerClosed,

    #[error("Flush timed out after {0:?}")]
    FlushTimeout(Duration),

    #[error("Invalid error kind: {0}")]
    InvalidKind(String),
}

impl From<serde_json::Error> for CollectorError {
    fn from(e: serde_json::Error) -> Self {
        CollectorError::Serialization(e.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for CollectorError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => CollectorError::Status(status.as_u16()),
            None => CollectorError::Transport(e.to_string()),
        }
    }
}

/// Result type for collector operations.
pub type Result<T> = std::result::Result<T, CollectorError>;
