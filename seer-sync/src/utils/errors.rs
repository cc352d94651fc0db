//! Error types for the sync agent.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Empty payload from {0}")]
    EmptyPayload(String),

    #[error("Invalid JSON in {path}: {source}")]
    InvalidJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document root is not a mapping: {0}")]
    NotAMapping(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Format error: {0}")]
    Format(String),
}

impl SyncError {
    /// Whether retrying the same request could succeed.
    ///
    /// Connectivity failures, timeouts, HTTP 5xx and HTTP 429 are transient.
    /// Content, filesystem and configuration problems never are.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Network(_) | SyncError::Timeout(_) => true,
            SyncError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(|u| u.to_string()).unwrap_or_default();
        if e.is_timeout() {
            SyncError::Timeout(url)
        } else if let Some(status) = e.status() {
            SyncError::HttpStatus {
                status: status.as_u16(),
                url,
            }
        } else if e.is_builder() {
            SyncError::InvalidUrl(e.to_string())
        } else {
            SyncError::Network(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
