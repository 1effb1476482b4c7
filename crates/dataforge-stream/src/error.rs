//! Error types for dataforge-stream

use thiserror::Error;

/// Result type alias using dataforge-stream Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while opening or reading a message stream
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server answered with a non-success status
    #[error("HTTP error! status: {status}")]
    Status { status: u16 },

    /// No bearer token available
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Stream was aborted
    #[error("Request aborted")]
    Aborted,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this error came from cancellation rather than a genuine failure.
    ///
    /// Aborts are expected whenever a run is stopped or superseded and must
    /// never be shown to the user.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Aborted)
    }

    /// Create a status error from an HTTP status code
    pub fn status(status: reqwest::StatusCode) -> Self {
        Self::Status {
            status: status.as_u16(),
        }
    }
}
