//! Error types for dataforge-chat

use thiserror::Error;

/// Result type alias using dataforge-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced into the chat stream state
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the wire layer
    #[error(transparent)]
    Stream(#[from] dataforge_stream::Error),

    /// A reply is already streaming; only one run may be active at a time
    #[error("A reply is already being generated, please wait for it to finish")]
    AlreadyStreaming,
}

impl Error {
    /// Whether this error came from cancellation
    pub fn is_abort(&self) -> bool {
        match self {
            Error::Stream(e) => e.is_abort(),
            _ => false,
        }
    }
}
