//! Error types for shoplist-core

use thiserror::Error;

/// Result type alias using shoplist-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in shoplist-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// List or item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Connect failure or non-2xx response from the sync server
    #[error("Network error: {0}")]
    Network(String),

    /// Server payload could not be decoded or failed model validation
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted store error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Whether this error should be treated as a recoverable sync failure.
    pub const fn is_network_failure(&self) -> bool {
        matches!(self, Self::Network(_) | Self::MalformedResponse(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::MalformedResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}
