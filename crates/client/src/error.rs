//! Client error types.

use thiserror::Error;

/// Errors from persistent client storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file is not a JSON object of strings.
    #[error("storage format error: {0}")]
    Format(#[from] serde_json::Error),

    /// A previous writer panicked while holding the storage lock.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Errors from storefront API calls and cart synchronization.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The API answered with a non-2xx status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("failed to decode response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },

    /// Building a request URL failed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Persisting client state failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A cart operation was attempted with no store selected.
    #[error("no store selected")]
    NoStore,

    /// The operation requires a logged-in user.
    #[error("not authenticated")]
    NotAuthenticated,
}

impl ClientError {
    /// HTTP status of an API error, if this is one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server rejected the presented credentials.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }
}
