//! Error types for the network layer.

use ramjet_core::CoreError;
use thiserror::Error;

/// Network layer error type.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A request or target URL could not be parsed.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The upstream fetch failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// An incoming request body exceeded the configured cap.
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Server error.
    #[error("Server error: {0}")]
    Server(String),
}

impl WorkerError {
    /// Builds an [`WorkerError::InvalidUrl`] for the given input.
    pub fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            source,
        }
    }
}

/// Errors raised by a [`crate::Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP client could not be built.
    #[error("Failed to build client: {0}")]
    Client(String),

    /// The request method is not a valid HTTP token.
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// The URL scheme cannot be fetched.
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// The request failed before a response arrived.
    #[error("Request failed: {0}")]
    Request(String),

    /// The response body could not be read.
    #[error("Failed to read body: {0}")]
    Body(String),

    /// The response body exceeded the configured cap.
    #[error("Response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// Result type for network layer operations.
pub type Result<T> = std::result::Result<T, WorkerError>;
