//! Error types for the wallet checker

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the wallet checker
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // RPC errors
    /// Transport-level failure reaching the provider (refused, timeout, TLS...)
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with a JSON-RPC error envelope
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The response did not have the shape we expected
    #[error("Unexpected response data: {0}")]
    Data(String),

    /// The requested resource does not exist (no holders, no rows...)
    #[error("Not found: {0}")]
    NotFound(String),

    // Streaming errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("CSV error: {0}")]
    Csv(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is retryable (transient).
    ///
    /// RPC envelopes only count when the node is overloaded or rate limiting
    /// (-32005, 429, 5xx); anything else is a bad request and will not heal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::WebSocket(_) => true,
            Error::Rpc { code, .. } => matches!(code, -32005 | 429 | 500..=599),
            _ => false,
        }
    }
}

// Any failure coming out of reqwest happened on the wire or while reading the body
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::Data(e.to_string())
        } else {
            Error::Network(e.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Csv(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(e.to_string())
    }
}
