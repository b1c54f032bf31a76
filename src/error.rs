//! Crate-level error type.

use thiserror::Error;

/// Every fallible operation in the crate returns this error.
#[derive(Error, Debug)]
pub enum LiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid endpoint '{location}': {reason}")]
    InvalidEndpoint { location: String, reason: String },

    #[error("failed to parse config {origin}: {source}")]
    Config {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("malformed HTTP request: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The markup renderer refused the buffer. Never caught by the patch
    /// handler; it ends the session.
    #[error("render failed: {0}")]
    Render(String),
}

impl From<httparse::Error> for LiveError {
    fn from(err: httparse::Error) -> Self {
        LiveError::Http(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LiveError>;
