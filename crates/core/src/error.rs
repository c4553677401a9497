//! Error types for bz-core
//!
//! Provides a unified error type that can be converted to appropriate exit codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for bz-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error payload decoded from a non-success service response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// HTTP status code of the response
    pub status: u16,

    /// Machine-readable error code (e.g. "bad_request")
    #[serde(default)]
    pub code: String,

    /// Human-readable message from the service
    #[serde(default)]
    pub message: String,
}

impl RemoteError {
    /// Decode an error body returned by the service.
    ///
    /// Bodies that are not the usual `{status, code, message}` object are kept
    /// verbatim in `message` so nothing the server said is lost.
    pub fn decode(status: u16, body: &serde_json::Value) -> Self {
        let code = body
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let message = match body.get("message").and_then(|v| v.as_str()) {
            Some(m) => m.to_string(),
            None if body.is_null() => String::new(),
            None => body.to_string(),
        };
        Self {
            status,
            code,
            message,
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{} ({})", self.code, self.status)
        } else {
            write!(f, "{} ({}): {}", self.code, self.status, self.message)
        }
    }
}

/// Error types for bz-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid path format
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Alias not found
    #[error("Alias not found: {0}")]
    AliasNotFound(String),

    /// Alias already exists
    #[error("Alias already exists: {0}")]
    AliasExists(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Exact-match lookup found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport-level failure (connection, timeout, broken body)
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with a non-success status
    #[error("Remote request failed: {0}")]
    RemoteRequest(RemoteError),

    /// Caller supplied an invalid or conflicting argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Part size or content length out of range
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    /// The service answered 200 with a body we cannot use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A spawned upload task panicked or was aborted
    #[error("Upload task failed: {0}")]
    TaskFailed(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Get the appropriate exit code for this error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_)
            | Error::Config(_)
            | Error::InvalidArgument(_)
            | Error::InvalidSize(_) => 2, // UsageError
            Error::Network(_) => 3,        // NetworkError
            Error::Auth(_) => 4,           // AuthError
            Error::NotFound(_) | Error::AliasNotFound(_) => 5, // NotFound
            Error::AliasExists(_) => 6,    // Conflict
            Error::RemoteRequest(remote) => match remote.status {
                401 | 403 => 4,
                404 => 5,
                409 => 6,
                429 | 500..=599 => 3,
                _ => 1,
            },
            _ => 1, // GeneralError
        }
    }
}
