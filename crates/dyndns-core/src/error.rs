//! Error types for the dynamic DNS updater
//!
//! This module defines all error types used throughout the workspace.

use thiserror::Error;

/// Result type alias for dynamic DNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dynamic DNS updater
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Client-caused input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Public IP resolution errors
    #[error("IP resolution error: {0}")]
    IpResolution(String),

    /// DNS backend errors, carrying the provider's HTTP status when known
    #[error("Backend error ({backend}): {message}")]
    Backend {
        /// Backend name
        backend: String,
        /// HTTP status returned by the provider, if any
        status: Option<u16>,
        /// Error message
        message: String,
    },

    /// Remote instance rejected a forwarded update
    #[error("Remote update failed{}: {message}", status_suffix(.status))]
    Remote {
        /// HTTP status returned by the remote instance, if any
        status: Option<u16>,
        /// Error payload returned by the remote instance
        message: String,
    },

    /// HTTP transport errors (connection, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A single record reconciliation step failed
    #[error("Failed to reconcile {record}: {source}")]
    Reconcile {
        /// Record being reconciled, e.g. "A home.example.com"
        record: String,
        /// Underlying cause
        #[source]
        source: Box<Error>,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an IP resolution error
    pub fn ip_resolution(msg: impl Into<String>) -> Self {
        Self::IpResolution(msg.into())
    }

    /// Create a backend error without a status code
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Create a backend error carrying the provider's HTTP status
    pub fn backend_status(
        backend: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            backend: backend.into(),
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a remote forwarding error
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Create an HTTP transport error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Wrap an error with the record it was raised for
    pub fn reconcile(record: impl Into<String>, source: Error) -> Self {
        Self::Reconcile {
            record: record.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, looking through reconciliation wrappers
    pub fn root(&self) -> &Error {
        match self {
            Self::Reconcile { source, .. } => source.root(),
            other => other,
        }
    }

    /// HTTP status reported by an upstream (provider or remote instance), if any
    pub fn upstream_status(&self) -> Option<u16> {
        match self.root() {
            Self::Backend { status, .. } | Self::Remote { status, .. } => *status,
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
