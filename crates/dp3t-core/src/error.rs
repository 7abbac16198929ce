//! Error types for the DP-3T tracing client
//!
//! This module defines all error types used throughout the crate.
//!
//! Two taxonomies coexist: the closed [`ErrorKind`] set that the UI branches
//! on, and free-form native messages kept alongside for diagnostics.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for tracing client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Domain-level error kind reported by the native tracing SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Bluetooth is switched off
    BluetoothDisabled,
    /// A required system permission has not been granted
    PermissionMissing,
    /// Synchronisation with the report server failed
    Sync,
    /// Any error the SDK does not classify further
    #[serde(other)]
    Other,
}

impl ErrorKind {
    /// Wire name of the kind, as emitted by the native SDK
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Other => "other",
            ErrorKind::BluetoothDisabled => "bluetoothDisabled",
            ErrorKind::PermissionMissing => "permissionMissing",
            ErrorKind::Sync => "sync",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for the tracing client
///
/// The type is `Clone` so a failed refresh can be held as the controller's
/// observed value. Sources that are not `Clone` are stored as their message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Transport failure talking to the native backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// Domain error rejected by the tracing SDK
    #[error("Tracing error ({kind}): {message}")]
    Tracing {
        /// Domain error kind
        kind: ErrorKind,
        /// Native error message
        message: String,
    },

    /// Operation not valid in the backend's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// I/O errors (config files)
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a backend transport error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a domain tracing error
    pub fn tracing(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Tracing {
            kind,
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Domain kind of this error, if it is a tracing error
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Tracing { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
