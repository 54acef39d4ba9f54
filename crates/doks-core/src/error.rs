//! Error types for the DoksAI client.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire DoksAI client.
///
/// Collaborators (HTTP clients, config loaders) return this type. The
/// application layer never lets it escape `ask` or `check_health`; it is
/// converted into health observations or chat messages at that boundary.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum DoksError {
    /// The remote service could not be reached at all (client offline, DNS, refused).
    #[error("Service unreachable: {0}")]
    Unreachable(String),

    /// Transport failure after a connection was attempted (timeout, reset, body read).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx HTTP response without a recognizable API error body
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// API-reported failure (`success: false`)
    #[error("{message} ({code})")]
    Api { code: String, message: String },

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Caller supplied input the API would reject
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },
}

impl DoksError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates an Api error
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates an InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if the remote service could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    /// Check if this error says something about service reachability.
    ///
    /// Returns true for:
    /// - `Unreachable` and `Transport` errors
    /// - `Http` errors with a 5xx status
    ///
    /// API-reported failures and invalid input are answers from a live
    /// service and do not count.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for DoksError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for DoksError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(format!("JSON - {}", err))
    }
}

impl From<toml::de::Error> for DoksError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("TOML - {}", err))
    }
}

/// Conversion from anyhow::Error (used by bootstrap code)
impl From<anyhow::Error> for DoksError {
    fn from(err: anyhow::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// A type alias for `Result<T, DoksError>`.
pub type Result<T> = std::result::Result<T, DoksError>;
