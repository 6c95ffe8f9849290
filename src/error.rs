//! Error types for Gantry
//!
//! All modules use `GantryResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Gantry operations
pub type GantryResult<T> = Result<T, GantryError>;

/// All errors that can occur in Gantry
#[derive(Error, Debug)]
pub enum GantryError {
    // Security errors
    #[error("resolved path {path} escapes cache root {root}")]
    PathEscape { path: PathBuf, root: PathBuf },

    // Storage errors
    #[error("cache index error: {context}")]
    Index {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Remote service errors
    #[error("not found on remote service: {0}")]
    NotFound(String),

    #[error("remote service rejected the credential")]
    Unauthorized,

    #[error("transient remote service error: {0}")]
    Transient(String),

    #[error("remote service request timed out: {0}")]
    Timeout(String),

    #[error("operation cancelled")]
    Cancelled,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no remote service configured. Set remote.base_url in the config or pass --base-url")]
    RemoteNotConfigured,

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GantryError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an index error with context
    pub fn index(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Index {
            context: context.into(),
            source,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Unauthorized => Some("Check the token in remote.token or GANTRY_TOKEN"),
            Self::RemoteNotConfigured => {
                Some("Run: gantry --base-url https://... or edit the config")
            }
            Self::Transient(_) | Self::Timeout(_) => {
                Some("The remote service may recover; retry shortly")
            }
            _ => None,
        }
    }
}
