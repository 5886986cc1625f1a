use std::path::PathBuf;

use thiserror::Error;

/// Result type for asset operations
pub type AssetResult<T> = Result<T, AssetError>;

/// Errors that can occur during asset operations
#[derive(Error, Debug)]
pub enum AssetError {
    /// The object (remote or local) does not exist
    #[error("Asset not found: {name}")]
    NotFound { name: String },

    /// Non-404 failure reported by, or while talking to, the remote service
    #[error("Remote service error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },

    #[error("Improperly configured: {message}")]
    Configuration { message: String },

    #[error("Command requires {}. Run collectstatic first and try again.", .path.display())]
    ManifestMissing { path: PathBuf },

    #[error("Invalid manifest: {message}")]
    ManifestInvalid { message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Operation not supported by this storage: {operation}")]
    Unsupported { operation: &'static str },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl AssetError {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(name: S) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a transport error with the status the service answered with
    pub fn transport<S: Into<String>>(status: Option<u16>, message: S) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a manifest missing error
    pub fn manifest_missing<P: Into<PathBuf>>(path: P) -> Self {
        Self::ManifestMissing { path: path.into() }
    }

    /// Create an invalid manifest error
    pub fn manifest_invalid<S: Into<String>>(message: S) -> Self {
        Self::ManifestInvalid {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<reqwest::Error> for AssetError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
