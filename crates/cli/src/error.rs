//! Error types for CLI operations.

use std::path::Path;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration rejected by the loader or by a CLI override
    #[error("Configuration invalid: {message}")]
    ConfigInvalid { message: String },

    /// UDP socket could not be bound
    #[error("Failed to bind UDP transport on {address}: {message}")]
    Transport { address: String, message: String },

    /// Detector could not be started
    #[error("Failed to start {kind} detector: {message}")]
    Detector { kind: String, message: String },
}

impl CliError {
    pub fn config_not_found(path: &Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    pub fn transport(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn detector(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Detector {
            kind: kind.into(),
            message: message.into(),
        }
    }
}
