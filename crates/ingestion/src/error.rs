//! Ingestion error types

use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Source could not be opened; the Frame Source falls back to `None`
    #[error("no openable source '{source_desc}': {message}")]
    NoOpenableSource {
        source_desc: String,
        message: String,
    },

    /// Single frame read failed
    #[error("frame read failed on '{source_desc}': {message}")]
    ReadFailed {
        source_desc: String,
        message: String,
    },

    /// Source does not support seeking
    #[error("source '{source_desc}' is not seekable")]
    NotSeekable { source_desc: String },

    /// Acquisition thread could not be started
    #[error("failed to spawn acquisition thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// Frame encode/decode failure
    #[error(transparent)]
    Frame(#[from] contracts::ContractError),
}

impl IngestionError {
    pub fn no_openable_source(source_desc: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NoOpenableSource {
            source_desc: source_desc.into(),
            message: message.into(),
        }
    }

    pub fn read_failed(source_desc: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            source_desc: source_desc.into(),
            message: message.into(),
        }
    }
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
