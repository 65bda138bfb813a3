//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Registry lookup out of range
    #[error("sink index {index} out of range (len {len})")]
    SinkIndex { index: usize, len: usize },

    /// Payload serialization failure
    #[error("failed to encode payload for sink '{sink_name}': {message}")]
    Payload { sink_name: String, message: String },

    /// Frame source error
    #[error("source error: {0}")]
    Source(#[from] ingestion::IngestionError),

    /// Contract-level error (transport, detector)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    pub fn sink_index(index: usize, len: usize) -> Self {
        Self::SinkIndex { index, len }
    }

    pub fn payload(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Payload {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
