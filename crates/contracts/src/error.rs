//! Layered error definitions
//!
//! Categorized by source: config / source / codec / detection / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Frame Source Errors =====
    /// Source could not be opened
    #[error("cannot open source '{source_desc}': {message}")]
    SourceOpen {
        source_desc: String,
        message: String,
    },

    /// Image encode/decode failure
    #[error("frame codec error: {message}")]
    FrameCodec { message: String },

    // ===== Detection Errors =====
    /// Detector failure
    #[error("detector '{kind}' error: {message}")]
    Detector { kind: String, message: String },

    /// Perspective-n-point solve did not converge
    #[error("pnp solve failed: {message}")]
    PnpSolve { message: String },

    // ===== Sink Errors =====
    /// Datagram send error
    #[error("sink '{sink_name}' send error: {message}")]
    SinkSend { sink_name: String, message: String },

    /// Sink registry lookup error
    #[error("sink index {index} out of range (len {len})")]
    SinkIndex { index: usize, len: usize },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create source open error
    pub fn source_open(source_desc: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceOpen {
            source_desc: source_desc.into(),
            message: message.into(),
        }
    }

    /// Create frame codec error
    pub fn frame_codec(message: impl Into<String>) -> Self {
        Self::FrameCodec {
            message: message.into(),
        }
    }

    /// Create pnp solve error
    pub fn pnp_solve(message: impl Into<String>) -> Self {
        Self::PnpSolve {
            message: message.into(),
        }
    }

    /// Create sink send error
    pub fn sink_send(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkSend {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
