//! Layered error definitions
//!
//! Categorized by source: config / endpoint / sink / frame

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum HubError {
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

    // ===== Endpoint Errors =====
    /// Listen address could not be bound
    #[error("couldn't bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Host name did not resolve to a usable socket address
    #[error("cannot resolve '{addr}': {message}")]
    Resolve { addr: String, message: String },

    // ===== Sink Errors =====
    /// Sink could not open its output
    #[error("sink '{sink_name}' cannot open '{path}': {source}")]
    SinkOpen {
        sink_name: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Named log plugin is not registered
    #[error("log plugin '{name}' not found (available: {})", available.join(", "))]
    PluginNotFound { name: String, available: Vec<String> },

    // ===== Frame Errors =====
    /// Framed log record is malformed
    #[error("bad frame at offset {offset}: {message}")]
    Frame { offset: u64, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl HubError {
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

    /// Create bind error
    pub fn bind(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.into(),
            source,
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create frame decode error
    pub fn frame(offset: u64, message: impl Into<String>) -> Self {
        Self::Frame {
            offset,
            message: message.into(),
        }
    }
}
