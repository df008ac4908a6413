//! Error types for CLI operations.

use contracts::HubError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// A `--local` / `--remote` argument could not be parsed
    #[error("Invalid --{flag} '{value}': {source}")]
    InvalidEndpoint {
        flag: &'static str,
        value: String,
        #[source]
        source: HubError,
    },

    /// Configuration parse or validation error
    #[error("Configuration error: {0}")]
    Config(#[from] HubError),

    /// The hub thread did not finish cleanly
    #[error("Hub execution failed: {message}")]
    HubExecution { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_endpoint(flag: &'static str, value: impl Into<String>, source: HubError) -> Self {
        Self::InvalidEndpoint {
            flag,
            value: value.into(),
            source,
        }
    }

    pub fn hub_execution(message: impl Into<String>) -> Self {
        Self::HubExecution {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
