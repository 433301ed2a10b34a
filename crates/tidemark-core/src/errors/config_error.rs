//! Configuration errors.

use super::error_code::{self, TidemarkErrorCode};

/// Errors raised while loading or validating configuration.
///
/// These are the only fatal errors of a scan: they are reported before
/// any file is read.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Root directory not found: {path}")]
    RootNotFound { path: String },

    #[error("Config parse error in {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    #[error("Config validation failed for {field}: {message}")]
    ValidationFailed { field: String, message: String },
}

impl TidemarkErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        error_code::CONFIG_ERROR
    }
}
