//! Store collaborator errors.

use std::path::PathBuf;

use super::error_code::{self, TidemarkErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to write access map to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read access map from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize access map: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl TidemarkErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        error_code::STORE_ERROR
    }
}
