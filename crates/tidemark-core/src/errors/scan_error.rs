//! File-level scan errors.

use std::path::PathBuf;

use super::error_code::{self, TidemarkErrorCode};

/// Errors for a single file. Recovered locally: the file is skipped and
/// the error string is recorded against the scan.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unsupported encoding in {path}: not valid UTF-8")]
    Encoding { path: PathBuf },

    #[error("File too large: {path} ({size} bytes, max {max})")]
    TooLarge { path: PathBuf, size: u64, max: u64 },

    #[error("Scan cancelled")]
    Cancelled,
}

impl ScanError {
    /// Classify an IO error, separating encoding failures from the rest.
    pub fn from_io(path: PathBuf, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::InvalidData {
            Self::Encoding { path }
        } else {
            Self::Io { path, source }
        }
    }
}

impl TidemarkErrorCode for ScanError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => error_code::CANCELLED,
            _ => error_code::SCAN_ERROR,
        }
    }
}
