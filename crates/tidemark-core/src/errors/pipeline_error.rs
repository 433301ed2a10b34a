//! Pipeline errors: the union of subsystem errors.

use super::error_code::{self, TidemarkErrorCode};
use super::{ConfigError, ExtractionError, ScanError, StoreError};

/// Aggregates subsystem errors via `From` conversions.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Pipeline cancelled")]
    Cancelled,
}

impl TidemarkErrorCode for PipelineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::Scan(e) => e.error_code(),
            Self::Extraction(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::Cancelled => error_code::CANCELLED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_propagate_through_pipeline_error() {
        let err: PipelineError = ConfigError::RootNotFound { path: "/nope".into() }.into();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(err.coded_string().starts_with("[CONFIG_ERROR]"));

        let err: PipelineError = ScanError::Cancelled.into();
        assert_eq!(err.error_code(), "CANCELLED");
    }

    #[test]
    fn test_invalid_utf8_maps_to_encoding_error() {
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad utf-8");
        let err = ScanError::from_io("a.py".into(), io);
        assert!(matches!(err, ScanError::Encoding { .. }));
    }
}
