//! Extraction errors.
//!
//! Never surfaced as scan failures: the hybrid extractor turns them into
//! warnings on the file's `ExtractionQuality`.

use super::error_code::{self, TidemarkErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("No grammar available for {language}")]
    GrammarUnavailable { language: String },

    #[error("Structural parse of {file} timed out after {timeout_ms}ms")]
    Timeout { file: String, timeout_ms: u64 },

    #[error("Structural parser failed on {file}: {message}")]
    ParserFailed { file: String, message: String },

    #[error("Pattern rule '{rule}' failed on {file}")]
    RuleFailed { rule: String, file: String },

    #[error("Unsupported language for {file}")]
    UnsupportedLanguage { file: String },
}

impl TidemarkErrorCode for ExtractionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => error_code::PARSE_TIMEOUT,
            Self::UnsupportedLanguage { .. } => error_code::UNSUPPORTED_LANGUAGE,
            _ => error_code::EXTRACTION_ERROR,
        }
    }
}
