//! Stable error codes for callers that cross a process boundary.

/// Every error enum implements this to expose a structured code string.
pub trait TidemarkErrorCode {
    /// Returns the error code string (e.g., "SCAN_ERROR").
    fn error_code(&self) -> &'static str;

    /// Returns `[ERROR_CODE] message`.
    fn coded_string(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

pub const SCAN_ERROR: &str = "SCAN_ERROR";
pub const CANCELLED: &str = "CANCELLED";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const EXTRACTION_ERROR: &str = "EXTRACTION_ERROR";
pub const PARSE_TIMEOUT: &str = "PARSE_TIMEOUT";
pub const UNSUPPORTED_LANGUAGE: &str = "UNSUPPORTED_LANGUAGE";
pub const STORE_ERROR: &str = "STORE_ERROR";
