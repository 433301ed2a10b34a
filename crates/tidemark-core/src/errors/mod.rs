//! Error handling for Tidemark.
//! One error enum per subsystem, `thiserror` only.

pub mod config_error;
pub mod error_code;
pub mod extraction_error;
pub mod pipeline_error;
pub mod scan_error;
pub mod store_error;

pub use config_error::ConfigError;
pub use error_code::TidemarkErrorCode;
pub use extraction_error::ExtractionError;
pub use pipeline_error::PipelineError;
pub use scan_error::ScanError;
pub use store_error::StoreError;
