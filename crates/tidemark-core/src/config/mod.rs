//! Configuration system for Tidemark.
//! TOML-based, layered: overrides > env > project file > defaults.

pub mod extraction_config;
pub mod learning_config;
pub mod scan_config;
pub mod tidemark_config;

pub use extraction_config::ExtractionConfig;
pub use learning_config::LearningConfig;
pub use scan_config::ScanConfig;
pub use tidemark_config::{ConfigOverrides, TidemarkConfig};
