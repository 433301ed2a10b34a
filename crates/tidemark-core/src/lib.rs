//! tidemark-core: data boundary detection engine
//!
//! This crate provides:
//! - Scanner: corpus discovery with gitignore-style ignores
//! - Parsers: tree-sitter parsing for Python, Java, C#, TypeScript/JavaScript and PHP
//! - Extraction: structural parsing with pattern-rule fallback
//! - Learning: table conventions learned from the corpus itself
//! - Boundaries: data access, ORM model and sensitive field detection

pub mod boundaries;
pub mod config;
pub mod errors;
pub mod extraction;
pub mod learning;
pub mod parsers;
pub mod scanner;
pub mod tracing;

// Re-exports for convenience
pub use boundaries::{
    AccessMap, BoundaryDetector, BoundaryScanResult, BoundaryStore, DataAccessPoint, DataOperation,
    InMemoryStore, JsonFileStore, OrmFramework, OrmModel, ScanPhase, ScanStats, SensitiveField,
    SensitivityType, TableResolution, Violation,
};
pub use config::{ConfigOverrides, ExtractionConfig, LearningConfig, ScanConfig, TidemarkConfig};
pub use errors::{ConfigError, PipelineError, ScanError, StoreError, TidemarkErrorCode};
pub use extraction::{ExtractionMethod, ExtractionQuality, ExtractionResult, Extractor, HybridExtractor, LanguageAdapter};
pub use learning::{ConventionLearner, LearnedConventions, LearningAccumulator, NamingConvention};
pub use parsers::{CallSite, Language, ParserManager};
pub use scanner::{CancellationToken, DefaultFileWalker, FileWalker};
