//! Boundaries module - Data access, ORM model and sensitive field detection
//!
//! Structural call sites come first. Regex is used for:
//! - SQL strings embedded in code and SQL files
//! - Schema and entity declarations
//! - Sensitive field names

pub mod access;
mod detector;
mod models;
mod sensitive;
pub mod sql;
mod store;
pub mod tables;
mod types;

pub use detector::{BoundaryDetector, FileDetector, FileRecords, ScanPhase};
pub use models::detect_models;
pub use sensitive::{SensitiveFieldDetector, TABLE_HINT_LOOKBACK};
pub use store::{BoundaryStore, InMemoryStore, JsonFileStore, TableRule, ACCESS_MAP_FILE, STORE_DIR};
pub use tables::{access_confidence, TableResolver};
pub use types::*;
