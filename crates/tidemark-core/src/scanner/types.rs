//! Scanner types

use serde::{Deserialize, Serialize};

use crate::config::ScanConfig;

/// Configuration for the default file walker
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Glob patterns to include (e.g., "**/*.ts")
    pub include: Vec<String>,
    /// Additional patterns to ignore (beyond defaults)
    pub extra_ignores: Vec<String>,
    /// Maximum file size to return (bytes)
    pub max_file_size: u64,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

impl From<&ScanConfig> for WalkerConfig {
    fn from(scan: &ScanConfig) -> Self {
        Self {
            include: scan.effective_include(),
            extra_ignores: scan.ignore.clone(),
            max_file_size: scan.effective_max_file_size(),
        }
    }
}

/// Files discovered by a walk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalkOutput {
    /// Paths relative to the root, `/`-separated, sorted
    pub files: Vec<String>,
    /// Files skipped for size
    pub files_skipped: usize,
    /// Non-fatal errors (unreadable directories, metadata failures)
    pub errors: Vec<String>,
}
