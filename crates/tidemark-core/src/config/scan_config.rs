//! Scan configuration.

use serde::{Deserialize, Serialize};

/// Configuration for corpus discovery and the scan driver.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScanConfig {
    /// Glob patterns to include. Default: every file.
    #[serde(default)]
    pub include: Vec<String>,
    /// Extra gitignore-style patterns to skip, on top of the defaults.
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Worker threads. Default: 0 (rayon decides).
    pub threads: Option<usize>,
    /// Maximum file size in bytes. Default: 1 MiB.
    pub max_file_size: Option<u64>,
    /// Skip the learning pass and use generic rules only. Default: false.
    pub skip_learning: Option<bool>,
    /// Verbose logging. Default: false.
    pub verbose: Option<bool>,
}

impl ScanConfig {
    pub fn effective_include(&self) -> Vec<String> {
        if self.include.is_empty() {
            vec!["**/*".to_string()]
        } else {
            self.include.clone()
        }
    }

    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or(0)
    }

    pub fn effective_max_file_size(&self) -> u64 {
        self.max_file_size.unwrap_or(1024 * 1024)
    }

    pub fn effective_skip_learning(&self) -> bool {
        self.skip_learning.unwrap_or(false)
    }

    pub fn effective_verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }
}
