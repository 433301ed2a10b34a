//! Convention learning configuration.
//!
//! The thresholds are tunables. Their defaults are starting points, not
//! calibrated values.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LearningConfig {
    /// Distinct tables required before learned conventions are trusted. Default: 3.
    pub min_tables: Option<usize>,
    /// Files that must contribute evidence. Default: 1.
    pub min_files: Option<usize>,
    /// Fraction of scanned files that must contribute evidence. Default: 0.01.
    pub min_file_ratio: Option<f64>,
    /// Share of framework evidence needed to call a framework primary. Default: 0.60.
    pub dominance_threshold: Option<f64>,
}

impl LearningConfig {
    pub fn effective_min_tables(&self) -> usize {
        self.min_tables.unwrap_or(3)
    }

    pub fn effective_min_files(&self) -> usize {
        self.min_files.unwrap_or(1)
    }

    pub fn effective_min_file_ratio(&self) -> f64 {
        self.min_file_ratio.unwrap_or(0.01)
    }

    pub fn effective_dominance_threshold(&self) -> f64 {
        self.dominance_threshold.unwrap_or(0.60)
    }
}
