//! Hybrid extraction configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the structural and pattern extraction tiers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Run tree-sitter parsing when a grammar exists. Default: true.
    pub structural_enabled: Option<bool>,
    /// Run pattern rules as fallback. Default: true.
    pub pattern_enabled: Option<bool>,
    /// Always run pattern rules, even after a clean structural parse. Default: false.
    pub supplement_with_patterns: Option<bool>,
    /// Per-file structural parse budget in milliseconds. Default: 2000.
    pub parse_timeout_ms: Option<u64>,
    /// Structural confidence under which a parse counts as incomplete
    /// and pattern rules run as well. Default: 0.5.
    pub min_structural_confidence: Option<f32>,
}

impl ExtractionConfig {
    pub fn effective_structural_enabled(&self) -> bool {
        self.structural_enabled.unwrap_or(true)
    }

    pub fn effective_pattern_enabled(&self) -> bool {
        self.pattern_enabled.unwrap_or(true)
    }

    pub fn effective_supplement_with_patterns(&self) -> bool {
        self.supplement_with_patterns.unwrap_or(false)
    }

    pub fn effective_parse_timeout_ms(&self) -> u64 {
        self.parse_timeout_ms.unwrap_or(2000)
    }

    pub fn effective_min_structural_confidence(&self) -> f32 {
        self.min_structural_confidence.unwrap_or(0.5)
    }
}
