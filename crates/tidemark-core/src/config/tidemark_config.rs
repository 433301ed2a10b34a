//! Top-level Tidemark configuration with layered resolution.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ExtractionConfig, LearningConfig, ScanConfig};
use crate::errors::ConfigError;

/// Name of the project config file looked up in the scan root.
pub const PROJECT_CONFIG_FILE: &str = "tidemark.toml";

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. Explicit overrides (applied via `ConfigOverrides`)
/// 2. Environment variables (`TIDEMARK_*`)
/// 3. Project config (`tidemark.toml` in the scan root)
/// 4. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TidemarkConfig {
    pub scan: ScanConfig,
    pub extraction: ExtractionConfig,
    pub learning: LearningConfig,
}

/// Caller-supplied overrides, highest priority.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub skip_learning: Option<bool>,
    pub verbose: Option<bool>,
    pub threads: Option<usize>,
    pub include: Option<Vec<String>>,
}

impl TidemarkConfig {
    /// Load configuration for a scan rooted at `root`.
    pub fn load(root: &Path, overrides: Option<&ConfigOverrides>) -> Result<Self, ConfigError> {
        if !root.is_dir() {
            return Err(ConfigError::RootNotFound {
                path: root.display().to_string(),
            });
        }

        let mut config = Self::default();

        let project_config_path = root.join(PROJECT_CONFIG_FILE);
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        Self::apply_env_overrides(&mut config);

        if let Some(overrides) = overrides {
            Self::apply_overrides(&mut config, overrides);
        }

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate the configuration values.
    pub fn validate(config: &TidemarkConfig) -> Result<(), ConfigError> {
        if let Some(threshold) = config.learning.dominance_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::ValidationFailed {
                    field: "learning.dominance_threshold".to_string(),
                    message: "must be between 0.0 and 1.0".to_string(),
                });
            }
        }
        if let Some(ratio) = config.learning.min_file_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ConfigError::ValidationFailed {
                    field: "learning.min_file_ratio".to_string(),
                    message: "must be between 0.0 and 1.0".to_string(),
                });
            }
        }
        if let Some(min) = config.extraction.min_structural_confidence {
            if !(0.0..=1.0).contains(&min) {
                return Err(ConfigError::ValidationFailed {
                    field: "extraction.min_structural_confidence".to_string(),
                    message: "must be between 0.0 and 1.0".to_string(),
                });
            }
        }
        if config.extraction.parse_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "extraction.parse_timeout_ms".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.scan.max_file_size == Some(0) {
            return Err(ConfigError::ValidationFailed {
                field: "scan.max_file_size".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Merge a TOML file into the existing config.
    /// Unknown keys are silently ignored.
    fn merge_toml_file(config: &mut TidemarkConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let file_config: TidemarkConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`; `other` wins wherever it has a value.
    fn merge(base: &mut TidemarkConfig, other: &TidemarkConfig) {
        // Scan
        if !other.scan.include.is_empty() {
            base.scan.include = other.scan.include.clone();
        }
        if !other.scan.ignore.is_empty() {
            base.scan.ignore = other.scan.ignore.clone();
        }
        if other.scan.threads.is_some() {
            base.scan.threads = other.scan.threads;
        }
        if other.scan.max_file_size.is_some() {
            base.scan.max_file_size = other.scan.max_file_size;
        }
        if other.scan.skip_learning.is_some() {
            base.scan.skip_learning = other.scan.skip_learning;
        }
        if other.scan.verbose.is_some() {
            base.scan.verbose = other.scan.verbose;
        }

        // Extraction
        if other.extraction.structural_enabled.is_some() {
            base.extraction.structural_enabled = other.extraction.structural_enabled;
        }
        if other.extraction.pattern_enabled.is_some() {
            base.extraction.pattern_enabled = other.extraction.pattern_enabled;
        }
        if other.extraction.supplement_with_patterns.is_some() {
            base.extraction.supplement_with_patterns = other.extraction.supplement_with_patterns;
        }
        if other.extraction.parse_timeout_ms.is_some() {
            base.extraction.parse_timeout_ms = other.extraction.parse_timeout_ms;
        }
        if other.extraction.min_structural_confidence.is_some() {
            base.extraction.min_structural_confidence =
                other.extraction.min_structural_confidence;
        }

        // Learning
        if other.learning.min_tables.is_some() {
            base.learning.min_tables = other.learning.min_tables;
        }
        if other.learning.min_files.is_some() {
            base.learning.min_files = other.learning.min_files;
        }
        if other.learning.min_file_ratio.is_some() {
            base.learning.min_file_ratio = other.learning.min_file_ratio;
        }
        if other.learning.dominance_threshold.is_some() {
            base.learning.dominance_threshold = other.learning.dominance_threshold;
        }
    }

    /// Apply environment variable overrides.
    /// Pattern: `TIDEMARK_SCAN_THREADS`, `TIDEMARK_LEARNING_MIN_TABLES`, etc.
    fn apply_env_overrides(config: &mut TidemarkConfig) {
        if let Ok(val) = std::env::var("TIDEMARK_SCAN_THREADS") {
            if let Ok(v) = val.parse::<usize>() {
                config.scan.threads = Some(v);
            }
        }
        if let Ok(val) = std::env::var("TIDEMARK_SCAN_SKIP_LEARNING") {
            if let Ok(v) = val.parse::<bool>() {
                config.scan.skip_learning = Some(v);
            }
        }
        if let Ok(val) = std::env::var("TIDEMARK_SCAN_VERBOSE") {
            if let Ok(v) = val.parse::<bool>() {
                config.scan.verbose = Some(v);
            }
        }
        if let Ok(val) = std::env::var("TIDEMARK_EXTRACTION_PARSE_TIMEOUT_MS") {
            if let Ok(v) = val.parse::<u64>() {
                config.extraction.parse_timeout_ms = Some(v);
            }
        }
        if let Ok(val) = std::env::var("TIDEMARK_LEARNING_MIN_TABLES") {
            if let Ok(v) = val.parse::<usize>() {
                config.learning.min_tables = Some(v);
            }
        }
        if let Ok(val) = std::env::var("TIDEMARK_LEARNING_DOMINANCE_THRESHOLD") {
            if let Ok(v) = val.parse::<f64>() {
                config.learning.dominance_threshold = Some(v);
            }
        }
    }

    fn apply_overrides(config: &mut TidemarkConfig, overrides: &ConfigOverrides) {
        if let Some(v) = overrides.skip_learning {
            config.scan.skip_learning = Some(v);
        }
        if let Some(v) = overrides.verbose {
            config.scan.verbose = Some(v);
        }
        if let Some(v) = overrides.threads {
            config.scan.threads = Some(v);
        }
        if let Some(ref v) = overrides.include {
            config.scan.include = v.clone();
        }
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TidemarkConfig::default();
        assert!(config.extraction.effective_structural_enabled());
        assert!(config.extraction.effective_pattern_enabled());
        assert_eq!(config.learning.effective_min_tables(), 3);
        assert!((config.learning.effective_dominance_threshold() - 0.60).abs() < f64::EPSILON);
        assert_eq!(config.scan.effective_include(), vec!["**/*".to_string()]);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = TidemarkConfig::from_toml(
            r#"
            [scan]
            skip_learning = true

            [learning]
            min_tables = 5
            "#,
        )
        .unwrap();
        assert!(config.scan.effective_skip_learning());
        assert_eq!(config.learning.effective_min_tables(), 5);
        assert_eq!(config.extraction.effective_parse_timeout_ms(), 2000);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let err = TidemarkConfig::from_toml("[learning]\ndominance_threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationFailed { .. }));
    }

    #[test]
    fn test_load_missing_root_is_fatal() {
        let err = TidemarkConfig::load(Path::new("/definitely/not/here"), None).unwrap_err();
        assert!(matches!(err, ConfigError::RootNotFound { .. }));
    }

    #[test]
    fn test_project_file_then_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[scan]\nverbose = false\ninclude = [\"src/**\"]\n",
        )
        .unwrap();

        let overrides = ConfigOverrides {
            verbose: Some(true),
            ..Default::default()
        };
        let config = TidemarkConfig::load(dir.path(), Some(&overrides)).unwrap();
        assert!(config.scan.effective_verbose());
        assert_eq!(config.scan.include, vec!["src/**".to_string()]);
    }

    #[test]
    fn test_round_trips_through_toml() {
        let mut config = TidemarkConfig::default();
        config.learning.min_tables = Some(7);
        let text = config.to_toml().unwrap();
        let back = TidemarkConfig::from_toml(&text).unwrap();
        assert_eq!(back.learning.min_tables, Some(7));
    }
}
