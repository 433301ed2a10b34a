//! Hybrid extractor: structural first, pattern rules as fallback.

use std::time::Instant;

use super::adapter::{Extractor, LanguageAdapter};
use super::quality::ExtractionMethod;
use super::result::ExtractionResult;
use crate::config::ExtractionConfig;
use crate::errors::ExtractionError;

/// Runs the tiers of one adapter and merges what they find.
#[derive(Debug, Clone, Default)]
pub struct HybridExtractor {
    config: ExtractionConfig,
}

impl HybridExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract `source` with `adapter`. Never fails.
    pub fn extract_with(&self, adapter: LanguageAdapter, source: &str, path: &str) -> ExtractionResult {
        let started = Instant::now();
        let attempt = self
            .config
            .effective_structural_enabled()
            .then(|| adapter.extract_structural(source, path, self.config.effective_parse_timeout_ms()));
        let mut result = self.settle(adapter, source, path, attempt);
        result.quality.extraction_time_ms = started.elapsed().as_millis() as u64;
        result
    }

    /// Combine a structural attempt (`None` when the tier is disabled)
    /// with the pattern tier.
    ///
    /// The pattern tier runs when the structural tier is disabled, failed,
    /// found nothing or scored under `min_structural_confidence`, and
    /// always when `supplement_with_patterns` is set.
    fn settle(
        &self,
        adapter: LanguageAdapter,
        source: &str,
        path: &str,
        attempt: Option<Result<ExtractionResult, ExtractionError>>,
    ) -> ExtractionResult {
        let structural_enabled = attempt.is_some();
        let mut structural_failure = None;
        let structural = match attempt {
            Some(Ok(result)) => Some(result),
            Some(Err(e)) => {
                tracing::debug!(file = path, error = %e, "structural tier failed, falling back");
                structural_failure = Some(e.to_string());
                None
            }
            None => None,
        };

        let incomplete = structural.as_ref().map_or(true, |s| {
            s.item_count() == 0
                || s.quality.confidence < self.config.effective_min_structural_confidence()
        });
        let run_patterns = self.config.effective_pattern_enabled()
            && (incomplete || self.config.effective_supplement_with_patterns());
        let pattern = run_patterns.then(|| adapter.extract_patterns(source, path));

        let mut result = match (structural, pattern) {
            (Some(mut s), Some(p)) if s.item_count() > 0 && p.item_count() > 0 => {
                s.absorb(p);
                s
            }
            (Some(s), Some(p)) if s.item_count() == 0 && p.item_count() > 0 => {
                let mut p = p;
                p.quality.used_fallback = true;
                p
            }
            (Some(s), _) => s,
            (None, Some(p)) => p,
            (None, None) => {
                let method = if structural_enabled {
                    ExtractionMethod::Structural
                } else {
                    ExtractionMethod::Pattern
                };
                ExtractionResult::empty(path, Some(adapter.language()), method)
            }
        };

        if let Some(warning) = structural_failure {
            result.quality.warnings.push(warning);
            result.quality.used_fallback = true;
        }
        result
    }
}

impl Extractor for HybridExtractor {
    /// Dispatch on the path's extension. Unsupported files yield an
    /// empty result.
    fn extract(&self, source: &str, path: &str) -> ExtractionResult {
        match LanguageAdapter::for_path(path) {
            Some(adapter) => self.extract_with(adapter, source, path),
            None => ExtractionResult::empty(path, None, ExtractionMethod::Heuristic),
        }
    }
}
