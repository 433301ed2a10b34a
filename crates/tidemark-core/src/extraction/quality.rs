//! Extraction quality: the confidence record threaded through every result.

use serde::{Deserialize, Serialize};

/// Which tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Structural,
    Pattern,
    Heuristic,
    Hybrid,
}

/// Per-tier contribution, kept when tiers are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierBreakdown {
    pub structural_items: usize,
    pub pattern_items: usize,
    pub structural_confidence: Option<f32>,
    pub pattern_confidence: Option<f32>,
}

impl TierBreakdown {
    fn of(quality: &ExtractionQuality) -> Self {
        if let Some(ref breakdown) = quality.tier_breakdown {
            return breakdown.clone();
        }
        let mut breakdown = Self::default();
        match quality.method {
            ExtractionMethod::Structural => {
                breakdown.structural_items = quality.items_extracted;
                breakdown.structural_confidence = Some(quality.confidence);
            }
            _ => {
                breakdown.pattern_items = quality.items_extracted;
                breakdown.pattern_confidence = Some(quality.confidence);
            }
        }
        breakdown
    }

    fn combine(&self, other: &Self) -> Self {
        Self {
            structural_items: self.structural_items + other.structural_items,
            pattern_items: self.pattern_items + other.pattern_items,
            structural_confidence: self.structural_confidence.or(other.structural_confidence),
            pattern_confidence: self.pattern_confidence.or(other.pattern_confidence),
        }
    }
}

/// Metadata describing how well one file was extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionQuality {
    /// Heuristic scalar in [0, 1]
    pub confidence: f32,
    pub method: ExtractionMethod,
    /// Share of the source the tier understood, 0-100
    pub coverage_percent: f32,
    pub items_extracted: usize,
    pub parse_errors: Vec<String>,
    pub warnings: Vec<String>,
    pub used_fallback: bool,
    pub extraction_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_breakdown: Option<TierBreakdown>,
}

impl ExtractionQuality {
    /// Quality of a file nothing could be extracted from.
    pub fn empty(method: ExtractionMethod) -> Self {
        Self {
            confidence: 0.0,
            method,
            coverage_percent: 0.0,
            items_extracted: 0,
            parse_errors: Vec::new(),
            warnings: Vec::new(),
            used_fallback: false,
            extraction_time_ms: 0,
            tier_breakdown: None,
        }
    }

    pub fn new(method: ExtractionMethod, confidence: f32, coverage_percent: f32, items: usize) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            coverage_percent: coverage_percent.clamp(0.0, 100.0),
            items_extracted: items,
            ..Self::empty(method)
        }
    }

    /// Combine the qualities of two tiers that both ran on the same file.
    ///
    /// Confidence is the item-weighted average. A side with no items
    /// carries no weight, so the other side comes back unchanged.
    pub fn merge(&self, other: &ExtractionQuality) -> ExtractionQuality {
        if self.items_extracted == 0 {
            return other.clone();
        }
        if other.items_extracted == 0 {
            return self.clone();
        }

        let total = (self.items_extracted + other.items_extracted) as f32;
        let weight_a = self.items_extracted as f32 / total;
        let weight_b = other.items_extracted as f32 / total;

        let mut parse_errors = self.parse_errors.clone();
        parse_errors.extend(other.parse_errors.iter().cloned());
        let mut warnings = self.warnings.clone();
        warnings.extend(other.warnings.iter().cloned());

        ExtractionQuality {
            confidence: self.confidence * weight_a + other.confidence * weight_b,
            method: ExtractionMethod::Hybrid,
            coverage_percent: self.coverage_percent.max(other.coverage_percent),
            items_extracted: self.items_extracted + other.items_extracted,
            parse_errors,
            warnings,
            used_fallback: true,
            extraction_time_ms: self.extraction_time_ms + other.extraction_time_ms,
            tier_breakdown: Some(TierBreakdown::of(self).combine(&TierBreakdown::of(other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_weights_by_items() {
        let structural = ExtractionQuality::new(ExtractionMethod::Structural, 0.9, 80.0, 30);
        let mut pattern = ExtractionQuality::new(ExtractionMethod::Pattern, 0.5, 95.0, 10);
        pattern.warnings.push("rule skipped".to_string());

        let merged = structural.merge(&pattern);
        assert!((merged.confidence - 0.8).abs() < 1e-6);
        assert_eq!(merged.method, ExtractionMethod::Hybrid);
        assert_eq!(merged.items_extracted, 40);
        assert!((merged.coverage_percent - 95.0).abs() < 1e-6);
        assert!(merged.used_fallback);
        assert_eq!(merged.warnings, vec!["rule skipped".to_string()]);

        let breakdown = merged.tier_breakdown.unwrap();
        assert_eq!(breakdown.structural_items, 30);
        assert_eq!(breakdown.pattern_items, 10);
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let pattern = ExtractionQuality::new(ExtractionMethod::Pattern, 0.6, 40.0, 4);
        let empty = ExtractionQuality::empty(ExtractionMethod::Structural);

        assert_eq!(empty.merge(&pattern), pattern);
        assert_eq!(pattern.merge(&empty), pattern);
    }
}
