//! Hybrid extraction: structural tree-sitter parsing with pattern-rule
//! fallback, merged under one quality record.

pub mod adapter;
pub mod hybrid;
pub mod pattern;
pub mod quality;
pub mod result;
pub mod rules;

pub use adapter::{Extractor, LanguageAdapter};
pub use hybrid::HybridExtractor;
pub use pattern::extract_patterns;
pub use quality::{ExtractionMethod, ExtractionQuality, TierBreakdown};
pub use result::ExtractionResult;
pub use rules::{rule_set, ArtifactKind, PatternRule, RuleSet, RuleSpec};
