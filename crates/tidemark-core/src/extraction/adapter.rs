//! Language adapters: one closed enum behind the `Extractor` trait.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

use super::hybrid::HybridExtractor;
use super::pattern::extract_patterns;
use super::result::ExtractionResult;
use super::rules::{rule_set, RuleSet};
use crate::errors::ExtractionError;
use crate::parsers::{Language, ParserManager};

thread_local! {
    /// tree-sitter parsers are not `Sync`; every worker keeps its own.
    static PARSERS: RefCell<ParserManager> = RefCell::new(ParserManager::new());
}

/// Anything that turns source text into an `ExtractionResult`.
///
/// Implementations never fail: problems are reported through the
/// result's quality.
pub trait Extractor {
    fn extract(&self, source: &str, path: &str) -> ExtractionResult;
}

/// Extraction adapter per supported language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageAdapter {
    Python,
    Java,
    CSharp,
    TypeScript,
    JavaScript,
    Php,
}

impl LanguageAdapter {
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::Python => Self::Python,
            Language::Java => Self::Java,
            Language::CSharp => Self::CSharp,
            Language::TypeScript => Self::TypeScript,
            Language::JavaScript => Self::JavaScript,
            Language::Php => Self::Php,
        }
    }

    /// Adapter for a file path, by extension.
    pub fn for_path(path: &str) -> Option<Self> {
        Language::from_path(path).map(Self::for_language)
    }

    pub fn language(&self) -> Language {
        match self {
            Self::Python => Language::Python,
            Self::Java => Language::Java,
            Self::CSharp => Language::CSharp,
            Self::TypeScript => Language::TypeScript,
            Self::JavaScript => Language::JavaScript,
            Self::Php => Language::Php,
        }
    }

    pub fn rules(&self) -> &'static RuleSet {
        rule_set(self.language())
    }

    /// Structural tier: parse with this thread's tree-sitter parser.
    ///
    /// A panic inside the grammar is caught and the thread's parsers are
    /// rebuilt before the next file.
    pub fn extract_structural(
        &self,
        source: &str,
        path: &str,
        timeout_ms: u64,
    ) -> Result<ExtractionResult, ExtractionError> {
        let language = self.language();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            PARSERS.with(|parsers| parsers.borrow_mut().parse(language, path, source, timeout_ms))
        }));

        match outcome {
            Ok(parse) => parse.map(|p| ExtractionResult::from_parse(path, p)),
            Err(_) => {
                PARSERS.with(|parsers| {
                    if let Ok(mut parsers) = parsers.try_borrow_mut() {
                        *parsers = ParserManager::new();
                    }
                });
                Err(ExtractionError::ParserFailed {
                    file: path.to_string(),
                    message: "parser panicked".to_string(),
                })
            }
        }
    }

    /// Pattern tier.
    pub fn extract_patterns(&self, source: &str, path: &str) -> ExtractionResult {
        extract_patterns(self.language(), source, path)
    }
}

impl Extractor for LanguageAdapter {
    /// Hybrid extraction with default settings.
    fn extract(&self, source: &str, path: &str) -> ExtractionResult {
        HybridExtractor::default().extract_with(*self, source, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractionMethod;

    #[test]
    fn test_for_path() {
        assert_eq!(LanguageAdapter::for_path("app/models.py"), Some(LanguageAdapter::Python));
        assert_eq!(LanguageAdapter::for_path("web/index.jsx"), Some(LanguageAdapter::JavaScript));
        assert_eq!(LanguageAdapter::for_path("schema.prisma"), None);
        for language in Language::ALL {
            assert_eq!(LanguageAdapter::for_language(language).language(), language);
        }
    }

    #[test]
    fn test_structural_tier() {
        let result = LanguageAdapter::Java
            .extract_structural("class A { void run() { repo.save(x); } }", "A.java", 2000)
            .unwrap();
        assert_eq!(result.quality.method, ExtractionMethod::Structural);
        assert_eq!(result.classes[0].name, "A");
        assert!(result.calls.iter().any(|c| c.callee == "save"));
    }

    #[test]
    fn test_extractor_trait() {
        let extractor: &dyn Extractor = &LanguageAdapter::Python;
        let result = extractor.extract("def f():\n    return db.query(User)\n", "f.py");
        assert_eq!(result.functions[0].name, "f");
        assert!(!result.quality.used_fallback);
    }
}
