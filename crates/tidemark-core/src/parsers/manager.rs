//! Parser manager - one entry point over every language parser

use super::csharp::CSharpParser;
use super::java::JavaParser;
use super::php::PhpParser;
use super::python::PythonParser;
use super::types::*;
use super::typescript::TypeScriptParser;
use crate::errors::ExtractionError;

/// Owns one parser per grammar. Not `Sync`: keep one per thread.
pub struct ParserManager {
    typescript_parser: Option<TypeScriptParser>,
    python_parser: Option<PythonParser>,
    java_parser: Option<JavaParser>,
    csharp_parser: Option<CSharpParser>,
    php_parser: Option<PhpParser>,
}

impl ParserManager {
    /// Create a manager with every grammar that loads.
    pub fn new() -> Self {
        Self {
            typescript_parser: log_unavailable(TypeScriptParser::new()),
            python_parser: log_unavailable(PythonParser::new()),
            java_parser: log_unavailable(JavaParser::new()),
            csharp_parser: log_unavailable(CSharpParser::new()),
            php_parser: log_unavailable(PhpParser::new()),
        }
    }

    /// Check if a language has a working grammar
    pub fn supports(&self, language: Language) -> bool {
        match language {
            Language::TypeScript | Language::JavaScript => self.typescript_parser.is_some(),
            Language::Python => self.python_parser.is_some(),
            Language::Java => self.java_parser.is_some(),
            Language::CSharp => self.csharp_parser.is_some(),
            Language::Php => self.php_parser.is_some(),
        }
    }

    /// Parse `source` as `language` within `timeout_ms`.
    pub fn parse(
        &mut self,
        language: Language,
        file: &str,
        source: &str,
        timeout_ms: u64,
    ) -> Result<ParseResult, ExtractionError> {
        let unavailable = || ExtractionError::GrammarUnavailable {
            language: language.to_string(),
        };
        match language {
            Language::TypeScript | Language::JavaScript => self
                .typescript_parser
                .as_mut()
                .ok_or_else(unavailable)?
                .parse(language, file, source, timeout_ms),
            Language::Python => self
                .python_parser
                .as_mut()
                .ok_or_else(unavailable)?
                .parse(file, source, timeout_ms),
            Language::Java => self
                .java_parser
                .as_mut()
                .ok_or_else(unavailable)?
                .parse(file, source, timeout_ms),
            Language::CSharp => self
                .csharp_parser
                .as_mut()
                .ok_or_else(unavailable)?
                .parse(file, source, timeout_ms),
            Language::Php => self
                .php_parser
                .as_mut()
                .ok_or_else(unavailable)?
                .parse(file, source, timeout_ms),
        }
    }

    /// Parse a file by path
    pub fn parse_file(
        &mut self,
        file: &str,
        source: &str,
        timeout_ms: u64,
    ) -> Result<ParseResult, ExtractionError> {
        let language = Language::from_path(file).ok_or_else(|| {
            ExtractionError::UnsupportedLanguage {
                file: file.to_string(),
            }
        })?;
        self.parse(language, file, source, timeout_ms)
    }
}

impl Default for ParserManager {
    fn default() -> Self {
        Self::new()
    }
}

fn log_unavailable<T>(parser: Result<T, ExtractionError>) -> Option<T> {
    match parser {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::warn!(error = %e, "structural parser unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_languages_supported() {
        let manager = ParserManager::new();
        for language in Language::ALL {
            assert!(manager.supports(language), "{} grammar missing", language);
        }
    }

    #[test]
    fn test_parse_file_by_extension() {
        let mut manager = ParserManager::new();
        let result = manager
            .parse_file("src/hello.py", "def hello():\n    pass\n", 2000)
            .unwrap();
        assert_eq!(result.language, Language::Python);
        assert_eq!(result.functions.len(), 1);

        let result = manager
            .parse_file("src/hello.ts", "export function hello(): void { }", 2000)
            .unwrap();
        assert_eq!(result.language, Language::TypeScript);
        assert_eq!(result.functions.len(), 1);
    }

    #[test]
    fn test_unsupported_extension() {
        let mut manager = ParserManager::new();
        let err = manager.parse_file("schema.prisma", "model User {}", 2000).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedLanguage { .. }));
    }
}
