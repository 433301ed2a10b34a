//! Pattern rule sets, one table per language.
//!
//! Rules are data: adding a framework idiom means adding a row. Capture
//! group names carry meaning for the pattern tier:
//!
//! | kind        | groups                                             |
//! |-------------|----------------------------------------------------|
//! | function    | `name`, `params`, `mods`, `ret`, `async`, `export` |
//! | class       | `name`, `kind`, `bases`, `impls`                   |
//! | import      | `source`, `names`, `wild`                          |
//! | call        | `callee`, `receiver`, `open`, `tagged`, `new`      |
//! | data_access | same as call                                       |
//!
//! `open` marks the character that starts the argument list: `(` or a
//! backtick. `tagged` marks a tagged template with no parentheses.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::parsers::Language;

/// What a rule extracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Function,
    Class,
    Import,
    Call,
    DataAccess,
}

/// Uncompiled rule row
#[derive(Debug, Clone, Copy)]
pub struct RuleSpec {
    pub name: &'static str,
    pub kind: ArtifactKind,
    pub pattern: &'static str,
    /// Confidence reported for every match of this rule
    pub confidence: f32,
}

/// Compiled rule
#[derive(Debug)]
pub struct PatternRule {
    pub name: &'static str,
    pub kind: ArtifactKind,
    pub regex: Regex,
    pub confidence: f32,
}

/// Ordered rules for one language
#[derive(Debug)]
pub struct RuleSet {
    pub language: Language,
    pub rules: Vec<PatternRule>,
}

impl RuleSet {
    fn compile(language: Language, specs: &[&[RuleSpec]]) -> Self {
        let rules = specs
            .iter()
            .flat_map(|group| group.iter())
            .filter_map(|spec| match Regex::new(spec.pattern) {
                Ok(regex) => Some(PatternRule {
                    name: spec.name,
                    kind: spec.kind,
                    regex,
                    confidence: spec.confidence,
                }),
                Err(e) => {
                    tracing::error!(rule = spec.name, error = %e, "pattern rule does not compile");
                    None
                }
            })
            .collect();
        Self { language, rules }
    }

    pub fn of_kind(&self, kind: ArtifactKind) -> impl Iterator<Item = &PatternRule> {
        self.rules.iter().filter(move |r| r.kind == kind)
    }
}

/// Call rules shared by every language. Separators cover `.`, `?.`,
/// `->`, `?->` and `::`.
const CALL_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "member_call",
        kind: ArtifactKind::Call,
        pattern: r"(?P<receiver>[A-Za-z_$][\w$]*(?:(?:\.|\?\.|->|\?->|::)[A-Za-z_$][\w$]*)*)(?:\.|\?\.|->|\?->|::)(?P<callee>[A-Za-z_$][\w$]*)\s*(?:<[\w\s,.<>\[\]]*>)?\s*(?P<open>\()",
        confidence: 0.6,
    },
    RuleSpec {
        name: "chained_call",
        kind: ArtifactKind::Call,
        pattern: r"(?P<receiver>[A-Za-z_$][\w$]*(?:(?:\.|->|::)[A-Za-z_$][\w$]*)*(?:<[\w\s,.<>]*>)?\([^()\n]*\)(?:(?:\.|->)[A-Za-z_$][\w$]*(?:\([^()\n]*\))?)*)(?:\.|\?\.|->|\?->)(?P<callee>[A-Za-z_$][\w$]*)\s*(?P<open>\()",
        confidence: 0.55,
    },
    RuleSpec {
        name: "plain_call",
        kind: ArtifactKind::Call,
        pattern: r"(?:^|[^\w$.>:])(?P<callee>[A-Za-z_$][\w$]*)\s*(?P<open>\()",
        confidence: 0.5,
    },
    RuleSpec {
        name: "constructor",
        kind: ArtifactKind::Call,
        pattern: r"\b(?P<new>new)\s+(?P<callee>[A-Za-z_\\][\w\\.]*)\s*(?:<[\w\s,.<>]*>)?\s*(?P<open>\()",
        confidence: 0.6,
    },
];

const PYTHON_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "python_def",
        kind: ArtifactKind::Function,
        pattern: r"(?m)^[ \t]*(?P<async>async[ \t]+)?def[ \t]+(?P<name>\w+)[ \t]*\((?P<params>[^)]*)\)",
        confidence: 0.75,
    },
    RuleSpec {
        name: "python_class",
        kind: ArtifactKind::Class,
        pattern: r"(?m)^[ \t]*class[ \t]+(?P<name>\w+)[ \t]*(?:\((?P<bases>[^)]*)\))?[ \t]*:",
        confidence: 0.75,
    },
    RuleSpec {
        name: "python_from_import",
        kind: ArtifactKind::Import,
        pattern: r"(?m)^[ \t]*from[ \t]+(?P<source>[\w.]+)[ \t]+import[ \t]+(?P<names>[^\n#]+)",
        confidence: 0.85,
    },
    RuleSpec {
        name: "python_import",
        kind: ArtifactKind::Import,
        pattern: r"(?m)^[ \t]*import[ \t]+(?P<source>[\w.]+)",
        confidence: 0.85,
    },
    RuleSpec {
        name: "python_execute",
        kind: ArtifactKind::DataAccess,
        pattern: r#"(?P<receiver>[A-Za-z_]\w*(?:\.[A-Za-z_]\w*)*)\.(?P<callee>execute|executemany|executescript|raw|mogrify)\s*(?P<open>\()\s*(?:[rbfuRBFU]{0,2})["']"#,
        confidence: 0.75,
    },
    RuleSpec {
        name: "django_manager",
        kind: ArtifactKind::DataAccess,
        pattern: r"(?P<receiver>[A-Z]\w*\.objects)\.(?P<callee>\w+)\s*(?P<open>\()",
        confidence: 0.75,
    },
    RuleSpec {
        name: "sqlalchemy_query",
        kind: ArtifactKind::DataAccess,
        pattern: r"(?P<receiver>(?:self\.)?(?:db\.)?session)\.(?P<callee>query|add|add_all|delete|merge|get|scalars)\s*(?P<open>\()",
        confidence: 0.7,
    },
];

const JAVA_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "java_method",
        kind: ArtifactKind::Function,
        pattern: r"(?m)^[ \t]*(?P<mods>(?:(?:public|private|protected|static|final|abstract|synchronized|native|default)[ \t]+)*)(?:<[^>\n]+>[ \t]+)?(?:(?P<ret>[\w<>\[\],.? ]+?)[ \t]+)?(?P<name>\w+)[ \t]*\((?P<params>[^)]*)\)[ \t]*(?:throws[ \t]+[\w., ]+)?\s*[{;]",
        confidence: 0.65,
    },
    RuleSpec {
        name: "java_type",
        kind: ArtifactKind::Class,
        pattern: r"(?m)^[ \t]*(?:(?:public|private|protected|abstract|final|static|sealed)[ \t]+)*(?P<kind>class|interface|enum|record)[ \t]+(?P<name>\w+)(?:<[^>\n]*>)?(?:\([^)]*\))?(?:[ \t]+extends[ \t]+(?P<bases>[\w.<>, ]+?))?(?:[ \t]+implements[ \t]+(?P<impls>[\w.<>, ]+?))?[ \t]*\{",
        confidence: 0.75,
    },
    RuleSpec {
        name: "java_import",
        kind: ArtifactKind::Import,
        pattern: r"(?m)^[ \t]*import[ \t]+(?:static[ \t]+)?(?P<source>[\w.]+?)(?P<wild>\.\*)?[ \t]*;",
        confidence: 0.85,
    },
    RuleSpec {
        name: "jpa_query",
        kind: ArtifactKind::DataAccess,
        pattern: r#"(?P<receiver>[A-Za-z_]\w*(?:\.[A-Za-z_]\w*)*)\.(?P<callee>createQuery|createNativeQuery|executeQuery|executeUpdate|prepareStatement|queryForObject|queryForList|query|update|execute)\s*(?P<open>\()\s*""#,
        confidence: 0.75,
    },
    RuleSpec {
        name: "spring_repository",
        kind: ArtifactKind::DataAccess,
        pattern: r"(?P<receiver>[a-z]\w*Repository)\.(?P<callee>find\w*|save\w*|delete\w*|count\w*|exists\w*)\s*(?P<open>\()",
        confidence: 0.7,
    },
];

const CSHARP_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "csharp_method",
        kind: ArtifactKind::Function,
        pattern: r"(?m)^[ \t]*(?:\[[^\]\n]*\][ \t]*)*(?P<mods>(?:(?:public|private|protected|internal|static|async|virtual|override|abstract|sealed|partial|extern|new)[ \t]+)+)(?:(?P<ret>[\w<>\[\],.?() ]+?)[ \t]+)?(?P<name>\w+)[ \t]*(?:<[^>\n]*>)?[ \t]*\((?P<params>[^)]*)\)",
        confidence: 0.65,
    },
    RuleSpec {
        name: "csharp_type",
        kind: ArtifactKind::Class,
        pattern: r"(?m)^[ \t]*(?:(?:public|private|protected|internal|abstract|sealed|static|partial)[ \t]+)*(?P<kind>class|interface|record|struct)[ \t]+(?P<name>\w+)(?:<[^>\n]*>)?(?:\([^)]*\))?(?:[ \t]*:[ \t]*(?P<bases>[\w.<>, ]+))?",
        confidence: 0.75,
    },
    RuleSpec {
        name: "csharp_using",
        kind: ArtifactKind::Import,
        pattern: r"(?m)^[ \t]*(?:global[ \t]+)?using[ \t]+(?:static[ \t]+)?(?:\w+[ \t]*=[ \t]*)?(?P<source>[\w.]+)[ \t]*;",
        confidence: 0.85,
    },
    RuleSpec {
        name: "ef_raw_sql",
        kind: ArtifactKind::DataAccess,
        pattern: r#"(?P<receiver>[A-Za-z_]\w*(?:\.[A-Za-z_]\w*)*)\.(?P<callee>ExecuteSqlRaw|ExecuteSqlRawAsync|ExecuteSqlInterpolated|ExecuteSqlInterpolatedAsync|FromSqlRaw|FromSqlInterpolated|SqlQuery|SqlQueryRaw|Query|QueryAsync|QueryFirstOrDefault|QueryFirstOrDefaultAsync|QuerySingle|Execute|ExecuteAsync|ExecuteScalar|ExecuteScalarAsync)\s*(?:<[\w\s,.<>]*>)?\s*(?P<open>\()\s*[$@]{0,2}""#,
        confidence: 0.75,
    },
    RuleSpec {
        name: "ef_dbset_linq",
        kind: ArtifactKind::DataAccess,
        pattern: r"(?P<receiver>[a-z_]\w*\.[A-Z]\w*)\.(?P<callee>Where|FirstOrDefault|FirstOrDefaultAsync|SingleOrDefault|SingleOrDefaultAsync|Find|FindAsync|Add|AddAsync|AddRange|Update|Remove|RemoveRange|ToList|ToListAsync|Any|AnyAsync|Count|CountAsync|Include|OrderBy|Select)\s*(?P<open>\()",
        confidence: 0.7,
    },
];

const TYPESCRIPT_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "ts_function",
        kind: ArtifactKind::Function,
        pattern: r"(?m)^[ \t]*(?P<export>export[ \t]+)?(?:default[ \t]+)?(?P<async>async[ \t]+)?function\*?[ \t]+(?P<name>[\w$]+)[ \t]*(?:<[^>\n]*>)?\((?P<params>[^)]*)\)",
        confidence: 0.75,
    },
    RuleSpec {
        name: "ts_arrow",
        kind: ArtifactKind::Function,
        pattern: r"(?m)^[ \t]*(?P<export>export[ \t]+)?(?:const|let|var)[ \t]+(?P<name>[\w$]+)[ \t]*(?::[^=\n]+)?=[ \t]*(?P<async>async[ \t]+)?(?:\((?P<params>[^)]*)\)|[\w$]+)[ \t]*(?::[^=\n]+)?=>",
        confidence: 0.7,
    },
    RuleSpec {
        name: "ts_class",
        kind: ArtifactKind::Class,
        pattern: r"(?m)^[ \t]*(?:export[ \t]+)?(?:default[ \t]+)?(?:abstract[ \t]+)?(?P<kind>class|interface)[ \t]+(?P<name>[\w$]+)(?:<[^>\n]*>)?(?:[ \t]+extends[ \t]+(?P<bases>[\w$.<>, ]+?))?(?:[ \t]+implements[ \t]+(?P<impls>[\w$.<>, ]+?))?[ \t]*\{",
        confidence: 0.75,
    },
    RuleSpec {
        name: "ts_import",
        kind: ArtifactKind::Import,
        pattern: r#"(?m)^[ \t]*import[ \t]+(?:type[ \t]+)?(?P<names>[^'"\n;]+?)[ \t]+from[ \t]+['"](?P<source>[^'"]+)['"]"#,
        confidence: 0.85,
    },
    RuleSpec {
        name: "ts_side_effect_import",
        kind: ArtifactKind::Import,
        pattern: r#"(?m)^[ \t]*import[ \t]+['"](?P<source>[^'"]+)['"]"#,
        confidence: 0.85,
    },
    RuleSpec {
        name: "js_require",
        kind: ArtifactKind::Import,
        pattern: r#"\brequire\(\s*['"](?P<source>[^'"]+)['"]\s*\)"#,
        confidence: 0.8,
    },
    RuleSpec {
        name: "js_query_call",
        kind: ArtifactKind::DataAccess,
        pattern: r#"(?P<receiver>[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*)\.(?P<callee>query|execute|raw|\$queryRaw|\$executeRaw|\$queryRawUnsafe|\$executeRawUnsafe|unsafe)\s*(?:(?P<open>\()\s*['"`]|(?P<tagged>`))"#,
        confidence: 0.75,
    },
    RuleSpec {
        name: "js_sql_tag",
        kind: ArtifactKind::DataAccess,
        pattern: r"(?:^|[^\w$.])(?P<callee>sql)(?P<open>`)",
        confidence: 0.7,
    },
    RuleSpec {
        name: "prisma_model",
        kind: ArtifactKind::DataAccess,
        pattern: r"(?P<receiver>(?:this\.)?prisma\.[A-Za-z_$][\w$]*)\.(?P<callee>[A-Za-z_$][\w$]*)\s*(?P<open>\()",
        confidence: 0.75,
    },
    RuleSpec {
        name: "supabase_from",
        kind: ArtifactKind::DataAccess,
        pattern: r#"(?P<receiver>[\w$.]*supabase)\.(?P<callee>from)\s*(?P<open>\()\s*['"]"#,
        confidence: 0.75,
    },
];

const PHP_RULES: &[RuleSpec] = &[
    RuleSpec {
        name: "php_function",
        kind: ArtifactKind::Function,
        pattern: r"(?m)^[ \t]*(?P<mods>(?:(?:public|private|protected|static|final|abstract)[ \t]+)*)function[ \t]+&?(?P<name>\w+)[ \t]*\((?P<params>[^)]*)\)",
        confidence: 0.75,
    },
    RuleSpec {
        name: "php_class",
        kind: ArtifactKind::Class,
        pattern: r"(?m)^[ \t]*(?:(?:abstract|final|readonly)[ \t]+)*(?P<kind>class|interface|trait)[ \t]+(?P<name>\w+)(?:[ \t]+extends[ \t]+(?P<bases>[\w\\, ]+?))?(?:[ \t]+implements[ \t]+(?P<impls>[\w\\, ]+?))?[ \t]*(?:\{|$)",
        confidence: 0.75,
    },
    RuleSpec {
        name: "php_use",
        kind: ArtifactKind::Import,
        pattern: r"(?m)^[ \t]*use[ \t]+(?:function[ \t]+|const[ \t]+)?\\?(?P<source>[\w\\]+)(?:[ \t]+as[ \t]+\w+)?[ \t]*;",
        confidence: 0.85,
    },
    RuleSpec {
        name: "laravel_db",
        kind: ArtifactKind::DataAccess,
        pattern: r"(?P<receiver>\\?DB)::(?P<callee>table|select|insert|update|delete|statement|unprepared|raw)\s*(?P<open>\()",
        confidence: 0.75,
    },
    RuleSpec {
        name: "php_pdo",
        kind: ArtifactKind::DataAccess,
        pattern: r#"(?P<receiver>\$[A-Za-z_]\w*(?:->[A-Za-z_]\w*)*)->(?P<callee>query|exec|prepare)\s*(?P<open>\()\s*["']"#,
        confidence: 0.75,
    },
    RuleSpec {
        name: "eloquent_static",
        kind: ArtifactKind::DataAccess,
        pattern: r"(?P<receiver>[A-Z]\w*)::(?P<callee>where|find|findOrFail|all|first|create|insert|update|destroy|query|firstOrCreate|updateOrCreate)\s*(?P<open>\()",
        confidence: 0.7,
    },
];

static PYTHON: Lazy<RuleSet> = Lazy::new(|| RuleSet::compile(Language::Python, &[PYTHON_RULES, CALL_RULES]));
static JAVA: Lazy<RuleSet> = Lazy::new(|| RuleSet::compile(Language::Java, &[JAVA_RULES, CALL_RULES]));
static CSHARP: Lazy<RuleSet> = Lazy::new(|| RuleSet::compile(Language::CSharp, &[CSHARP_RULES, CALL_RULES]));
static TYPESCRIPT: Lazy<RuleSet> =
    Lazy::new(|| RuleSet::compile(Language::TypeScript, &[TYPESCRIPT_RULES, CALL_RULES]));
static JAVASCRIPT: Lazy<RuleSet> =
    Lazy::new(|| RuleSet::compile(Language::JavaScript, &[TYPESCRIPT_RULES, CALL_RULES]));
static PHP: Lazy<RuleSet> = Lazy::new(|| RuleSet::compile(Language::Php, &[PHP_RULES, CALL_RULES]));

/// The rule set for `language`.
pub fn rule_set(language: Language) -> &'static RuleSet {
    match language {
        Language::Python => &PYTHON,
        Language::Java => &JAVA,
        Language::CSharp => &CSHARP,
        Language::TypeScript => &TYPESCRIPT,
        Language::JavaScript => &JAVASCRIPT,
        Language::Php => &PHP,
    }
}

/// Identifiers that look like calls but are syntax.
pub const NON_CALL_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "foreach", "while", "switch", "catch", "return", "function",
    "def", "class", "new", "typeof", "sizeof", "nameof", "except", "with", "lambda", "await",
    "yield", "using", "lock", "fixed", "synchronized", "assert", "not", "and", "or", "in", "is",
    "async", "match", "array", "list", "isset", "empty", "unset", "echo", "print", "when",
    "throw", "do", "try", "finally", "super", "this", "constructor", "fn", "import", "require",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_rule_compiles() {
        let expected = |own: &[RuleSpec]| own.len() + CALL_RULES.len();
        assert_eq!(rule_set(Language::Python).rules.len(), expected(PYTHON_RULES));
        assert_eq!(rule_set(Language::Java).rules.len(), expected(JAVA_RULES));
        assert_eq!(rule_set(Language::CSharp).rules.len(), expected(CSHARP_RULES));
        assert_eq!(rule_set(Language::TypeScript).rules.len(), expected(TYPESCRIPT_RULES));
        assert_eq!(rule_set(Language::JavaScript).rules.len(), expected(TYPESCRIPT_RULES));
        assert_eq!(rule_set(Language::Php).rules.len(), expected(PHP_RULES));
    }

    #[test]
    fn test_every_language_covers_every_kind() {
        let kinds = [
            ArtifactKind::Function,
            ArtifactKind::Class,
            ArtifactKind::Import,
            ArtifactKind::Call,
            ArtifactKind::DataAccess,
        ];
        for language in Language::ALL {
            let set = rule_set(language);
            for kind in kinds {
                assert!(set.of_kind(kind).next().is_some(), "{} lacks {:?} rules", language, kind);
            }
        }
    }

    #[test]
    fn test_confidences_are_probabilities() {
        for language in Language::ALL {
            for rule in &rule_set(language).rules {
                assert!((0.0..=1.0).contains(&rule.confidence), "{}", rule.name);
            }
        }
    }
}
