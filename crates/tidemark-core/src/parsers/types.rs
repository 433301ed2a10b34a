//! Parser types - Core data structures for structural extraction

use serde::{Deserialize, Serialize};

/// Languages with a structural adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    JavaScript,
    Python,
    Java,
    CSharp,
    Php,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::TypeScript,
        Language::JavaScript,
        Language::Python,
        Language::Java,
        Language::CSharp,
        Language::Php,
    ];

    /// Get language from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ts" | "tsx" | "mts" | "cts" => Some(Language::TypeScript),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "py" | "pyi" => Some(Language::Python),
            "java" => Some(Language::Java),
            "cs" => Some(Language::CSharp),
            "php" => Some(Language::Php),
            _ => None,
        }
    }

    /// Get language from file path
    pub fn from_path(path: &str) -> Option<Self> {
        let file_name = path.rsplit(['/', '\\']).next()?;
        let (_, ext) = file_name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Java => "java",
            Language::CSharp => "csharp",
            Language::Php => "php",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Position in source code. Lines are 1-based, columns 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// Range in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start: Position { line: start_line, column: start_col },
            end: Position { line: end_line, column: end_col },
        }
    }

    /// A single-line range starting at `column`.
    pub fn at(line: u32, column: u32) -> Self {
        Self::new(line, column, line, column)
    }
}

/// A function/method extracted from source code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    /// Function name
    pub name: String,
    /// Full qualified name (e.g., "ClassName.methodName")
    pub qualified_name: Option<String>,
    /// Parameters, in order
    pub parameters: Vec<ParameterInfo>,
    /// Declared return type (if available)
    pub return_type: Option<String>,
    /// Modifier keywords (public, static, abstract, ...)
    pub modifiers: Vec<String>,
    /// Decorators/attributes, without the `@`/brackets
    pub decorators: Vec<String>,
    pub is_async: bool,
    pub is_static: bool,
    /// Is this a generator?
    pub is_generator: bool,
    /// Is this function exported/public?
    pub is_exported: bool,
    /// Docstring or leading doc comment, markers stripped
    pub doc_comment: Option<String>,
    pub range: Range,
}

impl FunctionInfo {
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }
}

/// Parameter information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub type_annotation: Option<String>,
    pub default_value: Option<String>,
    /// `*args`, `...rest`, `params T[]`, `...$rest`
    pub is_rest: bool,
}

impl ParameterInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_annotation: None,
            default_value: None,
            is_rest: false,
        }
    }
}

/// A class or interface extracted from source code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    /// Base classes and implemented interfaces, in source order
    pub bases: Vec<String>,
    /// Superclass, when the syntax tells it apart from interfaces
    pub extends: Option<String>,
    pub implements: Vec<String>,
    /// Member method names
    pub methods: Vec<String>,
    /// Fields and properties declared in the body
    pub properties: Vec<PropertyInfo>,
    pub decorators: Vec<String>,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub is_exported: bool,
    pub range: Range,
}

/// Field or property of a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub name: String,
    pub type_annotation: Option<String>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_readonly: bool,
    pub range: Range,
}

/// Visibility modifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Protected,
}

impl Visibility {
    /// First visibility keyword among `modifiers`.
    pub fn from_modifiers<S: AsRef<str>>(modifiers: &[S]) -> Option<Self> {
        modifiers.iter().find_map(|m| match m.as_ref() {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "protected" => Some(Visibility::Protected),
            _ => None,
        })
    }

    /// Python naming convention: `__x` is private, `_x` protected.
    pub fn from_python_name(name: &str) -> Self {
        if name.starts_with("__") && !name.ends_with("__") {
            Visibility::Private
        } else if name.starts_with('_') {
            Visibility::Protected
        } else {
            Visibility::Public
        }
    }
}

/// Import/use declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportInfo {
    /// Module or namespace being imported from
    pub source: String,
    /// Imported names, if the syntax lists them
    pub names: Vec<String>,
    /// Default import name
    pub default: Option<String>,
    /// Namespace or module alias (`* as ns`, `import x as ns`)
    pub namespace: Option<String>,
    /// `import type`, or an import only evaluated for type checking
    pub is_type_only: bool,
    pub range: Range,
}

impl ImportInfo {
    pub fn new(source: String, names: Vec<String>, range: Range) -> Self {
        Self {
            source,
            names,
            default: None,
            namespace: None,
            is_type_only: false,
            range,
        }
    }
}

/// Export statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportInfo {
    /// Exported name
    pub name: String,
    /// Local name, when renamed on export
    pub original_name: Option<String>,
    /// Module of a re-export
    pub from_source: Option<String>,
    pub is_type_only: bool,
    pub is_default: bool,
    pub range: Range,
}

/// Call or object construction site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    /// Name of the function, method or constructed type
    pub callee: String,
    /// Receiver expression text (e.g., "this.db", "prisma.user")
    pub receiver: Option<String>,
    /// Number of arguments
    pub arg_count: usize,
    /// Unquoted string-literal arguments, in order
    pub string_args: Vec<String>,
    /// Raw argument list text, including parentheses
    pub args_text: String,
    /// `new X(...)` rather than a call
    pub is_constructor: bool,
    /// Location of the call
    pub range: Range,
}

/// Result of a structural parse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResult {
    pub language: Language,
    pub functions: Vec<FunctionInfo>,
    pub classes: Vec<ClassInfo>,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    pub calls: Vec<CallSite>,
    /// ERROR and MISSING nodes in the tree
    pub error_nodes: usize,
    /// Bytes of source covered by ERROR nodes
    pub error_bytes: usize,
    /// Source length in bytes
    pub source_bytes: usize,
    /// Parse duration in microseconds
    pub parse_time_us: u64,
}

impl ParseResult {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            functions: Vec::new(),
            classes: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            calls: Vec::new(),
            error_nodes: 0,
            error_bytes: 0,
            source_bytes: 0,
            parse_time_us: 0,
        }
    }

    pub fn item_count(&self) -> usize {
        self.functions.len() + self.classes.len() + self.imports.len() + self.calls.len()
    }

    /// Share of the source the grammar understood, 0-100.
    pub fn coverage_percent(&self) -> f32 {
        if self.source_bytes == 0 {
            return 100.0;
        }
        let clean = self.source_bytes.saturating_sub(self.error_bytes);
        (clean as f32 / self.source_bytes as f32) * 100.0
    }

    /// Heuristic confidence of the structural tier for this file.
    ///
    /// 0.95 for a clean tree, reduced by the share of source inside ERROR
    /// nodes and by 0.1 per error node (at most four counted).
    pub fn confidence(&self) -> f32 {
        let coverage = self.coverage_percent() / 100.0;
        let penalty = 0.1 * self.error_nodes.min(4) as f32;
        (0.95 * coverage - penalty).clamp(0.1, 0.95)
    }
}
