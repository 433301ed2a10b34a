//! Pattern tier: run a language's rule set over raw source text.
//!
//! Produces the same artifact types as the structural parsers, so the
//! downstream detectors do not care which tier found a call. Each rule
//! runs in isolation; a rule that panics is skipped and reported as a
//! warning.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use regex::Captures;
use rustc_hash::{FxHashMap, FxHashSet};

use super::quality::{ExtractionMethod, ExtractionQuality};
use super::result::ExtractionResult;
use super::rules::{rule_set, ArtifactKind, PatternRule, NON_CALL_KEYWORDS};
use crate::errors::ExtractionError;
use crate::parsers::{
    unquote, CallSite, ClassInfo, FunctionInfo, ImportInfo, Language, ParameterInfo, Position,
    Range,
};

/// Longest argument list scanned for one call.
const MAX_ARGS_BYTES: usize = 8 * 1024;

/// Words that, directly before a plain call, make it a declaration.
const DECLARING_WORDS: &[&str] = &["def", "function", "new", "class", "fn", "interface"];

/// Words a Java/C# return type cannot start with.
const STATEMENT_WORDS: &[&str] = &[
    "return", "new", "throw", "else", "await", "yield", "case", "goto", "var", "let", "const",
];

/// Run every rule of `language` over `source`.
pub fn extract_patterns(language: Language, source: &str, file: &str) -> ExtractionResult {
    let started = Instant::now();
    let index = LineIndex::new(source);
    let mut hits = Vec::new();
    let mut warnings = Vec::new();

    for rule in &rule_set(language).rules {
        match run_rule(rule.name, file, || apply_rule(rule, language, source, &index)) {
            Ok(found) => hits.extend(found),
            Err(e) => warnings.push(e.to_string()),
        }
    }

    let mut result = assemble(file, language, hits, &index);
    result.quality.warnings = warnings;
    result.quality.extraction_time_ms = started.elapsed().as_millis() as u64;
    result
}

/// Run one rule; a panic becomes `RuleFailed` and the other rules go on.
fn run_rule(name: &str, file: &str, apply: impl FnOnce() -> Vec<Hit>) -> Result<Vec<Hit>, ExtractionError> {
    panic::catch_unwind(AssertUnwindSafe(apply)).map_err(|_| {
        tracing::warn!(rule = name, file, "pattern rule panicked, skipped");
        ExtractionError::RuleFailed {
            rule: name.to_string(),
            file: file.to_string(),
        }
    })
}

enum Artifact {
    Function(FunctionInfo),
    Class(ClassInfo),
    Import(ImportInfo),
    Call(CallSite),
}

impl Artifact {
    fn rank(&self) -> u8 {
        match self {
            Artifact::Function(_) => 0,
            Artifact::Class(_) => 1,
            Artifact::Import(_) => 2,
            Artifact::Call(_) => 3,
        }
    }
}

struct Hit {
    artifact: Artifact,
    confidence: f32,
    /// Byte offset that identifies the construct (name or callee)
    anchor: usize,
}

/// Byte offset to (1-based line, 0-based column).
struct LineIndex<'s> {
    source: &'s str,
    starts: Vec<usize>,
}

impl<'s> LineIndex<'s> {
    fn new(source: &'s str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { source, starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset).saturating_sub(1)
    }

    fn position(&self, offset: usize) -> Position {
        let line = self.line_of(offset);
        Position {
            line: line as u32 + 1,
            column: (offset - self.starts[line]) as u32,
        }
    }

    /// Text of the line holding `offset`, without the newline.
    fn line_text(&self, offset: usize) -> &'s str {
        let line = self.line_of(offset);
        let start = self.starts[line];
        let end = self
            .starts
            .get(line + 1)
            .map(|&next| next - 1)
            .unwrap_or(self.source.len());
        &self.source[start..end]
    }

    fn non_blank_lines(&self) -> usize {
        self.source.lines().filter(|l| !l.trim().is_empty()).count()
    }
}

fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    ["//", "#", "/*", "*"]
        .iter()
        .any(|marker| trimmed.starts_with(marker))
}

fn group<'t>(caps: &Captures<'t>, name: &str) -> Option<&'t str> {
    caps.name(name).map(|m| m.as_str()).filter(|s| !s.trim().is_empty())
}

fn apply_rule(rule: &PatternRule, language: Language, source: &str, index: &LineIndex) -> Vec<Hit> {
    let mut hits = Vec::new();
    for caps in rule.regex.captures_iter(source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if is_comment_line(index.line_text(whole.start())) {
            continue;
        }
        let artifact = match rule.kind {
            ArtifactKind::Function => function_from(&caps, language, index),
            ArtifactKind::Class => class_from(&caps, language, index),
            ArtifactKind::Import => import_from(&caps, language, index),
            ArtifactKind::Call | ArtifactKind::DataAccess => call_from(&caps, language, source, index),
        };
        if let Some((artifact, anchor)) = artifact {
            hits.push(Hit {
                artifact,
                confidence: rule.confidence,
                anchor,
            });
        }
    }
    hits
}

/// Range from the first non-blank character of the anchor's line to the
/// end of the match.
fn declaration_range(index: &LineIndex, anchor: usize, end: usize) -> Range {
    let line_text = index.line_text(anchor);
    let indent = line_text.len() - line_text.trim_start().len();
    let start = index.position(anchor);
    let end = index.position(end);
    Range {
        start: Position { line: start.line, column: indent as u32 },
        end,
    }
}

fn function_from(caps: &Captures, language: Language, index: &LineIndex) -> Option<(Artifact, usize)> {
    let name_match = caps.name("name")?;
    let name = name_match.as_str();
    if NON_CALL_KEYWORDS.contains(&name) {
        return None;
    }

    let modifiers: Vec<String> = group(caps, "mods")
        .map(|m| m.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    let ret = group(caps, "ret");
    if matches!(language, Language::Java | Language::CSharp) {
        if modifiers.is_empty() && ret.is_none() {
            return None;
        }
        let first_word = ret.and_then(|r| r.split_whitespace().next()).unwrap_or("");
        if STATEMENT_WORDS.contains(&first_word) {
            return None;
        }
    }

    let has = |m: &str| modifiers.iter().any(|x| x == m);
    let is_exported = match language {
        Language::Python => !name.starts_with('_'),
        Language::TypeScript | Language::JavaScript => caps.name("export").is_some(),
        Language::Java | Language::CSharp => has("public"),
        Language::Php => !has("private") && !has("protected"),
    };

    let parameters = group(caps, "params")
        .map(|p| parse_parameters(language, p))
        .unwrap_or_default();
    let return_type = ret
        .filter(|_| matches!(language, Language::Java | Language::CSharp))
        .map(|r| r.trim().to_string());
    let end = caps.get(0).map(|m| m.end()).unwrap_or(name_match.end());

    let function = FunctionInfo {
        name: name.to_string(),
        qualified_name: None,
        parameters,
        return_type,
        is_async: caps.name("async").is_some() || has("async"),
        is_static: has("static"),
        is_generator: false,
        is_exported,
        decorators: Vec::new(),
        doc_comment: None,
        range: declaration_range(index, name_match.start(), end),
        modifiers,
    };
    Some((Artifact::Function(function), name_match.start()))
}

/// Keywords that can precede a parameter's type without being part of it.
const PARAMETER_KEYWORDS: &[&str] = &[
    "final", "params", "ref", "out", "in", "this", "readonly", "public", "private", "protected",
];

/// Parameters out of a raw parameter list.
fn parse_parameters(language: Language, raw: &str) -> Vec<ParameterInfo> {
    split_top_level(raw)
        .into_iter()
        .filter_map(|param| {
            // `=` of a default, not of `=>` or a comparison.
            let assign = param.match_indices('=').map(|(i, _)| i).find(|&i| {
                !param[i + 1..].starts_with(['>', '='])
                    && !param[..i].ends_with(['!', '<', '>', '='])
            });
            let (decl, default_value) = match assign {
                Some(i) => (&param[..i], Some(param[i + 1..].trim().to_string())),
                None => (param, None),
            };

            let annotated = matches!(
                language,
                Language::Python | Language::TypeScript | Language::JavaScript
            );
            let (decl, mut type_annotation) = match decl.split_once(':') {
                Some((n, t)) if annotated => (n, Some(t.trim().to_string())),
                _ => (decl, None),
            };

            let words: Vec<&str> = decl.split_whitespace().filter(|w| !w.starts_with('@')).collect();
            let (&last, leading) = words.split_last()?;
            if type_annotation.is_none() {
                let ty: Vec<&str> = leading
                    .iter()
                    .copied()
                    .filter(|w| !PARAMETER_KEYWORDS.contains(w))
                    .collect();
                type_annotation = (!ty.is_empty()).then(|| ty.join(" "));
            }

            let is_rest = last.starts_with("...")
                || last.starts_with('*')
                || leading.contains(&"params")
                || type_annotation.as_deref().is_some_and(|t| t.ends_with("..."));
            let name = last
                .trim_start_matches(['*', '&', '.', '$'])
                .trim_end_matches(['?', ']', '['])
                .to_string();
            let is_identifier = name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
            (is_identifier && !name.is_empty() && name != "self" && name != "cls").then(|| {
                ParameterInfo {
                    name,
                    type_annotation: type_annotation.filter(|t| !t.is_empty()),
                    default_value: default_value.filter(|v| !v.is_empty()),
                    is_rest,
                }
            })
        })
        .collect()
}

/// Split on commas that are not nested inside brackets or generics.
fn split_top_level(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' | '>' => depth -= 1,
            ',' if depth <= 0 => {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

fn type_name(raw: &str) -> String {
    raw.split('<')
        .next()
        .unwrap_or(raw)
        .trim()
        .trim_start_matches('\\')
        .to_string()
}

/// `IUnitOfWork`, `IDisposable`: the C# interface naming convention.
fn looks_like_interface(name: &str) -> bool {
    let mut chars = name.rsplit('.').next().unwrap_or(name).chars();
    chars.next() == Some('I') && chars.next().is_some_and(|c| c.is_ascii_uppercase())
}

fn class_from(caps: &Captures, language: Language, index: &LineIndex) -> Option<(Artifact, usize)> {
    let name_match = caps.name("name")?;
    let name = name_match.as_str().to_string();
    let kind = group(caps, "kind").unwrap_or("class");
    let is_interface = kind == "interface";
    let whole = caps.get(0).map(|m| m.as_str()).unwrap_or("");
    let head = whole.split(name_match.as_str()).next().unwrap_or("");

    let names = |g: &str| -> Vec<String> {
        group(caps, g)
            .map(split_top_level)
            .unwrap_or_default()
            .into_iter()
            .filter(|b| !b.contains('='))
            .map(type_name)
            .filter(|b| !b.is_empty())
            .collect()
    };
    let parents = names("bases");
    let interfaces = names("impls");
    let bases = parents.iter().chain(&interfaces).cloned().collect();

    // C# lists the superclass and interfaces together after `:`.
    let (extends, implements) = match language {
        _ if is_interface => (None, parents.into_iter().chain(interfaces).collect()),
        Language::CSharp => {
            let extends = parents.first().filter(|b| !looks_like_interface(b)).cloned();
            let skip = usize::from(extends.is_some());
            (extends, parents.into_iter().skip(skip).chain(interfaces).collect())
        }
        _ => (parents.into_iter().next(), interfaces),
    };

    let is_exported = match language {
        Language::Python => !name.starts_with('_'),
        Language::TypeScript | Language::JavaScript => head.contains("export"),
        Language::Java | Language::CSharp => head.contains("public"),
        Language::Php => true,
    };

    let end = caps.get(0).map(|m| m.end()).unwrap_or(name_match.end());
    let class = ClassInfo {
        name,
        bases,
        extends,
        implements,
        methods: Vec::new(),
        properties: Vec::new(),
        decorators: Vec::new(),
        is_interface,
        is_abstract: is_interface || head.contains("abstract"),
        is_exported,
        range: declaration_range(index, name_match.start(), end),
    };
    Some((Artifact::Class(class), name_match.start()))
}

fn import_from(caps: &Captures, language: Language, index: &LineIndex) -> Option<(Artifact, usize)> {
    let source_match = caps.name("source")?;
    let source = source_match.as_str().to_string();

    let names = match language {
        Language::Java if caps.name("wild").is_some() => vec!["*".to_string()],
        Language::Java => source.rsplit('.').next().map(str::to_string).into_iter().collect(),
        Language::Php => source.rsplit('\\').next().map(str::to_string).into_iter().collect(),
        Language::CSharp => Vec::new(),
        _ => group(caps, "names").map(imported_names).unwrap_or_default(),
    };

    let end = caps.get(0).map(|m| m.end()).unwrap_or(source_match.end());
    let import = ImportInfo::new(source, names, declaration_range(index, source_match.start(), end));
    Some((Artifact::Import(import), source_match.start()))
}

/// `{ a, b as c }, D` -> `[a, c, D]`; `x as y` keeps the local name.
fn imported_names(raw: &str) -> Vec<String> {
    raw.split([',', '{', '}', '(', ')'])
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .filter_map(|n| {
            let local = n.rsplit(" as ").next().unwrap_or(n).trim();
            let local = local.trim_start_matches("type ").trim();
            (local != "*").then(|| local.to_string())
        })
        .collect()
}

fn normalize_receiver(language: Language, raw: &str) -> String {
    match language {
        Language::Php => raw
            .replace("?->", ".")
            .replace("->", ".")
            .replace('$', "")
            .trim_start_matches('\\')
            .to_string(),
        _ => raw.to_string(),
    }
}

fn call_from(
    caps: &Captures,
    language: Language,
    source: &str,
    index: &LineIndex,
) -> Option<(Artifact, usize)> {
    let callee_match = caps.name("callee")?;
    let mut callee = callee_match.as_str().to_string();
    let is_constructor = caps.name("new").is_some();
    let mut receiver = caps.name("receiver").map(|r| normalize_receiver(language, r.as_str()));

    if receiver.is_none() && !is_constructor {
        if NON_CALL_KEYWORDS.contains(&callee.as_str()) {
            return None;
        }
        let line = index.line_text(callee_match.start());
        let column = index.position(callee_match.start()).column as usize;
        let before = line.get(..column).unwrap_or("").trim_end();
        if DECLARING_WORDS.iter().any(|w| before.ends_with(w)) {
            return None;
        }
    }

    if is_constructor {
        if let Some((head, tail)) = callee.rsplit_once('.') {
            receiver = Some(head.to_string());
            callee = tail.to_string();
        } else {
            callee = callee.trim_start_matches('\\').to_string();
        }
    }

    let (arg_count, string_args, args_text) = match (caps.name("open"), caps.name("tagged")) {
        (Some(open), _) if open.as_str() == "(" => scan_arguments(source, open.start()),
        (Some(tick), _) | (None, Some(tick)) => scan_template(source, tick.start()),
        (None, None) => (0, Vec::new(), String::new()),
    };

    let start = caps
        .name("receiver")
        .map(|r| r.start())
        .or_else(|| caps.name("new").map(|n| n.start()))
        .unwrap_or(callee_match.start());
    let end = start + args_text.len().max(callee_match.end() - start);

    let call = CallSite {
        callee,
        receiver: receiver.filter(|r| !r.is_empty()),
        arg_count,
        string_args,
        args_text,
        is_constructor,
        range: Range {
            start: index.position(start),
            end: index.position(end.min(source.len())),
        },
    };
    Some((Artifact::Call(call), callee_match.start()))
}

/// Argument count, string-literal arguments and text of the argument list
/// opening at `open`. Quotes are honored; unbalanced lists stop at the
/// scan limit.
fn scan_arguments(source: &str, open: usize) -> (usize, Vec<String>, String) {
    let bytes = source.as_bytes();
    let limit = (open + MAX_ARGS_BYTES).min(bytes.len());
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    let mut segments = Vec::new();
    let mut segment_start = open + 1;
    let mut end = limit;

    let mut i = open;
    while i < limit {
        let b = bytes[i];
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' | b'`' => quote = Some(b),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    segments.push(&source[segment_start..i]);
                    end = i + 1;
                    break;
                }
            }
            b',' if depth == 1 => {
                segments.push(&source[segment_start..i]);
                segment_start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    let args_text = source.get(open..end).unwrap_or("").to_string();
    let segments: Vec<&str> = segments.into_iter().map(str::trim).filter(|s| !s.is_empty()).collect();
    let strings = segments.iter().filter_map(|s| string_literal(s)).collect();
    (segments.len(), strings, args_text)
}

/// A tagged template: one argument, the template body.
fn scan_template(source: &str, tick: usize) -> (usize, Vec<String>, String) {
    let body_start = tick + 1;
    let close = source[body_start..]
        .find('`')
        .map(|i| body_start + i + 1)
        .unwrap_or(source.len().min(body_start + MAX_ARGS_BYTES));
    let text = source.get(tick..close).unwrap_or("").to_string();
    (1, vec![unquote(&text)], text)
}

/// The unquoted value when `segment` is one string literal, optionally
/// passed as a keyword or named argument.
fn string_literal(segment: &str) -> Option<String> {
    let value = match segment.find(['=', ':']) {
        Some(i)
            if segment[..i].trim().chars().all(|c| c.is_alphanumeric() || c == '_')
                && !segment[..i].trim().is_empty() =>
        {
            segment[i + 1..].trim()
        }
        _ => segment,
    };
    let quote_at = value.find(['"', '\'', '`'])?;
    let prefix = &value[..quote_at];
    if quote_at > 3 || !prefix.chars().all(|c| c.is_ascii_alphabetic() || c == '@' || c == '$') {
        return None;
    }
    let quote = value[quote_at..].chars().next()?;
    if value.len() < quote_at + 2 || !value.ends_with(quote) {
        return None;
    }
    Some(unquote(value))
}

/// Deduplicate hits and build the result.
fn assemble(file: &str, language: Language, hits: Vec<Hit>, index: &LineIndex) -> ExtractionResult {
    let mut result = ExtractionResult::empty(file, Some(language), ExtractionMethod::Pattern);

    // Best hit per anchor. Calls keep the highest confidence.
    let mut best: FxHashMap<(usize, u8), Hit> = FxHashMap::default();
    for hit in hits {
        let key = (hit.anchor, hit.artifact.rank());
        match best.get(&key) {
            Some(existing) if existing.confidence >= hit.confidence => {}
            _ => {
                best.insert(key, hit);
            }
        }
    }

    let mut hits: Vec<Hit> = best.into_values().collect();
    hits.sort_by_key(|h| (h.anchor, h.artifact.rank()));

    let declared: FxHashSet<(String, u32)> = hits
        .iter()
        .filter_map(|h| match &h.artifact {
            Artifact::Function(f) => Some((f.name.clone(), f.range.start.line)),
            Artifact::Class(c) => Some((c.name.clone(), c.range.start.line)),
            _ => None,
        })
        .collect();

    let mut lines = FxHashSet::default();
    let mut confidence_sum = 0.0f32;
    for hit in hits {
        match hit.artifact {
            Artifact::Call(call) => {
                if declared.contains(&(call.callee.clone(), call.range.start.line)) {
                    continue;
                }
                lines.insert(call.range.start.line);
                result.calls.push(call);
            }
            Artifact::Function(f) => {
                lines.insert(f.range.start.line);
                result.functions.push(f);
            }
            Artifact::Class(c) => {
                lines.insert(c.range.start.line);
                result.classes.push(c);
            }
            Artifact::Import(i) => {
                lines.insert(i.range.start.line);
                result.imports.push(i);
            }
        }
        confidence_sum += hit.confidence;
    }

    let items = result.item_count();
    let confidence = if items == 0 {
        0.0
    } else {
        confidence_sum / items as f32
    };
    let coverage = match index.non_blank_lines() {
        0 => 0.0,
        n => lines.len() as f32 / n as f32 * 100.0,
    };
    result.quality = ExtractionQuality::new(ExtractionMethod::Pattern, confidence, coverage, items);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_declarations() {
        let source = r#"
from django.db import models, connection
import os

class Order(models.Model):
    status = models.CharField(max_length=20)

async def load_orders(self, status, limit=10):
    return Order.objects.filter(status=status)
"#;
        let result = extract_patterns(Language::Python, source, "orders.py");

        assert_eq!(result.classes.len(), 1);
        assert_eq!(result.classes[0].name, "Order");
        assert_eq!(result.classes[0].bases, vec!["models.Model"]);

        let load = &result.functions[0];
        assert_eq!(load.name, "load_orders");
        assert_eq!(load.parameter_names(), vec!["status", "limit"]);
        assert_eq!(load.parameters[1].default_value.as_deref(), Some("10"));
        assert!(load.is_async);
        assert_eq!(load.range.start.line, 8);

        assert_eq!(result.imports[0].source, "django.db");
        assert_eq!(result.imports[0].names, vec!["models", "connection"]);
        assert_eq!(result.imports[1].source, "os");

        let filter = result.calls.iter().find(|c| c.callee == "filter").unwrap();
        assert_eq!(filter.receiver.as_deref(), Some("Order.objects"));
        assert_eq!(filter.args_text, "(status=status)");
        assert_eq!(filter.range.start.line, 9);

        // The class line is a declaration, not a call.
        assert!(!result.calls.iter().any(|c| c.callee == "Order"));
        assert_eq!(result.quality.method, ExtractionMethod::Pattern);
        assert!(result.quality.confidence > 0.0);
    }

    #[test]
    fn test_string_arguments() {
        let source = "cursor.execute(\"SELECT id, email FROM users WHERE id = %s\", (user_id,))\n";
        let result = extract_patterns(Language::Python, source, "db.py");

        let execute = result.calls.iter().find(|c| c.callee == "execute").unwrap();
        assert_eq!(execute.arg_count, 2);
        assert_eq!(execute.string_args, vec!["SELECT id, email FROM users WHERE id = %s"]);
        assert_eq!(execute.receiver.as_deref(), Some("cursor"));
        // The data-access rule outranks the generic member rule.
        assert_eq!(result.calls.iter().filter(|c| c.callee == "execute").count(), 1);
    }

    #[test]
    fn test_csharp_chain_and_constructor() {
        let source = r#"
public class OrderService
{
    public OrderService(AppDbContext db) { }

    public async Task<List<Order>> Open(string status)
    {
        var q = _db.Orders.Where(o => o.Status == "open").ToListAsync();
        return new List<Order>();
    }
}
"#;
        let result = extract_patterns(Language::CSharp, source, "OrderService.cs");

        let names: Vec<&str> = result.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["OrderService", "Open"]);
        assert!(result.functions[1].is_async);
        assert_eq!(result.functions[1].parameter_names(), vec!["status"]);
        assert_eq!(result.functions[1].parameters[0].type_annotation.as_deref(), Some("string"));
        assert_eq!(result.functions[1].return_type.as_deref(), Some("Task<List<Order>>"));
        assert_eq!(result.classes[0].extends, None);

        let where_call = result.calls.iter().find(|c| c.callee == "Where").unwrap();
        assert_eq!(where_call.receiver.as_deref(), Some("_db.Orders"));
        assert_eq!(where_call.range.start.line, 8);
        assert!(result.calls.iter().any(|c| c.callee == "ToListAsync"));

        let ctor = result.calls.iter().find(|c| c.is_constructor).unwrap();
        assert_eq!(ctor.callee, "List");
        assert!(!result.calls.iter().any(|c| c.callee == "return"));
    }

    #[test]
    fn test_tagged_template_and_imports() {
        let source = "import { Pool } from 'pg';\nconst rows = await sql`SELECT * FROM orders`;\n// db.query('SELECT 1')\n";
        let result = extract_patterns(Language::TypeScript, source, "repo.ts");

        assert_eq!(result.imports[0].source, "pg");
        assert_eq!(result.imports[0].names, vec!["Pool"]);

        let tagged = result.calls.iter().find(|c| c.callee == "sql").unwrap();
        assert_eq!(tagged.string_args, vec!["SELECT * FROM orders"]);
        assert_eq!(tagged.arg_count, 1);

        // Commented-out code yields nothing.
        assert!(!result.calls.iter().any(|c| c.callee == "query"));
    }

    #[test]
    fn test_php_receivers_are_normalized() {
        let source = "<?php\nclass Repo extends Base {\n  public function all() {\n    return $this->db->query(\"SELECT * FROM users\");\n  }\n}\n";
        let result = extract_patterns(Language::Php, source, "Repo.php");

        let query = result.calls.iter().find(|c| c.callee == "query").unwrap();
        assert_eq!(query.receiver.as_deref(), Some("this.db"));
        assert_eq!(query.string_args, vec!["SELECT * FROM users"]);
        assert_eq!(result.classes[0].bases, vec!["Base"]);
        assert!(result.functions[0].is_exported);
    }

    #[test]
    fn test_empty_source() {
        let result = extract_patterns(Language::Java, "", "Empty.java");
        assert_eq!(result.item_count(), 0);
        assert_eq!(result.quality.confidence, 0.0);
        assert_eq!(result.quality.coverage_percent, 0.0);
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("Map<String, Integer> m, int n"),
            vec!["Map<String, Integer> m", "int n"]
        );
        let names = |language, raw| -> Vec<String> {
            parse_parameters(language, raw).into_iter().map(|p| p.name).collect()
        };
        assert_eq!(names(Language::TypeScript, "id: string, opts?: Options"), vec!["id", "opts"]);
        assert_eq!(names(Language::Php, "int $id, $name = null"), vec!["id", "name"]);
    }

    #[test]
    fn test_parameter_details() {
        let java = parse_parameters(Language::Java, "final Map<String, Integer> counts, String... tags");
        assert_eq!(java[0].type_annotation.as_deref(), Some("Map<String, Integer>"));
        assert!(!java[0].is_rest);
        assert_eq!(java[1].name, "tags");
        assert!(java[1].is_rest);

        let ts = parse_parameters(Language::TypeScript, "limit: number = 10, cb: (e: Error) => void, ...rest: string[]");
        assert_eq!(ts[0].type_annotation.as_deref(), Some("number"));
        assert_eq!(ts[0].default_value.as_deref(), Some("10"));
        assert_eq!(ts[1].name, "cb");
        assert_eq!(ts[1].default_value, None);
        assert!(ts[2].is_rest);

        let cs = parse_parameters(Language::CSharp, "params object[] args, int page = 0");
        assert!(cs[0].is_rest);
        assert_eq!(cs[0].type_annotation.as_deref(), Some("object[]"));
        assert_eq!(cs[1].default_value.as_deref(), Some("0"));

        let py = parse_parameters(Language::Python, "self, *args, **kwargs");
        assert_eq!(py.len(), 2);
        assert!(py.iter().all(|p| p.is_rest));
    }

    #[test]
    fn test_class_heritage() {
        let java = extract_patterns(
            Language::Java,
            "public abstract class Order extends Base implements Serializable, Auditable {\n}\n",
            "Order.java",
        );
        let order = &java.classes[0];
        assert_eq!(order.extends.as_deref(), Some("Base"));
        assert_eq!(order.implements, vec!["Serializable", "Auditable"]);
        assert!(order.is_abstract && order.is_exported);

        let cs = extract_patterns(Language::CSharp, "public class AppDb : DbContext, IUnitOfWork\n{\n}\n", "AppDb.cs");
        assert_eq!(cs.classes[0].extends.as_deref(), Some("DbContext"));
        assert_eq!(cs.classes[0].implements, vec!["IUnitOfWork"]);
    }

    #[test]
    fn test_panicking_rule_is_isolated() {
        let failed = run_rule("sql_execute", "db.py", || panic!("bad capture group"));
        match failed {
            Err(ExtractionError::RuleFailed { rule, file }) => {
                assert_eq!(rule, "sql_execute");
                assert_eq!(file, "db.py");
            }
            _ => panic!("expected RuleFailed"),
        }

        let fine = run_rule("python_import", "db.py", Vec::new);
        assert!(matches!(fine, Ok(ref hits) if hits.is_empty()));
    }
}
