//! Extraction result: artifacts of one file plus their quality.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::quality::{ExtractionMethod, ExtractionQuality};
use crate::parsers::{
    CallSite, ClassInfo, ExportInfo, FunctionInfo, ImportInfo, Language, ParseResult,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub file: String,
    pub language: Option<Language>,
    pub functions: Vec<FunctionInfo>,
    pub classes: Vec<ClassInfo>,
    pub imports: Vec<ImportInfo>,
    /// Export statements; only the TypeScript/JavaScript parser reports them
    pub exports: Vec<ExportInfo>,
    pub calls: Vec<CallSite>,
    pub quality: ExtractionQuality,
}

impl ExtractionResult {
    pub fn empty(file: &str, language: Option<Language>, method: ExtractionMethod) -> Self {
        Self {
            file: file.to_string(),
            language,
            functions: Vec::new(),
            classes: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            calls: Vec::new(),
            quality: ExtractionQuality::empty(method),
        }
    }

    /// Wrap a structural parse; ERROR nodes become parse errors.
    pub fn from_parse(file: &str, parse: ParseResult) -> Self {
        let mut quality = ExtractionQuality::new(
            ExtractionMethod::Structural,
            parse.confidence(),
            parse.coverage_percent(),
            parse.item_count(),
        );
        quality.extraction_time_ms = parse.parse_time_us / 1000;
        if parse.error_nodes > 0 {
            quality.parse_errors.push(format!(
                "{} syntax error node(s) covering {} of {} bytes",
                parse.error_nodes, parse.error_bytes, parse.source_bytes
            ));
        }

        Self {
            file: file.to_string(),
            language: Some(parse.language),
            functions: parse.functions,
            classes: parse.classes,
            imports: parse.imports,
            exports: parse.exports,
            calls: parse.calls,
            quality,
        }
    }

    pub fn item_count(&self) -> usize {
        self.functions.len() + self.classes.len() + self.imports.len() + self.calls.len()
    }

    /// Union `other` into `self` and merge the qualities.
    ///
    /// Artifacts are matched by name and line, since the two tiers report
    /// different columns for the same construct.
    pub fn absorb(&mut self, other: ExtractionResult) {
        self.quality = self.quality.merge(&other.quality);

        union_by(&mut self.functions, other.functions, |f| (f.name.clone(), f.range.start.line));
        union_by(&mut self.classes, other.classes, |c| (c.name.clone(), c.range.start.line));
        union_by(&mut self.imports, other.imports, |i| (i.source.clone(), i.range.start.line));
        union_by(&mut self.exports, other.exports, |e| (e.name.clone(), e.range.start.line));
        union_by(&mut self.calls, other.calls, |c| (c.callee.clone(), c.range.start.line));

        self.quality.items_extracted = self.item_count();
    }
}

fn union_by<T, K, F>(into: &mut Vec<T>, from: Vec<T>, key: F)
where
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut seen: FxHashSet<K> = into.iter().map(&key).collect();
    for item in from {
        if seen.insert(key(&item)) {
            into.push(item);
        }
    }
}
