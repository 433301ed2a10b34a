//! Table name resolution.
//!
//! Learned conventions are consulted first. Otherwise the strategies run
//! in a fixed order and the first that names a table wins: framework
//! syntax, generic heuristics, nearby context, identifier inference.

use once_cell::sync::Lazy;
use regex::Regex;

use super::access::{receiver_tail, CallAccess};
use super::sql::{parse_sql, SqlStatement};
use super::types::{OrmFramework, TableResolution};
use crate::learning::{LearnedConventions, NamingConvention};
use crate::parsers::CallSite;

/// Lines above a call searched by the context strategy.
pub const CONTEXT_LOOKBACK: usize = 5;

pub const LEARNED_CONFIDENCE: f32 = 0.95;
pub const RESOLVED_CONFIDENCE: f32 = 0.7;
pub const UNRESOLVED_CONFIDENCE: f32 = 0.3;
pub const RAW_SQL_PENALTY: f32 = 0.1;

/// Receiver names too generic to name a table.
const GENERIC_NAMES: &[&str] = &[
    "db", "database", "conn", "connection", "cursor", "cur", "session", "client", "pool", "this", "self",
    "query", "knex", "em", "entitymanager", "context", "dbcontext", "ctx", "tx", "trx", "transaction",
    "pdo", "sql", "repo", "repository", "store", "model", "models", "data", "result", "results", "qb",
    "builder", "engine", "stmt", "statement", "prisma", "supabase", "sequelize", "mongoose", "base",
    "item", "items", "obj", "object", "entity", "entities", "record", "records", "row", "rows", "value",
];

/// Suffixes that name a data-access wrapper rather than the data.
const ACCESSOR_SUFFIXES: &[&str] = &[
    "Repository", "Repo", "Store", "Dao", "DAO", "Table", "Collection", "Model", "Manager", "Service",
    "_repository", "_repo", "_store", "_dao", "_table", "_collection", "_model", "_manager", "_service",
];

static CONTEXT_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:\b(?:from|table|into|collection)\(\s*['"`](\w+)['"`]|\b(?:FROM|INTO|UPDATE|JOIN)\s+[`"\[]?(\w+))"#)
        .expect("context table regex")
});

/// Everything a strategy may look at.
pub struct Lookup<'a> {
    pub access: &'a CallAccess,
    pub call: Option<&'a CallSite>,
    /// Source lines of the file
    pub lines: &'a [&'a str],
    /// 1-based line of the access
    pub line: u32,
}

/// A SQL statement on an earlier line that the access executes, as in
/// `query = "SELECT ..."` followed by `cursor.execute(query)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextStatement {
    /// 1-based line holding the statement
    pub line: u32,
    pub statement: SqlStatement,
}

/// Outcome of resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTable {
    pub table: Option<String>,
    pub resolution: TableResolution,
    pub context: Option<ContextStatement>,
}

impl ResolvedTable {
    fn named(table: String, resolution: TableResolution) -> Self {
        Self {
            table: Some(table),
            resolution,
            context: None,
        }
    }
}

type Strategy = fn(&TableResolver<'_>, &Lookup<'_>) -> Option<ResolvedTable>;

const STRATEGIES: &[Strategy] = &[
    |r, l| r.framework_syntax(l).map(|t| ResolvedTable::named(t, TableResolution::Framework)),
    |r, l| r.heuristics(l).map(|t| ResolvedTable::named(t, TableResolution::Heuristic)),
    |r, l| r.nearby_context(l),
    |r, l| r.identifier_inference(l).map(|t| ResolvedTable::named(t, TableResolution::Inferred)),
];

/// Resolves tables for one scan.
pub struct TableResolver<'a> {
    learned: Option<&'a LearnedConventions>,
    naming: NamingConvention,
}

impl<'a> TableResolver<'a> {
    /// Learned conventions are used only when they carry enough data.
    pub fn new(conventions: Option<&'a LearnedConventions>) -> Self {
        let learned = conventions.filter(|c| c.has_enough_data);
        Self {
            learned,
            naming: learned.map(|c| c.table_naming_convention).unwrap_or_default(),
        }
    }

    pub fn uses_learning(&self) -> bool {
        self.learned.is_some()
    }

    pub fn learned_framework(&self) -> Option<OrmFramework> {
        self.learned.and_then(|c| c.primary_framework)
    }

    /// Whether the call's receiver is an identifier learned to reach a table.
    pub fn is_learned_accessor(&self, call: &CallSite) -> bool {
        match (self.learned, call.receiver.as_deref()) {
            (Some(learned), Some(receiver)) => learned
                .infer_table_from_variable(&receiver_tail(receiver).to_lowercase())
                .is_some(),
            _ => false,
        }
    }

    pub fn resolve(&self, lookup: &Lookup<'_>) -> ResolvedTable {
        if let Some(table) = self.learned_table(lookup) {
            return ResolvedTable::named(table, TableResolution::Learned);
        }
        STRATEGIES
            .iter()
            .find_map(|strategy| {
                strategy(self, lookup).filter(|r| r.table.as_deref().is_some_and(is_table_name))
            })
            .unwrap_or(ResolvedTable {
                table: None,
                resolution: TableResolution::Unresolved,
                context: None,
            })
    }

    /// Learned accessors for the identifiers a call names. Raw SQL never
    /// takes this path.
    fn learned_table(&self, lookup: &Lookup<'_>) -> Option<String> {
        let learned = self.learned?;
        let access = lookup.access;
        if access.is_raw_sql {
            return None;
        }
        let mut candidates: Vec<&str> = [&access.explicit_table, &access.model, &access.identifier]
            .into_iter()
            .filter_map(|c| c.as_deref())
            .collect();
        if let Some(receiver) = lookup.call.and_then(|c| c.receiver.as_deref()) {
            candidates.push(receiver_tail(receiver));
        }
        candidates
            .into_iter()
            .find_map(|name| learned.infer_table_from_variable(&name.to_lowercase()))
            .map(str::to_string)
    }

    fn framework_syntax(&self, lookup: &Lookup<'_>) -> Option<String> {
        let access = lookup.access;
        access
            .explicit_table
            .clone()
            .or_else(|| access.model.as_deref().map(|m| self.naming.table_name_for(m)))
    }

    /// SQL text on the call, then any SQL among its string arguments.
    fn heuristics(&self, lookup: &Lookup<'_>) -> Option<String> {
        if let Some(statement) = lookup.access.sql.as_deref().and_then(parse_sql) {
            return Some(statement.table);
        }
        lookup
            .call?
            .string_args
            .iter()
            .find_map(|s| parse_sql(s))
            .map(|statement| statement.table)
    }

    /// A table named on the access line or just above it: a SQL string
    /// assigned before `execute(query)`, or the head of a multi-line chain.
    /// A full statement above the access travels with the result.
    fn nearby_context(&self, lookup: &Lookup<'_>) -> Option<ResolvedTable> {
        let index = (lookup.line as usize).checked_sub(1)?;
        let first = index.saturating_sub(CONTEXT_LOOKBACK);
        (first..=index.min(lookup.lines.len().saturating_sub(1)))
            .rev()
            .find_map(|i| {
                let line = lookup.lines.get(i)?;
                if i < index {
                    if let Some(statement) = parse_sql(line) {
                        return Some(ResolvedTable {
                            table: Some(statement.table.clone()),
                            resolution: TableResolution::Context,
                            context: Some(ContextStatement {
                                line: i as u32 + 1,
                                statement,
                            }),
                        });
                    }
                }
                let caps = CONTEXT_TABLE.captures(line)?;
                let table = caps.get(1).or_else(|| caps.get(2))?.as_str().to_string();
                Some(ResolvedTable::named(table, TableResolution::Context))
            })
    }

    /// `userRepository` -> `users`, `orderStore` -> `orders`
    fn identifier_inference(&self, lookup: &Lookup<'_>) -> Option<String> {
        let from_receiver = lookup
            .call
            .and_then(|c| c.receiver.as_deref())
            .map(receiver_tail);
        let name = lookup.access.identifier.as_deref().or(from_receiver)?;
        let name = ACCESSOR_SUFFIXES
            .iter()
            .find_map(|suffix| name.strip_suffix(suffix).filter(|stem| !stem.is_empty()))
            .unwrap_or(name);
        if name.is_empty() || GENERIC_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
            return None;
        }
        Some(self.naming.table_name_for(name))
    }
}

/// Confidence of an access point. Raw SQL is penalized but never drops
/// below the unresolved floor.
pub fn access_confidence(resolution: TableResolution, is_raw_sql: bool) -> f32 {
    let base = match resolution {
        TableResolution::Learned => LEARNED_CONFIDENCE,
        TableResolution::Unresolved => UNRESOLVED_CONFIDENCE,
        _ => RESOLVED_CONFIDENCE,
    };
    if is_raw_sql {
        (base - RAW_SQL_PENALTY).max(UNRESOLVED_CONFIDENCE)
    } else {
        base
    }
}

fn is_table_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}
