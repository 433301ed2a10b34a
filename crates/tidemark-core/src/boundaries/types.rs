//! Boundary types - data access points, ORM models, sensitive fields

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use xxhash_rust::xxh3::xxh3_64;

/// Table name recorded when no strategy resolved one.
pub const UNKNOWN_TABLE: &str = "unknown";

/// Longest `context` snippet kept on an access point.
pub const MAX_CONTEXT_CHARS: usize = 200;

/// Data operation type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOperation {
    Read,
    Write,
    Delete,
    #[default]
    Unknown,
}

impl DataOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DataOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which resolution strategy named the table of an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableResolution {
    /// Looked up in the learned conventions
    Learned,
    /// Read from framework syntax (`prisma.user`, `DB::table('x')`)
    Framework,
    /// Generic heuristics (string argument, SQL text)
    Heuristic,
    /// Nearby lines (enclosing model, recent `FROM`)
    Context,
    /// Derived from an identifier by naming rules
    Inferred,
    Unresolved,
}

/// Supported ORM frameworks. Serialized as `name()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrmFramework {
    // JavaScript/TypeScript
    Sequelize,
    #[serde(rename = "typeorm")]
    TypeOrm,
    Prisma,
    Mongoose,
    Knex,
    Drizzle,
    Supabase,
    // Python
    Django,
    #[serde(rename = "sqlalchemy")]
    SqlAlchemy,
    // Java
    Hibernate,
    Jpa,
    SpringData,
    // C#
    EfCore,
    Dapper,
    // PHP
    Eloquent,
    Doctrine,
    /// Plain SQL text (`CREATE TABLE`, driver calls)
    RawSql,
}

impl OrmFramework {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sequelize => "sequelize",
            Self::TypeOrm => "typeorm",
            Self::Prisma => "prisma",
            Self::Mongoose => "mongoose",
            Self::Knex => "knex",
            Self::Drizzle => "drizzle",
            Self::Supabase => "supabase",
            Self::Django => "django",
            Self::SqlAlchemy => "sqlalchemy",
            Self::Hibernate => "hibernate",
            Self::Jpa => "jpa",
            Self::SpringData => "spring_data",
            Self::EfCore => "ef_core",
            Self::Dapper => "dapper",
            Self::Eloquent => "eloquent",
            Self::Doctrine => "doctrine",
            Self::RawSql => "raw_sql",
        }
    }
}

impl std::fmt::Display for OrmFramework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A data access point detected in source code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataAccessPoint {
    /// xxh3 of file, line, column and table, as hex
    pub id: String,
    /// Table/collection being accessed, `unknown` when unresolved
    pub table: String,
    /// Fields being accessed, in first-seen order without duplicates
    pub fields: SmallVec<[String; 4]>,
    pub operation: DataOperation,
    pub file: String,
    /// 1-based
    pub line: u32,
    /// 0-based
    pub column: u32,
    /// Trimmed source line
    pub context: String,
    pub is_raw_sql: bool,
    /// Detection confidence (0.0-1.0)
    pub confidence: f32,
    pub framework: Option<OrmFramework>,
    pub resolution: TableResolution,
}

impl DataAccessPoint {
    /// Stable identity of an access point.
    pub fn compute_id(file: &str, line: u32, column: u32, table: &str) -> String {
        let key = format!("{}:{}:{}:{}", file, line, column, table);
        format!("{:016x}", xxh3_64(key.as_bytes()))
    }

    /// Trim a source line into an access point context.
    pub fn context_of(line: &str) -> String {
        line.trim().chars().take(MAX_CONTEXT_CHARS).collect()
    }

    pub fn is_resolved(&self) -> bool {
        self.table != UNKNOWN_TABLE
    }
}

/// Type of sensitive data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityType {
    /// Personally Identifiable Information (name, email, phone, SSN, etc.)
    Pii,
    /// Credentials (password, API key, token, secret)
    Credentials,
    /// Financial data (credit card, bank account, routing number)
    Financial,
    /// Health data (diagnosis, prescription, medical record)
    Health,
}

impl SensitivityType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pii => "pii",
            Self::Credentials => "credentials",
            Self::Financial => "financial",
            Self::Health => "health",
        }
    }

    pub fn all() -> &'static [SensitivityType] {
        &[Self::Pii, Self::Credentials, Self::Financial, Self::Health]
    }
}

impl std::fmt::Display for SensitivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A sensitive field detected in source code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitiveField {
    pub field: String,
    /// Table it belongs to, if a model or table is declared nearby
    pub table: Option<String>,
    pub sensitivity_type: SensitivityType,
    pub file: String,
    pub line: u32,
    pub confidence: f32,
}

/// An ORM model detected in source code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrmModel {
    /// Model/entity name
    pub name: String,
    /// Table name; pluralized snake_case of the name unless declared
    pub table_name: String,
    pub fields: Vec<String>,
    pub file: String,
    pub line: u32,
    pub framework: OrmFramework,
    pub confidence: f32,
}

/// Everything known about one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableAccess {
    pub operations: BTreeSet<DataOperation>,
    pub fields: BTreeSet<String>,
    pub files: BTreeSet<String>,
    pub access_count: usize,
    pub raw_sql_count: usize,
    pub models: BTreeSet<String>,
    pub sensitive_fields: BTreeSet<String>,
}

/// Per-table summary of a scan plus the records it was built from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessMap {
    pub tables: BTreeMap<String, TableAccess>,
    pub access_points: Vec<DataAccessPoint>,
    pub models: Vec<OrmModel>,
    pub sensitive_fields: Vec<SensitiveField>,
}

impl AccessMap {
    /// Build the table summaries from scan records.
    pub fn from_records(
        access_points: Vec<DataAccessPoint>,
        models: Vec<OrmModel>,
        sensitive_fields: Vec<SensitiveField>,
    ) -> Self {
        let mut tables: BTreeMap<String, TableAccess> = BTreeMap::new();

        for point in &access_points {
            let entry = tables.entry(point.table.clone()).or_default();
            entry.operations.insert(point.operation);
            entry.fields.extend(point.fields.iter().cloned());
            entry.files.insert(point.file.clone());
            entry.access_count += 1;
            if point.is_raw_sql {
                entry.raw_sql_count += 1;
            }
        }
        for model in &models {
            let entry = tables.entry(model.table_name.clone()).or_default();
            entry.models.insert(model.name.clone());
            entry.fields.extend(model.fields.iter().cloned());
            entry.files.insert(model.file.clone());
        }
        for field in &sensitive_fields {
            if let Some(ref table) = field.table {
                let entry = tables.entry(table.clone()).or_default();
                entry.sensitive_fields.insert(field.field.clone());
            }
        }

        Self {
            tables,
            access_points,
            models,
            sensitive_fields,
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableAccess> {
        self.tables.get(name)
    }
}

/// A boundary rule violation reported by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule_id: String,
    pub message: String,
    pub file: String,
    pub line: u32,
}

/// Counters for one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    pub files_scanned: usize,
    pub files_skipped: usize,
    /// Files that fed the learning pass
    pub files_learned: usize,
    pub tables_found: usize,
    pub access_points_found: usize,
    pub raw_sql_points: usize,
    pub learned_points: usize,
    pub models_found: usize,
    pub sensitive_fields_found: usize,
    pub violations_found: usize,
    pub used_learning: bool,
    pub duration_ms: u64,
}

/// Result of boundary scanning
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundaryScanResult {
    pub access_map: AccessMap,
    pub violations: Vec<Violation>,
    pub stats: ScanStats,
    /// Non-fatal per-file errors
    pub errors: Vec<String>,
}
