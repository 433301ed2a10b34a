//! ORM model records from schema and entity declarations.

use super::types::{OrmFramework, OrmModel};
use crate::learning::scan_declarations;

const EXPLICIT_CONFIDENCE: f32 = 0.95;
const DERIVED_CONFIDENCE: f32 = 0.85;

/// Models declared in one file. DDL tables have no model class and are
/// skipped.
pub fn detect_models(content: &str, file: &str) -> Vec<OrmModel> {
    scan_declarations(content, file)
        .into_iter()
        .filter(|decl| decl.framework != OrmFramework::RawSql)
        .map(|decl| OrmModel {
            name: decl.model.unwrap_or_else(|| decl.table.clone()),
            table_name: decl.table,
            fields: decl.fields,
            file: file.to_string(),
            line: decl.line,
            framework: decl.framework,
            confidence: if decl.explicit_table {
                EXPLICIT_CONFIDENCE
            } else {
                DERIVED_CONFIDENCE
            },
        })
        .collect()
}
