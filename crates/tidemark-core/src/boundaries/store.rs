//! Boundary stores: where detected records go and where violations come
//! from.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use super::types::{AccessMap, DataAccessPoint, OrmModel, SensitiveField, Violation};
use crate::errors::{ConfigError, StoreError};

/// Directory under the scan root holding persisted output.
pub const STORE_DIR: &str = ".tidemark";
pub const ACCESS_MAP_FILE: &str = "access-map.json";

/// Receives records from the detector, aggregates them into an access map
/// and owns the violation policy.
pub trait BoundaryStore: Send {
    fn add_model(&mut self, model: OrmModel);
    fn add_access_point(&mut self, point: DataAccessPoint);
    fn add_sensitive_field(&mut self, field: SensitiveField);
    /// Aggregated view of every record added so far.
    fn access_map(&self) -> AccessMap;
    fn save_access_map(&mut self, map: &AccessMap) -> Result<(), StoreError>;
    fn check_violations(&self, map: &AccessMap) -> Vec<Violation>;
}

/// Restricts which files may touch a table.
#[derive(Debug, Clone)]
pub struct TableRule {
    pub id: String,
    pub table: String,
    allowed: GlobSet,
}

impl TableRule {
    /// Access to `table` from any file not matching `allowed_paths` is a
    /// violation.
    pub fn restrict(id: &str, table: &str, allowed_paths: &[&str]) -> Result<Self, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in allowed_paths {
            let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidGlob {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }
        let allowed = builder.build().map_err(|e| ConfigError::InvalidGlob {
            pattern: allowed_paths.join(","),
            message: e.to_string(),
        })?;
        Ok(Self {
            id: id.to_string(),
            table: table.to_string(),
            allowed,
        })
    }

    fn check<'a>(&'a self, map: &'a AccessMap) -> impl Iterator<Item = Violation> + 'a {
        map.access_points
            .iter()
            .filter(|p| p.table == self.table && !self.allowed.is_match(&p.file))
            .map(|p| Violation {
                rule_id: self.id.clone(),
                message: format!("{} access to '{}' outside allowed paths", p.operation, p.table),
                file: p.file.clone(),
                line: p.line,
            })
    }
}

/// Keeps records in memory. No rules means no violations.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    access_points: Vec<DataAccessPoint>,
    models: Vec<OrmModel>,
    sensitive_fields: Vec<SensitiveField>,
    rules: Vec<TableRule>,
    saved: Option<AccessMap>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: TableRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// The map passed to the last `save_access_map`.
    pub fn saved(&self) -> Option<&AccessMap> {
        self.saved.as_ref()
    }

    pub fn len(&self) -> usize {
        self.access_points.len() + self.models.len() + self.sensitive_fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BoundaryStore for InMemoryStore {
    fn add_model(&mut self, model: OrmModel) {
        self.models.push(model);
    }

    fn add_access_point(&mut self, point: DataAccessPoint) {
        self.access_points.push(point);
    }

    fn add_sensitive_field(&mut self, field: SensitiveField) {
        self.sensitive_fields.push(field);
    }

    fn access_map(&self) -> AccessMap {
        AccessMap::from_records(
            self.access_points.clone(),
            self.models.clone(),
            self.sensitive_fields.clone(),
        )
    }

    fn save_access_map(&mut self, map: &AccessMap) -> Result<(), StoreError> {
        self.saved = Some(map.clone());
        Ok(())
    }

    fn check_violations(&self, map: &AccessMap) -> Vec<Violation> {
        self.rules.iter().flat_map(|rule| rule.check(map)).collect()
    }
}

/// Persists the access map as JSON under `<root>/.tidemark/`.
#[derive(Debug)]
pub struct JsonFileStore {
    inner: InMemoryStore,
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: InMemoryStore::new(),
            dir: root.join(STORE_DIR),
        }
    }

    pub fn with_rule(mut self, rule: TableRule) -> Self {
        self.inner = self.inner.with_rule(rule);
        self
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(ACCESS_MAP_FILE)
    }

    /// Read back a previously saved map.
    pub fn load(&self) -> Result<Option<AccessMap>, StoreError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&json)?))
    }
}

impl BoundaryStore for JsonFileStore {
    fn add_model(&mut self, model: OrmModel) {
        self.inner.add_model(model);
    }

    fn add_access_point(&mut self, point: DataAccessPoint) {
        self.inner.add_access_point(point);
    }

    fn add_sensitive_field(&mut self, field: SensitiveField) {
        self.inner.add_sensitive_field(field);
    }

    fn access_map(&self) -> AccessMap {
        self.inner.access_map()
    }

    fn save_access_map(&mut self, map: &AccessMap) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Write {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path();
        let json = serde_json::to_string_pretty(map)?;
        fs::write(&path, json).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::info!(
            path = %path.display(),
            tables = map.tables.len(),
            access_points = map.access_points.len(),
            "access map saved"
        );
        self.inner.save_access_map(map)
    }

    fn check_violations(&self, map: &AccessMap) -> Vec<Violation> {
        self.inner.check_violations(map)
    }
}
