//! Boundary detector - learn-then-detect orchestration
//!
//! A scan runs in two passes over the same file list. The learning pass
//! reads the files that show data-access evidence and builds a
//! [`LearnedConventions`] snapshot. The detection pass extracts every
//! file with the hybrid extractor, recognizes data access in its call
//! sites and resolves tables, consulting the snapshot first. Records are
//! then handed to a [`BoundaryStore`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::access::{learned_access, recognize_call, CallAccess};
use super::models::detect_models;
use super::sensitive::SensitiveFieldDetector;
use super::sql::parse_sql;
use super::store::BoundaryStore;
use super::tables::{access_confidence, Lookup, TableResolver};
use super::types::*;
use crate::config::TidemarkConfig;
use crate::errors::{ConfigError, ScanError};
use crate::extraction::{Extractor, HybridExtractor};
use crate::learning::{has_data_access_evidence, ConventionLearner, LearnedConventions, LearningAccumulator};
use crate::parsers::CallSite;
use crate::scanner::{is_test_file, CancellationToken, DefaultFileWalker, FileWalker, WalkOutput, WalkerConfig};

/// Where the detector is in a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Learning,
    Detecting,
    Done,
}

/// Records detected in one file.
#[derive(Debug, Clone, Default)]
pub struct FileRecords {
    pub access_points: Vec<DataAccessPoint>,
    pub models: Vec<OrmModel>,
    pub sensitive_fields: Vec<SensitiveField>,
}

/// Learn-then-detect orchestrator.
pub struct BoundaryDetector {
    root: PathBuf,
    config: TidemarkConfig,
    extractor: HybridExtractor,
    walker: Box<dyn FileWalker>,
    learner: ConventionLearner,
    sensitive: SensitiveFieldDetector,
    phase: ScanPhase,
    cancel: CancellationToken,
    pool: rayon::ThreadPool,
}

impl BoundaryDetector {
    /// Detector for `root` using the default file walker.
    pub fn new(root: impl Into<PathBuf>, config: TidemarkConfig) -> Result<Self, ConfigError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ConfigError::RootNotFound {
                path: root.display().to_string(),
            });
        }
        let walker = DefaultFileWalker::new(&root, WalkerConfig::from(&config.scan))?;
        Self::with_walker(root, config, Box::new(walker))
    }

    /// Detector with a caller-supplied corpus walker.
    pub fn with_walker(
        root: impl Into<PathBuf>,
        config: TidemarkConfig,
        walker: Box<dyn FileWalker>,
    ) -> Result<Self, ConfigError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ConfigError::RootNotFound {
                path: root.display().to_string(),
            });
        }
        TidemarkConfig::validate(&config)?;

        // 0 threads lets rayon pick
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.scan.effective_threads())
            .build()
            .map_err(|e| ConfigError::ValidationFailed {
                field: "scan.threads".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            extractor: HybridExtractor::new(config.extraction.clone()),
            learner: ConventionLearner::new(config.learning.clone()),
            sensitive: SensitiveFieldDetector::new(),
            phase: ScanPhase::Idle,
            cancel: CancellationToken::new(),
            root,
            config,
            walker,
            pool,
        })
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &TidemarkConfig {
        &self.config
    }

    /// Token shared with the workers. Cancelling it stops the scan before
    /// the next file.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Discover files with the walker and scan them.
    pub fn scan(&mut self, store: &mut dyn BoundaryStore) -> BoundaryScanResult {
        let walk = self.walker.walk(&self.root);
        let files = walk.files.clone();
        self.run(&files, walk, store)
    }

    /// Scan `files`, given relative to the root.
    pub fn scan_files(&mut self, files: &[String], store: &mut dyn BoundaryStore) -> BoundaryScanResult {
        self.run(files, WalkOutput::default(), store)
    }

    fn run(&mut self, files: &[String], walk: WalkOutput, store: &mut dyn BoundaryStore) -> BoundaryScanResult {
        let started = Instant::now();
        let span = tracing::info_span!("boundary_scan", root = %self.root.display(), files = files.len());
        let _guard = span.enter();

        let mut errors = walk.errors;
        let mut stats = ScanStats {
            files_skipped: walk.files_skipped,
            ..Default::default()
        };

        self.phase = ScanPhase::Learning;
        self.learner.reset();
        let conventions = if self.config.scan.effective_skip_learning() {
            tracing::debug!("learning skipped");
            None
        } else {
            let (conventions, files_learned) = self.learn(files);
            stats.files_learned = files_learned;
            Some(conventions)
        };

        self.phase = ScanPhase::Detecting;
        let resolver = TableResolver::new(conventions.as_ref());
        stats.used_learning = resolver.uses_learning();
        let outcomes = self.detect(files, &resolver);

        self.phase = ScanPhase::Done;
        let mut access_points = Vec::new();
        let mut models = Vec::new();
        let mut sensitive_fields = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(records) => {
                    stats.files_scanned += 1;
                    access_points.extend(records.access_points);
                    models.extend(records.models);
                    sensitive_fields.extend(records.sensitive_fields);
                }
                Err(ScanError::Cancelled) => stats.files_skipped += 1,
                Err(e) => {
                    stats.files_skipped += 1;
                    tracing::warn!(error = %e, "file skipped");
                    errors.push(e.to_string());
                }
            }
        }
        if let Some(cancelled) = self.cancel.settle() {
            tracing::warn!(skipped = stats.files_skipped, "boundary scan cancelled");
            errors.push(cancelled.to_string());
        }

        let mut seen = FxHashSet::default();
        access_points.retain(|p| seen.insert(p.id.clone()));
        access_points.sort_by(|a, b| (&a.file, a.line, a.column).cmp(&(&b.file, b.line, b.column)));
        models.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));
        sensitive_fields.sort_by(|a, b| (&a.file, a.line).cmp(&(&b.file, b.line)));

        stats.access_points_found = access_points.len();
        stats.raw_sql_points = access_points.iter().filter(|p| p.is_raw_sql).count();
        stats.learned_points = access_points
            .iter()
            .filter(|p| p.resolution == TableResolution::Learned)
            .count();
        let unresolved = access_points.iter().filter(|p| !p.is_resolved()).count();
        stats.models_found = models.len();
        stats.sensitive_fields_found = sensitive_fields.len();

        for model in models {
            store.add_model(model);
        }
        for point in access_points {
            store.add_access_point(point);
        }
        for field in sensitive_fields {
            store.add_sensitive_field(field);
        }

        let access_map = store.access_map();
        if let Err(e) = store.save_access_map(&access_map) {
            tracing::warn!(error = %e, "access map not saved");
            errors.push(e.to_string());
        }
        let violations = store.check_violations(&access_map);
        stats.violations_found = violations.len();

        stats.tables_found = access_map.tables.keys().filter(|t| *t != UNKNOWN_TABLE).count();
        stats.duration_ms = started.elapsed().as_millis() as u64;
        self.learner.reset();

        tracing::info!(
            files = stats.files_scanned,
            tables = stats.tables_found,
            access_points = stats.access_points_found,
            unresolved,
            sensitive_fields = stats.sensitive_fields_found,
            violations = stats.violations_found,
            used_learning = stats.used_learning,
            duration_ms = stats.duration_ms,
            "boundary scan complete"
        );

        BoundaryScanResult {
            access_map,
            violations,
            stats,
            errors,
        }
    }

    /// Learning pass. Returns the snapshot and the number of files that
    /// fed it.
    fn learn(&mut self, files: &[String]) -> (LearnedConventions, usize) {
        let _span = tracing::debug_span!("learning").entered();
        let root = self.root.as_path();
        let cancel = &self.cancel;
        let max_size = self.config.scan.effective_max_file_size();

        let partials: Vec<LearningAccumulator> = self.pool.install(|| {
            files
                .par_iter()
                .filter(|file| !is_test_file(file))
                .filter_map(|file| {
                    cancel.checkpoint().ok()?;
                    let content = read_source(root, file, max_size).ok()?;
                    has_data_access_evidence(&content).then(|| LearningAccumulator::from_file(&content, file))
                })
                .collect()
        });

        let files_learned = partials.len();
        for partial in partials {
            self.learner.absorb(partial);
        }
        let conventions = self.learner.finalize_learning(files.len()).clone();
        (conventions, files_learned)
    }

    /// Detection pass, one outcome per file in order.
    fn detect(&self, files: &[String], resolver: &TableResolver<'_>) -> Vec<Result<FileRecords, ScanError>> {
        let _span = tracing::debug_span!("detecting", used_learning = resolver.uses_learning()).entered();
        let detector = FileDetector {
            extractor: &self.extractor,
            resolver,
            sensitive: &self.sensitive,
        };
        let root = self.root.as_path();
        let cancel = &self.cancel;
        let max_size = self.config.scan.effective_max_file_size();

        self.pool.install(|| {
            files
                .par_iter()
                .map(|file| {
                    cancel.checkpoint()?;
                    read_source(root, file, max_size).map(|content| detector.detect(&content, file))
                })
                .collect()
        })
    }
}

/// Read a file as UTF-8 text.
fn read_source(root: &Path, file: &str, max_size: u64) -> Result<String, ScanError> {
    let path = root.join(file);
    let size = fs::metadata(&path)
        .map_err(|e| ScanError::from_io(path.clone(), e))?
        .len();
    if size > max_size {
        return Err(ScanError::TooLarge {
            path,
            size,
            max: max_size,
        });
    }
    let bytes = fs::read(&path).map_err(|e| ScanError::from_io(path.clone(), e))?;
    String::from_utf8(bytes).map_err(|_| ScanError::Encoding { path })
}

/// Per-file detection. Shared by the workers of one scan.
pub struct FileDetector<'a> {
    pub extractor: &'a HybridExtractor,
    pub resolver: &'a TableResolver<'a>,
    pub sensitive: &'a SensitiveFieldDetector,
}

impl FileDetector<'_> {
    pub fn detect(&self, content: &str, file: &str) -> FileRecords {
        let extraction = self.extractor.extract(content, file);
        if !extraction.quality.warnings.is_empty() {
            tracing::debug!(file, warnings = ?extraction.quality.warnings, "extraction warnings");
        }
        let lines: Vec<&str> = content.lines().collect();

        let mut points = Vec::new();
        let mut covered: FxHashSet<u32> = FxHashSet::default();
        if let Some(language) = extraction.language {
            for call in &extraction.calls {
                let access = match recognize_call(call, language) {
                    Some(access) => access,
                    None if self.resolver.is_learned_accessor(call) => {
                        match learned_access(call, self.resolver.learned_framework()) {
                            Some(access) => access,
                            None => continue,
                        }
                    }
                    None => continue,
                };
                let start = call.range.start;
                covered.extend(start.line..=call.range.end.line.max(start.line));
                let (point, consumed) = self.access_point(&access, Some(call), &lines, file, start.line, start.column);
                covered.extend(consumed);
                points.push(point);
            }
        }

        for (index, line) in lines.iter().enumerate() {
            let number = index as u32 + 1;
            if covered.contains(&number) || is_comment_line(line) {
                continue;
            }
            let Some(statement) = parse_sql(line) else {
                continue;
            };
            let access = CallAccess {
                operation: statement.operation,
                framework: Some(OrmFramework::RawSql),
                is_raw_sql: true,
                sql: Some(line.to_string()),
                fields: statement.fields,
                ..Default::default()
            };
            let column = (line.len() - line.trim_start().len()) as u32;
            points.push(self.access_point(&access, None, &lines, file, number, column).0);
        }

        FileRecords {
            access_points: collapse(points),
            models: detect_models(content, file),
            sensitive_fields: self.sensitive.detect(content, file),
        }
    }

    /// Build the point for one access. When the table came from a SQL
    /// statement on an earlier line, that statement's operation and fields
    /// belong to this access and its line is returned as consumed.
    fn access_point(
        &self,
        access: &CallAccess,
        call: Option<&CallSite>,
        lines: &[&str],
        file: &str,
        line: u32,
        column: u32,
    ) -> (DataAccessPoint, Option<u32>) {
        let resolved = self.resolver.resolve(&Lookup {
            access,
            call,
            lines,
            line,
        });
        let framework = match resolved.resolution {
            TableResolution::Learned => access.framework.or(self.resolver.learned_framework()),
            _ => access.framework,
        };
        let mut operation = access.operation;
        let mut is_raw_sql = access.is_raw_sql;
        let mut fields: SmallVec<[String; 4]> = SmallVec::new();
        let context_fields = resolved.context.as_ref().map(|c| c.statement.fields.as_slice()).unwrap_or(&[]);
        for field in access.fields.iter().chain(context_fields) {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        if let Some(context) = &resolved.context {
            if operation == DataOperation::Unknown {
                operation = context.statement.operation;
            }
            is_raw_sql = true;
        }
        let source_line = (line as usize)
            .checked_sub(1)
            .and_then(|i| lines.get(i))
            .copied()
            .unwrap_or("");

        let point = DataAccessPoint {
            id: String::new(),
            table: resolved.table.unwrap_or_else(|| UNKNOWN_TABLE.to_string()),
            fields,
            operation,
            file: file.to_string(),
            line,
            column,
            context: DataAccessPoint::context_of(source_line),
            is_raw_sql,
            confidence: access_confidence(resolved.resolution, is_raw_sql),
            framework,
            resolution: resolved.resolution,
        };
        (point, resolved.context.map(|c| c.line))
    }
}

fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    ["--", "//", "#", "*", "/*"].iter().any(|p| trimmed.starts_with(p))
}

fn operation_rank(operation: DataOperation) -> u8 {
    match operation {
        DataOperation::Delete => 3,
        DataOperation::Write => 2,
        DataOperation::Read => 1,
        DataOperation::Unknown => 0,
    }
}

/// One point per (line, table): the calls of a chain like
/// `db.from('users').select('email').eq('id', 1)` describe one access.
/// The most confident call describes the point, the strongest operation
/// wins and fields are unioned.
fn collapse(points: Vec<DataAccessPoint>) -> Vec<DataAccessPoint> {
    let mut merged: Vec<DataAccessPoint> = Vec::with_capacity(points.len());
    let mut index: FxHashMap<(u32, String), usize> = FxHashMap::default();

    for point in points {
        let key = (point.line, point.table.clone());
        let at = match index.get(&key).copied() {
            Some(at) => at,
            None => {
                index.insert(key, merged.len());
                merged.push(point);
                continue;
            }
        };
        let existing = &mut merged[at];
        let operation = if operation_rank(point.operation) > operation_rank(existing.operation) {
            point.operation
        } else {
            existing.operation
        };
        let column = existing.column.min(point.column);
        let mut fields = std::mem::take(&mut existing.fields);
        for field in &point.fields {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        if point.confidence > existing.confidence {
            *existing = point;
        }
        existing.operation = operation;
        existing.column = column;
        existing.fields = fields;
    }

    for point in &mut merged {
        point.id = DataAccessPoint::compute_id(&point.file, point.line, point.column, &point.table);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundaries::store::InMemoryStore;
    use crate::config::ExtractionConfig;

    fn detect_with(resolver: &TableResolver<'_>, content: &str, file: &str) -> FileRecords {
        let extractor = HybridExtractor::new(ExtractionConfig::default());
        let sensitive = SensitiveFieldDetector::new();
        FileDetector {
            extractor: &extractor,
            resolver,
            sensitive: &sensitive,
        }
        .detect(content, file)
    }

    fn detect(content: &str, file: &str) -> FileRecords {
        detect_with(&TableResolver::new(None), content, file)
    }

    #[test]
    fn test_raw_sql_call() {
        let source = "def load(cursor):\n    cursor.execute(\"SELECT email FROM users WHERE id = %s\", (1,))\n";
        let records = detect(source, "load.py");
        assert_eq!(records.access_points.len(), 1);

        let point = &records.access_points[0];
        assert_eq!(point.table, "users");
        assert_eq!(point.operation, DataOperation::Read);
        assert!(point.is_raw_sql);
        assert_eq!(point.line, 2);
        assert!(point.fields.iter().any(|f| f == "email"));
        assert!(point.confidence >= 0.3 && point.confidence <= 0.7);
        assert_ne!(point.resolution, TableResolution::Learned);
        assert_eq!(point.id, DataAccessPoint::compute_id("load.py", 2, point.column, "users"));
    }

    #[test]
    fn test_chain_collapses_to_one_point() {
        let source = "const rows = await supabase.from('profiles').select('email').eq('id', userId);\n";
        let records = detect(source, "profiles.ts");
        let points: Vec<_> = records.access_points.iter().filter(|p| p.table == "profiles").collect();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].operation, DataOperation::Read);
        assert!(points[0].fields.iter().any(|f| f == "email"));
    }

    #[test]
    fn test_sql_file_lines() {
        let source = "-- DELETE FROM ignored\nDELETE FROM sessions WHERE expires_at < now();\n";
        let records = detect(source, "cleanup.sql");
        assert_eq!(records.access_points.len(), 1);
        assert_eq!(records.access_points[0].table, "sessions");
        assert_eq!(records.access_points[0].operation, DataOperation::Delete);
        assert_eq!(records.access_points[0].line, 2);
    }

    #[test]
    fn test_assigned_query_is_one_access() {
        let source = "def load(cursor, uid):\n    query = \"SELECT email FROM users WHERE id = %s\"\n    cursor.execute(query, (uid,))\n";
        let records = detect(source, "load.py");
        assert_eq!(records.access_points.len(), 1);

        let point = &records.access_points[0];
        assert_eq!(point.line, 3);
        assert_eq!(point.table, "users");
        assert_eq!(point.operation, DataOperation::Read);
        assert_eq!(point.resolution, TableResolution::Context);
        assert!(point.is_raw_sql);
        assert!(point.fields.iter().any(|f| f == "email"));
    }

    #[test]
    fn test_quoted_ui_text_is_not_sql() {
        let ts = "const label = \"Select a country from the list\";\nconst hint = 'Delete from your cart anytime';\n";
        assert!(detect(ts, "labels.ts").access_points.is_empty());

        let py = "choice = input(\"Select one option from the menu: \")\n";
        assert!(detect(py, "menu.py").access_points.is_empty());
    }

    #[test]
    fn test_collapse_keeps_strongest_operation() {
        let base = DataAccessPoint {
            id: String::new(),
            table: "users".to_string(),
            fields: SmallVec::from_vec(vec!["email".to_string()]),
            operation: DataOperation::Read,
            file: "a.ts".to_string(),
            line: 4,
            column: 10,
            context: String::new(),
            is_raw_sql: false,
            confidence: 0.7,
            framework: None,
            resolution: TableResolution::Framework,
        };
        let mut delete = base.clone();
        delete.operation = DataOperation::Delete;
        delete.column = 2;
        delete.fields = SmallVec::from_vec(vec!["id".to_string()]);
        let mut other_table = base.clone();
        other_table.table = "orders".to_string();

        let merged = collapse(vec![base, delete, other_table]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].operation, DataOperation::Delete);
        assert_eq!(merged[0].column, 2);
        assert_eq!(merged[0].fields.as_slice(), ["email".to_string(), "id".to_string()]);
        assert_eq!(merged[0].id, DataAccessPoint::compute_id("a.ts", 4, 2, "users"));
    }

    #[test]
    fn test_phases_and_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("q.sql"), "SELECT id FROM audit_log;\n").unwrap();

        let mut detector = BoundaryDetector::new(dir.path(), TidemarkConfig::default()).unwrap();
        assert_eq!(detector.phase(), ScanPhase::Idle);
        let mut store = InMemoryStore::new();
        let result = detector.scan(&mut store);
        assert_eq!(detector.phase(), ScanPhase::Done);
        assert_eq!(result.stats.files_scanned, 1);
        assert!(result.access_map.table("audit_log").is_some());

        assert!(matches!(
            BoundaryDetector::new(dir.path().join("missing"), TidemarkConfig::default()),
            Err(ConfigError::RootNotFound { .. })
        ));
    }

    #[test]
    fn test_cancelled_scan_skips_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("q.sql"), "SELECT id FROM audit_log;\n").unwrap();
        let mut detector = BoundaryDetector::new(dir.path(), TidemarkConfig::default()).unwrap();
        detector.cancellation_token().cancel();

        let result = detector.scan_files(&["q.sql".to_string()], &mut InMemoryStore::new());
        assert_eq!(result.stats.files_scanned, 0);
        assert_eq!(result.stats.files_skipped, 1);
        assert!(result.errors.iter().any(|e| e.contains("cancelled")));

        // The cancel covered that scan only.
        let again = detector.scan_files(&["q.sql".to_string()], &mut InMemoryStore::new());
        assert_eq!(again.stats.files_scanned, 1);
        assert!(again.errors.is_empty());
        assert!(again.access_map.table("audit_log").is_some());
    }
}
