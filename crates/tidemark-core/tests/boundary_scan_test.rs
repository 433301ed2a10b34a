//! End-to-end boundary scans over small on-disk corpora.

use std::fs;
use std::path::Path;

use tidemark_core::boundaries::{BoundaryDetector, BoundaryStore, InMemoryStore, JsonFileStore, TableRule};
use tidemark_core::config::{LearningConfig, ScanConfig, TidemarkConfig};
use tidemark_core::learning::ConventionLearner;
use tidemark_core::{ConfigError, DataOperation, OrmFramework, SensitivityType, TableResolution};

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn scan(root: &Path, config: TidemarkConfig) -> tidemark_core::BoundaryScanResult {
    let mut detector = BoundaryDetector::new(root, config).unwrap();
    detector.scan(&mut InMemoryStore::new())
}

const EF_CONTEXT: &str = r#"
using Microsoft.EntityFrameworkCore;

public class ShopContext : DbContext
{
    public DbSet<Order> Orders;
}

public class OrderService
{
    private readonly ShopContext dbContext;

    public List<Order> Open()
    {
        return dbContext.Orders.Where(o => o.Status == "open").ToList();
    }
}
"#;

#[test]
fn test_ef_core_scenario() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Data/Shop.cs", EF_CONTEXT);

    let result = scan(dir.path(), TidemarkConfig::default());
    let map = &result.access_map;

    assert_eq!(map.models.len(), 1);
    assert_eq!(map.models[0].name, "Order");
    assert_eq!(map.models[0].framework, OrmFramework::EfCore);

    assert_eq!(map.access_points.len(), 1);
    let point = &map.access_points[0];
    assert_eq!(point.operation, DataOperation::Read);
    assert_eq!(point.table, "orders");
    assert!(!point.is_raw_sql);
    assert_eq!(point.framework, Some(OrmFramework::EfCore));
    assert_eq!(point.line, 15);
}

#[test]
fn test_raw_sql_scenario() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "app/sessions.py",
        "def expire(db, session_id):\n    db.execute(\"DELETE FROM sessions WHERE id = ?\", (session_id,))\n",
    );

    let result = scan(dir.path(), TidemarkConfig::default());
    let point = result
        .access_map
        .access_points
        .iter()
        .find(|p| p.table == "sessions")
        .unwrap();
    assert_eq!(point.operation, DataOperation::Delete);
    assert!(point.is_raw_sql);
    assert!(point.confidence >= 0.3 && point.confidence <= 0.7);
    assert_ne!(point.resolution, TableResolution::Learned);
    assert_eq!(result.stats.raw_sql_points, 1);
}

#[test]
fn test_sensitive_field_scenario() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "models/user.py",
        "class User:\n    id: int\n    email: str\n    password_hash: str\n",
    );

    let result = scan(dir.path(), TidemarkConfig::default());
    let field = result
        .access_map
        .sensitive_fields
        .iter()
        .find(|f| f.field == "password_hash")
        .unwrap();
    assert_eq!(field.sensitivity_type, SensitivityType::Credentials);
    assert_eq!(field.table.as_deref(), Some("User"));
    assert_eq!(field.line, 4);
    assert!(result.stats.sensitive_fields_found >= 2);
}

fn prisma_models(names: &[&str]) -> String {
    names.iter().map(|n| format!("model {} {{\n  id Int @id\n}}\n\n", n)).collect()
}

fn django_models(names: &[&str]) -> String {
    let mut source = String::from("from django.db import models\n\n");
    for name in names {
        source.push_str(&format!("class {}(models.Model):\n    name = models.CharField()\n\n", name));
    }
    source
}

#[test]
fn test_mixed_framework_corpus() {
    let mut even = ConventionLearner::new(LearningConfig::default());
    even.learn_from_file(&prisma_models(&["User", "Post", "Tag"]), "prisma/schema.prisma");
    even.learn_from_file(&django_models(&["Invoice", "Payment", "Refund"]), "billing/models.py");
    let conventions = even.finalize_learning(2);
    assert!(conventions.has_enough_data);
    assert_eq!(conventions.primary_framework, None);

    let prisma: Vec<String> = (0..9).map(|i| format!("Model{}", i)).collect();
    let prisma: Vec<&str> = prisma.iter().map(String::as_str).collect();
    let mut skewed = ConventionLearner::new(LearningConfig::default());
    skewed.learn_from_file(&prisma_models(&prisma), "prisma/schema.prisma");
    skewed.learn_from_file(&django_models(&["Invoice"]), "billing/models.py");
    assert_eq!(skewed.finalize_learning(2).primary_framework, Some(OrmFramework::Prisma));
}

const SCHEMA: &str = "model Account {\n  id Int @id\n}\n\nmodel Invoice {\n  id     Int    @id\n  status String\n}\n\nmodel Payment {\n  id Int @id\n}\n";
const BILLING: &str = "export async function open() {\n  return prisma.invoice.findMany({ where: { status: 'open' } });\n}\n";

#[test]
fn test_learned_path_beats_fallback() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "prisma/schema.prisma", SCHEMA);
    write(dir.path(), "src/billing.ts", BILLING);

    let learned = scan(dir.path(), TidemarkConfig::default());
    assert!(learned.stats.used_learning);
    let learned_point = learned.access_map.access_points.iter().find(|p| p.table == "invoices").unwrap();
    assert_eq!(learned_point.resolution, TableResolution::Learned);
    assert!((learned_point.confidence - 0.95).abs() < 1e-6);

    let config = TidemarkConfig {
        scan: ScanConfig {
            skip_learning: Some(true),
            ..Default::default()
        },
        ..Default::default()
    };
    let fallback = scan(dir.path(), config);
    assert!(!fallback.stats.used_learning);
    let fallback_point = fallback.access_map.access_points.iter().find(|p| p.table == "invoices").unwrap();
    assert_eq!(fallback_point.resolution, TableResolution::Framework);
    assert!(learned_point.confidence > fallback_point.confidence);
    assert_eq!(learned_point.id, fallback_point.id);
}

#[test]
fn test_insufficient_evidence_never_uses_learned_path() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "prisma/schema.prisma", &prisma_models(&["Account", "Invoice"]));
    write(dir.path(), "src/billing.ts", BILLING);

    let result = scan(dir.path(), TidemarkConfig::default());
    assert!(!result.stats.used_learning);
    assert_eq!(result.stats.learned_points, 0);
    assert!(result.access_map.access_points.iter().all(|p| p.confidence <= 0.7));
    assert!(result.access_map.table("invoices").is_some());
}

#[test]
fn test_scan_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "prisma/schema.prisma", SCHEMA);
    write(dir.path(), "src/billing.ts", BILLING);
    write(dir.path(), "Data/Shop.cs", EF_CONTEXT);
    write(dir.path(), "db/cleanup.sql", "DELETE FROM sessions WHERE expires_at < now();\n");

    let files: Vec<String> = ["src/billing.ts", "Data/Shop.cs", "db/cleanup.sql", "prisma/schema.prisma"]
        .iter()
        .map(|f| f.to_string())
        .collect();
    let mut detector = BoundaryDetector::new(dir.path(), TidemarkConfig::default()).unwrap();
    let first = detector.scan_files(&files, &mut InMemoryStore::new());
    let second = detector.scan_files(&files, &mut InMemoryStore::new());

    let key = |r: &tidemark_core::BoundaryScanResult| -> Vec<(String, u32)> {
        r.access_map
            .access_points
            .iter()
            .map(|p| (p.id.clone(), (p.confidence * 1000.0) as u32))
            .collect()
    };
    assert!(!first.access_map.access_points.is_empty());
    assert_eq!(key(&first), key(&second));
    assert_eq!(first.access_map.tables, second.access_map.tables);
}

#[test]
fn test_unreadable_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "ok.sql", "SELECT id FROM audit_log;\n");
    fs::write(dir.path().join("latin1.py"), b"name = '\xe9t\xe9'\n").unwrap();

    let files = vec!["ok.sql".to_string(), "latin1.py".to_string(), "missing.py".to_string()];
    let mut detector = BoundaryDetector::new(dir.path(), TidemarkConfig::default()).unwrap();
    let result = detector.scan_files(&files, &mut InMemoryStore::new());

    assert_eq!(result.stats.files_scanned, 1);
    assert_eq!(result.stats.files_skipped, 2);
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors.iter().any(|e| e.contains("UTF-8")));
    assert!(result.access_map.table("audit_log").is_some());
}

#[test]
fn test_configuration_errors_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        BoundaryDetector::new(dir.path().join("nope"), TidemarkConfig::default()),
        Err(ConfigError::RootNotFound { .. })
    ));

    let bad_glob = TidemarkConfig {
        scan: ScanConfig {
            include: vec!["src/[".to_string()],
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(
        BoundaryDetector::new(dir.path(), bad_glob),
        Err(ConfigError::InvalidGlob { .. })
    ));
}

#[test]
fn test_json_store_and_violations() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "web/views.py", "def purge(db):\n    db.execute(\"DELETE FROM payments\")\n");
    write(dir.path(), "billing/jobs.py", "def settle(db):\n    db.execute(\"UPDATE payments SET settled = 1\")\n");

    let rule = TableRule::restrict("payments-owner", "payments", &["billing/**"]).unwrap();
    let mut store = JsonFileStore::new(dir.path()).with_rule(rule);
    let mut detector = BoundaryDetector::new(dir.path(), TidemarkConfig::default()).unwrap();
    let result = detector.scan(&mut store);

    assert_eq!(result.violations.len(), 1);
    assert_eq!(result.stats.violations_found, 1);
    assert_eq!(result.violations[0].file, "web/views.py");
    assert_eq!(store.load().unwrap(), Some(result.access_map.clone()));

    let payments = result.access_map.table("payments").unwrap();
    assert_eq!(payments.access_count, 2);
    assert!(payments.operations.contains(&DataOperation::Delete));
    assert!(payments.operations.contains(&DataOperation::Write));
    assert_eq!(store.access_map(), result.access_map);
}
