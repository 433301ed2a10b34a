//! Extraction tiers and quality merging across every language adapter.

use proptest::prelude::*;

use tidemark_core::boundaries::{FileDetector, SensitiveFieldDetector, TableResolver};
use tidemark_core::config::ExtractionConfig;
use tidemark_core::extraction::{ExtractionMethod, ExtractionQuality, Extractor, HybridExtractor};
use tidemark_core::DataOperation;

/// One raw query per adapter, written the way each ecosystem usually does.
const SOURCES: &[(&str, &str)] = &[
    (
        "orders.py",
        "def totals(cursor):\n    cursor.execute(\"SELECT id, total FROM orders\")\n",
    ),
    (
        "Orders.java",
        "class Orders {\n    List<Order> all(JdbcTemplate jdbc) {\n        return jdbc.query(\"SELECT id, total FROM orders\", mapper);\n    }\n}\n",
    ),
    (
        "Orders.cs",
        "class Orders {\n    public IEnumerable<Order> All(IDbConnection connection) {\n        return connection.Query<Order>(\"SELECT id, total FROM orders\");\n    }\n}\n",
    ),
    (
        "orders.ts",
        "export async function all(pool: Pool) {\n  return pool.query(\"SELECT id, total FROM orders\");\n}\n",
    ),
    (
        "orders.js",
        "async function all(pool) {\n  return pool.query('SELECT id, total FROM orders');\n}\n",
    ),
    (
        "orders.php",
        "<?php\nfunction all($pdo) {\n    return $pdo->query(\"SELECT id, total FROM orders\");\n}\n",
    ),
];

fn pattern_only() -> ExtractionConfig {
    ExtractionConfig {
        structural_enabled: Some(false),
        ..Default::default()
    }
}

#[test]
fn test_pattern_tier_alone_finds_raw_sql() {
    let extractor = HybridExtractor::new(pattern_only());
    let resolver = TableResolver::new(None);
    let sensitive = SensitiveFieldDetector::new();
    let detector = FileDetector {
        extractor: &extractor,
        resolver: &resolver,
        sensitive: &sensitive,
    };

    for (file, source) in SOURCES {
        let extraction = extractor.extract(source, file);
        assert_eq!(extraction.quality.method, ExtractionMethod::Pattern, "{file}");
        assert!(extraction.quality.items_extracted > 0, "{file}");

        let records = detector.detect(source, file);
        let point = records
            .access_points
            .iter()
            .find(|p| p.table == "orders")
            .unwrap_or_else(|| panic!("no orders access in {file}"));
        assert_eq!(point.operation, DataOperation::Read, "{file}");
        assert!(point.is_raw_sql, "{file}");
        assert!(point.fields.iter().any(|f| f == "total"), "{file}");
    }
}

#[test]
fn test_structural_and_pattern_agree_on_tables() {
    let structural = HybridExtractor::new(ExtractionConfig::default());
    let pattern = HybridExtractor::new(pattern_only());
    let resolver = TableResolver::new(None);
    let sensitive = SensitiveFieldDetector::new();

    for (file, source) in SOURCES {
        let tables = |extractor: &HybridExtractor| -> Vec<String> {
            FileDetector {
                extractor,
                resolver: &resolver,
                sensitive: &sensitive,
            }
            .detect(source, file)
            .access_points
            .into_iter()
            .map(|p| p.table)
            .collect()
        };
        assert_eq!(tables(&structural), tables(&pattern), "{file}");
    }
}

#[test]
fn test_unsupported_file_is_empty() {
    let result = HybridExtractor::default().extract("SELECT 1", "notes.txt");
    assert_eq!(result.item_count(), 0);
    assert_eq!(result.quality.method, ExtractionMethod::Heuristic);
}

fn quality() -> impl Strategy<Value = ExtractionQuality> {
    (0.0f32..=1.0, 0.0f32..=100.0, 0usize..500, any::<bool>()).prop_map(|(confidence, coverage, items, structural)| {
        let method = if structural {
            ExtractionMethod::Structural
        } else {
            ExtractionMethod::Pattern
        };
        ExtractionQuality::new(method, confidence, coverage, items)
    })
}

proptest! {
    #[test]
    fn merge_is_item_weighted(a in quality(), b in quality()) {
        let merged = a.merge(&b);
        if a.items_extracted == 0 {
            prop_assert_eq!(merged, b);
        } else if b.items_extracted == 0 {
            prop_assert_eq!(merged, a);
        } else {
            let total = (a.items_extracted + b.items_extracted) as f32;
            let expected = (a.confidence * a.items_extracted as f32 + b.confidence * b.items_extracted as f32) / total;
            prop_assert!((merged.confidence - expected).abs() < 1e-4);
            prop_assert_eq!(merged.method, ExtractionMethod::Hybrid);
            prop_assert_eq!(merged.items_extracted, a.items_extracted + b.items_extracted);
            prop_assert!(merged.used_fallback);
        }
    }
}
