//! Per-file learning evidence and its merge.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::declarations::{scan_declarations, Declaration};
use super::naming::{pluralize, singularize, to_snake_case};
use crate::boundaries::OrmFramework;

/// What the corpus says about one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableEvidence {
    /// Declarations seen
    pub count: usize,
    /// Files declaring the table
    pub sources: BTreeSet<String>,
    /// Lowercased identifiers that reach the table
    pub accessors: BTreeSet<String>,
    pub frameworks: BTreeSet<OrmFramework>,
}

impl TableEvidence {
    fn merge(&mut self, other: TableEvidence) {
        self.count += other.count;
        self.sources.extend(other.sources);
        self.accessors.extend(other.accessors);
        self.frameworks.extend(other.frameworks);
    }
}

/// Evidence gathered from some files. Workers build one per file and the
/// orchestrator reduces them with `merge`.
#[derive(Debug, Clone, Default)]
pub struct LearningAccumulator {
    pub tables: FxHashMap<String, TableEvidence>,
    pub framework_counts: FxHashMap<OrmFramework, usize>,
    pub files_with_evidence: usize,
    pub files_scanned: usize,
}

impl LearningAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(content: &str, path: &str) -> Self {
        let mut acc = Self::new();
        acc.add_file(content, path);
        acc
    }

    pub fn add_file(&mut self, content: &str, path: &str) {
        self.files_scanned += 1;
        let declarations = scan_declarations(content, path);
        if declarations.is_empty() {
            return;
        }
        self.files_with_evidence += 1;
        for declaration in &declarations {
            self.record(declaration, path);
        }
    }

    fn record(&mut self, declaration: &Declaration, path: &str) {
        let table = declaration.table.clone();
        let evidence = self.tables.entry(table).or_default();
        evidence.count += 1;
        evidence.sources.insert(path.to_string());
        evidence.frameworks.insert(declaration.framework);
        evidence.accessors.extend(accessors_for(declaration));
        *self.framework_counts.entry(declaration.framework).or_insert(0) += 1;
    }

    pub fn merge(&mut self, other: LearningAccumulator) {
        for (table, evidence) in other.tables {
            self.tables.entry(table).or_default().merge(evidence);
        }
        for (framework, count) in other.framework_counts {
            *self.framework_counts.entry(framework).or_insert(0) += count;
        }
        self.files_with_evidence += other.files_with_evidence;
        self.files_scanned += other.files_scanned;
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Identifiers a codebase uses to reach a declared table: the model and
/// table names in singular and plural, with and without underscores.
fn accessors_for(declaration: &Declaration) -> BTreeSet<String> {
    let mut names = vec![declaration.table.clone()];
    if let Some(model) = &declaration.model {
        names.push(model.clone());
    }

    let mut accessors = BTreeSet::new();
    for name in names {
        let snake = to_snake_case(&name);
        for form in [snake.clone(), singularize(&snake), pluralize(&snake)] {
            let form = form.to_lowercase();
            if form.is_empty() {
                continue;
            }
            accessors.insert(form.replace('_', ""));
            accessors.insert(form);
        }
        accessors.insert(name.to_lowercase());
    }
    accessors
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODELS: &str = "class OrderItem(models.Model):\n    sku = models.CharField()\n";

    #[test]
    fn test_from_file_records_accessors() {
        let acc = LearningAccumulator::from_file(MODELS, "shop/models.py");
        assert_eq!(acc.files_scanned, 1);
        assert_eq!(acc.files_with_evidence, 1);

        let evidence = &acc.tables["order_items"];
        assert_eq!(evidence.count, 1);
        assert!(evidence.sources.contains("shop/models.py"));
        for accessor in ["order_items", "order_item", "orderitem", "orderitems"] {
            assert!(evidence.accessors.contains(accessor), "missing {accessor}");
        }
        assert_eq!(acc.framework_counts[&OrmFramework::Django], 1);
    }

    #[test]
    fn test_file_without_declarations() {
        let acc = LearningAccumulator::from_file("print('hi')\n", "hello.py");
        assert_eq!(acc.files_scanned, 1);
        assert_eq!(acc.files_with_evidence, 0);
        assert!(acc.is_empty());
    }

    #[test]
    fn test_merge_sums_evidence() {
        let mut left = LearningAccumulator::from_file(MODELS, "a/models.py");
        let right = LearningAccumulator::from_file(MODELS, "b/models.py");
        left.merge(right);
        left.merge(LearningAccumulator::new());

        assert_eq!(left.files_scanned, 2);
        assert_eq!(left.files_with_evidence, 2);
        let evidence = &left.tables["order_items"];
        assert_eq!(evidence.count, 2);
        assert_eq!(evidence.sources.len(), 2);
        assert_eq!(left.framework_counts[&OrmFramework::Django], 2);
    }
}
