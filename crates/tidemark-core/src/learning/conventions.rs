//! Convention learner: turns accumulated evidence into a read-only
//! snapshot used during detection.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::accumulator::{LearningAccumulator, TableEvidence};
use super::naming::NamingConvention;
use crate::boundaries::OrmFramework;
use crate::config::LearningConfig;

/// What was learned from one corpus.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnedConventions {
    pub tables: BTreeMap<String, TableEvidence>,
    pub table_naming_convention: NamingConvention,
    pub primary_framework: Option<OrmFramework>,
    pub framework_counts: BTreeMap<OrmFramework, usize>,
    pub has_enough_data: bool,
    pub files_scanned: usize,
    pub files_with_evidence: usize,
    /// accessor -> table
    #[serde(skip)]
    accessor_index: FxHashMap<String, String>,
}

impl LearnedConventions {
    /// Table reached by a (lowercased) identifier, if any learned accessor
    /// matches it.
    pub fn infer_table_from_variable(&self, identifier: &str) -> Option<&str> {
        let key = identifier.to_lowercase();
        self.accessor_index
            .get(&key)
            .or_else(|| self.accessor_index.get(&key.replace('_', "")))
            .map(String::as_str)
    }

    pub fn knows_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Index accessors. When two tables share an accessor the one with
    /// more declarations wins, then the lexicographically first.
    fn build_index(tables: &BTreeMap<String, TableEvidence>) -> FxHashMap<String, String> {
        let mut index: FxHashMap<String, String> = FxHashMap::default();
        for (table, evidence) in tables {
            for accessor in &evidence.accessors {
                let replace = index
                    .get(accessor)
                    .map_or(true, |current| tables[current].count < evidence.count);
                if replace {
                    index.insert(accessor.clone(), table.clone());
                }
            }
        }
        index
    }
}

/// First-pass learner. Owns the accumulator until `finalize_learning`.
#[derive(Debug, Default)]
pub struct ConventionLearner {
    config: LearningConfig,
    accumulator: LearningAccumulator,
    conventions: Option<LearnedConventions>,
}

impl ConventionLearner {
    pub fn new(config: LearningConfig) -> Self {
        Self {
            config,
            accumulator: LearningAccumulator::new(),
            conventions: None,
        }
    }

    /// Scan one file's declarations into the accumulator.
    pub fn learn_from_file(&mut self, content: &str, path: &str) {
        self.accumulator.add_file(content, path);
    }

    /// Fold a worker's partial evidence in.
    pub fn absorb(&mut self, partial: LearningAccumulator) {
        self.accumulator.merge(partial);
    }

    pub fn reset(&mut self) {
        self.accumulator = LearningAccumulator::new();
        self.conventions = None;
    }

    pub fn conventions(&self) -> Option<&LearnedConventions> {
        self.conventions.as_ref()
    }

    pub fn infer_table_from_variable(&self, identifier: &str) -> Option<&str> {
        self.conventions.as_ref()?.infer_table_from_variable(identifier)
    }

    /// Build the snapshot. `total_files_scanned` is the size of the corpus,
    /// including files the learner never saw.
    pub fn finalize_learning(&mut self, total_files_scanned: usize) -> &LearnedConventions {
        let acc = std::mem::take(&mut self.accumulator);
        let tables: BTreeMap<String, TableEvidence> = acc.tables.into_iter().collect();
        let framework_counts: BTreeMap<OrmFramework, usize> = acc.framework_counts.into_iter().collect();

        let table_naming_convention = NamingConvention::from_names(tables.keys().map(String::as_str));
        let primary_framework =
            dominant_framework(&framework_counts, self.config.effective_dominance_threshold());

        let files_scanned = total_files_scanned.max(acc.files_scanned);
        let ratio = if files_scanned == 0 {
            0.0
        } else {
            acc.files_with_evidence as f64 / files_scanned as f64
        };
        let has_enough_data = tables.len() >= self.config.effective_min_tables()
            && acc.files_with_evidence >= self.config.effective_min_files()
            && ratio >= self.config.effective_min_file_ratio();

        tracing::debug!(
            tables = tables.len(),
            files_with_evidence = acc.files_with_evidence,
            files_scanned,
            has_enough_data,
            primary_framework = ?primary_framework,
            "learning finalized"
        );

        let accessor_index = LearnedConventions::build_index(&tables);
        self.conventions.insert(LearnedConventions {
            tables,
            table_naming_convention,
            primary_framework,
            framework_counts,
            has_enough_data,
            files_scanned,
            files_with_evidence: acc.files_with_evidence,
            accessor_index,
        })
    }
}

/// The single most common framework, if its share reaches `threshold`.
fn dominant_framework(counts: &BTreeMap<OrmFramework, usize>, threshold: f64) -> Option<OrmFramework> {
    let total: usize = counts.values().sum();
    let top = counts.values().copied().max()?;
    let mut leaders = counts.iter().filter(|&(_, &count)| count == top);
    let (&framework, _) = leaders.next()?;
    if leaders.next().is_some() || total == 0 {
        return None;
    }
    (top as f64 / total as f64 >= threshold).then_some(framework)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prisma_schema(models: &[&str]) -> String {
        models
            .iter()
            .map(|m| format!("model {} {{\n  id Int @id\n}}\n", m))
            .collect()
    }

    #[test]
    fn test_learns_tables_and_accessors() {
        let mut learner = ConventionLearner::new(LearningConfig::default());
        learner.learn_from_file(&prisma_schema(&["User", "Order", "OrderItem"]), "schema.prisma");
        learner.learn_from_file("export const sum = (a, b) => a + b;\n", "math.ts");

        let conventions = learner.finalize_learning(2);
        assert!(conventions.has_enough_data);
        assert_eq!(conventions.tables.len(), 3);
        assert!(conventions.knows_table("order_items"));
        assert!(!conventions.knows_table("OrderItem"));
        assert_eq!(conventions.primary_framework, Some(OrmFramework::Prisma));
        assert_eq!(conventions.files_with_evidence, 1);
        assert_eq!(conventions.infer_table_from_variable("orderitem"), Some("order_items"));
        assert_eq!(conventions.infer_table_from_variable("users"), Some("users"));
        assert_eq!(conventions.infer_table_from_variable("order_item"), Some("order_items"));
        assert_eq!(conventions.infer_table_from_variable("invoice"), None);
        assert_eq!(learner.infer_table_from_variable("user"), Some("users"));
    }

    #[test]
    fn test_not_enough_data() {
        let mut learner = ConventionLearner::new(LearningConfig::default());
        learner.learn_from_file(&prisma_schema(&["User", "Order"]), "schema.prisma");
        assert!(!learner.finalize_learning(1).has_enough_data);

        let mut sparse = ConventionLearner::new(LearningConfig::default());
        sparse.learn_from_file(&prisma_schema(&["A", "B", "C"]), "schema.prisma");
        // one contributing file out of 1000 is under the 1% ratio
        assert!(!sparse.finalize_learning(1000).has_enough_data);
    }

    #[test]
    fn test_mixed_frameworks_have_no_primary() {
        let mut learner = ConventionLearner::new(LearningConfig::default());
        learner.learn_from_file(&prisma_schema(&["User", "Order"]), "schema.prisma");
        learner.learn_from_file(
            "class Invoice(models.Model):\n    total = models.IntegerField()\n\nclass Refund(models.Model):\n    pass\n",
            "billing/models.py",
        );
        let conventions = learner.finalize_learning(2);
        assert_eq!(conventions.primary_framework, None);
        assert!(conventions.has_enough_data);
    }

    #[test]
    fn test_parallel_partials_match_sequential() {
        let files = [
            (prisma_schema(&["User", "Order"]), "schema.prisma"),
            ("CREATE TABLE audit_log (id int);".to_string(), "db/init.sql"),
        ];

        let mut sequential = ConventionLearner::new(LearningConfig::default());
        for (content, path) in &files {
            sequential.learn_from_file(content, path);
        }

        let mut parallel = ConventionLearner::new(LearningConfig::default());
        for (content, path) in files.iter().rev() {
            parallel.absorb(LearningAccumulator::from_file(content, path));
        }

        let a = sequential.finalize_learning(2).clone();
        let b = parallel.finalize_learning(2);
        assert_eq!(a.tables, b.tables);
        assert_eq!(a.framework_counts, b.framework_counts);
        assert_eq!(a.has_enough_data, b.has_enough_data);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut learner = ConventionLearner::new(LearningConfig::default());
        learner.learn_from_file(&prisma_schema(&["User", "Order", "Item"]), "schema.prisma");
        learner.finalize_learning(1);
        learner.reset();
        assert!(learner.conventions().is_none());
        assert!(learner.finalize_learning(0).tables.is_empty());
    }

    #[test]
    fn test_dominance_threshold() {
        let counts: BTreeMap<_, _> = [(OrmFramework::Prisma, 9), (OrmFramework::Knex, 1)].into_iter().collect();
        assert_eq!(dominant_framework(&counts, 0.6), Some(OrmFramework::Prisma));
        assert_eq!(dominant_framework(&counts, 0.95), None);

        let tied: BTreeMap<_, _> = [(OrmFramework::Prisma, 3), (OrmFramework::Django, 3)].into_iter().collect();
        assert_eq!(dominant_framework(&tied, 0.0), None);
        assert_eq!(dominant_framework(&BTreeMap::new(), 0.6), None);
    }
}
