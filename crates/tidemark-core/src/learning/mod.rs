//! Convention learning
//!
//! A first pass over the corpus reads authoritative table declarations
//! (schemas, model classes, DDL) and learns how this codebase names and
//! reaches its tables. Detection then consults the snapshot before any
//! generic heuristic.

mod accumulator;
mod conventions;
pub mod declarations;
pub mod naming;

pub use accumulator::{LearningAccumulator, TableEvidence};
pub use conventions::{ConventionLearner, LearnedConventions};
pub use declarations::{has_data_access_evidence, scan_declarations, Declaration};
pub use naming::{Casing, NamingConvention, Plurality};
