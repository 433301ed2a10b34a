//! Scanner module - corpus discovery for boundary scans
//!
//! The detector takes its file list either from the caller or from a
//! [`FileWalker`]. The default walker uses:
//! - `walkdir` for the directory traversal
//! - `ignore` for gitignore-style pattern matching
//! - `globset` for include patterns

mod cancellation;
mod ignores;
mod test_files;
mod types;
mod walker;

pub use cancellation::CancellationToken;
pub use ignores::{IgnorePatterns, DEFAULT_IGNORE_DIRS, DEFAULT_IGNORE_FILES, IGNORE_FILE};
pub use test_files::is_test_file;
pub use types::{WalkOutput, WalkerConfig};
pub use walker::{is_candidate_source, DefaultFileWalker, FileWalker};
