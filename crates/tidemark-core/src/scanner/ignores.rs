//! Ignore rules for corpus discovery
//!
//! The walker only reads source, SQL and Prisma files, so the defaults
//! prune directories that hold third-party or build output and a few
//! generated source shapes that never carry hand-written data access.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

use crate::errors::ConfigError;

/// Project-level ignore file, gitignore syntax.
pub const IGNORE_FILE: &str = ".tidemarkignore";

/// Dependency, tooling and build directories, grouped by ecosystem.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    ".vs",
    ".tidemark",
    // Node
    "node_modules",
    "bower_components",
    ".next",
    ".nuxt",
    "dist",
    "coverage",
    // Python
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    "site-packages",
    "*.egg-info",
    // JVM
    "target",
    ".gradle",
    "build",
    // .NET
    "bin",
    "obj",
    // PHP
    "vendor",
];

/// Generated files in languages the walker would otherwise pick up.
pub const DEFAULT_IGNORE_FILES: &[&str] = &[
    "*.min.js",
    "*.bundle.js",
    "*.d.ts",
    "*.designer.cs",
    "*.g.cs",
    "*.g.i.cs",
    "*_pb2.py",
];

/// Compiled ignore matcher
pub struct IgnorePatterns {
    gitignore: Gitignore,
}

impl IgnorePatterns {
    /// Build the matcher from defaults, `.tidemarkignore`, `.gitignore`
    /// and `extra_patterns`.
    ///
    /// An invalid extra pattern is a configuration error. Broken lines in
    /// the project ignore files are skipped.
    pub fn new(root: &Path, extra_patterns: &[String]) -> Result<Self, ConfigError> {
        let mut builder = GitignoreBuilder::new(root);

        for pattern in DEFAULT_IGNORE_DIRS.iter().chain(DEFAULT_IGNORE_FILES) {
            let _ = builder.add_line(None, pattern);
        }

        for pattern in extra_patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| ConfigError::InvalidGlob {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
        }

        for file in [IGNORE_FILE, ".gitignore"] {
            let path = root.join(file);
            if path.is_file() {
                if let Some(err) = builder.add(&path) {
                    tracing::warn!(path = %path.display(), error = %err, "partially invalid ignore file");
                }
            }
        }

        let gitignore = builder.build().map_err(|e| ConfigError::InvalidGlob {
            pattern: "<ignore set>".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { gitignore })
    }

    /// Check if a path (relative to the root) should be ignored
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.gitignore
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_ignore_dependency_dirs() {
        let root = PathBuf::from("/project");
        let patterns = IgnorePatterns::new(&root, &[]).unwrap();

        assert!(patterns.is_ignored(Path::new("node_modules"), true));
        assert!(patterns.is_ignored(Path::new("src/node_modules"), true));
        assert!(patterns.is_ignored(Path::new(".tidemark"), true));
        assert!(patterns.is_ignored(Path::new("api/bin/Debug"), true));
        assert!(patterns.is_ignored(Path::new("vendor/laravel"), true));
    }

    #[test]
    fn test_ignore_generated_sources() {
        let root = PathBuf::from("/project");
        let patterns = IgnorePatterns::new(&root, &[]).unwrap();

        assert!(patterns.is_ignored(Path::new("static/app.min.js"), false));
        assert!(patterns.is_ignored(Path::new("types/index.d.ts"), false));
        assert!(patterns.is_ignored(Path::new("Migrations/Init.designer.cs"), false));
    }

    #[test]
    fn test_allow_source_files() {
        let root = PathBuf::from("/project");
        let patterns = IgnorePatterns::new(&root, &[]).unwrap();

        assert!(!patterns.is_ignored(Path::new("src/main.ts"), false));
        assert!(!patterns.is_ignored(Path::new("lib/utils.py"), false));
    }

    #[test]
    fn test_project_ignore_file_and_extras() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(IGNORE_FILE), "legacy/\n").unwrap();
        let patterns = IgnorePatterns::new(dir.path(), &["*.sql".to_string()]).unwrap();

        assert!(patterns.is_ignored(Path::new("legacy"), true));
        assert!(patterns.is_ignored(Path::new("db/schema.sql"), false));
        assert!(!patterns.is_ignored(Path::new("src/app.py"), false));
    }
}
