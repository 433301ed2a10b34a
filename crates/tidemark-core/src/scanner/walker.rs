//! File walker used by `BoundaryDetector::scan`
//!
//! Walks the root single-threaded (walk order does not matter, the output
//! is sorted) and leaves the parallel work to the detector.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use super::ignores::IgnorePatterns;
use super::types::{WalkOutput, WalkerConfig};
use crate::errors::ConfigError;
use crate::parsers::Language;

/// Extensions read by the boundary scan besides the structural languages.
const EXTRA_SOURCE_EXTENSIONS: &[&str] = &["prisma", "sql"];

/// Corpus discovery collaborator.
pub trait FileWalker: Send + Sync {
    /// Return candidate files under `root`, relative to it.
    fn walk(&self, root: &Path) -> WalkOutput;
}

/// Whether the boundary scan reads this file at all.
pub fn is_candidate_source(path: &str) -> bool {
    if Language::from_path(path).is_some() {
        return true;
    }
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| EXTRA_SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Walker honoring default ignores, `.gitignore`, `.tidemarkignore`,
/// extra ignore globs and include globs.
pub struct DefaultFileWalker {
    config: WalkerConfig,
    ignores: IgnorePatterns,
    include_globs: GlobSet,
}

impl DefaultFileWalker {
    /// Compile the walker for `root`. Invalid globs are configuration errors.
    pub fn new(root: &Path, config: WalkerConfig) -> Result<Self, ConfigError> {
        let ignores = IgnorePatterns::new(root, &config.extra_ignores)?;

        let mut builder = GlobSetBuilder::new();
        for pattern in &config.include {
            let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }
        let include_globs = builder.build().map_err(|e| ConfigError::InvalidGlob {
            pattern: config.include.join(","),
            message: e.to_string(),
        })?;

        Ok(Self {
            config,
            ignores,
            include_globs,
        })
    }
}

impl FileWalker for DefaultFileWalker {
    fn walk(&self, root: &Path) -> WalkOutput {
        let mut output = WalkOutput::default();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
                !self.ignores.is_ignored(relative, entry.file_type().is_dir())
            });

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    output.errors.push(e.to_string());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let relative_str = relative.to_string_lossy().replace('\\', "/");

            if !self.include_globs.is_empty() && !self.include_globs.is_match(relative) {
                continue;
            }
            if !is_candidate_source(&relative_str) {
                continue;
            }

            match entry.metadata() {
                Ok(meta) if meta.len() > self.config.max_file_size => {
                    output.files_skipped += 1;
                }
                Ok(_) => output.files.push(relative_str),
                Err(e) => output.errors.push(format!("{}: {}", relative_str, e)),
            }
        }

        output.files.sort();
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn corpus() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/models")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join("generated")).unwrap();
        fs::write(root.join("src/models/user.py"), "class User: pass\n").unwrap();
        fs::write(root.join("src/app.ts"), "export const x = 1;\n").unwrap();
        fs::write(root.join("src/README.md"), "# docs\n").unwrap();
        fs::write(root.join("schema.prisma"), "model User {}\n").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "module.exports = {};\n").unwrap();
        fs::write(root.join("generated/client.ts"), "export {};\n").unwrap();
        fs::write(root.join(".gitignore"), "generated/\n").unwrap();
        dir
    }

    #[test]
    fn test_walk_respects_ignores_and_extensions() {
        let dir = corpus();
        let walker = DefaultFileWalker::new(dir.path(), WalkerConfig::default()).unwrap();
        let output = walker.walk(dir.path());

        assert_eq!(
            output.files,
            vec![
                "schema.prisma".to_string(),
                "src/app.ts".to_string(),
                "src/models/user.py".to_string(),
            ]
        );
    }

    #[test]
    fn test_include_globs_and_size_limit() {
        let dir = corpus();
        let config = WalkerConfig {
            include: vec!["src/**/*.py".to_string(), "src/*.ts".to_string()],
            extra_ignores: vec![],
            max_file_size: 18,
        };
        let walker = DefaultFileWalker::new(dir.path(), config).unwrap();
        let output = walker.walk(dir.path());

        // user.py is 17 bytes, app.ts is 20.
        assert_eq!(output.files, vec!["src/models/user.py".to_string()]);
        assert_eq!(output.files_skipped, 1);
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = WalkerConfig {
            include: vec!["src/[".to_string()],
            ..WalkerConfig::default()
        };
        let err = DefaultFileWalker::new(dir.path(), config).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidGlob { .. }));
    }
}
