//! Test file recognition by path convention.

use once_cell::sync::Lazy;
use regex::Regex;

static TEST_FILE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        (^test_.*\.py$)
        | (.*_test\.(py|go|php)$)
        | (.*\.(test|spec)\.(ts|tsx|js|jsx|mjs|cjs)$)
        | (.*Tests?\.(cs|java|php)$)
        | (.*IT\.java$)
        | (^conftest\.py$)
        ",
    )
    .expect("valid test file regex")
});

const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "specs", "__mocks__", "fixtures"];

/// Whether `path` looks like a test file.
///
/// Accepts relative or absolute paths with either separator.
pub fn is_test_file(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    let mut segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
    let Some(file_name) = segments.pop() else {
        return false;
    };

    if segments.iter().any(|dir| TEST_DIRS.contains(dir)) {
        return true;
    }
    TEST_FILE_NAME.is_match(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognizes_common_conventions() {
        assert!(is_test_file("app/test_models.py"));
        assert!(is_test_file("pkg/store_test.go"));
        assert!(is_test_file("src/users.spec.ts"));
        assert!(is_test_file("src/users.test.js"));
        assert!(is_test_file("Orders/OrderServiceTests.cs"));
        assert!(is_test_file("src/test/java/com/acme/OrderRepositoryTest.java"));
        assert!(is_test_file("project/tests/helpers.py"));
        assert!(is_test_file("web\\__tests__\\db.ts"));
    }

    #[test]
    fn test_leaves_sources_alone() {
        assert!(!is_test_file("app/models.py"));
        assert!(!is_test_file("src/Data/AppDbContext.cs"));
        assert!(!is_test_file("src/latest.ts"));
        assert!(!is_test_file("src/contest_entry.py"));
        assert!(!is_test_file(""));
    }
}
