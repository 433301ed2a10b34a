//! Sensitive field names (PII, credentials, financial, health) and the model
//! or table they most likely belong to.

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::{SensitiveField, SensitivityType};

/// Lines above a match searched for the owning model or table.
pub const TABLE_HINT_LOOKBACK: usize = 50;

const FALSE_POSITIVE_PENALTY: f32 = 0.4;
const MIN_CONFIDENCE: f32 = 0.5;

/// Pattern with specificity score
struct SensitivePattern {
    pattern: Regex,
    specificity: f32,
}

fn table(rows: &[(&str, f32)]) -> Vec<SensitivePattern> {
    rows.iter()
        .map(|&(pattern, specificity)| SensitivePattern {
            pattern: Regex::new(pattern).expect("sensitive pattern"),
            specificity,
        })
        .collect()
}

static PATTERNS: Lazy<Vec<(SensitivityType, Vec<SensitivePattern>)>> = Lazy::new(|| {
    vec![
        (
            SensitivityType::Pii,
            table(&[
                (r"(?i)\bssn\b", 0.95),
                (r"(?i)\bsocial_security\w*", 0.95),
                (r"(?i)\bdate_of_birth\b", 0.9),
                (r"(?i)\bdob\b", 0.85),
                (r"(?i)\bphone_number\b", 0.85),
                (r"(?i)\bpassport_number\b", 0.9),
                (r"(?i)\bfull_name\b", 0.8),
                (r"(?i)\bfirst_name\b", 0.75),
                (r"(?i)\blast_name\b", 0.75),
                (r"(?i)\bemail\b", 0.65),
                (r"(?i)\bphone\b", 0.6),
                (r"(?i)\baddress\b", 0.5),
            ]),
        ),
        (
            SensitivityType::Credentials,
            table(&[
                (r"(?i)\bpassword_hash\b", 0.95),
                (r"(?i)\bhashed_password\b", 0.95),
                (r"(?i)\bapi_key\b", 0.9),
                (r"(?i)\bprivate_key\b", 0.9),
                (r"(?i)\bsecret_key\b", 0.9),
                (r"(?i)\brefresh_token\b", 0.9),
                (r"(?i)\baccess_token\b", 0.85),
                (r"(?i)\bauth_token\b", 0.85),
                (r"(?i)\bpassword\b", 0.75),
                (r"(?i)\bsalt\b", 0.7),
            ]),
        ),
        (
            SensitivityType::Financial,
            table(&[
                (r"(?i)\bcredit_card\w*", 0.95),
                (r"(?i)\bcard_number\b", 0.9),
                (r"(?i)\bcvv\b", 0.95),
                (r"(?i)\bbank_account\w*", 0.9),
                (r"(?i)\biban\b", 0.9),
                (r"(?i)\brouting_number\b", 0.9),
                (r"(?i)\bsalary\b", 0.85),
                (r"(?i)\bincome\b", 0.8),
            ]),
        ),
        (
            SensitivityType::Health,
            table(&[
                (r"(?i)\bdiagnosis\b", 0.9),
                (r"(?i)\bprescription\b", 0.9),
                (r"(?i)\bmedical_record\w*", 0.95),
                (r"(?i)\bhealth_record\w*", 0.95),
                (r"(?i)\bblood_type\b", 0.85),
            ]),
        ),
    ]
});

static FALSE_POSITIVES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(?:get|set|is|has|check|validate)(?:Password|Email|Phone)",
        r"(?i)(?:function|def|fn)\s+\w*(?:password|email|phone)\w*\s*\(",
        r"(?i)(?:import|require|from)\s+.*(?:password|email|phone)",
        r"(?i)//.*(?:password|email|phone)",
        r"(?i)(?:mock|fake|test|dummy)(?:Password|Email|Phone)",
        r"(?i)health[_-]?check",
        r"(?i)health[_-]?endpoint",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("false positive pattern"))
    .collect()
});

/// Declarations that name the model or table owning the fields below them.
static TABLE_HINTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"__tablename__\s*=\s*['"](\w+)['"]"#,
        r#"@Table\s*\(\s*(?:name\s*=\s*)?['"](\w+)['"]"#,
        r#"\btableName\s*:\s*['"](\w+)['"]"#,
        r#"\$table\s*=\s*['"](\w+)['"]"#,
        r#"(?i)\bCREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?[`"\[]?(\w+)"#,
        r"^\s*model\s+(\w+)\s*\{",
        r"\b(?:class|interface|record|struct)\s+(\w+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("table hint pattern"))
    .collect()
});

/// Sensitive field detector
#[derive(Debug, Default, Clone, Copy)]
pub struct SensitiveFieldDetector;

impl SensitiveFieldDetector {
    pub fn new() -> Self {
        Self
    }

    /// Detect sensitive fields in source code
    pub fn detect(&self, source: &str, file: &str) -> Vec<SensitiveField> {
        let mut fields = Vec::new();
        let lines: Vec<&str> = source.lines().collect();

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with("//")
                || trimmed.starts_with('#')
                || trimmed.starts_with('*')
                || trimmed.starts_with("/*")
                || trimmed.starts_with("--")
            {
                continue;
            }

            let is_false_positive = FALSE_POSITIVES.iter().any(|p| p.is_match(line));
            let mut table: Option<Option<String>> = None;

            for (sensitivity_type, patterns) in PATTERNS.iter() {
                let Some((field, confidence)) = best_match(line, patterns, is_false_positive) else {
                    continue;
                };
                let table = table.get_or_insert_with(|| table_hint(&lines, i)).clone();
                fields.push(SensitiveField {
                    field,
                    table,
                    sensitivity_type: *sensitivity_type,
                    file: file.to_string(),
                    line: (i + 1) as u32,
                    confidence,
                });
            }
        }

        fields
    }
}

/// First pattern in the table that survives the false-positive penalty.
/// One match per type per line.
fn best_match(line: &str, patterns: &[SensitivePattern], is_false_positive: bool) -> Option<(String, f32)> {
    patterns.iter().find_map(|sp| {
        let m = sp.pattern.find(line)?;
        let mut confidence = sp.specificity;
        if is_false_positive {
            confidence = (confidence - FALSE_POSITIVE_PENALTY).max(0.1);
        }
        (confidence >= MIN_CONFIDENCE).then(|| (m.as_str().to_string(), confidence))
    })
}

/// Nearest model or table declared at or above `index`, within the lookback.
fn table_hint(lines: &[&str], index: usize) -> Option<String> {
    let first = index.saturating_sub(TABLE_HINT_LOOKBACK);
    lines[first..=index].iter().rev().find_map(|line| {
        TABLE_HINTS
            .iter()
            .find_map(|hint| hint.captures(line).and_then(|c| c.get(1)))
            .map(|m| m.as_str().to_string())
    })
}
