//! SQL text inside string literals and source lines.

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::DataOperation;

static SQL_SELECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\bSELECT\s+(.+?)\s+FROM\s+(?:[`"\[]?\w+[`"\]]?\.)?[`"\[]?([a-zA-Z_][a-zA-Z0-9_]*)"#)
        .expect("select regex")
});
static SQL_INSERT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\bINSERT\s+(?:OR\s+\w+\s+)?INTO\s+(?:[`"\[]?\w+[`"\]]?\.)?[`"\[]?([a-zA-Z_][a-zA-Z0-9_]*)[`"\]]?\s*(?:\(([^)]*)\))?"#)
        .expect("insert regex")
});
static SQL_UPDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\bUPDATE\s+(?:[`"\[]?\w+[`"\]]?\.)?[`"\[]?([a-zA-Z_][a-zA-Z0-9_]*)[`"\]]?\s+SET\s+(.+?)(?:\s+WHERE\b|$)"#)
        .expect("update regex")
});
static SQL_DELETE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)\bDELETE\s+FROM\s+(?:[`"\[]?\w+[`"\]]?\.)?[`"\[]?([a-zA-Z_][a-zA-Z0-9_]*)"#)
        .expect("delete regex")
});
static SQL_WHERE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bWHERE\s+(.+)$").expect("where regex"));
static COLUMN_COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\w+\.)?([a-zA-Z_]\w*)\s*(?:=|<>|!=|<=|>=|<|>|\bLIKE\b|\bIN\b|\bIS\b)")
        .expect("comparison regex")
});
static SET_ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\w+\.)?([a-zA-Z_]\w*)\s*=").expect("assignment regex"));

/// Lowercase SELECT lists must look like columns: `*`, `a, t.b`, `count(*)`, `c as d`.
static COLUMN_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^\s*[\w.*`"\[\]()]+(?:\s+as\s+\w+)?(?:\s*,\s*[\w.*`"\[\]()]+(?:\s+as\s+\w+)?)*\s*$"#)
        .expect("column list regex")
});

/// Words that follow a table name inside a statement.
const CLAUSE_KEYWORDS: &[&str] = &[
    "where", "set", "values", "value", "join", "inner", "left", "right", "full", "cross", "natural", "on",
    "using", "order", "group", "having", "limit", "offset", "returning", "union", "output", "select",
    "default", "for", "as",
];

/// Determiners and pronouns that follow FROM or INTO in prose.
const PROSE_WORDS: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "your", "my", "our", "their", "his", "her", "its",
    "it", "them", "here", "there", "any", "all", "each", "every", "some",
];

const SQL_KEYWORDS: &[&str] = &[
    "and", "or", "not", "null", "select", "from", "where", "as", "on", "in", "is", "like", "distinct",
    "case", "when", "then", "else", "end", "true", "false", "count", "sum", "avg", "min", "max",
];

/// What a SQL statement touches.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub operation: DataOperation,
    pub table: String,
    pub fields: Vec<String>,
}

/// Whether `text` reads like a SQL statement rather than prose.
pub fn looks_like_sql(text: &str) -> bool {
    parse_sql(text).is_some()
}

/// First statement found in `text`. Mutations win over reads so that
/// `INSERT INTO a SELECT ... FROM b` reports the write to `a`.
pub fn parse_sql(text: &str) -> Option<SqlStatement> {
    if let Some(caps) = SQL_DELETE.captures(text).filter(|c| plausible(text, c, 1, None)) {
        let table = caps.get(1)?.as_str().to_string();
        return Some(SqlStatement {
            operation: DataOperation::Delete,
            table,
            fields: where_fields(text),
        });
    }
    if let Some(caps) = SQL_INSERT.captures(text).filter(|c| plausible(text, c, 1, None)) {
        let table = caps.get(1)?.as_str().to_string();
        let fields = caps
            .get(2)
            .map(|cols| column_list(cols.as_str()))
            .unwrap_or_default();
        return Some(SqlStatement {
            operation: DataOperation::Write,
            table,
            fields,
        });
    }
    if let Some(caps) = SQL_UPDATE.captures(text).filter(|c| plausible(text, c, 1, None)) {
        let table = caps.get(1)?.as_str().to_string();
        let mut fields: Vec<String> = caps
            .get(2)
            .map(|set| {
                SET_ASSIGNMENT
                    .captures_iter(set.as_str())
                    .filter_map(|c| c.get(1))
                    .map(|c| c.as_str().to_string())
                    .collect()
            })
            .unwrap_or_default();
        push_unique(&mut fields, where_fields(text));
        return Some(SqlStatement {
            operation: DataOperation::Write,
            table,
            fields,
        });
    }
    if let Some(caps) = SQL_SELECT.captures(text).filter(|c| plausible(text, c, 2, Some(1))) {
        let table = caps.get(2)?.as_str().to_string();
        let mut fields = caps
            .get(1)
            .map(|cols| column_list(cols.as_str()))
            .unwrap_or_default();
        push_unique(&mut fields, where_fields(text));
        return Some(SqlStatement {
            operation: DataOperation::Read,
            table,
            fields,
        });
    }
    None
}

/// Uppercase keywords are trusted. Lowercase ones must open the text or
/// follow a quote or paren, and the rest of the statement must be shaped
/// like SQL. Capitalized keywords (`Select a country from the list`) are
/// prose, and so is a table named by a determiner.
fn plausible(text: &str, caps: &regex::Captures<'_>, table: usize, columns: Option<usize>) -> bool {
    let (Some(whole), Some(table)) = (caps.get(0), caps.get(table)) else {
        return false;
    };
    if PROSE_WORDS.contains(&table.as_str().to_ascii_lowercase().as_str()) {
        return false;
    }
    let keyword: String = whole.as_str().chars().take_while(|c| c.is_alphabetic()).collect();
    if keyword.chars().all(|c| c.is_uppercase()) {
        return true;
    }
    if !keyword.chars().all(|c| c.is_lowercase()) {
        return false;
    }
    let opens = matches!(
        text[..whole.start()].trim_end().chars().last(),
        None | Some('"' | '\'' | '`' | '(' | '=' | ',')
    );
    let columns_ok = columns
        .and_then(|i| caps.get(i))
        .map_or(true, |cols| COLUMN_LIST.is_match(cols.as_str()));
    opens && columns_ok && clause_follows(&text[table.end()..])
}

/// Whether the text after a table name ends the statement or continues
/// it with a clause, allowing one alias: `users u WHERE ...`.
fn clause_follows(tail: &str) -> bool {
    let tail = tail.trim_start_matches(['`', '"', ']']);
    let mut words = tail.split_whitespace();
    let ends = |word: &str| {
        word.starts_with([';', ',', ')', '(', '"', '\'', '`'])
            || CLAUSE_KEYWORDS.contains(&leading_word(word).as_str())
    };
    let Some(first) = words.next() else {
        return true;
    };
    if ends(first) {
        return true;
    }
    first.chars().all(|c| c.is_alphanumeric() || c == '_') && words.next().is_some_and(ends)
}

fn leading_word(word: &str) -> String {
    word.chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// `a, t.b, c AS d, *` -> `a, b, c`
fn column_list(list: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for column in list.split(',') {
        let column = column.trim();
        let column = column
            .split_whitespace()
            .next()
            .unwrap_or("")
            .rsplit('.')
            .next()
            .unwrap_or("")
            .trim_matches(|c| c == '`' || c == '"' || c == '[' || c == ']');
        if is_column_name(column) && !fields.iter().any(|f| f == column) {
            fields.push(column.to_string());
        }
    }
    fields
}

fn where_fields(text: &str) -> Vec<String> {
    let Some(clause) = SQL_WHERE.captures(text).and_then(|c| c.get(1)) else {
        return Vec::new();
    };
    let mut fields = Vec::new();
    for caps in COLUMN_COMPARISON.captures_iter(clause.as_str()) {
        if let Some(column) = caps.get(1) {
            let column = column.as_str();
            if is_column_name(column) && !fields.iter().any(|f: &String| f == column) {
                fields.push(column.to_string());
            }
        }
    }
    fields
}

fn is_column_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !SQL_KEYWORDS.contains(&name.to_ascii_lowercase().as_str())
}

fn push_unique(fields: &mut Vec<String>, more: Vec<String>) {
    for field in more {
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_kinds() {
        let select = parse_sql("SELECT u.id, email AS mail FROM users u WHERE u.active = true").unwrap();
        assert_eq!(select.operation, DataOperation::Read);
        assert_eq!(select.table, "users");
        assert_eq!(select.fields, vec!["id", "email", "active"]);

        let insert = parse_sql("INSERT INTO orders (user_id, total) VALUES (?, ?)").unwrap();
        assert_eq!(insert.operation, DataOperation::Write);
        assert_eq!(insert.table, "orders");
        assert_eq!(insert.fields, vec!["user_id", "total"]);

        let update = parse_sql("UPDATE accounts SET balance = ? WHERE id = ?").unwrap();
        assert_eq!(update.table, "accounts");
        assert_eq!(update.fields, vec!["balance", "id"]);

        let delete = parse_sql("DELETE FROM sessions WHERE id = ?").unwrap();
        assert_eq!(delete.operation, DataOperation::Delete);
        assert_eq!(delete.table, "sessions");
        assert_eq!(delete.fields, vec!["id"]);
    }

    #[test]
    fn test_schema_qualified_and_quoted() {
        assert_eq!(parse_sql("select * from \"public\".\"invoices\"").unwrap().table, "invoices");
        assert!(parse_sql("select * from invoices").unwrap().fields.is_empty());
    }

    #[test]
    fn test_prose_is_not_sql() {
        assert!(!looks_like_sql("Please select an option from the list"));
        assert!(!looks_like_sql("update the cache"));
        assert!(!looks_like_sql("delete this"));
    }

    #[test]
    fn test_quoted_prose_is_not_sql() {
        assert!(!looks_like_sql("const label = \"Select a country from the list\";"));
        assert!(!looks_like_sql("hint = 'Delete from your cart anytime'"));
        assert!(!looks_like_sql("\"select a country from countries nearby\""));
        assert!(!looks_like_sql("'delete from carts anytime'"));
        assert!(!looks_like_sql("\"SELECT one FROM the menu\""));

        assert!(looks_like_sql("q = \"select id, name from countries where code = ?\""));
        assert!(looks_like_sql("'delete from carts'"));
        assert!(looks_like_sql("\"select count(*) from users u where u.active\""));
        assert_eq!(parse_sql("insert into carts (id) values (?)").unwrap().table, "carts");
    }
}
