//! Tree walking helpers shared by the language adapters.

use std::time::Instant;

use tree_sitter::{Node, Parser};

use super::types::{CallSite, Language, ParseResult, Position, Range};
use crate::errors::ExtractionError;

/// Build a parser for one grammar.
pub(crate) fn new_parser(
    language: tree_sitter::Language,
    name: Language,
) -> Result<Parser, ExtractionError> {
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|_| ExtractionError::GrammarUnavailable {
            language: name.to_string(),
        })?;
    Ok(parser)
}

/// Parse `source` under a time budget and hand every node to `visit`,
/// parents before children.
///
/// A parse that runs out of time is an error; the caller falls back.
pub(crate) fn parse_with<F>(
    parser: &mut Parser,
    language: Language,
    file: &str,
    source: &str,
    timeout_ms: u64,
    mut visit: F,
) -> Result<ParseResult, ExtractionError>
where
    F: FnMut(Node<'_>, &[u8], &mut ParseResult),
{
    let start = Instant::now();
    parser.set_timeout_micros(timeout_ms.saturating_mul(1000));

    let tree = match parser.parse(source, None) {
        Some(t) => t,
        None => {
            // The parser keeps partial state after a timeout.
            parser.reset();
            return Err(ExtractionError::Timeout {
                file: file.to_string(),
                timeout_ms,
            });
        }
    };

    let src = source.as_bytes();
    let mut result = ParseResult::new(language);
    result.source_bytes = src.len();

    preorder(tree.root_node(), |node| {
        if node.is_error() {
            result.error_nodes += 1;
            if ancestor(&node, &["ERROR"]).is_none() {
                result.error_bytes += node.end_byte() - node.start_byte();
            }
            return;
        }
        if node.is_missing() {
            result.error_nodes += 1;
            return;
        }
        visit(node, src, &mut result);
    });

    result.parse_time_us = start.elapsed().as_micros() as u64;
    Ok(result)
}

/// Iterative pre-order traversal. Deeply nested input cannot overflow
/// the stack.
pub(crate) fn preorder<'t>(root: Node<'t>, mut f: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();
    loop {
        f(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// Convert tree-sitter node to Range
pub(crate) fn node_range(node: &Node) -> Range {
    Range {
        start: Position {
            line: node.start_position().row as u32 + 1,
            column: node.start_position().column as u32,
        },
        end: Position {
            line: node.end_position().row as u32 + 1,
            column: node.end_position().column as u32,
        },
    }
}

pub(crate) fn text<'a>(node: &Node, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

pub(crate) fn field_text(node: &Node, field: &str, src: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| text(&n, src).to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Nearest ancestor whose kind is in `kinds`.
pub(crate) fn ancestor<'t>(node: &Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(n) = current {
        if kinds.contains(&n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Does `function` yield, not counting nested functions?
pub(crate) fn yields(function: &Node, yield_kinds: &[&str], function_kinds: &[&str]) -> bool {
    let Some(body) = function.child_by_field_name("body") else {
        return false;
    };
    let mut found = false;
    preorder(body, |n| {
        if !found && yield_kinds.contains(&n.kind()) {
            found = ancestor(&n, function_kinds).is_some_and(|f| f == *function);
        }
    });
    found
}

/// Doc comment directly above `node` (or above its export/decorator
/// wrapper). Consecutive `///` lines are joined.
pub(crate) fn doc_comment(node: &Node, src: &[u8]) -> Option<String> {
    let mut anchor = *node;
    while let Some(parent) = anchor.parent() {
        if !matches!(parent.kind(), "export_statement" | "decorated_definition") {
            break;
        }
        anchor = parent;
    }

    let mut lines = Vec::new();
    let mut current = anchor.prev_named_sibling();
    while let Some(comment) = current.filter(|c| c.kind().ends_with("comment")) {
        let raw = text(&comment, src).trim();
        if raw.starts_with("/**") {
            if lines.is_empty() {
                lines.push(raw);
            }
            break;
        }
        if !raw.starts_with("///") {
            break;
        }
        lines.push(raw);
        current = comment.prev_named_sibling();
    }
    lines.reverse();

    let cleaned: Vec<&str> = lines
        .iter()
        .flat_map(|block| block.lines())
        .map(|l| {
            l.trim()
                .trim_start_matches("/**")
                .trim_end_matches("*/")
                .trim_start_matches("///")
                .trim_start_matches('*')
                .trim()
        })
        .filter(|l| !l.is_empty())
        .collect();
    (!cleaned.is_empty()).then(|| cleaned.join("\n"))
}

/// Strip string prefixes and quotes: `f"x"`, `@"x"`, `'x'`, `"""x"""`, `` `x` ``.
pub fn unquote(raw: &str) -> String {
    let s = raw.trim();
    let prefix = s
        .find(['"', '\'', '`'])
        .filter(|&i| {
            i <= 3 && s[..i].chars().all(|c| c.is_ascii_alphabetic() || c == '@' || c == '$')
        })
        .unwrap_or(0);
    let s = &s[prefix..];
    for quote in ["\"\"\"", "'''", "\"", "'", "`"] {
        if s.len() >= 2 * quote.len() && s.starts_with(quote) && s.ends_with(quote) {
            return s[quote.len()..s.len() - quote.len()].to_string();
        }
    }
    s.to_string()
}

/// Argument count and string-literal arguments of an argument list.
///
/// Strings are taken from the direct arguments and one wrapper level
/// below them (C# and PHP wrap each argument in an `argument` node).
pub(crate) fn collect_arguments(
    args: Option<Node<'_>>,
    src: &[u8],
    string_kinds: &[&str],
) -> (usize, Vec<String>, String) {
    let Some(args) = args else {
        return (0, Vec::new(), String::new());
    };

    let mut strings = Vec::new();
    let mut count = 0;
    for arg in named_children(&args) {
        if arg.kind() == "comment" {
            continue;
        }
        count += 1;
        if string_kinds.contains(&arg.kind()) {
            strings.push(unquote(text(&arg, src)));
            continue;
        }
        for inner in named_children(&arg) {
            if string_kinds.contains(&inner.kind()) {
                strings.push(unquote(text(&inner, src)));
            }
        }
    }
    (count, strings, text(&args, src).to_string())
}

/// Assemble a call site from its parts.
pub(crate) fn call_site(
    callee: String,
    receiver: Option<String>,
    args: Option<Node<'_>>,
    node: &Node,
    src: &[u8],
    string_kinds: &[&str],
    is_constructor: bool,
) -> CallSite {
    let (arg_count, string_args, args_text) = collect_arguments(args, src, string_kinds);
    CallSite {
        callee,
        receiver: receiver.filter(|r| !r.is_empty()),
        arg_count,
        string_args,
        args_text,
        is_constructor,
        range: node_range(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote_variants() {
        assert_eq!(unquote("'users'"), "users");
        assert_eq!(unquote("\"users\""), "users");
        assert_eq!(unquote("f\"SELECT {x}\""), "SELECT {x}");
        assert_eq!(unquote("@\"SELECT 1\""), "SELECT 1");
        assert_eq!(unquote("\"\"\"DELETE FROM t\"\"\""), "DELETE FROM t");
        assert_eq!(unquote("`orders`"), "orders");
        assert_eq!(unquote("\"\""), "");
        assert_eq!(unquote("users"), "users");
    }

    #[test]
    fn test_doc_comment_forms() {
        let mut parser = new_parser(tree_sitter_java::LANGUAGE.into(), Language::Java).unwrap();
        let source = "class A {\n    /**\n     * Loads one row.\n     */\n    void load() {}\n    // plain\n    void other() {}\n}\n";
        let tree = parser.parse(source, None).unwrap();
        let mut docs = Vec::new();
        preorder(tree.root_node(), |n| {
            if n.kind() == "method_declaration" {
                docs.push(doc_comment(&n, source.as_bytes()));
            }
        });
        assert_eq!(docs, vec![Some("Loads one row.".to_string()), None]);
    }
}
