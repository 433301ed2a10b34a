//! Python parser using native tree-sitter
//!
//! Extracts functions, classes, imports, and call sites from Python code.

use tree_sitter::{Node, Parser};

use super::types::*;
use super::walk::{
    ancestor, call_site, field_text, named_children, new_parser, node_range, parse_with, text,
    unquote, yields,
};
use crate::errors::ExtractionError;

const STRING_KINDS: &[&str] = &["string", "concatenated_string"];

/// Python parser
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            parser: new_parser(tree_sitter_python::LANGUAGE.into(), Language::Python)?,
        })
    }

    pub fn parse(
        &mut self,
        file: &str,
        source: &str,
        timeout_ms: u64,
    ) -> Result<ParseResult, ExtractionError> {
        parse_with(&mut self.parser, Language::Python, file, source, timeout_ms, visit)
    }
}

fn visit(node: Node<'_>, src: &[u8], result: &mut ParseResult) {
    match node.kind() {
        "function_definition" => extract_function(&node, src, result),
        "class_definition" => extract_class(&node, src, result),
        "import_statement" => extract_import(&node, src, result),
        "import_from_statement" => extract_from_import(&node, src, result),
        "call" => extract_call(&node, src, result),
        _ => {}
    }
}

/// Decorators attached through an enclosing `decorated_definition`.
fn decorators(node: &Node, src: &[u8]) -> Vec<String> {
    match node.parent() {
        Some(parent) if parent.kind() == "decorated_definition" => named_children(&parent)
            .iter()
            .filter(|c| c.kind() == "decorator")
            .map(|d| text(d, src).trim_start_matches('@').trim().to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn parameter(param: &Node, src: &[u8]) -> Option<ParameterInfo> {
    let (target, type_annotation, default_value) = match param.kind() {
        "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => (*param, None, None),
        "default_parameter" => (param.child_by_field_name("name")?, None, field_text(param, "value", src)),
        "typed_default_parameter" => (
            param.child_by_field_name("name")?,
            field_text(param, "type", src),
            field_text(param, "value", src),
        ),
        "typed_parameter" => (
            named_children(param).into_iter().find(|c| c.kind() != "type")?,
            field_text(param, "type", src),
            None,
        ),
        _ => return None,
    };

    let is_rest = matches!(target.kind(), "list_splat_pattern" | "dictionary_splat_pattern");
    let name = text(&target, src).trim_start_matches('*').to_string();
    (name != "self" && name != "cls").then_some(ParameterInfo {
        name,
        type_annotation,
        default_value,
        is_rest,
    })
}

/// Leading string literal of a body, unquoted.
fn docstring(node: &Node, src: &[u8]) -> Option<String> {
    let first = node.child_by_field_name("body")?.named_child(0)?;
    let string = (first.kind() == "expression_statement")
        .then(|| first.named_child(0))
        .flatten()
        .filter(|s| s.kind() == "string")?;
    let doc = unquote(text(&string, src)).trim().to_string();
    (!doc.is_empty()).then_some(doc)
}

fn extract_function(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(name) = field_text(node, "name", src) else {
        return;
    };

    let parameters = node
        .child_by_field_name("parameters")
        .map(|p| named_children(&p).iter().filter_map(|c| parameter(c, src)).collect())
        .unwrap_or_default();

    let decorators = decorators(node, src);
    let is_async = node.child(0).is_some_and(|c| c.kind() == "async");
    let is_static = decorators.iter().any(|d| d == "staticmethod");
    let qualified_name = ancestor(node, &["class_definition"])
        .and_then(|class| field_text(&class, "name", src))
        .map(|class| format!("{}.{}", class, name));

    let mut modifiers = Vec::new();
    if is_async {
        modifiers.push("async".to_string());
    }

    result.functions.push(FunctionInfo {
        is_exported: !name.starts_with('_'),
        name,
        qualified_name,
        parameters,
        return_type: field_text(node, "return_type", src),
        modifiers,
        decorators,
        is_async,
        is_static,
        is_generator: yields(node, &["yield"], &["function_definition", "lambda"]),
        doc_comment: docstring(node, src),
        range: node_range(node),
    });
}

/// Class-level assignments: `email: str`, `email = Column(String)`.
fn class_attribute(member: &Node, src: &[u8]) -> Option<PropertyInfo> {
    let assignment = (member.kind() == "expression_statement")
        .then(|| member.named_child(0))
        .flatten()
        .filter(|a| a.kind() == "assignment")?;
    let left = assignment.child_by_field_name("left").filter(|l| l.kind() == "identifier")?;
    let name = text(&left, src).to_string();
    let type_annotation = field_text(&assignment, "type", src);
    let wrapper = type_annotation.as_deref().and_then(|t| t.split('[').next()).unwrap_or("");

    Some(PropertyInfo {
        visibility: Visibility::from_python_name(&name),
        is_static: matches!(wrapper, "ClassVar" | "typing.ClassVar"),
        is_readonly: matches!(wrapper, "Final" | "typing.Final") || name.chars().all(|c| !c.is_lowercase()),
        name,
        type_annotation,
        range: node_range(member),
    })
}

fn extract_class(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(name) = field_text(node, "name", src) else {
        return;
    };

    let superclasses = node.child_by_field_name("superclasses");
    let bases: Vec<String> = superclasses
        .map(|list| {
            named_children(&list)
                .iter()
                .filter(|c| matches!(c.kind(), "identifier" | "attribute" | "subscript"))
                .map(|c| text(c, src).to_string())
                .collect()
        })
        .unwrap_or_default();
    let is_abstract = bases.iter().any(|b| b == "ABC" || b == "abc.ABC")
        || superclasses.is_some_and(|list| text(&list, src).contains("ABCMeta"));

    let members = node
        .child_by_field_name("body")
        .map(|body| named_children(&body))
        .unwrap_or_default();
    let methods = members
        .iter()
        .filter_map(|member| match member.kind() {
            "function_definition" => field_text(member, "name", src),
            "decorated_definition" => member
                .child_by_field_name("definition")
                .filter(|d| d.kind() == "function_definition")
                .and_then(|d| field_text(&d, "name", src)),
            _ => None,
        })
        .collect();
    let properties = members.iter().filter_map(|m| class_attribute(m, src)).collect();

    result.classes.push(ClassInfo {
        is_exported: !name.starts_with('_'),
        name,
        extends: bases.first().cloned(),
        implements: Vec::new(),
        bases,
        methods,
        properties,
        decorators: decorators(node, src),
        is_interface: false,
        is_abstract,
        range: node_range(node),
    });
}

/// Inside an `if TYPE_CHECKING:` block.
fn type_checking_only(node: &Node, src: &[u8]) -> bool {
    ancestor(node, &["if_statement"])
        .and_then(|stmt| stmt.child_by_field_name("condition"))
        .is_some_and(|cond| text(&cond, src).ends_with("TYPE_CHECKING"))
}

fn extract_import(node: &Node, src: &[u8], result: &mut ParseResult) {
    for module in named_children(node) {
        let (source, namespace) = match module.kind() {
            "dotted_name" => (Some(text(&module, src).to_string()), None),
            "aliased_import" => (field_text(&module, "name", src), field_text(&module, "alias", src)),
            _ => continue,
        };
        if let Some(source) = source {
            let mut import = ImportInfo::new(source, Vec::new(), node_range(node));
            import.namespace = namespace;
            import.is_type_only = type_checking_only(node, src);
            result.imports.push(import);
        }
    }
}

fn extract_from_import(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(source) = field_text(node, "module_name", src) else {
        return;
    };

    let mut cursor = node.walk();
    let mut names: Vec<String> = node
        .children_by_field_name("name", &mut cursor)
        .filter_map(|n| match n.kind() {
            "aliased_import" => field_text(&n, "name", src),
            _ => Some(text(&n, src).to_string()),
        })
        .collect();
    if named_children(node).iter().any(|c| c.kind() == "wildcard_import") {
        names.push("*".to_string());
    }

    let mut import = ImportInfo::new(source, names, node_range(node));
    import.is_type_only = type_checking_only(node, src);
    result.imports.push(import);
}

fn extract_call(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };

    let (callee, receiver) = match function.kind() {
        "identifier" => (text(&function, src).to_string(), None),
        "attribute" => match field_text(&function, "attribute", src) {
            Some(attr) => (attr, field_text(&function, "object", src)),
            None => return,
        },
        _ => return,
    };

    let args = node.child_by_field_name("arguments");
    result
        .calls
        .push(call_site(callee, receiver, args, node, src, STRING_KINDS, false));
}
