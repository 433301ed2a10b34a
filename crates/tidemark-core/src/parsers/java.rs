//! Java parser using native tree-sitter
//!
//! Extracts methods, classes/interfaces, imports, invocations and
//! object creation. Annotations are reported as decorators.

use tree_sitter::{Node, Parser};

use super::types::*;
use super::walk::{
    ancestor, call_site, doc_comment, field_text, named_children, new_parser, node_range,
    parse_with, text,
};
use crate::errors::ExtractionError;

const STRING_KINDS: &[&str] = &["string_literal", "text_block"];
const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
];

/// Java parser
pub struct JavaParser {
    parser: Parser,
}

impl JavaParser {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            parser: new_parser(tree_sitter_java::LANGUAGE.into(), Language::Java)?,
        })
    }

    pub fn parse(
        &mut self,
        file: &str,
        source: &str,
        timeout_ms: u64,
    ) -> Result<ParseResult, ExtractionError> {
        parse_with(&mut self.parser, Language::Java, file, source, timeout_ms, visit)
    }
}

fn visit(node: Node<'_>, src: &[u8], result: &mut ParseResult) {
    match node.kind() {
        "method_declaration" | "constructor_declaration" => extract_method(&node, src, result),
        "class_declaration" | "interface_declaration" | "enum_declaration"
        | "record_declaration" => extract_type(&node, src, result),
        "import_declaration" => extract_import(&node, src, result),
        "method_invocation" => extract_invocation(&node, src, result),
        "object_creation_expression" => extract_creation(&node, src, result),
        _ => {}
    }
}

/// Split a `modifiers` node into keywords and annotation names.
fn modifiers(node: &Node, src: &[u8]) -> (Vec<String>, Vec<String>) {
    let mut keywords = Vec::new();
    let mut annotations = Vec::new();
    let Some(mods) = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "modifiers")
    else {
        return (keywords, annotations);
    };

    let mut cursor = mods.walk();
    for child in mods.children(&mut cursor) {
        match child.kind() {
            "marker_annotation" | "annotation" => {
                if let Some(name) = field_text(&child, "name", src) {
                    annotations.push(name);
                }
            }
            "line_comment" | "block_comment" => {}
            _ => keywords.push(text(&child, src).to_string()),
        }
    }
    (keywords, annotations)
}

/// Type names under `superclass`, `super_interfaces` and `extends_interfaces`.
fn type_names(node: &Node, src: &[u8], out: &mut Vec<String>) {
    for child in named_children(node) {
        match child.kind() {
            "type_list" => type_names(&child, src, out),
            _ => out.push(strip_generics(text(&child, src))),
        }
    }
}

fn strip_generics(name: &str) -> String {
    name.split('<').next().unwrap_or(name).trim().to_string()
}

fn parameter(param: &Node, src: &[u8]) -> Option<ParameterInfo> {
    match param.kind() {
        "formal_parameter" => Some(ParameterInfo {
            name: field_text(param, "name", src)?,
            type_annotation: field_text(param, "type", src),
            default_value: None,
            is_rest: false,
        }),
        "spread_parameter" => {
            let children = named_children(param);
            let declarator = children.iter().find(|c| c.kind() == "variable_declarator")?;
            let element = children
                .iter()
                .find(|c| !matches!(c.kind(), "modifiers" | "variable_declarator"))
                .map(|t| format!("{}...", text(t, src)));
            Some(ParameterInfo {
                name: field_text(declarator, "name", src)?,
                type_annotation: element,
                default_value: None,
                is_rest: true,
            })
        }
        _ => None,
    }
}

fn parameters(node: &Node, src: &[u8]) -> Vec<ParameterInfo> {
    node.child_by_field_name("parameters")
        .map(|params| named_children(&params).iter().filter_map(|p| parameter(p, src)).collect())
        .unwrap_or_default()
}

/// Visibility of a member. Package-private is reported as protected,
/// the narrowest level that includes package access.
fn visibility(modifiers: &[String], in_interface: bool) -> Visibility {
    Visibility::from_modifiers(modifiers).unwrap_or(if in_interface {
        Visibility::Public
    } else {
        Visibility::Protected
    })
}

/// Fields of a class body and components of a record header.
fn properties(node: &Node, src: &[u8]) -> Vec<PropertyInfo> {
    let in_interface = node.kind() == "interface_declaration";
    let mut props = Vec::new();

    if node.kind() == "record_declaration" {
        for component in parameters(node, src) {
            props.push(PropertyInfo {
                name: component.name,
                type_annotation: component.type_annotation,
                visibility: Visibility::Private,
                is_static: false,
                is_readonly: true,
                range: node_range(node),
            });
        }
    }

    let members = node
        .child_by_field_name("body")
        .map(|body| named_children(&body))
        .unwrap_or_default();
    for field in members.iter().filter(|m| m.kind() == "field_declaration") {
        let (mods, _) = modifiers(field, src);
        let has = |m: &str| in_interface || mods.iter().any(|x| x == m);
        let mut cursor = field.walk();
        for declarator in field.children_by_field_name("declarator", &mut cursor) {
            let Some(name) = field_text(&declarator, "name", src) else {
                continue;
            };
            props.push(PropertyInfo {
                name,
                type_annotation: field_text(field, "type", src),
                visibility: visibility(&mods, in_interface),
                is_static: has("static"),
                is_readonly: has("final"),
                range: node_range(field),
            });
        }
    }
    props
}

fn extract_method(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(name) = field_text(node, "name", src) else {
        return;
    };
    let parameters = parameters(node, src);

    let (modifiers, decorators) = modifiers(node, src);
    let owner = ancestor(node, TYPE_DECLARATIONS).and_then(|t| field_text(&t, "name", src));
    let in_interface = ancestor(node, TYPE_DECLARATIONS)
        .is_some_and(|t| t.kind() == "interface_declaration");

    result.functions.push(FunctionInfo {
        qualified_name: owner.map(|owner| format!("{}.{}", owner, name)),
        name,
        parameters,
        return_type: field_text(node, "type", src),
        is_async: false,
        is_static: modifiers.iter().any(|m| m == "static"),
        is_generator: false,
        is_exported: in_interface || modifiers.iter().any(|m| m == "public"),
        modifiers,
        decorators,
        doc_comment: doc_comment(node, src),
        range: node_range(node),
    });
}

fn extract_type(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(name) = field_text(node, "name", src) else {
        return;
    };

    let mut extends = Vec::new();
    let mut implements = Vec::new();
    for child in named_children(node) {
        match child.kind() {
            "superclass" => type_names(&child, src, &mut extends),
            "super_interfaces" | "extends_interfaces" => type_names(&child, src, &mut implements),
            _ => {}
        }
    }
    let bases = extends.iter().chain(&implements).cloned().collect();

    let methods = node
        .child_by_field_name("body")
        .map(|body| {
            named_children(&body)
                .iter()
                .filter(|m| matches!(m.kind(), "method_declaration" | "constructor_declaration"))
                .filter_map(|m| field_text(m, "name", src))
                .collect()
        })
        .unwrap_or_default();

    let (keywords, decorators) = modifiers(node, src);
    let is_interface = node.kind() == "interface_declaration";
    result.classes.push(ClassInfo {
        name,
        bases,
        extends: extends.into_iter().next(),
        implements,
        methods,
        properties: properties(node, src),
        decorators,
        is_interface,
        is_abstract: is_interface || keywords.iter().any(|k| k == "abstract"),
        is_exported: keywords.iter().any(|k| k == "public"),
        range: node_range(node),
    });
}

fn extract_import(node: &Node, src: &[u8], result: &mut ParseResult) {
    let children = named_children(node);
    let Some(path) = children
        .iter()
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
    else {
        return;
    };
    let source = text(path, src).to_string();
    let names = if children.iter().any(|c| c.kind() == "asterisk") {
        vec!["*".to_string()]
    } else {
        source.rsplit('.').next().map(str::to_string).into_iter().collect()
    };

    result.imports.push(ImportInfo::new(source, names, node_range(node)));
}

fn extract_invocation(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(callee) = field_text(node, "name", src) else {
        return;
    };
    let receiver = field_text(node, "object", src);
    let args = node.child_by_field_name("arguments");
    result
        .calls
        .push(call_site(callee, receiver, args, node, src, STRING_KINDS, false));
}

fn extract_creation(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(ty) = field_text(node, "type", src) else {
        return;
    };
    let args = node.child_by_field_name("arguments");
    result.calls.push(call_site(
        strip_generics(&ty),
        None,
        args,
        node,
        src,
        STRING_KINDS,
        true,
    ));
}
