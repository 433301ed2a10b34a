//! PHP parser using native tree-sitter
//!
//! Extracts functions, methods, classes, `use` imports and call sites.
//! Receivers are normalized to dotted form: `$this->db` becomes `this.db`.

use tree_sitter::{Node, Parser};

use super::types::*;
use super::walk::{
    ancestor, call_site, doc_comment, field_text, named_children, new_parser, node_range,
    parse_with, text, yields,
};
use crate::errors::ExtractionError;

const STRING_KINDS: &[&str] = &["string", "encapsed_string", "heredoc", "nowdoc"];
const FUNCTION_KINDS: &[&str] = &[
    "function_definition",
    "method_declaration",
    "anonymous_function",
    "arrow_function",
];
const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "trait_declaration",
    "enum_declaration",
];

/// PHP parser
pub struct PhpParser {
    parser: Parser,
}

impl PhpParser {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            parser: new_parser(tree_sitter_php::LANGUAGE_PHP.into(), Language::Php)?,
        })
    }

    pub fn parse(
        &mut self,
        file: &str,
        source: &str,
        timeout_ms: u64,
    ) -> Result<ParseResult, ExtractionError> {
        parse_with(&mut self.parser, Language::Php, file, source, timeout_ms, visit)
    }
}

fn visit(node: Node<'_>, src: &[u8], result: &mut ParseResult) {
    match node.kind() {
        "function_definition" | "method_declaration" => extract_function(&node, src, result),
        "class_declaration" | "interface_declaration" | "trait_declaration" => {
            extract_class(&node, src, result)
        }
        "namespace_use_declaration" => extract_use(&node, src, result),
        "function_call_expression" => extract_function_call(&node, src, result),
        "member_call_expression" | "nullsafe_member_call_expression" => {
            extract_member_call(&node, src, result, "object")
        }
        "scoped_call_expression" => extract_member_call(&node, src, result, "scope"),
        "object_creation_expression" => extract_creation(&node, src, result),
        _ => {}
    }
}

/// `$this->repo` -> `this.repo`, `\App\Models\User` -> `App\Models\User`.
fn normalize_receiver(raw: &str) -> String {
    raw.replace("?->", ".")
        .replace("->", ".")
        .replace('$', "")
        .trim_start_matches('\\')
        .to_string()
}

fn attributes(node: &Node, src: &[u8]) -> Vec<String> {
    named_children(node)
        .iter()
        .filter(|c| c.kind() == "attribute_list")
        .flat_map(named_children)
        .flat_map(|group| {
            if group.kind() == "attribute" {
                vec![group]
            } else {
                named_children(&group)
            }
        })
        .filter(|a| a.kind() == "attribute")
        .filter_map(|a| {
            named_children(&a)
                .into_iter()
                .find(|n| matches!(n.kind(), "name" | "qualified_name"))
                .map(|n| text(&n, src).to_string())
        })
        .collect()
}

/// Lowercased `*_modifier` keywords of a declaration.
fn modifiers(node: &Node, src: &[u8]) -> Vec<String> {
    named_children(node)
        .iter()
        .filter(|c| c.kind().ends_with("_modifier"))
        .map(|c| text(c, src).to_lowercase())
        .collect()
}

fn variable_name(node: &Node, src: &[u8]) -> Option<String> {
    field_text(node, "name", src)
        .or_else(|| {
            named_children(node)
                .into_iter()
                .find(|c| c.kind() == "variable_name")
                .map(|c| text(&c, src).to_string())
        })
        .map(|n| n.trim_start_matches('$').to_string())
}

fn parameter(param: &Node, src: &[u8]) -> Option<ParameterInfo> {
    if !param.kind().ends_with("_parameter") {
        return None;
    }
    Some(ParameterInfo {
        name: variable_name(param, src)?,
        type_annotation: field_text(param, "type", src),
        default_value: field_text(param, "default_value", src),
        is_rest: param.kind() == "variadic_parameter",
    })
}

fn extract_function(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(name) = field_text(node, "name", src) else {
        return;
    };

    let parameters = node
        .child_by_field_name("parameters")
        .map(|params| named_children(&params).iter().filter_map(|p| parameter(p, src)).collect())
        .unwrap_or_default();

    let modifiers = modifiers(node, src);
    let owner = ancestor(node, TYPE_DECLARATIONS).and_then(|c| field_text(&c, "name", src));
    let is_method = node.kind() == "method_declaration";
    let is_exported = !is_method
        || modifiers.iter().any(|m| m == "public")
        || !modifiers.iter().any(|m| m == "private" || m == "protected");

    result.functions.push(FunctionInfo {
        qualified_name: owner.map(|owner| format!("{}.{}", owner, name)),
        name,
        parameters,
        return_type: field_text(node, "return_type", src),
        is_async: false,
        is_static: modifiers.iter().any(|m| m == "static"),
        is_generator: yields(node, &["yield_expression"], FUNCTION_KINDS),
        is_exported,
        decorators: attributes(node, src),
        modifiers,
        doc_comment: doc_comment(node, src),
        range: node_range(node),
    });
}

/// Declared properties plus constructor-promoted parameters.
fn properties(body: &Node, src: &[u8]) -> Vec<PropertyInfo> {
    let mut props = Vec::new();
    for member in named_children(body) {
        match member.kind() {
            "property_declaration" => {
                let mods = modifiers(&member, src);
                let ty = field_text(&member, "type", src);
                for element in named_children(&member)
                    .iter()
                    .filter(|c| c.kind() == "property_element")
                {
                    let Some(name) = variable_name(element, src) else {
                        continue;
                    };
                    props.push(PropertyInfo {
                        name,
                        type_annotation: ty.clone(),
                        visibility: Visibility::from_modifiers(&mods).unwrap_or_default(),
                        is_static: mods.iter().any(|m| m == "static"),
                        is_readonly: mods.iter().any(|m| m == "readonly"),
                        range: node_range(&member),
                    });
                }
            }
            "method_declaration"
                if field_text(&member, "name", src).as_deref() == Some("__construct") =>
            {
                let Some(params) = member.child_by_field_name("parameters") else {
                    continue;
                };
                for promoted in named_children(&params)
                    .iter()
                    .filter(|p| p.kind() == "property_promotion_parameter")
                {
                    let Some(name) = variable_name(promoted, src) else {
                        continue;
                    };
                    let mods = modifiers(promoted, src);
                    let visibility = field_text(promoted, "visibility", src)
                        .and_then(|v| Visibility::from_modifiers(&[v.to_lowercase()][..]))
                        .or_else(|| Visibility::from_modifiers(&mods))
                        .unwrap_or_default();
                    props.push(PropertyInfo {
                        name,
                        type_annotation: field_text(promoted, "type", src),
                        visibility,
                        is_static: false,
                        is_readonly: mods.iter().any(|m| m == "readonly")
                            || text(promoted, src).contains("readonly "),
                        range: node_range(promoted),
                    });
                }
            }
            _ => {}
        }
    }
    props
}

fn clause_names(node: &Node, kind: &str, src: &[u8]) -> Vec<String> {
    named_children(node)
        .iter()
        .filter(|c| c.kind() == kind)
        .flat_map(named_children)
        .map(|b| text(&b, src).trim_start_matches('\\').to_string())
        .collect()
}

fn extract_class(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(name) = field_text(node, "name", src) else {
        return;
    };

    let is_interface = node.kind() == "interface_declaration";
    let parents = clause_names(node, "base_clause", src);
    let interfaces = clause_names(node, "class_interface_clause", src);
    let bases = parents.iter().chain(&interfaces).cloned().collect();
    // Interfaces extend other interfaces.
    let (extends, implements) = if is_interface {
        (None, parents)
    } else {
        (parents.into_iter().next(), interfaces)
    };

    let body = node.child_by_field_name("body");
    let methods = body
        .map(|body| {
            named_children(&body)
                .iter()
                .filter(|m| m.kind() == "method_declaration")
                .filter_map(|m| field_text(m, "name", src))
                .collect()
        })
        .unwrap_or_default();

    result.classes.push(ClassInfo {
        name,
        bases,
        extends,
        implements,
        methods,
        properties: body.map(|b| properties(&b, src)).unwrap_or_default(),
        decorators: attributes(node, src),
        is_interface,
        is_abstract: is_interface || modifiers(node, src).iter().any(|m| m == "abstract"),
        is_exported: true,
        range: node_range(node),
    });
}

fn extract_use(node: &Node, src: &[u8], result: &mut ParseResult) {
    for clause in named_children(node) {
        if clause.kind() != "namespace_use_clause" {
            continue;
        }
        let children = named_children(&clause);
        let Some(target) = children
            .iter()
            .find(|n| matches!(n.kind(), "qualified_name" | "name"))
        else {
            continue;
        };
        let source = text(target, src).trim_start_matches('\\').to_string();
        let names = source.rsplit('\\').next().map(str::to_string).into_iter().collect();
        let alias = field_text(&clause, "alias", src).or_else(|| {
            children
                .iter()
                .find(|n| n.kind() == "namespace_aliasing_clause")
                .and_then(|a| a.named_child(0))
                .map(|a| text(&a, src).to_string())
        });

        let mut import = ImportInfo::new(source, names, node_range(node));
        import.namespace = alias;
        result.imports.push(import);
    }
}

fn extract_function_call(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(function) = field_text(node, "function", src) else {
        return;
    };
    let callee = function.trim_start_matches('\\').to_string();
    let args = node.child_by_field_name("arguments");
    result
        .calls
        .push(call_site(callee, None, args, node, src, STRING_KINDS, false));
}

fn extract_member_call(node: &Node, src: &[u8], result: &mut ParseResult, receiver_field: &str) {
    let Some(callee) = field_text(node, "name", src) else {
        return;
    };
    let receiver = field_text(node, receiver_field, src).map(|r| normalize_receiver(&r));
    let args = node.child_by_field_name("arguments");
    result
        .calls
        .push(call_site(callee, receiver, args, node, src, STRING_KINDS, false));
}

fn extract_creation(node: &Node, src: &[u8], result: &mut ParseResult) {
    let children = named_children(node);
    let Some(class) = children
        .iter()
        .find(|c| matches!(c.kind(), "name" | "qualified_name"))
    else {
        return;
    };
    let callee = text(class, src).trim_start_matches('\\').to_string();
    let args = children.iter().copied().find(|c| c.kind() == "arguments");
    result
        .calls
        .push(call_site(callee, None, args, node, src, STRING_KINDS, true));
}
