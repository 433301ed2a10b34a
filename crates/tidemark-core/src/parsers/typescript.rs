//! TypeScript/JavaScript parser using native tree-sitter
//!
//! Extracts functions (declarations, methods, arrow functions bound to
//! variables), classes, imports (`import` and `require`), calls and `new`
//! expressions. `.tsx` sources use the TSX grammar, JavaScript uses the
//! JavaScript grammar.

use tree_sitter::{Node, Parser};

use super::types::*;
use super::walk::{
    ancestor, call_site, doc_comment, field_text, named_children, new_parser, node_range,
    parse_with, text, unquote,
};
use crate::errors::ExtractionError;

const STRING_KINDS: &[&str] = &["string", "template_string"];
const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration", "class"];

/// TypeScript/JavaScript parser
pub struct TypeScriptParser {
    typescript: Parser,
    tsx: Parser,
    javascript: Parser,
}

impl TypeScriptParser {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            typescript: new_parser(
                tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
                Language::TypeScript,
            )?,
            tsx: new_parser(tree_sitter_typescript::LANGUAGE_TSX.into(), Language::TypeScript)?,
            javascript: new_parser(tree_sitter_javascript::LANGUAGE.into(), Language::JavaScript)?,
        })
    }

    /// Parse TypeScript or JavaScript source, picking the grammar from `file`.
    pub fn parse(
        &mut self,
        language: Language,
        file: &str,
        source: &str,
        timeout_ms: u64,
    ) -> Result<ParseResult, ExtractionError> {
        let parser = match language {
            Language::JavaScript => &mut self.javascript,
            _ if file.to_ascii_lowercase().ends_with(".tsx") => &mut self.tsx,
            _ => &mut self.typescript,
        };
        parse_with(parser, language, file, source, timeout_ms, visit)
    }
}

fn visit(node: Node<'_>, src: &[u8], result: &mut ParseResult) {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            extract_function(&node, &node, src, result)
        }
        "method_definition" => extract_method(&node, src, result),
        "variable_declarator" => extract_bound_function(&node, src, result),
        "class_declaration" | "abstract_class_declaration" | "interface_declaration" => {
            extract_class(&node, src, result)
        }
        "import_statement" => extract_import(&node, src, result),
        "export_statement" => extract_export(&node, src, result),
        "call_expression" => extract_call(&node, src, result),
        "new_expression" => extract_new(&node, src, result),
        _ => {}
    }
}

fn has_keyword(node: &Node, keyword: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == keyword);
    found
}

fn is_exported(node: &Node) -> bool {
    node.parent().is_some_and(|p| p.kind() == "export_statement")
}

/// Decorators on the node itself and on a wrapping `export` statement.
fn decorators(node: &Node, src: &[u8]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut sources = vec![*node];
    if let Some(parent) = node.parent().filter(|p| p.kind() == "export_statement") {
        sources.insert(0, parent);
    }
    for source in sources {
        for child in named_children(&source) {
            if child.kind() == "decorator" {
                found.push(text(&child, src).trim_start_matches('@').trim().to_string());
            }
        }
    }
    found
}

/// Text of a `type_annotation` field without the leading colon.
fn type_text(node: &Node, field: &str, src: &[u8]) -> Option<String> {
    field_text(node, field, src)
        .map(|t| t.trim_start_matches(':').trim().to_string())
        .filter(|t| !t.is_empty())
}

fn rest_name(pattern: &Node, src: &[u8]) -> String {
    named_children(pattern)
        .first()
        .map(|n| text(n, src).to_string())
        .unwrap_or_else(|| text(pattern, src).trim_start_matches("...").to_string())
}

fn parameter(p: &Node, src: &[u8]) -> Option<ParameterInfo> {
    match p.kind() {
        "identifier" | "object_pattern" | "array_pattern" => {
            Some(ParameterInfo::named(text(p, src)))
        }
        "required_parameter" | "optional_parameter" => {
            let pattern = p.child_by_field_name("pattern")?;
            let is_rest = pattern.kind() == "rest_pattern";
            Some(ParameterInfo {
                name: if is_rest {
                    rest_name(&pattern, src)
                } else {
                    text(&pattern, src).to_string()
                },
                type_annotation: type_text(p, "type", src),
                default_value: field_text(p, "value", src),
                is_rest,
            })
        }
        "assignment_pattern" => Some(ParameterInfo {
            default_value: field_text(p, "right", src),
            ..ParameterInfo::named(field_text(p, "left", src)?)
        }),
        "rest_pattern" => Some(ParameterInfo {
            is_rest: true,
            ..ParameterInfo::named(rest_name(p, src))
        }),
        _ => None,
    }
}

fn parameters(function: &Node, src: &[u8]) -> Vec<ParameterInfo> {
    // `x => ...` has a bare identifier instead of a parameter list.
    if let Some(single) = function.child_by_field_name("parameter") {
        return vec![ParameterInfo::named(text(&single, src))];
    }
    function
        .child_by_field_name("parameters")
        .map(|params| named_children(&params).iter().filter_map(|p| parameter(p, src)).collect())
        .unwrap_or_default()
}

fn is_generator(function: &Node) -> bool {
    function.kind().starts_with("generator") || has_keyword(function, "*")
}

/// Shared by declarations and variable-bound functions: `name_node`
/// carries the name and export position, `function` the signature.
fn extract_function(name_node: &Node, function: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(name) = field_text(name_node, "name", src) else {
        return;
    };
    let declaration = if name_node.kind() == "variable_declarator" {
        name_node.parent()
    } else {
        Some(*name_node)
    };
    let is_async = has_keyword(function, "async");

    let mut modifiers = Vec::new();
    if is_async {
        modifiers.push("async".to_string());
    }

    result.functions.push(FunctionInfo {
        qualified_name: None,
        parameters: parameters(function, src),
        return_type: type_text(function, "return_type", src),
        modifiers,
        decorators: Vec::new(),
        is_async,
        is_static: false,
        is_generator: is_generator(function),
        is_exported: declaration.is_some_and(|n| is_exported(&n)),
        doc_comment: declaration.and_then(|n| doc_comment(&n, src)),
        name,
        range: node_range(function),
    });
}

fn extract_bound_function(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(value) = node.child_by_field_name("value") else {
        return;
    };
    if matches!(value.kind(), "arrow_function" | "function_expression" | "function") {
        extract_function(node, &value, src, result);
    }
}

fn extract_method(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(name) = field_text(node, "name", src) else {
        return;
    };

    let mut modifiers: Vec<String> = named_children(node)
        .iter()
        .filter(|c| c.kind() == "accessibility_modifier")
        .map(|c| text(c, src).to_string())
        .collect();
    for keyword in ["static", "async", "readonly", "abstract", "get", "set"] {
        if has_keyword(node, keyword) {
            modifiers.push(keyword.to_string());
        }
    }

    let owner = ancestor(node, CLASS_KINDS).and_then(|c| field_text(&c, "name", src));
    let is_private = modifiers.iter().any(|m| m == "private") || name.starts_with('#');

    result.functions.push(FunctionInfo {
        qualified_name: owner.map(|owner| format!("{}.{}", owner, name)),
        parameters: parameters(node, src),
        return_type: type_text(node, "return_type", src),
        decorators: decorators(node, src),
        is_async: modifiers.iter().any(|m| m == "async"),
        is_static: modifiers.iter().any(|m| m == "static"),
        is_generator: is_generator(node),
        is_exported: !is_private,
        doc_comment: doc_comment(node, src),
        modifiers,
        name,
        range: node_range(node),
    });
}

fn member_visibility(member: &Node, name: &str, src: &[u8]) -> Visibility {
    let declared = named_children(member)
        .iter()
        .filter(|c| c.kind() == "accessibility_modifier")
        .find_map(|c| Visibility::from_modifiers(&[text(c, src)][..]));
    match declared {
        Some(v) => v,
        None if name.starts_with('#') => Visibility::Private,
        None => Visibility::Public,
    }
}

/// Fields, interface property signatures and constructor parameter
/// properties (`constructor(private readonly db: Db)`).
fn properties(body: &Node, src: &[u8]) -> Vec<PropertyInfo> {
    let mut props = Vec::new();
    for member in named_children(body) {
        match member.kind() {
            "public_field_definition" | "field_definition" | "property_signature" => {
                let Some(name) =
                    field_text(&member, "name", src).or_else(|| field_text(&member, "property", src))
                else {
                    continue;
                };
                props.push(PropertyInfo {
                    visibility: member_visibility(&member, &name, src),
                    type_annotation: type_text(&member, "type", src),
                    is_static: has_keyword(&member, "static"),
                    is_readonly: has_keyword(&member, "readonly"),
                    range: node_range(&member),
                    name,
                });
            }
            "method_definition"
                if field_text(&member, "name", src).as_deref() == Some("constructor") =>
            {
                let Some(params) = member.child_by_field_name("parameters") else {
                    continue;
                };
                for param in named_children(&params) {
                    let promoted = named_children(&param)
                        .iter()
                        .any(|c| c.kind() == "accessibility_modifier")
                        || has_keyword(&param, "readonly");
                    let Some(info) = promoted.then(|| parameter(&param, src)).flatten() else {
                        continue;
                    };
                    props.push(PropertyInfo {
                        visibility: member_visibility(&param, &info.name, src),
                        is_static: false,
                        is_readonly: has_keyword(&param, "readonly"),
                        range: node_range(&param),
                        name: info.name,
                        type_annotation: info.type_annotation,
                    });
                }
            }
            _ => {}
        }
    }
    props
}

fn extract_class(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(name) = field_text(node, "name", src) else {
        return;
    };

    let mut extends = Vec::new();
    let mut implements = Vec::new();
    for child in named_children(node) {
        match child.kind() {
            "class_heritage" => {
                for clause in named_children(&child) {
                    let into = if clause.kind() == "implements_clause" {
                        &mut implements
                    } else {
                        &mut extends
                    };
                    heritage_names(&clause, src, into);
                }
            }
            // Interfaces extend other interfaces.
            "extends_type_clause" => heritage_names(&child, src, &mut implements),
            _ => {}
        }
    }
    let bases = extends.iter().chain(&implements).cloned().collect();

    let body = node.child_by_field_name("body");
    let methods = body
        .map(|body| {
            named_children(&body)
                .iter()
                .filter(|m| matches!(m.kind(), "method_definition" | "method_signature"))
                .filter_map(|m| field_text(m, "name", src))
                .collect()
        })
        .unwrap_or_default();

    let is_interface = node.kind() == "interface_declaration";
    result.classes.push(ClassInfo {
        name,
        bases,
        extends: extends.into_iter().next(),
        implements,
        methods,
        properties: body.map(|b| properties(&b, src)).unwrap_or_default(),
        decorators: decorators(node, src),
        is_interface,
        is_abstract: is_interface || node.kind() == "abstract_class_declaration",
        is_exported: is_exported(node),
        range: node_range(node),
    });
}

fn heritage_names(clause: &Node, src: &[u8], out: &mut Vec<String>) {
    match clause.kind() {
        "extends_clause" | "implements_clause" | "extends_type_clause" => {
            for base in named_children(clause) {
                if base.kind() != "type_arguments" {
                    out.push(text(&base, src).to_string());
                }
            }
        }
        "type_arguments" | "comment" => {}
        _ => out.push(text(clause, src).to_string()),
    }
}

fn extract_import(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(source) = node.child_by_field_name("source") else {
        return;
    };

    let mut import = ImportInfo::new(unquote(text(&source, src)), Vec::new(), node_range(node));
    import.is_type_only = has_keyword(node, "type");
    if let Some(clause) = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "import_clause")
    {
        for part in named_children(&clause) {
            match part.kind() {
                "identifier" => {
                    let local = text(&part, src).to_string();
                    import.names.push(local.clone());
                    import.default = Some(local);
                }
                "namespace_import" => {
                    for alias in named_children(&part) {
                        let local = text(&alias, src).to_string();
                        import.names.push(format!("* as {}", local));
                        import.namespace = Some(local);
                    }
                }
                "named_imports" => import.names.extend(
                    named_children(&part)
                        .iter()
                        .filter(|s| s.kind() == "import_specifier")
                        .filter_map(|s| field_text(s, "name", src)),
                ),
                _ => {}
            }
        }
    }
    result.imports.push(import);
}

/// Names bound by an exported declaration.
fn declared_names(declaration: &Node, src: &[u8]) -> Vec<String> {
    match declaration.kind() {
        "lexical_declaration" | "variable_declaration" => named_children(declaration)
            .iter()
            .filter(|d| d.kind() == "variable_declarator")
            .filter_map(|d| field_text(d, "name", src))
            .collect(),
        _ => field_text(declaration, "name", src).into_iter().collect(),
    }
}

fn extract_export(node: &Node, src: &[u8], result: &mut ParseResult) {
    let range = node_range(node);
    let from_source = field_text(node, "source", src).map(|s| unquote(&s));
    let is_default = has_keyword(node, "default");
    let statement_type_only = has_keyword(node, "type");
    let export = |name: String, original_name: Option<String>, is_type_only: bool| ExportInfo {
        name,
        original_name,
        from_source: from_source.clone(),
        is_type_only,
        is_default,
        range,
    };

    if let Some(declaration) = node.child_by_field_name("declaration") {
        let is_type_only = matches!(
            declaration.kind(),
            "interface_declaration" | "type_alias_declaration"
        );
        for name in declared_names(&declaration, src) {
            let exported = if is_default { "default".to_string() } else { name.clone() };
            let original = is_default.then_some(name);
            result.exports.push(export(exported, original, is_type_only));
        }
        return;
    }

    if is_default {
        let original = node.child_by_field_name("value").map(|v| text(&v, src).to_string());
        result.exports.push(export("default".to_string(), original, false));
        return;
    }

    let clause = named_children(node).into_iter().find(|c| c.kind() == "export_clause");
    match clause {
        Some(clause) => {
            for specifier in named_children(&clause)
                .iter()
                .filter(|s| s.kind() == "export_specifier")
            {
                let Some(local) = field_text(specifier, "name", src) else {
                    continue;
                };
                let exported = field_text(specifier, "alias", src);
                let is_type_only = statement_type_only || has_keyword(specifier, "type");
                match exported {
                    Some(alias) => result.exports.push(export(alias, Some(local), is_type_only)),
                    None => result.exports.push(export(local, None, is_type_only)),
                }
            }
        }
        // `export * from './models'`
        None if from_source.is_some() => {
            let namespace = named_children(node)
                .into_iter()
                .find(|c| c.kind() == "namespace_export")
                .and_then(|n| n.named_child(0))
                .map(|n| text(&n, src).to_string());
            result.exports.push(export(namespace.unwrap_or_else(|| "*".to_string()), None, false));
        }
        None => {}
    }
}

fn extract_call(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };

    let (callee, receiver) = match function.kind() {
        "identifier" => (text(&function, src).to_string(), None),
        "member_expression" => match field_text(&function, "property", src) {
            Some(property) => (property, field_text(&function, "object", src)),
            None => return,
        },
        _ => return,
    };

    let args = node.child_by_field_name("arguments");
    let mut call = call_site(callee, receiver, args, node, src, STRING_KINDS, false);

    // Tagged template: sql`SELECT ...`
    if let Some(template) = args.filter(|a| a.kind() == "template_string") {
        call.arg_count = 1;
        call.string_args = vec![unquote(text(&template, src))];
    }

    if call.callee == "require" && call.receiver.is_none() {
        if let Some(module) = call.string_args.first() {
            result.imports.push(ImportInfo::new(module.clone(), Vec::new(), call.range));
        }
    }
    result.calls.push(call);
}

fn extract_new(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(constructor) = field_text(node, "constructor", src) else {
        return;
    };
    let args = node.child_by_field_name("arguments");
    let (callee, receiver) = match constructor.rsplit_once('.') {
        Some((recv, name)) => (name.to_string(), Some(recv.to_string())),
        None => (constructor, None),
    };
    result
        .calls
        .push(call_site(callee, receiver, args, node, src, STRING_KINDS, true));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ts(source: &str) -> ParseResult {
        let mut parser = TypeScriptParser::new().unwrap();
        parser
            .parse(Language::TypeScript, "test.ts", source, 2000)
            .unwrap()
    }

    #[test]
    fn test_parse_functions() {
        let result = parse_ts(
            "export async function loadUser(id: string, opts?: Options) { }\nconst save = async (user) => { };\nexport const remove = function (id) { };\n",
        );

        assert_eq!(result.functions.len(), 3);
        let load = &result.functions[0];
        assert_eq!(load.name, "loadUser");
        assert_eq!(load.parameter_names(), vec!["id", "opts"]);
        assert_eq!(load.parameters[0].type_annotation.as_deref(), Some("string"));
        assert_eq!(load.parameters[1].type_annotation.as_deref(), Some("Options"));
        assert!(load.is_async);
        assert!(load.is_exported);

        let save = &result.functions[1];
        assert_eq!(save.name, "save");
        assert!(save.is_async);
        assert!(!save.is_exported);

        assert!(result.functions[2].is_exported);
    }

    #[test]
    fn test_parse_decorated_class() {
        let result = parse_ts(
            r#"
@Entity('users')
export class User extends BaseEntity implements Auditable {
  @Column() email: string;
  static async findByEmail(email: string) { return null; }
  private touch() { }
}
"#,
        );

        let class = &result.classes[0];
        assert_eq!(class.name, "User");
        assert_eq!(class.decorators, vec!["Entity('users')"]);
        assert_eq!(class.bases, vec!["BaseEntity", "Auditable"]);
        assert_eq!(class.methods, vec!["findByEmail", "touch"]);
        assert_eq!(class.extends.as_deref(), Some("BaseEntity"));
        assert_eq!(class.implements, vec!["Auditable"]);
        assert!(class.is_exported);
        assert_eq!(class.properties.len(), 1);
        assert_eq!(class.properties[0].name, "email");
        assert_eq!(class.properties[0].type_annotation.as_deref(), Some("string"));

        let find = &result.functions[0];
        assert_eq!(find.qualified_name.as_deref(), Some("User.findByEmail"));
        assert!(find.is_static && find.is_async);
        assert!(!result.functions[1].is_exported);
    }

    #[test]
    fn test_parse_imports() {
        let result = parse_ts(
            "import { PrismaClient, Prisma } from '@prisma/client';\nimport * as knex from 'knex';\nconst db = require('./db');\n",
        );

        assert_eq!(result.imports.len(), 3);
        assert_eq!(result.imports[0].source, "@prisma/client");
        assert_eq!(result.imports[0].names, vec!["PrismaClient", "Prisma"]);
        assert_eq!(result.imports[1].names, vec!["* as knex"]);
        assert_eq!(result.imports[2].source, "./db");
        assert_eq!(result.imports[1].namespace.as_deref(), Some("knex"));
    }

    #[test]
    fn test_signatures_members_and_exports() {
        let result = parse_ts(
            r#"import type { Db } from './db';
import Repo from './repo';

export interface Row extends Base { readonly id: number; email?: string }

export abstract class Store<T> {
  static readonly table = 'stores';
  #cache: Map<string, T>;
  constructor(private readonly db: Db, name: string) {}

  /** Streams every row. */
  async *rows(limit = 10, ...ids: number[]): AsyncGenerator<Row> { }
}

export { Store as default, helper as h };
export * from './models';
export type { Row as Record };
"#,
        );

        assert!(result.imports[0].is_type_only);
        assert_eq!(result.imports[1].default.as_deref(), Some("Repo"));
        assert!(!result.imports[1].is_type_only);

        let row = &result.classes[0];
        assert!(row.is_interface && row.is_exported);
        assert_eq!(row.implements, vec!["Base"]);
        let id = &row.properties[0];
        assert_eq!((id.name.as_str(), id.is_readonly), ("id", true));
        assert_eq!(id.type_annotation.as_deref(), Some("number"));

        let store = &result.classes[1];
        assert!(store.is_abstract);
        let props: Vec<(&str, Visibility)> = store
            .properties
            .iter()
            .map(|p| (p.name.as_str(), p.visibility))
            .collect();
        assert_eq!(
            props,
            vec![
                ("table", Visibility::Public),
                ("#cache", Visibility::Private),
                ("db", Visibility::Private),
            ]
        );
        assert!(store.properties[0].is_static && store.properties[0].is_readonly);
        assert_eq!(store.properties[2].type_annotation.as_deref(), Some("Db"));

        let rows = result.functions.iter().find(|f| f.name == "rows").unwrap();
        assert!(rows.is_generator && rows.is_async);
        assert_eq!(rows.return_type.as_deref(), Some("AsyncGenerator<Row>"));
        assert_eq!(rows.doc_comment.as_deref(), Some("Streams every row."));
        assert_eq!(rows.parameters[0].default_value.as_deref(), Some("10"));
        assert!(rows.parameters[1].is_rest);
        assert_eq!(rows.parameters[1].name, "ids");
        assert_eq!(rows.parameters[1].type_annotation.as_deref(), Some("number[]"));

        let exports: Vec<(&str, Option<&str>)> = result
            .exports
            .iter()
            .map(|e| (e.name.as_str(), e.original_name.as_deref()))
            .collect();
        assert_eq!(
            exports,
            vec![
                ("Row", None),
                ("Store", None),
                ("default", Some("Store")),
                ("h", Some("helper")),
                ("*", None),
                ("Record", Some("Row")),
            ]
        );
        assert!(result.exports[0].is_type_only);
        assert!(!result.exports[1].is_type_only);
        assert_eq!(result.exports[4].from_source.as_deref(), Some("./models"));
        assert!(result.exports[5].is_type_only);
    }

    #[test]
    fn test_parse_calls() {
        let result = parse_ts(
            "await prisma.user.findMany({ where: { email } });\nconst q = knex('orders').where('id', 1);\nconst r = sql`SELECT * FROM invoices`;\nconst c = new pg.Client({});\n",
        );

        let find = result.calls.iter().find(|c| c.callee == "findMany").unwrap();
        assert_eq!(find.receiver.as_deref(), Some("prisma.user"));
        assert_eq!(find.arg_count, 1);

        let knex = result.calls.iter().find(|c| c.callee == "knex").unwrap();
        assert_eq!(knex.string_args, vec!["orders"]);
        let where_call = result.calls.iter().find(|c| c.callee == "where").unwrap();
        assert_eq!(where_call.receiver.as_deref(), Some("knex('orders')"));

        let tagged = result.calls.iter().find(|c| c.callee == "sql").unwrap();
        assert_eq!(tagged.string_args, vec!["SELECT * FROM invoices"]);

        let client = result.calls.iter().find(|c| c.is_constructor).unwrap();
        assert_eq!(client.callee, "Client");
        assert_eq!(client.receiver.as_deref(), Some("pg"));
    }

    #[test]
    fn test_parse_javascript_and_tsx() {
        let mut parser = TypeScriptParser::new().unwrap();
        let js = parser
            .parse(Language::JavaScript, "app.js", "class A extends B { run() {} }\n", 2000)
            .unwrap();
        assert_eq!(js.language, Language::JavaScript);
        assert_eq!(js.classes[0].bases, vec!["B"]);

        let tsx = parser
            .parse(
                Language::TypeScript,
                "view.tsx",
                "export function View() { return <div>{load()}</div>; }\n",
                2000,
            )
            .unwrap();
        assert_eq!(tsx.error_nodes, 0);
        assert!(tsx.calls.iter().any(|c| c.callee == "load"));
    }
}
