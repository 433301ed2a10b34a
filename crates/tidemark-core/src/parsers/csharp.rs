//! C# parser using native tree-sitter
//!
//! Extracts methods, classes, using directives, invocations and object
//! creation from C# code. Attributes are reported as decorators, which
//! covers ASP.NET and Entity Framework annotations.

use tree_sitter::{Node, Parser};

use super::types::*;
use super::walk::{
    ancestor, call_site, doc_comment, field_text, named_children, new_parser, node_range,
    parse_with, text,
};
use crate::errors::ExtractionError;

const STRING_KINDS: &[&str] = &[
    "string_literal",
    "verbatim_string_literal",
    "raw_string_literal",
    "interpolated_string_expression",
];
const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "record_declaration",
    "struct_declaration",
];

/// C# parser
pub struct CSharpParser {
    parser: Parser,
}

impl CSharpParser {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            parser: new_parser(tree_sitter_c_sharp::LANGUAGE.into(), Language::CSharp)?,
        })
    }

    pub fn parse(
        &mut self,
        file: &str,
        source: &str,
        timeout_ms: u64,
    ) -> Result<ParseResult, ExtractionError> {
        parse_with(&mut self.parser, Language::CSharp, file, source, timeout_ms, visit)
    }
}

fn visit(node: Node<'_>, src: &[u8], result: &mut ParseResult) {
    match node.kind() {
        "method_declaration" | "constructor_declaration" | "local_function_statement" => {
            extract_method(&node, src, result)
        }
        "class_declaration" | "interface_declaration" | "record_declaration"
        | "struct_declaration" => extract_type(&node, src, result),
        "using_directive" => extract_using(&node, src, result),
        "invocation_expression" => extract_invocation(&node, src, result),
        "object_creation_expression" => extract_creation(&node, src, result),
        _ => {}
    }
}

fn strip_generics(name: &str) -> String {
    name.split('<').next().unwrap_or(name).trim().to_string()
}

fn modifiers(node: &Node, src: &[u8]) -> Vec<String> {
    named_children(node)
        .iter()
        .filter(|c| c.kind() == "modifier")
        .map(|c| text(c, src).to_string())
        .collect()
}

fn attributes(node: &Node, src: &[u8]) -> Vec<String> {
    named_children(node)
        .iter()
        .filter(|c| c.kind() == "attribute_list")
        .flat_map(named_children)
        .filter(|a| a.kind() == "attribute")
        .filter_map(|a| field_text(&a, "name", src))
        .collect()
}

fn parameter(param: &Node, src: &[u8]) -> Option<ParameterInfo> {
    if !matches!(param.kind(), "parameter" | "parameter_array") {
        return None;
    }
    let name = field_text(param, "name", src).or_else(|| {
        named_children(param)
            .into_iter()
            .filter(|c| c.kind() == "identifier")
            .last()
            .map(|c| text(&c, src).to_string())
    })?;
    let default_value = named_children(param)
        .into_iter()
        .find(|c| c.kind() == "equals_value_clause")
        .map(|c| text(&c, src).trim_start_matches('=').trim().to_string());

    Some(ParameterInfo {
        name,
        type_annotation: field_text(param, "type", src),
        default_value,
        is_rest: param.kind() == "parameter_array" || text(param, src).starts_with("params "),
    })
}

fn parameters(list: Option<Node<'_>>, src: &[u8]) -> Vec<ParameterInfo> {
    list.map(|params| named_children(&params).iter().filter_map(|p| parameter(p, src)).collect())
        .unwrap_or_default()
}

/// `///` XML doc text without the `<summary>` wrapper.
fn xml_doc(node: &Node, src: &[u8]) -> Option<String> {
    let raw = doc_comment(node, src)?;
    let lines: Vec<&str> = raw
        .lines()
        .map(|l| l.trim_start_matches("<summary>").trim_end_matches("</summary>").trim())
        .filter(|l| !l.is_empty() && *l != "<summary>" && *l != "</summary>")
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn extract_method(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(name) = field_text(node, "name", src) else {
        return;
    };

    let parameters = parameters(node.child_by_field_name("parameters"), src);
    let modifiers = modifiers(node, src);
    let owner = ancestor(node, TYPE_DECLARATIONS);
    let in_interface = owner.is_some_and(|t| t.kind() == "interface_declaration");
    let qualified_name = owner
        .and_then(|t| field_text(&t, "name", src))
        .map(|owner| format!("{}.{}", owner, name));
    let return_type = field_text(node, "returns", src).or_else(|| field_text(node, "type", src));

    result.functions.push(FunctionInfo {
        name,
        qualified_name,
        parameters,
        return_type,
        is_async: modifiers.iter().any(|m| m == "async"),
        is_static: modifiers.iter().any(|m| m == "static"),
        is_generator: false,
        is_exported: in_interface || modifiers.iter().any(|m| m == "public"),
        decorators: attributes(node, src),
        modifiers,
        doc_comment: xml_doc(node, src),
        range: node_range(node),
    });
}

/// `I` followed by an uppercase letter: `IUnitOfWork`, `IDisposable`.
fn looks_like_interface(name: &str) -> bool {
    let mut chars = name.rsplit('.').next().unwrap_or(name).chars();
    chars.next() == Some('I') && chars.next().is_some_and(|c| c.is_ascii_uppercase())
}

fn has_setter(property: &Node, src: &[u8]) -> bool {
    named_children(property)
        .iter()
        .filter(|c| c.kind() == "accessor_list")
        .flat_map(named_children)
        .any(|accessor| {
            text(&accessor, src)
                .split(|c: char| !c.is_alphanumeric())
                .any(|w| w == "set")
        })
}

fn properties(node: &Node, src: &[u8], in_interface: bool) -> Vec<PropertyInfo> {
    let mut props = Vec::new();
    let default_visibility = if in_interface { Visibility::Public } else { Visibility::Private };

    if node.kind() == "record_declaration" {
        let header = named_children(node).into_iter().find(|c| c.kind() == "parameter_list");
        for param in parameters(header, src) {
            props.push(PropertyInfo {
                name: param.name,
                type_annotation: param.type_annotation,
                visibility: Visibility::Public,
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
    for member in &members {
        let mods = modifiers(member, src);
        let has = |m: &str| mods.iter().any(|x| x == m);
        let visibility = Visibility::from_modifiers(&mods).unwrap_or(default_visibility);
        match member.kind() {
            "property_declaration" => {
                let Some(name) = field_text(member, "name", src) else {
                    continue;
                };
                props.push(PropertyInfo {
                    name,
                    type_annotation: field_text(member, "type", src),
                    visibility,
                    is_static: has("static"),
                    is_readonly: !has_setter(member, src),
                    range: node_range(member),
                });
            }
            "field_declaration" => {
                let Some(declaration) = named_children(member)
                    .into_iter()
                    .find(|c| c.kind() == "variable_declaration")
                else {
                    continue;
                };
                let ty = field_text(&declaration, "type", src);
                for declarator in named_children(&declaration)
                    .iter()
                    .filter(|c| c.kind() == "variable_declarator")
                {
                    let name = field_text(declarator, "name", src).or_else(|| {
                        declarator.named_child(0).map(|n| text(&n, src).to_string())
                    });
                    let Some(name) = name else {
                        continue;
                    };
                    props.push(PropertyInfo {
                        name,
                        type_annotation: ty.clone(),
                        visibility,
                        is_static: has("static") || has("const"),
                        is_readonly: has("readonly") || has("const"),
                        range: node_range(member),
                    });
                }
            }
            _ => {}
        }
    }
    props
}

fn extract_type(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(name) = field_text(node, "name", src) else {
        return;
    };

    let bases: Vec<String> = named_children(node)
        .iter()
        .filter(|c| c.kind() == "base_list")
        .flat_map(named_children)
        .filter(|b| b.kind() != "argument_list")
        .map(|b| strip_generics(text(&b, src)))
        .filter(|b| !b.is_empty())
        .collect();

    // The base list does not tell a superclass from an interface; only a
    // class's first base can be one.
    let is_interface = node.kind() == "interface_declaration";
    let extends = bases
        .first()
        .filter(|b| node.kind() == "class_declaration" && !looks_like_interface(b))
        .cloned();
    let implements = bases.iter().skip(usize::from(extends.is_some())).cloned().collect();

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

    let modifiers = modifiers(node, src);
    result.classes.push(ClassInfo {
        name,
        bases,
        extends,
        implements,
        methods,
        properties: properties(node, src, is_interface),
        decorators: attributes(node, src),
        is_interface,
        is_abstract: is_interface || modifiers.iter().any(|m| m == "abstract"),
        is_exported: modifiers.iter().any(|m| m == "public"),
        range: node_range(node),
    });
}

fn extract_using(node: &Node, src: &[u8], result: &mut ParseResult) {
    // `using Alias = Some.Namespace;` keeps the target as the source.
    let names = named_children(node);
    let Some(target) = names
        .iter()
        .filter(|c| matches!(c.kind(), "qualified_name" | "identifier" | "generic_name"))
        .last()
    else {
        return;
    };
    let mut cursor = node.walk();
    let aliased = node.children(&mut cursor).any(|c| c.kind() == "=");
    let alias = names
        .iter()
        .find(|c| c.kind() == "name_equals")
        .and_then(|n| n.named_child(0))
        .or_else(|| aliased.then(|| names.first().copied()).flatten());

    let mut import = ImportInfo::new(text(target, src).to_string(), Vec::new(), node_range(node));
    import.namespace = alias.map(|a| text(&a, src).to_string());
    result.imports.push(import);
}

fn extract_invocation(node: &Node, src: &[u8], result: &mut ParseResult) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };

    let (callee, receiver) = match function.kind() {
        "member_access_expression" => match field_text(&function, "name", src) {
            Some(name) => (strip_generics(&name), field_text(&function, "expression", src)),
            None => return,
        },
        "identifier" | "generic_name" => (strip_generics(text(&function, src)), None),
        _ => return,
    };

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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParseResult {
        let mut parser = CSharpParser::new().unwrap();
        parser.parse("Test.cs", source, 2000).unwrap()
    }

    const CONTEXT: &str = r#"
using System.Linq;
using Microsoft.EntityFrameworkCore;

namespace Shop.Data
{
    [Table("orders")]
    public class AppDbContext : DbContext, IUnitOfWork
    {
        public DbSet<Order> Orders { get; set; }

        public async Task<List<Order>> OpenOrders(string status)
        {
            return await dbContext.Orders.Where(o => o.Status == "open").ToListAsync();
        }

        private static void Purge()
        {
            Database.ExecuteSqlRaw("DELETE FROM sessions");
            var o = new Order();
        }
    }
}
"#;

    #[test]
    fn test_parse_class() {
        let result = parse(CONTEXT);

        assert_eq!(result.classes.len(), 1);
        let class = &result.classes[0];
        assert_eq!(class.name, "AppDbContext");
        assert_eq!(class.bases, vec!["DbContext", "IUnitOfWork"]);
        assert_eq!(class.decorators, vec!["Table"]);
        assert_eq!(class.methods, vec!["OpenOrders", "Purge"]);
        assert_eq!(class.extends.as_deref(), Some("DbContext"));
        assert_eq!(class.implements, vec!["IUnitOfWork"]);

        let orders = &class.properties[0];
        assert_eq!(orders.name, "Orders");
        assert_eq!(orders.type_annotation.as_deref(), Some("DbSet<Order>"));
        assert_eq!(orders.visibility, Visibility::Public);
        assert!(!orders.is_readonly);
    }

    #[test]
    fn test_members_and_docs() {
        let result = parse(
            r#"using Db = Shop.Data.AppDbContext;

public sealed record Customer(string Email, int Age);

public abstract class Repository : IDisposable
{
    private readonly string _connection;
    const int PageSize = 50;
    public string Name => "repo";

    /// <summary>
    /// Loads a page of rows.
    /// </summary>
    public abstract IList<Row> Load(int page = 0, params string[] columns);
}
"#,
        );

        assert_eq!(result.imports[0].source, "Shop.Data.AppDbContext");
        assert_eq!(result.imports[0].namespace.as_deref(), Some("Db"));

        let customer = &result.classes[0];
        let components: Vec<&str> = customer.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(components, vec!["Email", "Age"]);
        assert!(customer.properties.iter().all(|p| p.is_readonly));

        let repo = &result.classes[1];
        assert!(repo.is_abstract && repo.is_exported);
        assert_eq!(repo.extends, None);
        assert_eq!(repo.implements, vec!["IDisposable"]);
        let connection = &repo.properties[0];
        assert_eq!(connection.name, "_connection");
        assert_eq!(connection.visibility, Visibility::Private);
        assert!(connection.is_readonly && !connection.is_static);
        let page_size = &repo.properties[1];
        assert!(page_size.is_static && page_size.is_readonly);
        assert_eq!(page_size.visibility, Visibility::Private);
        assert!(repo.properties[2].is_readonly);

        let load = &result.functions[0];
        assert_eq!(load.doc_comment.as_deref(), Some("Loads a page of rows."));
        assert_eq!(load.parameter_names(), vec!["page", "columns"]);
        assert_eq!(load.parameters[0].default_value.as_deref(), Some("0"));
        assert!(load.parameters[1].is_rest);
        assert_eq!(load.return_type.as_deref(), Some("IList<Row>"));
    }

    #[test]
    fn test_parse_methods() {
        let result = parse(CONTEXT);

        let open = &result.functions[0];
        assert_eq!(open.qualified_name.as_deref(), Some("AppDbContext.OpenOrders"));
        assert_eq!(open.parameter_names(), vec!["status"]);
        assert_eq!(open.parameters[0].type_annotation.as_deref(), Some("string"));
        assert_eq!(open.return_type.as_deref(), Some("Task<List<Order>>"));
        assert!(open.is_async);
        assert!(open.is_exported);

        let purge = &result.functions[1];
        assert!(purge.is_static);
        assert!(!purge.is_exported);
        assert_eq!(purge.modifiers, vec!["private", "static"]);
    }

    #[test]
    fn test_parse_usings_and_calls() {
        let result = parse(CONTEXT);

        let sources: Vec<&str> = result.imports.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(sources, vec!["System.Linq", "Microsoft.EntityFrameworkCore"]);

        let where_call = result.calls.iter().find(|c| c.callee == "Where").unwrap();
        assert_eq!(where_call.receiver.as_deref(), Some("dbContext.Orders"));
        assert!(where_call.args_text.contains("o.Status == \"open\""));
        assert_eq!(where_call.range.start.line, 14);

        let raw = result.calls.iter().find(|c| c.callee == "ExecuteSqlRaw").unwrap();
        assert_eq!(raw.string_args, vec!["DELETE FROM sessions"]);

        let ctor = result.calls.iter().find(|c| c.is_constructor).unwrap();
        assert_eq!(ctor.callee, "Order");
        assert_eq!(ctor.arg_count, 0);
    }
}
