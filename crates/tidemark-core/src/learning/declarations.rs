//! Authoritative table declarations: schema files, model classes, DDL.
//!
//! Shared by the convention learner and the ORM model detector. Each
//! recognizer reads one declaration idiom and reports the model, the
//! table and where it was declared.

use once_cell::sync::Lazy;
use regex::Regex;

use super::naming::{pluralize, to_snake_case};
use crate::boundaries::OrmFramework;
use crate::parsers::Language;

/// A table declared in source.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Model, entity or property name, when the idiom has one
    pub model: Option<String>,
    pub table: String,
    /// The table name is spelled out rather than derived
    pub explicit_table: bool,
    pub framework: OrmFramework,
    /// 1-based line of the declaration
    pub line: u32,
    /// Column/field names declared with the model
    pub fields: Vec<String>,
}

/// Table a framework derives from a model name when none is given.
pub fn default_table_name(model: &str) -> String {
    let snake = to_snake_case(model);
    match snake.rsplit_once('_') {
        Some((head, tail)) => format!("{}_{}", head, pluralize(tail)),
        None => pluralize(&snake),
    }
}

macro_rules! lazy_regex {
    ($name:ident, $pattern:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($pattern).expect($pattern));
    };
}

lazy_regex!(PRISMA_MODEL, r"(?m)^\s*model\s+(\w+)\s*\{");
lazy_regex!(PRISMA_MAP, r#"@@map\(\s*(?:name\s*:\s*)?"([^"]+)"\s*\)"#);
lazy_regex!(PRISMA_FIELD, r"(?m)^\s*([a-zA-Z_]\w*)\s+[A-Z]?\w+(?:\[\])?\??");
lazy_regex!(
    DJANGO_MODEL,
    r"(?m)^([ \t]*)class\s+(\w+)\s*\(([^)]*(?:models\.)?Model[^)]*)\)\s*:"
);
lazy_regex!(DJANGO_DB_TABLE, r#"db_table\s*=\s*['"]([^'"]+)['"]"#);
lazy_regex!(
    DJANGO_FIELD,
    r"(?m)^[ \t]+(\w+)\s*=\s*models\.(?:\w+Field|ForeignKey|OneToOneField|ManyToManyField)\("
);
lazy_regex!(SQLALCHEMY_TABLENAME, r#"(?m)^[ \t]+__tablename__\s*=\s*['"]([^'"]+)['"]"#);
lazy_regex!(
    SQLALCHEMY_FIELD,
    r"(?m)^[ \t]+(\w+)\s*(?::\s*Mapped\[[^\]]*\]\s*)?=\s*(?:db\.)?(?:Column|mapped_column|relationship)\("
);
lazy_regex!(CLASS_NAME, r"(?m)^[ \t]*(?:export\s+)?(?:public\s+|internal\s+|abstract\s+|final\s+|partial\s+)*class\s+(\w+)");
lazy_regex!(
    TYPEORM_ENTITY,
    r#"@Entity\(\s*(?:['"]([^'"]+)['"]|\{[^}]*name\s*:\s*['"]([^'"]+)['"][^}]*\})?\s*\)"#
);
lazy_regex!(JPA_ENTITY, r"(?m)^[ \t]*@Entity\b");
lazy_regex!(JPA_TABLE, r#"@Table\(\s*name\s*=\s*"([^"]+)""#);
lazy_regex!(EF_DBSET, r"DbSet<(\w+)>\s+(\w+)\s*[{;=]");
lazy_regex!(EF_TABLE_ATTRIBUTE, r#"\[Table\(\s*"([^"]+)""#);
lazy_regex!(EF_TO_TABLE, r#"Entity<(\w+)>\(\)(?:\s*\.\s*\w+\([^)]*\))*\s*\.\s*ToTable\(\s*"([^"]+)""#);
lazy_regex!(ELOQUENT_TABLE, r#"protected\s+\$table\s*=\s*['"]([^'"]+)['"]"#);
lazy_regex!(ELOQUENT_MODEL, r"(?m)^[ \t]*(?:final\s+)?class\s+(\w+)\s+extends\s+(?:\\?[\w\\]*\\)?Model\b");
lazy_regex!(SEQUELIZE_DEFINE, r#"\.define\(\s*['"](\w+)['"]"#);
lazy_regex!(SEQUELIZE_TABLE_NAME, r#"tableName\s*:\s*['"]([^'"]+)['"]"#);
lazy_regex!(
    MONGOOSE_MODEL,
    r#"\bmodel\(\s*['"](\w+)['"]\s*,\s*[\w.]+(?:\s*,\s*['"]([^'"]+)['"])?"#
);
lazy_regex!(KNEX_CREATE_TABLE, r#"schema\s*\.\s*createTable\(\s*['"](\w+)['"]"#);
lazy_regex!(DRIZZLE_TABLE, r#"\b(?:pg|mysql|sqlite)Table\(\s*['"](\w+)['"]"#);
lazy_regex!(
    CREATE_TABLE,
    r#"(?i)\bCREATE\s+(?:TEMP(?:ORARY)?\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:[`"\[]?\w+[`"\]]?\.)?[`"\[]?(\w+)"#
);
lazy_regex!(
    EVIDENCE,
    r"(?im)^\s*model\s+\w+\s*\{|\b(?:select\s.+\sfrom|insert\s+into|update\s+\w+\s+set|delete\s+from|create\s+table)\b|@@map|models\.Model|__tablename__|@Entity|@Table|DbSet<|DbContext|\$table\b|\.define\(|\bmodel\(|Schema\(|createTable|(?:pg|mysql|sqlite)Table\(|prisma\.|\.objects\.|\bknex\b|\bDB::|\bsession\.(?:query|execute|add)|Repository<|getRepository|\.(?:query|execute)\("
);

/// Whether `content` shows any sign of touching a database.
pub fn has_data_access_evidence(content: &str) -> bool {
    EVIDENCE.is_match(content)
}

/// 1-based line of a byte offset.
fn line_at(content: &str, offset: usize) -> u32 {
    content[..offset.min(content.len())].matches('\n').count() as u32 + 1
}

fn is_prisma_schema(path: &str) -> bool {
    path.ends_with(".prisma")
}

/// Every declaration in `content`, in source order.
pub fn scan_declarations(content: &str, path: &str) -> Vec<Declaration> {
    let language = Language::from_path(path);
    let mut found = Vec::new();

    if is_prisma_schema(path) {
        prisma(content, &mut found);
    }
    match language {
        Some(Language::Python) => {
            django(content, &mut found);
            sqlalchemy(content, &mut found);
        }
        Some(Language::Java) => jpa(content, &mut found),
        Some(Language::CSharp) => ef_core(content, &mut found),
        Some(Language::Php) => eloquent(content, &mut found),
        Some(Language::TypeScript | Language::JavaScript) => {
            typeorm(content, &mut found);
            sequelize(content, &mut found);
            mongoose(content, &mut found);
            simple(content, &KNEX_CREATE_TABLE, OrmFramework::Knex, &mut found);
            simple(content, &DRIZZLE_TABLE, OrmFramework::Drizzle, &mut found);
        }
        None => {}
    }
    simple(content, &CREATE_TABLE, OrmFramework::RawSql, &mut found);

    found.sort_by_key(|d| d.line);
    found.dedup_by(|a, b| a.line == b.line && a.table == b.table);
    found
}

/// Body of a brace block opening at or after `from`.
fn brace_block(content: &str, from: usize) -> &str {
    let Some(open) = content[from..].find('{').map(|i| from + i) else {
        return "";
    };
    let mut depth = 0usize;
    for (i, c) in content[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return &content[open + 1..open + i];
                }
            }
            _ => {}
        }
    }
    &content[open + 1..]
}

/// Lines of a Python class body: everything indented deeper than the
/// class line, up to the first line that is not.
fn python_block<'a>(content: &'a str, class_end: usize, class_indent: usize) -> &'a str {
    let rest = &content[class_end..];
    let mut end = rest.len();
    let mut offset = 0;
    for (n, line) in rest.split_inclusive('\n').enumerate() {
        let blank = line.trim().is_empty();
        let indent = line.len() - line.trim_start().len();
        if n > 0 && !blank && indent <= class_indent {
            end = offset;
            break;
        }
        offset += line.len();
    }
    &rest[..end]
}

fn prisma(content: &str, found: &mut Vec<Declaration>) {
    for caps in PRISMA_MODEL.captures_iter(content) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let block = brace_block(content, whole.start());
        let mapped = PRISMA_MAP.captures(block).and_then(|m| m.get(1));
        let fields = PRISMA_FIELD
            .captures_iter(block)
            .filter_map(|f| f.get(1))
            .map(|f| f.as_str().to_string())
            .collect();
        found.push(Declaration {
            model: Some(name.as_str().to_string()),
            table: mapped
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| default_table_name(name.as_str())),
            explicit_table: mapped.is_some(),
            framework: OrmFramework::Prisma,
            line: line_at(content, name.start()),
            fields,
        });
    }
}

fn django(content: &str, found: &mut Vec<Declaration>) {
    for caps in DJANGO_MODEL.captures_iter(content) {
        let (Some(whole), Some(indent), Some(name), Some(bases)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };
        if !bases.as_str().contains("models.Model") && bases.as_str().trim() != "Model" {
            continue;
        }
        let body = python_block(content, whole.end(), indent.as_str().len());
        // SQLAlchemy declarative classes are handled by `sqlalchemy`.
        if SQLALCHEMY_TABLENAME.is_match(body) {
            continue;
        }
        let explicit = DJANGO_DB_TABLE.captures(body).and_then(|c| c.get(1));
        let fields = DJANGO_FIELD
            .captures_iter(body)
            .filter_map(|f| f.get(1))
            .map(|f| f.as_str().to_string())
            .collect();
        found.push(Declaration {
            model: Some(name.as_str().to_string()),
            table: explicit
                .map(|t| t.as_str().to_string())
                .unwrap_or_else(|| default_table_name(name.as_str())),
            explicit_table: explicit.is_some(),
            framework: OrmFramework::Django,
            line: line_at(content, name.start()),
            fields,
        });
    }
}

/// Nearest class declared before `offset`.
fn enclosing_class(content: &str, offset: usize) -> Option<(String, usize)> {
    CLASS_NAME
        .captures_iter(&content[..offset])
        .filter_map(|c| c.get(1))
        .last()
        .map(|m| (m.as_str().to_string(), m.start()))
}

/// Nearest class declared after `offset`.
fn following_class(content: &str, offset: usize) -> Option<(String, usize)> {
    CLASS_NAME
        .captures(&content[offset..])
        .and_then(|c| c.get(1))
        .map(|m| (m.as_str().to_string(), offset + m.start()))
}

fn sqlalchemy(content: &str, found: &mut Vec<Declaration>) {
    for caps in SQLALCHEMY_TABLENAME.captures_iter(content) {
        let Some(table) = caps.get(1) else {
            continue;
        };
        let class = enclosing_class(content, table.start());
        let fields = match &class {
            Some((_, start)) => {
                let start = *start;
                let line_start = content[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
                let indent = content[line_start..start].len()
                    - content[line_start..start].trim_start().len();
                let class_line_end = content[start..].find('\n').map(|i| start + i).unwrap_or(content.len());
                SQLALCHEMY_FIELD
                    .captures_iter(python_block(content, class_line_end, indent))
                    .filter_map(|f| f.get(1))
                    .map(|f| f.as_str().to_string())
                    .collect()
            }
            None => Vec::new(),
        };
        found.push(Declaration {
            model: class.map(|(name, _)| name),
            table: table.as_str().to_string(),
            explicit_table: true,
            framework: OrmFramework::SqlAlchemy,
            line: line_at(content, table.start()),
            fields,
        });
    }
}

fn typeorm(content: &str, found: &mut Vec<Declaration>) {
    for caps in TYPEORM_ENTITY.captures_iter(content) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let explicit = caps.get(1).or_else(|| caps.get(2));
        let Some((model, start)) = following_class(content, whole.end()) else {
            continue;
        };
        found.push(Declaration {
            table: explicit
                .map(|t| t.as_str().to_string())
                .unwrap_or_else(|| default_table_name(&model)),
            explicit_table: explicit.is_some(),
            model: Some(model),
            framework: OrmFramework::TypeOrm,
            line: line_at(content, start),
            fields: Vec::new(),
        });
    }
}

fn jpa(content: &str, found: &mut Vec<Declaration>) {
    for entity in JPA_ENTITY.find_iter(content) {
        let Some((model, start)) = following_class(content, entity.end()) else {
            continue;
        };
        let annotations = &content[entity.start()..start];
        let explicit = JPA_TABLE.captures(annotations).and_then(|c| c.get(1));
        found.push(Declaration {
            table: explicit
                .map(|t| t.as_str().to_string())
                .unwrap_or_else(|| default_table_name(&model)),
            explicit_table: explicit.is_some(),
            model: Some(model),
            framework: OrmFramework::Jpa,
            line: line_at(content, start),
            fields: Vec::new(),
        });
    }
}

fn ef_core(content: &str, found: &mut Vec<Declaration>) {
    for caps in EF_DBSET.captures_iter(content) {
        let (Some(entity), Some(property)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        found.push(Declaration {
            model: Some(entity.as_str().to_string()),
            table: to_snake_case(property.as_str()),
            explicit_table: false,
            framework: OrmFramework::EfCore,
            line: line_at(content, property.start()),
            fields: Vec::new(),
        });
    }
    for caps in EF_TO_TABLE.captures_iter(content) {
        let (Some(entity), Some(table)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        found.push(Declaration {
            model: Some(entity.as_str().to_string()),
            table: table.as_str().to_string(),
            explicit_table: true,
            framework: OrmFramework::EfCore,
            line: line_at(content, table.start()),
            fields: Vec::new(),
        });
    }
    for caps in EF_TABLE_ATTRIBUTE.captures_iter(content) {
        let (Some(whole), Some(table)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        found.push(Declaration {
            model: following_class(content, whole.end()).map(|(name, _)| name),
            table: table.as_str().to_string(),
            explicit_table: true,
            framework: OrmFramework::EfCore,
            line: line_at(content, table.start()),
            fields: Vec::new(),
        });
    }
}

fn eloquent(content: &str, found: &mut Vec<Declaration>) {
    let explicit: Vec<(usize, String)> = ELOQUENT_TABLE
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|t| (t.start(), t.as_str().to_string()))
        .collect();

    for caps in ELOQUENT_MODEL.captures_iter(content) {
        let Some(name) = caps.get(1) else {
            continue;
        };
        let body = brace_block(content, name.end());
        let body_start = content[name.end()..]
            .find('{')
            .map(|i| name.end() + i)
            .unwrap_or(name.end());
        let table = explicit
            .iter()
            .find(|(at, _)| *at > body_start && *at <= body_start + body.len() + 1)
            .map(|(_, t)| t.clone());
        found.push(Declaration {
            model: Some(name.as_str().to_string()),
            explicit_table: table.is_some(),
            table: table.unwrap_or_else(|| default_table_name(name.as_str())),
            framework: OrmFramework::Eloquent,
            line: line_at(content, name.start()),
            fields: Vec::new(),
        });
    }
}

fn sequelize(content: &str, found: &mut Vec<Declaration>) {
    let defines: Vec<_> = SEQUELIZE_DEFINE.captures_iter(content).filter_map(|c| c.get(1)).collect();
    let table_names: Vec<_> = SEQUELIZE_TABLE_NAME
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .collect();

    for (i, model) in defines.iter().enumerate() {
        let next_define = defines.get(i + 1).map(|d| d.start()).unwrap_or(content.len());
        let explicit = table_names
            .iter()
            .find(|t| t.start() > model.start() && t.start() < next_define);
        found.push(Declaration {
            model: Some(model.as_str().to_string()),
            table: explicit
                .map(|t| t.as_str().to_string())
                .unwrap_or_else(|| default_table_name(model.as_str())),
            explicit_table: explicit.is_some(),
            framework: OrmFramework::Sequelize,
            line: line_at(content, model.start()),
            fields: Vec::new(),
        });
    }

    // `Model.init({...}, { tableName: 'x' })` without `define`
    for table in table_names
        .iter()
        .filter(|t| !defines.iter().any(|d| d.start() < t.start()))
    {
        found.push(Declaration {
            model: enclosing_class(content, table.start()).map(|(name, _)| name),
            table: table.as_str().to_string(),
            explicit_table: true,
            framework: OrmFramework::Sequelize,
            line: line_at(content, table.start()),
            fields: Vec::new(),
        });
    }
}

fn mongoose(content: &str, found: &mut Vec<Declaration>) {
    for caps in MONGOOSE_MODEL.captures_iter(content) {
        let Some(model) = caps.get(1) else {
            continue;
        };
        let explicit = caps.get(2);
        found.push(Declaration {
            model: Some(model.as_str().to_string()),
            table: explicit
                .map(|c| c.as_str().to_string())
                .unwrap_or_else(|| default_table_name(model.as_str())),
            explicit_table: explicit.is_some(),
            framework: OrmFramework::Mongoose,
            line: line_at(content, model.start()),
            fields: Vec::new(),
        });
    }
}

/// Idioms whose first capture group is the table name.
fn simple(content: &str, regex: &Regex, framework: OrmFramework, found: &mut Vec<Declaration>) {
    for caps in regex.captures_iter(content) {
        let Some(table) = caps.get(1) else {
            continue;
        };
        found.push(Declaration {
            model: None,
            table: table.as_str().to_string(),
            explicit_table: true,
            framework,
            line: line_at(content, table.start()),
            fields: Vec::new(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(decls: &[Declaration]) -> Vec<&str> {
        decls.iter().map(|d| d.table.as_str()).collect()
    }

    #[test]
    fn test_prisma_models() {
        let schema = r#"
model User {
  id    Int    @id @default(autoincrement())
  email String @unique
  posts Post[]
}

model Post {
  id       Int  @id
  authorId Int
  @@map("blog_posts")
}
"#;
        let decls = scan_declarations(schema, "prisma/schema.prisma");
        assert_eq!(tables(&decls), vec!["users", "blog_posts"]);
        assert_eq!(decls[0].model.as_deref(), Some("User"));
        assert_eq!(decls[0].fields, vec!["id", "email", "posts"]);
        assert!(!decls[0].explicit_table);
        assert!(decls[1].explicit_table);
        assert_eq!(decls[1].line, 8);
        assert_eq!(decls[0].framework, OrmFramework::Prisma);
    }

    #[test]
    fn test_django_and_sqlalchemy() {
        let source = r#"
from django.db import models

class Customer(models.Model):
    email = models.EmailField()
    name = models.CharField(max_length=80)

    class Meta:
        db_table = "crm_customers"

class Invoice(models.Model):
    total = models.DecimalField()

class Payment(Base):
    __tablename__ = "payments"
    id = Column(Integer, primary_key=True)
    amount: Mapped[int] = mapped_column()
"#;
        let decls = scan_declarations(source, "app/models.py");
        assert_eq!(tables(&decls), vec!["crm_customers", "invoices", "payments"]);
        assert_eq!(decls[0].fields, vec!["email", "name"]);
        assert!(decls[0].explicit_table);
        assert_eq!(decls[2].framework, OrmFramework::SqlAlchemy);
        assert_eq!(decls[2].model.as_deref(), Some("Payment"));
        assert_eq!(decls[2].fields, vec!["id", "amount"]);
    }

    #[test]
    fn test_ef_core_dbsets() {
        let source = r#"
public class ShopContext : DbContext
{
    public DbSet<Order> Orders { get; set; }
    public DbSet<OrderLine> OrderLines { get; set; }
}
"#;
        let decls = scan_declarations(source, "Data/ShopContext.cs");
        assert_eq!(tables(&decls), vec!["orders", "order_lines"]);
        assert_eq!(decls[0].model.as_deref(), Some("Order"));
        assert_eq!(decls[0].framework, OrmFramework::EfCore);
    }

    #[test]
    fn test_jvm_php_and_js_idioms() {
        let java = "@Entity\n@Table(name = \"purchase_orders\")\npublic class PurchaseOrder {}\n@Entity\nclass Vendor {}\n";
        assert_eq!(tables(&scan_declarations(java, "Po.java")), vec!["purchase_orders", "vendors"]);

        let php = "<?php\nclass Flight extends Model\n{\n    protected $table = 'my_flights';\n}\nclass Airport extends Model {}\n";
        assert_eq!(tables(&scan_declarations(php, "Flight.php")), vec!["my_flights", "airports"]);

        let ts = r#"
@Entity('accounts')
export class Account {}
const Tag = sequelize.define('Tag', {}, { tableName: 'labels' });
const Cat = mongoose.model('Cat', catSchema);
export const events = pgTable('events', {});
"#;
        let decls = scan_declarations(ts, "src/models.ts");
        assert_eq!(tables(&decls), vec!["accounts", "labels", "cats", "events"]);
        assert_eq!(decls[1].framework, OrmFramework::Sequelize);
        assert_eq!(decls[3].framework, OrmFramework::Drizzle);
    }

    #[test]
    fn test_create_table() {
        let sql = "CREATE TABLE IF NOT EXISTS public.\"audit_log\" (id int);\ncreate table sessions (id int);\n";
        let decls = scan_declarations(sql, "migrations/001.sql");
        assert_eq!(tables(&decls), vec!["audit_log", "sessions"]);
        assert!(decls.iter().all(|d| d.framework == OrmFramework::RawSql && d.model.is_none()));
    }

    #[test]
    fn test_evidence() {
        assert!(has_data_access_evidence("rows = db.execute(\"SELECT id FROM users\")"));
        assert!(has_data_access_evidence("class User(models.Model):"));
        assert!(has_data_access_evidence("model Post {\n  id Int @id\n}\n"));
        assert!(!has_data_access_evidence("def add(a, b):\n    return a + b\n"));
    }

    #[test]
    fn test_default_table_name() {
        assert_eq!(default_table_name("OrderItem"), "order_items");
        assert_eq!(default_table_name("Category"), "categories");
        assert_eq!(default_table_name("Person"), "people");
    }
}
