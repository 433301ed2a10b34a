//! Data access recognition on extracted call sites.
//!
//! Recognizers run in order and the first one that claims a call wins.
//! Each reports the operation, the framework and whatever names the
//! table; resolving that into a table name is `tables`' job.

use once_cell::sync::Lazy;
use regex::Regex;

use super::sql::parse_sql;
use super::types::{DataOperation, OrmFramework};
use crate::parsers::{CallSite, Language};

/// A call recognized as touching the database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallAccess {
    pub operation: DataOperation,
    pub framework: Option<OrmFramework>,
    pub is_raw_sql: bool,
    /// SQL text carried by the call
    pub sql: Option<String>,
    /// Table spelled out by framework syntax (`knex('orders')`)
    pub explicit_table: Option<String>,
    /// Model named by framework syntax (`prisma.user`, `User.objects`)
    pub model: Option<String>,
    /// Weaker naming evidence (`userRepository`, `session.add(order)`)
    pub identifier: Option<String>,
    pub fields: Vec<String>,
}

type Recognizer = fn(&CallSite, Language) -> Option<CallAccess>;

const RECOGNIZERS: &[Recognizer] = &[
    raw_sql,
    prisma,
    table_chain,
    django,
    sqlalchemy,
    ef_core,
    typeorm_repository,
    entity_manager,
    repository,
    static_model,
    drizzle,
];

/// Recognize `call` as a data access, if it is one.
pub fn recognize_call(call: &CallSite, language: Language) -> Option<CallAccess> {
    RECOGNIZERS.iter().find_map(|recognize| recognize(call, language)).map(|mut access| {
        if access.fields.is_empty() {
            access.fields = argument_fields(call, language);
        }
        access
    })
}

/// Access through an identifier the learned conventions know.
pub fn learned_access(call: &CallSite, framework: Option<OrmFramework>) -> Option<CallAccess> {
    let operation = operation_for_callee(&call.callee);
    if operation == DataOperation::Unknown {
        return None;
    }
    let receiver = call.receiver.as_deref()?;
    Some(CallAccess {
        operation,
        framework,
        identifier: Some(receiver_tail(receiver).to_string()),
        ..Default::default()
    })
}

const DELETE_PREFIXES: &[&str] = &["delete", "destroy", "remove", "drop", "truncate", "purge"];
const WRITE_PREFIXES: &[&str] = &[
    "create", "insert", "save", "update", "upsert", "add", "put", "persist", "merge", "bulk_create",
    "bulkcreate", "increment", "decrement", "store", "attach", "sync", "replace", "write", "values",
];
const READ_PREFIXES: &[&str] = &[
    "find", "get", "select", "fetch", "first", "last", "all", "filter", "where", "query", "count",
    "exists", "any", "load", "read", "list", "search", "aggregate", "pluck", "include", "single",
    "tolist", "to_list", "orderby", "order_by", "groupby", "group_by", "exclude", "paginate", "take",
    "distinct", "sum", "avg", "join", "with", "scalar", "one",
];

/// Operation implied by a method name.
pub fn operation_for_callee(callee: &str) -> DataOperation {
    let name = callee.trim_start_matches('$').to_ascii_lowercase();
    if DELETE_PREFIXES.iter().any(|p| name.starts_with(p)) {
        DataOperation::Delete
    } else if WRITE_PREFIXES.iter().any(|p| name.starts_with(p)) || name == "set" {
        DataOperation::Write
    } else if READ_PREFIXES.iter().any(|p| name.starts_with(p)) {
        DataOperation::Read
    } else {
        DataOperation::Unknown
    }
}

/// Last plain segment of a receiver: `this.userRepository` -> `userRepository`.
pub fn receiver_tail(receiver: &str) -> &str {
    let receiver = receiver.trim_end_matches(|c: char| c == '!' || c == '?');
    let tail = receiver.rsplit(['.', ':', '>']).next().unwrap_or(receiver);
    tail.trim_start_matches(['$', '_'])
}

/// Receiver segments without call arguments, outermost first.
fn segments(receiver: &str) -> Vec<&str> {
    receiver
        .split(['.', ':'])
        .map(|s| s.split('(').next().unwrap_or(s).trim())
        .filter(|s| !s.is_empty())
        .collect()
}

/// First bare identifier argument: `query(User, id)` -> `User`.
fn first_identifier_arg(call: &CallSite) -> Option<String> {
    static IDENT: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^\(?\s*([A-Za-z_][A-Za-z0-9_]*)(?:\.class)?\s*[,)]?").expect("identifier regex")
    });
    let caps = IDENT.captures(&call.args_text)?;
    let ident = caps.get(1)?.as_str();
    (!matches!(ident, "this" | "self" | "new" | "await" | "true" | "false" | "null" | "None")).then(|| ident.to_string())
}

const EXECUTE_CALLEES: &[&str] = &[
    "execute",
    "executemany",
    "executescript",
    "exec",
    "raw",
    "query",
    "prepare",
    "ExecuteSqlRaw",
    "ExecuteSqlRawAsync",
    "ExecuteSqlInterpolated",
    "FromSqlRaw",
    "FromSqlInterpolated",
    "SqlQuery",
    "$queryRaw",
    "$executeRaw",
    "$queryRawUnsafe",
    "$executeRawUnsafe",
    "createNativeQuery",
    "createQuery",
    "statement",
    "unprepared",
];

const CONNECTION_NAMES: &[&str] = &[
    "cursor", "cur", "conn", "connection", "db", "database", "pool", "client", "pg", "mysql", "session",
    "em", "entitymanager", "pdo", "sql", "knex", "prisma", "context", "dbcontext", "jdbctemplate", "stmt",
    "statement", "engine", "tx", "trx", "transaction", "sequelize",
];

/// Calls carrying SQL text, and execute-style calls on connections.
fn raw_sql(call: &CallSite, language: Language) -> Option<CallAccess> {
    let framework = raw_sql_framework(call, language);
    if let Some(statement) = call.string_args.iter().find_map(|s| parse_sql(s).map(|st| (s, st))) {
        let (text, statement) = statement;
        return Some(CallAccess {
            operation: statement.operation,
            framework,
            is_raw_sql: true,
            sql: Some(text.clone()),
            fields: statement.fields,
            ..Default::default()
        });
    }

    let execute_like = EXECUTE_CALLEES.iter().any(|c| c.eq_ignore_ascii_case(&call.callee));
    let on_connection = call.receiver.as_deref().is_some_and(|r| {
        let tail = receiver_tail(r).to_ascii_lowercase();
        CONNECTION_NAMES
            .iter()
            .any(|n| tail == *n || (n.len() >= 4 && tail.ends_with(n)))
    });
    (execute_like && on_connection && call.arg_count > 0 && call.string_args.is_empty()).then(|| CallAccess {
        framework,
        is_raw_sql: true,
        ..Default::default()
    })
}

fn raw_sql_framework(call: &CallSite, language: Language) -> Option<OrmFramework> {
    let callee = call.callee.as_str();
    let receiver = call.receiver.as_deref().unwrap_or("");
    Some(match language {
        Language::CSharp if callee.contains("Sql") => OrmFramework::EfCore,
        Language::CSharp if callee.starts_with("Query") || callee.starts_with("Execute") => OrmFramework::Dapper,
        Language::TypeScript | Language::JavaScript if callee.starts_with('$') => OrmFramework::Prisma,
        Language::Java if callee == "createQuery" || callee == "createNativeQuery" => OrmFramework::Jpa,
        Language::Php if receiver == "DB" => OrmFramework::Eloquent,
        Language::Python if callee == "raw" && receiver.ends_with(".objects") => OrmFramework::Django,
        _ => OrmFramework::RawSql,
    })
}

/// `prisma.user.findMany()`, `this.prisma.order.create()`
fn prisma(call: &CallSite, _: Language) -> Option<CallAccess> {
    let receiver = call.receiver.as_deref()?;
    let parts = segments(receiver);
    let at = parts.iter().position(|s| *s == "prisma")?;
    let model = parts.get(at + 1)?;
    if model.starts_with('$') || parts.len() != at + 2 {
        return None;
    }
    Some(CallAccess {
        operation: operation_for_callee(&call.callee),
        framework: Some(OrmFramework::Prisma),
        model: Some(model.to_string()),
        ..Default::default()
    })
}

static TABLE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[.:>\s(])(?:from|table|into|collection|knex|db|trx)\(\s*['"`]([\w.]+)['"`]"#)
        .expect("table call regex")
});

/// `knex('orders').where(...)`, `supabase.from('profiles').select()`,
/// `DB::table('users')->get()`, and the table calls themselves.
fn table_chain(call: &CallSite, _: Language) -> Option<CallAccess> {
    const TABLE_CALLEES: &[&str] = &["from", "table", "into", "collection", "knex"];
    let receiver = call.receiver.as_deref().unwrap_or("");

    let (table, operation) = if TABLE_CALLEES.contains(&call.callee.as_str()) && !call.string_args.is_empty() {
        (call.string_args[0].clone(), DataOperation::Unknown)
    } else {
        let caps = TABLE_CALL.captures(receiver)?;
        (caps.get(1)?.as_str().to_string(), operation_for_callee(&call.callee))
    };
    if table.is_empty() || !table.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return None;
    }

    let root = segments(receiver).first().copied().unwrap_or(call.callee.as_str()).to_ascii_lowercase();
    let framework = match root.as_str() {
        r if r.contains("supabase") => Some(OrmFramework::Supabase),
        "knex" | "trx" => Some(OrmFramework::Knex),
        "db" if receiver.starts_with("DB") => Some(OrmFramework::Eloquent),
        _ => None,
    };
    Some(CallAccess {
        operation,
        framework,
        explicit_table: Some(table.rsplit('.').next().unwrap_or(&table).to_string()),
        ..Default::default()
    })
}

/// `User.objects.filter(...)`, `Order.objects.filter(...).delete()`
fn django(call: &CallSite, language: Language) -> Option<CallAccess> {
    if language != Language::Python {
        return None;
    }
    let receiver = call.receiver.as_deref()?;
    let parts = segments(receiver);
    let at = parts.iter().position(|s| *s == "objects")?;
    let model = parts.get(at.checked_sub(1)?)?;
    // a chain's last call decides the operation
    Some(CallAccess {
        operation: operation_for_callee(&call.callee),
        framework: Some(OrmFramework::Django),
        model: Some(model.to_string()),
        ..Default::default()
    })
}

/// `session.query(User).filter(...)`, `db.session.add(order)`, `select(User)`
fn sqlalchemy(call: &CallSite, language: Language) -> Option<CallAccess> {
    static QUERY_MODEL: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"session\.query\(\s*([A-Za-z_]\w*)").expect("query model regex"));
    if language != Language::Python {
        return None;
    }
    let receiver = call.receiver.as_deref().unwrap_or("");

    if let Some(model) = QUERY_MODEL.captures(receiver).and_then(|c| c.get(1)) {
        return Some(CallAccess {
            operation: operation_for_callee(&call.callee),
            framework: Some(OrmFramework::SqlAlchemy),
            model: Some(model.as_str().to_string()),
            ..Default::default()
        });
    }
    let on_session = receiver_tail(receiver) == "session";
    match call.callee.as_str() {
        "query" | "get" if on_session => Some(CallAccess {
            operation: DataOperation::Read,
            framework: Some(OrmFramework::SqlAlchemy),
            model: first_identifier_arg(call),
            ..Default::default()
        }),
        "add" | "add_all" | "merge" | "delete" if on_session => Some(CallAccess {
            operation: operation_for_callee(&call.callee),
            framework: Some(OrmFramework::SqlAlchemy),
            identifier: first_identifier_arg(call),
            ..Default::default()
        }),
        "select" | "insert" | "update" | "delete" if call.receiver.is_none() => {
            let model = first_identifier_arg(call).filter(|m| m.starts_with(char::is_uppercase))?;
            Some(CallAccess {
                operation: operation_for_callee(&call.callee),
                framework: Some(OrmFramework::SqlAlchemy),
                model: Some(model),
                ..Default::default()
            })
        }
        _ => None,
    }
}

/// `dbContext.Orders.Where(...)`, `_context.Users.Add(user)`
fn ef_core(call: &CallSite, language: Language) -> Option<CallAccess> {
    static DBSET_ACCESS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i:\b_?\w*(?:context|db))\.([A-Z]\w*)\b").expect("dbset access regex")
    });
    if language != Language::CSharp {
        return None;
    }
    let receiver = call.receiver.as_deref()?;
    let set = DBSET_ACCESS.captures(receiver).and_then(|c| c.get(1))?;
    if matches!(set.as_str(), "Database" | "ChangeTracker" | "Set" | "Model") {
        return None;
    }
    Some(CallAccess {
        operation: operation_for_callee(&call.callee),
        framework: Some(OrmFramework::EfCore),
        model: Some(set.as_str().to_string()),
        ..Default::default()
    })
}

/// `getRepository(User).find()`, `dataSource.getRepository(Order)`
fn typeorm_repository(call: &CallSite, language: Language) -> Option<CallAccess> {
    static GET_REPOSITORY: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"getRepository\(\s*([A-Za-z_]\w*)").expect("getRepository regex"));
    if !matches!(language, Language::TypeScript | Language::JavaScript) {
        return None;
    }
    if call.callee == "getRepository" {
        return Some(CallAccess {
            framework: Some(OrmFramework::TypeOrm),
            model: first_identifier_arg(call),
            ..Default::default()
        });
    }
    let receiver = call.receiver.as_deref()?;
    let model = GET_REPOSITORY.captures(receiver).and_then(|c| c.get(1))?;
    Some(CallAccess {
        operation: operation_for_callee(&call.callee),
        framework: Some(OrmFramework::TypeOrm),
        model: Some(model.as_str().to_string()),
        ..Default::default()
    })
}

/// JPA `em.persist(order)`, `entityManager.find(Order.class, id)`
fn entity_manager(call: &CallSite, language: Language) -> Option<CallAccess> {
    if language != Language::Java {
        return None;
    }
    let tail = receiver_tail(call.receiver.as_deref()?).to_ascii_lowercase();
    if tail != "em" && !tail.ends_with("entitymanager") {
        return None;
    }
    let operation = match call.callee.as_str() {
        "persist" | "merge" => DataOperation::Write,
        "remove" => DataOperation::Delete,
        "find" | "getReference" => DataOperation::Read,
        _ => return None,
    };
    let arg = first_identifier_arg(call);
    let is_class_literal = call.args_text.contains(".class");
    Some(CallAccess {
        operation,
        framework: Some(OrmFramework::Jpa),
        model: arg.clone().filter(|_| is_class_literal),
        identifier: arg.filter(|_| !is_class_literal),
        ..Default::default()
    })
}

const REPOSITORY_SUFFIXES: &[&str] = &["Repository", "Repo", "Dao", "DAO", "Store", "Table", "Collection"];

/// `userRepository.findById(id)`, `this.orderRepo.save(order)`
fn repository(call: &CallSite, language: Language) -> Option<CallAccess> {
    let tail = receiver_tail(call.receiver.as_deref()?);
    let stem = REPOSITORY_SUFFIXES.iter().find_map(|suffix| {
        tail.strip_suffix(suffix)
            .or_else(|| tail.strip_suffix(&suffix.to_ascii_lowercase()))
    })?;
    let operation = operation_for_callee(&call.callee);
    if stem.is_empty() || operation == DataOperation::Unknown {
        return None;
    }
    let framework = match language {
        Language::Java => Some(OrmFramework::SpringData),
        Language::TypeScript | Language::JavaScript if tail.ends_with("Repository") => Some(OrmFramework::TypeOrm),
        _ => None,
    };
    Some(CallAccess {
        operation,
        framework,
        identifier: Some(stem.to_string()),
        ..Default::default()
    })
}

const SEQUELIZE_METHODS: &[&str] = &[
    "findAll", "findByPk", "findAndCountAll", "findOrCreate", "bulkCreate", "destroy", "upsert",
];
const MONGOOSE_METHODS: &[&str] = &[
    "find", "findById", "findByIdAndUpdate", "findByIdAndDelete", "findOneAndUpdate", "findOneAndDelete",
    "deleteOne", "deleteMany", "insertMany", "updateOne", "updateMany", "countDocuments", "aggregate",
];
const SHARED_MODEL_METHODS: &[&str] = &["findOne", "create", "update", "count"];
const ELOQUENT_METHODS: &[&str] = &[
    "where", "find", "findOrFail", "all", "create", "first", "firstOrCreate", "updateOrCreate", "destroy",
    "query", "with", "pluck", "insert", "update", "delete", "paginate", "whereIn", "orderBy", "get",
];

/// Static calls on a model class: Sequelize, Mongoose, Eloquent.
fn static_model(call: &CallSite, language: Language) -> Option<CallAccess> {
    let receiver = call.receiver.as_deref()?;
    let is_class_name = receiver.starts_with(char::is_uppercase)
        && receiver.chars().all(|c| c.is_alphanumeric() || c == '_')
        && receiver != "DB";
    if !is_class_name {
        return None;
    }
    let callee = call.callee.as_str();
    let framework = match language {
        Language::Php if ELOQUENT_METHODS.contains(&callee) => Some(OrmFramework::Eloquent),
        Language::TypeScript | Language::JavaScript if SEQUELIZE_METHODS.contains(&callee) => {
            Some(OrmFramework::Sequelize)
        }
        Language::TypeScript | Language::JavaScript if MONGOOSE_METHODS.contains(&callee) => {
            Some(OrmFramework::Mongoose)
        }
        Language::TypeScript | Language::JavaScript if SHARED_MODEL_METHODS.contains(&callee) => None,
        _ => return None,
    };
    Some(CallAccess {
        operation: operation_for_callee(callee),
        framework,
        model: Some(receiver.to_string()),
        ..Default::default()
    })
}

/// `db.select().from(users)`, `db.insert(orders).values(...)`
fn drizzle(call: &CallSite, language: Language) -> Option<CallAccess> {
    if !matches!(language, Language::TypeScript | Language::JavaScript) {
        return None;
    }
    let receiver = call.receiver.as_deref()?;
    let root = segments(receiver).first().copied()?;
    if !matches!(root, "db" | "tx") {
        return None;
    }
    let operation = match call.callee.as_str() {
        "from" => DataOperation::Read,
        "insert" | "update" => DataOperation::Write,
        "delete" => DataOperation::Delete,
        _ => return None,
    };
    Some(CallAccess {
        operation,
        framework: Some(OrmFramework::Drizzle),
        model: Some(first_identifier_arg(call)?),
        ..Default::default()
    })
}

static EQUALITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\b\w+\.)?\b([A-Za-z_]\w*)\s*(?:===?|!=|==)\s*[^=]").expect("equality regex")
});
static KWARG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[(,]\s*)([A-Za-z_]\w*)\s*=\s*[^=]").expect("kwarg regex"));
static OBJECT_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:[{,\[]\s*)['"]?([A-Za-z_]\w*)['"]?\s*(?::[^:]|=>)"#).expect("object key regex")
});

/// Keys that shape a query rather than name a column.
const QUERY_KEYWORDS: &[&str] = &[
    "where", "data", "select", "include", "orderBy", "order", "take", "skip", "limit", "offset",
    "attributes", "fields", "set", "values", "returning", "relations", "cursor", "distinct",
    "groupBy", "having", "raw", "transaction", "lock", "new", "upsert", "create", "update", "connect",
    "equals", "in", "not", "gt", "gte", "lt", "lte", "contains", "startsWith", "endsWith", "mode",
    "true", "false", "null", "this", "self", "AND", "OR", "NOT", "some", "every", "none",
];

/// Column names in a call's arguments: equality comparisons, keyword
/// arguments, object keys and the first string argument of column-taking
/// builder methods.
pub fn argument_fields(call: &CallSite, language: Language) -> Vec<String> {
    const COLUMN_CALLEES: &[&str] = &[
        "where", "orWhere", "whereIn", "whereNotIn", "andWhere", "select", "pluck", "orderBy", "groupBy",
        "eq", "neq", "gt", "lt", "like", "ilike", "in", "is", "order", "increment", "decrement",
    ];
    let args = call.args_text.as_str();
    let mut fields: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        let name = name.split("__").next().unwrap_or(name);
        if !name.is_empty() && !QUERY_KEYWORDS.contains(&name) && !fields.iter().any(|f| f == name) {
            fields.push(name.to_string());
        }
    };

    if COLUMN_CALLEES.contains(&call.callee.as_str()) {
        if let Some(first) = call.string_args.first() {
            if first.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
                push(first.rsplit('.').next().unwrap_or(first));
            }
        }
    }
    for caps in EQUALITY.captures_iter(args) {
        if let Some(m) = caps.get(1) {
            push(m.as_str());
        }
    }
    if language == Language::Python {
        for caps in KWARG.captures_iter(args) {
            if let Some(m) = caps.get(1) {
                push(m.as_str());
            }
        }
    }
    for caps in OBJECT_KEY.captures_iter(args) {
        if let Some(m) = caps.get(1) {
            push(m.as_str());
        }
    }
    fields
}
