//! Parsers module - Native tree-sitter parsing for the structural tier
//!
//! Grammars are linked at compile time. Each adapter walks the tree
//! node by node and dispatches on node kind.
//!
//! Supported languages:
//! - TypeScript/JavaScript
//! - Python
//! - Java
//! - C#
//! - PHP

mod csharp;
mod java;
mod manager;
mod php;
mod python;
mod types;
mod typescript;
mod walk;

pub use csharp::CSharpParser;
pub use java::JavaParser;
pub use manager::ParserManager;
pub use php::PhpParser;
pub use python::PythonParser;
pub use types::*;
pub use typescript::TypeScriptParser;
pub use walk::unquote;
