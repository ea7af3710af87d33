//! Parsing and resolution front end: turns a directory of Go files into
//! syntax trees, byte snapshots and per-file resolved-symbol indexes.

pub mod infer;
pub mod languages;
pub mod parser;
pub mod project;
pub mod render;
pub mod resolver;

pub use parser::{ModuleParser, ParsedModule};
pub use project::{LoadOptions, Package, Project, ProjectBuilder, SourceFile};
pub use resolver::{ProjectIndex, ResolvedIndex, Symbol, SymbolResolver, resolve_symbols};
