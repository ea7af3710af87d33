//! Symbol resolution for Go files.
//!
//! Builds a read-only [`ResolvedIndex`] per file: which identifier
//! occurrences denote import aliases (and of which path), which are local
//! bindings, and which refer to package-level declarations. The walk is
//! scope-aware, so a parameter or `:=` variable that shadows an import name
//! is never mistaken for the import.

use super::infer;
use super::languages::LanguageConfig;
use super::project::{Project, SourceFile};
use super::render::{identifier_names, node_text};
use crate::error::Result;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;
use tree_sitter::{Node, Query, QueryCursor, StreamingIterator};

/// Identity of a syntax node within one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub start: usize,
    pub end: usize,
}

impl NodeKey {
    pub fn of(node: Node) -> Self {
        Self {
            start: node.start_byte(),
            end: node.end_byte(),
        }
    }
}

/// What an identifier occurrence denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    /// A file-scope import name standing for the package at `path`.
    ImportAlias { path: String },
    /// A parameter, receiver, result or block-scoped binding.
    Local,
    /// A top-level declaration of the same package.
    PackageLevel,
}

/// One import spec of a file that binds a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    pub name: String,
    pub path: String,
    /// Whether the name was spelled in the import spec.
    pub explicit: bool,
}

#[derive(Debug, Default)]
pub struct ResolvedIndex {
    uses: HashMap<NodeKey, Symbol>,
    types: HashMap<NodeKey, String>,
    imports: Vec<ImportBinding>,
}

impl ResolvedIndex {
    pub fn symbol(&self, node: Node) -> Option<&Symbol> {
        self.uses.get(&NodeKey::of(node))
    }

    /// Import path of the package `node` names, if it is an import alias.
    pub fn import_path(&self, node: Node) -> Option<&str> {
        match self.symbol(node)? {
            Symbol::ImportAlias { path } => Some(path),
            _ => None,
        }
    }

    /// Resolved type of an expression, if the front end determined one.
    pub fn type_of(&self, node: Node) -> Option<&str> {
        self.types.get(&NodeKey::of(node)).map(String::as_str)
    }

    pub fn imports(&self) -> &[ImportBinding] {
        &self.imports
    }

    pub fn record_type(&mut self, key: NodeKey, ty: impl Into<String>) {
        self.types.insert(key, ty.into());
    }
}

/// Resolved indexes for every file of a project, keyed by file path.
#[derive(Debug, Default)]
pub struct ProjectIndex {
    files: HashMap<PathBuf, ResolvedIndex>,
}

impl ProjectIndex {
    pub fn for_file(&self, path: &Path) -> Option<&ResolvedIndex> {
        self.files.get(path)
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, index: ResolvedIndex) {
        self.files.insert(path.into(), index);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Resolves every file of `project`.
pub fn resolve_symbols(project: &Project) -> Result<ProjectIndex> {
    Ok(SymbolResolver::new()?.resolve_project(project))
}

pub struct SymbolResolver {
    import_query: Query,
}

impl SymbolResolver {
    pub fn new() -> Result<Self> {
        let config = LanguageConfig::go();
        let import_query = Query::new(&config.language, config.import_query)?;
        Ok(Self { import_query })
    }

    pub fn resolve_project(&self, project: &Project) -> ProjectIndex {
        let mut index = ProjectIndex::default();
        for package in &project.packages {
            let mut package_scope = HashSet::new();
            for file in &package.files {
                package_scope.extend(top_level_names(file.root(), file.source()));
            }
            for file in &package.files {
                let resolved = self.resolve_file(file, &package_scope, project);
                debug!(
                    "Resolved {} ({} imports)",
                    file.display_path,
                    resolved.imports.len()
                );
                index.insert(file.path.clone(), resolved);
            }
        }
        index
    }

    pub fn resolve_file(
        &self,
        file: &SourceFile,
        package_scope: &HashSet<String>,
        project: &Project,
    ) -> ResolvedIndex {
        self.resolve_tree(file.root(), file.source(), package_scope, |path| {
            project.package_name_for(path).map(str::to_string)
        })
    }

    /// Resolves one syntax tree. `package_name` answers the declared package
    /// name of an import path when it is known.
    pub fn resolve_tree<F>(
        &self,
        root: Node,
        source: &[u8],
        package_scope: &HashSet<String>,
        package_name: F,
    ) -> ResolvedIndex
    where
        F: Fn(&str) -> Option<String>,
    {
        let imports = self.imports(root, source, package_name);
        let bindings: HashMap<String, String> = imports
            .iter()
            .map(|binding| (binding.name.clone(), binding.path.clone()))
            .collect();

        let mut walker = ScopeWalker {
            source,
            imports: &bindings,
            package_scope,
            scopes: Vec::new(),
            uses: HashMap::new(),
        };
        walker.walk_children(root);

        let mut index = ResolvedIndex {
            uses: walker.uses,
            types: HashMap::new(),
            imports,
        };
        for (key, ty) in infer::initializer_types(root, source, &index) {
            index.record_type(key, ty);
        }
        index
    }

    fn imports<F>(&self, root: Node, source: &[u8], package_name: F) -> Vec<ImportBinding>
    where
        F: Fn(&str) -> Option<String>,
    {
        let capture_names = self.import_query.capture_names();
        let mut cursor = QueryCursor::new();
        let mut bindings = Vec::new();

        let mut matches = cursor.matches(&self.import_query, root, source);
        while let Some(m) = matches.next() {
            let mut name_node = None;
            let mut path = None;
            for cap in m.captures {
                match capture_names[cap.index as usize] {
                    "import" => name_node = cap.node.child_by_field_name("name"),
                    "path" => {
                        path = node_text(cap.node, source)
                            .map(|p| p.trim_matches(|c| c == '"' || c == '`').to_string())
                    }
                    _ => {}
                }
            }
            let Some(path) = path.filter(|p| !p.is_empty()) else {
                continue;
            };

            let binding = match name_node {
                Some(node) => match node.kind() {
                    "dot" | "blank_identifier" => continue,
                    _ => match node_text(node, source) {
                        Some(name) => ImportBinding {
                            name: name.to_string(),
                            path,
                            explicit: true,
                        },
                        None => continue,
                    },
                },
                None => ImportBinding {
                    name: package_name(&path).unwrap_or_else(|| assumed_package_name(&path)),
                    path,
                    explicit: false,
                },
            };
            bindings.push(binding);
        }
        bindings
    }
}

/// The package name an import path is conventionally expected to declare:
/// its last element, skipping a trailing major-version element, without a
/// `go-` prefix, cut at the first character that cannot appear in an
/// identifier.
pub fn assumed_package_name(import_path: &str) -> String {
    let mut segments = import_path.rsplit('/');
    let mut base = segments.next().unwrap_or(import_path);
    if is_major_version(base) {
        if let Some(parent) = segments.next() {
            base = parent;
        }
    }
    let base = base.strip_prefix("go-").unwrap_or(base);
    let end = base
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(base.len());
    base[..end].to_string()
}

fn is_major_version(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Names declared at the top level of a file (methods excluded).
pub fn top_level_names(root: Node, source: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = root.walk();
    for decl in root.named_children(&mut cursor) {
        match decl.kind() {
            "function_declaration" => names.extend(identifier_names(decl, "name", source)),
            "type_declaration" | "var_declaration" | "const_declaration" => {
                for spec in declaration_specs(decl) {
                    names.extend(identifier_names(spec, "name", source));
                }
            }
            _ => {}
        }
    }
    names
}

/// The individual specs of a `type`/`var`/`const` declaration, in source
/// order, whether or not the declaration is parenthesized.
pub fn declaration_specs(decl: Node) -> Vec<Node> {
    let mut specs = Vec::new();
    let mut cursor = decl.walk();
    for child in decl.named_children(&mut cursor) {
        match child.kind() {
            "type_spec" | "type_alias" | "var_spec" | "const_spec" => specs.push(child),
            "var_spec_list" | "const_spec_list" => {
                let mut inner = child.walk();
                specs.extend(
                    child
                        .named_children(&mut inner)
                        .filter(|n| matches!(n.kind(), "var_spec" | "const_spec")),
                );
            }
            _ => {}
        }
    }
    specs
}

/// One unit of pending work for [`ScopeWalker`]. Steps are kept on an
/// explicit stack so that deeply nested expressions cannot exhaust the
/// thread stack.
enum Step<'t> {
    Visit(Node<'t>),
    Enter,
    Exit,
    Declare(Vec<String>),
}

struct ScopeWalker<'a> {
    source: &'a [u8],
    imports: &'a HashMap<String, String>,
    package_scope: &'a HashSet<String>,
    scopes: Vec<HashSet<String>>,
    uses: HashMap<NodeKey, Symbol>,
}

impl ScopeWalker<'_> {
    fn walk_children(&mut self, node: Node) {
        let mut stack = Vec::new();
        schedule(&mut stack, children(node));
        while let Some(step) = stack.pop() {
            match step {
                Step::Visit(node) => {
                    let plan = self.visit(node);
                    schedule(&mut stack, plan);
                }
                Step::Enter => self.scopes.push(HashSet::new()),
                Step::Exit => {
                    self.scopes.pop();
                }
                Step::Declare(names) => {
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.extend(names);
                    }
                }
            }
        }
    }

    /// Resolves `node` if it is a name, and returns the steps its children
    /// need, in source order.
    fn visit<'t>(&mut self, node: Node<'t>) -> Vec<Step<'t>> {
        match node.kind() {
            "package_clause" | "import_declaration" | "comment" => Vec::new(),
            "identifier" | "package_identifier" => {
                self.resolve(node);
                Vec::new()
            }
            "function_declaration" | "method_declaration" | "func_literal" => {
                self.function_steps(node)
            }
            "block" | "if_statement" | "for_statement" | "expression_switch_statement"
            | "select_statement" | "expression_case" | "default_case" | "communication_case" => {
                let mut plan = vec![Step::Enter];
                plan.extend(children(node));
                plan.push(Step::Exit);
                plan
            }
            "type_switch_statement" => self.type_switch_steps(node),
            "short_var_declaration" => self.binding_steps(node, true),
            "range_clause" | "receive_statement" => {
                let defines = has_token(node, ":=");
                self.binding_steps(node, defines)
            }
            "var_spec" | "const_spec" => self.value_spec_steps(node),
            "type_spec" | "type_alias" => self.type_spec_steps(node),
            _ => children(node),
        }
    }

    fn resolve(&mut self, node: Node) {
        let Some(name) = node_text(node, self.source) else {
            return;
        };
        let symbol = if self.scopes.iter().rev().any(|scope| scope.contains(name)) {
            Symbol::Local
        } else if self.package_scope.contains(name) {
            Symbol::PackageLevel
        } else if let Some(path) = self.imports.get(name) {
            Symbol::ImportAlias { path: path.clone() }
        } else {
            return;
        };
        self.uses.insert(NodeKey::of(node), symbol);
    }

    /// Parameter types are resolved in the enclosing scope; the names only
    /// become visible inside the body.
    fn function_steps<'t>(&self, node: Node<'t>) -> Vec<Step<'t>> {
        let mut plan = vec![Step::Enter];
        let mut names = Vec::new();
        for field in ["type_parameters", "receiver", "parameters", "result"] {
            if let Some(part) = node.child_by_field_name(field) {
                self.signature_steps(part, &mut plan, &mut names);
            }
        }
        plan.push(Step::Declare(names));
        if let Some(body) = node.child_by_field_name("body") {
            plan.push(Step::Visit(body));
        }
        plan.push(Step::Exit);
        plan
    }

    fn signature_steps<'t>(
        &self,
        part: Node<'t>,
        plan: &mut Vec<Step<'t>>,
        names: &mut Vec<String>,
    ) {
        if !matches!(part.kind(), "parameter_list" | "type_parameter_list") {
            plan.push(Step::Visit(part));
            return;
        }
        let mut cursor = part.walk();
        for param in part.named_children(&mut cursor) {
            match param.kind() {
                "parameter_declaration"
                | "variadic_parameter_declaration"
                | "type_parameter_declaration" => {
                    names.extend(identifier_names(param, "name", self.source));
                    if let Some(ty) = param.child_by_field_name("type") {
                        plan.push(Step::Visit(ty));
                    }
                }
                _ => plan.push(Step::Visit(param)),
            }
        }
    }

    fn binding_steps<'t>(&self, node: Node<'t>, defines: bool) -> Vec<Step<'t>> {
        let mut plan = Vec::new();
        if let Some(right) = node.child_by_field_name("right") {
            plan.push(Step::Visit(right));
        }
        if let Some(left) = node.child_by_field_name("left") {
            if defines {
                plan.push(Step::Declare(bound_identifiers(left, self.source)));
            } else {
                plan.push(Step::Visit(left));
            }
        }
        plan
    }

    fn value_spec_steps<'t>(&self, node: Node<'t>) -> Vec<Step<'t>> {
        let mut plan = Vec::new();
        if let Some(ty) = node.child_by_field_name("type") {
            plan.push(Step::Visit(ty));
        }
        let mut cursor = node.walk();
        plan.extend(node.children_by_field_name("value", &mut cursor).map(Step::Visit));
        plan.push(Step::Declare(identifier_names(node, "name", self.source)));
        plan
    }

    fn type_spec_steps<'t>(&self, node: Node<'t>) -> Vec<Step<'t>> {
        let mut plan = vec![
            Step::Declare(identifier_names(node, "name", self.source)),
            Step::Enter,
        ];
        let mut names = Vec::new();
        if let Some(params) = node.child_by_field_name("type_parameters") {
            self.signature_steps(params, &mut plan, &mut names);
        }
        plan.push(Step::Declare(names));
        if let Some(ty) = node.child_by_field_name("type") {
            plan.push(Step::Visit(ty));
        }
        plan.push(Step::Exit);
        plan
    }

    fn type_switch_steps<'t>(&self, node: Node<'t>) -> Vec<Step<'t>> {
        let mut plan = vec![Step::Enter];
        if let Some(init) = node.child_by_field_name("initializer") {
            plan.push(Step::Visit(init));
        }
        if let Some(value) = node.child_by_field_name("value") {
            plan.push(Step::Visit(value));
        }
        let aliases = node
            .child_by_field_name("alias")
            .map(|alias| bound_identifiers(alias, self.source))
            .unwrap_or_default();

        let mut cursor = node.walk();
        for clause in node.named_children(&mut cursor) {
            if matches!(clause.kind(), "type_case" | "default_case") {
                plan.push(Step::Enter);
                plan.push(Step::Declare(aliases.clone()));
                plan.extend(children(clause));
                plan.push(Step::Exit);
            }
        }
        plan.push(Step::Exit);
        plan
    }
}

/// Visit steps for the named children of `node`, in source order.
fn children<'t>(node: Node<'t>) -> Vec<Step<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).map(Step::Visit).collect()
}

/// Pushes `plan` so that its first step is popped first.
fn schedule<'t>(stack: &mut Vec<Step<'t>>, plan: Vec<Step<'t>>) {
    stack.extend(plan.into_iter().rev());
}

/// Identifiers on the left of `:=` (or a range/receive clause), skipping `_`.
fn bound_identifiers(list: Node, source: &[u8]) -> Vec<String> {
    let mut cursor = list.walk();
    let nodes: Vec<Node> = if list.kind() == "identifier" {
        vec![list]
    } else {
        list.named_children(&mut cursor).collect()
    };
    nodes
        .into_iter()
        .filter(|n| n.kind() == "identifier")
        .filter_map(|n| node_text(n, source))
        .filter(|name| *name != "_")
        .map(str::to_string)
        .collect()
}

fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::ModuleParser;
    use tree_sitter::Tree;

    fn parse(source: &str) -> Tree {
        let mut parser = ModuleParser::new().unwrap();
        parser
            .parse_module(Path::new("resolve.go"), source.as_bytes())
            .unwrap()
            .tree
    }

    fn resolve(source: &str, tree: &Tree) -> ResolvedIndex {
        let scope: HashSet<String> = top_level_names(tree.root_node(), source.as_bytes())
            .into_iter()
            .collect();
        SymbolResolver::new()
            .unwrap()
            .resolve_tree(tree.root_node(), source.as_bytes(), &scope, |_| None)
    }

    /// Symbols of every selector operand spelled `name`, in source order.
    fn operand_symbols(source: &str, name: &str) -> Vec<Option<Symbol>> {
        let tree = parse(source);
        let index = resolve(source, &tree);
        let mut out = Vec::new();
        collect_operands(tree.root_node(), source.as_bytes(), name, &index, &mut out);
        out
    }

    fn collect_operands(
        node: Node,
        source: &[u8],
        name: &str,
        index: &ResolvedIndex,
        out: &mut Vec<Option<Symbol>>,
    ) {
        if node.kind() == "selector_expression" {
            if let Some(operand) = node.child_by_field_name("operand") {
                if node_text(operand, source) == Some(name) {
                    out.push(index.symbol(operand).cloned());
                }
            }
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        for child in children {
            collect_operands(child, source, name, index, out);
        }
    }

    fn alias(path: &str) -> Option<Symbol> {
        Some(Symbol::ImportAlias {
            path: path.to_string(),
        })
    }

    #[test]
    fn test_assumed_package_name() {
        assert_eq!(assumed_package_name("fmt"), "fmt");
        assert_eq!(assumed_package_name("net/http"), "http");
        assert_eq!(assumed_package_name("gopkg.in/yaml.v3"), "yaml");
        assert_eq!(assumed_package_name("github.com/mattn/go-isatty"), "isatty");
        assert_eq!(assumed_package_name("github.com/jackc/pgx/v5"), "pgx");
        assert_eq!(assumed_package_name("example.com/v"), "v");
    }

    #[test]
    fn test_import_bindings() {
        let source = r#"package main

import (
	"fmt"
	cfg "github.com/acme/app/config"
	_ "embed"
	. "strings"
	"gopkg.in/yaml.v3"
)
"#;
        let tree = parse(source);
        let index = resolve(source, &tree);
        let imports: Vec<(&str, &str, bool)> = index
            .imports()
            .iter()
            .map(|b| (b.name.as_str(), b.path.as_str(), b.explicit))
            .collect();
        assert_eq!(
            imports,
            vec![
                ("fmt", "fmt", false),
                ("cfg", "github.com/acme/app/config", true),
                ("yaml", "gopkg.in/yaml.v3", false),
            ]
        );
    }

    #[test]
    fn test_project_package_name_wins_over_guess() {
        let source = "package main\n\nimport \"example.com/app/go-util\"\n\nvar x = util.Run\n";
        let tree = parse(source);
        let index = SymbolResolver::new().unwrap().resolve_tree(
            tree.root_node(),
            source.as_bytes(),
            &HashSet::new(),
            |path| (path == "example.com/app/go-util").then(|| "helpers".to_string()),
        );
        assert_eq!(index.imports()[0].name, "helpers");
    }

    #[test]
    fn test_parameters_shadow_imports() {
        let source = r#"package main

import "github.com/acme/log"

func A() { log.Print("x") }

func B(log *Logger) { log.Print("y") }

func C(l log.Logger) {}
"#;
        assert_eq!(
            operand_symbols(source, "log"),
            vec![alias("github.com/acme/log"), Some(Symbol::Local)]
        );
    }

    #[test]
    fn test_short_var_shadowing_is_positional() {
        let source = r#"package main

import "github.com/acme/log"

func A() {
	log.Print("before")
	log := New()
	log.Print("after")
	{
		log.Print("nested")
	}
}

func B() {
	if log := pick(); log != nil {
		log.Print("if")
	}
	log.Print("outside")
}
"#;
        assert_eq!(
            operand_symbols(source, "log"),
            vec![
                alias("github.com/acme/log"),
                Some(Symbol::Local),
                Some(Symbol::Local),
                Some(Symbol::Local),
                alias("github.com/acme/log"),
            ]
        );
    }

    #[test]
    fn test_range_closure_and_type_switch_bindings() {
        let source = r#"package main

import "github.com/acme/sql"

func A(rows []Row) {
	for _, sql := range rows {
		sql.Scan()
	}
	f := func(sql Conn) { sql.Close() }
	switch sql := v.(type) {
	case Conn:
		sql.Close()
	}
	sql.Open()
	_ = f
}
"#;
        assert_eq!(
            operand_symbols(source, "sql"),
            vec![
                Some(Symbol::Local),
                Some(Symbol::Local),
                Some(Symbol::Local),
                alias("github.com/acme/sql"),
            ]
        );
    }

    #[test]
    fn test_package_level_names() {
        let source = r#"package main

var registry = map[string]int{}

func A() { registry.Len() }
"#;
        assert_eq!(
            operand_symbols(source, "registry"),
            vec![Some(Symbol::PackageLevel)]
        );
    }

    #[test]
    fn test_qualified_type_resolution() {
        let source = "package main\n\nimport h \"net/http\"\n\nvar c *h.Client\n";
        let tree = parse(source);
        let index = resolve(source, &tree);

        let mut qualifiers = Vec::new();
        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            let in_qualified_type = node.parent().map(|p| p.kind()) == Some("qualified_type");
            if node.kind() == "package_identifier" && in_qualified_type {
                qualifiers.push(node);
            }
            let mut cursor = node.walk();
            stack.extend(node.named_children(&mut cursor));
        }
        assert_eq!(qualifiers.len(), 1);
        assert_eq!(index.import_path(qualifiers[0]), Some("net/http"));
    }

    #[test]
    fn test_top_level_names_and_grouped_specs() {
        let source = r#"package main

type (
	A struct{}
	B = A
)

var x, y = 1, 2

const (
	C = iota
	D
)

func F() {}

func (A) M() {}
"#;
        let tree = parse(source);
        let mut names = top_level_names(tree.root_node(), source.as_bytes());
        names.sort();
        assert_eq!(names, vec!["A", "B", "C", "D", "F", "x", "y"]);
    }
}
