//! Syntactic type inference for the initializers of top-level `var` and
//! `const` specs.
//!
//! Follows Go's untyped-constant rules closely enough for metadata: a `const`
//! initializer keeps its untyped kind (`untyped int`), a `var` initializer
//! takes the kind's default type (`int`). Expressions whose type would need
//! full type checking are left unknown.

use super::render::{first_named_child, node_text, signature, type_string};
use super::resolver::{NodeKey, ResolvedIndex, Symbol, declaration_specs};
use std::collections::HashMap;
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UntypedKind {
    Bool,
    String,
    Nil,
    Int,
    Rune,
    Float,
    Complex,
}

impl UntypedKind {
    fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "string",
            Self::Nil => "nil",
            Self::Int => "int",
            Self::Rune => "rune",
            Self::Float => "float",
            Self::Complex => "complex",
        }
    }

    fn default_type(self) -> Option<&'static str> {
        match self {
            Self::Bool => Some("bool"),
            Self::String => Some("string"),
            Self::Nil => None,
            Self::Int => Some("int"),
            Self::Rune => Some("rune"),
            Self::Float => Some("float64"),
            Self::Complex => Some("complex128"),
        }
    }

    fn numeric_rank(self) -> Option<u8> {
        match self {
            Self::Int => Some(0),
            Self::Rune => Some(1),
            Self::Float => Some(2),
            Self::Complex => Some(3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inferred {
    Untyped(UntypedKind),
    Typed(String),
}

impl Inferred {
    /// Type as reported for a constant initializer.
    pub fn for_const(self) -> String {
        match self {
            Self::Untyped(kind) => format!("untyped {}", kind.name()),
            Self::Typed(ty) => ty,
        }
    }

    /// Type as reported for a variable initializer, after the default
    /// conversion of untyped values.
    pub fn for_var(self) -> Option<String> {
        match self {
            Self::Untyped(kind) => kind.default_type().map(str::to_string),
            Self::Typed(ty) => Some(ty),
        }
    }

    fn merge(self, other: Self) -> Option<Self> {
        match (self, other) {
            (Self::Untyped(a), Self::Untyped(b)) => match (a.numeric_rank(), b.numeric_rank()) {
                (Some(ra), Some(rb)) => Some(Self::Untyped(if ra >= rb { a } else { b })),
                _ if a == b => Some(Self::Untyped(a)),
                _ => None,
            },
            (Self::Typed(t), Self::Untyped(_)) | (Self::Untyped(_), Self::Typed(t)) => {
                Some(Self::Typed(t))
            }
            (Self::Typed(a), Self::Typed(b)) => (a == b).then_some(Self::Typed(a)),
        }
    }
}

/// Deepest non-chain nesting followed before giving up on an initializer.
const MAX_NESTING: usize = 256;

const BASIC_TYPES: &[&str] = &[
    "bool", "string", "int", "int8", "int16", "int32", "int64", "uint", "uint8", "uint16",
    "uint32", "uint64", "uintptr", "byte", "rune", "float32", "float64", "complex64",
    "complex128",
];

/// Types of the initializer expressions of top-level value specs, keyed by
/// the expression node.
pub fn initializer_types(
    root: Node,
    source: &[u8],
    index: &ResolvedIndex,
) -> Vec<(NodeKey, String)> {
    let inferer = Inferer {
        source,
        index,
        functions: single_result_functions(root, source, index),
    };

    let mut types = Vec::new();
    let mut cursor = root.walk();
    for decl in root.named_children(&mut cursor) {
        let is_const = match decl.kind() {
            "const_declaration" => true,
            "var_declaration" => false,
            _ => continue,
        };
        for spec in declaration_specs(decl) {
            for value in spec_values(spec) {
                let Some(inferred) = inferer.infer(value) else {
                    continue;
                };
                let ty = if is_const {
                    Some(inferred.for_const())
                } else {
                    inferred.for_var()
                };
                if let Some(ty) = ty {
                    types.push((NodeKey::of(value), ty));
                }
            }
        }
    }
    types
}

/// The initializer expressions of a value spec.
pub fn spec_values(spec: Node) -> Vec<Node> {
    let Some(list) = spec.child_by_field_name("value") else {
        return Vec::new();
    };
    if list.kind() != "expression_list" {
        return vec![list];
    }
    let mut cursor = list.walk();
    list.named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect()
}

/// Top-level functions of the file returning exactly one unnamed result.
fn single_result_functions(
    root: Node,
    source: &[u8],
    index: &ResolvedIndex,
) -> HashMap<String, String> {
    let mut functions = HashMap::new();
    let mut cursor = root.walk();
    for decl in root.named_children(&mut cursor) {
        if decl.kind() != "function_declaration"
            || decl.child_by_field_name("type_parameters").is_some()
        {
            continue;
        }
        let (Some(name), Some(result)) = (
            decl.child_by_field_name("name").and_then(|n| node_text(n, source)),
            decl.child_by_field_name("result"),
        ) else {
            continue;
        };
        if let Some(ty) = single_result_type(result, source, index) {
            functions.insert(name.to_string(), ty);
        }
    }
    functions
}

fn single_result_type(result: Node, source: &[u8], index: &ResolvedIndex) -> Option<String> {
    if result.kind() != "parameter_list" {
        return Some(type_string(result, source, index));
    }
    let mut cursor = result.walk();
    let params: Vec<Node> = result
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "parameter_declaration")
        .collect();
    match params.as_slice() {
        [only] if only.child_by_field_name("name").is_none() => only
            .child_by_field_name("type")
            .map(|ty| type_string(ty, source, index)),
        _ => None,
    }
}

struct Inferer<'a> {
    source: &'a [u8],
    index: &'a ResolvedIndex,
    functions: HashMap<String, String>,
}

impl Inferer<'_> {
    fn infer(&self, expr: Node) -> Option<Inferred> {
        self.infer_at(expr, 0)
    }

    fn infer_at(&self, expr: Node, depth: usize) -> Option<Inferred> {
        use Inferred::{Typed, Untyped};

        if depth > MAX_NESTING {
            return None;
        }
        match expr.kind() {
            "int_literal" | "iota" => Some(Untyped(UntypedKind::Int)),
            "float_literal" => Some(Untyped(UntypedKind::Float)),
            "imaginary_literal" => Some(Untyped(UntypedKind::Complex)),
            "rune_literal" => Some(Untyped(UntypedKind::Rune)),
            "interpreted_string_literal" | "raw_string_literal" => {
                Some(Untyped(UntypedKind::String))
            }
            "true" | "false" => Some(Untyped(UntypedKind::Bool)),
            "nil" => Some(Untyped(UntypedKind::Nil)),
            "parenthesized_expression" => self.infer_at(first_named_child(expr)?, depth + 1),
            "unary_expression" => self.infer_unary(expr, depth),
            "binary_expression" => self.infer_binary(expr, depth),
            "composite_literal" => expr
                .child_by_field_name("type")
                .map(|ty| Typed(self.render(ty))),
            "type_conversion_expression" => expr
                .child_by_field_name("type")
                .map(|ty| Typed(self.render(ty))),
            "call_expression" => self.infer_call(expr),
            "func_literal" => Some(Typed(format!(
                "func{}",
                signature(
                    expr.child_by_field_name("parameters"),
                    expr.child_by_field_name("result"),
                    self.source,
                    self.index,
                )
            ))),
            _ => None,
        }
    }

    fn infer_unary(&self, expr: Node, depth: usize) -> Option<Inferred> {
        let operator = expr
            .child_by_field_name("operator")
            .and_then(|op| node_text(op, self.source))?;
        let operand = expr.child_by_field_name("operand")?;
        match operator {
            "+" | "-" | "^" => self.infer_at(operand, depth + 1),
            "!" => match self.infer_at(operand, depth + 1)? {
                Inferred::Untyped(_) => Some(Inferred::Untyped(UntypedKind::Bool)),
                typed => Some(typed),
            },
            "&" => match self.infer_at(operand, depth + 1)? {
                Inferred::Typed(ty) if operand.kind() == "composite_literal" => {
                    Some(Inferred::Typed(format!("*{ty}")))
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Long operator chains nest to the left, so the left spine is walked
    /// in a loop and folded back up.
    fn infer_binary(&self, expr: Node, depth: usize) -> Option<Inferred> {
        let mut spine = Vec::new();
        let mut current = expr;
        let mut base = None;
        while current.kind() == "binary_expression" {
            let operator = current
                .child_by_field_name("operator")
                .and_then(|op| node_text(op, self.source))?;
            if matches!(operator, "==" | "!=" | "<" | "<=" | ">" | ">=") {
                base = Some(Inferred::Untyped(UntypedKind::Bool));
                break;
            }
            spine.push((operator, current.child_by_field_name("right")?));
            current = current.child_by_field_name("left")?;
        }

        let mut inferred = match base {
            Some(inferred) => inferred,
            None => self.infer_at(current, depth + 1)?,
        };
        for (operator, right) in spine.into_iter().rev() {
            if !matches!(operator, "<<" | ">>") {
                inferred = inferred.merge(self.infer_at(right, depth + 1)?)?;
            }
        }
        Some(inferred)
    }

    fn infer_call(&self, expr: Node) -> Option<Inferred> {
        let function = expr.child_by_field_name("function")?;
        let args = expr
            .child_by_field_name("arguments")
            .map(|list| {
                let mut cursor = list.walk();
                list.named_children(&mut cursor)
                    .filter(|n| n.kind() != "comment")
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if function.kind() == "parenthesized_expression" {
            // `(*T)(x)`: a conversion to a pointer type.
            return first_named_child(function).and_then(|inner| match inner.kind() {
                "unary_expression" | "pointer_type" => {
                    self.render_type_expr(inner).map(Inferred::Typed)
                }
                _ => None,
            });
        }
        if function.kind() != "identifier" {
            return None;
        }
        let name = node_text(function, self.source)?;

        match self.index.symbol(function) {
            Some(Symbol::PackageLevel) => {
                return self.functions.get(name).cloned().map(Inferred::Typed);
            }
            Some(_) => return None,
            None => {}
        }

        match name {
            "len" | "cap" | "copy" => Some(Inferred::Typed("int".to_string())),
            "make" => args
                .first()
                .and_then(|ty| self.render_type_expr(*ty))
                .map(Inferred::Typed),
            "new" => args
                .first()
                .and_then(|ty| self.render_type_expr(*ty))
                .map(|ty| Inferred::Typed(format!("*{ty}"))),
            basic if BASIC_TYPES.contains(&basic) => Some(Inferred::Typed(basic.to_string())),
            _ => None,
        }
    }

    fn render(&self, node: Node) -> String {
        type_string(node, self.source, self.index)
    }

    /// Renders a node used as a type in expression position, where a
    /// qualified name parses as a selector and a pointer as a unary `*`.
    fn render_type_expr(&self, node: Node) -> Option<String> {
        match node.kind() {
            "selector_expression" => {
                let operand = node.child_by_field_name("operand")?;
                let field = node_text(node.child_by_field_name("field")?, self.source)?;
                let qualifier = match self.index.import_path(operand) {
                    Some(path) => path,
                    None => node_text(operand, self.source)?,
                };
                Some(format!("{qualifier}.{field}"))
            }
            "unary_expression" => {
                let operator = node.child_by_field_name("operator")?;
                if node_text(operator, self.source)? != "*" {
                    return None;
                }
                let operand = node.child_by_field_name("operand")?;
                Some(format!("*{}", self.render_type_expr(operand)?))
            }
            _ => Some(self.render(node)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::parser::ModuleParser;
    use crate::frontend::resolver::{SymbolResolver, top_level_names};
    use std::collections::HashSet;
    use std::path::Path;

    /// Inferred type of the first initializer of every top-level value
    /// spec, in source order, keyed by the first declared name.
    fn inferred(source: &str) -> Vec<(String, Option<String>)> {
        let mut parser = ModuleParser::new().unwrap();
        let parsed = parser
            .parse_module(Path::new("infer.go"), source.as_bytes())
            .unwrap();
        let root = parsed.tree.root_node();
        let bytes = source.as_bytes();
        let scope: HashSet<String> = top_level_names(root, bytes).into_iter().collect();
        let index = SymbolResolver::new()
            .unwrap()
            .resolve_tree(root, bytes, &scope, |_| None);

        let mut out = Vec::new();
        let mut cursor = root.walk();
        for decl in root.named_children(&mut cursor) {
            if !matches!(decl.kind(), "var_declaration" | "const_declaration") {
                continue;
            }
            for spec in declaration_specs(decl) {
                let name = node_text(spec.child_by_field_name("name").unwrap(), bytes)
                    .unwrap()
                    .to_string();
                let ty = spec_values(spec)
                    .first()
                    .and_then(|v| index.type_of(*v))
                    .map(str::to_string);
                out.push((name, ty));
            }
        }
        out
    }

    fn lookup<'a>(types: &'a [(String, Option<String>)], name: &str) -> Option<&'a str> {
        types
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, ty)| ty.as_deref())
    }

    #[test]
    fn test_const_initializers_stay_untyped() {
        let types = inferred(
            r#"package p

const (
	A = 1
	B = 2.5
	C = 'x'
	D = "s"
	E = 1 << 3
	F = A * 1.5
	G = 1 < 2
	H = iota
	I = 2i
)
"#,
        );
        assert_eq!(lookup(&types, "A"), Some("untyped int"));
        assert_eq!(lookup(&types, "B"), Some("untyped float"));
        assert_eq!(lookup(&types, "C"), Some("untyped rune"));
        assert_eq!(lookup(&types, "D"), Some("untyped string"));
        assert_eq!(lookup(&types, "E"), Some("untyped int"));
        assert_eq!(lookup(&types, "F"), None);
        assert_eq!(lookup(&types, "G"), Some("untyped bool"));
        assert_eq!(lookup(&types, "H"), Some("untyped int"));
        assert_eq!(lookup(&types, "I"), Some("untyped complex"));
    }

    #[test]
    fn test_var_initializers_take_default_types() {
        let types = inferred(
            r#"package p

var (
	a = 1
	b = 1 + 0.5
	c = 'r'
	d = `raw`
	e = !true
	f = nil
	g = -3
)
"#,
        );
        assert_eq!(lookup(&types, "a"), Some("int"));
        assert_eq!(lookup(&types, "b"), Some("float64"));
        assert_eq!(lookup(&types, "c"), Some("rune"));
        assert_eq!(lookup(&types, "d"), Some("string"));
        assert_eq!(lookup(&types, "e"), Some("bool"));
        assert_eq!(lookup(&types, "f"), None);
        assert_eq!(lookup(&types, "g"), Some("int"));
    }

    #[test]
    fn test_composites_calls_and_conversions() {
        let types = inferred(
            r#"package p

import h "net/http"

type Config struct{}

func NewConfig() *Config { return nil }

func Pair() (int, error) { return 0, nil }

var (
	cfg     = Config{}
	ptr     = &Config{}
	client  = &h.Client{}
	names   = []string{"a"}
	table   = make(map[string]int)
	counter = new(int)
	size    = len("abc")
	ratio   = float32(1)
	built   = NewConfig()
	pair    = Pair()
	handler = func(w h.ResponseWriter) error { return nil }
	unknown = h.DefaultClient
)
"#,
        );
        assert_eq!(lookup(&types, "cfg"), Some("Config"));
        assert_eq!(lookup(&types, "ptr"), Some("*Config"));
        assert_eq!(lookup(&types, "client"), Some("*net/http.Client"));
        assert_eq!(lookup(&types, "names"), Some("[]string"));
        assert_eq!(lookup(&types, "table"), Some("map[string]int"));
        assert_eq!(lookup(&types, "counter"), Some("*int"));
        assert_eq!(lookup(&types, "size"), Some("int"));
        assert_eq!(lookup(&types, "ratio"), Some("float32"));
        assert_eq!(lookup(&types, "built"), Some("*Config"));
        assert_eq!(lookup(&types, "pair"), None);
        assert_eq!(
            lookup(&types, "handler"),
            Some("func(w net/http.ResponseWriter) error")
        );
        assert_eq!(lookup(&types, "unknown"), None);
    }

    #[test]
    fn test_shadowed_builtin_is_not_a_conversion() {
        let types = inferred(
            r#"package p

func int(x string) string { return x }

var s = int("a")
"#,
        );
        assert_eq!(lookup(&types, "s"), Some("string"));
    }

    #[test]
    fn test_merge_rules() {
        use Inferred::{Typed, Untyped};
        assert_eq!(
            Untyped(UntypedKind::Int).merge(Untyped(UntypedKind::Float)),
            Some(Untyped(UntypedKind::Float))
        );
        assert_eq!(
            Typed("time.Duration".into()).merge(Untyped(UntypedKind::Int)),
            Some(Typed("time.Duration".into()))
        );
        assert_eq!(Typed("a".into()).merge(Typed("b".into())), None);
        assert_eq!(
            Untyped(UntypedKind::String).merge(Untyped(UntypedKind::Int)),
            None
        );
    }
}
