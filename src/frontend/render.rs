//! Type-string and signature rendering.
//!
//! Rendering prefers the type recorded in the [`ResolvedIndex`]; without one
//! it rebuilds the type from the syntax, recursing by shape. Every entry
//! point returns *some* string: unknown shapes fall back to the node's
//! source text and, failing that, to its grammar kind.

use super::resolver::ResolvedIndex;
use tree_sitter::Node;

/// Source text of `node`, or `None` if the node lies outside `source` or is
/// not valid UTF-8. Never panics on a buffer that disagrees with the tree.
pub fn node_text<'s>(node: Node, source: &'s [u8]) -> Option<&'s str> {
    let bytes = source.get(node.start_byte()..node.end_byte())?;
    std::str::from_utf8(bytes).ok()
}

/// Source text of `node` with every whitespace run collapsed to one space.
pub fn compact_text(node: Node, source: &[u8]) -> Option<String> {
    node_text(node, source).map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Renders a type (or expression used as a type) as a string.
pub fn type_string(node: Node, source: &[u8], index: &ResolvedIndex) -> String {
    if let Some(ty) = index.type_of(node) {
        return ty.to_string();
    }
    render_shape(node, source, index)
        .or_else(|| compact_text(node, source))
        .unwrap_or_else(|| node.kind().to_string())
}

/// Renders `(params) results` for a function-like node (declaration,
/// method, literal, function type, interface method).
pub fn signature_of(node: Node, source: &[u8], index: &ResolvedIndex) -> String {
    signature(
        node.child_by_field_name("parameters"),
        node.child_by_field_name("result"),
        source,
        index,
    )
}

pub fn signature(
    params: Option<Node>,
    result: Option<Node>,
    source: &[u8],
    index: &ResolvedIndex,
) -> String {
    let params = params
        .map(|list| parameter_entries(list, source, index).0)
        .unwrap_or_default();
    let mut sig = format!("({})", params.join(", "));

    if let Some(result) = result {
        if result.kind() == "parameter_list" {
            let (results, first_unnamed) = parameter_entries(result, source, index);
            if results.len() == 1 && first_unnamed {
                sig.push(' ');
                sig.push_str(&results[0]);
            } else if !results.is_empty() {
                sig.push_str(&format!(" ({})", results.join(", ")));
            }
        } else {
            sig.push(' ');
            sig.push_str(&type_string(result, source, index));
        }
    }
    sig
}

/// Renders every entry of a parameter list, one per declared name. The flag
/// reports whether the first declaration carries no names.
fn parameter_entries(list: Node, source: &[u8], index: &ResolvedIndex) -> (Vec<String>, bool) {
    let mut entries = Vec::new();
    let mut first_unnamed = None;
    let mut cursor = list.walk();
    for param in list.named_children(&mut cursor) {
        let variadic = match param.kind() {
            "parameter_declaration" => false,
            "variadic_parameter_declaration" => true,
            _ => continue,
        };
        let mut ty = param
            .child_by_field_name("type")
            .map(|t| type_string(t, source, index))
            .unwrap_or_else(|| param.kind().to_string());
        if variadic {
            ty.insert_str(0, "...");
        }

        let names = identifier_names(param, "name", source);
        first_unnamed.get_or_insert(names.is_empty());
        if names.is_empty() {
            entries.push(ty);
        } else {
            entries.extend(names.into_iter().map(|name| format!("{name} {ty}")));
        }
    }
    (entries, first_unnamed.unwrap_or(false))
}

/// Texts of the identifier children stored under `field`.
pub fn identifier_names(node: Node, field: &str, source: &[u8]) -> Vec<String> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor)
        .filter(|n| n.is_named() && n.kind().ends_with("identifier"))
        .filter_map(|n| node_text(n, source).map(str::to_string))
        .collect()
}

pub fn first_named_child(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .find(|child| child.kind() != "comment")
}

fn render_shape(node: Node, source: &[u8], index: &ResolvedIndex) -> Option<String> {
    let render = |n: Node| type_string(n, source, index);
    let field = |name: &str| node.child_by_field_name(name);

    let rendered = match node.kind() {
        "identifier" | "type_identifier" | "field_identifier" | "package_identifier" => {
            node_text(node, source)?.to_string()
        }
        "pointer_type" => format!("*{}", render(first_named_child(node)?)),
        "slice_type" => format!("[]{}", render(field("element")?)),
        "array_type" => format!(
            "[{}]{}",
            compact_text(field("length")?, source)?,
            render(field("element")?)
        ),
        "implicit_length_array_type" => format!("[...]{}", render(field("element")?)),
        "map_type" => format!("map[{}]{}", render(field("key")?), render(field("value")?)),
        "qualified_type" => qualified_name(field("package")?, field("name")?, source, index)?,
        "selector_expression" => {
            let operand = field("operand")?;
            let member = field("field")?;
            if operand.kind() == "identifier" {
                qualified_name(operand, member, source, index)?
            } else {
                format!("{}.{}", render(operand), node_text(member, source)?)
            }
        }
        "interface_type" => interface_string(node, source, index),
        "struct_type" => struct_string(node, source, index)?,
        "channel_type" => format!("{}{}", channel_prefix(node), render(field("value")?)),
        "variadic_parameter_declaration" => format!("...{}", render(field("type")?)),
        "function_type" => format!("func{}", signature_of(node, source, index)),
        "generic_type" => format!(
            "{}[{}]",
            render(field("type")?),
            join_named(field("type_arguments")?, ", ", source, index)
        ),
        "type_arguments" => join_named(node, ", ", source, index),
        "type_elem" | "type_constraint" => join_named(node, " | ", source, index),
        "negated_type" => format!("~{}", render(first_named_child(node)?)),
        "parenthesized_type" => format!("({})", render(first_named_child(node)?)),
        _ => return None,
    };
    Some(rendered)
}

/// `pkg.Name`, with `pkg` replaced by its import path when it names an import.
fn qualified_name(
    qualifier: Node,
    member: Node,
    source: &[u8],
    index: &ResolvedIndex,
) -> Option<String> {
    let member = node_text(member, source)?;
    let qualifier = match index.import_path(qualifier) {
        Some(path) => path,
        None => node_text(qualifier, source)?,
    };
    Some(format!("{qualifier}.{member}"))
}

fn join_named(node: Node, separator: &str, source: &[u8], index: &ResolvedIndex) -> String {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .map(|child| type_string(child, source, index))
        .collect::<Vec<_>>()
        .join(separator)
}

fn channel_prefix(node: Node) -> &'static str {
    let mut cursor = node.walk();
    let tokens: Vec<&str> = node
        .children(&mut cursor)
        .filter(|child| !child.is_named())
        .map(|child| child.kind())
        .take(2)
        .collect();
    match tokens.as_slice() {
        ["<-", "chan"] => "<-chan ",
        ["chan", "<-"] => "chan<- ",
        _ => "chan ",
    }
}

fn interface_string(node: Node, source: &[u8], index: &ResolvedIndex) -> String {
    let mut elems = Vec::new();
    let mut cursor = node.walk();
    for elem in node.named_children(&mut cursor) {
        match elem.kind() {
            "comment" => {}
            "method_elem" | "method_spec" => {
                let name = elem
                    .child_by_field_name("name")
                    .and_then(|n| node_text(n, source))
                    .unwrap_or_default();
                elems.push(format!("{name}{}", signature_of(elem, source, index)));
            }
            _ => elems.push(type_string(elem, source, index)),
        }
    }
    if elems.is_empty() {
        "interface{}".to_string()
    } else {
        format!("interface{{{}}}", elems.join("; "))
    }
}

fn struct_string(node: Node, source: &[u8], index: &ResolvedIndex) -> Option<String> {
    let list = first_named_child(node)?;
    let mut fields = Vec::new();
    let mut cursor = list.walk();
    for decl in list.named_children(&mut cursor) {
        if decl.kind() != "field_declaration" {
            continue;
        }
        let ty = type_string(decl.child_by_field_name("type")?, source, index);
        let tag = decl
            .child_by_field_name("tag")
            .and_then(|t| node_text(t, source))
            .map(|t| format!(" {t}"))
            .unwrap_or_default();
        let names = identifier_names(decl, "name", source);
        if names.is_empty() {
            let mut decl_cursor = decl.walk();
            let pointer = decl
                .children(&mut decl_cursor)
                .any(|child| !child.is_named() && child.kind() == "*");
            let star = if pointer { "*" } else { "" };
            fields.push(format!("{star}{ty}{tag}"));
        } else {
            fields.extend(names.into_iter().map(|name| format!("{name} {ty}{tag}")));
        }
    }
    Some(format!("struct{{{}}}", fields.join("; ")))
}
