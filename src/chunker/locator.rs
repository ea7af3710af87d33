//! Declaration Locator: finds every top-level declaration of a file, its
//! exact span in the source buffer, and its structural metadata.
//!
//! Grouped `type`/`var`/`const` blocks are split into one declaration per
//! spec. Import declarations, the package clause, comments and unparseable
//! fragments produce nothing.

use super::models::{DeclarationDetail, DeclarationKeyword, Span, TypeCategory};
use crate::error::ChunkerError;
use crate::frontend::infer::spec_values;
use crate::frontend::render::{identifier_names, node_text, signature_of, type_string};
use crate::frontend::resolver::{ResolvedIndex, declaration_specs};
use std::path::Path;
use tracing::{debug, warn};
use tree_sitter::Node;

#[derive(Debug)]
pub struct LocatedDeclaration<'t> {
    pub node: Node<'t>,
    pub span: Span,
    pub detail: DeclarationDetail,
}

/// Declarations of one file in source order, plus the ones that had to be
/// skipped.
#[derive(Debug, Default)]
pub struct Located<'t> {
    pub declarations: Vec<LocatedDeclaration<'t>>,
    pub diagnostics: Vec<ChunkerError>,
}

pub struct DeclarationLocator<'a> {
    path: &'a Path,
    source: &'a [u8],
    index: &'a ResolvedIndex,
}

impl<'a> DeclarationLocator<'a> {
    /// `source` is the buffer spans are validated against; it must be the
    /// buffer the tree was parsed from for any declaration to survive.
    pub fn new(path: &'a Path, source: &'a [u8], index: &'a ResolvedIndex) -> Self {
        Self {
            path,
            source,
            index,
        }
    }

    pub fn locate<'t>(&self, root: Node<'t>) -> Located<'t> {
        let mut located = Located::default();
        let mut cursor = root.walk();
        for decl in root.named_children(&mut cursor) {
            match decl.kind() {
                "function_declaration" | "method_declaration" => {
                    self.push(&mut located, decl, |node| self.function_detail(node));
                }
                "type_declaration" => {
                    for spec in declaration_specs(decl) {
                        self.push(&mut located, spec, |node| self.type_detail(node));
                    }
                }
                "var_declaration" | "const_declaration" => {
                    let keyword = if decl.kind() == "const_declaration" {
                        DeclarationKeyword::Const
                    } else {
                        DeclarationKeyword::Var
                    };
                    for spec in declaration_specs(decl) {
                        self.push(&mut located, spec, |node| self.value_detail(node, keyword));
                    }
                }
                _ => {}
            }
        }
        located
    }

    /// Validates the span of `node` before anything reads the buffer, then
    /// derives its metadata.
    fn push<'t>(
        &self,
        located: &mut Located<'t>,
        node: Node<'t>,
        detail: impl FnOnce(Node<'t>) -> Option<DeclarationDetail>,
    ) {
        let span = Span::of(node);
        if !span.is_within(self.source.len()) {
            let err = ChunkerError::InvalidSpan {
                path: self.path.to_path_buf(),
                entity: self.name_hint(node),
                line: span.start_line,
                start: span.start_offset,
                end: span.end_offset,
                file_len: self.source.len(),
            };
            warn!("{err}. Skipping declaration.");
            located.diagnostics.push(err);
            return;
        }

        match detail(node) {
            Some(detail) => {
                debug!(
                    "Located {} {} at lines {}-{}",
                    node.kind(),
                    detail.entity_name(),
                    span.start_line,
                    span.end_line
                );
                located
                    .declarations
                    .push(LocatedDeclaration { node, span, detail });
            }
            None => {
                let err = ChunkerError::partial_load(
                    self.path,
                    format!(
                        "unnamed {} at line {} skipped",
                        node.kind(),
                        span.start_line
                    ),
                );
                warn!("{err}");
                located.diagnostics.push(err);
            }
        }
    }

    fn name_hint(&self, node: Node) -> String {
        let names = identifier_names(node, "name", self.source);
        if names.is_empty() {
            node.kind().to_string()
        } else {
            names.join(", ")
        }
    }

    fn function_detail(&self, node: Node) -> Option<DeclarationDetail> {
        let name = self.name_of(node)?;
        let receiver_type = node
            .child_by_field_name("receiver")
            .and_then(|receiver| {
                let mut cursor = receiver.walk();
                let first = receiver
                    .named_children(&mut cursor)
                    .find(|p| p.kind() == "parameter_declaration");
                first
            })
            .and_then(|param| param.child_by_field_name("type"))
            .map(|ty| type_string(ty, self.source, self.index));

        Some(DeclarationDetail::Function {
            name,
            receiver_type,
            signature: signature_of(node, self.source, self.index),
        })
    }

    fn type_detail(&self, spec: Node) -> Option<DeclarationDetail> {
        let name = self.name_of(spec)?;
        let (category, definition) = match spec.child_by_field_name("type") {
            Some(ty) => (
                TypeCategory::from_type_kind(ty.kind()),
                type_string(ty, self.source, self.index),
            ),
            None => (TypeCategory::AliasOrBasic, String::new()),
        };
        Some(DeclarationDetail::Type {
            name,
            category,
            definition,
        })
    }

    fn value_detail(&self, spec: Node, keyword: DeclarationKeyword) -> Option<DeclarationDetail> {
        let names = identifier_names(spec, "name", self.source);
        if names.is_empty() {
            return None;
        }
        let declared_type = spec
            .child_by_field_name("type")
            .map(|ty| type_string(ty, self.source, self.index));
        let inferred_type = match declared_type {
            Some(_) => None,
            None => spec_values(spec)
                .first()
                .and_then(|value| self.index.type_of(*value))
                .map(str::to_string),
        };
        Some(DeclarationDetail::Value {
            keyword,
            names,
            declared_type,
            inferred_type,
        })
    }

    fn name_of(&self, node: Node) -> Option<String> {
        node.child_by_field_name("name")
            .and_then(|name| node_text(name, self.source))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }
}
