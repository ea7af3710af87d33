//! Qualifier canonicalization.
//!
//! Rewrites `alias.Member` references inside a declaration's text into
//! `canonical/path.Member`. Which occurrences are genuine comes from the
//! syntax tree: in code, only qualifiers the resolver bound to an import are
//! touched, so fields and locals spelled like an alias stay as they are.
//! Comments and string literals are rewritten textually.
//!
//! Rewriting goes through two passes: every claimed occurrence is first
//! swapped for a placeholder that cannot occur in the text, then placeholders
//! are swapped for canonical paths. Text inserted by one replacement is
//! therefore never matched by another.

use crate::frontend::render::node_text;
use crate::frontend::resolver::ResolvedIndex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use tree_sitter::Node;

const SENTINEL: &str = "__GOCHUNK_QUALIFIER_";

/// Alias → canonical import path, for one declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap(BTreeMap<String, String>);

impl AliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: impl Into<String>, path: impl Into<String>) {
        self.0.insert(alias.into(), path.into());
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.0.get(alias).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(a, p)| (a.as_str(), p.as_str()))
    }

    /// Rewrites every `alias.` occurrence that stands on its own (not part of
    /// a longer identifier or a dotted chain).
    pub fn rewrite(&self, text: &str) -> String {
        self.rewrite_where(text, |_| true)
    }

    /// Like [`AliasMap::rewrite`], but only claims occurrences whose starting
    /// byte offset is accepted by `accept`.
    pub fn rewrite_where(&self, text: &str, accept: impl Fn(usize) -> bool) -> String {
        if self.is_empty() {
            return text.to_string();
        }

        // Longest alias first, so `ab.` is claimed before `a.` is considered.
        let mut ordered: Vec<(&str, &str)> = self.iter().collect();
        ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

        let sentinel = unused_sentinel(text, ordered.iter().map(|(_, path)| *path));
        let placeholders: Vec<String> = (0..ordered.len())
            .map(|i| format!("{sentinel}{i}__"))
            .collect();
        let protected = canonical_ranges(text, ordered.iter().map(|(_, path)| *path));

        // Pass 1: claim alias occurrences against the original text, then
        // splice placeholders in.
        let mut claimed: Vec<(usize, usize, usize)> = Vec::new();
        for (slot, (alias, _)) in ordered.iter().enumerate() {
            let needle = format!("{alias}.");
            for (start, _) in text.match_indices(&needle) {
                let end = start + alias.len();
                let taken = claimed.iter().any(|&(s, e, _)| start < e && s < end);
                if taken
                    || continues_qualifier(text, start)
                    || !accept(start)
                    || protected.iter().any(|&(s, e)| start < e && s < end)
                {
                    continue;
                }
                claimed.push((start, end, slot));
            }
        }
        if claimed.is_empty() {
            return text.to_string();
        }
        claimed.sort_unstable();

        let mut quarantined = String::with_capacity(text.len() + claimed.len() * sentinel.len());
        let mut last = 0;
        for &(start, end, slot) in &claimed {
            quarantined.push_str(&text[last..start]);
            quarantined.push_str(&placeholders[slot]);
            last = end;
        }
        quarantined.push_str(&text[last..]);

        // Pass 2: placeholders to canonical paths.
        let mut slots: Vec<usize> = (0..placeholders.len()).collect();
        slots.sort_by(|&a, &b| {
            placeholders[b]
                .len()
                .cmp(&placeholders[a].len())
                .then(a.cmp(&b))
        });
        let mut resolved = quarantined;
        for slot in slots {
            resolved = resolved.replace(
                &format!("{}.", placeholders[slot]),
                &format!("{}.", ordered[slot].1),
            );
        }
        resolved
    }
}

impl<A: Into<String>, P: Into<String>> FromIterator<(A, P)> for AliasMap {
    fn from_iter<I: IntoIterator<Item = (A, P)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(alias, path)| (alias.into(), path.into()))
                .collect(),
        )
    }
}

/// What one node of a declaration contributes to its canonicalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Finding {
    /// An identifier resolved to an import, used as a package qualifier.
    /// The offset is relative to the start of the declaration.
    Qualifier {
        offset: usize,
        name: String,
        path: String,
    },
    /// A comment or string literal, as a declaration-relative byte range.
    Opaque { start: usize, end: usize },
}

/// Canonicalizer for one declaration: its alias map plus the positions at
/// which the map may be applied.
#[derive(Debug, Clone, Default)]
pub struct Canonicalizer {
    aliases: AliasMap,
    qualifiers: BTreeSet<usize>,
    opaque: Vec<(usize, usize)>,
}

impl Canonicalizer {
    pub fn for_declaration(node: Node, source: &[u8], index: &ResolvedIndex) -> Self {
        findings(node, source, index)
            .into_iter()
            .fold(Self::default(), |mut canonicalizer, finding| {
                match finding {
                    Finding::Qualifier { offset, name, path } => {
                        canonicalizer.qualifiers.insert(offset);
                        if path != name {
                            canonicalizer.aliases.insert(name, path);
                        }
                    }
                    Finding::Opaque { start, end } => canonicalizer.opaque.push((start, end)),
                }
                canonicalizer
            })
    }

    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    /// Rewrites the declaration's text. `text` must start at the
    /// declaration's first byte.
    pub fn apply(&self, text: &str) -> String {
        if self.aliases.is_empty() {
            return text.to_string();
        }
        debug!("Canonicalizing {} qualifier(s)", self.aliases.len());
        self.aliases.rewrite_where(text, |offset| {
            self.qualifiers.contains(&offset)
                || self
                    .opaque
                    .iter()
                    .any(|&(start, end)| start <= offset && offset < end)
        })
    }
}

/// Import qualifiers and opaque text of the subtree at `node`, in source
/// order. Walks with an explicit stack; expression nesting is unbounded.
fn findings(node: Node, source: &[u8], index: &ResolvedIndex) -> Vec<Finding> {
    let base = node.start_byte();
    let mut found = Vec::new();
    let mut stack = vec![node];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "comment" | "interpreted_string_literal" | "raw_string_literal" => {
                found.push(Finding::Opaque {
                    start: node.start_byte().saturating_sub(base),
                    end: node.end_byte().saturating_sub(base),
                });
                continue;
            }
            "selector_expression" | "qualified_type" => {
                if let Some(qualifier) = qualifier_use(node, base, source, index) {
                    found.push(qualifier);
                }
            }
            _ => {}
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    found
}

fn qualifier_use(
    node: Node,
    base: usize,
    source: &[u8],
    index: &ResolvedIndex,
) -> Option<Finding> {
    let qualifier = match node.kind() {
        "selector_expression" => node
            .child_by_field_name("operand")
            .filter(|operand| operand.kind() == "identifier")?,
        _ => node.child_by_field_name("package")?,
    };
    Some(Finding::Qualifier {
        offset: qualifier.start_byte().saturating_sub(base),
        name: node_text(qualifier, source)?.to_string(),
        path: index.import_path(qualifier)?.to_string(),
    })
}

/// Whether the match at `start` continues an identifier or a dotted chain.
fn continues_qualifier(text: &str, start: usize) -> bool {
    text[..start]
        .chars()
        .next_back()
        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// A placeholder prefix found neither in the text nor in any replacement.
fn unused_sentinel<'p>(text: &str, paths: impl Iterator<Item = &'p str> + Clone) -> String {
    let mut sentinel = SENTINEL.to_string();
    while text.contains(&sentinel) || paths.clone().any(|p| p.contains(&sentinel)) {
        sentinel.push('X');
    }
    sentinel
}

/// Ranges of `path.` occurrences for paths that cannot be identifiers.
/// Already-canonical qualifiers are never rewritten again.
fn canonical_ranges<'p>(text: &str, paths: impl Iterator<Item = &'p str>) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    for path in paths.filter(|p| p.contains(['/', '.'])) {
        let needle = format!("{path}.");
        for (start, _) in text.match_indices(&needle) {
            if !continues_qualifier(text, start) {
                ranges.push((start, start + needle.len()));
            }
        }
    }
    ranges
}
