use super::languages::LanguageConfig;
use crate::error::{ChunkerError, Result};
use std::path::Path;
use tree_sitter::{Node, Parser, Query, QueryCursor, StreamingIterator, Tree};

/// Upper bound on syntax diagnostics reported per file.
const MAX_SYNTAX_DIAGNOSTICS: usize = 8;

/// One parsed Go file: the syntax tree plus whatever went wrong while
/// building it. A tree with syntax errors is still usable.
pub struct ParsedModule {
    pub tree: Tree,
    pub package_name: Option<String>,
    pub diagnostics: Vec<ChunkerError>,
}

pub struct ModuleParser {
    parser: Parser,
    package_query: Query,
}

impl ModuleParser {
    pub fn new() -> Result<Self> {
        let config = LanguageConfig::go();
        let mut parser = Parser::new();
        parser.set_language(&config.language)?;
        let package_query = Query::new(&config.language, config.package_query)?;
        Ok(Self {
            parser,
            package_query,
        })
    }

    /// Parses `source` as a Go file. `path` is only used for diagnostics.
    pub fn parse_module(&mut self, path: &Path, source: &[u8]) -> Result<ParsedModule> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| ChunkerError::partial_load(path, "parser produced no syntax tree"))?;

        let root = tree.root_node();
        let mut diagnostics = Vec::new();
        if root.has_error() {
            collect_syntax_errors(root, path, &mut diagnostics);
        }

        let package_name = self.package_name(root, source);
        if package_name.is_none() {
            diagnostics.push(ChunkerError::partial_load(path, "missing package clause"));
        }

        Ok(ParsedModule {
            tree,
            package_name,
            diagnostics,
        })
    }

    fn package_name(&self, root: Node, source: &[u8]) -> Option<String> {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.package_query, root, source);
        while let Some(m) = matches.next() {
            for cap in m.captures {
                if let Ok(name) = cap.node.utf8_text(source) {
                    return Some(name.to_string());
                }
            }
        }
        None
    }
}

fn collect_syntax_errors(root: Node, path: &Path, out: &mut Vec<ChunkerError>) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if out.len() >= MAX_SYNTAX_DIAGNOSTICS {
            return;
        }
        if node.is_error() || node.is_missing() {
            let line = node.start_position().row + 1;
            let message = if node.is_missing() {
                format!("syntax error at line {line}: missing {}", node.kind())
            } else {
                format!("syntax error at line {line}")
            };
            out.push(ChunkerError::partial_load(path, message));
            continue;
        }
        let mut cursor = node.walk();
        let broken: Vec<Node> = node
            .children(&mut cursor)
            .filter(|child| child.has_error() || child.is_missing())
            .collect();
        stack.extend(broken.into_iter().rev());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clean_module() {
        let mut parser = ModuleParser::new().expect("Failed to initialize ModuleParser");
        let source = b"package billing\n\nfunc Total() int { return 0 }\n";
        let parsed = parser
            .parse_module(Path::new("billing/total.go"), source)
            .expect("Failed to parse Go code");

        assert_eq!(parsed.package_name.as_deref(), Some("billing"));
        assert!(parsed.diagnostics.is_empty());
        assert_eq!(parsed.tree.root_node().kind(), "source_file");
    }

    #[test]
    fn test_parse_reports_syntax_errors() {
        let mut parser = ModuleParser::new().unwrap();
        let source = b"package broken\n\nfunc Ok() {}\n\nfunc Bad( {\n";
        let parsed = parser
            .parse_module(Path::new("broken.go"), source)
            .unwrap();

        assert_eq!(parsed.package_name.as_deref(), Some("broken"));
        assert!(!parsed.diagnostics.is_empty());
        assert!(
            parsed
                .diagnostics
                .iter()
                .all(|d| matches!(d, ChunkerError::PartialLoad { .. }))
        );
    }

    #[test]
    fn test_parse_without_package_clause() {
        let mut parser = ModuleParser::new().unwrap();
        let parsed = parser
            .parse_module(Path::new("loose.go"), b"func F() {}\n")
            .unwrap();
        assert!(parsed.package_name.is_none());
        assert!(
            parsed
                .diagnostics
                .iter()
                .any(|d| d.to_string().contains("missing package clause"))
        );
    }
}
