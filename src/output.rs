/// Serialization of the chunk sequence to disk.
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chunker::ChunkRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One pretty-printed JSON array.
    #[default]
    Json,
    /// One JSON object per line.
    Jsonl,
}

/// Renders `chunks` in the given format.
pub fn render_chunks(chunks: &[ChunkRecord], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(chunks).context("failed to marshal chunks")
        }
        OutputFormat::Jsonl => {
            let mut out = String::new();
            for chunk in chunks {
                let line = serde_json::to_string(chunk)
                    .with_context(|| format!("failed to marshal chunk {}", chunk.id))?;
                writeln!(out, "{line}")?;
            }
            Ok(out)
        }
    }
}

/// Writes `chunks` to `path`, replacing any existing file.
pub fn write_chunks(path: &Path, format: OutputFormat, chunks: &[ChunkRecord]) -> Result<()> {
    let data = render_chunks(chunks, format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, data)
        .with_context(|| format!("failed to write output: {}", path.display()))?;
    info!("Wrote {} chunks to {}", chunks.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{ChunkMetadata, DeclarationDetail, Span};
    use tempfile::tempdir;

    fn chunk(name: &str, line: usize) -> ChunkRecord {
        let span = Span {
            start_offset: 0,
            end_offset: 10,
            start_line: line,
            end_line: line,
        };
        let detail = DeclarationDetail::Function {
            name: name.to_string(),
            receiver_type: None,
            signature: "()".to_string(),
        };
        let metadata = ChunkMetadata::new("a.go", "a", None, span, &detail);
        ChunkRecord::new(format!("func {name}() {{}}"), metadata)
    }

    #[test]
    fn test_json_array_is_pretty_printed() {
        let rendered = render_chunks(&[chunk("A", 3)], OutputFormat::Json).unwrap();
        assert!(rendered.starts_with("[\n  {\n    \"id\": \"a.go:3-3-A\""));
        let parsed: Vec<ChunkRecord> = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed, vec![chunk("A", 3)]);
    }

    #[test]
    fn test_empty_json_array() {
        assert_eq!(render_chunks(&[], OutputFormat::Json).unwrap(), "[]");
    }

    #[test]
    fn test_json_lines() {
        let rendered =
            render_chunks(&[chunk("A", 3), chunk("B", 5)], OutputFormat::Jsonl).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["id"], "a.go:5-5-B");
        assert_eq!(second["metadata"]["entity_type"], "function");
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("out/chunks.jsonl");
        write_chunks(&path, OutputFormat::Jsonl, &[chunk("A", 1)]).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("}\n"));
    }

    #[test]
    fn test_format_names() {
        let format: OutputFormat = serde_json::from_str("\"jsonl\"").unwrap();
        assert_eq!(format, OutputFormat::Jsonl);
        assert_eq!(OutputFormat::default(), OutputFormat::Json);
    }
}
