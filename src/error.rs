/// Errors and recoverable diagnostics produced while loading a Go project
/// and extracting chunks from it.
use std::path::PathBuf;

use thiserror::Error;

/// Result type for chunker operations.
pub type Result<T> = std::result::Result<T, ChunkerError>;

#[derive(Error, Debug)]
pub enum ChunkerError {
    /// The bytes of a source file could not be obtained. The file is skipped.
    #[error("failed to read {path}: {source}")]
    UnreadableSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A declaration's offsets fall outside the buffer it is sliced from.
    /// Only that declaration is skipped.
    #[error(
        "invalid span for {entity} in {path} (line {line}): start={start}, end={end}, file_len={file_len}"
    )]
    InvalidSpan {
        path: PathBuf,
        entity: String,
        line: usize,
        start: usize,
        end: usize,
        file_len: usize,
    },

    /// The front end produced incomplete data for a file (syntax errors,
    /// missing package clause, parser giving up).
    #[error("{path}: {message}")]
    PartialLoad { path: PathBuf, message: String },

    /// A file has a syntax tree but no resolved-symbol view.
    #[error("no resolved symbols for {path}")]
    MissingSymbols { path: PathBuf },

    #[error("no Go source files found under {root}")]
    NoSourceFiles { root: PathBuf },

    #[error("project root {root} is not a readable directory")]
    InvalidRoot { root: PathBuf },

    #[error("failed to load Go grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("invalid tree-sitter query: {0}")]
    Query(#[from] tree_sitter::QueryError),

    #[error("invalid exclude pattern: {0}")]
    Pattern(#[from] globset::Error),
}

impl ChunkerError {
    pub fn partial_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::PartialLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the error aborts the whole run instead of skipping one file
    /// or one declaration.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoSourceFiles { .. }
                | Self::InvalidRoot { .. }
                | Self::Language(_)
                | Self::Query(_)
                | Self::Pattern(_)
        )
    }
}
