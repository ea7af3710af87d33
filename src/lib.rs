//! # gochunk: Go declaration chunker
//!
//! Extracts every top-level declaration of a Go project (functions, methods,
//! types, variables, constants) as a self-contained chunk with flat
//! metadata, ready to be embedded and indexed for code search. Import
//! aliases inside each chunk are rewritten to their full import paths.
//!
//! ## Architecture
//!
//! - **[`frontend`]**: Tree-sitter parsing, project loading, symbol resolution, type rendering
//! - **[`chunker`]**: Declaration locator, qualifier canonicalizer, chunk records
//! - **[`output`]**: JSON / JSON Lines serialization of the chunk sequence
//! - **[`config`]**: Configuration loading and validation
//! - **[`error`]**: Crate-wide error type

pub mod chunker;
pub mod config;
pub mod error;
pub mod frontend;
pub mod output;

pub use chunker::{ChunkRecord, Extraction, extract_project};
pub use error::{ChunkerError, Result};
