pub mod canonical;
pub mod core;
pub mod locator;
pub mod models;

pub use canonical::{AliasMap, Canonicalizer};
pub use core::{ChunkExtractor, Extraction, ExtractionSummary, extract_project};
pub use locator::{DeclarationLocator, Located, LocatedDeclaration};
pub use models::{
    ChunkMetadata, ChunkRecord, DeclarationDetail, DeclarationKeyword, EntityKind, Span,
    TypeCategory,
};
