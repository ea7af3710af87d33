use super::canonical::Canonicalizer;
use super::locator::DeclarationLocator;
use super::models::{ChunkMetadata, ChunkRecord};
use crate::error::{ChunkerError, Result};
use crate::frontend::project::{LoadOptions, Package, Project, SourceFile};
use crate::frontend::resolver::{ProjectIndex, resolve_symbols};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub declarations_skipped: usize,
    pub chunks: usize,
}

/// Chunks of a project in traversal order, plus every recoverable problem
/// met while producing them.
#[derive(Debug, Default)]
pub struct Extraction {
    pub chunks: Vec<ChunkRecord>,
    pub diagnostics: Vec<ChunkerError>,
    pub summary: ExtractionSummary,
}

/// Loads, resolves and extracts the Go project at `root`.
pub fn extract_project(root: &Path, options: &LoadOptions) -> Result<Extraction> {
    let project = Project::load(root, options)?;
    let index = resolve_symbols(&project)?;

    let mut extraction = ChunkExtractor::new(&project, &index).extract();
    extraction.summary.files_skipped += project.unreadable.len() + project.skipped.len();
    let mut diagnostics = project.diagnostics;
    diagnostics.append(&mut extraction.diagnostics);
    extraction.diagnostics = diagnostics;
    Ok(extraction)
}

pub struct ChunkExtractor<'a> {
    project: &'a Project,
    index: &'a ProjectIndex,
}

impl<'a> ChunkExtractor<'a> {
    pub fn new(project: &'a Project, index: &'a ProjectIndex) -> Self {
        Self { project, index }
    }

    pub fn extract(&self) -> Extraction {
        let mut extraction = Extraction::default();

        for (package, file) in self.project.files() {
            match self.extract_file(package, file, &mut extraction) {
                Ok(count) => {
                    debug!("Extracted {count} chunks from {}", file.display_path);
                    extraction.summary.files_processed += 1;
                }
                Err(e) => {
                    warn!("Skipping {}: {e}", file.display_path);
                    extraction.diagnostics.push(e);
                    extraction.summary.files_skipped += 1;
                }
            }
        }

        extraction.summary.chunks = extraction.chunks.len();
        info!(
            "Extracted {} chunks from {} files ({} files skipped, {} declarations skipped)",
            extraction.summary.chunks,
            extraction.summary.files_processed,
            extraction.summary.files_skipped,
            extraction.summary.declarations_skipped
        );
        extraction
    }

    /// Extracts one file. Declaration-level problems are recorded on
    /// `extraction`; an `Err` means the whole file was skipped.
    fn extract_file(
        &self,
        package: &Package,
        file: &SourceFile,
        extraction: &mut Extraction,
    ) -> Result<usize> {
        let index = self
            .index
            .for_file(&file.path)
            .ok_or_else(|| ChunkerError::MissingSymbols {
                path: file.path.clone(),
            })?;
        let source = file.source();

        let located = DeclarationLocator::new(&file.path, source, index).locate(file.root());
        extraction.summary.declarations_skipped += located.diagnostics.len();
        extraction.diagnostics.extend(located.diagnostics);

        let mut count = 0;
        for declaration in located.declarations {
            let Some(bytes) = declaration.span.slice(source) else {
                continue;
            };
            let text = String::from_utf8_lossy(bytes);
            let document =
                Canonicalizer::for_declaration(declaration.node, source, index).apply(&text);

            let metadata = ChunkMetadata::new(
                file.display_path.clone(),
                package.name.clone(),
                package.import_path.clone(),
                declaration.span,
                &declaration.detail,
            );
            extraction.chunks.push(ChunkRecord::new(document, metadata));
            count += 1;
        }
        Ok(count)
    }
}
