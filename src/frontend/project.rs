//! Project discovery and loading.
//!
//! A [`Project`] is the snapshot every later stage works from: each readable
//! Go file is read exactly once, parsed, and kept together with the bytes the
//! parser saw, so declaration offsets always refer to the same buffer.

use super::languages::LanguageConfig;
use super::parser::ModuleParser;
use crate::error::{ChunkerError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use tree_sitter::{Node, Tree};

static MODULE_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*module\s+"?([^\s"]+)"?"#).expect("module directive regex is valid")
});

/// Options controlling which files make up a project.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub include_tests: bool,
    pub respect_gitignore: bool,
    /// Glob patterns matched against forward-slash paths relative to the root.
    pub exclude_patterns: Vec<String>,
    /// Overrides the `module` directive of `go.mod`.
    pub module_path: Option<String>,
}

/// A parsed Go file and the exact bytes it was parsed from.
pub struct SourceFile {
    pub path: PathBuf,
    /// Forward-slash path relative to the project root, used in chunk metadata.
    pub display_path: String,
    pub package_name: String,
    source: Vec<u8>,
    tree: Tree,
}

impl SourceFile {
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }
}

/// Files sharing a directory and a package clause.
pub struct Package {
    pub name: String,
    /// Directory relative to the project root (`""` for the root itself).
    pub dir: String,
    pub import_path: Option<String>,
    pub files: Vec<SourceFile>,
}

pub struct Project {
    pub root: PathBuf,
    pub module_path: Option<String>,
    pub packages: Vec<Package>,
    /// Go files that were discovered but could not be read.
    pub unreadable: Vec<PathBuf>,
    /// Go files that were read but could not be placed in a package.
    pub skipped: Vec<PathBuf>,
    /// Recoverable problems found while loading.
    pub diagnostics: Vec<ChunkerError>,
}

impl Project {
    /// Walks `root`, reads and parses every Go file that belongs to the build.
    ///
    /// Only a root without any Go files (or an unusable root) is an error;
    /// unreadable or malformed files are recorded as diagnostics.
    pub fn load(root: &Path, options: &LoadOptions) -> Result<Project> {
        if !root.is_dir() {
            return Err(ChunkerError::InvalidRoot {
                root: root.to_path_buf(),
            });
        }
        let excludes = build_globset(&options.exclude_patterns)?;
        let language = LanguageConfig::go();

        let module_path = match &options.module_path {
            Some(path) => Some(path.clone()),
            None => read_module_path(root),
        };
        let mut builder = ProjectBuilder::new(root)?;
        if let Some(module) = &module_path {
            builder = builder.module_path(module.clone());
        }

        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(options.respect_gitignore)
            .git_exclude(options.respect_gitignore)
            .git_global(options.respect_gitignore)
            .ignore(options.respect_gitignore)
            .require_git(false)
            .filter_entry(|entry| entry.depth() == 0 || !is_ignored_by_go_tool(entry))
            .build();

        let mut discovered = 0usize;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unwalkable entry: {e}");
                    continue;
                }
            };
            if entry.file_type().is_some_and(|t| t.is_dir()) {
                continue;
            }
            let path = entry.path();
            let ext = path
                .extension()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            if !language.handles_extension(ext) {
                continue;
            }
            let rel = relative_display_path(root, path);
            if !options.include_tests && rel.ends_with("_test.go") {
                continue;
            }
            if excludes.is_match(&rel) {
                debug!("Excluded by pattern: {rel}");
                continue;
            }

            discovered += 1;
            match fs::read(path) {
                Ok(bytes) => builder.add_source(path, bytes),
                Err(e) => {
                    warn!("Error reading file {}: {e}", path.display());
                    builder.add_unreadable(path, e);
                }
            }
        }

        if discovered == 0 {
            return Err(ChunkerError::NoSourceFiles {
                root: root.to_path_buf(),
            });
        }

        let project = builder.build();
        info!(
            "Loaded {} packages ({} files, {} unreadable, {} skipped) from {}",
            project.packages.len(),
            project.file_count(),
            project.unreadable.len(),
            project.skipped.len(),
            root.display()
        );
        Ok(project)
    }

    /// All files in traversal order, paired with their package.
    pub fn files(&self) -> impl Iterator<Item = (&Package, &SourceFile)> {
        self.packages
            .iter()
            .flat_map(|pkg| pkg.files.iter().map(move |file| (pkg, file)))
    }

    pub fn file_count(&self) -> usize {
        self.packages.iter().map(|p| p.files.len()).sum()
    }

    /// Name of the project package with the given import path. External
    /// test packages (`foo_test`) never answer for their directory.
    pub fn package_name_for(&self, import_path: &str) -> Option<&str> {
        self.packages
            .iter()
            .filter(|p| p.import_path.as_deref() == Some(import_path))
            .find(|p| !p.name.ends_with("_test"))
            .map(|p| p.name.as_str())
    }
}

/// Assembles a [`Project`] from in-memory sources. [`Project::load`] uses it
/// after walking the file system; callers that already hold file contents
/// can use it directly.
pub struct ProjectBuilder {
    root: PathBuf,
    module_path: Option<String>,
    parser: ModuleParser,
    files: Vec<SourceFile>,
    unreadable: Vec<PathBuf>,
    skipped: Vec<PathBuf>,
    diagnostics: Vec<ChunkerError>,
}

impl ProjectBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            module_path: None,
            parser: ModuleParser::new()?,
            files: Vec::new(),
            unreadable: Vec::new(),
            skipped: Vec::new(),
            diagnostics: Vec::new(),
        })
    }

    #[must_use]
    pub fn module_path(mut self, module_path: impl Into<String>) -> Self {
        self.module_path = Some(module_path.into());
        self
    }

    /// Parses `source` and adds it to the project. Files the parser cannot
    /// place in a package are recorded as diagnostics and left out.
    pub fn add_source(&mut self, path: impl AsRef<Path>, source: Vec<u8>) {
        let path = path.as_ref();
        let display_path = relative_display_path(&self.root, path);
        let parsed = match self.parser.parse_module(path, &source) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping {display_path}: {e}");
                self.diagnostics.push(e);
                self.skipped.push(path.to_path_buf());
                return;
            }
        };
        for diagnostic in &parsed.diagnostics {
            warn!("{diagnostic}");
        }
        self.diagnostics.extend(parsed.diagnostics);

        // The parser already reported the missing clause.
        let Some(package_name) = parsed.package_name else {
            warn!("Skipping {display_path}: no package clause");
            self.skipped.push(path.to_path_buf());
            return;
        };
        self.files.push(SourceFile {
            path: path.to_path_buf(),
            display_path,
            package_name,
            source,
            tree: parsed.tree,
        });
    }

    pub fn add_unreadable(&mut self, path: impl Into<PathBuf>, source: std::io::Error) {
        let path = path.into();
        self.unreadable.push(path.clone());
        self.diagnostics
            .push(ChunkerError::UnreadableSource { path, source });
    }

    pub fn build(self) -> Project {
        let mut grouped: BTreeMap<(String, String), Vec<SourceFile>> = BTreeMap::new();
        for file in self.files {
            let dir = match file.display_path.rsplit_once('/') {
                Some((dir, _)) => dir.to_string(),
                None => String::new(),
            };
            grouped
                .entry((dir, file.package_name.clone()))
                .or_default()
                .push(file);
        }

        let packages = grouped
            .into_iter()
            .map(|((dir, name), mut files)| {
                files.sort_by(|a, b| a.display_path.cmp(&b.display_path));
                let import_path = self.module_path.as_ref().map(|module| {
                    if dir.is_empty() {
                        module.clone()
                    } else {
                        format!("{module}/{dir}")
                    }
                });
                Package {
                    name,
                    dir,
                    import_path,
                    files,
                }
            })
            .collect();

        Project {
            root: self.root,
            module_path: self.module_path,
            packages,
            unreadable: self.unreadable,
            skipped: self.skipped,
            diagnostics: self.diagnostics,
        }
    }
}

/// Reads the `module` directive from `<root>/go.mod`, if any.
fn read_module_path(root: &Path) -> Option<String> {
    let data = fs::read_to_string(root.join("go.mod")).ok()?;
    let module = parse_module_directive(&data);
    if module.is_none() {
        warn!("go.mod under {} has no module directive", root.display());
    }
    module
}

fn parse_module_directive(go_mod: &str) -> Option<String> {
    MODULE_DIRECTIVE
        .captures(go_mod)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Directories the `go` command never treats as part of `./...`.
fn is_ignored_by_go_tool(entry: &ignore::DirEntry) -> bool {
    if !entry.file_type().is_some_and(|t| t.is_dir()) {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name == "vendor" || name == "testdata" || name.starts_with('.') || name.starts_with('_')
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn relative_display_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}
