use tree_sitter::Language;

/// Grammar handle and the queries the front end runs against Go files.
pub struct LanguageConfig {
    pub name: &'static str,
    pub language: Language,
    pub extensions: &'static [&'static str],
    pub package_query: &'static str,
    pub import_query: &'static str,
}

impl LanguageConfig {
    pub fn go() -> LanguageConfig {
        LanguageConfig {
            name: "go",
            language: tree_sitter_go::LANGUAGE.into(),
            extensions: &["go"],
            package_query: r#"
(package_clause
  (package_identifier) @package)
"#,
            import_query: r#"
(import_spec
  path: (_) @path) @import
"#,
        }
    }

    /// Whether `ext` (without the leading dot) belongs to this language.
    pub fn handles_extension(&self, ext: &str) -> bool {
        self.extensions.contains(&ext)
    }
}
