use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use gochunk::chunker::extract_project;
use gochunk::config::{Config, DEFAULT_CONFIG_FILE};
use gochunk::output::{OutputFormat, write_chunks};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gochunk")]
#[command(about = "Extract top-level Go declarations as import-canonicalized chunks", long_about = None)]
#[command(version)]
struct Cli {
    /// Root of the Go project (overrides `project_dir`)
    project_dir: Option<String>,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Output file (overrides `output_path`)
    #[arg(short, long)]
    output: Option<String>,

    /// Output format (overrides `output_format`)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Also extract declarations from `_test.go` files
    #[arg(long)]
    include_tests: bool,

    /// Module path to use instead of the `go.mod` module directive
    #[arg(short, long)]
    module: Option<String>,

    /// Do not honor .gitignore and .ignore files
    #[arg(long)]
    no_gitignore: bool,

    /// Glob pattern of files to leave out, relative to the project root (repeatable)
    #[arg(short, long = "exclude")]
    exclude: Vec<String>,

    /// Save the effective configuration to the config file and exit
    #[arg(long)]
    write_config: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(dir) = self.project_dir {
            config.project_dir = dir;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if let Some(format) = self.format {
            config.output_format = format;
        }
        if self.include_tests {
            config.include_tests = true;
        }
        if let Some(module) = self.module {
            config.module_path = Some(module);
        }
        if self.no_gitignore {
            config.respect_gitignore = false;
        }
        config.exclude_patterns.extend(self.exclude);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone();
    let write_config = cli.write_config;
    let mut config = Config::load(&config_path)?;
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    if write_config {
        config.save(&config_path)?;
        println!("Wrote configuration to {config_path}");
        return Ok(());
    }

    let root = config.project_root();
    info!("Extracting Go declarations from {}", root.display());

    let extraction = extract_project(&root, &config.load_options())
        .with_context(|| format!("failed to extract chunks from {}", root.display()))?;
    if !extraction.diagnostics.is_empty() {
        warn!(
            "{} problems were skipped over; see warnings above",
            extraction.diagnostics.len()
        );
    }

    let output = PathBuf::from(&config.output_path);
    write_chunks(&output, config.output_format, &extraction.chunks)?;

    println!(
        "Successfully extracted {} code chunks to {}",
        extraction.chunks.len(),
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_flags_override_config_and_can_be_saved() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("gochunk.json");
        let path = path.to_str().unwrap();

        let cli = Cli::try_parse_from([
            "gochunk",
            "src/go",
            "--config",
            path,
            "--format",
            "jsonl",
            "-e",
            "gen/**",
            "--write-config",
        ])
        .unwrap();
        assert!(cli.write_config);

        let mut config = Config::load(path).unwrap();
        config.exclude_patterns = vec!["vendor/**".to_string()];
        cli.apply(&mut config);
        config.save(path).unwrap();

        let saved = Config::load(path).unwrap();
        assert_eq!(saved.project_dir, "src/go");
        assert_eq!(saved.output_format, OutputFormat::Jsonl);
        assert_eq!(saved.exclude_patterns, vec!["vendor/**", "gen/**"]);
    }
}
