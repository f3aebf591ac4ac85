//! Schema Loading
//!
//! Runs scanner, parser and tree builder over a source and returns the
//! finished `SchemaGraph`. A directory is loaded as one schema made of
//! every `*.dtd` file below it, in path order.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::{SchemaGraph, TreeBuilder};
use crate::config::BeansConfig;
use crate::error::Result;
use crate::parse::{DeclParser, Scanner};

/// Configuration for schema loading
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Skip files matching these path prefixes
    pub skip_prefixes: Vec<String>,
    /// Only load files matching these path prefixes
    pub include_prefixes: Vec<String>,
    /// File extension of schema files
    pub extension: String,
    pub beans: BeansConfig,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: vec![
                "target/".to_string(),
                ".git/".to_string(),
                "node_modules/".to_string(),
            ],
            include_prefixes: Vec::new(),
            extension: "dtd".to_string(),
            beans: BeansConfig::default(),
        }
    }
}

impl LoadConfig {
    pub fn with_beans(beans: BeansConfig) -> Self {
        Self {
            beans,
            ..Self::default()
        }
    }

    fn accepts(&self, relative: &str) -> bool {
        if !self.include_prefixes.is_empty()
            && !self.include_prefixes.iter().any(|p| relative.starts_with(p))
        {
            return false;
        }
        !self.skip_prefixes.iter().any(|p| relative.starts_with(p))
    }
}

/// Parse a schema from any reader
pub fn load_from_reader<R: Read>(source: R, config: &LoadConfig) -> Result<SchemaGraph> {
    let builder = TreeBuilder::new().with_config(&config.beans);
    let mut parser = DeclParser::new(Scanner::new(source), builder).with_config(&config.beans);
    parser.parse()?;

    let digest = parser.digest();
    let parse_diagnostics = parser.take_diagnostics();
    let mut graph = parser.into_handler().finish();
    graph.source_digest = digest;
    graph.diagnostics.merge(parse_diagnostics);
    Ok(graph)
}

pub fn load_from_str(text: &str, config: &LoadConfig) -> Result<SchemaGraph> {
    load_from_reader(text.as_bytes(), config)
}

/// Parse one schema file. A missing file is an `Io` error.
pub fn load_from_file(path: &Path, config: &LoadConfig) -> Result<SchemaGraph> {
    let file = fs::File::open(path)?;
    let mut config = config.clone();
    if config.beans.source.filename.is_none() {
        config.beans.source.filename = Some(path.display().to_string());
    }
    load_from_reader(file, &config)
}

/// Schema files below a directory, sorted by path
pub fn collect_schema_files(schema_dir: &Path, config: &LoadConfig) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(schema_dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().map(|e| e != config.extension.as_str()).unwrap_or(true) {
            continue;
        }

        let relative = path.strip_prefix(schema_dir)?.to_string_lossy().replace('\\', "/");
        if !config.accepts(&relative) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// Load every schema file below a directory as a single schema
pub fn load_from_directory(schema_dir: &Path, config: &LoadConfig) -> anyhow::Result<SchemaGraph> {
    let files = collect_schema_files(schema_dir, config)?;
    if files.is_empty() {
        anyhow::bail!(
            "no .{} files found in {}",
            config.extension,
            schema_dir.display()
        );
    }

    let mut text = String::new();
    for path in &files {
        let content = fs::read_to_string(path)?;
        text.push_str(&content);
        text.push('\n');
    }
    debug!(files = files.len(), bytes = text.len(), dir = %schema_dir.display(), "loading schema directory");

    let mut config = config.clone();
    if config.beans.source.filename.is_none() {
        config.beans.source.filename = Some(schema_dir.display().to_string());
    }
    Ok(load_from_str(&text, &config)?)
}
