//! Configuration for parsing and bean generation
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (dtd-beans.toml)
//! - Environment variables (DTD_BEANS__*)
//!
//! ## Example config file (dtd-beans.toml):
//! ```toml
//! [source]
//! filename = "purchase-order.dtd"
//! doc_root = "bill"
//!
//! [trace]
//! parse = false
//! gen = false
//!
//! [generation]
//! attributes_as_properties = true
//! package = "com.example.po"
//! reserved_names = ["Order"]
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Name used in diagnostics when no filename is configured
pub const DEFAULT_SOURCE_NAME: &str = "<input>";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeansConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub trace: TraceConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Where the schema comes from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source identifier used in diagnostics
    #[serde(default)]
    pub filename: Option<String>,

    /// Element to use as the document root
    #[serde(default)]
    pub doc_root: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Log every parser event at trace level
    #[serde(default)]
    pub parse: bool,

    /// Log every materialized property at trace level
    #[serde(default)]
    pub gen: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Expose attributes of leaf elements as `<property>_<attr>` properties
    #[serde(default = "default_true")]
    pub attributes_as_properties: bool,

    /// Package (or namespace) of the generated classes
    #[serde(default)]
    pub package: Option<String>,

    /// Class names to avoid, on top of the built-in list
    #[serde(default)]
    pub reserved_names: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            attributes_as_properties: true,
            package: None,
            reserved_names: Vec::new(),
        }
    }
}

impl BeansConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = ["dtd-beans.toml", ".dtd-beans.toml", "config/dtd-beans.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(xdg_config) = Self::user_config_file() {
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // DTD_BEANS__SOURCE__DOC_ROOT=bill
        builder = builder.add_source(
            Environment::with_prefix("DTD_BEANS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// `dtd-beans.toml` in the per-user config directory
    pub fn user_config_file() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "dtd-beans")
            .map(|dirs| dirs.config_dir().join("dtd-beans.toml"))
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Source identifier for diagnostics
    pub fn source_name(&self) -> &str {
        self.source.filename.as_deref().unwrap_or(DEFAULT_SOURCE_NAME)
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.source.filename = Some(filename.into());
        self
    }

    pub fn with_doc_root(mut self, root: impl Into<String>) -> Self {
        self.source.doc_root = Some(root.into());
        self
    }
}
