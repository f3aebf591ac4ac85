//! Error types for DTD parsing and graph construction

use thiserror::Error;

/// Result type for parser and graph operations
pub type Result<T> = std::result::Result<T, DtdError>;

/// Parser, graph and configuration errors
#[derive(Error, Debug)]
pub enum DtdError {
    #[error("{message}: '{fragment}'")]
    Grammar { message: String, fragment: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Link {0} already has a sibling; sibling chains are append-only")]
    SiblingAlreadySet(usize),

    #[error("Unknown graph node: {0}")]
    UnknownNode(usize),

    #[error("Unknown graph link: {0}")]
    UnknownLink(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config load error: {0}")]
    ConfigLoad(#[from] config_crate::ConfigError),
}

impl DtdError {
    /// Build a grammar error carrying the offending fragment
    pub fn grammar(message: impl Into<String>, fragment: impl Into<String>) -> Self {
        DtdError::Grammar {
            message: message.into(),
            fragment: fragment.into(),
        }
    }

    /// True for malformed declaration syntax
    pub fn is_grammar(&self) -> bool {
        matches!(self, DtdError::Grammar { .. })
    }
}
