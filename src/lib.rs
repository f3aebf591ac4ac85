//! DTD Beans
//!
//! Parses DTD declarations into a schema graph and derives bean classes
//! from it.
//!
//! ## Pipeline
//!
//! ```text
//! Scanner ──chars──> DeclParser ──events──> TreeBuilder ──> SchemaGraph
//!                                                              │
//!                                             BeanBuilder <────┘
//!                                                 │
//!                                                 └──> Vec<BeanClass>
//! ```
//!
//! - **parse**: character scanner and the declaration state machine
//! - **graph**: `GraphNode`/`GraphLink` arena, aliases, mutual exclusion,
//!   path lookup and exports
//! - **beans**: class names, value types and properties per element
//! - **config**: layered configuration (file, XDG dir, environment)

pub mod beans;
pub mod config;
pub mod error;
pub mod graph;
pub mod parse;

pub use beans::{bind_links, AccessorShape, BeanBuilder, BeanClass, BeanElement, BeanType, Property};
pub use config::BeansConfig;
pub use error::{DtdError, Result};
pub use graph::{
    load_from_directory, load_from_file, load_from_reader, load_from_str, AttrProp, Cardinality,
    Combinator, DiagnosticCode, Diagnostics, GraphLink, GraphNode, LinkId, LoadConfig, NodeId,
    SchemaGraph, TreeBuilder,
};
pub use parse::{DeclParser, DocDefHandler, Scanner};
