//! DTD declaration parsing
//!
//! `Scanner` feeds characters to `DeclParser`, which reports declarations
//! to a `DocDefHandler`. The graph is built by `graph::TreeBuilder`, one
//! such handler.

pub mod handler;
pub mod parser;
pub mod scanner;

pub use handler::{DocDefHandler, ElementKind, EventRecorder, HandlerSignal};
pub use parser::{DeclParser, ParseState, ParserBuilder};
pub use scanner::Scanner;
