//! Parser event contract
//!
//! `DeclParser` reports the declarations it recognises through a
//! `DocDefHandler`. Events arrive in document order; any `Err` returned by
//! the handler aborts the parse.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::Cardinality;

/// Which declaration opened the current element context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// `<!ELEMENT name ...>`
    Element,
    /// `<!ATTLIST name ...>`
    Attlist,
}

/// Outcome of a leaf `element` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerSignal {
    Continue,
    /// The word belongs to a new attribute of the named element. The parser
    /// reopens the attribute list with `start_element(name, name, Attlist)`
    /// and delivers the same word again.
    ReopenAttlist(String),
}

pub trait DocDefHandler {
    fn start_document(&mut self) -> Result<()> {
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_element(&mut self, name: &str, schema_name: &str, kind: ElementKind) -> Result<()>;

    fn end_element(&mut self) -> Result<()>;

    /// A referenced element (or attribute word) inside a declaration body
    fn element(
        &mut self,
        name: &str,
        schema_name: &str,
        cardinality: Cardinality,
    ) -> Result<HandlerSignal>;

    fn start_group_elements(&mut self) -> Result<()>;

    fn end_group_elements(&mut self, cardinality: Cardinality) -> Result<()>;

    /// Choice separator inside a group
    fn character(&mut self, c: char) -> Result<()>;

    fn comment(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn entity(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }
}

/// Records every event as a line of text. Used by tests and `--trace`
/// style debugging.
#[derive(Debug, Default)]
pub struct EventRecorder {
    pub events: Vec<String>,
    /// Answer `ReopenAttlist` for these words (once each)
    pub reopen_on: Vec<(String, String)>,
}

impl DocDefHandler for EventRecorder {
    fn start_document(&mut self) -> Result<()> {
        self.events.push("startDocument".to_string());
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        self.events.push("endDocument".to_string());
        Ok(())
    }

    fn start_element(&mut self, name: &str, _schema_name: &str, kind: ElementKind) -> Result<()> {
        self.events.push(format!("startElement({}, {:?})", name, kind));
        Ok(())
    }

    fn end_element(&mut self) -> Result<()> {
        self.events.push("endElement".to_string());
        Ok(())
    }

    fn element(
        &mut self,
        name: &str,
        _schema_name: &str,
        cardinality: Cardinality,
    ) -> Result<HandlerSignal> {
        if let Some(pos) = self.reopen_on.iter().position(|(word, _)| word == name) {
            let (_, owner) = self.reopen_on.remove(pos);
            return Ok(HandlerSignal::ReopenAttlist(owner));
        }
        self.events.push(format!("element({}, {})", name, cardinality));
        Ok(HandlerSignal::Continue)
    }

    fn start_group_elements(&mut self) -> Result<()> {
        self.events.push("startGroup".to_string());
        Ok(())
    }

    fn end_group_elements(&mut self, cardinality: Cardinality) -> Result<()> {
        self.events.push(format!("endGroup({})", cardinality));
        Ok(())
    }

    fn character(&mut self, c: char) -> Result<()> {
        self.events.push(format!("character({})", c));
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<()> {
        self.events.push(format!("comment({})", text));
        Ok(())
    }

    fn entity(&mut self, name: &str) -> Result<()> {
        self.events.push(format!("entity({})", name));
        Ok(())
    }
}
