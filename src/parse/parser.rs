//! Declaration Parser
//!
//! Single-pass, character-driven automaton over `<!ELEMENT>`, `<!ATTLIST>`,
//! `<!ENTITY>`, comments and processing instructions. Characters are
//! collected into words; a word is classified when a separator flushes it,
//! and the classification depends on the current `ParseState`.
//!
//! Group structure is reported through `start_group_elements` /
//! `end_group_elements`, choices through `character('|')`. Only one
//! character of lookahead is ever needed (`<!`, `<?` and the cardinality
//! suffix after `)`).

use std::fmt;
use std::io::Read;

use tracing::{trace, warn};

use super::handler::{DocDefHandler, ElementKind, HandlerSignal};
use super::scanner::Scanner;
use crate::config::BeansConfig;
use crate::error::{DtdError, Result};
use crate::graph::{Cardinality, DiagnosticCode, Diagnostics};

/// Where the automaton currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    NoContext,
    /// After `<!`, waiting for the declaration keyword
    CheckBang,
    InComment,
    ElementNameExpected,
    InElementBody,
    AttlistNameExpected,
    InAttlistBody,
    ProcessingInstruction,
    EntityNameExpected,
    InEntity,
}

impl ParseState {
    fn in_body(self) -> bool {
        matches!(self, ParseState::InElementBody | ParseState::InAttlistBody)
    }
}

impl fmt::Display for ParseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseState::NoContext => "no context",
            ParseState::CheckBang => "declaration keyword",
            ParseState::InComment => "comment",
            ParseState::ElementNameExpected => "ELEMENT name",
            ParseState::InElementBody => "ELEMENT body",
            ParseState::AttlistNameExpected => "ATTLIST name",
            ParseState::InAttlistBody => "ATTLIST body",
            ParseState::ProcessingInstruction => "processing instruction",
            ParseState::EntityNameExpected => "ENTITY name",
            ParseState::InEntity => "ENTITY body",
        };
        f.write_str(s)
    }
}

pub struct DeclParser<R, H> {
    scanner: Scanner<R>,
    handler: H,
    state: ParseState,
    /// Pending word
    word: String,
    /// Open `(` count in the current declaration
    depth: usize,
    /// Previous character inside a processing instruction
    pi_prev: Option<char>,
    entities: Vec<String>,
    diagnostics: Diagnostics,
    source_name: String,
    trace: bool,
}

impl<R: Read, H: DocDefHandler> DeclParser<R, H> {
    pub fn new(scanner: Scanner<R>, handler: H) -> Self {
        Self {
            scanner,
            handler,
            state: ParseState::NoContext,
            word: String::new(),
            depth: 0,
            pi_prev: None,
            entities: Vec::new(),
            diagnostics: Diagnostics::new(),
            source_name: String::from("<input>"),
            trace: false,
        }
    }

    /// Start a builder that checks for a source and a handler before parsing
    pub fn builder() -> ParserBuilder<R, H> {
        ParserBuilder::default()
    }

    /// Take diagnostics naming and tracing from the configuration
    pub fn with_config(mut self, config: &BeansConfig) -> Self {
        self.source_name = config.source_name().to_string();
        self.trace = config.trace.parse;
        self
    }

    /// Run the automaton to the end of the input
    pub fn parse(&mut self) -> Result<()> {
        self.handler.start_document()?;

        while let Some(c) = self.scanner.next()? {
            self.step(c)?;
        }

        if self.state != ParseState::NoContext {
            warn!(
                source = %self.source_name,
                state = %self.state,
                "unexpected end of input inside a declaration"
            );
            self.diagnostics.report(
                &self.source_name,
                DiagnosticCode::UnexpectedEndOfInput,
                format!("end of input reached inside {}", self.state),
            );
        }

        self.handler.end_document()
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Names of every `<!ENTITY>` seen so far
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    /// SHA-256 of the consumed source
    pub fn digest(&self) -> String {
        self.scanner.digest()
    }

    fn step(&mut self, c: char) -> Result<()> {
        match self.state {
            ParseState::ProcessingInstruction => {
                if c == '>' && self.pi_prev == Some('?') {
                    self.state = ParseState::NoContext;
                    self.pi_prev = None;
                } else {
                    self.pi_prev = Some(c);
                }
                return Ok(());
            }
            ParseState::InEntity => {
                if c == '>' {
                    self.state = ParseState::NoContext;
                    self.word.clear();
                }
                return Ok(());
            }
            ParseState::InComment => {
                if c.is_whitespace() {
                    self.flush()?;
                } else if c == '>' {
                    self.close_angle()?;
                } else {
                    self.word.push(c);
                }
                return Ok(());
            }
            _ => {}
        }

        match c {
            '<' => self.open_angle(),
            '>' => self.close_angle(),
            '(' => {
                self.flush()?;
                if self.state.in_body() {
                    self.trace_event("startGroupElements");
                    self.depth += 1;
                    self.handler.start_group_elements()?;
                }
                Ok(())
            }
            ')' => {
                self.flush()?;
                if self.state.in_body() {
                    let cardinality = self.read_group_cardinality()?;
                    if self.depth == 0 {
                        return Err(DtdError::grammar("unbalanced ')'", ")"));
                    }
                    self.depth -= 1;
                    self.trace_event(format_args!("endGroupElements({})", cardinality));
                    self.handler.end_group_elements(cardinality)?;
                }
                Ok(())
            }
            '|' if self.state.in_body() => {
                self.flush()?;
                self.trace_event("character(|)");
                self.handler.character('|')
            }
            ',' => self.flush(),
            c if c.is_whitespace() => self.flush(),
            c => {
                self.word.push(c);
                if self.state == ParseState::CheckBang && self.word == "--" {
                    // Only the leading "--" is stripped; everything after it is comment text.
                    self.word.clear();
                    self.state = ParseState::InComment;
                }
                Ok(())
            }
        }
    }

    fn open_angle(&mut self) -> Result<()> {
        match self.scanner.peek()? {
            Some('!') => {
                self.scanner.next()?;
                if self.state != ParseState::NoContext {
                    return Err(DtdError::grammar(
                        format!("nested declaration inside {}", self.state),
                        "<!",
                    ));
                }
                self.word.clear();
                self.state = ParseState::CheckBang;
            }
            Some('?') if self.state == ParseState::NoContext => {
                self.scanner.next()?;
                self.word.clear();
                self.pi_prev = None;
                self.state = ParseState::ProcessingInstruction;
            }
            _ => {
                self.word.push('<');
                if let Some(next) = self.scanner.next()? {
                    self.word.push(next);
                }
            }
        }
        Ok(())
    }

    fn close_angle(&mut self) -> Result<()> {
        match self.state {
            ParseState::InComment => {
                if self.word.ends_with("--") {
                    let len = self.word.len() - 2;
                    self.word.truncate(len);
                    self.flush()?;
                    self.state = ParseState::NoContext;
                } else {
                    self.word.push('>');
                }
                Ok(())
            }
            ParseState::NoContext => {
                let fragment = format!("{}>", std::mem::take(&mut self.word));
                Err(DtdError::grammar(
                    "missing declaration opening before '>'",
                    fragment,
                ))
            }
            ParseState::EntityNameExpected | ParseState::InEntity => {
                self.flush()?;
                self.word.clear();
                self.state = ParseState::NoContext;
                Ok(())
            }
            _ => {
                self.flush()?;
                match self.state {
                    ParseState::CheckBang => {
                        return Err(DtdError::grammar("unknown declaration sequence", "<!>"));
                    }
                    ParseState::ElementNameExpected | ParseState::AttlistNameExpected => {
                        return Err(DtdError::grammar(
                            format!("missing name in {} declaration", self.state),
                            ">",
                        ));
                    }
                    _ => {}
                }
                if self.depth != 0 {
                    return Err(DtdError::grammar(
                        format!("{} unclosed group(s) at end of declaration", self.depth),
                        ">",
                    ));
                }
                self.trace_event("endElement");
                self.handler.end_element()?;
                self.state = ParseState::NoContext;
                Ok(())
            }
        }
    }

    /// The character right after `)`; whitespace is not skipped
    fn read_group_cardinality(&mut self) -> Result<Cardinality> {
        let suffix = self.scanner.peek()?.and_then(Cardinality::from_suffix);
        match suffix {
            Some(cardinality) => {
                self.scanner.next()?;
                Ok(cardinality)
            }
            None => Ok(Cardinality::ExactlyOne),
        }
    }

    fn flush(&mut self) -> Result<()> {
        if self.word.is_empty() {
            return Ok(());
        }
        let word = std::mem::take(&mut self.word);
        self.classify(&word)
    }

    fn classify(&mut self, word: &str) -> Result<()> {
        match self.state {
            ParseState::NoContext => {
                trace!(word, "ignoring text outside declarations");
                Ok(())
            }
            ParseState::CheckBang => {
                self.state = match word {
                    "ELEMENT" => ParseState::ElementNameExpected,
                    "ATTLIST" => ParseState::AttlistNameExpected,
                    "ENTITY" => ParseState::EntityNameExpected,
                    _ => {
                        return Err(DtdError::grammar("unknown declaration sequence", word));
                    }
                };
                self.depth = 0;
                Ok(())
            }
            ParseState::InComment => {
                self.trace_event(format_args!("comment({})", word));
                self.handler.comment(word)
            }
            ParseState::ElementNameExpected => {
                self.trace_event(format_args!("startElement({}, ELEMENT)", word));
                self.state = ParseState::InElementBody;
                self.handler.start_element(word, word, ElementKind::Element)
            }
            ParseState::AttlistNameExpected => {
                self.trace_event(format_args!("startElement({}, ATTLIST)", word));
                self.state = ParseState::InAttlistBody;
                self.handler.start_element(word, word, ElementKind::Attlist)
            }
            ParseState::InElementBody | ParseState::InAttlistBody => {
                let (name, cardinality) = Cardinality::split_suffix(word);
                if name.is_empty() {
                    warn!(word, "cardinality suffix without an element name");
                    self.diagnostics.report(
                        &self.source_name,
                        DiagnosticCode::StrayCardinality,
                        format!("ignoring '{}' with no element name", word),
                    );
                    return Ok(());
                }
                self.leaf(name, cardinality)
            }
            ParseState::EntityNameExpected => {
                if word == "%" {
                    return Ok(());
                }
                self.trace_event(format_args!("entity({})", word));
                self.entities.push(word.to_string());
                self.state = ParseState::InEntity;
                self.handler.entity(word)
            }
            ParseState::InEntity | ParseState::ProcessingInstruction => Ok(()),
        }
    }

    fn leaf(&mut self, name: &str, cardinality: Cardinality) -> Result<()> {
        self.trace_event(format_args!("element({}, {})", name, cardinality));
        if let HandlerSignal::ReopenAttlist(owner) = self.handler.element(name, name, cardinality)? {
            self.trace_event(format_args!("startElement({}, ATTLIST) (reopened)", owner));
            self.handler.start_element(&owner, &owner, ElementKind::Attlist)?;
            if let HandlerSignal::ReopenAttlist(again) =
                self.handler.element(name, name, cardinality)?
            {
                return Err(DtdError::grammar(
                    format!("attribute list of '{}' could not be reopened", again),
                    name,
                ));
            }
        }
        Ok(())
    }

    fn trace_event<D: fmt::Display>(&self, event: D) {
        if self.trace {
            trace!(source = %self.source_name, "{}", event);
        }
    }
}

/// Collects the parser inputs and rejects missing ones before any parsing
pub struct ParserBuilder<R, H> {
    source: Option<R>,
    handler: Option<H>,
    config: BeansConfig,
}

impl<R, H> Default for ParserBuilder<R, H> {
    fn default() -> Self {
        Self {
            source: None,
            handler: None,
            config: BeansConfig::default(),
        }
    }
}

impl<R: Read, H: DocDefHandler> ParserBuilder<R, H> {
    pub fn source(mut self, source: R) -> Self {
        self.source = Some(source);
        self
    }

    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn config(mut self, config: BeansConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<DeclParser<R, H>> {
        let source = self
            .source
            .ok_or_else(|| DtdError::Config("no schema source provided".to_string()))?;
        let handler = self
            .handler
            .ok_or_else(|| DtdError::Config("no declaration handler registered".to_string()))?;
        Ok(DeclParser::new(Scanner::new(source), handler).with_config(&self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::handler::EventRecorder;

    fn events(text: &str) -> Vec<String> {
        let mut parser = DeclParser::new(Scanner::from_str(text), EventRecorder::default());
        parser.parse().unwrap();
        parser.into_handler().events
    }

    fn body(text: &str) -> Vec<String> {
        let mut all = events(text);
        assert_eq!(all.remove(0), "startDocument");
        assert_eq!(all.pop().as_deref(), Some("endDocument"));
        all
    }

    #[test]
    fn test_sequence_with_suffixes() {
        assert_eq!(
            body("<!ELEMENT x (a, b?, c+)>"),
            vec![
                "startElement(x, Element)",
                "startGroup",
                "element(a, 1)",
                "element(b, ?)",
                "element(c, +)",
                "endGroup(1)",
                "endElement",
            ]
        );
    }

    #[test]
    fn test_choice_separators() {
        let ev = body("<!ELEMENT x (a | b | c)>");
        assert_eq!(ev.iter().filter(|e| *e == "character(|)").count(), 2);
        assert_eq!(
            ev,
            vec![
                "startElement(x, Element)",
                "startGroup",
                "element(a, 1)",
                "character(|)",
                "element(b, 1)",
                "character(|)",
                "element(c, 1)",
                "endGroup(1)",
                "endElement",
            ]
        );
    }

    #[test]
    fn test_group_suffix_read_once() {
        let ev = body("<!ELEMENT x (a, b)+ >");
        assert_eq!(ev.iter().filter(|e| e.starts_with("endGroup")).count(), 1);
        assert!(ev.contains(&"endGroup(+)".to_string()));
        assert_eq!(ev.last().map(String::as_str), Some("endElement"));
    }

    #[test]
    fn test_group_suffix_requires_adjacency() {
        // "(a) *" leaves the star as a stray word
        let mut parser = DeclParser::new(
            Scanner::from_str("<!ELEMENT x (a) *>"),
            EventRecorder::default(),
        );
        parser.parse().unwrap();
        assert!(parser.handler().events.contains(&"endGroup(1)".to_string()));
        assert_eq!(parser.diagnostics().warning_count(), 1);
    }

    #[test]
    fn test_nested_groups() {
        assert_eq!(
            body("<!ELEMENT x ((a|b)*, c)>"),
            vec![
                "startElement(x, Element)",
                "startGroup",
                "startGroup",
                "element(a, 1)",
                "character(|)",
                "element(b, 1)",
                "endGroup(*)",
                "element(c, 1)",
                "endGroup(1)",
                "endElement",
            ]
        );
    }

    #[test]
    fn test_comment_strips_leading_dashes_once() {
        assert_eq!(body("<!-- hello world -->"), vec!["comment(hello)", "comment(world)"]);
        assert_eq!(body("<!--tight-->"), vec!["comment(tight)"]);
        assert_eq!(body("<!-- a - b -->"), vec!["comment(a)", "comment(-)", "comment(b)"]);
    }

    #[test]
    fn test_comment_lone_dash_does_not_close() {
        assert_eq!(
            body("<!-- a -> b --><!ELEMENT e EMPTY>"),
            vec![
                "comment(a)",
                "comment(->)",
                "comment(b)",
                "startElement(e, Element)",
                "element(EMPTY, 1)",
                "endElement",
            ]
        );
    }

    #[test]
    fn test_comment_may_contain_markup() {
        assert_eq!(body("<!-- <!ELEMENT (x|y) -->"), vec![
            "comment(<!ELEMENT)",
            "comment((x|y))",
        ]);
    }

    #[test]
    fn test_processing_instruction_ignored() {
        assert_eq!(
            body("<?xml version=\"1.0\"?><!ELEMENT a EMPTY>"),
            vec!["startElement(a, Element)", "element(EMPTY, 1)", "endElement"]
        );
    }

    #[test]
    fn test_entity_name_captured_and_body_ignored() {
        let mut parser = DeclParser::new(
            Scanner::from_str("<!ENTITY % common \"(a|b)\"><!ENTITY copy \"c\">"),
            EventRecorder::default(),
        );
        parser.parse().unwrap();
        assert_eq!(parser.entities(), &["common".to_string(), "copy".to_string()]);
        let ev = &parser.handler().events;
        assert!(!ev.iter().any(|e| e.starts_with("startGroup")));
    }

    #[test]
    fn test_attlist_words() {
        assert_eq!(
            body("<!ATTLIST item id ID #REQUIRED kind (a|b) \"a\">"),
            vec![
                "startElement(item, Attlist)",
                "element(id, 1)",
                "element(ID, 1)",
                "element(#REQUIRED, 1)",
                "element(kind, 1)",
                "startGroup",
                "element(a, 1)",
                "character(|)",
                "element(b, 1)",
                "endGroup(1)",
                "element(\"a\", 1)",
                "endElement",
            ]
        );
    }

    #[test]
    fn test_reopen_attlist_signal() {
        let recorder = EventRecorder {
            events: Vec::new(),
            reopen_on: vec![("size".to_string(), "item".to_string())],
        };
        let mut parser = DeclParser::new(
            Scanner::from_str("<!ATTLIST item id CDATA #IMPLIED size CDATA #IMPLIED>"),
            recorder,
        );
        parser.parse().unwrap();
        let ev = parser.into_handler().events;
        let pos = ev.iter().position(|e| e == "element(size, 1)").unwrap();
        assert_eq!(ev[pos - 1], "startElement(item, Attlist)");
        assert_eq!(ev.iter().filter(|e| e.starts_with("startElement")).count(), 2);
    }

    #[test]
    fn test_pipe_outside_group_is_text() {
        assert_eq!(body("a|b <!ELEMENT x ANY>"), vec![
            "startElement(x, Element)",
            "element(ANY, 1)",
            "endElement",
        ]);
    }

    #[test]
    fn test_literal_angle_fragment() {
        assert_eq!(
            body("<!ELEMENT x <y>"),
            vec!["startElement(x, Element)", "element(<y, 1)", "endElement"]
        );
    }

    #[test]
    fn test_unknown_declaration_is_error() {
        let mut parser = DeclParser::new(
            Scanner::from_str("<!DOCTYPE x>"),
            EventRecorder::default(),
        );
        match parser.parse() {
            Err(DtdError::Grammar { fragment, .. }) => assert_eq!(fragment, "DOCTYPE"),
            other => panic!("expected grammar error, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_bang_is_error() {
        let mut parser = DeclParser::new(
            Scanner::from_str("<!ELEMENT x <!ELEMENT y>"),
            EventRecorder::default(),
        );
        assert!(parser.parse().unwrap_err().is_grammar());
    }

    #[test]
    fn test_unbalanced_close_is_error() {
        let mut parser = DeclParser::new(Scanner::from_str("x>"), EventRecorder::default());
        match parser.parse() {
            Err(DtdError::Grammar { fragment, .. }) => assert_eq!(fragment, "x>"),
            other => panic!("expected grammar error, got {:?}", other),
        }
    }

    #[test]
    fn test_eof_inside_declaration_is_warning() {
        let mut parser = DeclParser::new(
            Scanner::from_str("<!ELEMENT x (a, b"),
            EventRecorder::default(),
        );
        parser.parse().unwrap();
        assert_eq!(parser.state(), ParseState::InElementBody);
        assert_eq!(parser.diagnostics().warning_count(), 1);
        assert_eq!(
            parser.handler().events.last().map(String::as_str),
            Some("endDocument")
        );
    }

    #[test]
    fn test_builder_requires_source_and_handler() {
        let missing_source = DeclParser::<&[u8], EventRecorder>::builder()
            .handler(EventRecorder::default())
            .build();
        assert!(matches!(missing_source, Err(DtdError::Config(_))));

        let missing_handler = DeclParser::<&[u8], EventRecorder>::builder()
            .source("<!ELEMENT a EMPTY>".as_bytes())
            .build();
        assert!(matches!(missing_handler, Err(DtdError::Config(_))));
    }
}
