//! Tree Builder
//!
//! Turns parser events into a `SchemaGraph`. One `<!ELEMENT>` becomes a
//! created node whose `link` chain holds its content model; every element
//! reference becomes a `GraphLink`. `<!ATTLIST>` bodies become `AttrProp`s
//! on the owning node.

use tracing::{debug, warn};

use super::{
    AttrProp, AttrType, Cardinality, Combinator, DefaultMode, DiagnosticCode, LinkId, NodeId,
    SchemaGraph,
};
use crate::config::BeansConfig;
use crate::error::{DtdError, Result};
use crate::parse::{DocDefHandler, ElementKind, HandlerSignal};

/// Where the next attribute word goes
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrStage {
    Type,
    /// After `NOTATION`, waiting for its name group
    NotationGroup,
    /// Inside the enumeration or notation group
    InGroup,
    Default,
    /// After `#FIXED`
    FixedValue,
    /// Inside a quoted value spread over several words
    Quoted { quote: char, mode: DefaultMode, text: String },
    Done,
}

#[derive(Debug)]
struct AttrBuilder {
    attr: AttrProp,
    stage: AttrStage,
}

impl AttrBuilder {
    fn new(element: &str, name: &str) -> Self {
        Self {
            attr: AttrProp::new(element, name),
            stage: AttrStage::Type,
        }
    }

    fn is_complete(&self) -> bool {
        self.stage == AttrStage::Done
    }

    fn word(&mut self, word: &str) {
        let stage = std::mem::replace(&mut self.stage, AttrStage::Done);
        self.stage = match stage {
            AttrStage::Type if word == "NOTATION" => {
                self.attr.attr_type = AttrType::Notation;
                AttrStage::NotationGroup
            }
            AttrStage::Type => {
                self.attr.attr_type = AttrType::parse(word);
                AttrStage::Default
            }
            AttrStage::InGroup => {
                self.attr.values.push(word.to_string());
                AttrStage::InGroup
            }
            AttrStage::Default => match word {
                "#REQUIRED" => {
                    self.attr.default_mode = DefaultMode::Required;
                    AttrStage::Done
                }
                "#IMPLIED" => {
                    self.attr.default_mode = DefaultMode::Implied;
                    AttrStage::Done
                }
                "#FIXED" => {
                    self.attr.default_mode = DefaultMode::Fixed;
                    AttrStage::FixedValue
                }
                literal => self.literal(literal, DefaultMode::Value),
            },
            AttrStage::FixedValue => self.literal(word, DefaultMode::Fixed),
            AttrStage::Quoted { quote, mode, mut text } => {
                text.push(' ');
                text.push_str(word);
                self.quoted(quote, mode, text)
            }
            // Unexpected words are ignored
            other => other,
        };
    }

    fn literal(&mut self, word: &str, mode: DefaultMode) -> AttrStage {
        self.attr.default_mode = mode;
        match word.chars().next() {
            Some(q @ ('"' | '\'')) => self.quoted(q, mode, word[1..].to_string()),
            _ => {
                self.attr.default_value = Some(word.to_string());
                AttrStage::Done
            }
        }
    }

    fn quoted(&mut self, quote: char, mode: DefaultMode, mut text: String) -> AttrStage {
        if text.ends_with(quote) {
            text.pop();
            self.attr.default_value = Some(text);
            AttrStage::Done
        } else {
            AttrStage::Quoted { quote, mode, text }
        }
    }

    /// False when no group is expected at this point
    fn start_group(&mut self) -> bool {
        match self.stage {
            AttrStage::Type => {
                self.attr.attr_type = AttrType::Enumeration;
                self.stage = AttrStage::InGroup;
                true
            }
            AttrStage::NotationGroup => {
                self.stage = AttrStage::InGroup;
                true
            }
            _ => false,
        }
    }

    fn end_group(&mut self) {
        if self.stage == AttrStage::InGroup {
            self.stage = AttrStage::Default;
        }
    }
}

/// Declaration currently being read
#[derive(Debug)]
enum Context {
    Element {
        node: NodeId,
        /// Last link of the top-level chain
        last_top: Option<LinkId>,
        groups: Vec<LinkId>,
    },
    Attlist {
        node: NodeId,
        element: String,
        pending: Option<AttrBuilder>,
    },
}

pub struct TreeBuilder {
    graph: SchemaGraph,
    context: Option<Context>,
    doc_root: Option<String>,
    source_name: String,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            graph: SchemaGraph::new(),
            context: None,
            doc_root: None,
            source_name: crate::config::DEFAULT_SOURCE_NAME.to_string(),
        }
    }

    pub fn with_config(mut self, config: &BeansConfig) -> Self {
        self.doc_root = config.source.doc_root.clone();
        self.source_name = config.source_name().to_string();
        self
    }

    /// The graph built so far
    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    /// Pick the root and hand over the graph
    pub fn finish(mut self) -> SchemaGraph {
        if self.context.is_some() {
            // Input ended mid-declaration; keep what was read
            self.close_context();
        }

        let configured = self.doc_root.as_deref().and_then(|name| {
            let found = self
                .graph
                .node_by_name(name)
                .filter(|&n| self.graph.resolved(n).is_created());
            if found.is_none() {
                warn!(root = name, "configured document root is not a declared element");
                self.graph.diagnostics.report(
                    name,
                    DiagnosticCode::UnknownRoot,
                    format!("document root '{}' is not declared", name),
                );
            }
            found
        });

        let root = configured
            .or_else(|| {
                self.graph
                    .declared
                    .iter()
                    .copied()
                    .find(|&n| self.graph.ref_count(n) == 0)
            })
            .or_else(|| self.graph.declared.first().copied());
        self.graph.root = root;

        for n in self.graph.undefined_nodes() {
            let name = self.graph.node(n).name().to_string();
            self.graph.diagnostics.report(
                &name,
                DiagnosticCode::UndefinedElement,
                format!("'{}' is referenced but never declared", name),
            );
        }

        debug!(
            nodes = self.graph.node_count(),
            links = self.graph.link_count(),
            declared = self.graph.declared.len(),
            root = ?root.map(|n| self.graph.node(n).name().to_string()),
            "schema graph built"
        );

        self.graph
    }

    fn attach(&mut self, link: LinkId) -> Result<()> {
        let Some(Context::Element { node, last_top, groups }) = self.context.as_mut() else {
            return Ok(());
        };
        if let Some(&group) = groups.last() {
            return self.graph.append_child(group, link);
        }
        match *last_top {
            Some(last) => self.graph.add_sibling(last, link)?,
            None => self.graph.set_node_link(*node, Some(link)),
        }
        *last_top = Some(link);
        Ok(())
    }

    fn close_context(&mut self) {
        if let Some(Context::Attlist { node, element, pending }) = self.context.take() {
            if let Some(builder) = pending {
                if !builder.is_complete() {
                    warn!(element = %element, attribute = %builder.attr.name, "incomplete attribute declaration");
                    self.graph.diagnostics.report(
                        &self.source_name,
                        DiagnosticCode::IncompleteAttribute,
                        format!("attribute '{}' of '{}' is incomplete", builder.attr.name, element),
                    );
                }
                self.graph.add_attribute(node, builder.attr);
            }
        }
    }
}

impl DocDefHandler for TreeBuilder {
    fn start_element(&mut self, name: &str, _schema_name: &str, kind: ElementKind) -> Result<()> {
        self.close_context();
        let node = self.graph.get_or_create_node(name);

        self.context = Some(match kind {
            ElementKind::Element => {
                if self.graph.resolved(node).is_created() {
                    return Err(DtdError::grammar("duplicate element declaration", name));
                }
                self.graph.set_created(node, true);
                self.graph.declared.push(node);
                Context::Element {
                    node,
                    last_top: None,
                    groups: Vec::new(),
                }
            }
            ElementKind::Attlist => Context::Attlist {
                node,
                element: name.to_string(),
                pending: None,
            },
        });
        Ok(())
    }

    fn end_element(&mut self) -> Result<()> {
        self.close_context();
        Ok(())
    }

    fn element(
        &mut self,
        name: &str,
        schema_name: &str,
        cardinality: Cardinality,
    ) -> Result<HandlerSignal> {
        match self.context.as_mut() {
            Some(Context::Element { .. }) => {
                let node = self.graph.get_or_create_node(name);
                self.graph.inc_ref_count(node);
                let link = self.graph.new_link(Some(node));
                {
                    let l = self.graph.link_mut(link);
                    l.schema_name = Some(schema_name.to_string());
                    l.element_cardinality = cardinality;
                }
                self.attach(link)?;
            }
            Some(Context::Attlist { node, element, pending }) => {
                if pending.as_ref().map_or(false, AttrBuilder::is_complete) {
                    // A finished attribute followed by a new word: the
                    // parser reopens the list and delivers the word again.
                    let element = element.clone();
                    let node = *node;
                    if let Some(done) = pending.take() {
                        self.graph.add_attribute(node, done.attr);
                    }
                    self.context = None;
                    return Ok(HandlerSignal::ReopenAttlist(element));
                }
                // Attribute words are not element references; keep `?+*`
                let raw = format!("{}{}", name, cardinality.suffix());
                match pending.as_mut() {
                    Some(builder) => builder.word(&raw),
                    None => *pending = Some(AttrBuilder::new(element, &raw)),
                }
            }
            None => {
                return Err(DtdError::grammar("element reference outside a declaration", name));
            }
        }
        Ok(HandlerSignal::Continue)
    }

    fn start_group_elements(&mut self) -> Result<()> {
        match self.context.as_mut() {
            Some(Context::Element { .. }) => {
                let group = self.graph.new_link(None);
                self.attach(group)?;
                if let Some(Context::Element { groups, .. }) = self.context.as_mut() {
                    groups.push(group);
                }
            }
            Some(Context::Attlist { element, pending, .. }) => {
                let accepted = pending.as_mut().map_or(false, AttrBuilder::start_group);
                if !accepted {
                    let attribute = pending
                        .as_ref()
                        .map(|b| b.attr.name.clone())
                        .unwrap_or_default();
                    warn!(element = %element, attribute = %attribute, "unexpected group in attribute list");
                    let message = format!(
                        "ignoring '(' after attribute '{}' of '{}'",
                        attribute, element
                    );
                    self.graph.diagnostics.report(
                        &self.source_name,
                        DiagnosticCode::StrayAttributeGroup,
                        message,
                    );
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn end_group_elements(&mut self, cardinality: Cardinality) -> Result<()> {
        match self.context.as_mut() {
            Some(Context::Element { groups, .. }) => {
                let group = groups
                    .pop()
                    .ok_or_else(|| DtdError::grammar("group closed before it was opened", ")"))?;
                self.graph.link_mut(group).group_cardinality = cardinality;
                let combinator = self.graph.link(group).children_combinator;
                for child in self.graph.children(group) {
                    self.graph.link_mut(child).element_combinator = combinator;
                }
            }
            Some(Context::Attlist { pending: Some(builder), .. }) => builder.end_group(),
            _ => {}
        }
        Ok(())
    }

    fn character(&mut self, c: char) -> Result<()> {
        if c != '|' {
            return Ok(());
        }
        if let Some(Context::Element { groups, .. }) = self.context.as_ref() {
            if let Some(&group) = groups.last() {
                self.graph.link_mut(group).children_combinator = Combinator::Or;
            }
        }
        Ok(())
    }

    fn entity(&mut self, name: &str) -> Result<()> {
        self.graph.entities.push(name.to_string());
        Ok(())
    }
}
