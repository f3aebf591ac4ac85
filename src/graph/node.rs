//! Graph Nodes
//!
//! One `GraphNode` per distinct element name. Nodes are created the first
//! time a name is seen and flagged `created` once their own `<!ELEMENT>` is
//! read; a node that is never declared stands for an external type.
//!
//! A node may alias another, structurally equivalent node. The graph
//! accessors below resolve the alias chain first, so every read and write
//! lands on the canonical node. Reference counts are the exception: they
//! stay on the node they were counted against.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use super::{LinkId, SchemaGraph};
use crate::error::{DtdError, Result};
use crate::graph::Cardinality;

/// Index of a node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

// =============================================================================
// Attributes
// =============================================================================

/// Declared attribute type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    Cdata,
    Id,
    IdRef,
    IdRefs,
    NmToken,
    NmTokens,
    Entity,
    Entities,
    Notation,
    Enumeration,
    /// Anything else, kept verbatim
    Other(String),
}

impl AttrType {
    pub fn parse(word: &str) -> Self {
        match word {
            "CDATA" => Self::Cdata,
            "ID" => Self::Id,
            "IDREF" => Self::IdRef,
            "IDREFS" => Self::IdRefs,
            "NMTOKEN" => Self::NmToken,
            "NMTOKENS" => Self::NmTokens,
            "ENTITY" => Self::Entity,
            "ENTITIES" => Self::Entities,
            "NOTATION" => Self::Notation,
            other => Self::Other(other.to_string()),
        }
    }
}

/// `#REQUIRED`, `#IMPLIED`, `#FIXED` or a plain default value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultMode {
    Required,
    Implied,
    Fixed,
    Value,
}

/// One attribute declared in an `<!ATTLIST>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttrProp {
    /// Property name (may be renamed to stay unique)
    pub name: String,
    /// Name as written in the schema
    pub dtd_name: String,
    /// Element the attribute list belongs to
    pub element: String,
    pub attr_type: AttrType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    pub default_mode: DefaultMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_data: Vec<String>,
}

impl AttrProp {
    pub fn new(element: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            dtd_name: name.to_string(),
            element: element.to_string(),
            attr_type: AttrType::Cdata,
            values: Vec::new(),
            default_mode: DefaultMode::Implied,
            default_value: None,
            namespace: None,
            java_type: None,
            extra_data: Vec::new(),
        }
    }

    /// `#REQUIRED` and `#FIXED` attributes are always present
    pub fn instance(&self) -> Cardinality {
        match self.default_mode {
            DefaultMode::Required | DefaultMode::Fixed => Cardinality::ExactlyOne,
            DefaultMode::Implied | DefaultMode::Value => Cardinality::ZeroOrOne,
        }
    }
}

// =============================================================================
// Node
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct GraphNode {
    name: String,
    namespace: Option<String>,
    unique_name: String,
    java_type: Option<String>,
    is_abstract: bool,
    is_union: bool,
    created: bool,
    ref_count: usize,
    attributes: Vec<AttrProp>,
    extra_data: BTreeSet<String>,
    extended_properties: BTreeMap<String, serde_json::Value>,
    marked: bool,
    extension: Option<NodeId>,
    link: Option<LinkId>,
    alias: Option<NodeId>,
}

impl GraphNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            unique_name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    pub fn java_type(&self) -> Option<&str> {
        self.java_type.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_union(&self) -> bool {
        self.is_union
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Times this node instance was referenced from a link
    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    pub fn attributes(&self) -> &[AttrProp] {
        &self.attributes
    }

    pub fn extra_data(&self) -> &BTreeSet<String> {
        &self.extra_data
    }

    pub fn extended_property(&self, key: &str) -> Option<&serde_json::Value> {
        self.extended_properties.get(key)
    }

    pub fn extended_properties(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extended_properties
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    pub fn extension(&self) -> Option<NodeId> {
        self.extension
    }

    /// Root of this node's content model
    pub fn link(&self) -> Option<LinkId> {
        self.link
    }

    pub fn alias(&self) -> Option<NodeId> {
        self.alias
    }
}

// =============================================================================
// Alias-transparent access
// =============================================================================

impl SchemaGraph {
    /// Follow the alias chain to the canonical node
    pub fn canonical(&self, id: NodeId) -> NodeId {
        let mut cur = id;
        // A chain longer than the arena means an alias cycle; stop there.
        for _ in 0..self.nodes.len() {
            match self.nodes[cur.0].alias {
                Some(next) if next != cur => cur = next,
                _ => break,
            }
        }
        cur
    }

    /// The node instance itself, without alias resolution
    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.0]
    }

    pub fn try_node(&self, id: NodeId) -> Result<&GraphNode> {
        self.nodes.get(id.0).ok_or(DtdError::UnknownNode(id.0))
    }

    /// The canonical node `id` stands for
    pub fn resolved(&self, id: NodeId) -> &GraphNode {
        &self.nodes[self.canonical(id).0]
    }

    fn resolved_mut(&mut self, id: NodeId) -> &mut GraphNode {
        let canonical = self.canonical(id);
        &mut self.nodes[canonical.0]
    }

    /// Look up a node by name, creating an undeclared one if needed
    pub fn get_or_create_node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(GraphNode::new(name));
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Make `id` delegate to `target`
    pub fn set_alias(&mut self, id: NodeId, target: NodeId) {
        self.nodes[id.0].alias = if id == target { None } else { Some(target) };
    }

    pub fn set_name(&mut self, id: NodeId, name: &str) {
        self.resolved_mut(id).name = name.to_string();
    }

    pub fn set_namespace(&mut self, id: NodeId, namespace: Option<String>) {
        self.resolved_mut(id).namespace = namespace;
    }

    pub fn set_unique_name(&mut self, id: NodeId, unique_name: &str) {
        self.resolved_mut(id).unique_name = unique_name.to_string();
    }

    pub fn set_java_type(&mut self, id: NodeId, java_type: Option<String>) {
        self.resolved_mut(id).java_type = java_type;
    }

    pub fn set_abstract(&mut self, id: NodeId, value: bool) {
        self.resolved_mut(id).is_abstract = value;
    }

    pub fn set_union(&mut self, id: NodeId, value: bool) {
        self.resolved_mut(id).is_union = value;
    }

    pub fn set_created(&mut self, id: NodeId, value: bool) {
        self.resolved_mut(id).created = value;
    }

    pub fn set_marked(&mut self, id: NodeId, value: bool) {
        self.resolved_mut(id).marked = value;
    }

    pub fn set_extension(&mut self, id: NodeId, extension: Option<NodeId>) {
        self.resolved_mut(id).extension = extension;
    }

    pub fn set_node_link(&mut self, id: NodeId, link: Option<LinkId>) {
        self.resolved_mut(id).link = link;
    }

    pub fn add_attribute(&mut self, id: NodeId, attr: AttrProp) {
        self.resolved_mut(id).attributes.push(attr);
    }

    pub fn attributes_mut(&mut self, id: NodeId) -> &mut Vec<AttrProp> {
        &mut self.resolved_mut(id).attributes
    }

    pub fn add_extra_data(&mut self, id: NodeId, token: impl Into<String>) {
        self.resolved_mut(id).extra_data.insert(token.into());
    }

    pub fn set_extended_property(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: serde_json::Value,
    ) {
        self.resolved_mut(id)
            .extended_properties
            .insert(key.into(), value);
    }

    /// Count a reference against this very instance (not its alias target)
    pub fn inc_ref_count(&mut self, id: NodeId) {
        self.nodes[id.0].ref_count += 1;
    }

    /// References counted against this very instance
    pub fn ref_count(&self, id: NodeId) -> usize {
        self.nodes[id.0].ref_count
    }

    /// Clear the traversal mark on every node
    pub fn clear_marks(&mut self) {
        for node in &mut self.nodes {
            node.marked = false;
        }
    }

    /// Nodes used directly by `id`: the elements one structural level
    /// below its content model, looking through pure grouping links.
    /// Deduplicated by name, in first-use order.
    pub fn get_nodes(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![self.resolved(id).link];

        while let Some(start) = stack.pop() {
            let chain = self.chain(start);
            // Grouping links found on this chain are visited after it.
            let mut nested = Vec::new();
            for l in chain {
                let link = self.link(l);
                match link.element {
                    Some(element) => {
                        if seen.insert(self.resolved(element).name().to_string()) {
                            result.push(element);
                        }
                    }
                    None if link.is_grouping() => nested.push(link.first_child()),
                    None => {}
                }
            }
            stack.extend(nested.into_iter().rev());
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_or_create_dedupes() {
        let mut g = SchemaGraph::new();
        let a = g.get_or_create_node("a");
        let b = g.get_or_create_node("b");
        assert_ne!(a, b);
        assert_eq!(g.get_or_create_node("a"), a);
        assert!(!g.node(a).is_created());
        assert_eq!(g.node_count(), 2);
    }

    #[test]
    fn test_alias_is_transparent() {
        let mut g = SchemaGraph::new();
        let alias = g.get_or_create_node("alias");
        let target = g.get_or_create_node("target");
        g.set_alias(alias, target);

        g.set_java_type(alias, Some("java.math.BigDecimal".into()));
        g.set_abstract(alias, true);
        g.set_extended_property(alias, "can-be-empty", json!(true));
        g.add_extra_data(alias, "restriction");

        let t = g.node(target);
        assert_eq!(t.java_type(), Some("java.math.BigDecimal"));
        assert!(t.is_abstract());
        assert_eq!(t.extended_property("can-be-empty"), Some(&json!(true)));
        assert!(t.extra_data().contains("restriction"));

        // The alias instance itself stays untouched
        assert_eq!(g.node(alias).java_type(), None);
        assert_eq!(g.resolved(alias).java_type(), Some("java.math.BigDecimal"));
    }

    #[test]
    fn test_ref_count_is_per_instance() {
        let mut g = SchemaGraph::new();
        let alias = g.get_or_create_node("alias");
        let target = g.get_or_create_node("target");
        g.set_alias(alias, target);

        g.inc_ref_count(alias);
        g.inc_ref_count(alias);
        assert_eq!(g.ref_count(alias), 2);
        assert_eq!(g.ref_count(target), 0);

        g.inc_ref_count(target);
        assert_eq!(g.ref_count(alias), 2);
        assert_eq!(g.ref_count(target), 1);
    }

    #[test]
    fn test_alias_chain_resolves_to_end() {
        let mut g = SchemaGraph::new();
        let a = g.get_or_create_node("a");
        let b = g.get_or_create_node("b");
        let c = g.get_or_create_node("c");
        g.set_alias(a, b);
        g.set_alias(b, c);
        g.set_union(a, true);
        assert_eq!(g.canonical(a), c);
        assert!(g.node(c).is_union());
        assert!(!g.node(b).is_union());
    }

    #[test]
    fn test_alias_cycle_terminates() {
        let mut g = SchemaGraph::new();
        let a = g.get_or_create_node("a");
        let b = g.get_or_create_node("b");
        g.set_alias(a, b);
        g.set_alias(b, a);
        let c = g.canonical(a);
        assert!(c == a || c == b);
    }

    #[test]
    fn test_attribute_instance() {
        let mut attr = AttrProp::new("item", "id");
        attr.default_mode = DefaultMode::Required;
        assert_eq!(attr.instance(), Cardinality::ExactlyOne);
        attr.default_mode = DefaultMode::Value;
        assert_eq!(attr.instance(), Cardinality::ZeroOrOne);
    }

    #[test]
    fn test_get_nodes_looks_through_groups() {
        // x := (a, (b | a), c)
        let mut g = SchemaGraph::new();
        let x = g.get_or_create_node("x");
        let a = g.get_or_create_node("a");
        let b = g.get_or_create_node("b");
        let c = g.get_or_create_node("c");

        let outer = g.new_link(None);
        let la = g.new_link(Some(a));
        let inner = g.new_link(None);
        let lb = g.new_link(Some(b));
        let la2 = g.new_link(Some(a));
        let lc = g.new_link(Some(c));
        g.append_child(outer, la).unwrap();
        g.append_child(outer, inner).unwrap();
        g.append_child(outer, lc).unwrap();
        g.append_child(inner, lb).unwrap();
        g.append_child(inner, la2).unwrap();
        g.set_node_link(x, Some(outer));

        assert_eq!(g.get_nodes(x), vec![a, c, b]);
    }
}
