//! Schema Graph
//!
//! Arena of `GraphNode`s (one per element name) and `GraphLink`s (one per
//! element occurrence inside a content model), built from DTD declarations
//! by `TreeBuilder`. Nodes and links are addressed by `NodeId`/`LinkId`;
//! lookup by name goes through a HashMap index.
//!
//! Structural operations live next to their types (`link`, `node`); this
//! module holds the arena itself plus whole-graph queries and exports.

pub mod builder;
pub mod diagnostics;
pub mod link;
pub mod loader;
pub mod node;
pub mod xpath;

pub use builder::TreeBuilder;
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use link::{Cardinality, Combinator, GraphLink, LinkId};
pub use node::{AttrProp, AttrType, DefaultMode, GraphNode, NodeId};
pub use xpath::XPathIter;

// Re-export loader functions
pub use loader::{load_from_directory, load_from_file, load_from_reader, load_from_str, LoadConfig};

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::error::Result;

/// Element names that stand for content keywords, not types
pub const PCDATA: &str = "#PCDATA";
pub const EMPTY: &str = "EMPTY";
pub const ANY: &str = "ANY";

/// Content keywords are never reported as undefined
pub fn is_content_keyword(name: &str) -> bool {
    matches!(name, PCDATA | EMPTY | ANY)
}

/// Search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub name: String,
    pub node: NodeId,
    pub created: bool,
    pub score: i64,
}

/// Serializable overview of one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSummary {
    pub name: String,
    pub created: bool,
    pub ref_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttrProp>,
}

/// Serializable overview of the whole graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSummary {
    pub source_digest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    pub node_count: usize,
    pub link_count: usize,
    pub nodes: Vec<NodeSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub undefined: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
    pub definition_order: Vec<Vec<String>>,
}

/// The element graph of one schema source
#[derive(Debug, Clone, Default)]
pub struct SchemaGraph {
    pub(crate) nodes: Vec<GraphNode>,

    pub(crate) links: Vec<GraphLink>,

    /// Index: element name -> node
    pub(crate) by_name: HashMap<String, NodeId>,

    /// Nodes in the order their `<!ELEMENT>` was read
    pub(crate) declared: Vec<NodeId>,

    pub(crate) root: Option<NodeId>,

    /// Names of declared entities
    pub(crate) entities: Vec<String>,

    pub(crate) diagnostics: Diagnostics,

    /// SHA-256 of the parsed source text
    pub source_digest: String,
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse in-memory DTD text
    pub fn from_str(text: &str) -> Result<Self> {
        load_from_str(text, &LoadConfig::default())
    }

    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        load_from_reader(source, &LoadConfig::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        load_from_file(path, &LoadConfig::default())
    }

    // ========== Public API ==========

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Declared nodes, in declaration order
    pub fn nodes(&self) -> &[NodeId] {
        &self.declared
    }

    /// Every node, declared or not
    pub fn all_nodes(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: Option<NodeId>) {
        self.root = root;
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Referenced but never declared (content keywords excluded)
    pub fn undefined_nodes(&self) -> Vec<NodeId> {
        self.all_nodes()
            .filter(|&n| {
                let node = self.resolved(n);
                !node.is_created() && !is_content_keyword(node.name())
            })
            .collect()
    }

    /// Declared but never referenced from any content model
    pub fn unreferenced_nodes(&self) -> Vec<NodeId> {
        self.declared
            .iter()
            .copied()
            .filter(|&n| self.ref_count(n) == 0)
            .collect()
    }

    /// Declared nodes grouped so that every group only uses nodes from
    /// itself or from earlier groups. Members of a reference cycle share a
    /// group.
    pub fn definition_order(&self) -> Vec<Vec<NodeId>> {
        let mut graph: DiGraph<NodeId, ()> =
            DiGraph::with_capacity(self.declared.len(), self.declared.len() * 2);
        let mut indices: HashMap<NodeId, NodeIndex> = HashMap::with_capacity(self.declared.len());

        for &n in &self.declared {
            let canonical = self.canonical(n);
            if !indices.contains_key(&canonical) {
                indices.insert(canonical, graph.add_node(canonical));
            }
        }

        for &n in &self.declared {
            let from = indices[&self.canonical(n)];
            for used in self.get_nodes(n) {
                if let Some(&to) = indices.get(&self.canonical(used)) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        // kosaraju_scc yields components in reverse topological order,
        // so used nodes come before their users.
        kosaraju_scc(&graph)
            .into_iter()
            .map(|scc| {
                let mut group: Vec<NodeId> = scc
                    .into_iter()
                    .filter_map(|idx| graph.node_weight(idx).copied())
                    .collect();
                group.sort();
                group
            })
            .collect()
    }

    /// Search element names (fuzzy)
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        let matcher = SkimMatcherV2::default();
        let mut results: Vec<(i64, NodeId)> = Vec::new();

        for id in self.all_nodes() {
            let name = self.node(id).name();
            if is_content_keyword(name) {
                continue;
            }
            if let Some(score) = matcher.fuzzy_match(name, query) {
                results.push((score, id));
            }
        }

        // Best score first, ties in arena order
        results.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        results
            .into_iter()
            .take(limit)
            .map(|(score, id)| {
                let node = self.node(id);
                SearchResult {
                    name: node.name().to_string(),
                    node: id,
                    created: node.is_created(),
                    score,
                }
            })
            .collect()
    }

    /// Every element link below a node's content model, depth first
    pub fn content_links(&self, id: NodeId) -> Vec<LinkId> {
        let mut result = Vec::new();
        for top in self.chain(self.resolved(id).link()) {
            result.push(top);
            result.extend(self.all_descendants(top));
        }
        result
            .into_iter()
            .filter(|&l| self.link(l).element.is_some())
            .collect()
    }

    pub fn summary(&self) -> GraphSummary {
        let name_of = |n: NodeId| self.resolved(n).name().to_string();

        GraphSummary {
            source_digest: self.source_digest.clone(),
            root: self.root.map(name_of),
            node_count: self.node_count(),
            link_count: self.link_count(),
            nodes: self
                .declared
                .iter()
                .map(|&n| {
                    let node = self.resolved(n);
                    NodeSummary {
                        name: node.name().to_string(),
                        created: node.is_created(),
                        ref_count: self.ref_count(n),
                        uses: self.get_nodes(n).into_iter().map(name_of).collect(),
                        attributes: node.attributes().to_vec(),
                    }
                })
                .collect(),
            undefined: self.undefined_nodes().into_iter().map(name_of).collect(),
            entities: self.entities.clone(),
            definition_order: self
                .definition_order()
                .into_iter()
                .map(|group| group.into_iter().map(name_of).collect())
                .collect(),
        }
    }

    /// Export the element graph to GraphViz DOT format
    pub fn to_dot(&self) -> String {
        let mut output = String::new();

        output.push_str("digraph SchemaGraph {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  bgcolor=\"#1e1e1e\";\n");
        output.push_str("  node [shape=box, style=\"filled,rounded\", fontname=\"Helvetica\", fontsize=10, fontcolor=\"white\", color=\"#404040\"];\n");
        output.push_str("  edge [fontname=\"Helvetica\", fontsize=8, fontcolor=\"#808080\"];\n");
        output.push('\n');

        // Nodes
        for id in self.all_nodes() {
            if self.node(id).alias().is_some() {
                continue;
            }
            let node = self.node(id);
            let color = if Some(id) == self.root {
                "#FF9800"
            } else if is_content_keyword(node.name()) {
                "#607D8B"
            } else if node.is_created() {
                "#00BCD4"
            } else {
                "#9E9E9E"
            };
            output.push_str(&format!(
                "  \"{}\" [label=\"{}\", fillcolor=\"{}\"];\n",
                dot_id(node.name()),
                node.name().replace('"', "\\\""),
                color
            ));
        }

        output.push('\n');

        // Edges: one per element occurrence
        for &from in &self.declared {
            let source = dot_id(self.resolved(from).name());
            for l in self.content_links(from) {
                let link = self.link(l);
                let Some(element) = link.element else { continue };
                let target = dot_id(self.resolved(element).name());
                let card = link.element_cardinality.widest(self.enclosing_cardinality(l));
                let style = if link.is_sequence_or(self) { ", style=dashed" } else { "" };
                output.push_str(&format!(
                    "  \"{}\" -> \"{}\" [label=\"{}\"{}];\n",
                    source,
                    target,
                    card.suffix(),
                    style
                ));
            }
        }

        output.push_str("}\n");
        output
    }

    /// Widest group cardinality of every grouping ancestor of a link
    pub fn enclosing_cardinality(&self, id: LinkId) -> Cardinality {
        let mut result = Cardinality::ExactlyOne;
        let mut cur = self.link(id).parent();
        while let Some(p) = cur {
            result = result.widest(self.link(p).group_cardinality);
            cur = self.link(p).parent();
        }
        result
    }
}

fn dot_id(name: &str) -> String {
    name.replace(['#', '.', '-', ':', '"'], "_")
}
