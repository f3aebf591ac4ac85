//! Graph Links
//!
//! A `GraphLink` records one occurrence of an element inside a content
//! model, or a parenthesised group when it has no element. Links form a
//! tree: every link has at most one parent, one next sibling and one first
//! child. Children of one parent are a singly linked sibling chain.
//!
//! Each parent caches its last child so appends stay O(1). The cache lives
//! behind `first_child`/`set_first_child`; replacing the chain always
//! clears it.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;

use super::{NodeId, SchemaGraph};
use crate::error::{DtdError, Result};

// =============================================================================
// Cardinality / Combinator
// =============================================================================

/// How many times an element (or group) may occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    #[default]
    ExactlyOne,
    ZeroOrOne,
    OneOrMore,
    ZeroOrMore,
}

impl Cardinality {
    /// Map a DTD suffix character (`?`, `+`, `*`)
    pub fn from_suffix(c: char) -> Option<Self> {
        match c {
            '?' => Some(Self::ZeroOrOne),
            '+' => Some(Self::OneOrMore),
            '*' => Some(Self::ZeroOrMore),
            _ => None,
        }
    }

    /// Strip a trailing suffix character from a word
    pub fn split_suffix(word: &str) -> (&str, Self) {
        match word.chars().last().and_then(Self::from_suffix) {
            Some(cardinality) => (&word[..word.len() - 1], cardinality),
            None => (word, Self::ExactlyOne),
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::ExactlyOne => "",
            Self::ZeroOrOne => "?",
            Self::OneOrMore => "+",
            Self::ZeroOrMore => "*",
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::ZeroOrOne | Self::ZeroOrMore)
    }

    pub fn is_repeatable(&self) -> bool {
        matches!(self, Self::OneOrMore | Self::ZeroOrMore)
    }

    /// The loosest cardinality covering both
    pub fn widest(self, other: Self) -> Self {
        use Cardinality::*;
        match (self, other) {
            (ZeroOrMore, _) | (_, ZeroOrMore) => ZeroOrMore,
            (OneOrMore, ZeroOrOne) | (ZeroOrOne, OneOrMore) => ZeroOrMore,
            (OneOrMore, _) | (_, OneOrMore) => OneOrMore,
            (ZeroOrOne, _) | (_, ZeroOrOne) => ZeroOrOne,
            (ExactlyOne, ExactlyOne) => ExactlyOne,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactlyOne => f.write_str("1"),
            other => f.write_str(other.suffix()),
        }
    }
}

/// How the children of a link combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Sequence (`,`)
    #[default]
    And,
    /// Choice (`|`)
    Or,
}

// =============================================================================
// Link
// =============================================================================

/// Index of a link in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId(pub usize);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphLink {
    /// Referenced element; `None` for a pure grouping link
    pub element: Option<NodeId>,
    /// Bean property name, when it differs from the element's
    pub name: Option<String>,
    /// Name as written in the schema
    pub schema_name: Option<String>,
    pub namespace: Option<String>,
    pub default_value: Option<String>,
    pub nillable: bool,
    /// How this link's own element occurs
    pub element_cardinality: Cardinality,
    pub element_combinator: Combinator,
    /// How the group of children occurs
    pub group_cardinality: Cardinality,
    pub children_combinator: Combinator,
    pub extra_data: Vec<String>,
    /// Consumer slot (index into a table owned by the consumer)
    pub object: Option<usize>,

    parent: Option<LinkId>,
    sibling: Option<LinkId>,
    child: Option<LinkId>,
    last_child: Cell<Option<LinkId>>,
}

impl GraphLink {
    pub fn new(element: Option<NodeId>) -> Self {
        Self {
            element,
            ..Self::default()
        }
    }

    pub fn parent(&self) -> Option<LinkId> {
        self.parent
    }

    pub fn sibling(&self) -> Option<LinkId> {
        self.sibling
    }

    pub fn first_child(&self) -> Option<LinkId> {
        self.child
    }

    /// Replace the child chain head and drop the cached last child
    fn set_first_child(&mut self, child: Option<LinkId>) {
        self.child = child;
        self.last_child.set(None);
    }

    /// A link that only groups children
    pub fn is_grouping(&self) -> bool {
        self.element.is_none() && self.name.is_none()
    }

    /// True when this link's parent combines its children as a choice
    pub fn is_sequence_or(&self, graph: &SchemaGraph) -> bool {
        self.parent
            .and_then(|p| graph.links.get(p.0))
            .map(|p| p.children_combinator == Combinator::Or)
            .unwrap_or(false)
    }

    pub fn add_extra_data(&mut self, token: impl Into<String>) {
        let token = token.into();
        if !self.extra_data.contains(&token) {
            self.extra_data.push(token);
        }
    }
}

// =============================================================================
// Structural operations
// =============================================================================

impl SchemaGraph {
    /// Allocate a detached link
    pub fn new_link(&mut self, element: Option<NodeId>) -> LinkId {
        let id = LinkId(self.links.len());
        self.links.push(GraphLink::new(element));
        id
    }

    pub fn link(&self, id: LinkId) -> &GraphLink {
        &self.links[id.0]
    }

    pub fn link_mut(&mut self, id: LinkId) -> &mut GraphLink {
        &mut self.links[id.0]
    }

    pub fn try_link(&self, id: LinkId) -> Result<&GraphLink> {
        self.links.get(id.0).ok_or(DtdError::UnknownLink(id.0))
    }

    /// Schema name of a link, falling back to its element's name
    pub fn link_schema_name(&self, id: LinkId) -> Option<&str> {
        let link = self.link(id);
        link.schema_name
            .as_deref()
            .or_else(|| link.element.map(|n| self.resolved(n).name()))
    }

    /// Direct children in order
    pub fn children(&self, id: LinkId) -> Vec<LinkId> {
        self.chain(self.link(id).child)
    }

    /// Every link on a sibling chain starting at `start`
    pub fn chain(&self, start: Option<LinkId>) -> Vec<LinkId> {
        let mut result = Vec::new();
        let mut cur = start;
        while let Some(l) = cur {
            result.push(l);
            cur = self.link(l).sibling;
        }
        result
    }

    /// Other children of the same parent. A parentless link only sees the
    /// rest of its own sibling chain.
    pub fn siblings(&self, id: LinkId) -> Vec<LinkId> {
        self.siblings_including_self(id)
            .into_iter()
            .filter(|l| *l != id)
            .collect()
    }

    pub fn siblings_including_self(&self, id: LinkId) -> Vec<LinkId> {
        match self.link(id).parent {
            Some(parent) => self.children(parent),
            None => self.chain(Some(id)),
        }
    }

    /// Last link of the sibling chain `id` belongs to
    pub fn last_sibling(&self, id: LinkId) -> LinkId {
        let parent = self.link(id).parent;
        if let Some(p) = parent {
            if let Some(cached) = self.link(p).last_child.get() {
                return cached;
            }
        }

        let mut last = id;
        while let Some(next) = self.link(last).sibling {
            last = next;
        }

        if let Some(p) = parent {
            self.link(p).last_child.set(Some(last));
        }
        last
    }

    /// Cached last child of `id`, if the cache is populated
    pub fn cached_last_child(&self, id: LinkId) -> Option<LinkId> {
        self.link(id).last_child.get()
    }

    /// Replace the whole child chain of `parent` and reparent every link on it
    pub fn set_children(&mut self, parent: LinkId, first: Option<LinkId>) {
        for l in self.chain(first) {
            self.links[l.0].parent = Some(parent);
        }
        self.links[parent.0].set_first_child(first);
    }

    /// Append `child` as the last child of `parent`
    pub fn append_child(&mut self, parent: LinkId, child: LinkId) -> Result<()> {
        let c = self.link(child);
        if c.sibling.is_some() || c.parent == Some(parent) {
            return Err(DtdError::SiblingAlreadySet(child.0));
        }

        match self.link(parent).child {
            None => self.set_children(parent, Some(child)),
            Some(first) => {
                let last = self.last_sibling(first);
                self.add_sibling(last, child)?;
                self.links[child.0].parent = Some(parent);
                self.link(parent).last_child.set(Some(child));
            }
        }
        Ok(())
    }

    /// Chain `next` after `id`. A link's sibling is set once.
    pub fn add_sibling(&mut self, id: LinkId, next: LinkId) -> Result<()> {
        if self.link(id).sibling.is_some() {
            return Err(DtdError::SiblingAlreadySet(id.0));
        }
        // `next` may head a chain of its own; all of it joins the parent
        let joined = self.chain(Some(next));
        if joined.contains(&id) {
            return Err(DtdError::SiblingAlreadySet(id.0));
        }
        let parent = self.link(id).parent;
        self.links[id.0].sibling = Some(next);

        let mut tail = next;
        for l in joined {
            self.links[l.0].parent = parent;
            tail = l;
        }
        if let Some(p) = parent {
            if self.link(p).last_child.get() == Some(id) {
                self.link(p).last_child.set(Some(tail));
            }
        }
        Ok(())
    }

    /// Every link below `id` (children, their siblings, recursively)
    pub fn all_descendants(&self, id: LinkId) -> Vec<LinkId> {
        let mut result = Vec::new();
        let mut stack: Vec<LinkId> = self.children(id).into_iter().rev().collect();
        while let Some(l) = stack.pop() {
            result.push(l);
            stack.extend(self.children(l).into_iter().rev());
        }
        result
    }

    /// Links that cannot appear together with `id` in a valid instance.
    ///
    /// Walks up through every ancestor. At a choice (`Or`) ancestor that can
    /// only be taken once, everything under each other branch excludes us.
    pub fn mutually_exclusive_links(&self, id: LinkId) -> Vec<LinkId> {
        let mut result = Vec::new();
        let mut cur = id;

        while let Some(parent) = self.link(cur).parent {
            let p = self.link(parent);
            let single_choice = p.children_combinator == Combinator::Or
                && !p.group_cardinality.is_repeatable();
            if single_choice {
                for sibling in self.siblings(cur) {
                    result.push(sibling);
                    result.extend(self.all_descendants(sibling));
                }
            }
            cur = parent;
        }

        result
    }

    pub fn is_mutually_exclusive(&self, a: LinkId, b: LinkId) -> bool {
        self.mutually_exclusive_links(a).contains(&b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_links(n: usize) -> (SchemaGraph, Vec<LinkId>) {
        let mut graph = SchemaGraph::new();
        let links = (0..n).map(|_| graph.new_link(None)).collect();
        (graph, links)
    }

    #[test]
    fn test_split_suffix() {
        assert_eq!(Cardinality::split_suffix("a"), ("a", Cardinality::ExactlyOne));
        assert_eq!(Cardinality::split_suffix("b?"), ("b", Cardinality::ZeroOrOne));
        assert_eq!(Cardinality::split_suffix("c+"), ("c", Cardinality::OneOrMore));
        assert_eq!(Cardinality::split_suffix("d*"), ("d", Cardinality::ZeroOrMore));
        assert_eq!(Cardinality::split_suffix("*"), ("", Cardinality::ZeroOrMore));
    }

    #[test]
    fn test_widest() {
        use Cardinality::*;
        assert_eq!(ExactlyOne.widest(ExactlyOne), ExactlyOne);
        assert_eq!(ExactlyOne.widest(ZeroOrOne), ZeroOrOne);
        assert_eq!(OneOrMore.widest(ExactlyOne), OneOrMore);
        assert_eq!(OneOrMore.widest(ZeroOrOne), ZeroOrMore);
        assert_eq!(ZeroOrOne.widest(ZeroOrMore), ZeroOrMore);
    }

    #[test]
    fn test_append_and_last_sibling_agree() {
        let (mut g, l) = graph_with_links(5);
        let parent = l[0];
        for &child in &l[1..] {
            g.append_child(parent, child).unwrap();
            assert_eq!(g.last_sibling(l[1]), child);
            assert_eq!(g.cached_last_child(parent), Some(child));
        }
        assert_eq!(g.children(parent), l[1..].to_vec());
        for &child in &l[1..] {
            assert_eq!(g.link(child).parent(), Some(parent));
        }
    }

    #[test]
    fn test_append_is_not_idempotent() {
        let (mut g, l) = graph_with_links(3);
        g.append_child(l[0], l[1]).unwrap();
        assert!(matches!(g.append_child(l[0], l[1]), Err(DtdError::SiblingAlreadySet(_))));
        g.append_child(l[0], l[2]).unwrap();
        assert!(matches!(g.append_child(l[2], l[1]), Err(DtdError::SiblingAlreadySet(1))));
        assert_eq!(g.children(l[0]), vec![l[1], l[2]]);
    }

    #[test]
    fn test_add_sibling_is_append_only() {
        let (mut g, l) = graph_with_links(3);
        g.add_sibling(l[0], l[1]).unwrap();
        assert!(matches!(g.add_sibling(l[0], l[2]), Err(DtdError::SiblingAlreadySet(0))));
    }

    #[test]
    fn test_add_sibling_joins_whole_chain() {
        let (mut g, l) = graph_with_links(6);
        let parent = l[0];
        g.append_child(parent, l[1]).unwrap();
        g.append_child(parent, l[2]).unwrap();
        g.add_sibling(l[3], l[4]).unwrap();
        g.add_sibling(l[2], l[3]).unwrap();

        assert_eq!(g.children(parent), vec![l[1], l[2], l[3], l[4]]);
        assert_eq!(g.cached_last_child(parent), Some(l[4]));
        assert_eq!(g.link(l[4]).parent(), Some(parent));

        g.append_child(parent, l[5]).unwrap();
        assert_eq!(g.children(parent), vec![l[1], l[2], l[3], l[4], l[5]]);
        assert_eq!(g.last_sibling(l[1]), l[5]);
    }

    #[test]
    fn test_add_sibling_rejects_cycle() {
        let (mut g, l) = graph_with_links(2);
        g.add_sibling(l[0], l[1]).unwrap();
        assert!(g.add_sibling(l[1], l[0]).is_err());
        assert_eq!(g.chain(Some(l[0])), vec![l[0], l[1]]);
    }

    #[test]
    fn test_set_children_reparents_and_clears_cache() {
        let (mut g, l) = graph_with_links(6);
        g.append_child(l[0], l[1]).unwrap();
        g.append_child(l[0], l[2]).unwrap();
        assert_eq!(g.cached_last_child(l[0]), Some(l[2]));

        g.add_sibling(l[3], l[4]).unwrap();
        g.set_children(l[0], Some(l[3]));
        assert_eq!(g.cached_last_child(l[0]), None);
        assert_eq!(g.children(l[0]), vec![l[3], l[4]]);
        assert_eq!(g.link(l[4]).parent(), Some(l[0]));
        assert_eq!(g.last_sibling(l[3]), l[4]);

        g.append_child(l[0], l[5]).unwrap();
        assert_eq!(g.last_sibling(l[3]), l[5]);
        assert_eq!(g.cached_last_child(l[0]), Some(l[5]));
    }

    #[test]
    fn test_siblings_with_parent() {
        let (mut g, l) = graph_with_links(4);
        for &c in &l[1..] {
            g.append_child(l[0], c).unwrap();
        }
        assert_eq!(g.siblings(l[2]), vec![l[1], l[3]]);
        assert_eq!(g.siblings_including_self(l[2]), vec![l[1], l[2], l[3]]);
    }

    #[test]
    fn test_siblings_without_parent() {
        let (mut g, l) = graph_with_links(3);
        g.add_sibling(l[0], l[1]).unwrap();
        g.add_sibling(l[1], l[2]).unwrap();
        assert_eq!(g.siblings(l[0]), vec![l[1], l[2]]);
        // Only the rest of the chain is visible from the middle
        assert_eq!(g.siblings_including_self(l[1]), vec![l[1], l[2]]);
    }

    fn choice(cardinality: Cardinality) -> (SchemaGraph, LinkId, Vec<LinkId>) {
        // (a | b | c) where b holds a nested (x, y)
        let (mut g, l) = graph_with_links(7);
        let group = l[0];
        let (a, b, c, inner, x, y) = (l[1], l[2], l[3], l[4], l[5], l[6]);
        for child in [a, b, c] {
            g.append_child(group, child).unwrap();
        }
        g.append_child(b, inner).unwrap();
        g.append_child(inner, x).unwrap();
        g.append_child(inner, y).unwrap();
        g.link_mut(group).children_combinator = Combinator::Or;
        g.link_mut(group).group_cardinality = cardinality;
        (g, group, vec![a, b, c, inner, x, y])
    }

    #[test]
    fn test_mutually_exclusive_single_choice() {
        let (g, _, l) = choice(Cardinality::ExactlyOne);
        let (a, b, c, inner, x, y) = (l[0], l[1], l[2], l[3], l[4], l[5]);
        let excl = g.mutually_exclusive_links(a);
        assert_eq!(excl, vec![b, inner, x, y, c]);
        assert!(g.is_mutually_exclusive(x, c));
        assert!(!g.is_mutually_exclusive(x, y));
    }

    #[test]
    fn test_mutually_exclusive_optional_choice() {
        let (g, _, l) = choice(Cardinality::ZeroOrOne);
        assert!(g.is_mutually_exclusive(l[0], l[2]));
    }

    #[test]
    fn test_repeatable_choice_is_not_exclusive() {
        let (g, _, l) = choice(Cardinality::ZeroOrMore);
        assert!(g.mutually_exclusive_links(l[0]).is_empty());
        let (g, _, l) = choice(Cardinality::OneOrMore);
        assert!(g.mutually_exclusive_links(l[0]).is_empty());
    }

    #[test]
    fn test_sequence_is_not_exclusive() {
        let (mut g, group, l) = choice(Cardinality::ExactlyOne);
        g.link_mut(group).children_combinator = Combinator::And;
        assert!(g.mutually_exclusive_links(l[0]).is_empty());
    }

    #[test]
    fn test_exclusion_accumulates_across_levels() {
        // ((p | q) | r): p excludes q and r
        let (mut g, l) = graph_with_links(5);
        let (outer, inner, p, q, r) = (l[0], l[1], l[2], l[3], l[4]);
        g.append_child(outer, inner).unwrap();
        g.append_child(outer, r).unwrap();
        g.append_child(inner, p).unwrap();
        g.append_child(inner, q).unwrap();
        g.link_mut(outer).children_combinator = Combinator::Or;
        g.link_mut(inner).children_combinator = Combinator::Or;
        assert_eq!(g.mutually_exclusive_links(p), vec![q, r]);
    }
}
