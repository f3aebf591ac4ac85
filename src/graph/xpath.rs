//! Path lookup over links
//!
//! `a/b/c` is resolved one step per `next()` by schema name. `.` steps are
//! skipped and `prefix:` qualifiers dropped. Once a step fails the iterator
//! is exhausted for good.

use super::{LinkId, NodeId, SchemaGraph};

pub struct XPathIter<'g> {
    graph: &'g SchemaGraph,
    steps: Vec<String>,
    pos: usize,
    start: LinkId,
    current: Option<LinkId>,
    done: bool,
}

impl<'g> XPathIter<'g> {
    pub fn new(graph: &'g SchemaGraph, start: LinkId, path: &str) -> Self {
        let steps = path
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .map(|s| s.rsplit(':').next().unwrap_or(s).to_string())
            .collect();
        Self {
            graph,
            steps,
            pos: 0,
            start,
            current: None,
            done: false,
        }
    }

    /// Run every remaining step; the final link if all resolved
    pub fn resolve(self) -> Option<LinkId> {
        let total = self.steps.len() - self.pos;
        let mut resolved = 0;
        let mut last = None;
        for l in self {
            resolved += 1;
            last = Some(l);
        }
        if resolved == total {
            last
        } else {
            None
        }
    }

    /// True once a step failed to resolve
    pub fn is_exhausted(&self) -> bool {
        self.done
    }

    /// Where the next step starts searching
    fn search_root(&self) -> Option<LinkId> {
        match self.current {
            None => Some(self.start),
            Some(cur) => {
                let link = self.graph.link(cur);
                link.first_child().or_else(|| {
                    link.element
                        .and_then(|n| self.graph.resolved(n).link())
                })
            }
        }
    }

    fn find_step(&self, start: LinkId, name: &str) -> Option<LinkId> {
        if let Some(found) = self.find_down(start, name) {
            return Some(found);
        }
        for sibling in self.graph.siblings(start) {
            if let Some(found) = self.find_down(sibling, name) {
                return Some(found);
            }
        }
        // Grouping children were already covered by find_down
        if !self.graph.link(start).is_grouping() {
            for child in self.graph.children(start) {
                if let Some(found) = self.find_down(child, name) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// The link itself, or inside it when it only groups
    fn find_down(&self, id: LinkId, name: &str) -> Option<LinkId> {
        if self.graph.link_schema_name(id) == Some(name) {
            return Some(id);
        }
        if self.graph.link(id).is_grouping() {
            for child in self.graph.children(id) {
                if let Some(found) = self.find_down(child, name) {
                    return Some(found);
                }
            }
        }
        None
    }
}

impl Iterator for XPathIter<'_> {
    type Item = LinkId;

    fn next(&mut self) -> Option<LinkId> {
        if self.done || self.pos >= self.steps.len() {
            return None;
        }

        let found = self
            .search_root()
            .and_then(|root| self.find_step(root, &self.steps[self.pos]));

        match found {
            Some(l) => {
                self.pos += 1;
                self.current = Some(l);
                Some(l)
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

impl SchemaGraph {
    /// Step through `path` starting at `start`
    pub fn xpath(&self, start: LinkId, path: &str) -> XPathIter<'_> {
        XPathIter::new(self, start, path)
    }

    /// Step through `path` starting at a node's content model
    pub fn xpath_from_node(&self, node: NodeId, path: &str) -> Option<XPathIter<'_>> {
        self.resolved(node).link().map(|l| self.xpath(l, path))
    }
}
