//! Bean Materialization
//!
//! Derives bean classes from a `SchemaGraph`. Every node gets a
//! `BeanElement` (its class name and value type); every created, non-scalar
//! node becomes a `BeanClass` whose properties come from walking its link
//! tree.
//!
//! The output is plain data: templates decide how to render a `Property`
//! from its cardinalities, choice membership and type.

pub mod names;

pub use names::{const_name, convert_name, uniquify, ReservedNames, UNIQUE_PREFIX};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

use crate::config::BeansConfig;
use crate::graph::{
    AttrProp, Cardinality, DiagnosticCode, Diagnostics, LinkId, NodeId, SchemaGraph, EMPTY, PCDATA,
};

// =============================================================================
// Types
// =============================================================================

/// What a node turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeanType {
    /// A generated class
    Bean,
    /// Text content, or a node that is not generated
    String,
    /// `EMPTY` content: present or absent
    Boolean,
}

impl BeanType {
    pub fn is_bean(&self) -> bool {
        matches!(self, Self::Bean)
    }

    /// Value type for a declared type hint
    fn from_type_name(name: &str) -> Self {
        match name {
            "boolean" | "Boolean" | "java.lang.Boolean" => Self::Boolean,
            _ => Self::String,
        }
    }
}

/// How a property is accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessorShape {
    Single,
    Optional,
    Collection,
}

impl AccessorShape {
    pub fn from_cardinality(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::ExactlyOne => Self::Single,
            Cardinality::ZeroOrOne => Self::Optional,
            Cardinality::OneOrMore | Cardinality::ZeroOrMore => Self::Collection,
        }
    }
}

/// Class name and value type of one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeanElement {
    pub node: NodeId,
    pub name: String,
    pub schema_name: String,
    pub namespace: Option<String>,
    pub bean_type: BeanType,
    /// Type name used where the node is referenced
    pub class_type: String,
    pub can_be_empty: bool,
    pub is_root: bool,
    /// Class type came from a declared type hint
    #[serde(skip)]
    type_set_externally: bool,
}

/// One materialized accessor of a bean
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub schema_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Element the property holds; `None` for attributes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owning_node: Option<NodeId>,
    /// Link the property was derived from; `None` for attributes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defining_link: Option<LinkId>,
    pub type_name: String,
    pub nesting_level: usize,
    pub element_cardinality: Cardinality,
    pub group_cardinality: Cardinality,
    pub is_choice_member: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub nillable: bool,
    pub is_direct_child: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_data: Vec<String>,
    pub is_union: bool,
    pub can_be_empty: bool,
    pub const_name: String,
    pub bean_type: BeanType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<AttrProp>,
}

impl Property {
    /// Single value, optional value or ordered collection
    pub fn accessor_shape(&self) -> AccessorShape {
        AccessorShape::from_cardinality(self.element_cardinality.widest(self.group_cardinality))
    }

    pub fn is_attribute(&self) -> bool {
        self.attribute.is_some()
    }
}

/// A generated data-access class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeanClass {
    pub name: String,
    pub schema_name: String,
    pub node: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub is_root: bool,
    pub is_abstract: bool,
    pub bean_type: BeanType,
    pub can_be_empty: bool,
    /// Class this one extends, when the node has a created extension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    pub properties: Vec<Property>,
}

impl BeanClass {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Property derived from a given link
    pub fn property_for_link(&self, link: LinkId) -> Option<&Property> {
        self.properties.iter().find(|p| p.defining_link == Some(link))
    }

    pub fn non_attribute_count(&self) -> usize {
        self.properties.iter().filter(|p| !p.is_attribute()).count()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Property names taken within one bean
struct PropertySink {
    bean: String,
    used: HashSet<String>,
    properties: Vec<Property>,
}

impl PropertySink {
    fn new(bean: &str) -> Self {
        Self {
            bean: bean.to_string(),
            used: HashSet::new(),
            properties: Vec::new(),
        }
    }
}

pub struct BeanBuilder<'g> {
    graph: &'g SchemaGraph,
    config: &'g BeansConfig,
    /// Keyed by canonical node
    elements: HashMap<NodeId, BeanElement>,
    root: Option<NodeId>,
    diagnostics: Diagnostics,
}

impl<'g> BeanBuilder<'g> {
    pub fn new(graph: &'g SchemaGraph, config: &'g BeansConfig) -> Self {
        let mut builder = Self {
            graph,
            config,
            elements: HashMap::new(),
            root: graph.root().map(|r| graph.canonical(r)),
            diagnostics: Diagnostics::new(),
        };
        builder.prepare_elements();
        builder
    }

    /// Computed element for a node (aliases resolve to their target)
    pub fn element(&self, node: NodeId) -> Option<&BeanElement> {
        self.elements.get(&self.graph.canonical(node))
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Configured package, else the root bean name in lower case
    pub fn package(&self) -> String {
        if let Some(package) = &self.config.generation.package {
            return package.clone();
        }
        self.root
            .and_then(|r| self.elements.get(&r))
            .map(|be| be.name.to_lowercase())
            .unwrap_or_default()
    }

    fn prepare_elements(&mut self) {
        let graph = self.graph;
        let mut reserved = ReservedNames::new(&self.config.generation.reserved_names);

        for n in graph.all_nodes() {
            if graph.canonical(n) != n {
                continue;
            }
            let mut be = self.calculate_type(n);

            if be.bean_type.is_bean() {
                let claimed = reserved.claim(&be.name, be.namespace.as_deref());
                if claimed != be.name {
                    debug!(from = %be.name, to = %claimed, "renamed bean class");
                    self.diagnostics.report(
                        &be.schema_name,
                        DiagnosticCode::RenamedClass,
                        format!("class '{}' renamed to '{}'", be.name, claimed),
                    );
                    be.name = claimed.clone();
                    be.class_type = claimed;
                }
            }

            self.elements.insert(n, be);
        }
    }

    fn calculate_type(&self, n: NodeId) -> BeanElement {
        let graph = self.graph;
        let node = graph.resolved(n);
        let is_root = self.root == Some(n);
        let name = convert_name(node.name());

        let mut bean_type = BeanType::Bean;
        let mut can_be_empty = node.extended_property("can-be-empty").is_some();

        if !node.is_created() {
            bean_type = BeanType::String;
        }
        let used = graph.get_nodes(n);
        if used.len() == 1 && !is_root {
            match graph.resolved(used[0]).name() {
                PCDATA => bean_type = BeanType::String,
                EMPTY => {
                    bean_type = BeanType::Boolean;
                    can_be_empty = true;
                }
                _ => {}
            }
        }

        let type_set_externally = node.java_type().is_some() && !is_root;
        let class_type = match node.java_type() {
            Some(hint) if !is_root => {
                bean_type = BeanType::from_type_name(hint);
                hint.to_string()
            }
            _ => match bean_type {
                BeanType::Bean => name.clone(),
                BeanType::String => "String".to_string(),
                BeanType::Boolean => "boolean".to_string(),
            },
        };

        BeanElement {
            node: n,
            name,
            schema_name: node.name().to_string(),
            namespace: node.namespace().map(str::to_string),
            bean_type,
            class_type,
            can_be_empty,
            is_root,
            type_set_externally,
        }
    }

    /// Materialize every bean class, in node order
    pub fn build(&mut self) -> Vec<BeanClass> {
        let graph = self.graph;
        let mut classes = Vec::new();

        for n in graph.all_nodes() {
            let Some(be) = self.elements.get(&n).cloned() else { continue };
            let node = graph.resolved(n);
            if !(be.bean_type.is_bean() || be.is_root) || !node.is_created() {
                continue;
            }

            let mut sink = PropertySink::new(&be.name);
            if self.config.generation.attributes_as_properties {
                self.add_attr_props(node.attributes(), &be.name, &mut sink, Cardinality::ExactlyOne, true);
            }
            if be.bean_type.is_bean() {
                if let Some(l) = node.link() {
                    let group = graph.link(l).group_cardinality;
                    self.build_properties(Some(l), 0, group, false, &mut sink);
                }
            }

            let extends = node
                .extension()
                .filter(|&ext| graph.resolved(ext).is_created())
                .and_then(|ext| self.elements.get(&graph.canonical(ext)))
                .map(|ext| ext.class_type.clone());

            classes.push(BeanClass {
                name: be.name,
                schema_name: be.schema_name,
                node: n,
                namespace: be.namespace,
                is_root: be.is_root,
                is_abstract: node.is_abstract(),
                bean_type: be.bean_type,
                can_be_empty: be.can_be_empty,
                extends,
                properties: sink.properties,
            });
        }

        debug!(
            beans = classes.len(),
            properties = classes.iter().map(|c| c.properties.len()).sum::<usize>(),
            "bean classes built"
        );
        classes
    }

    /// Walk a sibling chain (and everything below it) adding one property
    /// per element link
    fn build_properties(
        &mut self,
        start: Option<LinkId>,
        nesting_level: usize,
        group: Cardinality,
        mut ored: bool,
        sink: &mut PropertySink,
    ) {
        let graph = self.graph;
        let mut cur = start;

        while let Some(l) = cur {
            let link = graph.link(l);

            if let Some(element) = link.element {
                let canonical = graph.canonical(element);
                if let Some(be) = self.elements.get(&canonical).cloned() {
                    ored = ored || link.is_sequence_or(graph);

                    let (mut name, schema_name, namespace) = match &link.name {
                        Some(n) => (
                            convert_name(n),
                            graph.link_schema_name(l).unwrap_or(n.as_str()).to_string(),
                            link.namespace.clone(),
                        ),
                        None => (be.name.clone(), be.schema_name.clone(), be.namespace.clone()),
                    };
                    let mut constant = const_name(&schema_name);
                    if schema_name == PCDATA {
                        name = "pcdata".to_string();
                        constant = "PCDATA".to_string();
                    }
                    if let Some((renamed, n)) = uniquify(&sink.used, &name) {
                        self.diagnostics.renamed_property(&sink.bean, &name, &renamed);
                        constant = format!("{}{}", constant, n);
                        name = renamed;
                    }
                    sink.used.insert(name.clone());

                    let node = graph.resolved(element);
                    let mut extra_data = link.extra_data.clone();
                    extra_data.extend(node.extra_data().iter().cloned());

                    // Choice members and nillable values need an object type
                    let mut type_name = be.class_type.clone();
                    if !be.type_set_externally && (ored || link.nillable) && type_name == "boolean" {
                        type_name = "Boolean".to_string();
                    }

                    if self.config.trace.gen {
                        trace!(
                            bean = %sink.bean,
                            property = %name,
                            schema_name = %schema_name,
                            type_name = %type_name,
                            nesting_level,
                            "property"
                        );
                    }

                    sink.properties.push(Property {
                        name: name.clone(),
                        schema_name,
                        namespace,
                        owning_node: Some(canonical),
                        defining_link: Some(l),
                        type_name,
                        nesting_level,
                        element_cardinality: link.element_cardinality,
                        group_cardinality: group,
                        is_choice_member: ored,
                        default_value: link.default_value.clone(),
                        nillable: link.nillable,
                        is_direct_child: true,
                        extra_data,
                        is_union: node.is_union(),
                        can_be_empty: be.can_be_empty,
                        const_name: constant,
                        bean_type: be.bean_type,
                        attribute: None,
                    });

                    // A leaf's attributes become properties of this bean
                    if !be.bean_type.is_bean() && self.config.generation.attributes_as_properties {
                        self.add_attr_props(
                            node.attributes(),
                            &name,
                            sink,
                            link.element_cardinality,
                            false,
                        );
                    }
                }
            }

            let child_group = group.widest(link.group_cardinality);
            self.build_properties(link.first_child(), nesting_level + 1, child_group, ored, sink);

            cur = link.sibling();
        }
    }

    fn add_attr_props(
        &mut self,
        attrs: &[AttrProp],
        property: &str,
        sink: &mut PropertySink,
        group: Cardinality,
        direct_child: bool,
    ) {
        for attr in attrs {
            let base = if direct_child {
                convert_name(&attr.name)
            } else {
                convert_name(&format!("{}_{}", property, attr.name))
            };
            let name = match uniquify(&sink.used, &base) {
                Some((renamed, _)) => {
                    self.diagnostics.renamed_property(property, &base, &renamed);
                    renamed
                }
                None => base,
            };
            sink.used.insert(name.clone());

            let mut attribute = attr.clone();
            attribute.name = name.clone();

            sink.properties.push(Property {
                const_name: const_name(&name),
                name,
                schema_name: attr.dtd_name.clone(),
                namespace: attr.namespace.clone(),
                owning_node: None,
                defining_link: None,
                type_name: attr.java_type.clone().unwrap_or_else(|| "String".to_string()),
                nesting_level: 0,
                element_cardinality: attr.instance(),
                group_cardinality: group,
                is_choice_member: false,
                default_value: attr.default_value.clone(),
                nillable: false,
                is_direct_child: direct_child,
                extra_data: attr.extra_data.clone(),
                is_union: false,
                can_be_empty: false,
                bean_type: BeanType::String,
                attribute: Some(attribute),
            });
        }
    }
}

/// Record in every element link which property (by index within its bean)
/// it produced
pub fn bind_links(graph: &mut SchemaGraph, classes: &[BeanClass]) {
    for class in classes {
        for (index, property) in class.properties.iter().enumerate() {
            if let Some(l) = property.defining_link {
                graph.link_mut(l).object = Some(index);
            }
        }
    }
}
