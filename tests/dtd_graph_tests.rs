//! End-to-end Tests
//!
//! Fixture DTDs run through scanner, parser, tree builder and bean builder.

use std::path::{Path, PathBuf};

use dtd_beans::graph::{DiagnosticCode, LoadConfig};
use dtd_beans::parse::EventRecorder;
use dtd_beans::{
    load_from_directory, load_from_file, AccessorShape, BeanBuilder, BeanClass, BeanType,
    BeansConfig, Cardinality, Combinator, DeclParser, Scanner, SchemaGraph,
};

fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn bean<'a>(classes: &'a [BeanClass], name: &str) -> &'a BeanClass {
    classes
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("no bean class {}", name))
}

fn property_names(class: &BeanClass) -> Vec<&str> {
    class.properties.iter().map(|p| p.name.as_str()).collect()
}

// =============================================================================
// Graph Construction
// =============================================================================

#[test]
fn test_bill_graph() {
    let g = SchemaGraph::from_str(include_str!("fixtures/bill.dtd")).unwrap();

    let bill = g.node_by_name("bill").unwrap();
    assert_eq!(g.root(), Some(bill));

    let group = g.resolved(bill).link().unwrap();
    assert!(g.link(group).is_grouping());
    let children = g.children(group);
    assert_eq!(children.len(), 2);

    let mut targets = Vec::new();
    for &c in &children {
        let link = g.link(c);
        assert_eq!(link.element_combinator, Combinator::And);
        assert_eq!(link.element_cardinality, Cardinality::ExactlyOne);
        targets.push(link.element.unwrap());
    }
    assert_ne!(targets[0], targets[1]);

    for (target, name) in targets.iter().zip(["shipTo", "billTo"]) {
        let node = g.resolved(*target);
        assert_eq!(node.name(), name);
        assert!(node.is_created());
        assert_eq!(g.ref_count(*target), 1);
    }
    assert!(g.diagnostics().is_empty());
}

#[test]
fn test_bill_events() {
    let mut parser = DeclParser::new(
        Scanner::from_str(include_str!("fixtures/bill.dtd")),
        EventRecorder::default(),
    );
    parser.parse().unwrap();
    assert_eq!(
        parser.handler().events,
        vec![
            "startDocument",
            "startElement(bill, Element)",
            "startGroup",
            "element(shipTo, 1)",
            "element(billTo, 1)",
            "endGroup(1)",
            "endElement",
            "startElement(shipTo, Element)",
            "element(EMPTY, 1)",
            "endElement",
            "startElement(billTo, Element)",
            "element(EMPTY, 1)",
            "endElement",
            "endDocument",
        ]
    );
}

#[test]
fn test_purchase_order_graph() {
    let g = load_from_file(&fixtures_path().join("purchase_order.dtd"), &LoadConfig::default())
        .unwrap();

    assert_eq!(g.root(), g.node_by_name("purchase-order"));
    assert_eq!(g.entities(), &["address-fields".to_string()]);
    assert!(g.undefined_nodes().is_empty());
    assert!(!g.diagnostics().has_warnings());
    assert_eq!(g.source_digest.len(), 64);

    // name, street and city are shared by both addresses
    let name = g.node_by_name("name").unwrap();
    assert_eq!(g.ref_count(name), 2);

    let po = g.node_by_name("purchase-order").unwrap();
    let attrs = g.resolved(po).attributes();
    assert_eq!(attrs.len(), 2);
    assert_eq!(attrs[1].values, vec!["USD", "EUR"]);
    assert_eq!(attrs[1].default_value.as_deref(), Some("USD"));

    let order = g.definition_order();
    let position = |name: &str| {
        let n = g.node_by_name(name).unwrap();
        order.iter().position(|group| group.contains(&n)).unwrap()
    };
    assert!(position("item") < position("items"));
    assert!(position("items") < position("purchase-order"));
}

#[test]
fn test_mutual_exclusion_and_xpath() {
    let g = SchemaGraph::from_str(include_str!("fixtures/purchase_order.dtd")).unwrap();
    let po = g.node_by_name("purchase-order").unwrap();

    let zip = g.xpath_from_node(po, "ship-to/zip").unwrap().resolve().unwrap();
    let postcode = g
        .xpath_from_node(po, "ship-to/postcode")
        .unwrap()
        .resolve()
        .unwrap();
    let city = g.xpath_from_node(po, "ship-to/city").unwrap().resolve().unwrap();

    assert!(g.is_mutually_exclusive(zip, postcode));
    assert!(g.is_mutually_exclusive(postcode, zip));
    assert!(!g.is_mutually_exclusive(zip, city));
    assert!(g.xpath_from_node(po, "ship-to/country").unwrap().resolve().is_none());
}

#[test]
fn test_repeated_choice_is_not_exclusive() {
    let g = SchemaGraph::from_str(include_str!("fixtures/document.dtd")).unwrap();
    let doc = g.node_by_name("document").unwrap();
    let section = g.xpath_from_node(doc, "section").unwrap().resolve().unwrap();
    let appendix = g.xpath_from_node(doc, "appendix").unwrap().resolve().unwrap();
    assert!(!g.is_mutually_exclusive(section, appendix));
    assert_eq!(g.enclosing_cardinality(section), Cardinality::OneOrMore);
}

#[test]
fn test_undefined_elements_reported() {
    let g = SchemaGraph::from_str(include_str!("fixtures/document.dtd")).unwrap();
    let mut undefined: Vec<String> = g
        .diagnostics()
        .with_code(DiagnosticCode::UndefinedElement)
        .map(|d| d.subject.clone())
        .collect();
    undefined.sort();
    assert_eq!(undefined, vec!["editor", "index"]);
    assert!(!g.diagnostics().has_warnings());
}

#[test]
fn test_directory_loads_as_one_schema() {
    let g = load_from_directory(&fixtures_path().join("split"), &LoadConfig::default()).unwrap();
    assert_eq!(g.root(), g.node_by_name("catalog"));
    assert_eq!(g.nodes().len(), 4);
    assert!(g.undefined_nodes().is_empty());
}

// =============================================================================
// Bean Materialization
// =============================================================================

#[test]
fn test_purchase_order_beans() {
    let g = SchemaGraph::from_str(include_str!("fixtures/purchase_order.dtd")).unwrap();
    let config = BeansConfig::default();
    let mut builder = BeanBuilder::new(&g, &config);
    let classes = builder.build();

    let names: Vec<&str> = classes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["PurchaseOrder", "ShipTo", "BillTo", "Items", "Item"]);
    assert_eq!(builder.package(), "purchaseorder");

    let po = bean(&classes, "PurchaseOrder");
    assert!(po.is_root);
    assert_eq!(
        property_names(po),
        vec!["OrderDate", "Currency", "ShipTo", "BillTo", "Comment", "Items"]
    );
    assert_eq!(po.property("ShipTo").unwrap().bean_type, BeanType::Bean);
    assert_eq!(po.property("ShipTo").unwrap().type_name, "ShipTo");
    assert_eq!(po.property("BillTo").unwrap().accessor_shape(), AccessorShape::Optional);
    assert_eq!(po.property("Comment").unwrap().type_name, "String");

    let ship_to = bean(&classes, "ShipTo");
    assert_eq!(
        property_names(ship_to),
        vec!["Country", "Name", "Street", "City", "Zip", "Postcode"]
    );
    assert!(ship_to.property("Zip").unwrap().is_choice_member);
    assert!(ship_to.property("Postcode").unwrap().is_choice_member);
    assert!(!ship_to.property("City").unwrap().is_choice_member);

    let items = bean(&classes, "Items");
    let item = items.property("Item").unwrap();
    assert_eq!(item.accessor_shape(), AccessorShape::Collection);
    assert_eq!(item.const_name, "ITEM");

    let gift = bean(&classes, "Item").property("Gift").unwrap();
    assert_eq!(gift.bean_type, BeanType::Boolean);
    assert_eq!(gift.type_name, "boolean");
    assert_eq!(gift.accessor_shape(), AccessorShape::Optional);
}

#[test]
fn test_document_beans() {
    let g = SchemaGraph::from_str(include_str!("fixtures/document.dtd")).unwrap();
    let config = BeansConfig::default();
    let mut builder = BeanBuilder::new(&g, &config);
    let classes = builder.build();

    // String clashes with a built-in class name
    assert!(classes.iter().all(|c| c.name != "String"));
    assert_eq!(
        builder.diagnostics().with_code(DiagnosticCode::RenamedClass).count(),
        1
    );

    let section = bean(&classes, "Section");
    assert_eq!(
        property_names(section),
        vec!["Title", "Para", "ParaId", "List", "MyString"]
    );
    let para = section.property("Para").unwrap();
    assert!(para.is_choice_member);
    assert_eq!(para.group_cardinality, Cardinality::ZeroOrMore);
    assert_eq!(para.accessor_shape(), AccessorShape::Collection);

    let para_id = section.property("ParaId").unwrap();
    assert!(para_id.is_attribute());
    assert!(!para_id.is_direct_child);
    assert_eq!(para_id.schema_name, "id");

    let document = bean(&classes, "Document");
    let index = document.property("Index").unwrap();
    assert_eq!(index.bean_type, BeanType::String);
    assert_eq!(index.accessor_shape(), AccessorShape::Optional);
}

#[test]
fn test_beans_serialize() {
    let g = SchemaGraph::from_str(include_str!("fixtures/bill.dtd")).unwrap();
    let config = BeansConfig::default();
    let classes = BeanBuilder::new(&g, &config).build();

    let json = serde_json::to_value(&classes).unwrap();
    assert_eq!(json[0]["name"], "Bill");
    assert_eq!(json[0]["bean_type"], "bean");
    assert_eq!(json[0]["properties"][0]["name"], "ShipTo");
    assert_eq!(json[0]["properties"][0]["bean_type"], "boolean");
}
