//! Name Conversion
//!
//! Schema names become class and property names (`ship-to` -> `ShipTo`)
//! and constant names (`ship-to` -> `SHIP_TO`). Class names that clash with
//! reserved names get a prefix until they are unique.

use std::collections::HashSet;

/// Separators dropped from schema names; the next character is capitalized
const SEPARATORS: [char; 6] = ['-', '_', '.', ':', ' ', '#'];

/// Names a generated class must never take
const RESERVED_CLASS_NAMES: &[&str] = &[
    "Object", "Thread", "Compiler", "Class", "ClassLoader", "Package", "String", "Boolean",
    "Integer", "Long", "Short", "Double", "Float", "Byte", "Character", "int", "char", "byte",
    "short", "long", "double", "float", "boolean", "void",
];

/// Prefix for clashing class names without a namespace
pub const UNIQUE_PREFIX: &str = "My";

/// `xxx-yyy` -> `XxxYyy`
pub fn convert_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut capitalize_next = true;

    for c in name.chars() {
        if SEPARATORS.contains(&c) {
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}

/// `xxx-yyy` -> `XXX_YYY`
pub fn const_name(name: &str) -> String {
    name.chars()
        .filter(|&c| c != '#')
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// First free `base2`, `base3`, ... when `base` is taken
pub fn uniquify(used: &HashSet<String>, base: &str) -> Option<(String, usize)> {
    if !used.contains(base) {
        return None;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}{}", base, n);
        if !used.contains(&candidate) {
            return Some((candidate, n));
        }
        n += 1;
    }
}

/// Class names already taken, built-in or by earlier beans
#[derive(Debug, Clone)]
pub struct ReservedNames {
    names: HashSet<String>,
}

impl ReservedNames {
    pub fn new(extra: &[String]) -> Self {
        let mut names: HashSet<String> = RESERVED_CLASS_NAMES.iter().map(|s| s.to_string()).collect();
        names.extend(extra.iter().cloned());
        Self { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Take `name`, prefixing it until it is free
    pub fn claim(&mut self, name: &str, namespace: Option<&str>) -> String {
        let prefix = namespace
            .map(convert_name)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| UNIQUE_PREFIX.to_string());

        let mut candidate = name.to_string();
        while self.names.contains(&candidate) {
            candidate = format!("{}{}", prefix, candidate);
        }
        self.names.insert(candidate.clone());
        candidate
    }
}

impl Default for ReservedNames {
    fn default() -> Self {
        Self::new(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_name() {
        assert_eq!(convert_name("ship-to"), "ShipTo");
        assert_eq!(convert_name("shipTo"), "ShipTo");
        assert_eq!(convert_name("po:item.list"), "PoItemList");
        assert_eq!(convert_name("ShipTo_country"), "ShipToCountry");
        assert_eq!(convert_name("#PCDATA"), "PCDATA");
        assert_eq!(convert_name(""), "");
    }

    #[test]
    fn test_const_name() {
        assert_eq!(const_name("ship-to"), "SHIP_TO");
        assert_eq!(const_name("billTo"), "BILLTO");
        assert_eq!(const_name("#PCDATA"), "PCDATA");
    }

    #[test]
    fn test_uniquify() {
        let mut used = HashSet::new();
        assert_eq!(uniquify(&used, "Name"), None);
        used.insert("Name".to_string());
        used.insert("Name2".to_string());
        assert_eq!(uniquify(&used, "Name"), Some(("Name3".to_string(), 3)));
    }

    #[test]
    fn test_reserved_class_names() {
        let mut reserved = ReservedNames::new(&["Order".to_string()]);
        assert_eq!(reserved.claim("String", None), "MyString");
        assert_eq!(reserved.claim("Order", Some("purchase-order")), "PurchaseOrderOrder");
        assert_eq!(reserved.claim("Item", None), "Item");
        // Taken by the previous claim
        assert_eq!(reserved.claim("Item", None), "MyItem");
        assert_eq!(reserved.claim("Item", None), "MyMyItem");
    }
}
