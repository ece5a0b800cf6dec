//! Graph schema shared by every backend
//!
//! Labels, relationship types and property keys used by the container engine.
//! Both the in-process graph and the Cypher renderer read these constants so
//! the two backends always agree on layout.
//!
//! ```text
//! (:List)-[:NEXT]->(:ListItem)-[:NEXT]->(:ListItem)
//!                  (:ListItem)<-[:PREV]-(:ListItem)
//! (:Set)-[:MEMBER]->(:SetItem {hash})
//! (:Map)-[:KEYS]->(:Set), (:Map)-[:VALUES]->(:Set)
//! (:Item)-[:HOLDS]->(:Element)
//! (:Container)-[:STAGED {scope, ordinal}]->(:Item)   during bulk builds only
//! ```

/// Node labels
pub mod label {
    /// Every named node
    pub const ELEMENT: &str = "Element";
    /// Typed values owned by this system
    pub const VARIABLE: &str = "Variable";
    /// Caller-defined payload nodes
    pub const DOMAIN: &str = "Domain";
    /// Scalar number variable
    pub const NUMBER: &str = "Number";
    /// Scalar date variable
    pub const DATE: &str = "Date";
    /// Scalar string variable
    pub const TEXT: &str = "Text";
    /// Number array variable
    pub const NUMBER_ARRAY: &str = "NumberArray";
    /// String array variable
    pub const TEXT_ARRAY: &str = "TextArray";
    /// Date array variable
    pub const DATE_ARRAY: &str = "DateArray";
    /// Persisted query text
    pub const STORED_QUERY: &str = "StoredQuery";
    /// Any container
    pub const CONTAINER: &str = "Container";
    /// Doubly linked list
    pub const LIST: &str = "List";
    /// Hash-uniqued set
    pub const SET: &str = "Set";
    /// Key/value map
    pub const MAP: &str = "Map";
    /// Any wrapper item
    pub const ITEM: &str = "Item";
    /// List wrapper item
    pub const LIST_ITEM: &str = "ListItem";
    /// Set wrapper item
    pub const SET_ITEM: &str = "SetItem";

    /// Every label above; caller-defined nodes may not carry these
    pub const RESERVED: &[&str] = &[
        ELEMENT,
        VARIABLE,
        DOMAIN,
        NUMBER,
        DATE,
        TEXT,
        NUMBER_ARRAY,
        TEXT_ARRAY,
        DATE_ARRAY,
        STORED_QUERY,
        CONTAINER,
        LIST,
        SET,
        MAP,
        ITEM,
        LIST_ITEM,
        SET_ITEM,
    ];

    /// True for a label this system assigns itself
    pub fn is_reserved(candidate: &str) -> bool {
        RESERVED.contains(&candidate)
    }
}

/// Relationship types
pub mod rel {
    /// List to head, item to successor
    pub const NEXT: &str = "NEXT";
    /// Item to predecessor
    pub const PREV: &str = "PREV";
    /// Set to item
    pub const MEMBER: &str = "MEMBER";
    /// Item to payload element
    pub const HOLDS: &str = "HOLDS";
    /// Map to key set
    pub const KEYS: &str = "KEYS";
    /// Map to value set
    pub const VALUES: &str = "VALUES";
    /// Temporary bulk-build edge
    pub const STAGED: &str = "STAGED";
}

/// Property keys
pub mod prop {
    /// Logical name
    pub const NAME: &str = "name";
    /// Variable payload or query text
    pub const VALUE: &str = "value";
    /// Cached container length
    pub const LENGTH: &str = "length";
    /// Item hash tag
    pub const HASH: &str = "hash";
    /// Staging edge owner
    pub const SCOPE: &str = "scope";
    /// Staging edge position
    pub const ORDINAL: &str = "ordinal";
    /// Stored query result shape
    pub const SHAPE: &str = "shape";
}

/// Store-enforced uniqueness: (label, property)
pub const UNIQUE_CONSTRAINTS: &[(&str, &str)] = &[
    (label::ELEMENT, prop::NAME),
    (label::STORED_QUERY, prop::VALUE),
];

/// Regular expression matching anonymous names inside Cypher
pub const ANONYMOUS_NAME_PATTERN: &str = "^[0-9a-f]{32}$";

/// Container family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFamily {
    /// Doubly linked list
    List,
    /// Hash-uniqued set
    Set,
    /// Key/value map
    Map,
}

impl ContainerFamily {
    /// Label carried by containers of this family
    pub fn label(&self) -> &'static str {
        match self {
            ContainerFamily::List => label::LIST,
            ContainerFamily::Set => label::SET,
            ContainerFamily::Map => label::MAP,
        }
    }

    /// Label carried by this family's wrapper items
    ///
    /// Maps hold no items directly; their component sets do.
    pub fn item_label(&self) -> &'static str {
        match self {
            ContainerFamily::List => label::LIST_ITEM,
            ContainerFamily::Set | ContainerFamily::Map => label::SET_ITEM,
        }
    }

    /// Full label set for a new container node
    pub fn node_labels(&self) -> Vec<String> {
        vec![
            label::ELEMENT.to_string(),
            label::CONTAINER.to_string(),
            self.label().to_string(),
        ]
    }

    /// Resolve from a node's labels
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Option<Self> {
        labels.iter().find_map(|l| match l.as_ref() {
            label::LIST => Some(ContainerFamily::List),
            label::SET => Some(ContainerFamily::Set),
            label::MAP => Some(ContainerFamily::Map),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_from_labels() {
        let labels = ["Element", "Container", "Set"];
        assert_eq!(ContainerFamily::from_labels(&labels), Some(ContainerFamily::Set));
        assert_eq!(ContainerFamily::from_labels(&["Element", "Number"]), None);
    }

    #[test]
    fn test_reserved_labels_cover_registry() {
        assert!(label::is_reserved(label::NUMBER));
        assert!(label::is_reserved(label::VARIABLE));
        assert!(label::is_reserved(label::LIST_ITEM));
        assert!(!label::is_reserved("Paper"));
        assert!(!label::is_reserved("number"));
    }

    #[test]
    fn test_node_labels_include_element() {
        let labels = ContainerFamily::List.node_labels();
        assert!(labels.iter().any(|l| l == label::ELEMENT));
        assert!(labels.iter().any(|l| l == label::LIST));
    }
}
