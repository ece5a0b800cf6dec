//! Row sources for bulk construction

use serde::{Deserialize, Serialize};

use crate::types::ObjectName;

/// Which nodes a bulk build or selection reads
///
/// Every variant yields an ordered stream of nodes. `Names` and `Ids` keep the
/// caller's order, `Label` yields nodes in creation order, and `Cypher` keeps
/// whatever order the fragment produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selector {
    /// Elements by logical name, in the given order
    Names(Vec<ObjectName>),
    /// All nodes carrying a label
    Label(String),
    /// Nodes by store id, in the given order
    Ids(Vec<i64>),
    /// A raw `MATCH ...` fragment binding the variable `item`
    ///
    /// Only backends that execute Cypher accept this variant.
    Cypher(String),
}

impl Selector {
    /// Select elements by name
    pub fn names<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<ObjectName>,
    {
        Selector::Names(names.into_iter().map(Into::into).collect())
    }

    /// Select every node with a label
    pub fn label(label: impl Into<String>) -> Self {
        Selector::Label(label.into())
    }

    /// Select a raw Cypher pattern
    pub fn cypher(fragment: impl Into<String>) -> Self {
        Selector::Cypher(fragment.into())
    }

    /// Short tag for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Selector::Names(_) => "names",
            Selector::Label(_) => "label",
            Selector::Ids(_) => "ids",
            Selector::Cypher(_) => "cypher",
        }
    }
}
