//! Node records returned by the store

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{label, prop};
use crate::types::{HashTag, ObjectName};
use crate::value::{Properties, Value};

/// A matched node: store id, labels and properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Store-assigned numeric id
    pub id: i64,
    /// Labels in store order
    pub labels: Vec<String>,
    /// All properties
    pub properties: Properties,
}

impl NodeRecord {
    /// Check for a label
    pub fn has_label(&self, wanted: &str) -> bool {
        self.labels.iter().any(|l| l == wanted)
    }

    /// Property by key
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Logical name, if the node is an Element
    pub fn name(&self) -> Option<ObjectName> {
        self.property(prop::NAME)
            .and_then(Value::as_str)
            .map(ObjectName::from)
    }

    /// Logical name, required
    ///
    /// # Errors
    /// Returns `Error::Protocol` when the node carries no string `name`.
    pub fn require_name(&self) -> Result<ObjectName> {
        self.name()
            .ok_or_else(|| Error::protocol(format!("node {} has no name", self.id)))
    }

    /// Cached container length (0 when absent)
    pub fn length(&self) -> u64 {
        match self.property(prop::LENGTH) {
            Some(Value::Int(n)) if *n > 0 => *n as u64,
            Some(Value::Float(f)) if *f > 0.0 => *f as u64,
            _ => 0,
        }
    }

    /// Hash tag of a wrapper item
    pub fn hash_tag(&self) -> Result<Option<HashTag>> {
        match self.property(prop::HASH) {
            Some(Value::String(s)) => HashTag::from_hex(s).map(Some),
            Some(other) => Err(Error::protocol(format!(
                "hash property of node {} is {}",
                self.id,
                other.type_name()
            ))),
            None => Ok(None),
        }
    }

    /// Properties excluding the addressing `name`, sorted by key
    pub fn payload(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.properties.iter().filter(|(k, _)| k.as_str() != prop::NAME)
    }

    /// True for nodes owned by the element layer
    pub fn is_element(&self) -> bool {
        self.has_label(label::ELEMENT)
    }
}
