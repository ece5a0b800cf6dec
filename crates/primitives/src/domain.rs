//! Domain elements
//!
//! Caller-defined nodes with their own labels and properties. Their content
//! hash is the tuple of property values ordered by property name, so two
//! domain elements with equal attributes collide in a set regardless of
//! their names.

use std::sync::Arc;

use graphads_core::schema::{label, prop};
use graphads_core::{
    tuple_form, Error, HashTag, NodeRecord, ObjectName, Properties, Result, Statement, Value,
};
use graphads_engine::Database;

use crate::element::{Element, Identity, Lifecycle};

/// A caller-defined node
#[derive(Debug, Clone)]
pub struct DomainElement {
    id: Identity,
    labels: Vec<String>,
    properties: Properties,
}

impl DomainElement {
    /// Unsaved element; anonymous when `name` is `None`
    ///
    /// `Null` properties are dropped and a `name` property is ignored; the
    /// element's name is its logical name.
    ///
    /// # Errors
    ///
    /// `Construction` when a label is one this system assigns itself.
    pub fn new<L, S>(
        db: Arc<Database>,
        labels: L,
        properties: Properties,
        name: Option<&str>,
    ) -> Result<Self>
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if let Some(reserved) = labels.iter().find(|l| label::is_reserved(l)) {
            return Err(Error::Construction(format!(
                "label {:?} is reserved and cannot mark a domain element",
                reserved
            )));
        }
        let mut element = Self {
            id: Identity::new(db, name),
            labels,
            properties: Properties::new(),
        };
        for (key, value) in properties {
            element.set_property(key, value);
        }
        Ok(element)
    }

    /// Construct and save in one step
    pub fn create<L, S>(
        db: Arc<Database>,
        labels: L,
        properties: Properties,
        name: Option<&str>,
    ) -> Result<Self>
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut element = Self::new(db, labels, properties, name)?;
        element.save()?;
        Ok(element)
    }

    /// Handle on an existing node
    pub fn from_record(db: Arc<Database>, record: &NodeRecord) -> Result<Self> {
        if !record.has_label(label::DOMAIN) {
            return Err(Error::type_mismatch(
                "DomainElement::from_record",
                "DomainElement",
                record.labels.join(":"),
            ));
        }
        Ok(Self {
            id: Identity::saved(db, record.require_name()?),
            labels: own_labels(&record.labels),
            properties: payload(record),
        })
    }

    /// Caller-chosen labels
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Local properties, name excluded
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// One local property
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Set a property locally; `Null` removes it
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if key == prop::NAME {
            return;
        }
        let value = value.into();
        if value.is_null() {
            self.properties.remove(&key);
        } else {
            self.properties.insert(key, value);
        }
    }

    /// Create the node, or replace the properties of an existing one
    pub fn save(&mut self) -> Result<()> {
        match self.id.state {
            Lifecycle::Unsaved => {
                let mut labels = vec![label::ELEMENT.to_string(), label::DOMAIN.to_string()];
                labels.extend(self.labels.iter().cloned());
                self.id.create(labels, self.properties.clone())
            }
            Lifecycle::Saved => {
                // Keys removed locally are removed in the store too
                let stored = self.fetch()?;
                let mut update = self.properties.clone();
                for (key, _) in stored.payload() {
                    if !update.contains_key(key) {
                        update.insert(key.clone(), Value::Null);
                    }
                }
                self.id.db.run(&Statement::UpdateProperties {
                    name: self.id.name.clone(),
                    properties: update,
                })?;
                Ok(())
            }
            Lifecycle::Deleted => Err(Error::ObjectDeleted { operation: "save" }),
        }
    }

    /// Reload properties from the store
    pub fn refresh(&mut self) -> Result<()> {
        self.id.check("refresh")?;
        let record = self.fetch()?;
        self.properties = payload(&record);
        Ok(())
    }

    /// Remove the node; fails while a container holds it
    pub fn delete(&mut self) -> Result<()> {
        self.id.delete("delete")
    }

    fn fetch(&self) -> Result<NodeRecord> {
        self.id
            .db
            .run(&Statement::FetchNode {
                name: self.id.name.clone(),
            })?
            .into_optional_node()?
            .ok_or_else(|| Error::ObjectNotFound(self.id.name.to_string()))
    }
}

impl Element for DomainElement {
    fn name(&self) -> &ObjectName {
        &self.id.name
    }

    fn lifecycle(&self) -> Lifecycle {
        self.id.state
    }

    fn kind(&self) -> &'static str {
        "DomainElement"
    }

    fn hash_tag(&self) -> Result<HashTag> {
        Ok(HashTag::of_canonical(&tuple_form(self.properties.values())))
    }
}

fn payload(record: &NodeRecord) -> Properties {
    record
        .payload()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn own_labels(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .filter(|l| *l != label::ELEMENT && *l != label::DOMAIN)
        .cloned()
        .collect()
}
