//! Element identity and lifecycle
//!
//! Every handle in this crate wraps one named node. A handle starts
//! `Unsaved`, becomes `Saved` once its node exists, and ends `Deleted`.
//! Operations check the state before touching the store, so misuse fails
//! locally instead of as an empty match on the server.

use std::sync::Arc;

use graphads_core::{Error, HashTag, ObjectName, Properties, Result, Statement, Value};
use graphads_engine::Database;

/// Where a handle is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed locally, no node yet
    Unsaved,
    /// Node exists
    Saved,
    /// Node removed through this handle
    Deleted,
}

impl Lifecycle {
    /// Pre-action check: only saved handles may act
    pub fn check(self, operation: &'static str) -> Result<()> {
        match self {
            Lifecycle::Saved => Ok(()),
            Lifecycle::Unsaved => Err(Error::ObjectUnsaved { operation }),
            Lifecycle::Deleted => Err(Error::ObjectDeleted { operation }),
        }
    }
}

/// Anything that can be held by a container
pub trait Element {
    /// Logical name, the addressing key in every statement
    fn name(&self) -> &ObjectName;

    /// Current lifecycle state
    fn lifecycle(&self) -> Lifecycle;

    /// Type name for faults
    fn kind(&self) -> &'static str;

    /// Content hash used for set and map membership
    ///
    /// Never touches the store.
    fn hash_tag(&self) -> Result<HashTag> {
        Err(Error::Unhashable(self.kind()))
    }

    /// Pre-action check with this element's state
    fn ensure_saved(&self, operation: &'static str) -> Result<()> {
        self.lifecycle().check(operation)
    }
}

/// Name and state shared by every handle
#[derive(Debug, Clone)]
pub(crate) struct Identity {
    pub db: Arc<Database>,
    pub name: ObjectName,
    pub state: Lifecycle,
}

impl Identity {
    pub fn new(db: Arc<Database>, name: Option<&str>) -> Self {
        Self {
            db,
            name: name.map(ObjectName::new).unwrap_or_else(ObjectName::anonymous),
            state: Lifecycle::Unsaved,
        }
    }

    pub fn saved(db: Arc<Database>, name: ObjectName) -> Self {
        Self {
            db,
            name,
            state: Lifecycle::Saved,
        }
    }

    pub fn check(&self, operation: &'static str) -> Result<()> {
        self.state.check(operation)
    }

    /// Create the node; `properties` must not carry the name
    pub fn create(&mut self, labels: Vec<String>, mut properties: Properties) -> Result<()> {
        if self.state == Lifecycle::Deleted {
            return Err(Error::ObjectDeleted { operation: "save" });
        }
        properties.insert(
            graphads_core::schema::prop::NAME.to_string(),
            Value::from(self.name.as_str()),
        );
        self.db.run(&Statement::CreateNode { labels, properties })?;
        self.state = Lifecycle::Saved;
        Ok(())
    }

    /// Remove the node; fails while anything still points at it
    pub fn delete(&mut self, operation: &'static str) -> Result<()> {
        self.check(operation)?;
        self.db.run(&Statement::DeleteNode {
            name: self.name.clone(),
            detach: false,
        })?;
        self.state = Lifecycle::Deleted;
        Ok(())
    }
}
