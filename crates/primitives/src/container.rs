//! Container invariant layer
//!
//! State and bookkeeping shared by lists, sets and maps: the cached length,
//! the non-empty delete rule, bulk clear and destroy.

use std::sync::Arc;

use graphads_core::schema::prop;
use graphads_core::{
    ContainerFamily, Error, NodeRecord, ObjectName, Outcome, Properties, Result, Statement, Value,
};
use graphads_engine::Database;
use tracing::debug;

use crate::element::{Identity, Lifecycle};

#[derive(Debug, Clone)]
pub(crate) struct ContainerCore {
    pub id: Identity,
    pub family: ContainerFamily,
    pub length: u64,
}

impl ContainerCore {
    pub fn new(db: Arc<Database>, family: ContainerFamily, name: Option<&str>) -> Self {
        Self {
            id: Identity::new(db, name),
            family,
            length: 0,
        }
    }

    pub fn from_record(
        db: Arc<Database>,
        family: ContainerFamily,
        record: &NodeRecord,
    ) -> Result<Self> {
        if ContainerFamily::from_labels(&record.labels) != Some(family) {
            return Err(Error::type_mismatch(
                "from_record",
                family.label(),
                record.labels.join(":"),
            ));
        }
        Ok(Self {
            id: Identity::saved(db, record.require_name()?),
            family,
            length: record.length(),
        })
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.id.db
    }

    pub fn name(&self) -> &ObjectName {
        &self.id.name
    }

    pub fn check(&self, operation: &'static str) -> Result<()> {
        self.id.check(operation)
    }

    /// Create the empty container node; saving twice is a no-op
    pub fn save(&mut self) -> Result<()> {
        if self.id.state == Lifecycle::Saved {
            return Ok(());
        }
        let mut properties = Properties::new();
        properties.insert(prop::LENGTH.to_string(), Value::Int(0));
        self.id.create(self.family.node_labels(), properties)?;
        self.length = 0;
        debug!(
            target: "graphads::container",
            name = %self.id.name,
            family = self.family.label(),
            "created"
        );
        Ok(())
    }

    /// Creation of the empty node, for callers that batch it with other writes
    pub fn create_statement(&self) -> Statement {
        let mut properties = Properties::new();
        properties.insert(prop::NAME.to_string(), Value::from(self.id.name.as_str()));
        properties.insert(prop::LENGTH.to_string(), Value::Int(0));
        Statement::CreateNode {
            labels: self.family.node_labels(),
            properties,
        }
    }

    pub fn len(&self, operation: &'static str) -> Result<u64> {
        self.check(operation)?;
        Ok(self.length)
    }

    pub fn not_empty(&self) -> Error {
        Error::ContainerNotEmpty {
            name: self.id.name.to_string(),
            kind: self.family.label(),
        }
    }

    /// Take the stored length reported by a bookkeeping statement
    pub fn apply_length(&mut self, outcome: &Outcome) -> Result<()> {
        self.length = outcome.length()?;
        Ok(())
    }

    pub fn recount(&self) -> Statement {
        Statement::Recount {
            container: self.id.name.clone(),
            family: self.family,
        }
    }

    pub fn clear_items(&self) -> Statement {
        Statement::ClearItems {
            container: self.id.name.clone(),
            family: self.family,
        }
    }

    /// Re-read the stored length
    pub fn refresh(&mut self) -> Result<()> {
        self.check("refresh")?;
        let record = self
            .db()
            .run(&Statement::FetchNode {
                name: self.id.name.clone(),
            })?
            .into_optional_node()?
            .ok_or_else(|| Error::ObjectNotFound(self.id.name.to_string()))?;
        self.length = record.length();
        Ok(())
    }

    /// Delete every wrapper item; the stored and cached length become zero
    pub fn clear(&mut self) -> Result<()> {
        self.check("clear")?;
        let removed = self.db().run(&self.clear_items())?.count()?;
        debug!(target: "graphads::container", name = %self.id.name, removed, "cleared");
        self.length = 0;
        Ok(())
    }

    /// Remove the container node; only empty containers may go
    pub fn delete(&mut self) -> Result<()> {
        if self.len("delete")? > 0 {
            return Err(self.not_empty());
        }
        self.id.delete("delete")
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.clear()?;
        self.delete()
    }

    /// Reset before a bulk build; a populated container needs `auto_reset`
    pub fn reset_statement(&self, auto_reset: bool) -> Result<Option<Statement>> {
        match (self.length, auto_reset) {
            (0, _) => Ok(None),
            (_, true) => Ok(Some(self.clear_items())),
            (_, false) => Err(self.not_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsaved_container_refuses_len() {
        let core = ContainerCore::new(Database::ephemeral(), ContainerFamily::Set, None);
        assert!(matches!(core.len("len"), Err(Error::ObjectUnsaved { .. })));
    }

    #[test]
    fn test_delete_non_empty_is_rejected() {
        let mut core = ContainerCore::new(Database::ephemeral(), ContainerFamily::List, Some("l"));
        core.save().unwrap();
        core.length = 2;
        assert!(matches!(
            core.delete(),
            Err(Error::ContainerNotEmpty { kind: "List", .. })
        ));
        assert_eq!(core.id.state, Lifecycle::Saved);
    }

    #[test]
    fn test_reset_statement() {
        let mut core = ContainerCore::new(Database::ephemeral(), ContainerFamily::Set, Some("s"));
        core.save().unwrap();
        assert_eq!(core.reset_statement(false).unwrap(), None);
        core.length = 1;
        assert!(core.reset_statement(false).is_err());
        assert!(matches!(
            core.reset_statement(true).unwrap(),
            Some(Statement::ClearItems { .. })
        ));
    }

    #[test]
    fn test_from_record_checks_family() {
        let db = Database::ephemeral();
        let mut core = ContainerCore::new(db.clone(), ContainerFamily::Map, Some("m"));
        core.save().unwrap();
        let record = db
            .run(&Statement::FetchNode {
                name: ObjectName::new("m"),
            })
            .unwrap()
            .into_optional_node()
            .unwrap()
            .unwrap();
        assert!(ContainerCore::from_record(db.clone(), ContainerFamily::Map, &record).is_ok());
        assert!(matches!(
            ContainerCore::from_record(db, ContainerFamily::Set, &record),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
