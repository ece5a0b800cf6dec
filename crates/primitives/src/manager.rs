//! Memory manager
//!
//! Entry point for a session: owns the database handle every element and
//! container shares, and exposes the maintenance operations that act on the
//! whole graph rather than on one handle.

use std::path::Path;
use std::sync::Arc;

use graphads_core::{Error, ObjectName, Properties, Result, RowSet, Statement};
use graphads_engine::{Database, GarbageCollector, GraphConfig, SweepReport};
use tracing::info;

use crate::object::Object;

/// Session over one backing store
#[derive(Debug, Clone)]
pub struct MemoryManager {
    db: Arc<Database>,
}

impl MemoryManager {
    /// Connect with explicit configuration
    ///
    /// # Errors
    ///
    /// `Configuration` when no connection settings resolve.
    pub fn connect(config: GraphConfig) -> Result<Self> {
        Ok(Self::with_database(Database::connect(config)?))
    }

    /// Connect from `NEO4J_URL`, or `NEO4J_USERNAME` and `NEO4J_PASSWORD`
    pub fn from_env() -> Result<Self> {
        Self::connect(GraphConfig::default())
    }

    /// Connect with the settings in a `graphads.toml`, writing defaults if absent
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::with_database(Database::open(path)?))
    }

    /// Session over a fresh in-process graph
    pub fn ephemeral() -> Self {
        Self::with_database(Database::ephemeral())
    }

    /// Session over an existing handle
    pub fn with_database(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Shared handle for constructing elements and containers
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Names of every element in the store, sorted
    pub fn list_objects(&self) -> Result<Vec<ObjectName>> {
        self.db
            .run(&Statement::ListNames { label: None })?
            .into_names()
    }

    /// Typed handle on the element called `name`
    ///
    /// # Errors
    ///
    /// `ObjectNotFound` when nothing carries the name.
    pub fn get_object(&self, name: &str) -> Result<Object> {
        let record = self
            .db
            .run(&Statement::FetchNode {
                name: ObjectName::new(name),
            })?
            .into_optional_node()?
            .ok_or_else(|| Error::ObjectNotFound(name.to_string()))?;
        Object::from_record(Arc::clone(&self.db), &record)
    }

    /// Reclaim unreachable anonymous objects and severed list fragments
    pub fn garbage_collect(&self) -> Result<SweepReport> {
        GarbageCollector::new(Arc::clone(&self.db)).sweep()
    }

    /// Run caller-supplied Cypher
    pub fn query(&self, cypher: &str, params: Properties) -> Result<RowSet> {
        let rows = self
            .db
            .run(&Statement::Raw {
                cypher: cypher.to_string(),
                params,
            })?
            .into_rows()?;
        info!(
            target: "graphads::manager",
            columns = rows.columns.len(),
            rows = rows.rows.len(),
            "query"
        );
        Ok(rows)
    }
}
