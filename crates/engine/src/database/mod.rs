//! Database struct and connection logic
//!
//! `Database` owns the backing store and the configuration every handle
//! shares. Primitives hold an `Arc<Database>` and submit statements through
//! it:
//!
//! - `run` for a single statement (its own transaction)
//! - `run_batch` for a fixed statement sequence; with `atomic_batches` on
//!   the whole sequence is one store transaction, otherwise statements
//!   commit one at a time
//!
//! ## Opening
//!
//! | Method               | Store         | Config                     |
//! |----------------------|---------------|----------------------------|
//! | `ephemeral()`        | `MemoryGraph` | defaults                   |
//! | `connect(config)`    | `Neo4jStore`  | given                      |
//! | `open(path)`         | `Neo4jStore`  | `graphads.toml` at `path`  |
//! | `with_store(..)`     | caller's      | given                      |

pub mod config;

pub use config::{ConnectionConfig, GraphConfig, CONFIG_FILE_NAME};

use std::path::Path;
use std::sync::Arc;

use graphads_core::{GraphStore, Outcome, Result, Statement};
use graphads_storage::{MemoryGraph, Neo4jStore};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

/// Shared handle on the backing store
pub struct Database {
    store: Arc<dyn GraphStore>,
    config: RwLock<GraphConfig>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.store.backend_name())
            .field("atomic_batches", &self.atomic_batches())
            .finish()
    }
}

impl Database {
    /// Database over a fresh in-process graph
    ///
    /// Nothing is persisted; the graph is dropped with the last handle.
    pub fn ephemeral() -> Arc<Self> {
        Self::with_store(Arc::new(MemoryGraph::new()), GraphConfig::default())
    }

    /// Database over any store
    pub fn with_store(store: Arc<dyn GraphStore>, config: GraphConfig) -> Arc<Self> {
        debug!(
            target: "graphads::db",
            backend = store.backend_name(),
            atomic_batches = config.atomic_batches,
            "database created"
        );
        Arc::new(Self {
            store,
            config: RwLock::new(config),
        })
    }

    /// Connect to a Neo4j server
    ///
    /// Resolves the connection settings (explicit URI, credentials, then
    /// environment) and, when `ensure_schema` is set, creates the unique
    /// name constraint and the hash index.
    ///
    /// # Errors
    ///
    /// `Configuration` when no server can be located; `Transport` or
    /// `Store` when schema creation fails.
    pub fn connect(config: GraphConfig) -> Result<Arc<Self>> {
        let settings = config.neo4j_settings()?;
        let store = Neo4jStore::new(&settings);
        if config.ensure_schema {
            store.ensure_schema()?;
        }
        info!(
            target: "graphads::db",
            url = %settings.base_url,
            database = %settings.database,
            atomic_batches = config.atomic_batches,
            "connected"
        );
        Ok(Self::with_store(Arc::new(store), config))
    }

    /// Connect using a `graphads.toml` file
    ///
    /// A missing file is created with the defaults, which then resolve the
    /// connection from the environment.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let path = path.as_ref();
        GraphConfig::write_default_if_missing(path)?;
        let config = GraphConfig::from_file(path)?;
        Self::connect(config)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Backing store
    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Backend name of the store
    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> GraphConfig {
        self.config.read().clone()
    }

    /// Modify the configuration in place
    pub fn update_config<F: FnOnce(&mut GraphConfig)>(&self, f: F) {
        let mut config = self.config.write();
        f(&mut config);
    }

    /// Whether batches run in one transaction
    pub fn atomic_batches(&self) -> bool {
        self.config.read().atomic_batches
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Run one statement
    pub fn run(&self, statement: &Statement) -> Result<Outcome> {
        self.store.run(statement).map_err(|e| {
            debug!(
                target: "graphads::db",
                statement = statement.kind(),
                error = %e,
                "statement failed"
            );
            e
        })
    }

    /// Run a statement sequence
    ///
    /// With `atomic_batches` the sequence commits as a whole or not at all.
    /// Without it, statements before a failure stay committed; the garbage
    /// collector reclaims fragments they leave behind.
    pub fn run_batch(&self, statements: &[Statement]) -> Result<Vec<Outcome>> {
        let atomic = self.atomic_batches();
        let result = if atomic {
            self.store.run_batch(statements)
        } else {
            self.store.run_sequential(statements)
        };
        if let Err(e) = &result {
            warn!(
                target: "graphads::db",
                statements = statements.len(),
                first = statements.first().map(Statement::kind).unwrap_or("none"),
                atomic,
                error = %e,
                "batch failed"
            );
        }
        result
    }
}
