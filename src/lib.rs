//! graphads - linked lists, sets and maps stored in a property graph
//!
//! Containers keep their entire state in a Neo4j graph (or an in-process
//! reference graph) and are read and rewritten through declarative
//! statements, one round trip or one statement batch per operation.
//!
//! # Quick Start
//!
//! ```ignore
//! use graphads::{List, MemoryManager, Set, SimpleNumber};
//!
//! // Connect using NEO4J_URL or NEO4J_USERNAME / NEO4J_PASSWORD
//! let manager = MemoryManager::from_env()?;
//! let db = manager.database().clone();
//!
//! let mut u = Set::create(db.clone(), Some("U"))?;
//! u.add(&SimpleNumber::create(db.clone(), 1.0, None)?)?;
//!
//! let mut list = List::create(db.clone(), Some("numbers"))?;
//! list.append(&SimpleNumber::create(db.clone(), 4.0, None)?)?;
//!
//! // Reclaim anonymous results nothing refers to any more
//! manager.garbage_collect()?;
//! ```
//!
//! # Architecture
//!
//! - `graphads-core`: errors, values, schema and the statement vocabulary
//! - `graphads-storage`: Cypher renderer, Neo4j HTTP store, in-process graph
//! - `graphads-engine`: database handle, statement batches, configuration, GC
//! - `graphads-primitives`: element and container handles

pub use graphads_core::{
    ContainerFamily, Error, GraphStore, HashTag, ObjectName, Properties, Result, RowSet,
    Selector, SweepPass, Value,
};
pub use graphads_engine::{ConnectionConfig, Database, GraphConfig, SweepReport};
pub use graphads_primitives::*;
pub use graphads_storage::{MemoryGraph, Neo4jSettings, Neo4jStore};
