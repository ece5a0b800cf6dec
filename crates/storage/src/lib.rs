//! Storage backends for graphads
//!
//! This crate implements the `GraphStore` trait twice:
//! - MemoryGraph: in-process labeled property graph (tests, ephemeral sessions)
//! - Neo4jStore: Cypher over the Neo4j HTTP transactional endpoint
//!
//! The `cypher` module compiles the statement vocabulary to parameterized
//! Cypher and is usable on its own for inspection.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cypher;
pub mod memory;
pub mod neo4j;

pub use cypher::{render, render_schema, CypherQuery};
pub use memory::MemoryGraph;
pub use neo4j::{Neo4jSettings, Neo4jStore};
