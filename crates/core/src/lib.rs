//! Core types and traits for graphads
//!
//! This crate defines the foundational types used throughout the system:
//! - Error: fault taxonomy and `Result` alias
//! - Value: property value model
//! - ObjectName / HashTag: element identity and content digests
//! - schema: labels, relationship types and property keys
//! - NodeRecord: a matched node
//! - Selector: row sources for bulk construction
//! - Statement / Outcome: the statement vocabulary every backend executes
//! - GraphStore: the backing store trait

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod node;
pub mod schema;
pub mod selector;
pub mod statement;
pub mod traits;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use node::NodeRecord;
pub use schema::ContainerFamily;
pub use selector::Selector;
pub use statement::{
    ChainReport, MapComponents, Member, Outcome, RowSet, StagedEntry, StagingAnchor, StagingLink,
    Statement, SweepPass,
};
pub use traits::GraphStore;
pub use types::{is_anonymous_name, HashTag, ObjectName};
pub use value::{canonical_float, tuple_form, Properties, Value};
