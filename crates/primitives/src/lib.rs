//! Primitives layer for graphads
//!
//! Provides the element and container handles as stateless facades over the
//! Database engine:
//! - **Variable**: typed scalar and array values (`SimpleNumber`, `CompositeString`, ...)
//! - **DomainElement**: caller-defined nodes with their own labels
//! - **List**: doubly linked list of elements
//! - **Set**: hash-uniqued collection with set algebra
//! - **Map**: key/value association over two aligned sets
//! - **StoredQuery**: persisted Cypher text with list or dict results
//! - **MemoryManager**: session entry point and maintenance operations
//!
//! ## Design Principle: Stateless Facades
//!
//! A handle holds an `Arc<Database>`, its logical name, its lifecycle state
//! and whatever fields it last fetched (a container's length, a variable's
//! value). All structure lives in the store. Two handles on the same name
//! see the same container; cached fields are refreshed explicitly.
//!
//! ## Statement Batches
//!
//! Multi-step operations (append, remove, map overwrite, bulk construction)
//! run as one statement batch, transactional when the database has
//! `atomic_batches` enabled.
//!
//! ```rust,ignore
//! use graphads_primitives::*;
//!
//! let manager = MemoryManager::ephemeral();
//! let db = manager.database().clone();
//! let mut list = List::create(db.clone(), Some("numbers"))?;
//! for i in 0..10 {
//!     list.append(&SimpleNumber::create(db.clone(), i as f64, None)?)?;
//! }
//! list.remove(3)?;
//! assert_eq!(list.get(3)?.as_number(), Some(4.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod container;
pub mod domain;
pub mod element;
pub mod list;
pub mod manager;
pub mod map;
pub mod object;
pub mod query;
pub mod set;
pub mod variable;

pub use domain::DomainElement;
pub use element::{Element, Lifecycle};
pub use list::List;
pub use manager::MemoryManager;
pub use map::Map;
pub use object::Object;
pub use query::{QueryResult, ResultShape, StoredQuery};
pub use set::Set;
pub use variable::{
    ArrayKind, CompositeArrayDate, CompositeArrayNumber, CompositeArrayString, CompositeString,
    Date, DateArray, Number, NumberArray, SimpleDate, SimpleNumber, Text, TextArray, Variable,
    VariableKind,
};
