//! Database engine for graphads
//!
//! This crate sits between the container primitives and the backing store:
//! - Database: shared store handle, statement batches, configuration
//! - GarbageCollector: ordered sweep of unreachable structure
//!
//! The engine is the only component that knows which store is in use and
//! whether batches are transactional.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod gc;

pub use database::{ConnectionConfig, Database, GraphConfig, CONFIG_FILE_NAME};
pub use gc::{GarbageCollector, SweepReport};
