//! Error types for graphads
//!
//! This module defines every fault the container engine can raise.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! All faults are returned synchronously at the point of detection. Nothing is
//! retried internally: a transport failure propagates exactly like a logic fault.

use std::io;
use thiserror::Error;

/// Result type alias for graphads operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the graphads container engine
#[derive(Debug, Error)]
pub enum Error {
    /// Operation attempted on an element or container that was never saved
    #[error("Operation {operation} attempted on unsaved object")]
    ObjectUnsaved {
        /// Name of the rejected operation
        operation: &'static str,
    },

    /// Operation attempted on an element or container already removed from the store
    #[error("Operation {operation} attempted on deleted object")]
    ObjectDeleted {
        /// Name of the rejected operation
        operation: &'static str,
    },

    /// Delete or reset attempted on a populated container
    #[error("Container {name} of type {kind} is not empty")]
    ContainerNotEmpty {
        /// Logical name of the container
        name: String,
        /// Container family (List, Set, Map, ...)
        kind: &'static str,
    },

    /// A value of the wrong kind was supplied
    #[error("Type mismatch in {context}: expected {expected}, received {found}")]
    TypeMismatch {
        /// Operation that performed the check
        context: &'static str,
        /// Kind that was expected
        expected: &'static str,
        /// Kind that was received
        found: String,
    },

    /// Index outside `[0, length)`
    #[error("Index {index} out of bounds for length {length}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Length at the time of the request
        length: u64,
    },

    /// Map lookup or hash-keyed set access for an absent key
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Hashing requested on a kind that does not support it
    #[error("Unhashable type {0}")]
    Unhashable(&'static str),

    /// Result read from a stored query before it was executed
    #[error("Query not executed: {0}")]
    QueryNotExecuted(String),

    /// No element with the requested name exists in the store
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Missing or invalid connection settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The store-enforced unique name constraint was violated
    #[error("Name conflict: {0}")]
    NameConflict(String),

    /// A node could not be deleted because relationships still point at it
    #[error("Node still referenced: {0}")]
    StillReferenced(String),

    /// Bulk construction inputs are inconsistent
    #[error("Construction error: {0}")]
    Construction(String),

    /// Network or connection failure talking to the store
    #[error("Transport error: {0}")]
    Transport(String),

    /// The store rejected a statement
    #[error("Store error [{code}]: {message}")]
    Store {
        /// Store-specific status code
        code: String,
        /// Store-provided message
        message: String,
    },

    /// The store answered with a result of unexpected shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The backend cannot execute this statement
    #[error("Unsupported statement for {backend}: {statement}")]
    Unsupported {
        /// Backend name
        backend: &'static str,
        /// Statement kind
        statement: &'static str,
    },

    /// I/O error (configuration files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Build a type mismatch fault
    pub fn type_mismatch(
        context: &'static str,
        expected: &'static str,
        found: impl Into<String>,
    ) -> Self {
        Error::TypeMismatch {
            context,
            expected,
            found: found.into(),
        }
    }

    /// Build a protocol fault
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(message.into())
    }

    /// Build a configuration fault
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// True for faults raised by the lifecycle pre-flight check
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Error::ObjectUnsaved { .. } | Error::ObjectDeleted { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Protocol(e.to_string())
    }
}
