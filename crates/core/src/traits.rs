//! Core trait for the backing store
//!
//! This module defines the GraphStore trait that lets the container engine run
//! against a remote Neo4j server or the in-process reference graph without
//! changes to upper layers (engine, primitives).

use crate::error::Result;
use crate::statement::{Outcome, Statement};

/// Backing store abstraction
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync). Handles share one store through
/// an `Arc`.
pub trait GraphStore: Send + Sync {
    /// Backend name for logging and unsupported-statement faults
    fn backend_name(&self) -> &'static str;

    /// Execute one statement in its own transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the statement, the transport
    /// fails, or the result has an unexpected shape.
    fn run(&self, statement: &Statement) -> Result<Outcome>;

    /// Execute statements in order inside one transaction
    ///
    /// Either every statement commits or none does. Outcomes are returned in
    /// statement order.
    ///
    /// # Errors
    ///
    /// Returns the first failure; nothing from the batch is visible afterwards.
    fn run_batch(&self, statements: &[Statement]) -> Result<Vec<Outcome>>;

    /// Execute statements in order, each in its own transaction
    ///
    /// Stops at the first failure. Statements before it stay committed.
    fn run_sequential(&self, statements: &[Statement]) -> Result<Vec<Outcome>> {
        statements.iter().map(|s| self.run(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::ObjectName;
    use std::sync::atomic::{AtomicU64, Ordering};

    // Minimal store that counts statements and refuses every DeleteNode
    #[derive(Default)]
    struct CountingStore {
        executed: AtomicU64,
    }

    impl GraphStore for CountingStore {
        fn backend_name(&self) -> &'static str {
            "counting"
        }

        fn run(&self, statement: &Statement) -> Result<Outcome> {
            if let Statement::DeleteNode { name, .. } = statement {
                return Err(Error::StillReferenced(name.to_string()));
            }
            Ok(Outcome::Count(self.executed.fetch_add(1, Ordering::SeqCst) + 1))
        }

        fn run_batch(&self, statements: &[Statement]) -> Result<Vec<Outcome>> {
            self.run_sequential(statements)
        }
    }

    fn drop_staged(name: &str) -> Statement {
        Statement::DropStaged {
            container: ObjectName::new(name),
        }
    }

    #[test]
    fn test_sequential_runs_in_order() {
        let store = CountingStore::default();
        let outcomes = store
            .run_sequential(&[drop_staged("a"), drop_staged("b")])
            .unwrap();
        assert_eq!(outcomes, vec![Outcome::Count(1), Outcome::Count(2)]);
    }

    #[test]
    fn test_sequential_stops_at_first_failure() {
        let store = CountingStore::default();
        let result = store.run_sequential(&[
            drop_staged("a"),
            Statement::DeleteNode {
                name: ObjectName::new("x"),
                detach: false,
            },
            drop_staged("b"),
        ]);
        assert!(matches!(result, Err(Error::StillReferenced(_))));
        assert_eq!(store.executed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_store_is_object_safe() {
        let store: Box<dyn GraphStore> = Box::new(CountingStore::default());
        assert_eq!(store.backend_name(), "counting");
    }
}
