//! MemoryGraph: in-process reference graph
//!
//! This module implements the GraphStore trait using:
//! - an adjacency-indexed node/edge map (`GraphState`)
//! - `parking_lot::RwLock` for thread-safe access
//!
//! # Design Notes
//!
//! - **Statement interpreter, not a query engine**: every `Statement` variant is
//!   executed directly; `Raw` statements and `Selector::Cypher` are unsupported.
//! - **Writes apply in place under an undo journal**: a statement or batch
//!   that fails replays the journal backwards, so nothing it did survives.
//! - **Read-only statements take the read lock**.

mod exec;
mod graph;

use parking_lot::RwLock;
use tracing::debug;

use graphads_core::{GraphStore, Outcome, Result, Statement};

use graph::GraphState;

pub(crate) const BACKEND: &str = "memory";

/// In-process graph store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: RwLock<GraphState>,
}

impl MemoryGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes currently stored
    pub fn node_count(&self) -> usize {
        self.state.read().node_count()
    }

    /// Number of relationships currently stored
    pub fn edge_count(&self) -> usize {
        self.state.read().edge_count()
    }
}

impl GraphStore for MemoryGraph {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn run(&self, statement: &Statement) -> Result<Outcome> {
        debug!(target: "graphads::store", backend = BACKEND, statement = statement.kind(), "run");
        if statement.is_read_only() {
            return self.state.read().evaluate(statement);
        }
        self.state
            .write()
            .transaction(|state| state.execute(statement))
    }

    fn run_batch(&self, statements: &[Statement]) -> Result<Vec<Outcome>> {
        debug!(
            target: "graphads::store",
            backend = BACKEND,
            statements = statements.len(),
            "run_batch"
        );
        self.state.write().transaction(|state| {
            statements
                .iter()
                .map(|s| state.execute(s))
                .collect::<Result<Vec<_>>>()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphads_core::schema::label;
    use graphads_core::{
        ContainerFamily, Error, HashTag, ObjectName, Properties, Selector, StagingAnchor,
        StagingLink, SweepPass, Value,
    };

    fn name(n: &str) -> ObjectName {
        ObjectName::new(n)
    }

    fn props(name: &str, extra: &[(&str, Value)]) -> Properties {
        let mut p = Properties::new();
        p.insert("name".into(), Value::from(name));
        for (k, v) in extra {
            p.insert(k.to_string(), v.clone());
        }
        p
    }

    fn create(store: &MemoryGraph, labels: &[&str], properties: Properties) {
        store
            .run(&Statement::CreateNode {
                labels: labels.iter().map(|l| l.to_string()).collect(),
                properties,
            })
            .unwrap();
    }

    fn number(store: &MemoryGraph, n: &str, v: f64) {
        create(
            store,
            &[label::ELEMENT, label::VARIABLE, label::NUMBER],
            props(n, &[("value", Value::Float(v))]),
        );
    }

    fn container(store: &MemoryGraph, n: &str, family: ContainerFamily) {
        let labels = family.node_labels();
        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
        create(store, &labels, props(n, &[("length", Value::Int(0))]));
    }

    fn values(nodes: &[graphads_core::NodeRecord]) -> Vec<f64> {
        nodes
            .iter()
            .filter_map(|n| n.property("value").and_then(Value::as_number))
            .collect()
    }

    fn elements(store: &MemoryGraph, list: &str) -> Vec<f64> {
        let nodes = store
            .run(&Statement::ListElements { list: name(list) })
            .unwrap()
            .into_nodes()
            .unwrap();
        values(&nodes)
    }

    fn append(store: &MemoryGraph, list: &str, element: &str, first: bool) {
        let statement = if first {
            Statement::ListAttachHead {
                list: name(list),
                element: name(element),
            }
        } else {
            Statement::ListAppendAfterTail {
                list: name(list),
                element: name(element),
            }
        };
        assert_eq!(store.run(&statement).unwrap().count().unwrap(), 1);
    }

    fn build_list(store: &MemoryGraph, list: &str, items: &[f64]) {
        container(store, list, ContainerFamily::List);
        for (i, v) in items.iter().enumerate() {
            let element = format!("{}-{}", list, i);
            number(store, &element, *v);
            append(store, list, &element, i == 0);
        }
    }

    // ========================================================================
    // Lists
    // ========================================================================

    #[test]
    fn test_append_then_walk() {
        let store = MemoryGraph::new();
        build_list(&store, "l", &[1.0, 2.0, 3.0]);
        assert_eq!(elements(&store, "l"), vec![1.0, 2.0, 3.0]);

        let at = store
            .run(&Statement::ListItemAt {
                list: name("l"),
                hops: 2,
            })
            .unwrap()
            .into_nodes()
            .unwrap();
        assert_eq!(values(&at), vec![2.0]);
    }

    #[test]
    fn test_unlink_head_interior_and_tail() {
        let store = MemoryGraph::new();
        build_list(&store, "l", &[0.0, 1.0, 2.0, 3.0, 4.0]);

        let unlink = |hops| {
            store
                .run(&Statement::ListUnlinkAt {
                    list: name("l"),
                    hops,
                })
                .unwrap()
                .count()
                .unwrap()
        };
        assert_eq!(unlink(3), 1);
        assert_eq!(elements(&store, "l"), vec![0.0, 1.0, 3.0, 4.0]);
        assert_eq!(unlink(1), 1);
        assert_eq!(elements(&store, "l"), vec![1.0, 3.0, 4.0]);
        assert_eq!(unlink(3), 1);
        assert_eq!(elements(&store, "l"), vec![1.0, 3.0]);
        assert_eq!(unlink(9), 0);

        let report = store
            .run(&Statement::InspectChain { list: name("l") })
            .unwrap()
            .chain()
            .unwrap();
        assert_eq!(report.reachable, 2);
        assert_eq!(report.broken_links, 0);
    }

    #[test]
    fn test_splice_tail_moves_items() {
        let store = MemoryGraph::new();
        build_list(&store, "a", &[1.0, 2.0]);
        build_list(&store, "b", &[3.0, 4.0]);

        store
            .run(&Statement::ListSpliceTail {
                list: name("a"),
                other: name("b"),
            })
            .unwrap();
        assert_eq!(elements(&store, "a"), vec![1.0, 2.0, 3.0, 4.0]);
        assert!(elements(&store, "b").is_empty());
    }

    #[test]
    fn test_staged_list_build() {
        let store = MemoryGraph::new();
        container(&store, "l", ContainerFamily::List);
        for (n, v) in [("x", 5.0), ("y", 6.0), ("z", 7.0)] {
            number(&store, n, v);
        }

        let batch = vec![
            Statement::StageSelection {
                container: name("l"),
                family: ContainerFamily::List,
                selector: Selector::names(["z", "x", "y", "x"]),
                distinct: true,
            },
            Statement::ChainStaged {
                container: name("l"),
                link: StagingLink::Forward,
            },
            Statement::ChainStaged {
                container: name("l"),
                link: StagingLink::Backward,
            },
            Statement::AnchorStaged {
                container: name("l"),
                anchor: StagingAnchor::Head,
            },
            Statement::DropStaged { container: name("l") },
            Statement::Recount {
                container: name("l"),
                family: ContainerFamily::List,
            },
        ];
        let outcomes = store.run_batch(&batch).unwrap();
        assert_eq!(outcomes[0].count().unwrap(), 3);
        assert_eq!(outcomes[4].count().unwrap(), 3);
        assert_eq!(outcomes[5].length().unwrap(), 3);
        assert_eq!(elements(&store, "l"), vec![7.0, 5.0, 6.0]);
    }

    // ========================================================================
    // Sets
    // ========================================================================

    #[test]
    fn test_set_insert_is_conditional() {
        let store = MemoryGraph::new();
        container(&store, "s", ContainerFamily::Set);
        number(&store, "one", 1.0);
        let hash = HashTag::of_canonical("1.0");
        let insert = Statement::SetInsert {
            set: name("s"),
            element: name("one"),
            hash,
        };
        assert_eq!(store.run(&insert).unwrap().count().unwrap(), 1);
        assert_eq!(store.run(&insert).unwrap().count().unwrap(), 0);

        let length = store
            .run(&Statement::AdjustLength {
                container: name("s"),
                delta: 0,
            })
            .unwrap()
            .length()
            .unwrap();
        assert_eq!(length, 1);

        let removed = store
            .run(&Statement::SetRemoveHash {
                set: name("s"),
                hash,
            })
            .unwrap()
            .count()
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store
            .run(&Statement::SetMembers { set: name("s") })
            .unwrap()
            .into_members()
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_set_insert_of_missing_payload_rolls_back_batch() {
        let store = MemoryGraph::new();
        container(&store, "values", ContainerFamily::Set);
        number(&store, "old", 2.0);
        let hash = HashTag::of_canonical("1.0");
        store
            .run(&Statement::SetInsert {
                set: name("values"),
                element: name("old"),
                hash,
            })
            .unwrap();
        let edges = store.edge_count();

        let result = store.run_batch(&[
            Statement::SetRemoveHash {
                set: name("values"),
                hash,
            },
            Statement::SetInsert {
                set: name("values"),
                element: name("gone"),
                hash,
            },
        ]);
        assert!(matches!(result, Err(Error::ObjectNotFound(ref n)) if n == "gone"));
        assert_eq!(store.edge_count(), edges);
        let members = store
            .run(&Statement::SetMembers { set: name("values") })
            .unwrap()
            .into_members()
            .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].element.property("value"), Some(&Value::Float(2.0)));
    }

    // ========================================================================
    // Transactions and faults
    // ========================================================================

    #[test]
    fn test_failed_batch_leaves_graph_untouched() {
        let store = MemoryGraph::new();
        number(&store, "a", 1.0);
        let before = store.node_count();

        let result = store.run_batch(&[
            Statement::CreateNode {
                labels: vec![label::ELEMENT.into()],
                properties: props("b", &[]),
            },
            Statement::CreateNode {
                labels: vec![label::ELEMENT.into()],
                properties: props("a", &[]),
            },
        ]);
        assert!(matches!(result, Err(Error::NameConflict(_))));
        assert_eq!(store.node_count(), before);
    }

    #[test]
    fn test_raw_and_cypher_selector_unsupported() {
        let store = MemoryGraph::new();
        let raw = store.run(&Statement::Raw {
            cypher: "RETURN 1".into(),
            params: Properties::new(),
        });
        assert!(matches!(raw, Err(Error::Unsupported { .. })));

        let select = store.run(&Statement::Select {
            selector: Selector::cypher("MATCH (item:Person)"),
        });
        assert!(matches!(select, Err(Error::Unsupported { .. })));
    }

    #[test]
    fn test_length_statement_on_missing_container() {
        let store = MemoryGraph::new();
        let result = store.run(&Statement::SetLength {
            container: name("ghost"),
            length: 1,
        });
        assert!(matches!(result, Err(Error::ObjectNotFound(_))));
    }

    // ========================================================================
    // Sweeps
    // ========================================================================

    #[test]
    fn test_sweep_severed_fragment() {
        let store = MemoryGraph::new();
        build_list(&store, "l", &[1.0, 2.0, 3.0]);
        let nodes_with_list = store.node_count();

        // Drop the list node without its items
        store
            .run(&Statement::DeleteNode {
                name: name("l"),
                detach: true,
            })
            .unwrap();
        let removed = store
            .run(&Statement::Sweep {
                pass: SweepPass::SeveredListFragments,
            })
            .unwrap()
            .count()
            .unwrap();
        assert_eq!(removed, 3);
        // Only the three number elements remain
        assert_eq!(store.node_count(), nodes_with_list - 1 - 3);
    }

    #[test]
    fn test_sweep_anonymous_list_takes_its_chain() {
        let store = MemoryGraph::new();
        let anon = ObjectName::anonymous();
        build_list(&store, anon.as_str(), &[1.0, 2.0, 3.0]);
        build_list(&store, "named", &[4.0]);
        let before = store.node_count();

        let removed = store
            .run(&Statement::Sweep {
                pass: SweepPass::AnonymousLists,
            })
            .unwrap()
            .count()
            .unwrap();
        assert_eq!(removed, 4);
        assert_eq!(store.node_count(), before - 4);
        assert_eq!(elements(&store, "named"), vec![4.0]);
    }

    #[test]
    fn test_severed_item_without_neighbours_is_not_a_fragment() {
        let store = MemoryGraph::new();
        build_list(&store, "one", &[1.0]);
        store
            .run(&Statement::DeleteNode {
                name: name("one"),
                detach: true,
            })
            .unwrap();
        let removed = store
            .run(&Statement::Sweep {
                pass: SweepPass::SeveredListFragments,
            })
            .unwrap()
            .count()
            .unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_sweep_spares_named_and_referenced_variables() {
        let store = MemoryGraph::new();
        let anon = ObjectName::anonymous();
        number(&store, anon.as_str(), 1.0);
        number(&store, "kept", 2.0);
        build_list(&store, "l", &[]);
        append(&store, "l", anon.as_str(), true);

        let sweep = || {
            store
                .run(&Statement::Sweep {
                    pass: SweepPass::AnonymousVariables,
                })
                .unwrap()
                .count()
                .unwrap()
        };
        assert_eq!(sweep(), 0);

        store
            .run(&Statement::ClearItems {
                container: name("l"),
                family: ContainerFamily::List,
            })
            .unwrap();
        assert_eq!(sweep(), 1);
        let names = store
            .run(&Statement::ListNames { label: None })
            .unwrap()
            .into_names()
            .unwrap();
        assert_eq!(names, vec![name("kept"), name("l")]);
    }
}
