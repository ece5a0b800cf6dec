//! Garbage collector integration tests
//!
//! Builds structure directly with statements, severs it the way a partial
//! batch would, and checks what a sweep reclaims.

use std::sync::Arc;

use graphads_core::schema::label;
use graphads_core::{ContainerFamily, ObjectName, Properties, Statement, SweepPass, Value};
use graphads_engine::{Database, GarbageCollector};

// ============================================================================
// Helpers
// ============================================================================

fn node(db: &Database, labels: Vec<String>, name: &str, extra: &[(&str, Value)]) {
    let mut properties = Properties::new();
    properties.insert("name".into(), Value::from(name));
    for (k, v) in extra {
        properties.insert((*k).to_string(), v.clone());
    }
    db.run(&Statement::CreateNode { labels, properties }).unwrap();
}

fn number(db: &Database, name: &str, v: f64) {
    node(
        db,
        vec![
            label::ELEMENT.into(),
            label::VARIABLE.into(),
            label::NUMBER.into(),
        ],
        name,
        &[("value", Value::Float(v))],
    );
}

fn list_of(db: &Database, list: &str, n: usize) {
    node(
        db,
        ContainerFamily::List.node_labels(),
        list,
        &[("length", Value::Int(0))],
    );
    for i in 0..n {
        let element = format!("{}-{}", list, i);
        number(db, &element, i as f64);
        let statement = if i == 0 {
            Statement::ListAttachHead {
                list: ObjectName::new(list),
                element: ObjectName::new(&element),
            }
        } else {
            Statement::ListAppendAfterTail {
                list: ObjectName::new(list),
                element: ObjectName::new(&element),
            }
        };
        db.run_batch(&[
            statement,
            Statement::AdjustLength {
                container: ObjectName::new(list),
                delta: 1,
            },
        ])
        .unwrap();
    }
}

fn sweep(db: &Arc<Database>) -> graphads_engine::SweepReport {
    GarbageCollector::new(Arc::clone(db)).sweep().unwrap()
}

// ============================================================================
// Severed list fragments
// ============================================================================

#[test]
fn test_deleted_list_leaves_fragment_for_sweep() {
    let db = Database::ephemeral();
    list_of(&db, "doomed", 4);
    db.run(&Statement::DeleteNode {
        name: ObjectName::new("doomed"),
        detach: true,
    })
    .unwrap();

    let report = sweep(&db);
    assert_eq!(report.removed_by(SweepPass::SeveredListFragments), 4);

    // Payload elements are named, so they stay
    let names = db
        .run(&Statement::ListNames {
            label: Some(label::NUMBER.into()),
        })
        .unwrap()
        .into_names()
        .unwrap();
    assert_eq!(names.len(), 4);
}

#[test]
fn test_unreferenced_anonymous_list_goes_with_its_items() {
    let db = Database::ephemeral();
    let anonymous = ObjectName::anonymous();
    list_of(&db, anonymous.as_str(), 3);

    let report = sweep(&db);
    assert_eq!(report.removed_by(SweepPass::AnonymousLists), 4);
    assert_eq!(report.removed_by(SweepPass::SeveredListFragments), 0);
    assert!(db
        .run(&Statement::FetchNode { name: anonymous })
        .unwrap()
        .into_nodes()
        .unwrap()
        .is_empty());
    let items = db
        .run(&Statement::Select {
            selector: graphads_core::Selector::label(label::LIST_ITEM),
        })
        .unwrap()
        .into_nodes()
        .unwrap();
    assert!(items.is_empty());
}

#[test]
fn test_intact_lists_are_untouched() {
    let db = Database::ephemeral();
    list_of(&db, "kept", 5);
    let report = sweep(&db);
    assert_eq!(report.total(), 0);

    let chain = db
        .run(&Statement::InspectChain {
            list: ObjectName::new("kept"),
        })
        .unwrap()
        .chain()
        .unwrap();
    assert_eq!(chain.reachable, 5);
    assert_eq!(chain.broken_links, 0);
}

#[test]
fn test_sweep_is_idempotent() {
    let db = Database::ephemeral();
    list_of(&db, "gone", 3);
    db.run(&Statement::DeleteNode {
        name: ObjectName::new("gone"),
        detach: true,
    })
    .unwrap();
    assert_eq!(sweep(&db).total(), 3);
    assert_eq!(sweep(&db).total(), 0);
}

// ============================================================================
// Anonymous variables
// ============================================================================

#[test]
fn test_anonymous_variables_without_references() {
    let db = Database::ephemeral();
    let loose = ObjectName::anonymous();
    let held = ObjectName::anonymous();
    number(&db, loose.as_str(), 1.0);
    number(&db, held.as_str(), 2.0);
    node(
        &db,
        ContainerFamily::List.node_labels(),
        "holder",
        &[("length", Value::Int(0))],
    );
    db.run(&Statement::ListAttachHead {
        list: ObjectName::new("holder"),
        element: held.clone(),
    })
    .unwrap();

    let report = sweep(&db);
    assert_eq!(report.removed_by(SweepPass::AnonymousVariables), 1);

    let remaining = |name: &ObjectName| {
        db.run(&Statement::FetchNode { name: name.clone() })
            .unwrap()
            .into_nodes()
            .unwrap()
            .len()
    };
    assert_eq!(remaining(&loose), 0);
    assert_eq!(remaining(&held), 1);
}

// ============================================================================
// Non-atomic batches
// ============================================================================

#[test]
fn test_partial_append_is_visible_without_atomic_batches() {
    let db = Database::ephemeral();
    db.update_config(|c| c.atomic_batches = false);
    list_of(&db, "l", 1);
    number(&db, "late", 9.0);

    // The length write targets a missing container and fails after the link
    let result = db.run_batch(&[
        Statement::ListAppendAfterTail {
            list: ObjectName::new("l"),
            element: ObjectName::new("late"),
        },
        Statement::AdjustLength {
            container: ObjectName::new("missing"),
            delta: 1,
        },
    ]);
    assert!(result.is_err());

    let chain = db
        .run(&Statement::InspectChain {
            list: ObjectName::new("l"),
        })
        .unwrap()
        .chain()
        .unwrap();
    assert_eq!(chain.reachable, 2);
}
