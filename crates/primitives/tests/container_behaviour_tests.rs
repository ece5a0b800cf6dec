//! Behaviour tests for graphads-primitives
//!
//! End-to-end container scenarios against the in-process graph:
//!
//! 1. List: indexing, removal, order, chain health
//! 2. Set: uniqueness, algebra, bulk construction
//! 3. Map: overwrite, component alignment
//! 4. Lifecycle: destroy-then-absence, non-empty delete rejection
//! 5. Cross-type: domain elements in sets, id arrays feeding lists

use std::sync::Arc;

use graphads_core::schema::label;
use graphads_core::{Error, Properties, Selector, Statement, Value};
use graphads_engine::Database;
use graphads_primitives::{
    CompositeArrayNumber, CompositeString, DomainElement, Element, List, Map, MemoryManager,
    Set, SimpleNumber,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn setup() -> (MemoryManager, Arc<Database>) {
    let manager = MemoryManager::ephemeral();
    let db = manager.database().clone();
    (manager, db)
}

fn number(db: &Arc<Database>, v: f64) -> SimpleNumber {
    SimpleNumber::create(db.clone(), v, None).unwrap()
}

fn number_list(db: &Arc<Database>, name: &str, n: usize) -> List {
    let mut list = List::create(db.clone(), Some(name)).unwrap();
    for i in 0..n {
        list.append(&number(db, i as f64)).unwrap();
    }
    list
}

fn number_set(db: &Arc<Database>, name: &str, values: &[f64]) -> Set {
    let mut set = Set::create(db.clone(), Some(name)).unwrap();
    for v in values {
        set.add(&number(db, *v)).unwrap();
    }
    set
}

fn nodes_with_label(db: &Arc<Database>, l: &str) -> usize {
    db.run(&Statement::Select {
        selector: Selector::label(l),
    })
    .unwrap()
    .into_nodes()
    .unwrap()
    .len()
}

fn list_values(list: &List) -> Vec<f64> {
    list.elements()
        .unwrap()
        .iter()
        .map(|o| o.as_number().unwrap())
        .collect()
}

// ============================================================================
// Module 1: List
// ============================================================================

/// Ten numbers, remove index 3, the tail shifts down
#[test]
fn test_list_remove_shifts_following_items() {
    let (_manager, db) = setup();
    let mut list = number_list(&db, "numbers", 10);
    assert_eq!(list.len().unwrap(), 10);
    assert_eq!(list.get(3).unwrap().as_number(), Some(3.0));

    list.remove(3).unwrap();

    assert_eq!(list.len().unwrap(), 9);
    assert_eq!(list.get(3).unwrap().as_number(), Some(4.0));
    assert_eq!(
        list_values(&list),
        vec![0.0, 1.0, 2.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]
    );
}

#[test]
fn test_list_index_out_of_bounds() {
    let (_manager, db) = setup();
    let mut list = number_list(&db, "l", 2);
    assert!(matches!(
        list.get(2),
        Err(Error::IndexOutOfBounds { index: 2, length: 2 })
    ));
    assert!(matches!(list.remove(5), Err(Error::IndexOutOfBounds { .. })));
    assert_eq!(list.len().unwrap(), 2);
}

#[test]
fn test_list_keeps_duplicates_and_order() {
    let (_manager, db) = setup();
    let mut list = List::create(db.clone(), None).unwrap();
    let shared = number(&db, 5.0);
    list.append(&shared).unwrap();
    list.append(&number(&db, 6.0)).unwrap();
    list.append(&shared).unwrap();
    assert_eq!(list_values(&list), vec![5.0, 6.0, 5.0]);
    assert_eq!(list.get(2).unwrap().name(), shared.name());
}

#[test]
fn test_list_chain_stays_doubly_linked() {
    let (_manager, db) = setup();
    let mut list = number_list(&db, "l", 6);
    list.remove(0).unwrap();
    list.remove(4).unwrap();
    list.remove(2).unwrap();
    let report = list.inspect_links().unwrap();
    assert_eq!(report.reachable, 3);
    assert_eq!(report.broken_links, 0);
}

#[test]
fn test_list_from_id_array() {
    let (_manager, db) = setup();
    for (name, v) in [("a", 1.0), ("b", 2.0), ("c", 3.0)] {
        SimpleNumber::create(db.clone(), v, Some(name)).unwrap();
    }
    let mut ids = CompositeArrayNumber::create(db.clone(), vec![], Some("ids")).unwrap();
    ids.from_query_ids(Selector::names(["c", "a"]), false).unwrap();
    assert_eq!(ids.len(), 2);

    let mut list = List::create(db, Some("picked")).unwrap();
    list.from_id_array(&ids, false).unwrap();
    assert_eq!(list_values(&list), vec![3.0, 1.0]);
}

// ============================================================================
// Module 2: Set
// ============================================================================

/// U = {1,2,3}, V = {2,3,5,6}
#[test]
fn test_set_algebra_scenario() {
    let (_manager, db) = setup();
    let u = number_set(&db, "U", &[1.0, 2.0, 3.0]);
    let v = number_set(&db, "V", &[2.0, 3.0, 5.0, 6.0]);

    let both = u.intersection(&v).unwrap();
    assert_eq!(both.len().unwrap(), 2);
    assert!(both.contains(&SimpleNumber::new(db.clone(), 2.0, None)).unwrap());

    let sym = u.symmetric_difference(&v).unwrap();
    let via_differences = u
        .difference(&v)
        .unwrap()
        .union(&v.difference(&u).unwrap())
        .unwrap();
    assert_eq!(sym.len().unwrap(), 3);
    assert_eq!(via_differences.len().unwrap(), 3);
    assert!(sym.is_equal(&via_differences).unwrap());

    let all = u.union(&v).unwrap();
    assert_eq!(
        both.len().unwrap() + sym.len().unwrap(),
        all.len().unwrap()
    );
}

#[test]
fn test_set_uniqueness_ignores_equal_values() {
    let (_manager, db) = setup();
    let mut set = number_set(&db, "s", &[1.0, 2.0]);
    let before = set.members().unwrap();
    assert!(!set.add(&number(&db, 2.0)).unwrap());
    assert_eq!(set.len().unwrap(), 2);
    assert_eq!(set.members().unwrap().len(), before.len());
}

#[test]
fn test_set_of_domain_elements_ignores_names() {
    let (_manager, db) = setup();
    let paper = |title: &str| {
        let mut p = Properties::new();
        p.insert("title".into(), Value::from(title));
        p
    };
    let a = DomainElement::create(db.clone(), ["Paper"], paper("Graphs"), Some("p1")).unwrap();
    let b = DomainElement::create(db.clone(), ["Paper"], paper("Graphs"), Some("p2")).unwrap();
    let c = DomainElement::create(db.clone(), ["Paper"], paper("Sets"), Some("p3")).unwrap();

    let mut set = Set::create(db.clone(), Some("papers")).unwrap();
    assert!(set.add(&a).unwrap());
    assert!(!set.add(&b).unwrap());
    assert!(set.add(&c).unwrap());
    assert_eq!(set.len().unwrap(), 2);

    let mut from_label = Set::create(db, None).unwrap();
    from_label
        .from_query(Selector::label("Paper"), false)
        .unwrap();
    assert!(from_label.is_equal(&set).unwrap());
}

#[test]
fn test_set_equality_length_short_circuit() {
    let (_manager, db) = setup();
    let small = number_set(&db, "small", &[1.0]);
    let large = number_set(&db, "large", &[1.0, 2.0]);
    assert!(!small.is_equal(&large).unwrap());
    let other = number_set(&db, "other", &[3.0]);
    assert!(!small.is_equal(&other).unwrap());
}

// ============================================================================
// Module 3: Map
// ============================================================================

#[test]
fn test_map_latest_assignment_wins() {
    let (_manager, db) = setup();
    let mut map = Map::create(db.clone(), Some("ages")).unwrap();
    let ada = CompositeString::create(db.clone(), "ada".into(), None).unwrap();
    let alan = CompositeString::create(db.clone(), "alan".into(), None).unwrap();
    map.set(&ada, &number(&db, 36.0)).unwrap();
    map.set(&alan, &number(&db, 41.0)).unwrap();
    map.set(&ada, &number(&db, 37.0)).unwrap();

    assert_eq!(map.len().unwrap(), 2);
    assert_eq!(map.get(&ada).unwrap().as_number(), Some(37.0));
    assert_eq!(map.get(&alan).unwrap().as_number(), Some(41.0));

    let keys = map.keys().unwrap();
    let values = map.values().unwrap();
    assert_eq!(keys.len(), values.len());
    let pairs: Vec<(String, f64)> = keys
        .iter()
        .zip(&values)
        .map(|(k, v)| (k.as_text().unwrap().to_string(), v.as_number().unwrap()))
        .collect();
    assert!(pairs.contains(&("ada".to_string(), 37.0)));
    assert!(pairs.contains(&("alan".to_string(), 41.0)));
}

// ============================================================================
// Module 4: Lifecycle
// ============================================================================

#[test]
fn test_destroy_then_absence() {
    let (manager, db) = setup();
    let mut list = number_list(&db, "l", 3);
    let mut set = number_set(&db, "s", &[1.0, 2.0]);
    let mut map = Map::create(db.clone(), Some("m")).unwrap();
    map.set(&number(&db, 1.0), &number(&db, 2.0)).unwrap();

    list.destroy().unwrap();
    set.destroy().unwrap();
    map.destroy().unwrap();

    for name in ["l", "s", "m"] {
        assert!(matches!(
            manager.get_object(name),
            Err(Error::ObjectNotFound(_))
        ));
    }
    assert_eq!(nodes_with_label(&db, label::LIST_ITEM), 0);
    assert_eq!(nodes_with_label(&db, label::SET_ITEM), 0);
    assert!(matches!(list.len(), Err(Error::ObjectDeleted { .. })));
}

#[test]
fn test_non_empty_delete_leaves_container_unchanged() {
    let (_manager, db) = setup();
    let mut list = number_list(&db, "l", 3);
    let mut set = number_set(&db, "s", &[1.0]);

    assert!(matches!(
        list.delete(),
        Err(Error::ContainerNotEmpty { kind: "List", .. })
    ));
    assert!(matches!(
        set.delete(),
        Err(Error::ContainerNotEmpty { kind: "Set", .. })
    ));

    assert_eq!(list_values(&list), vec![0.0, 1.0, 2.0]);
    assert_eq!(set.len().unwrap(), 1);
    list.refresh().unwrap();
    assert_eq!(list.len().unwrap(), 3);
}

#[test]
fn test_unsaved_and_deleted_handles_fail_locally() {
    let (_manager, db) = setup();
    let unsaved = List::new(db.clone(), Some("later"));
    assert!(matches!(unsaved.len(), Err(Error::ObjectUnsaved { .. })));

    let mut set = Set::create(db, None).unwrap();
    set.delete().unwrap();
    assert!(matches!(
        set.contains_hash(&graphads_core::HashTag::of_canonical("1.0")),
        Err(Error::ObjectDeleted { .. })
    ));
}

// ============================================================================
// Module 5: Maintenance
// ============================================================================

#[test]
fn test_garbage_collect_reclaims_dropped_anonymous_list() {
    let (manager, db) = setup();
    let mut scratch = List::create(db.clone(), None).unwrap();
    for (name, v) in [("x", 1.0), ("y", 2.0), ("z", 3.0)] {
        scratch
            .append(&SimpleNumber::create(db.clone(), v, Some(name)).unwrap())
            .unwrap();
    }
    drop(scratch);

    let report = manager.garbage_collect().unwrap();
    assert_eq!(
        report.removed_by(graphads_core::SweepPass::AnonymousLists),
        4
    );
    assert_eq!(nodes_with_label(&db, label::LIST_ITEM), 0);
    assert_eq!(manager.list_objects().unwrap().len(), 3);
}

#[test]
fn test_garbage_collect_after_algebra() {
    let (manager, db) = setup();
    let u = number_set(&db, "U", &[1.0, 2.0]);
    let v = number_set(&db, "V", &[2.0, 3.0]);
    let union = u.union(&v).unwrap();
    assert!(union.name().is_anonymous());

    let report = manager.garbage_collect().unwrap();
    // the derived set with its three items
    assert_eq!(report.removed_by(graphads_core::SweepPass::AnonymousSets), 4);
    assert_eq!(u.len().unwrap(), 2);
    assert!(manager.get_object("U").is_ok());
}
