//! Container benchmarks against the in-process graph
//!
//! These measure statement construction and interpretation overhead only;
//! against Neo4j every operation is dominated by the round trip.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use graphads_core::Selector;
use graphads_engine::Database;
use graphads_primitives::{Element, List, Set, SimpleNumber};
use std::sync::Arc;

fn numbers(db: &Arc<Database>, prefix: &str, n: usize) -> Vec<SimpleNumber> {
    (0..n)
        .map(|i| {
            SimpleNumber::create(db.clone(), i as f64, Some(&format!("{}{}", prefix, i))).unwrap()
        })
        .collect()
}

/// Append one element to a list that grows across iterations
fn bench_list_append(c: &mut Criterion) {
    let db = Database::ephemeral();
    let mut list = List::create(db.clone(), Some("bench")).unwrap();
    let element = SimpleNumber::create(db, 1.0, None).unwrap();

    let mut group = c.benchmark_group("list");
    group.throughput(Throughput::Elements(1));
    group.bench_function("append", |b| b.iter(|| list.append(&element).unwrap()));
    group.finish();
}

/// Index into the middle of a 200 item list
fn bench_list_get(c: &mut Criterion) {
    let db = Database::ephemeral();
    let mut list = List::create(db.clone(), Some("bench")).unwrap();
    for n in numbers(&db, "n", 200) {
        list.append(&n).unwrap();
    }

    let mut group = c.benchmark_group("list");
    group.bench_function("get_middle", |b| b.iter(|| list.get(100).unwrap()));
    group.finish();
}

/// Staged bulk build of 500 items, one batch
fn bench_list_from_query(c: &mut Criterion) {
    let db = Database::ephemeral();
    let names: Vec<String> = numbers(&db, "n", 500)
        .iter()
        .map(|n| n.name().to_string())
        .collect();

    let mut group = c.benchmark_group("list");
    group.throughput(Throughput::Elements(500));
    group.bench_function("from_query_500", |b| {
        b.iter_batched(
            || List::create(db.clone(), None).unwrap(),
            |mut list| list.from_query(Selector::names(names.clone()), false, false).unwrap(),
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

/// Intersection of two overlapping 200 member sets
fn bench_set_intersection(c: &mut Criterion) {
    let db = Database::ephemeral();
    let mut left = Set::create(db.clone(), Some("left")).unwrap();
    let mut right = Set::create(db.clone(), Some("right")).unwrap();
    for n in numbers(&db, "n", 300) {
        if *n.value() < 200.0 {
            left.add(&n).unwrap();
        }
        if *n.value() >= 100.0 {
            right.add(&n).unwrap();
        }
    }

    let mut group = c.benchmark_group("set");
    group.bench_function("intersection_200", |b| {
        b.iter(|| left.intersection(&right).unwrap())
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_list_append,
    bench_list_get,
    bench_list_from_query,
    bench_set_intersection,
);
criterion_main!(benches);
