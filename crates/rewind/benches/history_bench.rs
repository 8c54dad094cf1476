//! Throughput benchmarks for recording and replaying history.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use rewind::StateTrackingManager;
use rewind_model::{Model, Store, set};

fn setup(records: usize) -> (StateTrackingManager, Store, Vec<rewind_model::ModelId>) {
    let manager = StateTrackingManager::new();
    let store = Store::new();
    let ids = store.add(
        (0..records)
            .map(|i| Model::with_fields([("v", i as i64)]))
            .collect(),
        false,
    );
    manager.add_store(&store);
    (manager, store, ids)
}

fn bench_record(c: &mut Criterion) {
    c.bench_function("record_100_updates", |b| {
        let (manager, store, ids) = setup(100);
        b.iter(|| {
            manager.start_transaction(None);
            for (i, id) in ids.iter().enumerate() {
                store.update(*id, vec![set("v", (i as i64) + 1)]).unwrap();
                store.update(*id, vec![set("v", i as i64)]).unwrap();
            }
            manager.stop_transaction(None);
            black_box(manager.len());
            manager.reset_queue(rewind::ResetOptions::default());
        });
    });
}

fn bench_undo_redo_cycle(c: &mut Criterion) {
    c.bench_function("undo_redo_50_transactions", |b| {
        let (manager, store, ids) = setup(10);
        for step in 0..50i64 {
            manager.start_transaction(None);
            store.update(ids[0], vec![set("v", step + 1000)]).unwrap();
            manager.stop_transaction(None);
        }
        b.iter(|| {
            manager.undo_all();
            manager.redo_all();
            black_box(manager.position());
        });
    });
}

criterion_group!(benches, bench_record, bench_undo_redo_cycle);
criterion_main!(benches);
