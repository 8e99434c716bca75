//! Latest-value store benchmarks
//!
//! Publish and drain on one thread, then with a polling-style writer
//! contending for the lock.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use igt_devices::store::SampleStore;
use igt_devices::Transform;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const VALIDITY: Duration = Duration::from_millis(100);

fn store_with(tools: &[String]) -> SampleStore<Transform> {
    let store = SampleStore::new();
    for tool in tools {
        store.register(tool);
    }
    store
}

fn tool_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("T{}", i)).collect()
}

fn bench_publish_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_drain");
    for count in [1usize, 4, 16] {
        let tools = tool_ids(count);
        let store = store_with(&tools);
        let sample = Transform::from_translation([1.0, 2.0, 3.0], VALIDITY);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                for tool in &tools {
                    store.publish(tool, sample, false);
                }
                black_box(store.drain_all(tools.iter().map(String::as_str)))
            });
        });
    }
    group.finish();
}

fn bench_drain_contended(c: &mut Criterion) {
    let tools = tool_ids(4);
    let store = Arc::new(store_with(&tools));
    let running = Arc::new(AtomicBool::new(true));

    let writer = {
        let store = Arc::clone(&store);
        let running = Arc::clone(&running);
        let tools = tools.clone();
        thread::spawn(move || {
            let sample = Transform::from_translation([0.0, 0.0, 1.0], VALIDITY);
            while running.load(Ordering::Relaxed) {
                for tool in &tools {
                    store.publish(tool, sample, false);
                }
            }
        })
    };

    c.bench_function("drain_4_tools_contended", |b| {
        b.iter(|| black_box(store.drain_all(tools.iter().map(String::as_str))));
    });

    running.store(false, Ordering::Relaxed);
    writer.join().unwrap();
}

criterion_group!(benches, bench_publish_drain, bench_drain_contended);
criterion_main!(benches);
