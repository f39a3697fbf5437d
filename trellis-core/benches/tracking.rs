//! Tracking Benchmarks
//!
//! Measures the cost of recording reads, fanning out writes and iterating
//! wrapped collections.

use std::cell::Cell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trellis_core::observe::reactive;
use trellis_core::reactive::{effect, Computation};
use trellis_core::value::{RawObject, Value};

fn wide_object(keys: usize) -> Value {
    reactive(&RawObject::from_props((0..keys).map(|i| (format!("k{i}"), Value::from(i)))).into())
}

fn bench_rerun(c: &mut Criterion) {
    let mut group = c.benchmark_group("rerun");
    for keys in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(keys), &keys, |b, &keys| {
            let state = wide_object(keys);
            let names: Rc<Vec<String>> = Rc::new((0..keys).map(|i| format!("k{i}")).collect());
            let (state_in, names_in) = (state.clone(), names.clone());
            let computation = effect(move || {
                for name in names_in.iter() {
                    black_box(state_in.get(name.as_str()));
                }
            });

            let mut n = 0usize;
            b.iter(|| {
                n += 1;
                state.set("k0", Value::from(keys + n));
            });
            computation.stop();
        });
    }
    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    for readers in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(readers), &readers, |b, &readers| {
            let state = wide_object(1);
            let total = Rc::new(Cell::new(0.0));
            let computations: Vec<Computation> = (0..readers)
                .map(|_| {
                    let (state_in, total_in) = (state.clone(), total.clone());
                    effect(move || total_in.set(total_in.get() + state_in.get("k0").as_number().unwrap_or_default()))
                })
                .collect();

            let mut n = 0usize;
            b.iter(|| {
                n += 1;
                state.set("k0", Value::from(n));
            });
            for computation in &computations {
                computation.stop();
            }
        });
    }
    group.finish();
}

fn bench_nested_read(c: &mut Criterion) {
    let leaf = RawObject::from_props([("x", 1)]);
    let mut node = leaf;
    for _ in 0..8 {
        node = RawObject::from_props([("child", node)]);
    }
    let state = reactive(&node.into());

    c.bench_function("nested_read_depth_8", |b| {
        b.iter(|| {
            let mut current = state.clone();
            for _ in 0..8 {
                current = current.get("child");
            }
            black_box(current.get("x"))
        });
    });
}

fn bench_map_iteration(c: &mut Criterion) {
    let map = RawObject::map_from((0..256).map(|i| (Value::from(i), Value::from(i))));
    let state = reactive(&map.into());
    let Some(proxy) = state.as_proxy().cloned() else {
        return;
    };

    c.bench_function("map_entries_256", |b| {
        b.iter(|| {
            let computation = effect({
                let proxy = proxy.clone();
                move || {
                    if let Ok(entries) = proxy.entries() {
                        black_box(entries.count());
                    }
                }
            });
            computation.stop();
        });
    });
}

criterion_group!(benches, bench_rerun, bench_fan_out, bench_nested_read, bench_map_iteration);
criterion_main!(benches);
