//! Performance benchmarks for the object, config and conflicts databases.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geostore::{
    ConfigDatabase, ConflictsDatabase, FieldValue, ObjectDatabase, RevFeature, RevObject, Store,
    StoreConfig,
};
use tempfile::TempDir;

fn create_store(dir: &TempDir) -> Store {
    Store::open(StoreConfig::at(dir.path().join("store"))).unwrap()
}

fn feature(n: i64) -> RevObject {
    RevFeature::new(vec![
        FieldValue::Int(n),
        FieldValue::String(format!("road segment {n}")),
        FieldValue::Double(n as f64 * 0.5),
    ])
    .into()
}

/// Benchmark single-object writes, each in its own transaction
fn bench_put(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = create_store(&dir);
    let mut n = 0i64;

    c.bench_function("put_feature", |b| {
        b.iter(|| {
            n += 1;
            store.objects().put(black_box(&feature(n))).unwrap()
        })
    });
}

/// Benchmark reads with and without the decoded-object cache
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_feature");

    for cache_size in [0usize, 1000] {
        group.bench_with_input(
            BenchmarkId::new("cache_size", cache_size),
            &cache_size,
            |b, &cache_size| {
                let dir = TempDir::new().unwrap();
                let store = Store::open(StoreConfig {
                    object_cache_size: cache_size,
                    ..StoreConfig::at(dir.path().join("store"))
                })
                .unwrap();

                let ids: Vec<_> = (0..100)
                    .map(|n| {
                        let object = feature(n);
                        store.objects().put(&object).unwrap();
                        object.id().unwrap()
                    })
                    .collect();

                let mut i = 0;
                b.iter(|| {
                    i = (i + 1) % ids.len();
                    black_box(store.objects().get(&ids[i]).unwrap())
                })
            },
        );
    }

    group.finish();
}

/// Benchmark partial-id lookup as the object count grows
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for count in [100i64, 1000, 10_000] {
        group.bench_with_input(BenchmarkId::new("objects", count), &count, |b, &count| {
            let dir = TempDir::new().unwrap();
            let store = create_store(&dir);
            store
                .objects()
                .put_all((0..count).map(feature))
                .unwrap();
            let prefix = feature(count / 2).id().unwrap().to_hex()[..10].to_string();

            b.iter(|| black_box(store.objects().lookup(&prefix).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark lazy bulk reads
fn bench_get_all(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = create_store(&dir);
    let ids: Vec<_> = (0..500)
        .map(|n| {
            let object = feature(n);
            store.objects().put(&object).unwrap();
            object.id().unwrap()
        })
        .collect();

    c.bench_function("get_all_500", |b| {
        b.iter(|| {
            let found = store
                .objects()
                .get_all(ids.iter().copied())
                .filter(|outcome| matches!(outcome, Ok(o) if o.is_found()))
                .count();
            black_box(found)
        })
    });
}

/// Benchmark pooled config writes and conflict scans
fn bench_pooled_stores(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = create_store(&dir);
    for i in 0..1000 {
        store
            .conflicts()
            .put("merge", &format!("roads/{i:05}"), "conflict")
            .unwrap();
    }

    let mut n = 0u64;
    c.bench_function("config_put", |b| {
        b.iter(|| {
            n += 1;
            store
                .settings()
                .put("bench", "counter", &n.to_string())
                .unwrap()
        })
    });

    c.bench_function("conflicts_scan_1000", |b| {
        b.iter(|| {
            let count = store.conflicts().get("merge", "roads/").unwrap().count();
            black_box(count)
        })
    });
}

criterion_group!(
    benches,
    bench_put,
    bench_get,
    bench_lookup,
    bench_get_all,
    bench_pooled_stores
);
criterion_main!(benches);
