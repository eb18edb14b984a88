//! Benchmarks for request fingerprinting and cache lookups.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

use shortsflow::cache::{CacheEntry, InMemoryResultCache, ResultCache};
use shortsflow::core::{Fingerprint, StageKind};
use shortsflow::testing::fixtures;

fn fingerprint_benchmark(c: &mut Criterion) {
    let request = fixtures::script_request();
    c.bench_function("fingerprint_script_request", |b| {
        b.iter(|| Fingerprint::of(StageKind::Script, black_box(&request)))
    });
}

fn cache_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let cache = InMemoryResultCache::new();
    let fingerprint = Fingerprint::of(StageKind::Script, &fixtures::script_request()).unwrap();
    let payload = serde_json::to_string(&fixtures::script()).unwrap();
    runtime
        .block_on(cache.put(CacheEntry::new(
            fingerprint.clone(),
            StageKind::Script,
            "llm",
            payload,
            Duration::from_secs(3600),
        )))
        .unwrap();

    c.bench_function("in_memory_cache_hit", |b| {
        b.iter(|| runtime.block_on(cache.get(black_box(&fingerprint))))
    });
}

criterion_group!(benches, fingerprint_benchmark, cache_benchmark);
criterion_main!(benches);
