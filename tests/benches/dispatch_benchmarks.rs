//! # Remote Library Dispatch Benchmarks
//!
//! | Path | Measures |
//! |------|----------|
//! | Registry | insert + take by correlation token |
//! | Hand-off | async enqueue until the worker hands the query off |
//! | Round trip | async enqueue through completion callback (mock peer) |
//! | Loopback | synchronous query through the in-process peer |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rl_remote_library::{
    ConnectionSettings, CorrelationToken, HandlerRouter, InFlightRegistry, Library,
    LibraryDependencies, LoopbackTransport, MockTransport, QueryContext, RemoteLibrary,
    RemoteLibraryConfig, StaticConfig,
};
use serde_json::json;
use shared_types::{QueryMode, RawQuery, SharedQuery};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Fixtures
// ============================================================================

fn mock_library() -> (Arc<RemoteLibrary>, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let library = RemoteLibrary::create(
        "bench",
        1,
        LibraryDependencies {
            transport: transport.clone(),
            router: Arc::new(HandlerRouter::new()),
            settings: Arc::new(StaticConfig::default()),
            config: RemoteLibraryConfig::default(),
        },
    )
    .expect("library");
    (library, transport)
}

fn wait_for(condition: impl Fn() -> bool) {
    while !condition() {
        std::thread::yield_now();
    }
}

// ============================================================================
// Registry
// ============================================================================

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    for size in [10usize, 100, 1000] {
        let tokens: Vec<CorrelationToken> = (0..size)
            .map(|i| CorrelationToken::from(format!("token-{i}")))
            .collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("insert_take", size), &tokens, |b, tokens| {
            b.iter(|| {
                let mut registry = InFlightRegistry::new();
                for token in tokens {
                    let query: SharedQuery = Arc::new(RawQuery::new("q", json!(null)));
                    registry.insert(token.clone(), QueryContext::new(query, None));
                }
                for token in tokens {
                    black_box(registry.take(token));
                }
            })
        });
    }
    group.finish();
}

// ============================================================================
// Dispatch
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.measurement_time(Duration::from_secs(5));

    let (library, transport) = mock_library();
    let completed = Arc::new(AtomicUsize::new(0));

    group.bench_function("async_round_trip", |b| {
        b.iter(|| {
            let target = completed.load(Ordering::SeqCst) + 1;
            let counter = completed.clone();
            let query: SharedQuery = Arc::new(RawQuery::new("search", json!({"term": "x"})));
            library
                .enqueue(
                    query,
                    QueryMode::Async,
                    Some(Box::new(move |_: SharedQuery| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    })),
                )
                .expect("enqueue");
            wait_for(|| library.stats().in_flight == 1);
            let token = transport.sent_tokens().last().cloned().expect("token");
            transport.succeed(token.as_str(), "{}");
            wait_for(|| completed.load(Ordering::SeqCst) >= target);
        })
    });

    library.close();
    group.finish();
}

fn bench_loopback(c: &mut Criterion) {
    let mut group = c.benchmark_group("loopback");
    group.measurement_time(Duration::from_secs(5));

    let router = Arc::new(HandlerRouter::new());
    router.register("echo", |params| Ok(params.clone()));
    let transport = LoopbackTransport::new(router.clone()).expect("loopback");
    let library = RemoteLibrary::create(
        "loopback",
        2,
        LibraryDependencies {
            transport: Arc::new(transport),
            router,
            settings: Arc::new(StaticConfig::new(ConnectionSettings::default())),
            config: RemoteLibraryConfig::default(),
        },
    )
    .expect("library");

    group.bench_function("sync_echo", |b| {
        b.iter(|| {
            let query: SharedQuery = Arc::new(RawQuery::new("echo", json!({"n": 1})));
            library
                .enqueue(query.clone(), QueryMode::Synchronous, None)
                .expect("enqueue");
            black_box(query)
        })
    });

    library.close();
    group.finish();
}

criterion_group!(benches, bench_registry, bench_round_trip, bench_loopback);
criterion_main!(benches);
