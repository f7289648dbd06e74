//! # Concurrency Tests
//!
//! Many producer threads share one library. Every accepted query must
//! complete exactly once, whichever thread resolves it.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::{Duration, Instant};

    use parking_lot::Mutex;
    use rand::Rng;
    use serde_json::json;

    use rl_remote_library::{
        ConnectionSettings, HandlerRouter, Library, LibraryDependencies, LoopbackTransport,
        MockTransport, RemoteLibrary, RemoteLibraryConfig, StaticConfig,
    };
    use shared_bus::{InMemoryEventPump, PumpHandle};
    use shared_types::{Query, QueryId, QueryMode, QueryStatus, RawQuery, SharedQuery};

    const PRODUCERS: usize = 8;
    const QUERIES_PER_PRODUCER: usize = 50;

    fn loopback_library() -> Arc<RemoteLibrary> {
        let router = Arc::new(HandlerRouter::new());
        router.register("square", |params| {
            let n = params["n"].as_i64().unwrap_or_default();
            Ok(json!(n * n))
        });
        let transport = LoopbackTransport::new(router.clone()).unwrap();
        RemoteLibrary::create(
            "loopback",
            1,
            LibraryDependencies {
                transport: Arc::new(transport),
                router,
                settings: Arc::new(StaticConfig::new(ConnectionSettings::default())),
                config: RemoteLibraryConfig::for_testing(),
            },
        )
        .unwrap()
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            if Instant::now() > deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    #[test]
    fn test_every_query_completes_exactly_once() {
        let library = loopback_library();
        let pump = PumpHandle::spawn(Arc::new(InMemoryEventPump::new()), "stress-pump").unwrap();
        library.set_event_pump(Some(pump.pump().clone()));

        let completions = Arc::new(AtomicUsize::new(0));
        let seen: Arc<Mutex<HashSet<QueryId>>> = Arc::new(Mutex::new(HashSet::new()));
        let duplicates = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(PRODUCERS));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let library = library.clone();
                let completions = completions.clone();
                let seen = seen.clone();
                let duplicates = duplicates.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..QUERIES_PER_PRODUCER {
                        let n = (producer * QUERIES_PER_PRODUCER + i) as i64;
                        let query: SharedQuery = Arc::new(RawQuery::new("square", json!({ "n": n })));
                        let completions = completions.clone();
                        let seen = seen.clone();
                        let duplicates = duplicates.clone();
                        library
                            .enqueue(
                                query,
                                QueryMode::Async,
                                Some(Box::new(move |query: SharedQuery| {
                                    assert_eq!(query.status(), QueryStatus::Finished);
                                    if !seen.lock().insert(query.id()) {
                                        duplicates.fetch_add(1, Ordering::SeqCst);
                                    }
                                    completions.fetch_add(1, Ordering::SeqCst);
                                })),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let expected = PRODUCERS * QUERIES_PER_PRODUCER;
        assert!(wait_until(|| completions.load(Ordering::SeqCst) == expected));
        assert_eq!(duplicates.load(Ordering::SeqCst), 0);

        let stats = library.stats();
        assert_eq!(stats.total_enqueued, expected as u64);
        assert_eq!(stats.total_completed, expected as u64);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.pending, 0);

        library.close();
        pump.shutdown();
    }

    #[test]
    fn test_mixed_sync_and_async_callers() {
        let library = loopback_library();

        let async_done = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let library = library.clone();
                let async_done = async_done.clone();
                thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    for i in 0..25 {
                        let n: i64 = rng.gen_range(0..1000);
                        let typed = Arc::new(RawQuery::new("square", json!({ "n": n })));
                        if (worker + i) % 2 == 0 {
                            library
                                .enqueue(typed.clone(), QueryMode::Synchronous, None)
                                .unwrap();
                            assert_eq!(typed.status(), QueryStatus::Finished);
                            assert_eq!(typed.result(), Some(json!(n * n)));
                        } else {
                            let done = async_done.clone();
                            library
                                .enqueue(
                                    typed,
                                    QueryMode::Async,
                                    Some(Box::new(move |_: SharedQuery| {
                                        done.fetch_add(1, Ordering::SeqCst);
                                    })),
                                )
                                .unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(wait_until(|| async_done.load(Ordering::SeqCst) == 50));
        assert!(wait_until(|| library.stats().in_flight == 0));
    }

    #[test]
    fn test_close_while_producers_are_running() {
        let transport = Arc::new(MockTransport::new());
        let library = RemoteLibrary::create(
            "remote",
            1,
            LibraryDependencies {
                transport: transport.clone(),
                router: Arc::new(HandlerRouter::new()),
                settings: Arc::new(StaticConfig::default()),
                config: RemoteLibraryConfig::for_testing(),
            },
        )
        .unwrap();

        let accepted = Arc::new(AtomicUsize::new(0));
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let library = library.clone();
                let accepted = accepted.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        let query: SharedQuery = Arc::new(RawQuery::new("search", json!({})));
                        match library.enqueue(query, QueryMode::Async, None) {
                            Ok(_) => {
                                accepted.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(_) => break,
                        }
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(2));
        library.close();
        for producer in producers {
            producer.join().unwrap();
        }

        // Every accepted query was either handed off or discarded.
        let stats = library.stats();
        let handed_off = transport.sent_names().len() as u64;
        assert_eq!(stats.pending, 0);
        assert_eq!(handed_off + stats.total_dropped, accepted.load(Ordering::SeqCst) as u64);
        assert_eq!(stats.total_enqueued, accepted.load(Ordering::SeqCst) as u64);
    }
}
