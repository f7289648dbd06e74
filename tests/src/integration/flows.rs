//! # Integration Test Flows
//!
//! Tests that a preferences file, the remote library and a pump thread work
//! together:
//!
//! 1. **Settings → Transport**: host, port and password come from the file
//! 2. **Transport → Pump → Library**: state changes and reconnects travel
//!    through the event pump
//! 3. **Completion routing**: libraries sharing one pump only see their own
//!    completions

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use parking_lot::Mutex;
    use serde_json::json;

    use rl_remote_library::{
        ConnectionState, HandlerRouter, JsonSettingsStore, Library, LibraryDependencies,
        MockTransport, RawTransportState, RemoteLibrary, RemoteLibraryConfig,
        RemoteTrackLocator, Track,
    };
    use shared_bus::{InMemoryEventPump, PumpHandle};
    use shared_types::{Query, QueryId, QueryMode, QueryStatus, RawQuery, SharedQuery};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn write_preferences(path: &Path) {
        fs::write(
            path,
            json!({
                "RemoteLibraryHostname": "192.168.1.20",
                "RemoteLibraryWssPort": 7906,
                "RemoteLibraryHttpPort": 7907,
                "RemoteLibraryPassword": "hunter2",
                "RemoteLibraryViewed": true
            })
            .to_string(),
        )
        .unwrap();
    }

    fn create_library(
        id: u32,
        transport: Arc<MockTransport>,
        settings: Arc<JsonSettingsStore>,
    ) -> Arc<RemoteLibrary> {
        RemoteLibrary::create(
            format!("remote-{id}"),
            id,
            LibraryDependencies {
                transport,
                router: Arc::new(HandlerRouter::new()),
                settings,
                config: RemoteLibraryConfig::for_testing(),
            },
        )
        .unwrap()
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            if Instant::now() > deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }

    struct FlacTrack;

    impl Track for FlacTrack {
        fn id(&self) -> i64 {
            3141
        }

        fn uri(&self) -> Option<String> {
            Some("/srv/music/Cocteau Twins/Heaven or Las Vegas/01.flac".to_string())
        }
    }

    // =============================================================================
    // INTEGRATION TESTS: SETTINGS → TRANSPORT
    // =============================================================================

    #[test]
    fn test_settings_file_drives_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        write_preferences(&path);

        let settings = Arc::new(JsonSettingsStore::open(&path).unwrap());
        let transport = Arc::new(MockTransport::new());
        let library = create_library(1, transport.clone(), settings);

        assert_eq!(
            transport.connect_calls(),
            vec![("192.168.1.20".to_string(), 7906, "hunter2".to_string())]
        );
        assert!(library.is_configured());
    }

    #[test]
    fn test_track_locator_uses_audio_port() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        write_preferences(&path);

        let settings = Arc::new(JsonSettingsStore::open(&path).unwrap());
        let library = create_library(1, Arc::new(MockTransport::new()), settings);

        let locator = RemoteTrackLocator::parse(&library.track_uri(&FlacTrack)).unwrap();
        assert_eq!(locator.uri, "http://192.168.1.20:7907/audio/id/3141");
        assert_eq!(locator.track_type, ".flac");
        assert_eq!(locator.password, "hunter2");
    }

    #[test]
    fn test_reconnect_reads_updated_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        write_preferences(&path);

        let settings = Arc::new(JsonSettingsStore::open(&path).unwrap());
        let transport = Arc::new(MockTransport::new());
        let library = create_library(1, transport.clone(), settings);
        let pump = PumpHandle::spawn(Arc::new(InMemoryEventPump::new()), "flows-pump").unwrap();
        library.set_event_pump(Some(pump.pump().clone()));

        fs::write(
            &path,
            json!({ "RemoteLibraryHostname": "10.1.1.1", "RemoteLibraryWssPort": 7999 })
                .to_string(),
        )
        .unwrap();

        transport.transition(RawTransportState::Connected);
        transport.transition(RawTransportState::Disconnected);

        assert!(wait_until(|| transport.connect_calls().len() == 2));
        assert_eq!(
            transport.connect_calls()[1],
            ("10.1.1.1".to_string(), 7999, String::new())
        );

        // The mock stays disconnected, but no further state change arrives.
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(transport.connect_calls().len(), 2);

        library.close();
        pump.shutdown();
    }

    // =============================================================================
    // INTEGRATION TESTS: TRANSPORT → PUMP → LIBRARY
    // =============================================================================

    #[test]
    fn test_connection_lifecycle_on_pump_thread() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(JsonSettingsStore::open(dir.path().join("prefs.json")).unwrap());
        let transport = Arc::new(MockTransport::new());
        let library = create_library(1, transport.clone(), settings);
        let pump = PumpHandle::spawn(Arc::new(InMemoryEventPump::new()), "flows-pump").unwrap();
        library.set_event_pump(Some(pump.pump().clone()));

        let states = Arc::new(Mutex::new(Vec::new()));
        let sink = states.clone();
        library.on_connection_state_changed(move |state| sink.lock().push(state));

        transport.transition(RawTransportState::Connecting);
        transport.transition(RawTransportState::Connected);
        assert!(wait_until(|| states.lock().len() == 2));
        assert_eq!(library.connection_state(), ConnectionState::Connected);

        transport.reject_password();
        assert!(wait_until(|| {
            library.connection_state() == ConnectionState::AuthenticationFailure
        }));

        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(transport.connect_calls().len(), 1);
        assert_eq!(pump.pump().pending_count(), 0);

        library.close();
        pump.shutdown();
    }

    // =============================================================================
    // INTEGRATION TESTS: COMPLETION ROUTING
    // =============================================================================

    #[test]
    fn test_libraries_sharing_a_pump_see_only_their_completions() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(JsonSettingsStore::open(dir.path().join("prefs.json")).unwrap());
        let pump = PumpHandle::spawn(Arc::new(InMemoryEventPump::new()), "flows-pump").unwrap();

        let first_transport = Arc::new(MockTransport::new());
        let second_transport = Arc::new(MockTransport::new());
        first_transport.script_tokens(&["abc123"]);
        second_transport.script_tokens(&["abc123"]);
        let first = create_library(1, first_transport.clone(), settings.clone());
        let second = create_library(2, second_transport.clone(), settings);
        first.set_event_pump(Some(pump.pump().clone()));
        second.set_event_pump(Some(pump.pump().clone()));

        let seen: Arc<Mutex<Vec<(u32, QueryId)>>> = Arc::new(Mutex::new(Vec::new()));
        let first_seen = seen.clone();
        first.on_query_completed(move |query| first_seen.lock().push((1, query.id())));
        let second_seen = seen.clone();
        second.on_query_completed(move |query| second_seen.lock().push((2, query.id())));

        let first_query: SharedQuery = Arc::new(RawQuery::new("search", json!({"term": "a"})));
        let second_query: SharedQuery = Arc::new(RawQuery::new("search", json!({"term": "b"})));
        first
            .enqueue(first_query.clone(), QueryMode::Async, None)
            .unwrap();
        second
            .enqueue(second_query.clone(), QueryMode::Async, None)
            .unwrap();
        assert!(wait_until(|| {
            first.stats().in_flight == 1 && second.stats().in_flight == 1
        }));

        assert!(second_transport.succeed("abc123", "{}"));
        assert!(wait_until(|| seen.lock().len() == 1));
        assert_eq!(*seen.lock(), vec![(2, second_query.id())]);
        assert_eq!(first.stats().in_flight, 1);

        assert!(first_transport.succeed("abc123", "{}"));
        assert!(wait_until(|| seen.lock().len() == 2));
        assert_eq!(seen.lock()[1], (1, first_query.id()));
        assert_eq!(first_query.status(), QueryStatus::Finished);

        first.close();
        second.close();
        pump.shutdown();
    }

    #[test]
    fn test_closed_library_stops_receiving_pump_events() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(JsonSettingsStore::open(dir.path().join("prefs.json")).unwrap());
        let pump = Arc::new(InMemoryEventPump::new());
        let transport = Arc::new(MockTransport::new());
        let library = create_library(1, transport.clone(), settings);
        library.set_event_pump(Some(pump.clone()));
        let target = library.target_id();

        transport.transition(RawTransportState::Connected);
        drop(library);

        assert!(!pump.is_registered(target));
        pump.dispatch_pending();
        assert_eq!(pump.pending_count(), 0);
    }
}
