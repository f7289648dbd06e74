//! # Remote Library Service
//!
//! Dispatch core tying the ports together.
//!
//! ## Flow
//!
//! ```text
//! enqueue ──(local-only)──────────────→ LocalQueryRouter
//!    │
//!    ├─ Async ──→ pending queue ──→ worker thread ─┐
//!    │                                             ├─→ Transport::enqueue_query
//!    └─ Synchronous (caller thread) ───────────────┘         │ token
//!                                                            ▼
//!                                                   in-flight registry
//!                                                            │
//! TransportListener::on_query_* ──→ complete(token) ─────────┘
//!                                        │
//!                                        ▼
//!                        event pump (QUERY_COMPLETED) or inline
//!                                        │
//!                                        ▼
//!                          observers, then per-call callback
//! ```
//!
//! ## Locking
//!
//! The pending queue, the in-flight registry and the exit flag live in one
//! mutex with two condition variables (`queue_ready` for the worker,
//! `sync_completed` for synchronous callers). The transport is always
//! called without that mutex held. A completion that races ahead of its
//! own hand-off is parked in `early_completions` and applied when the
//! hand-off returns, so transports may call back from any thread, including
//! synchronously from inside `enqueue_query`.

use crate::config::RemoteLibraryConfig;
use crate::domain::{
    should_reconnect, CompletionCallback, ConnectionState, CorrelationToken, DispatchStats,
    InFlightRegistry, LibraryError, LibraryId, ObserverId, Observers, QueryContext,
    QueryFailure, RawTransportState, Track, CONNECTION_STATE_CHANGED, QUERY_COMPLETED,
    RECONNECT_SOCKET,
};
use crate::domain::locator;
use crate::ports::{
    ConnectionConfigProvider, Library, LocalQueryRouter, Transport, TransportListener,
};
use parking_lot::{Condvar, Mutex, RwLock};
use rl_telemetry::metrics::{
    CONNECTION_STATE_CHANGES, QUERIES_COMPLETED, QUERIES_DROPPED, QUERIES_ENQUEUED,
    QUERIES_IN_FLIGHT, QUERIES_LOCAL, QUERY_ROUNDTRIP, RECONNECTS_SCHEDULED,
};
use rl_telemetry::{log_connection_event, log_query_event};
use shared_bus::{EventPump, EventTarget, PumpEvent, TargetId};
use shared_types::{Query, QueryId, QueryMode, QueryStatus, SharedQuery};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Collaborators and settings for a [`RemoteLibrary`].
pub struct LibraryDependencies {
    /// Connection to the remote peer.
    pub transport: Arc<dyn Transport>,
    /// Local engine for local-only queries.
    pub router: Arc<dyn LocalQueryRouter>,
    /// Source of host, ports and credential.
    pub settings: Arc<dyn ConnectionConfigProvider>,
    /// Dispatch settings.
    pub config: RemoteLibraryConfig,
}

struct DispatchState {
    pending: VecDeque<QueryContext>,
    in_flight: InFlightRegistry,
    exit: bool,
    handoffs_in_progress: usize,
    early_completions: HashSet<CorrelationToken>,
}

#[derive(Default)]
struct DispatchCounters {
    enqueued: AtomicU64,
    completed: AtomicU64,
    dropped: AtomicU64,
}

/// Shared state behind a [`RemoteLibrary`].
///
/// Registered weakly as the transport listener and as an event pump target.
struct LibraryCore {
    id: LibraryId,
    name: String,
    target_id: TargetId,
    transport: Arc<dyn Transport>,
    router: Arc<dyn LocalQueryRouter>,
    settings: Arc<dyn ConnectionConfigProvider>,
    config: RemoteLibraryConfig,
    dispatch: Mutex<DispatchState>,
    queue_ready: Condvar,
    sync_completed: Condvar,
    pump: RwLock<Option<Arc<dyn EventPump>>>,
    connection_state: RwLock<ConnectionState>,
    observers: Observers,
    counters: DispatchCounters,
}

impl LibraryCore {
    // =========================================================================
    // Dispatch
    // =========================================================================

    fn enqueue(
        &self,
        query: SharedQuery,
        mode: QueryMode,
        callback: Option<CompletionCallback>,
    ) -> Result<QueryId, LibraryError> {
        if self.router.is_local_only(query.name()) {
            QUERIES_LOCAL.inc();
            log_query_event!(debug, "Routing local-only query", self.id, query.id(), name = query.name());
            return self.router.enqueue(query, mode, callback);
        }

        let context = QueryContext::new(query, callback);
        match mode {
            QueryMode::Async => self.enqueue_async(context),
            QueryMode::Synchronous => self.enqueue_sync(context),
        }
    }

    fn enqueue_async(&self, context: QueryContext) -> Result<QueryId, LibraryError> {
        let query_id = context.query_id();
        {
            let mut state = self.dispatch.lock();
            if state.exit {
                return Err(LibraryError::ShuttingDown);
            }
            state.pending.push_back(context);
        }
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        QUERIES_ENQUEUED.with_label_values(&["async"]).inc();
        self.queue_ready.notify_one();
        log_query_event!(trace, "Query queued", self.id, query_id);
        Ok(query_id)
    }

    fn enqueue_sync(&self, context: QueryContext) -> Result<QueryId, LibraryError> {
        let query = context.query.clone();
        let query_id = query.id();
        if self.dispatch.lock().exit {
            return Err(LibraryError::ShuttingDown);
        }
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        QUERIES_ENQUEUED.with_label_values(&["sync"]).inc();

        self.hand_off(context);

        let mut state = self.dispatch.lock();
        while !state.exit && state.in_flight.contains_query(query_id) && !query.status().is_terminal()
        {
            self.sync_completed.wait(&mut state);
        }
        log_query_event!(debug, "Synchronous query returned", self.id, query_id, status = %query.status());
        Ok(query_id)
    }

    /// Block until a query is queued or shutdown begins.
    fn next_query(&self) -> Option<QueryContext> {
        let mut state = self.dispatch.lock();
        loop {
            if state.exit {
                return None;
            }
            if let Some(context) = state.pending.pop_front() {
                return Some(context);
            }
            self.queue_ready.wait(&mut state);
        }
    }

    fn run_worker(&self) {
        debug!(library_id = self.id, "Dispatch worker started");
        while let Some(context) = self.next_query() {
            self.hand_off(context);
        }
        debug!(library_id = self.id, "Dispatch worker stopped");
    }

    /// Give a query to the transport and track it under the returned token.
    fn hand_off(&self, context: QueryContext) {
        let query = context.query.clone();
        if query.status() == QueryStatus::Idle {
            query.set_status(QueryStatus::Running);
        }
        self.dispatch.lock().handoffs_in_progress += 1;

        let token = self
            .transport
            .enqueue_query(query.clone())
            .filter(|token| !token.is_empty());

        let mut state = self.dispatch.lock();
        state.handoffs_in_progress -= 1;
        // A parked token only finishes this query if the transport has
        // already resolved it; otherwise the completion belonged to an
        // earlier holder of the token and is dropped.
        let completed_early = token
            .as_ref()
            .map_or(false, |token| state.early_completions.remove(token))
            && query.status().is_terminal();
        if state.handoffs_in_progress == 0 {
            state.early_completions.clear();
        }

        match token {
            Some(token) if !completed_early => {
                let displaced = state.in_flight.insert(token.clone(), context.handed_off());
                QUERIES_IN_FLIGHT.inc();
                drop(state);
                log_query_event!(debug, "Query handed off", self.id, query.id(), token = %token);
                if let Some(displaced) = displaced {
                    QUERIES_IN_FLIGHT.dec();
                    warn!(
                        library_id = self.id,
                        token = %token,
                        displaced_query_id = %displaced.query_id(),
                        "Transport reused a live token; failing the displaced query"
                    );
                    displaced.query.set_status(QueryStatus::Failed);
                    self.finish(displaced);
                }
            }
            Some(token) => {
                drop(state);
                log_query_event!(debug, "Query completed during hand-off", self.id, query.id(), token = %token);
                self.finish(context.handed_off());
                self.sync_completed.notify_all();
            }
            None => {
                drop(state);
                log_query_event!(warn, "Transport refused query", self.id, query.id(), name = query.name());
                query.set_status(QueryStatus::Failed);
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                QUERIES_DROPPED.with_label_values(&["handoff_failed"]).inc();
                self.notify_completed(context);
                self.sync_completed.notify_all();
            }
        }
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Route the completion for `token`. Unknown tokens are ignored.
    fn complete(&self, token: &CorrelationToken) {
        let context = {
            let mut state = self.dispatch.lock();
            let context = state.in_flight.take(token);
            if context.is_some() {
                QUERIES_IN_FLIGHT.dec();
            } else if state.handoffs_in_progress > 0 {
                state.early_completions.insert(token.clone());
            }
            context
        };

        match context {
            Some(context) => self.finish(context),
            None => trace!(library_id = self.id, token = %token, "Completion for unknown token"),
        }
        self.sync_completed.notify_all();
    }

    fn finish(&self, context: QueryContext) {
        let status = context.query.status();
        let label = status.to_string();
        self.counters.completed.fetch_add(1, Ordering::Relaxed);
        QUERIES_COMPLETED.with_label_values(&[label.as_str()]).inc();
        if let Some(handed_off_at) = context.handed_off_at {
            QUERY_ROUNDTRIP.observe(handed_off_at.elapsed().as_secs_f64());
        }
        log_query_event!(debug, "Query completed", self.id, context.query_id(), %status);
        self.notify_completed(context);
    }

    /// Post the completion to the pump, or deliver it here without one.
    fn notify_completed(&self, context: QueryContext) {
        let pump = self.pump.read().clone();
        match pump {
            Some(pump) => pump.post(
                PumpEvent::new(self.target_id, QUERY_COMPLETED).with_payload(context),
                Duration::ZERO,
            ),
            None => self.deliver_completion(context),
        }
    }

    fn deliver_completion(&self, context: QueryContext) {
        self.observers.notify_query_completed(&context.query);
        if let Some(callback) = context.callback {
            callback(context.query);
        }
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Read host, control port and credential, then (re)connect.
    fn reload_connection(&self) {
        if let Err(error) = self.settings.refresh() {
            warn!(library_id = self.id, %error, "Settings refresh failed; using cached values");
        }
        let settings = self.settings.connection_settings();
        info!(
            library_id = self.id,
            host = %settings.host,
            port = settings.wss_port,
            "Connecting to remote library"
        );
        self.transport
            .connect(&settings.host, settings.wss_port, &settings.password);
    }

    fn is_closing(&self) -> bool {
        self.dispatch.lock().exit
    }

    fn post_state(&self, pump: &Arc<dyn EventPump>, state: ConnectionState) {
        pump.post(
            PumpEvent::new(self.target_id, CONNECTION_STATE_CHANGED).with_payload(state),
            Duration::ZERO,
        );
    }

    fn on_reconnect_timer(&self) {
        if self.is_closing() {
            return;
        }
        let raw = self.transport.connection_state();
        if raw == RawTransportState::Disconnected {
            info!(library_id = self.id, "Reconnect timer fired");
            self.reload_connection();
        } else {
            debug!(library_id = self.id, ?raw, "Reconnect skipped; transport not disconnected");
        }
    }

    fn apply_state(&self, state: ConnectionState) {
        *self.connection_state.write() = state;
        CONNECTION_STATE_CHANGES
            .with_label_values(&[state.as_str()])
            .inc();
        log_connection_event!(info, "Connection state changed", self.id, state);
        self.observers.notify_state_changed(state);
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Set the exit flag, discard queued work, wake everyone.
    ///
    /// Returns false if shutdown had already begun.
    fn shutdown(&self) -> bool {
        let discarded: Vec<QueryContext> = {
            let mut state = self.dispatch.lock();
            if state.exit {
                return false;
            }
            state.exit = true;
            state.pending.drain(..).collect()
        };

        self.transport.disconnect();

        for context in &discarded {
            if !context.query.status().is_terminal() {
                context.query.set_status(QueryStatus::Failed);
            }
        }
        if !discarded.is_empty() {
            self.counters
                .dropped
                .fetch_add(discarded.len() as u64, Ordering::Relaxed);
            QUERIES_DROPPED
                .with_label_values(&["shutdown"])
                .inc_by(discarded.len() as f64);
            warn!(
                library_id = self.id,
                discarded = discarded.len(),
                "Discarded queued queries on shutdown"
            );
        }

        self.queue_ready.notify_all();
        self.sync_completed.notify_all();
        true
    }

    /// Forget queries still awaiting a response once nothing can complete
    /// them anymore. Returns how many were released.
    fn release_in_flight(&self) -> usize {
        let released = self.dispatch.lock().in_flight.drain();
        if !released.is_empty() {
            QUERIES_IN_FLIGHT.sub(released.len() as f64);
            debug!(
                library_id = self.id,
                released = released.len(),
                "Released unanswered queries"
            );
        }
        released.len()
    }

    fn stats(&self) -> DispatchStats {
        let state = self.dispatch.lock();
        DispatchStats {
            pending: state.pending.len(),
            in_flight: state.in_flight.len(),
            total_enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            total_completed: self.counters.completed.load(Ordering::Relaxed),
            total_dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

impl TransportListener for LibraryCore {
    fn on_state_changed(&self, new_state: RawTransportState, old_state: RawTransportState) {
        let last_error = self.transport.last_connection_error();
        let state = ConnectionState::from_transport(new_state, last_error);
        debug!(
            library_id = self.id,
            ?old_state,
            ?new_state,
            ?last_error,
            "Transport state changed"
        );

        let Some(pump) = self.pump.read().clone() else {
            debug!(library_id = self.id, "No event pump; state change not published");
            return;
        };

        if should_reconnect(new_state, last_error) && !self.is_closing() {
            pump.remove(self.target_id, RECONNECT_SOCKET);
            pump.post(
                PumpEvent::new(self.target_id, RECONNECT_SOCKET),
                self.config.reconnect_delay(),
            );
            RECONNECTS_SCHEDULED.inc();
            info!(
                library_id = self.id,
                delay_ms = self.config.reconnect_delay_ms,
                "Reconnect scheduled"
            );
        }

        self.post_state(&pump, state);
    }

    fn on_query_succeeded(&self, token: CorrelationToken, _query: SharedQuery) {
        self.complete(&token);
    }

    fn on_query_failed(&self, token: CorrelationToken, query: SharedQuery, reason: QueryFailure) {
        debug!(library_id = self.id, token = %token, %reason, "Query failed");
        if !query.status().is_terminal() {
            query.set_status(QueryStatus::Failed);
        }
        self.complete(&token);
    }

    fn on_invalid_password(&self) {
        warn!(library_id = self.id, "Remote library rejected the password");
        if let Some(pump) = self.pump.read().clone() {
            self.post_state(&pump, ConnectionState::AuthenticationFailure);
        }
    }
}

impl EventTarget for LibraryCore {
    fn target_id(&self) -> TargetId {
        self.target_id
    }

    fn process_event(&self, mut event: PumpEvent) {
        match event.kind() {
            QUERY_COMPLETED => {
                if let Some(context) = event.take_payload::<QueryContext>() {
                    self.deliver_completion(context);
                }
            }
            RECONNECT_SOCKET => self.on_reconnect_timer(),
            CONNECTION_STATE_CHANGED => {
                if let Some(state) = event.take_payload::<ConnectionState>() {
                    self.apply_state(state);
                }
            }
            other => trace!(library_id = self.id, kind = %other, "Ignoring event"),
        }
    }
}

/// A library whose queries run on a remote peer.
///
/// Dropping the handle closes the library and unregisters it from its
/// event pump.
pub struct RemoteLibrary {
    core: Arc<LibraryCore>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RemoteLibrary {
    /// Create the library, start its worker, and (by default) connect.
    pub fn create(
        name: impl Into<String>,
        id: LibraryId,
        deps: LibraryDependencies,
    ) -> Result<Arc<Self>, LibraryError> {
        let name = name.into();
        let core = Arc::new(LibraryCore {
            id,
            name: name.clone(),
            target_id: TargetId::next(),
            transport: deps.transport,
            router: deps.router,
            settings: deps.settings,
            config: deps.config,
            dispatch: Mutex::new(DispatchState {
                pending: VecDeque::new(),
                in_flight: InFlightRegistry::new(),
                exit: false,
                handoffs_in_progress: 0,
                early_completions: HashSet::new(),
            }),
            queue_ready: Condvar::new(),
            sync_completed: Condvar::new(),
            pump: RwLock::new(None),
            connection_state: RwLock::new(ConnectionState::Disconnected),
            observers: Observers::new(),
            counters: DispatchCounters::default(),
        });

        let worker_core = core.clone();
        let worker = thread::Builder::new()
            .name(format!("remote-library-{}", id))
            .spawn(move || worker_core.run_worker())
            .map_err(LibraryError::WorkerSpawn)?;

        let listener: Weak<dyn TransportListener> = Arc::downgrade(&core) as Weak<dyn TransportListener>;
        core.transport.set_listener(listener);

        let library = Arc::new(Self {
            core,
            worker: Mutex::new(Some(worker)),
        });

        info!(library_id = id, name = %name, "Remote library created");
        if library.core.config.connect_on_create {
            library.core.reload_connection();
        }
        Ok(library)
    }

    /// Re-read configuration and reconnect now.
    pub fn reload_connection(&self) {
        self.core.reload_connection();
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.core.transport
    }

    /// Event pump target address of this library.
    pub fn target_id(&self) -> TargetId {
        self.core.target_id
    }

    /// Snapshot of dispatch counters.
    pub fn stats(&self) -> DispatchStats {
        self.core.stats()
    }

    /// Locator for streaming `track` from the remote peer.
    pub fn track_uri(&self, track: &dyn Track) -> String {
        locator::track_uri(track, &self.core.settings.connection_settings())
    }

    /// Fire `hook` for every completed remote query, before its callback.
    pub fn on_query_completed<F>(&self, hook: F) -> ObserverId
    where
        F: Fn(&SharedQuery) + Send + Sync + 'static,
    {
        self.core.observers.add_query_completed(Arc::new(hook))
    }

    /// Fire `hook` for every published connection state.
    pub fn on_connection_state_changed<F>(&self, hook: F) -> ObserverId
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.core.observers.add_state_changed(Arc::new(hook))
    }

    /// Remove a hook added by either `on_*` method.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.core.observers.remove(id)
    }
}

impl Library for RemoteLibrary {
    fn id(&self) -> LibraryId {
        self.core.id
    }

    fn name(&self) -> &str {
        &self.core.name
    }

    fn enqueue(
        &self,
        query: SharedQuery,
        mode: QueryMode,
        callback: Option<CompletionCallback>,
    ) -> Result<QueryId, LibraryError> {
        self.core.enqueue(query, mode, callback)
    }

    fn close(&self) {
        if self.core.shutdown() {
            info!(library_id = self.core.id, "Remote library closing");
        }
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                warn!(library_id = self.core.id, "Dispatch worker panicked");
            }
        }
    }

    fn set_event_pump(&self, pump: Option<Arc<dyn EventPump>>) {
        let mut slot = self.core.pump.write();
        if let (Some(current), Some(next)) = (slot.as_ref(), pump.as_ref()) {
            if Arc::as_ptr(current) as *const () == Arc::as_ptr(next) as *const () {
                return;
            }
        }
        if let Some(previous) = slot.take() {
            previous.unregister(self.core.target_id);
        }
        if let Some(next) = &pump {
            let target: Weak<dyn EventTarget> = Arc::downgrade(&self.core) as Weak<dyn EventTarget>;
            next.register(target);
        }
        debug!(
            library_id = self.core.id,
            attached = pump.is_some(),
            "Event pump set"
        );
        *slot = pump;
    }

    fn connection_state(&self) -> ConnectionState {
        *self.core.connection_state.read()
    }

    fn is_configured(&self) -> bool {
        self.core.settings.remote_library_viewed()
    }
}

impl Drop for RemoteLibrary {
    fn drop(&mut self) {
        self.close();
        if let Some(pump) = self.core.pump.write().take() {
            pump.unregister(self.core.target_id);
        }
        self.core.release_in_flight();
    }
}
