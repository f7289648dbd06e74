//! # Loopback Transport
//!
//! A [`Transport`] that never leaves the process: each query is serialized,
//! rebuilt through the local router's query registry, executed locally, and
//! its serialized result applied back onto the original query. Completions
//! are reported from a dedicated resolver thread, like a network transport
//! would.
//!
//! Useful for exercising the full dispatch path without a remote peer.

use crate::domain::{
    CorrelationToken, QueryFailure, RawTransportState, TransportConnectionError,
};
use crate::ports::{LocalQueryRouter, Transport, TransportListener};
use parking_lot::{Condvar, Mutex, RwLock};
use shared_types::{Query, QueryMode, QueryStatus, SharedQuery};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

struct ConnectionSlot {
    state: RawTransportState,
    last_error: TransportConnectionError,
}

struct Jobs {
    queue: VecDeque<(CorrelationToken, SharedQuery)>,
    stop: bool,
}

struct Shared {
    router: Arc<dyn LocalQueryRouter>,
    listener: RwLock<Option<Weak<dyn TransportListener>>>,
    jobs: Mutex<Jobs>,
    job_ready: Condvar,
}

impl Shared {
    fn listener(&self) -> Option<Arc<dyn TransportListener>> {
        self.listener.read().as_ref().and_then(Weak::upgrade)
    }

    fn run(&self) {
        loop {
            let (token, query) = {
                let mut jobs = self.jobs.lock();
                loop {
                    if jobs.stop {
                        return;
                    }
                    if let Some(job) = jobs.queue.pop_front() {
                        break job;
                    }
                    self.job_ready.wait(&mut jobs);
                }
            };
            self.resolve(token, query);
        }
    }

    fn resolve(&self, token: CorrelationToken, remote: SharedQuery) {
        let outcome = self.execute_locally(&remote);
        let listener = self.listener();
        match outcome {
            Ok(()) => {
                remote.set_status(QueryStatus::Finished);
                debug!(token = %token, query_id = %remote.id(), "Loopback query finished");
                if let Some(listener) = listener {
                    listener.on_query_succeeded(token, remote);
                }
            }
            Err(reason) => {
                remote.set_status(QueryStatus::Failed);
                warn!(token = %token, query_id = %remote.id(), %reason, "Loopback query failed");
                if let Some(listener) = listener {
                    listener.on_query_failed(token, remote, reason);
                }
            }
        }
    }

    fn execute_locally(&self, remote: &SharedQuery) -> Result<(), QueryFailure> {
        let payload = remote
            .serialize_query()
            .map_err(|e| QueryFailure::Remote(e.to_string()))?;
        let local = self
            .router
            .create_query(remote.name(), &payload)
            .ok_or_else(|| QueryFailure::Remote(format!("unknown query '{}'", remote.name())))?;

        self.router
            .enqueue(local.clone(), QueryMode::Synchronous, None)
            .map_err(|e| QueryFailure::Remote(e.to_string()))?;
        if local.status() != QueryStatus::Finished {
            return Err(QueryFailure::Remote(format!(
                "local execution ended {}",
                local.status()
            )));
        }

        let result = local
            .serialize_result()
            .map_err(|_| QueryFailure::InvalidResponse)?;
        remote
            .deserialize_result(&result)
            .map_err(|_| QueryFailure::InvalidResponse)
    }
}

/// In-process transport backed by a [`LocalQueryRouter`].
pub struct LoopbackTransport {
    shared: Arc<Shared>,
    connection: Mutex<ConnectionSlot>,
    expected_password: Option<String>,
    resolver: Mutex<Option<JoinHandle<()>>>,
}

impl LoopbackTransport {
    /// Loopback transport that accepts any credential.
    pub fn new(router: Arc<dyn LocalQueryRouter>) -> std::io::Result<Self> {
        Self::build(router, None)
    }

    /// Loopback transport that rejects any credential but `password`.
    pub fn with_password(
        router: Arc<dyn LocalQueryRouter>,
        password: impl Into<String>,
    ) -> std::io::Result<Self> {
        Self::build(router, Some(password.into()))
    }

    fn build(
        router: Arc<dyn LocalQueryRouter>,
        expected_password: Option<String>,
    ) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            router,
            listener: RwLock::new(None),
            jobs: Mutex::new(Jobs {
                queue: VecDeque::new(),
                stop: false,
            }),
            job_ready: Condvar::new(),
        });
        let runner = shared.clone();
        let resolver = thread::Builder::new()
            .name("loopback-transport".to_string())
            .spawn(move || runner.run())?;
        Ok(Self {
            shared,
            connection: Mutex::new(ConnectionSlot {
                state: RawTransportState::Disconnected,
                last_error: TransportConnectionError::None,
            }),
            expected_password,
            resolver: Mutex::new(Some(resolver)),
        })
    }

    fn transition(&self, new_state: RawTransportState, error: TransportConnectionError) {
        let old_state = {
            let mut connection = self.connection.lock();
            connection.last_error = error;
            std::mem::replace(&mut connection.state, new_state)
        };
        if old_state == new_state {
            return;
        }
        if let Some(listener) = self.shared.listener() {
            listener.on_state_changed(new_state, old_state);
        }
    }
}

impl Transport for LoopbackTransport {
    fn connect(&self, host: &str, port: u16, password: &str) {
        info!(host, port, "Loopback connect");
        self.transition(RawTransportState::Connecting, TransportConnectionError::None);

        let accepted = self
            .expected_password
            .as_deref()
            .map_or(true, |expected| expected == password);
        if accepted {
            self.transition(RawTransportState::Connected, TransportConnectionError::None);
        } else {
            {
                self.connection.lock().last_error = TransportConnectionError::InvalidPassword;
            }
            if let Some(listener) = self.shared.listener() {
                listener.on_invalid_password();
            }
            self.transition(
                RawTransportState::Disconnected,
                TransportConnectionError::InvalidPassword,
            );
        }
    }

    fn disconnect(&self) {
        let abandoned: Vec<_> = self.shared.jobs.lock().queue.drain(..).collect();
        self.transition(RawTransportState::Disconnected, TransportConnectionError::None);
        if abandoned.is_empty() {
            return;
        }

        warn!(abandoned = abandoned.len(), "Loopback disconnected with queries outstanding");
        let listener = self.shared.listener();
        for (token, query) in abandoned {
            query.set_status(QueryStatus::Failed);
            if let Some(listener) = &listener {
                listener.on_query_failed(token, query, QueryFailure::Disconnected);
            }
        }
    }

    fn enqueue_query(&self, query: SharedQuery) -> Option<CorrelationToken> {
        if self.connection.lock().state != RawTransportState::Connected {
            return None;
        }
        let token = CorrelationToken::from(Uuid::new_v4().to_string());
        self.shared
            .jobs
            .lock()
            .queue
            .push_back((token.clone(), query));
        self.shared.job_ready.notify_one();
        Some(token)
    }

    fn connection_state(&self) -> RawTransportState {
        self.connection.lock().state
    }

    fn last_connection_error(&self) -> TransportConnectionError {
        self.connection.lock().last_error
    }

    fn set_listener(&self, listener: Weak<dyn TransportListener>) {
        *self.shared.listener.write() = Some(listener);
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        {
            let mut jobs = self.shared.jobs.lock();
            jobs.stop = true;
            jobs.queue.clear();
        }
        self.shared.job_ready.notify_all();
        if let Some(resolver) = self.resolver.lock().take() {
            if resolver.thread().id() != thread::current().id() && resolver.join().is_err() {
                warn!("Loopback resolver thread panicked");
            }
        }
    }
}
