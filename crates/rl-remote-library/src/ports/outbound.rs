//! # Outbound Ports
//!
//! Traits for the remote library's collaborators: the wire transport, the
//! local query engine, and the configuration source.

use crate::config::ConnectionSettings;
use crate::domain::{
    CompletionCallback, CorrelationToken, LibraryError, QueryFailure, RawTransportState,
    SettingsError, TransportConnectionError,
};
use parking_lot::{Mutex, RwLock};
use shared_types::{Query, QueryId, QueryMode, QueryStatus, SharedQuery};
use std::collections::{HashMap, VecDeque};
use std::sync::Weak;

/// Wire transport to the remote peer - outbound port.
///
/// Callbacks go to the registered [`TransportListener`], usually from the
/// transport's own threads.
pub trait Transport: Send + Sync {
    /// Start connecting; progress is reported through the listener.
    fn connect(&self, host: &str, port: u16, password: &str);

    /// Close the connection.
    fn disconnect(&self);

    /// Send a query. Returns its correlation token, or `None` (or an empty
    /// token) if the query could not be accepted.
    fn enqueue_query(&self, query: SharedQuery) -> Option<CorrelationToken>;

    /// Current raw state.
    fn connection_state(&self) -> RawTransportState;

    /// Why the last connection attempt ended.
    fn last_connection_error(&self) -> TransportConnectionError;

    /// Listener for state changes and query outcomes. Held weakly.
    fn set_listener(&self, listener: Weak<dyn TransportListener>);
}

/// Receiver of transport callbacks.
pub trait TransportListener: Send + Sync {
    /// The raw connection state changed.
    fn on_state_changed(&self, new_state: RawTransportState, old_state: RawTransportState);

    /// The result for `token` was applied to `query` (status `Finished`).
    fn on_query_succeeded(&self, token: CorrelationToken, query: SharedQuery);

    /// The query for `token` failed.
    fn on_query_failed(&self, token: CorrelationToken, query: SharedQuery, reason: QueryFailure);

    /// The peer rejected the credential.
    fn on_invalid_password(&self);
}

/// Local query engine and query-type registry - outbound port.
pub trait LocalQueryRouter: Send + Sync {
    /// Whether queries named `name` must never leave this process.
    fn is_local_only(&self, name: &str) -> bool;

    /// Execute a query locally.
    fn enqueue(
        &self,
        query: SharedQuery,
        mode: QueryMode,
        callback: Option<CompletionCallback>,
    ) -> Result<QueryId, LibraryError>;

    /// Instantiate a local query from a payload produced by
    /// [`Query::serialize_query`].
    fn create_query(&self, name: &str, serialized: &str) -> Option<SharedQuery>;
}

/// Configuration source - outbound port.
///
/// Read at creation and on every reconnect.
pub trait ConnectionConfigProvider: Send + Sync {
    /// Host, ports and credential of the remote peer.
    fn connection_settings(&self) -> ConnectionSettings;

    /// Whether the user has seen the remote library setup.
    fn remote_library_viewed(&self) -> bool;

    /// Re-read the backing store before a connection attempt. In-memory
    /// sources have nothing to do.
    fn refresh(&self) -> Result<(), SettingsError> {
        Ok(())
    }
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

#[derive(Default)]
struct MockTransportState {
    state: RawTransportState,
    last_error: TransportConnectionError,
    refuse: bool,
    next_token: u64,
    scripted_tokens: VecDeque<String>,
    sent: Vec<(CorrelationToken, SharedQuery)>,
    outstanding: HashMap<CorrelationToken, SharedQuery>,
    connects: Vec<(String, u16, String)>,
    disconnects: usize,
}

/// Scriptable transport for tests.
///
/// Queries are accepted and held until the test resolves them with
/// [`MockTransport::succeed`] or [`MockTransport::fail`]. State changes are
/// driven with [`MockTransport::transition`]. Listener callbacks run on the
/// calling thread, outside the mock's lock.
#[derive(Default)]
pub struct MockTransport {
    inner: Mutex<MockTransportState>,
    listener: RwLock<Option<Weak<dyn TransportListener>>>,
}

impl MockTransport {
    /// Disconnected mock that accepts every query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `enqueue_query` return `None` while `refuse` is set.
    pub fn set_refusing(&self, refuse: bool) {
        self.inner.lock().refuse = refuse;
    }

    /// Hand out these tokens, in order, before falling back to generated ones.
    pub fn script_tokens(&self, tokens: &[&str]) {
        let mut inner = self.inner.lock();
        inner
            .scripted_tokens
            .extend(tokens.iter().map(|t| t.to_string()));
    }

    /// Set the error reported by `last_connection_error`.
    pub fn set_last_error(&self, error: TransportConnectionError) {
        self.inner.lock().last_error = error;
    }

    /// Names of sent queries, in hand-off order.
    pub fn sent_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .sent
            .iter()
            .map(|(_, q)| q.name().to_string())
            .collect()
    }

    /// Ids of sent queries, in hand-off order.
    pub fn sent_ids(&self) -> Vec<QueryId> {
        self.inner.lock().sent.iter().map(|(_, q)| q.id()).collect()
    }

    /// Tokens handed out, in hand-off order.
    pub fn sent_tokens(&self) -> Vec<CorrelationToken> {
        self.inner
            .lock()
            .sent
            .iter()
            .map(|(t, _)| t.clone())
            .collect()
    }

    /// `(host, port, password)` of every `connect` call.
    pub fn connect_calls(&self) -> Vec<(String, u16, String)> {
        self.inner.lock().connects.clone()
    }

    /// Number of `disconnect` calls.
    pub fn disconnect_count(&self) -> usize {
        self.inner.lock().disconnects
    }

    /// Change the raw state and notify the listener.
    pub fn transition(&self, new_state: RawTransportState) {
        let old_state = {
            let mut inner = self.inner.lock();
            std::mem::replace(&mut inner.state, new_state)
        };
        if let Some(listener) = self.listener() {
            listener.on_state_changed(new_state, old_state);
        }
    }

    /// Apply `result` to the query behind `token` and report success.
    ///
    /// Returns false if the token is unknown or already resolved.
    pub fn succeed(&self, token: &str, result: &str) -> bool {
        let token = CorrelationToken::from(token);
        let Some(query) = self.inner.lock().outstanding.remove(&token) else {
            return false;
        };
        let status = match query.deserialize_result(result) {
            Ok(()) => QueryStatus::Finished,
            Err(_) => QueryStatus::Failed,
        };
        query.set_status(status);
        if let Some(listener) = self.listener() {
            if status == QueryStatus::Finished {
                listener.on_query_succeeded(token, query);
            } else {
                listener.on_query_failed(token, query, QueryFailure::InvalidResponse);
            }
        }
        true
    }

    /// Report a failure for the query behind `token` without touching its
    /// status.
    pub fn fail(&self, token: &str, reason: QueryFailure) -> bool {
        let token = CorrelationToken::from(token);
        let Some(query) = self.inner.lock().outstanding.remove(&token) else {
            return false;
        };
        if let Some(listener) = self.listener() {
            listener.on_query_failed(token, query, reason);
        }
        true
    }

    /// Deliver a completion for a token again, as a misbehaving transport
    /// would.
    pub fn replay_success(&self, token: &str) -> bool {
        let token = CorrelationToken::from(token);
        let query = self
            .inner
            .lock()
            .sent
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, q)| q.clone());
        match (query, self.listener()) {
            (Some(query), Some(listener)) => {
                listener.on_query_succeeded(token, query);
                true
            }
            _ => false,
        }
    }

    /// Reject the credential: report it, then drop to `Disconnected`.
    pub fn reject_password(&self) {
        self.set_last_error(TransportConnectionError::InvalidPassword);
        if let Some(listener) = self.listener() {
            listener.on_invalid_password();
        }
        self.transition(RawTransportState::Disconnected);
    }

    fn listener(&self) -> Option<std::sync::Arc<dyn TransportListener>> {
        self.listener.read().as_ref().and_then(Weak::upgrade)
    }
}

impl Transport for MockTransport {
    fn connect(&self, host: &str, port: u16, password: &str) {
        self.inner
            .lock()
            .connects
            .push((host.to_string(), port, password.to_string()));
    }

    fn disconnect(&self) {
        let was_connected = {
            let mut inner = self.inner.lock();
            inner.disconnects += 1;
            inner.state != RawTransportState::Disconnected
        };
        if was_connected {
            self.transition(RawTransportState::Disconnected);
        }
    }

    fn enqueue_query(&self, query: SharedQuery) -> Option<CorrelationToken> {
        let mut inner = self.inner.lock();
        if inner.refuse {
            return None;
        }
        let token = match inner.scripted_tokens.pop_front() {
            Some(token) => CorrelationToken::from(token),
            None => {
                inner.next_token += 1;
                CorrelationToken::from(format!("token-{}", inner.next_token))
            }
        };
        inner.sent.push((token.clone(), query.clone()));
        inner.outstanding.insert(token.clone(), query);
        Some(token)
    }

    fn connection_state(&self) -> RawTransportState {
        self.inner.lock().state
    }

    fn last_connection_error(&self) -> TransportConnectionError {
        self.inner.lock().last_error
    }

    fn set_listener(&self, listener: Weak<dyn TransportListener>) {
        *self.listener.write() = Some(listener);
    }
}
