//! # Domain Entities
//!
//! Query contexts, correlation tokens, and the event kinds the library
//! posts to its event pump.

use shared_bus::EventKind;
use shared_types::{Query, QueryId, SharedQuery};
use std::fmt;
use std::time::Instant;

/// Host-assigned library identifier.
pub type LibraryId = u32;

/// Callback invoked once with the completed query.
pub type CompletionCallback = Box<dyn FnOnce(SharedQuery) + Send>;

/// Event pump kind: a query completed; payload is its [`QueryContext`].
pub const QUERY_COMPLETED: EventKind = EventKind(5000);

/// Event pump kind: the reconnect timer fired.
pub const RECONNECT_SOCKET: EventKind = EventKind(5001);

/// Event pump kind: the connection state changed; payload is the new
/// [`crate::domain::ConnectionState`].
pub const CONNECTION_STATE_CHANGED: EventKind = EventKind(5002);

/// Opaque handle assigned by the transport to one outstanding query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Wrap a transport-assigned token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// An empty token means the transport refused the query.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for CorrelationToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// A query and its completion callback.
///
/// Owned by exactly one of: the pending queue, the in-flight registry, a
/// synchronous hand-off frame, or a completion event in the pump.
pub struct QueryContext {
    /// The query being dispatched.
    pub query: SharedQuery,
    /// Invoked with the query once it completes.
    pub callback: Option<CompletionCallback>,
    /// Set when the transport accepted the query.
    pub handed_off_at: Option<Instant>,
}

impl QueryContext {
    /// New context, not yet handed off.
    pub fn new(query: SharedQuery, callback: Option<CompletionCallback>) -> Self {
        Self {
            query,
            callback,
            handed_off_at: None,
        }
    }

    /// Id of the wrapped query.
    pub fn query_id(&self) -> QueryId {
        self.query.id()
    }

    /// Record the hand-off time.
    #[must_use]
    pub fn handed_off(mut self) -> Self {
        self.handed_off_at = Some(Instant::now());
        self
    }
}

impl fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("query_id", &self.query.id())
            .field("name", &self.query.name())
            .field("status", &self.query.status())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Reason reported by the transport for a failed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFailure {
    /// The connection dropped before the response arrived.
    Disconnected,
    /// The peer did not answer in time.
    Timeout,
    /// The response could not be applied to the query.
    InvalidResponse,
    /// The peer reported an error.
    Remote(String),
}

impl fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Timeout => f.write_str("timeout"),
            Self::InvalidResponse => f.write_str("invalid response"),
            Self::Remote(message) => write!(f, "remote error: {}", message),
        }
    }
}

/// Point-in-time dispatch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Queries waiting for the worker.
    pub pending: usize,
    /// Queries handed off and awaiting completion.
    pub in_flight: usize,
    /// Remote queries accepted since creation.
    pub total_enqueued: u64,
    /// Queries completed by the transport.
    pub total_completed: u64,
    /// Queries dropped (refused hand-off or discarded on shutdown).
    pub total_dropped: u64,
}
