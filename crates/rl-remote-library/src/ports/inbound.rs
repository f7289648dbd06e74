//! # Inbound Ports
//!
//! The library surface a host application programs against.

use crate::domain::{CompletionCallback, ConnectionState, LibraryError, LibraryId};
use shared_bus::EventPump;
use shared_types::{QueryId, QueryMode, SharedQuery};
use std::sync::Arc;

/// A music library a host can query.
pub trait Library: Send + Sync {
    /// Host-assigned identifier.
    fn id(&self) -> LibraryId;

    /// Display name.
    fn name(&self) -> &str;

    /// Submit a query.
    ///
    /// Local-only queries bypass the remote path entirely. Async queries are
    /// queued and `callback` fires on completion; synchronous queries block
    /// until the query is terminal or the library shuts down.
    fn enqueue(
        &self,
        query: SharedQuery,
        mode: QueryMode,
        callback: Option<CompletionCallback>,
    ) -> Result<QueryId, LibraryError>;

    /// Stop the worker, drop queued queries, release waiters. Idempotent.
    fn close(&self);

    /// Route completions and state changes through `pump`, or deliver
    /// completions inline when `None`.
    fn set_event_pump(&self, pump: Option<Arc<dyn EventPump>>);

    /// Last published connection state.
    fn connection_state(&self) -> ConnectionState;

    /// Whether the user has completed remote setup.
    fn is_configured(&self) -> bool;
}
