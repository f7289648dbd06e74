//! # Query Contract
//!
//! A query is a unit of work with serializable parameters and result, a
//! routing name, and a status that moves from `Idle` to a terminal state.

use crate::QueryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_QUERY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique query identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(pub u64);

impl QueryId {
    /// Allocate the next identifier.
    pub fn next() -> Self {
        Self(NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryStatus {
    /// Created, not yet handed off.
    Idle,
    /// Handed off and awaiting a result.
    Running,
    /// Result received and applied.
    Finished,
    /// Failed locally, remotely, or dropped before hand-off.
    Failed,
    /// Abandoned by its owner.
    Canceled,
}

impl QueryStatus {
    /// True once the query can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Canceled)
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

/// How the caller wants to wait for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// Queue and return immediately; completion arrives via callback.
    #[default]
    Async,
    /// Hand off on the calling thread and block until terminal.
    Synchronous,
}

/// A serializable unit of work.
///
/// All methods take `&self`: queries are shared between the caller, the
/// dispatch core, and the transport, and the transport resolves them from
/// its own thread.
pub trait Query: Send + Sync {
    /// Unique identifier.
    fn id(&self) -> QueryId;

    /// Routing name (e.g. `"search"`).
    fn name(&self) -> &str;

    /// Current status.
    fn status(&self) -> QueryStatus;

    /// Replace the status.
    fn set_status(&self, status: QueryStatus);

    /// Encode the query (name, id, parameters) as an opaque payload.
    fn serialize_query(&self) -> Result<String, QueryError>;

    /// Encode the result produced by execution.
    fn serialize_result(&self) -> Result<String, QueryError>;

    /// Apply a result payload produced elsewhere.
    fn deserialize_result(&self, data: &str) -> Result<(), QueryError>;
}

/// Queries are passed around behind shared references.
pub type SharedQuery = Arc<dyn Query>;
