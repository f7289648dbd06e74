//! Local query router backed by named handler functions.
//!
//! Each handler maps a query's JSON parameters to a JSON result. Queries
//! execute on the calling thread regardless of mode.

use crate::domain::{CompletionCallback, LibraryError};
use crate::ports::LocalQueryRouter;
use parking_lot::RwLock;
use serde_json::Value;
use shared_types::{Query, QueryError, QueryId, QueryMode, QueryStatus, RawQuery, SharedQuery};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Maps query parameters to a result.
pub type QueryHandler = Arc<dyn Fn(&Value) -> Result<Value, QueryError> + Send + Sync>;

/// Router over a table of named handlers.
#[derive(Default)]
pub struct HandlerRouter {
    handlers: RwLock<HashMap<String, QueryHandler>>,
    local_only: RwLock<HashSet<String>>,
    executed: AtomicU64,
}

impl HandlerRouter {
    /// Router with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for queries named `name`.
    pub fn register<F>(&self, name: &str, handler: F)
    where
        F: Fn(&Value) -> Result<Value, QueryError> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .insert(name.to_string(), Arc::new(handler));
    }

    /// Mark `name` as never leaving this process.
    pub fn mark_local_only(&self, name: &str) {
        self.local_only.write().insert(name.to_string());
    }

    /// Number of queries executed.
    pub fn executed_count(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// Run `query` through its handler and apply the result.
    ///
    /// Leaves the query `Finished` on success and `Failed` otherwise.
    pub fn execute(&self, query: &SharedQuery) -> Result<(), QueryError> {
        let handler = self.handlers.read().get(query.name()).cloned();
        let Some(handler) = handler else {
            query.set_status(QueryStatus::Failed);
            return Err(QueryError::Execution(format!(
                "no handler for query '{}'",
                query.name()
            )));
        };

        query.set_status(QueryStatus::Running);
        self.executed.fetch_add(1, Ordering::Relaxed);

        let outcome = Self::apply(&handler, query);
        match &outcome {
            Ok(()) => query.set_status(QueryStatus::Finished),
            Err(e) => {
                warn!(query_id = %query.id(), name = query.name(), error = %e, "Local query failed");
                query.set_status(QueryStatus::Failed);
            }
        }
        outcome
    }

    fn apply(handler: &QueryHandler, query: &SharedQuery) -> Result<(), QueryError> {
        let payload: Value = serde_json::from_str(&query.serialize_query()?)?;
        let params = payload.get("params").cloned().unwrap_or(Value::Null);
        let result = handler(&params)?;
        query.deserialize_result(&result.to_string())
    }
}

impl LocalQueryRouter for HandlerRouter {
    fn is_local_only(&self, name: &str) -> bool {
        self.local_only.read().contains(name)
    }

    fn enqueue(
        &self,
        query: SharedQuery,
        mode: QueryMode,
        callback: Option<CompletionCallback>,
    ) -> Result<QueryId, LibraryError> {
        let id = query.id();
        debug!(query_id = %id, name = query.name(), ?mode, "Executing local query");

        if !self.handlers.read().contains_key(query.name()) {
            query.set_status(QueryStatus::Failed);
            return Err(LibraryError::LocalQuery(format!(
                "no handler for query '{}'",
                query.name()
            )));
        }

        // Failures are reported through the query's status.
        let _ = self.execute(&query);

        if let Some(callback) = callback {
            callback(query);
        }
        Ok(id)
    }

    fn create_query(&self, name: &str, serialized: &str) -> Option<SharedQuery> {
        if !self.handlers.read().contains_key(name) {
            return None;
        }
        match RawQuery::from_serialized(serialized) {
            Ok(query) if query.name() == name => Some(Arc::new(query)),
            Ok(_) => None,
            Err(e) => {
                warn!(name, error = %e, "Could not rebuild query from payload");
                None
            }
        }
    }
}
