//! Library-level observers: "query completed" and "connection state
//! changed" hooks fired on the delivering thread.

use crate::domain::connection::ConnectionState;
use parking_lot::RwLock;
use shared_types::SharedQuery;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hook fired for every completed remote query.
pub type QueryCompletedHook = Arc<dyn Fn(&SharedQuery) + Send + Sync>;

/// Hook fired for every published connection state.
pub type StateChangedHook = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Handle returned when an observer is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Observer lists.
///
/// Hooks are cloned out of the lock before being called, so a hook may add
/// or remove observers.
#[derive(Default)]
pub struct Observers {
    next_id: AtomicU64,
    query_completed: RwLock<Vec<(ObserverId, QueryCompletedHook)>>,
    state_changed: RwLock<Vec<(ObserverId, StateChangedHook)>>,
}

impl Observers {
    /// Empty observer lists.
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self) -> ObserverId {
        ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Add a query-completed hook.
    pub fn add_query_completed(&self, hook: QueryCompletedHook) -> ObserverId {
        let id = self.allocate();
        self.query_completed.write().push((id, hook));
        id
    }

    /// Add a state-changed hook.
    pub fn add_state_changed(&self, hook: StateChangedHook) -> ObserverId {
        let id = self.allocate();
        self.state_changed.write().push((id, hook));
        id
    }

    /// Remove a hook of either kind. Returns false if unknown.
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut removed = false;
        self.query_completed.write().retain(|(hook_id, _)| {
            let keep = *hook_id != id;
            removed |= !keep;
            keep
        });
        self.state_changed.write().retain(|(hook_id, _)| {
            let keep = *hook_id != id;
            removed |= !keep;
            keep
        });
        removed
    }

    /// Fire every query-completed hook.
    pub fn notify_query_completed(&self, query: &SharedQuery) {
        let hooks: Vec<QueryCompletedHook> = self
            .query_completed
            .read()
            .iter()
            .map(|(_, hook)| hook.clone())
            .collect();
        for hook in hooks {
            hook(query);
        }
    }

    /// Fire every state-changed hook.
    pub fn notify_state_changed(&self, state: ConnectionState) {
        let hooks: Vec<StateChangedHook> = self
            .state_changed
            .read()
            .iter()
            .map(|(_, hook)| hook.clone())
            .collect();
        for hook in hooks {
            hook(state);
        }
    }
}
