//! In-flight registry: correlation token → query context.
//!
//! Not synchronized on its own; the dispatch core keeps it under the same
//! lock as the pending queue.

use crate::domain::entities::{CorrelationToken, QueryContext};
use shared_types::QueryId;
use std::collections::HashMap;

/// Queries handed to the transport and awaiting completion.
#[derive(Default)]
pub struct InFlightRegistry {
    by_token: HashMap<CorrelationToken, QueryContext>,
    /// Live tokens per query; a query resubmitted before its first
    /// response is outstanding under several.
    by_query: HashMap<QueryId, usize>,
}

impl InFlightRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `context` under `token`.
    ///
    /// At most one context lives under a token; a context already registered
    /// under the same token is displaced and returned.
    pub fn insert(
        &mut self,
        token: CorrelationToken,
        context: QueryContext,
    ) -> Option<QueryContext> {
        let displaced = self.by_token.remove(&token);
        if let Some(old) = &displaced {
            self.release_query(old.query_id());
        }
        *self.by_query.entry(context.query_id()).or_insert(0) += 1;
        self.by_token.insert(token, context);
        displaced
    }

    /// Remove and return the context for `token`.
    ///
    /// Only the first call for a token returns a context.
    pub fn take(&mut self, token: &CorrelationToken) -> Option<QueryContext> {
        let context = self.by_token.remove(token)?;
        self.release_query(context.query_id());
        Some(context)
    }

    /// Remove every context.
    pub fn drain(&mut self) -> Vec<QueryContext> {
        self.by_query.clear();
        self.by_token.drain().map(|(_, context)| context).collect()
    }

    /// Whether the query is still awaiting completion under any token.
    pub fn contains_query(&self, query_id: QueryId) -> bool {
        self.by_query.contains_key(&query_id)
    }

    /// Number of outstanding queries.
    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    /// True when nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }

    fn release_query(&mut self, query_id: QueryId) {
        if let Some(count) = self.by_query.get_mut(&query_id) {
            *count -= 1;
            if *count == 0 {
                self.by_query.remove(&query_id);
            }
        }
    }
}
