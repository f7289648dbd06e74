//! # Error Types
//!
//! Errors raised while serializing or resolving a query.

use thiserror::Error;

/// Errors produced by the query serialization contract.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Parameters or result could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A result was requested before the query produced one.
    #[error("Query {query_id} has no result")]
    MissingResult { query_id: u64 },

    /// The payload is well-formed JSON but not a query envelope.
    #[error("Malformed query payload: {0}")]
    MalformedPayload(String),

    /// The query failed while executing.
    #[error("Execution failed: {0}")]
    Execution(String),
}
