//! # JSON Query
//!
//! Generic `Query` implementation backed by serde. The wire payload is
//! `{"name": ..., "id": ..., "params": ...}` and the result is the JSON
//! encoding of `R`.

use crate::query::{Query, QueryId, QueryStatus};
use crate::QueryError;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    name: String,
    id: QueryId,
    params: T,
}

/// A query whose parameters and result are plain serde types.
#[derive(Debug)]
pub struct JsonQuery<P, R> {
    id: QueryId,
    name: String,
    params: P,
    status: Mutex<QueryStatus>,
    result: Mutex<Option<R>>,
}

/// Untyped query, used where only the payload is known.
pub type RawQuery = JsonQuery<serde_json::Value, serde_json::Value>;

impl<P, R> JsonQuery<P, R> {
    /// Create an idle query with a fresh id.
    pub fn new(name: impl Into<String>, params: P) -> Self {
        Self {
            id: QueryId::next(),
            name: name.into(),
            params,
            status: Mutex::new(QueryStatus::Idle),
            result: Mutex::new(None),
        }
    }

    /// Query parameters.
    pub fn params(&self) -> &P {
        &self.params
    }

    /// Store a result without touching the status.
    pub fn set_result(&self, result: R) {
        *self.result.lock() = Some(result);
    }
}

impl<P, R: Clone> JsonQuery<P, R> {
    /// Snapshot of the result, if one has been applied.
    pub fn result(&self) -> Option<R> {
        self.result.lock().clone()
    }
}

impl<P: DeserializeOwned, R> JsonQuery<P, R> {
    /// Rebuild a query from a payload produced by `serialize_query`.
    ///
    /// The id carried in the payload is preserved.
    pub fn from_serialized(data: &str) -> Result<Self, QueryError> {
        let envelope: Envelope<P> = serde_json::from_str(data)?;
        if envelope.name.is_empty() {
            return Err(QueryError::MalformedPayload("empty query name".to_string()));
        }
        Ok(Self {
            id: envelope.id,
            name: envelope.name,
            params: envelope.params,
            status: Mutex::new(QueryStatus::Idle),
            result: Mutex::new(None),
        })
    }
}

impl<P, R> Query for JsonQuery<P, R>
where
    P: Serialize + Send + Sync,
    R: Serialize + DeserializeOwned + Send,
{
    fn id(&self) -> QueryId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> QueryStatus {
        *self.status.lock()
    }

    fn set_status(&self, status: QueryStatus) {
        *self.status.lock() = status;
    }

    fn serialize_query(&self) -> Result<String, QueryError> {
        let envelope = Envelope {
            name: self.name.clone(),
            id: self.id,
            params: &self.params,
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    fn serialize_result(&self) -> Result<String, QueryError> {
        match self.result.lock().as_ref() {
            Some(result) => Ok(serde_json::to_string(result)?),
            None => Err(QueryError::MissingResult {
                query_id: self.id.as_u64(),
            }),
        }
    }

    fn deserialize_result(&self, data: &str) -> Result<(), QueryError> {
        let result: R = serde_json::from_str(data)?;
        *self.result.lock() = Some(result);
        Ok(())
    }
}
