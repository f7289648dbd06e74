//! # Shared Types Crate
//!
//! The query contract shared by every layer of the remote library.
//!
//! ## Design Principles
//!
//! - **Serializable Work**: A query knows how to turn its parameters and its
//!   result into an opaque payload; nothing else needs its concrete type.
//! - **Shared Ownership**: Queries travel as `Arc<dyn Query>` and are dropped
//!   when the last holder (caller, queue, in-flight registry) releases them.
//! - **Interior Status**: Status is mutated through `&self` so transports can
//!   resolve a query that other threads are waiting on.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod errors;
pub mod json_query;
pub mod query;

pub use errors::QueryError;
pub use json_query::{JsonQuery, RawQuery};
pub use query::{Query, QueryId, QueryMode, QueryStatus, SharedQuery};
