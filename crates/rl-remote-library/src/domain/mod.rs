//! # Domain Module
//!
//! Core types for the remote library: query contexts, the in-flight
//! registry, connection states and the reconnect policy, the remote track
//! locator, and errors.

pub mod connection;
pub mod entities;
pub mod errors;
pub mod locator;
pub mod observers;
pub mod registry;

pub use connection::*;
pub use entities::*;
pub use errors::*;
pub use locator::*;
pub use observers::*;
pub use registry::*;
