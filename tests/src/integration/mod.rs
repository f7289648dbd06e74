//! # Integration Tests
//!
//! Flows that cross the shared-types, shared-bus and rl-remote-library
//! crate boundaries.

pub mod concurrency;
pub mod flows;
