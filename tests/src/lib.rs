//! # Remote Library Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── dispatch_benchmarks.rs  # Hand-off, completion and registry throughput
//! │
//! └── src/integration/
//!     ├── flows.rs                # Settings file → library → pump → callbacks
//!     └── concurrency.rs          # Many producers, exactly-once completion
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p rl-tests
//!
//! # Benchmarks
//! cargo bench -p rl-tests
//! ```

#![allow(dead_code)]

pub mod integration;
