//! # Shared Bus - Event Pump
//!
//! A thread-safe queue of tagged events drained by a single consumer thread.
//! Components post events addressed to a registered target; the pump thread
//! delivers them in due-time order, so every handler runs on one well-defined
//! thread.
//!
//! ## Delivery Model
//!
//! ```text
//! ┌──────────────┐   post(event, delay)   ┌──────────────┐
//! │ any thread   │ ─────────────────────→ │  Event Pump  │
//! └──────────────┘                        │  (ordered by │
//!                                         │   due time)  │
//!                                         └──────┬───────┘
//!                                                │ pump thread
//!                                                ▼
//!                                      target.process_event()
//! ```
//!
//! ## Rules
//!
//! - Targets are held weakly; events for dropped or unregistered targets are
//!   discarded at delivery time.
//! - A delayed event never fires before its due time.
//! - `remove(target, kind)` cancels every queued event with that address.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod pump;
pub mod runner;

// Re-export main types
pub use events::{EventKind, PumpEvent, TargetId};
pub use pump::{EventPump, EventTarget, InMemoryEventPump};
pub use runner::{PumpError, PumpHandle};

/// Name given to the pump thread when none is supplied.
pub const DEFAULT_PUMP_THREAD_NAME: &str = "event-pump";
