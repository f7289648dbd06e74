//! # Adapters
//!
//! Concrete implementations of the outbound ports.

pub mod local_router;
pub mod loopback;
pub mod settings;

pub use local_router::{HandlerRouter, QueryHandler};
pub use loopback::LoopbackTransport;
pub use settings::{JsonSettingsStore, StaticConfig};
