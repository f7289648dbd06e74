//! # Remote Library
//!
//! Client-side dispatch for a music library whose queries execute on a
//! remote peer.
//!
//! **Architecture:** Hexagonal (Ports/Adapters)
//!
//! ## Purpose
//!
//! Present a remote peer as an ordinary [`Library`]:
//! - Queries are queued and handed to a [`Transport`] by a single worker thread
//! - Each hand-off is tracked under the transport's correlation token until
//!   its completion arrives
//! - Completions are posted to the host's event pump, or delivered inline
//!   when no pump is attached
//! - Recoverable disconnects schedule one reconnect after a fixed delay;
//!   credential and version rejections never do
//!
//! ## Guarantees
//!
//! | Guarantee | Mechanism |
//! |-----------|-----------|
//! | FIFO hand-off | One worker drains one queue |
//! | At most one completion per query | Registry entry removed on first match |
//! | No reconnect storm | Pending reconnect replaced, never stacked |
//! | No reconnect after close | Exit flag set before disconnect |
//!
//! ## Module Structure
//!
//! ```text
//! rl-remote-library/
//! ├── domain/          # Contexts, registry, connection states, locator, errors
//! ├── ports/           # Library API (inbound) + transport/router/config (outbound)
//! ├── adapters/        # Loopback transport, handler router, settings stores
//! ├── service.rs       # RemoteLibrary dispatch core
//! └── config.rs        # RemoteLibraryConfig, ConnectionSettings
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{HandlerRouter, JsonSettingsStore, LoopbackTransport, QueryHandler, StaticConfig};
pub use config::{
    ConnectionSettings, RemoteLibraryConfig, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_RECONNECT_DELAY_MS,
};
pub use domain::{
    should_reconnect, track_uri, CompletionCallback, ConnectionState, CorrelationToken,
    DispatchStats, InFlightRegistry, LibraryError, LibraryId, LocatorError, ObserverId,
    QueryContext, QueryFailure, RawTransportState, RemoteTrackLocator, SettingsError, Track,
    TransportConnectionError, CONNECTION_STATE_CHANGED, QUERY_COMPLETED, RECONNECT_SOCKET,
    REMOTE_TRACK_SCHEME,
};
pub use ports::{
    ConnectionConfigProvider, Library, LocalQueryRouter, MockTransport, Transport,
    TransportListener,
};
pub use service::{LibraryDependencies, RemoteLibrary};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
