//! # Remote Library Configuration
//!
//! Dispatch settings and the connection parameters read from preferences.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default host of the remote peer.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default control (WebSocket) and audio (HTTP) port.
pub const DEFAULT_PORT: u16 = 7905;

/// Delay before reconnecting after a recoverable disconnect.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2500;

/// Remote library configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteLibraryConfig {
    /// Delay before a scheduled reconnect fires, in milliseconds.
    pub reconnect_delay_ms: u64,

    /// Connect from configuration as soon as the library is created.
    pub connect_on_create: bool,
}

impl Default for RemoteLibraryConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            connect_on_create: true,
        }
    }
}

impl RemoteLibraryConfig {
    /// Short reconnect delay for tests.
    pub fn for_testing() -> Self {
        Self {
            reconnect_delay_ms: 50,
            connect_on_create: true,
        }
    }

    /// Reconnect delay as a `Duration`.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Where and how to reach the remote peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Host name or address.
    pub host: String,
    /// Control-plane (WebSocket) port.
    pub wss_port: u16,
    /// Audio (HTTP) port.
    pub http_port: u16,
    /// Credential; may be empty.
    pub password: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            wss_port: DEFAULT_PORT,
            http_port: DEFAULT_PORT,
            password: String::new(),
        }
    }
}
