//! # Connection State Machine
//!
//! Maps raw transport states to the four public connection states and
//! decides when a disconnect deserves an automatic reconnect.
//!
//! ```text
//! Disconnected ──→ Connecting ──→ Connected
//!      ↑               │              │
//!      └───────────────┴──────────────┘
//!      │
//!      └──(credentials rejected)──→ AuthenticationFailure
//! ```
//!
//! `AuthenticationFailure` and version incompatibility are terminal: no
//! reconnect is scheduled until configuration is reloaded explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection state as seen by library users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Ready to carry queries.
    Connected,
    /// The peer rejected the credential.
    AuthenticationFailure,
}

impl ConnectionState {
    /// Build the public state from a raw transport state.
    ///
    /// A disconnect caused by a rejected credential surfaces as
    /// `AuthenticationFailure` so the sink state survives the transport's
    /// trailing `Disconnected` notification.
    pub fn from_transport(raw: RawTransportState, last_error: TransportConnectionError) -> Self {
        match raw {
            RawTransportState::Connecting => Self::Connecting,
            RawTransportState::Connected => Self::Connected,
            RawTransportState::Disconnected | RawTransportState::Disconnecting => {
                if last_error == TransportConnectionError::InvalidPassword {
                    Self::AuthenticationFailure
                } else {
                    Self::Disconnected
                }
            }
        }
    }

    /// Label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::AuthenticationFailure => "authentication_failure",
        }
    }
}

impl From<RawTransportState> for ConnectionState {
    fn from(raw: RawTransportState) -> Self {
        Self::from_transport(raw, TransportConnectionError::None)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State reported by the transport itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RawTransportState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// Why the transport's last connection attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportConnectionError {
    #[default]
    None,
    InvalidPassword,
    IncompatibleVersion,
    Other,
}

impl TransportConnectionError {
    /// Errors that configuration must fix before retrying.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::InvalidPassword | Self::IncompatibleVersion)
    }
}

/// Reconnect policy: retry after a plain disconnect, never after a
/// credential or version rejection.
pub fn should_reconnect(new_state: RawTransportState, last_error: TransportConnectionError) -> bool {
    new_state == RawTransportState::Disconnected && !last_error.is_terminal()
}
