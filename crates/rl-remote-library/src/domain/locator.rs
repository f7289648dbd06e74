//! # Remote Track Locator
//!
//! Builds the opaque locator a player uses to stream a track hosted by the
//! remote peer:
//!
//! ```text
//! musikcore://remote-track/{"originalUri":..,"password":..,"type":..,"uri":..}
//! ```
//!
//! `uri` points at the peer's audio endpoint, `originalUri` is the track's
//! native location (kept for extension sniffing), `type` is the inferred
//! extension, and `password` is the connection credential.

use crate::config::ConnectionSettings;
use crate::domain::errors::LocatorError;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Scheme prefix of every remote track locator.
pub const REMOTE_TRACK_SCHEME: &str = "musikcore://remote-track/";

/// Extension assumed when the native URI has none.
pub const DEFAULT_TRACK_TYPE: &str = ".mp3";

/// A track as seen by the locator.
pub trait Track {
    /// Library id of the track on the remote peer.
    fn id(&self) -> i64;

    /// Native playback URI, if known.
    fn uri(&self) -> Option<String>;
}

/// Decoded locator payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTrackLocator {
    /// HTTP URL of the track on the remote peer.
    pub uri: String,
    /// Native URI of the track.
    #[serde(rename = "originalUri")]
    pub original_uri: String,
    /// Inferred file extension, dot included.
    #[serde(rename = "type")]
    pub track_type: String,
    /// Credential for the audio endpoint.
    pub password: String,
}

impl RemoteTrackLocator {
    /// Describe `track` as served by the peer in `settings`.
    pub fn for_track(track: &dyn Track, settings: &ConnectionSettings) -> Self {
        let original_uri = track.uri().unwrap_or_default();
        Self {
            uri: format!(
                "http://{}:{}/audio/id/{}",
                settings.host,
                settings.http_port,
                track.id()
            ),
            track_type: infer_track_type(&original_uri),
            original_uri,
            password: settings.password.clone(),
        }
    }

    /// Encode as a locator string.
    pub fn encode(&self) -> String {
        let payload = json!({
            "uri": self.uri,
            "originalUri": self.original_uri,
            "type": self.track_type,
            "password": self.password,
        });
        format!("{}{}", REMOTE_TRACK_SCHEME, payload)
    }

    /// Decode a locator string produced by [`RemoteTrackLocator::encode`].
    pub fn parse(locator: &str) -> Result<Self, LocatorError> {
        let payload = locator
            .strip_prefix(REMOTE_TRACK_SCHEME)
            .ok_or(LocatorError::MissingScheme)?;
        serde_json::from_str(payload).map_err(|e| LocatorError::Malformed(e.to_string()))
    }
}

/// Locator string for `track` served by the peer in `settings`.
pub fn track_uri(track: &dyn Track, settings: &ConnectionSettings) -> String {
    RemoteTrackLocator::for_track(track, settings).encode()
}

/// Everything from the last `.` on, or the default type.
fn infer_track_type(uri: &str) -> String {
    match uri.rfind('.') {
        Some(dot) => uri[dot..].to_string(),
        None => DEFAULT_TRACK_TYPE.to_string(),
    }
}
