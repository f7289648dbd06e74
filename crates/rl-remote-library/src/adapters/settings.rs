//! Configuration providers: a JSON preferences file and an in-memory source.

use crate::config::{ConnectionSettings, DEFAULT_HOST, DEFAULT_PORT};
use crate::domain::SettingsError;
use crate::ports::ConnectionConfigProvider;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// On-disk preferences. Unknown keys are preserved on save.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PreferencesFile {
    #[serde(rename = "RemoteLibraryHostname", skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
    #[serde(rename = "RemoteLibraryWssPort", skip_serializing_if = "Option::is_none")]
    wss_port: Option<u16>,
    #[serde(rename = "RemoteLibraryHttpPort", skip_serializing_if = "Option::is_none")]
    http_port: Option<u16>,
    #[serde(rename = "RemoteLibraryPassword", skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(rename = "RemoteLibraryViewed", skip_serializing_if = "Option::is_none")]
    viewed: Option<bool>,
    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

/// Preferences stored as a JSON object in a file.
///
/// A missing file reads as all defaults; it is created on the first save.
pub struct JsonSettingsStore {
    path: PathBuf,
    values: RwLock<PreferencesFile>,
}

impl JsonSettingsStore {
    /// Load preferences from `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let values = Self::read(&path)?;
        info!(path = %path.display(), "Settings loaded");
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Re-read the file, replacing in-memory values. Unsaved changes are
    /// lost.
    pub fn reload(&self) -> Result<(), SettingsError> {
        let values = Self::read(&self.path)?;
        *self.values.write() = values;
        Ok(())
    }

    /// Write current values back to the file.
    pub fn save(&self) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(&*self.values.read())?;
        fs::write(&self.path, text)?;
        debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }

    /// Replace the connection values (not saved until [`Self::save`]).
    pub fn set_connection(&self, settings: &ConnectionSettings) {
        let mut values = self.values.write();
        values.hostname = Some(settings.host.clone());
        values.wss_port = Some(settings.wss_port);
        values.http_port = Some(settings.http_port);
        values.password = Some(settings.password.clone());
    }

    /// Record whether the user has seen remote setup.
    pub fn set_viewed(&self, viewed: bool) {
        self.values.write().viewed = Some(viewed);
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(path: &Path) -> Result<PreferencesFile, SettingsError> {
        match fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => Ok(PreferencesFile::default()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(PreferencesFile::default()),
            Err(e) => Err(e.into()),
        }
    }
}

impl ConnectionConfigProvider for JsonSettingsStore {
    fn connection_settings(&self) -> ConnectionSettings {
        let values = self.values.read();
        ConnectionSettings {
            host: values
                .hostname
                .clone()
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            wss_port: values.wss_port.unwrap_or(DEFAULT_PORT),
            http_port: values.http_port.unwrap_or(DEFAULT_PORT),
            password: values.password.clone().unwrap_or_default(),
        }
    }

    fn remote_library_viewed(&self) -> bool {
        self.values.read().viewed.unwrap_or(false)
    }

    fn refresh(&self) -> Result<(), SettingsError> {
        self.reload()
    }
}

/// In-memory configuration source.
#[derive(Default)]
pub struct StaticConfig {
    settings: RwLock<ConnectionSettings>,
    viewed: AtomicBool,
}

impl StaticConfig {
    /// Provider returning `settings`.
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            viewed: AtomicBool::new(false),
        }
    }

    /// Replace the settings returned from now on.
    pub fn set_settings(&self, settings: ConnectionSettings) {
        *self.settings.write() = settings;
    }

    /// Set the viewed flag.
    pub fn set_viewed(&self, viewed: bool) {
        self.viewed.store(viewed, Ordering::Relaxed);
    }
}

impl ConnectionConfigProvider for StaticConfig {
    fn connection_settings(&self) -> ConnectionSettings {
        self.settings.read().clone()
    }

    fn remote_library_viewed(&self) -> bool {
        self.viewed.load(Ordering::Relaxed)
    }
}
