//! # Remote Library Errors

use shared_types::QueryError;
use thiserror::Error;

/// Errors returned by the remote library surface.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The library is closing or closed; no new remote work is accepted.
    #[error("Remote library is shutting down")]
    ShuttingDown,

    /// The local query engine rejected or failed the query.
    #[error("Local query failed: {0}")]
    LocalQuery(String),

    /// The query could not be serialized or resolved.
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// The dispatch worker thread could not be started.
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

/// Errors parsing a remote track locator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    /// The string does not start with the remote track scheme.
    #[error("Missing remote track scheme")]
    MissingScheme,

    /// The payload after the scheme is not a valid locator object.
    #[error("Malformed locator payload: {0}")]
    Malformed(String),
}

/// Errors loading or saving the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file could not be read or written.
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON for the settings schema.
    #[error("Settings parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
