//! Structured logging setup.
//!
//! Installs a global `tracing` subscriber with an `EnvFilter` and either a
//! pretty or a JSON formatting layer. Field names used across the remote
//! library:
//! - `library_id`: owning library
//! - `query_id`: numeric query id
//! - `token`: correlation token assigned by the transport
//! - `state`: connection state

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global subscriber described by `config`.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .map_err(|e| TelemetryError::Config(e.to_string()))?;

    if !config.console_output {
        return tracing_subscriber::registry()
            .with(env_filter)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()));
    }

    if config.json_logs {
        // JSON output for containers/production
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        // Pretty output for development
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Logging initialized"
    );

    Ok(())
}

/// Log a query lifecycle event with standard fields.
///
/// ```rust,ignore
/// log_query_event!(debug, "Query handed off", library_id, query.id(), token = %token);
/// ```
#[macro_export]
macro_rules! log_query_event {
    ($level:ident, $msg:expr, $library_id:expr, $query_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            library_id = $library_id,
            query_id = %$query_id,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a connection event with standard fields.
#[macro_export]
macro_rules! log_connection_event {
    ($level:ident, $msg:expr, $library_id:expr, $state:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            library_id = $library_id,
            state = ?$state,
            $($($field)*,)?
            $msg
        )
    };
}
