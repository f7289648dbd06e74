//! Prometheus metrics for the remote library.
//!
//! All metrics follow the naming convention: `rl_<area>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., queries_enqueued_total)
//! - **Gauge**: Value that can go up or down (e.g., queries_in_flight)
//! - **Histogram**: Distribution of values (e.g., query_roundtrip_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DISPATCH METRICS
    // =========================================================================

    /// Queries accepted for remote dispatch
    pub static ref QUERIES_ENQUEUED: CounterVec = CounterVec::new(
        Opts::new("rl_dispatch_queries_enqueued_total", "Queries accepted for remote dispatch"),
        &["mode"]  // mode: async/sync
    ).expect("metric creation failed");

    /// Queries routed to the local engine instead of the transport
    pub static ref QUERIES_LOCAL: Counter = Counter::new(
        "rl_dispatch_queries_local_total",
        "Queries executed locally without touching the transport"
    ).expect("metric creation failed");

    /// Queries resolved by the transport
    pub static ref QUERIES_COMPLETED: CounterVec = CounterVec::new(
        Opts::new("rl_dispatch_queries_completed_total", "Queries resolved by the transport"),
        &["status"]  // status: finished/failed/canceled
    ).expect("metric creation failed");

    /// Queries that never reached the remote peer
    pub static ref QUERIES_DROPPED: CounterVec = CounterVec::new(
        Opts::new("rl_dispatch_queries_dropped_total", "Queries dropped before completion"),
        &["reason"]  // reason: handoff_failed/shutdown
    ).expect("metric creation failed");

    /// Queries currently awaiting a response
    pub static ref QUERIES_IN_FLIGHT: Gauge = Gauge::new(
        "rl_dispatch_queries_in_flight",
        "Queries handed to the transport and awaiting completion"
    ).expect("metric creation failed");

    /// Hand-off to completion latency
    pub static ref QUERY_ROUNDTRIP: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "rl_dispatch_query_roundtrip_seconds",
            "Time between transport hand-off and completion"
        ).buckets(exponential_buckets(0.001, 2.0, 14).unwrap())
    ).expect("metric creation failed");

    // =========================================================================
    // CONNECTION METRICS
    // =========================================================================

    /// Reconnect attempts scheduled
    pub static ref RECONNECTS_SCHEDULED: Counter = Counter::new(
        "rl_connection_reconnects_scheduled_total",
        "Reconnect timers scheduled after a recoverable disconnect"
    ).expect("metric creation failed");

    /// Connection state transitions observed
    pub static ref CONNECTION_STATE_CHANGES: CounterVec = CounterVec::new(
        Opts::new("rl_connection_state_changes_total", "Connection state transitions"),
        &["state"]  // state: disconnected/connecting/connected/authentication_failure
    ).expect("metric creation failed");
}

/// Handle to the registered metrics
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Dispatch
        Box::new(QUERIES_ENQUEUED.clone()),
        Box::new(QUERIES_LOCAL.clone()),
        Box::new(QUERIES_COMPLETED.clone()),
        Box::new(QUERIES_DROPPED.clone()),
        Box::new(QUERIES_IN_FLIGHT.clone()),
        Box::new(QUERY_ROUNDTRIP.clone()),
        // Connection
        Box::new(RECONNECTS_SCHEDULED.clone()),
        Box::new(CONNECTION_STATE_CHANGES.clone()),
    ];

    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
