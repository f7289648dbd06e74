//! # Remote Library Client
//!
//! Command-line host for the remote library.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logs, metrics)
//! 2. Load connection preferences from the settings file
//! 3. Build the local router and the loopback peer
//! 4. Create the remote library and attach an event pump thread
//! 5. Connect, run one synchronous and one asynchronous query
//! 6. Print dispatch statistics (and metrics, if asked)
//! 7. Close the library and stop the pump
//!
//! ```text
//! rl-client --settings prefs.json --query search --params '{"term":"abba"}'
//! ```

use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use tracing::{info, warn};

use rl_remote_library::{
    ConnectionState, HandlerRouter, JsonSettingsStore, Library, LibraryDependencies,
    LoopbackTransport, RemoteLibrary, RemoteLibraryConfig,
};
use rl_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use shared_bus::{InMemoryEventPump, PumpHandle, DEFAULT_PUMP_THREAD_NAME};
use shared_types::{Query, QueryError, QueryMode, QueryStatus, RawQuery, SharedQuery};

const CATALOG: &[&str] = &[
    "ABBA",
    "Boards of Canada",
    "Cocteau Twins",
    "Queen",
    "Radiohead",
    "Stereolab",
];

#[derive(Parser, Debug)]
#[command(name = "rl-client")]
#[command(about = "Run queries through the remote library dispatch path")]
struct Args {
    /// Preferences file holding the RemoteLibrary* keys
    #[arg(short, long, default_value = "remote-library.json")]
    settings: PathBuf,

    /// Name of the query to run
    #[arg(short, long, default_value = "search")]
    query: String,

    /// Query parameters as a JSON object
    #[arg(short, long, default_value = "{}")]
    params: String,

    /// Password the loopback peer accepts (any password if unset)
    #[arg(long)]
    peer_password: Option<String>,

    /// Mark remote setup as viewed and save the settings file
    #[arg(long)]
    mark_viewed: bool,

    /// Print Prometheus metrics before exiting
    #[arg(long)]
    metrics: bool,
}

/// Handlers served by the loopback peer.
fn build_router() -> Arc<HandlerRouter> {
    let router = Arc::new(HandlerRouter::new());
    router.register("search", |params| {
        let term = params
            .get("term")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        let hits: Vec<&str> = CATALOG
            .iter()
            .copied()
            .filter(|artist| artist.to_lowercase().contains(&term))
            .collect();
        Ok(json!({ "term": term, "artists": hits }))
    });
    router.register("track_count", |_| Ok(json!(CATALOG.len())));
    router.register("echo", |params| Ok(params.clone()));
    router.register("fail", |_| Err(QueryError::Execution("requested failure".into())));
    router.mark_local_only("track_count");
    router
}

fn parse_params(raw: &str) -> Result<Value> {
    let params: Value = serde_json::from_str(raw).context("--params is not valid JSON")?;
    if !params.is_object() {
        bail!("--params must be a JSON object");
    }
    Ok(params)
}

fn print_outcome(label: &str, query: &RawQuery) {
    match (query.status(), query.result()) {
        (QueryStatus::Finished, Some(result)) => println!("{label}: {result}"),
        (status, _) => println!("{label}: query {} ended {status}", query.id()),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Step 1: Telemetry
    let _telemetry = init_telemetry(TelemetryConfig::from_env())?;

    // Step 2: Preferences
    let store = Arc::new(
        JsonSettingsStore::open(&args.settings)
            .with_context(|| format!("Failed to load {}", args.settings.display()))?,
    );
    if args.mark_viewed {
        store.set_viewed(true);
        store.save().context("Failed to save settings")?;
        info!(path = %store.path().display(), "Remote setup marked as viewed");
    }
    let params = parse_params(&args.params)?;

    // Step 3: Local router and loopback peer
    let router = build_router();
    let transport = match &args.peer_password {
        Some(password) => LoopbackTransport::with_password(router.clone(), password.clone()),
        None => LoopbackTransport::new(router.clone()),
    }
    .context("Failed to start loopback peer")?;

    // Step 4: Library and pump
    let library = RemoteLibrary::create(
        "remote",
        1,
        LibraryDependencies {
            transport: Arc::new(transport),
            router,
            settings: store.clone(),
            config: RemoteLibraryConfig {
                connect_on_create: false,
                ..RemoteLibraryConfig::default()
            },
        },
    )?;
    let pump = PumpHandle::spawn(Arc::new(InMemoryEventPump::new()), DEFAULT_PUMP_THREAD_NAME)?;
    library.set_event_pump(Some(pump.pump().clone()));
    library.on_connection_state_changed(|state| match state {
        ConnectionState::AuthenticationFailure => {
            warn!("Remote library rejected the configured password")
        }
        other => info!(state = %other, "Connection state"),
    });
    if !library.is_configured() {
        info!("Remote library has not been set up yet; using stored or default settings");
    }

    // Step 5: Connect and query
    library.reload_connection();

    let sync_query = Arc::new(RawQuery::new(args.query.clone(), params.clone()));
    library.enqueue(sync_query.clone(), QueryMode::Synchronous, None)?;
    print_outcome("sync", &sync_query);

    let async_query = Arc::new(RawQuery::new(args.query.clone(), params));
    let (done_tx, done_rx) = mpsc::channel();
    library.enqueue(
        async_query.clone(),
        QueryMode::Async,
        Some(Box::new(move |query: SharedQuery| {
            let _ = done_tx.send(query.status());
        })),
    )?;
    match done_rx.recv_timeout(Duration::from_secs(5)) {
        Ok(_) => print_outcome("async", &async_query),
        Err(_) => warn!(query_id = %async_query.id(), "Timed out waiting for async query"),
    }

    // Step 6: Statistics
    let stats = library.stats();
    println!(
        "stats: enqueued={} completed={} dropped={} in_flight={} pending={}",
        stats.total_enqueued,
        stats.total_completed,
        stats.total_dropped,
        stats.in_flight,
        stats.pending
    );
    if args.metrics {
        print!("{}", encode_metrics()?);
    }

    // Step 7: Shutdown
    library.close();
    pump.shutdown();
    info!("Remote library client stopped");
    Ok(())
}
