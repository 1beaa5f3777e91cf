// # evrouterd - Event Router Daemon
//
// This is a thin integration layer. All routing logic lives in
// evrouter-core; the daemon only wires the pieces together.
//
// The evrouterd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering destinations
// 4. Restoring the position checkpoint
// 5. Running the router until a signal arrives or the watch input ends
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Destination
// - `EVROUTER_SINK`: Destination type (stdout, log, file, http). Default: stdout
// - `EVROUTER_STDOUT_JSON_NAMESPACE`: Wrap stdout envelopes under this key
// - `EVROUTER_FILE_PATH`: Output path (for file)
// - `EVROUTER_HTTP_URL`: Endpoint URL (for http)
// - `EVROUTER_HTTP_TOKEN`: Bearer token (for http, optional)
//
// ### Router
// - `EVROUTER_ENABLE_METRICS`: Maintain delivery counters (true/false). Default: true
// - `EVROUTER_TOKEN_ORDERING`: Position token ordering (numeric, lexical). Default: numeric
// - `EVROUTER_CHECKPOINT_PATH`: Persist the position here (memory only if unset)
//
// ### Input
// - `EVROUTER_WATCH_FILE`: Read watch lines from this file. Default: stdin
//
// ### Logging
// - `EVROUTER_LOG_LEVEL`: trace, debug, info, warn, error. Default: info
//
// ## Example
//
// ```bash
// export EVROUTER_SINK=http
// export EVROUTER_HTTP_URL=https://collector.example.net/events
// export EVROUTER_HTTP_TOKEN=your_token
// export EVROUTER_CHECKPOINT_PATH=/var/lib/evrouter/position.json
//
// kubectl get events -A --watch-only -o json --output-watch-events | jq -c . | evrouterd
// ```

use anyhow::Result;
use evrouter_core::checkpoint::open_checkpoint_store;
use evrouter_core::{
    CheckpointConfig, CheckpointWriter, DestinationConfig, DestinationRegistry,
    EventRouter, RouterConfig, RouterEvent, TokenOrdering,
};
use evrouter_watch_jsonl::JsonlWatchSource;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long the final checkpoint flush may take
const CHECKPOINT_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvrouterExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<EvrouterExitCode> for ExitCode {
    fn from(code: EvrouterExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    sink: String,
    stdout_json_namespace: Option<String>,
    file_path: Option<String>,
    http_url: Option<String>,
    http_token: Option<String>,
    enable_metrics: String,
    token_ordering: String,
    checkpoint_path: Option<String>,
    watch_file: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        Self {
            sink: non_empty("EVROUTER_SINK").unwrap_or_else(|| "stdout".to_string()),
            stdout_json_namespace: non_empty("EVROUTER_STDOUT_JSON_NAMESPACE"),
            file_path: non_empty("EVROUTER_FILE_PATH"),
            http_url: non_empty("EVROUTER_HTTP_URL"),
            http_token: non_empty("EVROUTER_HTTP_TOKEN"),
            enable_metrics: non_empty("EVROUTER_ENABLE_METRICS")
                .unwrap_or_else(|| "true".to_string()),
            token_ordering: non_empty("EVROUTER_TOKEN_ORDERING")
                .unwrap_or_else(|| "numeric".to_string()),
            checkpoint_path: non_empty("EVROUTER_CHECKPOINT_PATH"),
            watch_file: non_empty("EVROUTER_WATCH_FILE"),
            log_level: non_empty("EVROUTER_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Validate the configuration and build the router configuration
    ///
    /// This performs:
    /// - Sink enumeration and per-sink required settings
    /// - Boolean and ordering parsing
    /// - Checkpoint path sanity checks
    /// - Log level validation
    fn router_config(&self) -> Result<RouterConfig> {
        let destination = match self.sink.to_lowercase().as_str() {
            "stdout" => DestinationConfig::Stdout {
                json_namespace: self.stdout_json_namespace.clone(),
            },
            "log" => DestinationConfig::Log,
            "file" => DestinationConfig::File {
                path: self.file_path.clone().ok_or_else(|| {
                    anyhow::anyhow!(
                        "EVROUTER_FILE_PATH is required when EVROUTER_SINK=file. \
                        Set it via: export EVROUTER_FILE_PATH=/var/log/evrouter/events.jsonl"
                    )
                })?,
            },
            "http" => {
                let url = self.http_url.clone().ok_or_else(|| {
                    anyhow::anyhow!(
                        "EVROUTER_HTTP_URL is required when EVROUTER_SINK=http. \
                        Set it via: export EVROUTER_HTTP_URL=https://collector/events"
                    )
                })?;

                // Warn if using HTTP (not HTTPS) with a token
                if url.starts_with("http://") && self.http_token.is_some() {
                    eprintln!(
                        "WARNING: EVROUTER_HTTP_URL uses HTTP (not HTTPS) with a bearer token. \
                        The token will be sent in clear text."
                    );
                }

                DestinationConfig::Http {
                    url,
                    bearer_token: self.http_token.clone(),
                }
            }
            other => anyhow::bail!(
                "EVROUTER_SINK '{}' is not supported. \
                Supported sinks: stdout, log, file, http",
                other
            ),
        };

        let enable_metrics = match self.enable_metrics.to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => anyhow::bail!(
                "EVROUTER_ENABLE_METRICS '{}' is not a boolean. Use true or false",
                other
            ),
        };

        let token_ordering = TokenOrdering::parse(&self.token_ordering)?;

        let checkpoint = match &self.checkpoint_path {
            Some(path) => {
                // Check parent directory exists
                if let Some(parent) = std::path::Path::new(path).parent()
                    && !parent.as_os_str().is_empty()
                    && !parent.exists()
                {
                    anyhow::bail!(
                        "EVROUTER_CHECKPOINT_PATH parent directory does not exist: {}. \
                        Create it first: sudo mkdir -p {}",
                        parent.display(),
                        parent.display()
                    );
                }
                CheckpointConfig::File { path: path.clone() }
            }
            None => CheckpointConfig::Memory,
        };

        // Validate log level
        parse_log_level(&self.log_level)?;

        let mut config = RouterConfig::new()
            .with_destination(destination)
            .with_metrics(enable_metrics)
            .with_token_ordering(token_ordering);
        config.checkpoint = checkpoint;

        config.validate()?;
        Ok(config)
    }
}

/// Map a log level name to a tracing level
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "EVROUTER_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = Config::from_env();

    // Validate configuration
    let router_config = match config.router_config() {
        Ok(router_config) => router_config,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return EvrouterExitCode::ConfigError.into();
        }
    };

    // Initialize tracing (stderr, stdout may be the event sink)
    let log_level = parse_log_level(&config.log_level).unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return EvrouterExitCode::ConfigError.into();
    }

    info!("Starting evrouterd daemon");
    info!(
        "Configuration loaded: sink={}, metrics={}, ordering={:?}",
        router_config.destination.type_name(),
        router_config.enable_metrics,
        router_config.token_ordering
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return EvrouterExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config, router_config).await {
            Ok(()) => EvrouterExitCode::CleanShutdown,
            Err(failure) => {
                error!("{}", failure);
                failure.exit_code()
            }
        }
    });

    result.into()
}

/// A daemon failure, by the phase it happened in
#[derive(Debug)]
enum DaemonFailure {
    /// Anything before the router starts consuming the watch stream
    Startup(anyhow::Error),
    /// The router run itself
    Runtime(anyhow::Error),
}

impl DaemonFailure {
    fn exit_code(&self) -> EvrouterExitCode {
        match self {
            DaemonFailure::Startup(_) => EvrouterExitCode::ConfigError,
            DaemonFailure::Runtime(_) => EvrouterExitCode::RuntimeError,
        }
    }
}

impl std::fmt::Display for DaemonFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonFailure::Startup(e) => write!(f, "Startup error: {:#}", e),
            DaemonFailure::Runtime(e) => write!(f, "Daemon error: {:#}", e),
        }
    }
}

/// Build a registry with every destination compiled into this binary
fn build_registry() -> DestinationRegistry {
    let registry = DestinationRegistry::with_builtins();

    #[cfg(feature = "http")]
    {
        debug!("Registering HTTP destination");
        evrouter_sink_http::register(&registry);
    }

    registry
}

/// A started daemon, ready to consume its watch source
struct Daemon {
    router: EventRouter,
    source: JsonlWatchSource,
    writer: CheckpointWriter,
}

/// Run the daemon
async fn run_daemon(config: Config, router_config: RouterConfig) -> Result<(), DaemonFailure> {
    let daemon = start_daemon(&config, &router_config)
        .await
        .map_err(DaemonFailure::Startup)?;
    serve(daemon).await.map_err(DaemonFailure::Runtime)
}

/// Build every component the router needs
///
/// Any failure here is a startup failure: the destination, checkpoint
/// store and watch input are all opened before the first notification.
async fn start_daemon(config: &Config, router_config: &RouterConfig) -> Result<Daemon> {
    let registry = build_registry();
    let destination = registry.create_destination(&router_config.destination)?;

    // Restore the position
    let store = open_checkpoint_store(&router_config.checkpoint).await?;
    let checkpoint = store.load().await?;

    let (router, mut router_events) = EventRouter::new(destination, router_config)?;
    let router = match checkpoint {
        Some(token) => {
            info!("Resuming from checkpoint {}", token);
            router.resume_from(token)
        }
        None => {
            info!("No checkpoint, forwarding everything observed");
            router
        }
    };

    let writer = CheckpointWriter::spawn(Arc::clone(&store));
    let router = router.with_checkpoint(writer.callback());

    // Router events end when the router is dropped
    tokio::spawn(async move {
        while let Some(event) = router_events.recv().await {
            match event {
                RouterEvent::Skipped {
                    resource_version,
                    position,
                } => debug!("Skipped {} (position {:?})", resource_version, position),
                other => debug!("Router event: {:?}", other),
            }
        }
    });

    let source = match &config.watch_file {
        Some(path) => JsonlWatchSource::open(path).await?,
        None => JsonlWatchSource::stdin(),
    };
    info!("Watching {}", source.origin());

    Ok(Daemon {
        router,
        source,
        writer,
    })
}

/// Route until a shutdown signal arrives or the watch input ends
async fn serve(daemon: Daemon) -> Result<()> {
    let Daemon {
        router,
        source,
        writer,
    } = daemon;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let signal_task = tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(signal) => {
                info!("Received shutdown signal: {}", signal);
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                error!("Signal handling error: {}", e);
                let _ = shutdown_tx.send(());
            }
        }
    });

    let run_result = router.run_with_shutdown(&source, shutdown_rx).await;
    signal_task.abort();

    info!("Flushing checkpoint");
    match tokio::time::timeout(CHECKPOINT_FLUSH_TIMEOUT, writer.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Final checkpoint flush failed: {}", e),
        Err(_) => warn!(
            "Final checkpoint flush timed out after {:?}",
            CHECKPOINT_FLUSH_TIMEOUT
        ),
    }

    if let Some(counters) = router.counters() {
        info!("Delivery counters at shutdown:\n{}", counters.render());
    }

    run_result?;
    info!("Shutting down daemon");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
