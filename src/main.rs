use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use telemetry_pipeline::config::{load_config, watcher::ConfigWatcher, TelemetryConfig};
use telemetry_pipeline::events::EventEmitter;
use telemetry_pipeline::http::HttpServer;
use telemetry_pipeline::instrumentation::Instrumentation;
use telemetry_pipeline::lifecycle::{signals, Shutdown};
use telemetry_pipeline::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "telemetry-pipeline")]
#[command(about = "Instrumented HTTP host writing daily event streams", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => TelemetryConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "telemetry-pipeline starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        log_dir = ?config.emitter.log_dir,
        service = %config.emitter.service,
        environment = %config.emitter.environment,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let emitter = EventEmitter::daily_files(&config.emitter);
    let instrumentation = Arc::new(Instrumentation::new(&config.instrumentation, emitter)?);

    let rate_limit = &config.instrumentation.rate_limit;
    let eviction = instrumentation.rate_counter().clone().spawn_eviction(
        Duration::from_secs(rate_limit.sweep_interval_secs),
        shutdown.subscribe(),
    );

    let (config_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            (Some(watcher.spawn(shutdown.subscribe())?), updates)
        }
        None => {
            let (_tx, updates) = tokio::sync::mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(&config, instrumentation);
    server.run(listener, config_updates, shutdown.clone()).await?;

    shutdown.trigger();
    let _ = eviction.await;
    if let Some(config_watcher) = config_watcher {
        let _ = config_watcher.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
