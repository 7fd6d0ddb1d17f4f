use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use gateway::config::Config;
use gateway::error::init::InitError;
use gateway::error::runtime::RuntimeError;
use gateway::state::AppState;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Path to the config file. Values here are overridden by environment
    /// variables of the same name.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose (trace-level) logging for the gateway crate.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), RuntimeError> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = match Config::try_read(args.config) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("failed to read config: {error}");
            std::process::exit(1);
        }
    };

    if args.verbose {
        config.log_level = format!("{},gateway=trace", config.log_level);
    }

    let tracer_provider = telemetry::init_telemetry(&telemetry::Config {
        level: config.log_level.clone(),
        ..telemetry::Config::default()
    })
    .map_err(InitError::Telemetry)?;

    config.validate().inspect_err(|error| {
        tracing::error!(%error, "configuration validation failed");
    })?;

    let server_port = config.server_port;
    let metrics_port = config.metrics_port;

    let state = AppState::new(config).await?;

    let public_router = gateway::router::build(state.clone());
    let metrics_router = gateway::metrics::router(state.metrics().clone());

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        signal_token.cancel();
    });

    let public_addr = SocketAddr::from(([0, 0, 0, 0], server_port));
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));

    let public_listener = tokio::net::TcpListener::bind(public_addr).await?;
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr).await?;
    info!(address = %public_addr, "public server listening");
    info!(address = %metrics_addr, "metrics server listening");

    let public_shutdown = shutdown.clone();
    let metrics_shutdown = shutdown.clone();

    let public_server = axum::serve(public_listener, public_router)
        .with_graceful_shutdown(async move { public_shutdown.cancelled_owned().await });
    let metrics_server = axum::serve(metrics_listener, metrics_router)
        .with_graceful_shutdown(async move { metrics_shutdown.cancelled_owned().await });

    tokio::try_join!(public_server, metrics_server).map_err(RuntimeError::Serve)?;

    if let Some(provider) = tracer_provider {
        if let Err(error) = provider.shutdown() {
            eprintln!("error shutting down tracer provider: {error}");
        }
    }

    info!("shut down");
    Ok(())
}
