//! API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vpress_api::{create_router, metrics, ApiConfig, AppState};
use vpress_delivery::{sink_from_config, DeliveryConfig};
use vpress_media::{check_ffmpeg, CompressionConfig, FfmpegCompressor};
use vpress_store::{connect_store, StoreConfig};
use vpress_worker::{Orchestrator, Reaper, SystemClock, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting vpress-api");

    let api_config = ApiConfig::from_env();
    let store_config = StoreConfig::from_env();
    let compression_config = CompressionConfig::from_env();
    let delivery_config = DeliveryConfig::from_env();
    let worker_config = WorkerConfig {
        output_dir: compression_config.output_dir.clone(),
        ..WorkerConfig::from_env()
    };
    info!(
        "API config: host={}, port={}, store={}, max_concurrent_jobs={}",
        api_config.host, api_config.port, store_config.backend, worker_config.max_concurrent_jobs
    );

    if api_config.service_key.is_none() {
        warn!("INTERNAL_SERVICE_KEY is not set; every authenticated route will return 401");
    }
    match check_ffmpeg() {
        Ok(path) => info!("Using FFmpeg at {}", path.display()),
        Err(e) => warn!("{}; compression jobs will fail", e),
    }

    for dir in [&worker_config.upload_dir, &worker_config.output_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    // A configured durable store that cannot be reached is fatal
    let store = connect_store(&store_config)
        .await
        .context("Failed to connect job store")?;
    let engine = Arc::new(FfmpegCompressor::new(compression_config));
    let sink = sink_from_config(&delivery_config).context("Failed to configure delivery sink")?;
    info!("Delivering to {}", sink.describe());

    let reaper = Arc::new(Reaper::new(
        store.clone(),
        Arc::new(SystemClock),
        worker_config.reaper_config(),
    ));
    let mut orchestrator = Orchestrator::new(store.clone(), engine, sink, &worker_config);
    if worker_config.reap_on_intake {
        orchestrator = orchestrator.with_intake_reaper(reaper.clone());
    }
    let orchestrator = Arc::new(orchestrator);

    let metrics_handle = if api_config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("Failed to install Prometheus recorder")?)
    } else {
        None
    };

    // Start reaper background task
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper_task = {
        let reaper = reaper.clone();
        tokio::spawn(async move { reaper.run(shutdown_rx).await })
    };

    let state = AppState::new(api_config.clone(), orchestrator.clone(), worker_config.upload_dir.clone());
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", api_config.host, api_config.port)
        .parse()
        .context("Invalid bind address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = reaper_task.await;
    orchestrator.shutdown().await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON for production.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vpress_api=info,vpress_worker=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
