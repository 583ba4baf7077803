//! Market-data ingestion client.
//!
//! Maintains a FIX 4.4 session with an upstream liquidity provider,
//! subscribes to configured currency pairs, and materializes quotes into
//! a durable tick store, multi-timeframe OHLC candles, and a hot cache
//! mirror. Long-running daemon; no CLI surface beyond environment
//! configuration.

mod bootstrap;
mod cache;
mod fix;
mod models;
mod normalize;
mod pipeline;
mod session;
mod store;
mod subscription;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cache::Cache;
use crate::models::Config;
use crate::session::Session;

/// Upper bound on how long shutdown is allowed to take before the
/// process exits anyway. The spec requires every shutdown step to
/// complete or time out before exit; this is the "or time out" half.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("loading configuration")?;
    info!(
        fix_server = %config.fix_server,
        fix_port = config.fix_port,
        "starting market data ingestion client"
    );

    let pool = store::create_pool(&config.postgres_url())
        .await
        .context("connecting to durable store")?;

    let cache = Arc::new(AsyncMutex::new(Cache::new(config.redis_url())));
    {
        let mut guard = cache.lock().await;
        if let Err(err) = guard.ensure_connected().await {
            warn!(error = %err, "initial cache connect failed; will retry on reconnect warm-up");
        }
    }

    let catalog = bootstrap::run(&pool, cache.clone()).await;

    let tick_queue = Arc::new(pipeline::start_tick_queue());
    let candle_queue = Arc::new(pipeline::start_candle_queue());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let session = Session::new(
        config,
        catalog,
        pool.clone(),
        cache.clone(),
        tick_queue.clone(),
        candle_queue.clone(),
    );
    let session_handle = tokio::spawn(session.run(shutdown_rx));

    wait_for_shutdown_signal().await;

    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, session_handle).await {
        Ok(Ok(())) => info!("session engine stopped"),
        Ok(Err(err)) => error!(error = %err, "session task panicked"),
        Err(_) => warn!("session engine did not stop within the shutdown timeout; exiting anyway"),
    }

    // Stop accepting new work and let in-flight jobs drain. WorkQueue's
    // `shutdown` consumes it, so unwrap the only remaining `Arc` owners.
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain_queue(tick_queue, "tick"))
        .await
        .is_err()
    {
        warn!(queue = "tick", "queue did not drain within the shutdown timeout");
    }
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain_queue(candle_queue, "candle"))
        .await
        .is_err()
    {
        warn!(queue = "candle", "queue did not drain within the shutdown timeout");
    }

    {
        let mut guard = cache.lock().await;
        guard.close().await;
    }
    pool.close().await;

    info!("shutdown complete");
    Ok(())
}

/// SIGINT everywhere; SIGTERM too on Unix, where orchestrators send it.
#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            error!(error = %err, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            info!("SIGINT received; starting graceful shutdown");
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                error!(error = %err, "failed to listen for SIGINT");
            }
            info!("SIGINT received; starting graceful shutdown");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received; starting graceful shutdown");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
    info!("SIGINT received; starting graceful shutdown");
}

async fn drain_queue(queue: Arc<pipeline::WorkQueue>, name: &str) {
    match Arc::try_unwrap(queue) {
        Ok(queue) => queue.shutdown().await,
        Err(_) => warn!(queue = name, "queue still has outstanding references at shutdown"),
    }
}

fn init_tracing() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ingest_client={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
