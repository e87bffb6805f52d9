//! tikky API server
//!
//! - Counter endpoints: POST /write, GET /read
//! - Ops endpoints: GET /health, GET /metrics
//! - Refuses to serve until redis answers PING
//! - Graceful shutdown on SIGINT/SIGTERM with a drain deadline

use std::future::IntoFuture;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use tikky_core::error::{Result, TikkyError};

use tikky_api::config::{self, LogFormat, ServiceConfig};
use tikky_api::store::{CounterStore, RedisStore};
use tikky_api::{app_state::AppState, obs, router};

#[tokio::main]
async fn main() -> ExitCode {
    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            obs::logging::init(LogFormat::default());
            tracing::error!(error = %e, code = e.client_code().as_str(), "config load failed");
            return ExitCode::FAILURE;
        }
    };
    obs::logging::init(cfg.log.format);

    match run(cfg).await {
        Ok(()) => {
            tracing::info!("server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, code = e.client_code().as_str(), "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: ServiceConfig) -> Result<()> {
    let listen = cfg.server.listen_addr()?;

    let store = tokio::time::timeout(cfg.redis.startup_timeout(), RedisStore::connect(cfg.redis.clone()))
        .await
        .map_err(|_| {
            TikkyError::StoreUnavailable(format!(
                "no answer from {} within {}ms",
                cfg.redis.addr, cfg.redis.startup_timeout_ms
            ))
        })?
        .map_err(|e| TikkyError::StoreUnavailable(format!("{}: {e}", cfg.redis.addr)))?;
    let store = Arc::new(store);
    tracing::info!(addr = %store.addr(), pool_size = cfg.redis.pool_size, "connected to redis");

    let app = router::build_router(AppState::new(store.clone()));

    let listener = TcpListener::bind(listen)
        .await
        .map_err(|e| TikkyError::Internal(format!("bind {listen} failed: {e}")))?;
    tracing::info!(%listen, "tikky-api starting");

    let served = serve(listener, app, cfg.server.shutdown_timeout()).await;
    store.close().await;
    served
}

/// Serve until a shutdown signal, then give in-flight requests `drain` to finish.
async fn serve(listener: TcpListener, app: Router, drain: Duration) -> Result<()> {
    let stopping = Arc::new(Notify::new());
    let notify = stopping.clone();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            notify.notify_one();
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        res = &mut server => res.map_err(|e| TikkyError::Internal(format!("server failed: {e}"))),
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(drain).await;
        } => {
            tracing::warn!(drain_ms = drain.as_millis() as u64, "drain deadline reached, dropping open connections");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, shutting down gracefully");
}
