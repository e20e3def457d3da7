mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use courier_api::AppState;
use courier_db::Database;
use courier_gateway::{EngineConfig, SyncEngine};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "courier_server=debug,courier_api=debug,courier_gateway=debug,courier_db=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init store; schema or seed failure is fatal
    let db = Arc::new(Database::new(&config.db_path));
    let init_db = db.clone();
    tokio::task::spawn_blocking(move || init_db.initialize()).await??;

    // Live feed
    let engine = SyncEngine::spawn(db.clone(), EngineConfig::new(config.sync_addr()));
    let sync_addr = engine.start().await?;
    info!("Sync engine listening on ws://{}/", sync_addr);

    // Pull API
    let app = courier_api::router(AppState { db: db.clone() })
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.http_addr();
    info!("Courier HTTP bridge listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.stop().await;
    db.close();
    info!("Courier shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
