use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod config;
mod db;
mod luhn;
mod models;
mod repository;
mod services;

use crate::config::AppConfig;
use crate::db::Database;
use crate::repository::Repository;
use crate::services::accrual::AccrualClient;
use crate::services::grader::{self, GraderConfig};

/// Shared application state: the repository capability plus the session
/// secret. Handlers never hold the pool or the task queue directly.
pub struct AppState {
    pub repo: Arc<Repository>,
    pub session_secret: Vec<u8>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loyalty_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::load();

    tracing::info!("Starting loyalty backend v{}", env!("CARGO_PKG_VERSION"));

    let db = Database::connect(&config.database_uri).await?;
    tracing::info!("Database connected, schema ready");

    let (repo, task_rx) = Repository::new(db.pool.clone());
    let repo = Arc::new(repo);

    let accrual = Arc::new(AccrualClient::new(
        &config.accrual_address,
        config.client_timeout,
    )?);

    grader::spawn_workers(
        GraderConfig {
            workers: config.worker_count(),
            backoff: Duration::from_secs(config.backoff),
        },
        repo.clone(),
        accrual,
        task_rx,
    );

    // The queue is in-memory: pick up orders a previous process left
    // non-terminal.
    match repo.recover_pending_orders().await {
        Ok(0) => tracing::info!("No pending orders to recover"),
        Ok(count) => tracing::info!("Re-enqueued {} pending orders", count),
        Err(e) => {
            tracing::error!("Failed to recover pending orders: {}", e);
            tracing::warn!("Continuing with an empty grading queue");
        }
    }

    let state = Arc::new(AppState {
        repo: repo.clone(),
        session_secret: config.session_secret(),
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/user", api::routes::create_router(state.clone()))
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.run_address).await?;
    tracing::info!("Server listening on {}", config.run_address);

    axum::serve(listener, app).await?;

    repo.close().await;
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
