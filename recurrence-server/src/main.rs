//! Recurrence Risk Server
//!
//! Scores patients for recurrence risk, explains each score and keeps a
//! store of saved assessments.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  RECURRENCE RISK SERVER                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌─────────────────────┐  ┌───────────────┐ │
//! │  │  API      │  │  RiskEngine         │  │  Reference    │ │
//! │  │  (Axum)   │──│  model / threshold  │  │  Generator    │ │
//! │  │           │  │  Tree SHAP          │  │  REF-day-NNN  │ │
//! │  └─────┬─────┘  └─────────────────────┘  └───────┬───────┘ │
//! │        └──────────────────┬──────────────────────┘          │
//! │                           ▼                                 │
//! │                    ┌─────────────┐                          │
//! │                    │   SQLite    │                          │
//! │                    └─────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod models;
mod handlers;
mod error;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post, put, delete},
};
use recurrence_engine::RiskEngine;
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "recurrence_server=debug,recurrence_engine=info,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing::info!("Recurrence Risk Server starting...");
    tracing::info!("Database: {}", config.database_url);
    if !config.is_production() {
        tracing::warn!("Running in {} mode", config.environment);
    }

    // Artifacts load before anything binds; a missing model is fatal
    let paths = config.artifact_paths();
    let background_limit = config.background_limit;
    let engine = tokio::task::spawn_blocking(move || RiskEngine::load(&paths, background_limit))
        .await?
        .context("Failed to load model artifacts")?;

    tracing::info!(
        "Model ready: {} features, threshold {}",
        engine.feature_schema().len(),
        engine.threshold()
    );

    // Initialize database pool
    let pool = db::create_pool(&config.database_url).await
        .context("Failed to create database pool")?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await
        .context("Failed to run migrations")?;

    // Build application state
    let state = AppState {
        pool,
        engine: Arc::new(engine),
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::SqlitePool,
    pub engine: Arc<RiskEngine>,
    pub config: config::Config,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))

        // Scoring
        .route("/predict", post(handlers::predict::predict))
        .route("/shap/global", get(handlers::predict::global_shap))
        .route("/features", get(handlers::predict::features))

        // Patient records
        .route("/save_patient", post(handlers::patients::save))
        .route("/patients", get(handlers::patients::list))
        .route("/dashboard/patients", get(handlers::patients::dashboard))
        .route("/patientsid/:id", get(handlers::patients::get))
        .route("/update_notes/:id", put(handlers::patients::update_notes))
        .route("/delete_patient/:id", delete(handlers::patients::delete))

        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
