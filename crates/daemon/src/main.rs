use axum::{response::Json, routing::get, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod store;

use api::AppState;
use config::Config;

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// API under `/api`, everything else served from the data root.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let files = ServeDir::new(state.store.root());

    Router::new()
        .route("/health", get(health))
        .nest("/api", api::router(state))
        .fallback_service(files)
        .layer(cors)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    info!("Serving data root {:?}", config.root);

    let store = store::Store::new(config.root.clone());
    let index = store.load_index()?;
    match &index {
        Some(index) => info!("Loaded shot index with {} shots", index.count),
        None => warn!("No index.json found; shot routes return 503 until POST /api/index/rebuild"),
    }

    let addr = config.bind_addr();
    let app = app(AppState::new(config, index));

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
