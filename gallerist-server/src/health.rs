//! Minimal health/readiness surface (§6's only sanctioned HTTP surface).
//! `/healthz` reports the process is up; `/readyz` additionally checks the
//! catalog is reachable.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use gallerist_config::HealthConfig;
use gallerist_core::catalog::CatalogGateway;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::AppResult;

#[derive(Clone)]
struct HealthState {
    catalog: Arc<dyn CatalogGateway>,
}

pub async fn serve(config: HealthConfig, catalog: Arc<dyn CatalogGateway>) -> anyhow::Result<()> {
    let state = HealthState { catalog };
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(%addr, "health server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn readyz(State(state): State<HealthState>) -> AppResult<Json<Value>> {
    // Any cheap read proves the pool is live; a nonexistent library id is
    // expected to resolve to `None`, not an error.
    state.catalog.get_library(gallerist_model::LibraryId::generate()).await?;
    Ok(Json(json!({ "status": "ready" })))
}
