//! HTTP surface: `GET /1` (live vehicles) and `GET /2` (bus stops).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::HttpError;
use crate::fetch::HttpClient;
use crate::stops::{StopRecord, load_bus_stops};
use crate::vehicles::{VehicleRecord, fetch_vehicles};

/// Immutable state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub client: Arc<dyn HttpClient>,
}

impl AppState {
    pub fn new(settings: Settings, client: impl HttpClient + 'static) -> Self {
        Self { settings: Arc::new(settings), client: Arc::new(client) }
    }
}

#[derive(Debug, Deserialize)]
pub struct VehicleQuery {
    bus_number: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/1", get(vehicles))
        .route("/2", get(stops))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn vehicles(
    State(state): State<AppState>,
    Query(query): Query<VehicleQuery>,
) -> Result<Json<Vec<VehicleRecord>>, HttpError> {
    let vehicles = fetch_vehicles(
        state.client.as_ref(),
        &state.settings.feed_url,
        query.bus_number.as_deref(),
    )
    .await?;
    Ok(Json(vehicles))
}

async fn stops(State(state): State<AppState>) -> Result<Json<Vec<StopRecord>>, HttpError> {
    let stops = load_bus_stops(&state.settings.stops_path, state.settings.route_merge).await?;
    Ok(Json(stops))
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Server is running");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(tokio::signal::ctrl_c()))
        .await?;

    Ok(())
}

/// Resolves once `signal` fires. A signal that cannot be installed also
/// shuts the server down, after logging why.
async fn shutdown_signal(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Failed to listen for shutdown signal, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_on_signal() {
        shutdown_signal(async { Ok(()) }).await;
    }

    #[tokio::test]
    async fn test_shutdown_when_signal_handler_fails() {
        let failed = async { Err(std::io::Error::other("no signal driver")) };
        tokio::time::timeout(std::time::Duration::from_secs(1), shutdown_signal(failed))
            .await
            .expect("shutdown should resolve when the handler fails");
    }
}
