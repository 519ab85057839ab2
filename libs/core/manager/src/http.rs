//! The stats HTTP surface: a single `GET /manager/stats` endpoint serving
//! [`crate::stats::ManagerStatsReport`] as JSON. Mirrors
//! `original_source/manager/managerStats.go`'s `ReportStats` handler, which
//! sets `content-type: application/json` and allows any origin.

use crate::manager::ManagerHandle;
use axum::{middleware, routing::get, Json, Router};
use observability::middleware::metrics_middleware;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
struct AppState {
    manager: ManagerHandle,
}

/// Build the router: `GET /manager/stats` plus a Prometheus-format
/// `GET /metrics`, both wrapped in the observability crate's request
/// metrics middleware. `manager` is a [`ManagerHandle`], taken before
/// `Manager::run` consumes the manager itself, so the stats handler
/// always reports live counters from the running pipeline.
pub fn router(manager: ManagerHandle) -> Router {
    let state = AppState { manager };
    Router::new()
        .route("/manager/stats", get(stats_handler))
        .route("/metrics", get(observability::metrics_handler))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn stats_handler(axum::extract::State(state): axum::extract::State<AppState>) -> Json<crate::stats::ManagerStatsReport> {
    Json(state.manager.report())
}
