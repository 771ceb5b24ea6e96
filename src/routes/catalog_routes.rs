//! Golf cart listing endpoints.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use tracing::warn;

use crate::metrics::MetricsRecorder;
use crate::models::GolfCart;
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

/// Registers catalog routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/carts", get(list_carts))
        .route("/carts/{id}", get(get_cart))
}

async fn list_carts(State(state): State<AppState>) -> Result<Json<Vec<GolfCart>>, HTTPError> {
    match state.catalog.list_carts().await {
        Ok(carts) => {
            state.metrics.record_catalog_request("list", "success");
            Ok(Json(carts))
        }
        Err(e) => {
            state.metrics.record_catalog_request("list", "failure");
            Err(upstream_error(&state, e))
        }
    }
}

async fn get_cart(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<GolfCart>, HTTPError> {
    match state.catalog.get_cart(&id).await {
        Ok(Some(cart)) => {
            state.metrics.record_catalog_request("get", "success");
            Ok(Json(cart))
        }
        Ok(None) => {
            state.metrics.record_catalog_request("get", "not_found");
            Err(HTTPError::new(StatusCode::NOT_FOUND, "Golf cart not found"))
        }
        Err(e) => {
            state.metrics.record_catalog_request("get", "failure");
            Err(upstream_error(&state, e))
        }
    }
}

fn upstream_error(state: &AppState, error: String) -> HTTPError {
    warn!(
        event_name = "catalog.request.failed",
        event_domain = "catalog",
        catalog_name = state.catalog.get_name(),
        error = error.as_str(),
        "catalog lookup failed"
    );
    HTTPError::new(StatusCode::BAD_GATEWAY, "Failed to load golf carts")
}
