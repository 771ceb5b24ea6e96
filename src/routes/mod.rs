//! HTTP route definitions and handlers.
//!
//! Endpoints are grouped by concern: the session and auth screens, the
//! golf cart catalog, and operational endpoints.

mod catalog_routes;
mod ops_routes;
mod session_routes;

use crate::state::AppState;
use axum::Router;

/// Creates the application router with all configured routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(session_routes::routes())
        .merge(catalog_routes::routes())
        .merge(ops_routes::routes())
        .with_state(state)
}
