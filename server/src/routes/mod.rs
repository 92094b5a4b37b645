//! HTTP route handlers.
//!
//! Each sub-module corresponds to an API endpoint group. The location routes
//! go through [`crate::auth::require_token`]; [`health`] never does.

pub mod health;
pub mod location;

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Build the full application router.
///
/// The webhook answers on `/` so a tracking client can be pointed at the bare
/// host; `/api/location` is the same pair of handlers under the API prefix.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/api/health", get(health::health));

    let location_routes = Router::new()
        .route("/", get(location::current).post(location::ingest))
        .route(
            "/api/location",
            get(location::current).post(location::ingest),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_token,
        ));

    Router::new()
        .merge(public_routes)
        .merge(location_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
