//! Unauthenticated health-check endpoint.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

/// `GET /api/health` — liveness probe.
///
/// Returns status, version, uptime, and how many hidden zones and which
/// Overpass endpoint are in use. No authentication required.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "hidden_zones": state.config.zones.len(),
        "overpass_url": state.overpass.url(),
        "persistent": state.store.path().is_some(),
    }))
}
