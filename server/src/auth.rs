//! Optional bearer-token authentication for the location routes.
//!
//! When `[auth] token` (or `LASTSEEN_TOKEN`) is set, requests must carry
//! `Authorization: Bearer <token>`. With no token configured the middleware
//! lets everything through, which matches a webhook sitting behind a proxy
//! that already authenticates the tracking client.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::AppState;

/// Axum middleware enforcing the configured bearer token.
///
/// # Error responses
///
/// - `401 Unauthorized` — header missing or not a Bearer token
/// - `403 Forbidden` — token present but wrong
pub async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.config.auth.token.as_deref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(provided) = provided else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Missing or invalid Authorization header"})),
        )
            .into_response();
    };

    if !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "Invalid token"}))).into_response();
    }

    next.run(request).await
}

/// Byte comparison whose running time depends only on `expected.len()`.
pub fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    let mismatch = expected
        .iter()
        .enumerate()
        .fold(u8::from(expected.len() != provided.len()), |acc, (i, e)| {
            acc | (e ^ provided.get(i).copied().unwrap_or(0xff))
        });
    mismatch == 0
}
