//! HTTP API layer for gavel.
//!
//! Every endpoint is a single JSON request/response pair. Routes under
//! `/api/v1` and `/api/admin` require a bearer token; the account
//! endpoints and the embedder health probe are public.

mod admin;
mod auth;
mod health;
mod query;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Router, middleware};
use serde::Serialize;

pub use admin::add_points;
pub use auth::{CurrentUser, auth_middleware, login, register};
pub use health::get_embedder_health;
pub use query::query_handler;

use crate::auth::jwt::JwtKeys;
use gavel_core::embedding::Embedder;
use gavel_core::query::QueryEngine;
use gavel_core::users::UserStore;

/// Structured API error response.
#[derive(Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// Shared application state.
///
/// Built once at startup and immutable afterwards; the SQLite stores
/// carry their own interior locks, so handlers share this freely.
pub struct AppState {
    pub embedder: Arc<dyn Embedder>,
    pub engine: QueryEngine,
    pub users: UserStore,
    pub jwt: JwtKeys,
    pub initial_points: i64,
}

/// Assemble the API router over the shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/v1/query", post(query_handler))
        .route("/api/admin/add-points", post(add_points))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(protected)
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/embedder/health", get(get_embedder_health))
        .with_state(state)
}

// ── Error helpers ───────────────────────────────────────────────────────

pub(crate) fn internal_error(message: String) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError {
            code: "internal_error".into(),
            message,
        }),
    )
}

pub(crate) fn bad_request_error(code: &str, message: String) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            code: code.into(),
            message,
        }),
    )
}

pub(crate) fn not_found_error(message: String) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError {
            code: "not_found".into(),
            message,
        }),
    )
}
