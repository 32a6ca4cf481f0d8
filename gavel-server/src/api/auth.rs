//! Account endpoints and the bearer-token middleware.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState, bad_request_error, internal_error};
use crate::auth::password;
use gavel_core::users::{User, UserStoreError};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct RegisterResponse {
    pub email: String,
    pub points: i64,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Authenticated account attached to the request by [`auth_middleware`].
#[derive(Clone)]
pub struct CurrentUser(pub User);

// ── Endpoints ───────────────────────────────────────────────────────────

/// `POST /api/auth/register` — create an account with the configured
/// starting balance.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), (StatusCode, Json<ApiError>)> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(bad_request_error(
            "invalid_request",
            "email and password must not be empty".into(),
        ));
    }

    let hash = password::hash_password(&body.password).map_err(|e| internal_error(e.to_string()))?;

    let user = state
        .users
        .create(&body.email, &hash, state.initial_points)
        .map_err(|e| match e {
            UserStoreError::EmailTaken(_) => bad_request_error("email_taken", e.to_string()),
            other => internal_error(other.to_string()),
        })?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            email: user.email,
            points: user.points,
        }),
    ))
}

/// `POST /api/auth/login` — verify credentials and issue a bearer token.
///
/// Unknown email and wrong password produce the same response so the
/// endpoint does not leak which accounts exist.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, Json<ApiError>)> {
    let user = state
        .users
        .find_by_email(&body.email)
        .map_err(|e| internal_error(e.to_string()))?
        .ok_or_else(invalid_credentials)?;

    let valid = password::verify_password(&body.password, &user.password_hash)
        .map_err(|e| internal_error(e.to_string()))?;
    if !valid {
        return Err(invalid_credentials());
    }

    let access_token = state
        .jwt
        .issue(&user.email)
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".into(),
    }))
}

fn invalid_credentials() -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiError {
            code: "invalid_credentials".into(),
            message: "incorrect email or password".into(),
        }),
    )
}

// ── Middleware ──────────────────────────────────────────────────────────

/// Enforce bearer-token authentication and attach the account row.
///
/// The user is loaded fresh on every request so the points balance the
/// handlers see is current.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        return unauthorized_response("missing bearer token");
    };

    let claims = match state.jwt.verify(token) {
        Ok(claims) => claims,
        Err(e) => return unauthorized_response(&e.to_string()),
    };

    let user = match state.users.find_by_email(&claims.sub) {
        Ok(user) => user,
        Err(e) => {
            let (status, body) = internal_error(e.to_string());
            return (status, body).into_response();
        }
    };

    let Some(user) = user else {
        return unauthorized_response("account no longer exists");
    };

    req.extensions_mut().insert(CurrentUser(user));
    next.run(req).await
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiError {
            code: "unauthorized".into(),
            message: message.to_string(),
        }),
    )
        .into_response()
}
