//! The legal question-answering endpoint.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{Extension, Json};
use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::auth::CurrentUser;
use super::{ApiError, AppState, bad_request_error, internal_error};
use gavel_core::answer::AnswerPayload;
use gavel_core::query::QueryError;

#[derive(Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// `POST /api/v1/query` — answer a legal question against the case
/// corpus. Costs one point, debited only after a successful answer; an
/// embedder or store failure costs the caller nothing.
pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<AnswerPayload>, (StatusCode, Json<ApiError>)> {
    if body.query.trim().is_empty() {
        return Err(bad_request_error(
            "invalid_request",
            "query must not be empty".into(),
        ));
    }

    if user.points <= 0 {
        return Err(insufficient_points());
    }

    let payload = state.engine.answer(&body.query).map_err(|e| {
        let code = match e {
            QueryError::Embedding(_) => "embedding_unavailable",
            QueryError::Store(_) => "store_unavailable",
        };
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError {
                code: code.into(),
                message: e.to_string(),
            }),
        )
    })?;

    // The conditional update re-checks the balance, so a concurrent
    // spend between the precondition and here surfaces as 402.
    match state.users.debit_point(&user.email) {
        Ok(_) => Ok(Json(payload)),
        Err(gavel_core::users::UserStoreError::InsufficientPoints) => Err(insufficient_points()),
        Err(e) => Err(internal_error(e.to_string())),
    }
}

fn insufficient_points() -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::PAYMENT_REQUIRED,
        Json(ApiError {
            code: "insufficient_points".into(),
            message: "points balance is empty".into(),
        }),
    )
}
