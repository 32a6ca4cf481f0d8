//! Admin endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use serde::{Deserialize, Serialize};

use super::auth::CurrentUser;
use super::{ApiError, AppState, bad_request_error, internal_error, not_found_error};
use gavel_core::users::UserStoreError;

#[derive(Serialize, Deserialize)]
pub struct AddPointsRequest {
    pub email: String,
    pub points: i64,
}

#[derive(Serialize, Deserialize)]
pub struct AddPointsResponse {
    pub email: String,
    /// Balance after the credit.
    pub points: i64,
}

/// `POST /api/admin/add-points` — credit an account's balance.
pub async fn add_points(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<AddPointsRequest>,
) -> Result<Json<AddPointsResponse>, (StatusCode, Json<ApiError>)> {
    if !user.is_admin {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ApiError {
                code: "admin_required".into(),
                message: "admin access required".into(),
            }),
        ));
    }

    if body.points <= 0 {
        return Err(bad_request_error(
            "invalid_request",
            "points must be positive".into(),
        ));
    }

    match state.users.add_points(&body.email, body.points) {
        Ok(points) => Ok(Json(AddPointsResponse {
            email: body.email,
            points,
        })),
        Err(UserStoreError::UnknownUser(_)) => {
            Err(not_found_error(format!("no account for '{}'", body.email)))
        }
        Err(e) => Err(internal_error(e.to_string())),
    }
}
