//! Embedder health probe.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use super::AppState;
use gavel_core::embedding::Embedder;

/// Response body for `GET /api/embedder/health`.
#[derive(Serialize, Deserialize)]
pub struct EmbedderHealthResponse {
    pub model_name: String,
    pub dimensions: usize,
    /// "healthy" or "unhealthy".
    pub status: String,
    /// Error detail when unhealthy, null when healthy.
    pub message: Option<String>,
}

/// `GET /api/embedder/health` — run a one-off embed call to verify the
/// model answers, with a 5 second cap so a hung model cannot wedge the
/// probe. Read-only.
pub async fn get_embedder_health(
    State(state): State<Arc<AppState>>,
) -> Json<EmbedderHealthResponse> {
    let model_name = state.embedder.model_name().to_string();
    let dimensions = state.embedder.dimensions();

    let embedder = Arc::clone(&state.embedder);
    let probe = tokio::time::timeout(Duration::from_secs(5), async move {
        embedder.embed(&["health check"])
    })
    .await;

    let (status, message) = match probe {
        Ok(Ok(vectors)) => {
            if vectors.len() != 1 {
                (
                    "unhealthy".into(),
                    Some(format!("expected 1 vector, got {}", vectors.len())),
                )
            } else if vectors[0].len() != dimensions {
                (
                    "unhealthy".into(),
                    Some(format!(
                        "expected dimension {dimensions}, got {}",
                        vectors[0].len()
                    )),
                )
            } else {
                ("healthy".into(), None)
            }
        }
        Ok(Err(e)) => ("unhealthy".into(), Some(format!("embedder error: {e}"))),
        Err(_) => (
            "unhealthy".into(),
            Some("health check timed out after 5 seconds".into()),
        ),
    };

    Json(EmbedderHealthResponse {
        model_name,
        dimensions,
        status,
        message,
    })
}
