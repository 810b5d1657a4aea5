//! Health and challenge handlers.

use crate::crypto::signature_challenge;
use crate::models::{ChallengeResponse, HealthResponse};
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /v1/health
///
/// Pings the slot store. Always answers 200 so orchestrators can read the
/// body; `status` is "unhealthy" when the store is unreachable.
#[instrument(skip_all, name = "booking.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let db_healthy = state.slots.ping().await.is_ok();

    let (status, database) = if db_healthy {
        ("healthy", "healthy")
    } else {
        ("unhealthy", "unhealthy")
    };

    Json(HealthResponse {
        status: status.to_string(),
        database: Some(database.to_string()),
    })
}

/// Handler for GET /v1/challenge
///
/// Returns the message a wallet signs to produce the sealing signature.
pub async fn get_challenge() -> Json<ChallengeResponse> {
    Json(ChallengeResponse {
        message: signature_challenge().to_string(),
    })
}
