//! Slot handlers.

use crate::errors::BookingError;
use crate::handlers::track;
use crate::models::SlotWithEnvelope;
use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Handler for GET /v1/slots/{slot_id}
///
/// Returns the slot and its participant's envelope. Decryption happens on
/// the participant's side.
#[instrument(skip_all, name = "booking.handlers.get_slot", fields(slot_id = %slot_id))]
pub async fn get_slot(
    State(state): State<Arc<AppState>>,
    Path(slot_id): Path<Uuid>,
) -> Result<Json<SlotWithEnvelope>, BookingError> {
    let slot = state
        .allocator
        .get_slot(slot_id)
        .await
        .inspect_err(track("get_slot"))?;

    Ok(Json(slot))
}
