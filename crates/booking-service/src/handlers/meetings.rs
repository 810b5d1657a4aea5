//! Meeting handlers.

use crate::errors::BookingError;
use crate::handlers::track;
use crate::models::{CancelMeetingResponse, MeetingRequest, ScheduledSlot};
use crate::routes::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Handler for POST /v1/meetings
///
/// Books a meeting for every participant and returns the scheduler's slot.
///
/// # Response
///
/// - 201 Created: meeting booked
/// - 400 Bad Request: malformed request or scheduler booking themselves
/// - 404 Not Found: a participant has no account
/// - 409 Conflict: an owner is unavailable or already booked
#[instrument(skip_all, name = "booking.handlers.create_meeting")]
pub async fn create_meeting(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MeetingRequest>,
) -> Result<(StatusCode, Json<ScheduledSlot>), BookingError> {
    let slot = state
        .allocator
        .create_meeting(request)
        .await
        .inspect_err(track("create_meeting"))?;

    Ok((StatusCode::CREATED, Json(slot)))
}

/// Handler for DELETE /v1/meetings/{meeting_id}
#[instrument(skip_all, name = "booking.handlers.cancel_meeting", fields(meeting_id = %meeting_id))]
pub async fn cancel_meeting(
    State(state): State<Arc<AppState>>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<CancelMeetingResponse>, BookingError> {
    let removed_slots = state
        .allocator
        .cancel_meeting(meeting_id)
        .await
        .inspect_err(track("cancel_meeting"))?;

    Ok(Json(CancelMeetingResponse {
        meeting_id,
        removed_slots,
    }))
}
