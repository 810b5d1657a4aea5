//! Account handlers.

use crate::errors::BookingError;
use crate::handlers::track;
use crate::models::{
    AccountResponse, AvailabilityQuery, AvailabilityResponse, OnboardRequest, OnboardResponse,
    Preferences, PreferencesResponse, SetAliasRequest, SlotRangeQuery, SlotsResponse,
};
use crate::routes::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /v1/accounts
///
/// Onboards a wallet address. The body carries the wallet's signature over
/// the challenge message; the response carries the sealed private key.
///
/// # Response
///
/// - 201 Created: account created
/// - 400 Bad Request: malformed address or empty signature
/// - 409 Conflict: address already registered
#[instrument(skip_all, name = "booking.handlers.onboard")]
pub async fn onboard(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OnboardRequest>,
) -> Result<(StatusCode, Json<OnboardResponse>), BookingError> {
    let account = state
        .accounts
        .onboard(&request.address, &request.signature)
        .await
        .inspect_err(track("onboard"))?;

    Ok((
        StatusCode::CREATED,
        Json(OnboardResponse {
            account: AccountResponse::from(&account),
            sealed_private_key: account.sealed_private_key.clone(),
        }),
    ))
}

/// Handler for GET /v1/accounts/{identifier}
#[instrument(skip_all, name = "booking.handlers.get_account")]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Result<Json<AccountResponse>, BookingError> {
    let account = state
        .accounts
        .get_account(&identifier)
        .await
        .inspect_err(track("get_account"))?;

    Ok(Json(AccountResponse::from(&account)))
}

/// Handler for PUT /v1/accounts/{identifier}/alias
#[instrument(skip_all, name = "booking.handlers.set_alias")]
pub async fn set_alias(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
    Json(request): Json<SetAliasRequest>,
) -> Result<Json<AccountResponse>, BookingError> {
    let account = state
        .accounts
        .set_alias(&identifier, &request.alias)
        .await
        .inspect_err(track("set_alias"))?;

    Ok(Json(AccountResponse::from(&account)))
}

/// Handler for PUT /v1/accounts/{identifier}/preferences
///
/// Replaces the preferences document and returns its new content address.
#[instrument(skip_all, name = "booking.handlers.update_preferences")]
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
    Json(preferences): Json<Preferences>,
) -> Result<Json<PreferencesResponse>, BookingError> {
    let preferences_address = state
        .accounts
        .update_preferences(&identifier, &preferences)
        .await
        .inspect_err(track("update_preferences"))?;

    Ok(Json(PreferencesResponse {
        preferences_address,
    }))
}

/// Handler for GET /v1/accounts/{identifier}/availability?date=&duration_minutes=
#[instrument(skip_all, name = "booking.handlers.get_availability")]
pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, BookingError> {
    let starts = state
        .accounts
        .available_starts(&identifier, query.date, query.duration_minutes)
        .await
        .inspect_err(track("get_availability"))?;

    Ok(Json(AvailabilityResponse {
        date: query.date,
        duration_minutes: query.duration_minutes,
        starts,
    }))
}

/// Handler for GET /v1/accounts/{identifier}/slots?from=&to=
#[instrument(skip_all, name = "booking.handlers.list_slots")]
pub async fn list_slots(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
    Query(query): Query<SlotRangeQuery>,
) -> Result<Json<SlotsResponse>, BookingError> {
    let slots = state
        .accounts
        .busy_slots(&identifier, query.from, query.to)
        .await
        .inspect_err(track("list_slots"))?;

    Ok(Json(SlotsResponse { slots }))
}
