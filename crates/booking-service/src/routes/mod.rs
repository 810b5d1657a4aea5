//! HTTP routes for the booking service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::repositories::{AccountDirectory, ContentStore, SlotStore};
use crate::services::{AccountService, AllocatorSettings, SlotAllocator};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Request timeout applied to every route.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Onboarding, preferences and availability.
    pub accounts: AccountService,

    /// Meeting creation, cancellation and slot lookup.
    pub allocator: SlotAllocator,

    /// Slot store, used directly for health checks.
    pub slots: Arc<dyn SlotStore>,
}

impl AppState {
    /// Wire the services over the given stores.
    pub fn new(
        config: Config,
        accounts: Arc<dyn AccountDirectory>,
        content: Arc<dyn ContentStore>,
        slots: Arc<dyn SlotStore>,
    ) -> Self {
        let allocator = SlotAllocator::new(
            Arc::clone(&accounts),
            Arc::clone(&content),
            Arc::clone(&slots),
            AllocatorSettings::from(&config),
        );
        let account_service = AccountService::new(accounts, content, Arc::clone(&slots));

        Self {
            config,
            accounts: account_service,
            allocator,
            slots,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/v1/health`, `/v1/challenge`
/// - `/v1/accounts/...` - onboarding, lookup, alias, preferences, availability, slots
/// - `/v1/meetings/...` - create and cancel
/// - `/v1/slots/{slot_id}` - slot with envelope
/// - TraceLayer for request logging
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>) -> Router {
    let routes = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/challenge", get(handlers::get_challenge))
        .route("/v1/accounts", post(handlers::onboard))
        .route("/v1/accounts/:identifier", get(handlers::get_account))
        .route("/v1/accounts/:identifier/alias", put(handlers::set_alias))
        .route(
            "/v1/accounts/:identifier/preferences",
            put(handlers::update_preferences),
        )
        .route(
            "/v1/accounts/:identifier/availability",
            get(handlers::get_availability),
        )
        .route("/v1/accounts/:identifier/slots", get(handlers::list_slots))
        .route("/v1/meetings", post(handlers::create_meeting))
        .route("/v1/meetings/:meeting_id", delete(handlers::cancel_meeting))
        .route("/v1/slots/:slot_id", get(handlers::get_slot))
        .with_state(state);

    routes
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}
