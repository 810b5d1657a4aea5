//! HTTP request handlers for the booking service.

pub mod accounts;
pub mod health;
pub mod meetings;
pub mod slots;

pub use accounts::{
    get_account, get_availability, list_slots, onboard, set_alias, update_preferences,
};
pub use health::{get_challenge, health_check};
pub use meetings::{cancel_meeting, create_meeting};
pub use slots::get_slot;

use crate::errors::BookingError;
use crate::observability::metrics::record_error;

/// Count an error returned from `operation` before it is rendered.
pub(crate) fn track(operation: &'static str) -> impl Fn(&BookingError) {
    move |e| record_error(operation, e.code(), e.status_code())
}
