//! Service layer for the booking service.
//!
//! # Components
//!
//! - `slot_allocator` - Validates, conflict-checks, encrypts and persists meetings
//! - `account_service` - Onboarding, preferences and availability queries

pub mod account_service;
pub mod slot_allocator;

pub use account_service::AccountService;
pub use slot_allocator::{AllocationPhase, AllocatorSettings, SlotAllocator};

use crate::errors::BookingError;
use crate::models::{Account, Preferences};
use crate::repositories::ContentStore;

/// Load the preferences document an account points at.
///
/// A missing pointer yields `None`. A pointer to missing or unparseable
/// content also yields `None` (logged), so a damaged document reads as
/// "no published availability" rather than failing the caller.
pub(crate) async fn load_preferences(
    content: &dyn ContentStore,
    account: &Account,
) -> Result<Option<Preferences>, BookingError> {
    let Some(address) = account.preferences_address.as_deref() else {
        return Ok(None);
    };

    let bytes = match content.get(address).await {
        Ok(bytes) => bytes,
        Err(BookingError::NotFound(_)) => {
            tracing::warn!(
                target: "booking.services",
                account_id = %account.id,
                "Preferences pointer references missing content"
            );
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    match serde_json::from_slice::<Preferences>(&bytes) {
        Ok(preferences) => Ok(Some(preferences)),
        Err(e) => {
            tracing::warn!(
                target: "booking.services",
                account_id = %account.id,
                error = %e,
                "Stored preferences document is malformed"
            );
            Ok(None)
        }
    }
}
