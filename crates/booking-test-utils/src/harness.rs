//! Booking services wired over in-memory stores.
//!
//! # Example
//!
//! ```rust,ignore
//! let booking = TestBooking::new();
//! let owner = booking.onboard_owner(ADDRESS_BOB, monday_office_hours()).await?;
//! let scheduler = booking.onboard(ADDRESS_ALICE).await?;
//! ```

use crate::fixtures::{signature_for, test_config};
use crate::memory_stores::{MemoryAccountDirectory, MemoryContentStore, MemorySlotStore};
use axum::Router;
use booking_service::errors::BookingError;
use booking_service::models::{Account, Preferences};
use booking_service::routes::{build_routes, AppState};
use booking_service::services::{AccountService, AllocatorSettings, SlotAllocator};
use std::sync::Arc;

/// Account service and allocator sharing one set of in-memory stores.
///
/// The store fields are clones of the ones the services hold, so tests can
/// inspect or sabotage storage directly.
pub struct TestBooking {
    pub accounts: MemoryAccountDirectory,
    pub content: MemoryContentStore,
    pub slots: MemorySlotStore,
    pub account_service: AccountService,
    pub allocator: SlotAllocator,
}

impl Default for TestBooking {
    fn default() -> Self {
        Self::new()
    }
}

impl TestBooking {
    /// Services with owner availability enforced.
    pub fn new() -> Self {
        Self::with_stores(MemorySlotStore::new(), true)
    }

    /// Services that ignore owners' published availability.
    pub fn without_availability_checks() -> Self {
        Self::with_stores(MemorySlotStore::new(), false)
    }

    /// Services over a preconfigured slot store.
    pub fn with_stores(slots: MemorySlotStore, enforce_owner_availability: bool) -> Self {
        let accounts = MemoryAccountDirectory::new();
        let content = MemoryContentStore::new();

        let allocator = SlotAllocator::new(
            Arc::new(accounts.clone()),
            Arc::new(content.clone()),
            Arc::new(slots.clone()),
            AllocatorSettings::from(&test_config(enforce_owner_availability)),
        );
        let account_service = AccountService::new(
            Arc::new(accounts.clone()),
            Arc::new(content.clone()),
            Arc::new(slots.clone()),
        );

        Self {
            accounts,
            content,
            slots,
            account_service,
            allocator,
        }
    }

    /// Onboard `address` with [`signature_for`] as its signature.
    pub async fn onboard(&self, address: &str) -> Result<Account, BookingError> {
        self.account_service
            .onboard(address, &signature_for(address))
            .await
    }

    /// Resolve an account by address, alias or public key.
    pub async fn account(&self, identifier: &str) -> Result<Account, BookingError> {
        self.account_service.get_account(identifier).await
    }

    /// Onboard `address` and publish `preferences` for it.
    pub async fn onboard_owner(
        &self,
        address: &str,
        preferences: Preferences,
    ) -> Result<Account, BookingError> {
        self.onboard(address).await?;
        self.account_service
            .update_preferences(address, &preferences)
            .await?;
        self.account_service.get_account(address).await
    }
}

/// HTTP router over fresh in-memory stores, plus handles on those stores.
pub struct TestApp {
    pub router: Router,
    pub accounts: MemoryAccountDirectory,
    pub content: MemoryContentStore,
    pub slots: MemorySlotStore,
}

impl TestApp {
    pub fn new(enforce_owner_availability: bool) -> Self {
        let accounts = MemoryAccountDirectory::new();
        let content = MemoryContentStore::new();
        let slots = MemorySlotStore::new();

        let state = Arc::new(AppState::new(
            test_config(enforce_owner_availability),
            Arc::new(accounts.clone()),
            Arc::new(content.clone()),
            Arc::new(slots.clone()),
        ));

        Self {
            router: build_routes(state),
            accounts,
            content,
            slots,
        }
    }
}
