//! Storage seams for the booking service.
//!
//! Each seam is an `async_trait` object so the services can run against
//! PostgreSQL in production and in-memory stores in tests. The PostgreSQL
//! implementations live in the submodules.

pub mod accounts;
pub mod content;
pub mod slots;

pub use accounts::PgAccountDirectory;
pub use content::PgContentStore;
pub use slots::PgSlotStore;

use crate::errors::BookingError;
use crate::models::{Account, NewSlot, Slot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Account lookup and registration.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Resolve an address, alias or public key to an account.
    ///
    /// Matching is case-insensitive and tries the address first, then the
    /// alias, then the public key; the first match wins.
    ///
    /// # Errors
    ///
    /// `BookingError::AccountNotFound` if nothing matches.
    async fn resolve(&self, identifier: &str) -> Result<Account, BookingError>;

    /// Register a new account. The address is stored lower-cased.
    ///
    /// # Errors
    ///
    /// `BookingError::DuplicateAccount` if the address or public key exists.
    async fn create(
        &self,
        address: &str,
        sealed_private_key: &str,
        public_key: &str,
    ) -> Result<Account, BookingError>;

    /// Point the account at a new preferences document.
    async fn update_preferences_pointer(
        &self,
        account_id: Uuid,
        preferences_address: &str,
    ) -> Result<Account, BookingError>;

    /// Set or replace the account's alias (stored lower-cased).
    ///
    /// # Errors
    ///
    /// `BookingError::DuplicateAccount` if another account holds the alias.
    async fn set_alias(&self, account_id: Uuid, alias: &str) -> Result<Account, BookingError>;
}

/// Append-only, content-addressed blob storage.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `bytes` and return their content address. Storing identical
    /// bytes twice returns the same address and keeps one copy.
    async fn put(&self, bytes: &[u8]) -> Result<String, BookingError>;

    /// Fetch the bytes stored at `address`.
    ///
    /// # Errors
    ///
    /// `BookingError::NotFound` if nothing is stored there.
    async fn get(&self, address: &str) -> Result<Vec<u8>, BookingError>;
}

/// Slot persistence.
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Slots of any role held by `owner_public_key` overlapping
    /// `[start, end)`, ordered by start time.
    async fn find_overlapping(
        &self,
        owner_public_key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Slot>, BookingError>;

    /// Insert a slot, idempotent on `(meeting_id, owner_public_key)`.
    ///
    /// If the pair already exists the stored slot is returned unchanged.
    /// Owner-role rows are the only ones the store itself keeps apart; an
    /// Owner overlapping that account's Scheduler or Guest slots is caught
    /// by the allocator's pre-check.
    ///
    /// # Errors
    ///
    /// `BookingError::TimeNotAvailable` if an Owner-role slot would overlap
    /// another Owner-role slot of the same account.
    async fn insert(&self, slot: NewSlot) -> Result<Slot, BookingError>;

    /// Fetch a slot by id.
    ///
    /// # Errors
    ///
    /// `BookingError::NotFound` if it does not exist.
    async fn get(&self, slot_id: Uuid) -> Result<Slot, BookingError>;

    /// All slots (any role) of `owner_public_key` overlapping `[from, to)`,
    /// ordered by start time.
    async fn list_for_owner(
        &self,
        owner_public_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Slot>, BookingError>;

    /// Every slot of one meeting, ordered by creation time.
    async fn list_for_meeting(&self, meeting_id: Uuid) -> Result<Vec<Slot>, BookingError>;

    /// Delete every slot of a meeting. Returns the number removed.
    async fn delete_meeting(&self, meeting_id: Uuid) -> Result<u64, BookingError>;

    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), BookingError>;
}
