//! In-memory implementations of the booking storage seams.
//!
//! Each store keeps its state behind `Arc<Mutex<..>>`, so clones share data:
//! hand one clone to the services and keep another for assertions.
//!
//! The stores mirror the PostgreSQL semantics the services rely on:
//! - accounts resolve case-insensitively by address, then alias, then public key
//! - content is addressed by SHA-256 and written once
//! - slot inserts are idempotent per `(meeting_id, owner_public_key)` and
//!   reject overlapping Owner-role slots of the same account
//! - overlap queries return slots of every role
//!
//! # Example
//!
//! ```rust,ignore
//! use booking_test_utils::MemorySlotStore;
//!
//! let slots = MemorySlotStore::new().with_insert_failure_after(1);
//! // First insert succeeds, every later one fails with a database error.
//! ```

use async_trait::async_trait;
use booking_service::crypto::content_address;
use booking_service::errors::BookingError;
use booking_service::models::{Account, NewSlot, ParticipantRole, Slot};
use booking_service::repositories::{AccountDirectory, ContentStore, SlotStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// ============================================================================
// Accounts
// ============================================================================

/// In-memory account directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccountDirectory {
    inner: Arc<Mutex<Vec<Account>>>,
}

impl MemoryAccountDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered accounts.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccountDirectory {
    async fn resolve(&self, identifier: &str) -> Result<Account, BookingError> {
        let needle = identifier.trim().to_lowercase();
        let accounts = self.inner.lock().unwrap();

        accounts
            .iter()
            .find(|a| a.address == needle)
            .or_else(|| {
                accounts
                    .iter()
                    .find(|a| a.alias.as_deref() == Some(needle.as_str()))
            })
            .or_else(|| accounts.iter().find(|a| a.public_key == needle))
            .cloned()
            .ok_or_else(|| BookingError::AccountNotFound(identifier.to_string()))
    }

    async fn create(
        &self,
        address: &str,
        sealed_private_key: &str,
        public_key: &str,
    ) -> Result<Account, BookingError> {
        let address = address.trim().to_lowercase();
        let public_key = public_key.to_lowercase();
        let mut accounts = self.inner.lock().unwrap();

        if accounts
            .iter()
            .any(|a| a.address == address || a.public_key == public_key)
        {
            return Err(BookingError::DuplicateAccount(address));
        }

        let account = Account {
            id: Uuid::new_v4(),
            address,
            alias: None,
            public_key,
            sealed_private_key: sealed_private_key.to_string(),
            preferences_address: None,
            created_at: Utc::now(),
        };
        accounts.push(account.clone());
        Ok(account)
    }

    async fn update_preferences_pointer(
        &self,
        account_id: Uuid,
        preferences_address: &str,
    ) -> Result<Account, BookingError> {
        let mut accounts = self.inner.lock().unwrap();
        let account = accounts
            .iter_mut()
            .find(|a| a.id == account_id)
            .ok_or_else(|| BookingError::AccountNotFound(account_id.to_string()))?;

        account.preferences_address = Some(preferences_address.to_string());
        Ok(account.clone())
    }

    async fn set_alias(&self, account_id: Uuid, alias: &str) -> Result<Account, BookingError> {
        let alias = alias.trim().to_lowercase();
        let mut accounts = self.inner.lock().unwrap();

        if accounts
            .iter()
            .any(|a| a.id != account_id && a.alias.as_deref() == Some(alias.as_str()))
        {
            return Err(BookingError::DuplicateAccount(alias));
        }

        let account = accounts
            .iter_mut()
            .find(|a| a.id == account_id)
            .ok_or_else(|| BookingError::AccountNotFound(account_id.to_string()))?;

        account.alias = Some(alias);
        Ok(account.clone())
    }
}

// ============================================================================
// Content
// ============================================================================

#[derive(Debug, Default)]
struct ContentInner {
    blobs: HashMap<String, Vec<u8>>,
    puts: usize,
}

/// In-memory content-addressed store.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    inner: Arc<Mutex<ContentInner>>,
}

impl MemoryContentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes at an arbitrary address, bypassing hashing.
    ///
    /// Used to plant corrupt documents.
    pub fn insert_raw(&self, address: &str, bytes: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .blobs
            .insert(address.to_string(), bytes.to_vec());
    }

    /// Whether anything is stored at `address`.
    pub fn contains(&self, address: &str) -> bool {
        self.inner.lock().unwrap().blobs.contains_key(address)
    }

    /// Number of distinct blobs stored.
    pub fn blob_count(&self) -> usize {
        self.inner.lock().unwrap().blobs.len()
    }

    /// Number of `put` calls made, including ones that stored nothing new.
    pub fn put_count(&self) -> usize {
        self.inner.lock().unwrap().puts
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, bytes: &[u8]) -> Result<String, BookingError> {
        let address = content_address(bytes);
        let mut inner = self.inner.lock().unwrap();
        inner.puts += 1;
        inner
            .blobs
            .entry(address.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(address)
    }

    async fn get(&self, address: &str) -> Result<Vec<u8>, BookingError> {
        self.inner
            .lock()
            .unwrap()
            .blobs
            .get(address)
            .cloned()
            .ok_or_else(|| BookingError::NotFound(format!("Content {} not found", address)))
    }
}

// ============================================================================
// Slots
// ============================================================================

#[derive(Debug, Default)]
struct SlotInner {
    slots: Vec<Slot>,
    inserts: usize,
    fail_inserts_after: Option<usize>,
    unreachable: bool,
}

/// In-memory slot store.
#[derive(Debug, Clone, Default)]
pub struct MemorySlotStore {
    inner: Arc<Mutex<SlotInner>>,
}

fn overlaps(slot: &Slot, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    slot.start < end && start < slot.end
}

impl MemorySlotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `n` inserts succeed, then fail every later one with a database
    /// error until [`Self::clear_insert_failure`] is called.
    #[must_use]
    pub fn with_insert_failure_after(self, n: usize) -> Self {
        self.inner.lock().unwrap().fail_inserts_after = Some(n);
        self
    }

    pub fn clear_insert_failure(&self) {
        self.inner.lock().unwrap().fail_inserts_after = None;
    }

    /// Make `ping` fail, as if the database were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.lock().unwrap().unreachable = unreachable;
    }

    /// Snapshot of every stored slot.
    pub fn all(&self) -> Vec<Slot> {
        self.inner.lock().unwrap().slots.clone()
    }

    /// Slots belonging to one meeting.
    pub fn for_meeting(&self, meeting_id: Uuid) -> Vec<Slot> {
        self.inner
            .lock()
            .unwrap()
            .slots
            .iter()
            .filter(|s| s.meeting_id == meeting_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    async fn find_overlapping(
        &self,
        owner_public_key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Slot>, BookingError> {
        let inner = self.inner.lock().unwrap();
        let mut found: Vec<Slot> = inner
            .slots
            .iter()
            .filter(|s| s.owner_public_key == owner_public_key && overlaps(s, start, end))
            .cloned()
            .collect();
        found.sort_by_key(|s| s.start);
        Ok(found)
    }

    async fn insert(&self, slot: NewSlot) -> Result<Slot, BookingError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(existing) = inner.slots.iter().find(|s| {
            s.meeting_id == slot.meeting_id && s.owner_public_key == slot.owner_public_key
        }) {
            return Ok(existing.clone());
        }

        if inner
            .fail_inserts_after
            .is_some_and(|limit| inner.inserts >= limit)
        {
            return Err(BookingError::Database(
                "injected insert failure".to_string(),
            ));
        }

        if slot.role == ParticipantRole::Owner
            && inner.slots.iter().any(|s| {
                s.owner_public_key == slot.owner_public_key
                    && s.role == ParticipantRole::Owner
                    && overlaps(s, slot.start, slot.end)
            })
        {
            return Err(BookingError::TimeNotAvailable);
        }

        let stored = Slot {
            id: Uuid::new_v4(),
            meeting_id: slot.meeting_id,
            owner_public_key: slot.owner_public_key,
            role: slot.role,
            start: slot.start,
            end: slot.end,
            content_address: slot.content_address,
            created_at: slot.created_at,
        };
        inner.inserts += 1;
        inner.slots.push(stored.clone());
        Ok(stored)
    }

    async fn get(&self, slot_id: Uuid) -> Result<Slot, BookingError> {
        self.inner
            .lock()
            .unwrap()
            .slots
            .iter()
            .find(|s| s.id == slot_id)
            .cloned()
            .ok_or_else(|| BookingError::NotFound(format!("Slot {} not found", slot_id)))
    }

    async fn list_for_owner(
        &self,
        owner_public_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Slot>, BookingError> {
        let inner = self.inner.lock().unwrap();
        let mut found: Vec<Slot> = inner
            .slots
            .iter()
            .filter(|s| s.owner_public_key == owner_public_key && overlaps(s, from, to))
            .cloned()
            .collect();
        found.sort_by_key(|s| s.start);
        Ok(found)
    }

    async fn list_for_meeting(&self, meeting_id: Uuid) -> Result<Vec<Slot>, BookingError> {
        Ok(self.for_meeting(meeting_id))
    }

    async fn delete_meeting(&self, meeting_id: Uuid) -> Result<u64, BookingError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.slots.len();
        inner.slots.retain(|s| s.meeting_id != meeting_id);
        Ok((before - inner.slots.len()) as u64)
    }

    async fn ping(&self) -> Result<(), BookingError> {
        if self.inner.lock().unwrap().unreachable {
            return Err(BookingError::Database("connection refused".to_string()));
        }
        Ok(())
    }
}
