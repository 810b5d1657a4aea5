//! Slot allocation.
//!
//! Creating a meeting moves through a fixed sequence of phases:
//!
//! ```text
//! Validating -> ConflictChecking -> Encrypting -> Persisting -> Done
//!      \               \                \              \
//!       +---------------+----------------+--------------+--> Rejected
//! ```
//!
//! No lock is held across the storage calls. The conflict check is an early
//! rejection only; the slot store's insert is the authority on overlaps.
//!
//! Persisting is a batch of independent writes. If it fails part-way the
//! caller retries with the same `meeting_id`: validation and conflict checks
//! run again (ignoring the meeting's own slots), missing slots are inserted
//! and existing ones are returned unchanged. A retry must keep the stored
//! start and end. Its payload reuses the stored creation time and the room id
//! derived from `meeting_id`, so every participant decrypts the same meeting.

use crate::availability::is_bookable;
use crate::config::Config;
use crate::crypto::{self, Envelope};
use crate::errors::BookingError;
use crate::models::{
    Account, MeetingParticipant, MeetingPayload, MeetingRequest, NewSlot, ParticipantRole,
    ParticipantStatus, ScheduledSlot, SlotWithEnvelope,
};
use crate::observability::metrics;
use crate::repositories::{AccountDirectory, ContentStore, SlotStore};
use crate::services::load_preferences;
use chrono::{DateTime, Duration, Utc};
use ring::hmac;
use secrecy::SecretString;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Base62 alphabet for meeting room ids.
const BASE62_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of generated meeting room ids.
const ROOM_ID_LENGTH: usize = 12;

/// Tag bytes behind a room id (72 bits).
const ROOM_ID_TAG_BYTES: usize = 9;

/// Phase of a meeting allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationPhase {
    Validating,
    ConflictChecking,
    Encrypting,
    Persisting,
    Done,
    Rejected,
}

impl AllocationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationPhase::Validating => "validating",
            AllocationPhase::ConflictChecking => "conflict_checking",
            AllocationPhase::Encrypting => "encrypting",
            AllocationPhase::Persisting => "persisting",
            AllocationPhase::Done => "done",
            AllocationPhase::Rejected => "rejected",
        }
    }
}

/// Allocator settings taken from the service configuration.
#[derive(Debug, Clone)]
pub struct AllocatorSettings {
    /// Base URL the generated room id is appended to.
    pub meeting_url_base: String,
    /// Require owners' published availability to accept the request.
    pub enforce_owner_availability: bool,
    /// Key room ids are derived under.
    pub room_id_key: hmac::Key,
}

impl From<&Config> for AllocatorSettings {
    fn from(config: &Config) -> Self {
        Self {
            meeting_url_base: config.meeting_url_base.clone(),
            enforce_owner_availability: config.enforce_owner_availability,
            room_id_key: config.room_id_key.clone(),
        }
    }
}

/// A request participant resolved to its account.
struct ResolvedParticipant {
    account: Account,
    role: ParticipantRole,
    name: Option<String>,
}

/// Orchestrates meeting creation over the account directory, content store
/// and slot store.
#[derive(Clone)]
pub struct SlotAllocator {
    accounts: Arc<dyn AccountDirectory>,
    content: Arc<dyn ContentStore>,
    slots: Arc<dyn SlotStore>,
    settings: AllocatorSettings,
}

impl SlotAllocator {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        content: Arc<dyn ContentStore>,
        slots: Arc<dyn SlotStore>,
        settings: AllocatorSettings,
    ) -> Self {
        Self {
            accounts,
            content,
            slots,
            settings,
        }
    }

    /// Create a meeting, returning the scheduler's slot.
    pub async fn create_meeting(
        &self,
        request: MeetingRequest,
    ) -> Result<ScheduledSlot, BookingError> {
        self.create_meeting_at(request, Utc::now()).await
    }

    /// Create a meeting with `now` as the reference instant for notice
    /// periods and the payload's creation timestamp.
    #[instrument(
        skip_all,
        name = "booking.allocator.create_meeting",
        fields(meeting_id = tracing::field::Empty, participant_count = request.participants.len())
    )]
    pub async fn create_meeting_at(
        &self,
        request: MeetingRequest,
        now: DateTime<Utc>,
    ) -> Result<ScheduledSlot, BookingError> {
        let started = Instant::now();
        let meeting_id = request.meeting_id.unwrap_or_else(Uuid::new_v4);
        tracing::Span::current().record("meeting_id", tracing::field::display(meeting_id));

        let mut phase = AllocationPhase::Validating;
        let result = self.allocate(meeting_id, &request, now, &mut phase).await;

        match &result {
            Ok(slot) => {
                metrics::record_meeting_creation("success", phase.as_str(), started.elapsed());
                tracing::info!(
                    target: "booking.services.allocator",
                    meeting_id = %meeting_id,
                    slot_id = %slot.id,
                    phase = phase.as_str(),
                    "Meeting created"
                );
            }
            Err(e) => {
                metrics::record_meeting_creation("error", phase.as_str(), started.elapsed());
                tracing::warn!(
                    target: "booking.services.allocator",
                    meeting_id = %meeting_id,
                    phase = AllocationPhase::Rejected.as_str(),
                    failed_phase = phase.as_str(),
                    error_code = e.code(),
                    "Meeting creation rejected"
                );
            }
        }

        result
    }

    async fn allocate(
        &self,
        meeting_id: Uuid,
        request: &MeetingRequest,
        now: DateTime<Utc>,
        phase: &mut AllocationPhase,
    ) -> Result<ScheduledSlot, BookingError> {
        *phase = AllocationPhase::Validating;
        let participants = self.validate(request).await?;

        *phase = AllocationPhase::ConflictChecking;
        let created_at = self.meeting_created_at(meeting_id, request, now).await?;
        self.check_conflicts(meeting_id, request, &participants, now).await?;

        *phase = AllocationPhase::Encrypting;
        let payload = self.build_payload(meeting_id, request, &participants, created_at)?;
        let plaintext = serde_json::to_vec(&payload).map_err(|e| {
            tracing::error!(target: "booking.services.allocator", error = %e, "Failed to serialize meeting payload");
            BookingError::Internal
        })?;
        let envelopes = participants
            .iter()
            .map(|p| crypto::encrypt_for(&p.account.public_key, &plaintext))
            .collect::<Result<Vec<_>, _>>()?;

        *phase = AllocationPhase::Persisting;
        let mut confirmation = None;
        for (participant, envelope) in participants.iter().zip(envelopes) {
            let bytes = serde_json::to_vec(&envelope).map_err(|e| {
                tracing::error!(target: "booking.services.allocator", error = %e, "Failed to serialize envelope");
                BookingError::Internal
            })?;
            let address = self.content.put(&bytes).await?;

            let slot = self
                .slots
                .insert(NewSlot {
                    meeting_id,
                    owner_public_key: participant.account.public_key.clone(),
                    role: participant.role,
                    start: request.start,
                    end: request.end,
                    content_address: address.clone(),
                    created_at,
                })
                .await?;

            if participant.role == ParticipantRole::Scheduler {
                confirmation = Some((slot, envelope, address));
            }
        }

        let (slot, envelope, address) = confirmation.ok_or(BookingError::Internal)?;

        // A retried meeting keeps the slot (and envelope) stored first time.
        let envelope = if slot.content_address == address {
            envelope
        } else {
            self.load_envelope(&slot.content_address).await?
        };

        *phase = AllocationPhase::Done;

        Ok(ScheduledSlot {
            id: slot.id,
            meeting_id: slot.meeting_id,
            start: slot.start,
            end: slot.end,
            owner_public_key: slot.owner_public_key,
            envelope,
            content_address: slot.content_address,
        })
    }

    async fn validate(
        &self,
        request: &MeetingRequest,
    ) -> Result<Vec<ResolvedParticipant>, BookingError> {
        if request.start >= request.end {
            return Err(BookingError::BadRequest(
                "Meeting start must be before its end".to_string(),
            ));
        }

        let schedulers = request
            .participants
            .iter()
            .filter(|p| p.role == ParticipantRole::Scheduler)
            .count();
        if schedulers != 1 {
            return Err(BookingError::BadRequest(format!(
                "A meeting needs exactly one scheduler, got {}",
                schedulers
            )));
        }

        if !request
            .participants
            .iter()
            .any(|p| p.role == ParticipantRole::Owner)
        {
            return Err(BookingError::BadRequest(
                "A meeting needs at least one owner".to_string(),
            ));
        }

        let mut resolved = Vec::with_capacity(request.participants.len());
        for participant in &request.participants {
            let account = self.accounts.resolve(&participant.identifier).await?;
            resolved.push(ResolvedParticipant {
                account,
                role: participant.role,
                name: participant.name.clone(),
            });
        }

        let scheduler_id = resolved
            .iter()
            .find(|p| p.role == ParticipantRole::Scheduler)
            .map(|p| p.account.id)
            .ok_or(BookingError::Internal)?;
        let owner_ids: Vec<Uuid> = resolved
            .iter()
            .filter(|p| p.role == ParticipantRole::Owner)
            .map(|p| p.account.id)
            .collect();
        if owner_ids.as_slice() == [scheduler_id] {
            return Err(BookingError::MeetingWithYourself);
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = resolved.iter().find(|p| !seen.insert(p.account.id)) {
            return Err(BookingError::BadRequest(format!(
                "Account '{}' is listed more than once",
                duplicate.account.address
            )));
        }

        Ok(resolved)
    }

    /// Creation time for the meeting's payload: `now` for a new meeting,
    /// the stored one when slots of `meeting_id` already exist.
    ///
    /// # Errors
    ///
    /// `BookingError::BadRequest` if the stored slots have other times.
    async fn meeting_created_at(
        &self,
        meeting_id: Uuid,
        request: &MeetingRequest,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, BookingError> {
        let existing = self.slots.list_for_meeting(meeting_id).await?;

        if existing
            .iter()
            .any(|slot| slot.start != request.start || slot.end != request.end)
        {
            return Err(BookingError::BadRequest(format!(
                "Meeting {} already exists with a different time",
                meeting_id
            )));
        }

        if !existing.is_empty() {
            tracing::debug!(
                target: "booking.services.allocator",
                meeting_id = %meeting_id,
                stored_slots = existing.len(),
                "Resuming partially persisted meeting"
            );
        }

        Ok(existing.iter().map(|slot| slot.created_at).min().unwrap_or(now))
    }

    async fn check_conflicts(
        &self,
        meeting_id: Uuid,
        request: &MeetingRequest,
        participants: &[ResolvedParticipant],
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        let owners = participants
            .iter()
            .filter(|p| p.role == ParticipantRole::Owner);

        for owner in owners {
            if self.settings.enforce_owner_availability
                && !self.owner_accepts(&owner.account, request, now).await?
            {
                metrics::record_slot_conflict("availability");
                tracing::debug!(
                    target: "booking.services.allocator",
                    meeting_id = %meeting_id,
                    account_id = %owner.account.id,
                    "Requested time is outside the owner's availability"
                );
                return Err(BookingError::TimeNotAvailable);
            }

            let busy = self
                .slots
                .find_overlapping(&owner.account.public_key, request.start, request.end)
                .await?;
            if busy.iter().any(|slot| slot.meeting_id != meeting_id) {
                metrics::record_slot_conflict("precheck");
                tracing::debug!(
                    target: "booking.services.allocator",
                    meeting_id = %meeting_id,
                    account_id = %owner.account.id,
                    "Owner already has an overlapping slot"
                );
                return Err(BookingError::TimeNotAvailable);
            }
        }

        Ok(())
    }

    /// Whether the owner's published preferences accept the request,
    /// including its length. An owner without (readable) preferences accepts
    /// nothing.
    async fn owner_accepts(
        &self,
        owner: &Account,
        request: &MeetingRequest,
        now: DateTime<Utc>,
    ) -> Result<bool, BookingError> {
        let Some(preferences) = load_preferences(self.content.as_ref(), owner).await? else {
            return Ok(false);
        };

        let duration = request.end - request.start;
        if !preferences.offers_duration(duration) {
            return Ok(false);
        }

        Ok(is_bookable(
            &preferences.availability,
            &preferences.blocked,
            duration,
            Duration::minutes(i64::from(preferences.min_notice_minutes)),
            request.start,
            now,
        ))
    }

    fn build_payload(
        &self,
        meeting_id: Uuid,
        request: &MeetingRequest,
        participants: &[ResolvedParticipant],
        created_at: DateTime<Utc>,
    ) -> Result<MeetingPayload, BookingError> {
        let participants = participants
            .iter()
            .map(|p| MeetingParticipant {
                address: p.account.address.clone(),
                public_key: p.account.public_key.clone(),
                role: p.role,
                status: ParticipantStatus::for_role(p.role),
                name: p.name.clone(),
            })
            .collect();

        Ok(MeetingPayload {
            meeting_id,
            title: request.title.clone(),
            content: request.content.clone(),
            meeting_url: format!(
                "{}/{}",
                self.settings.meeting_url_base,
                room_id(&self.settings.room_id_key, meeting_id)?
            ),
            participants,
            start: request.start,
            end: request.end,
            created_at,
            changes: Vec::new(),
        })
    }

    /// Delete every slot of a meeting. Envelopes stay in the content store.
    #[instrument(skip_all, name = "booking.allocator.cancel_meeting", fields(meeting_id = %meeting_id))]
    pub async fn cancel_meeting(&self, meeting_id: Uuid) -> Result<u64, BookingError> {
        let removed = self
            .slots
            .delete_meeting(meeting_id)
            .await
            .inspect_err(|_| metrics::record_meeting_cancellation("error"))?;

        if removed == 0 {
            metrics::record_meeting_cancellation("error");
            return Err(BookingError::NotFound(format!(
                "Meeting {} not found",
                meeting_id
            )));
        }

        metrics::record_meeting_cancellation("success");
        tracing::info!(
            target: "booking.services.allocator",
            meeting_id = %meeting_id,
            removed_slots = removed,
            "Meeting cancelled"
        );

        Ok(removed)
    }

    /// Fetch a slot with the envelope stored at its content address.
    #[instrument(skip_all, name = "booking.allocator.get_slot", fields(slot_id = %slot_id))]
    pub async fn get_slot(&self, slot_id: Uuid) -> Result<SlotWithEnvelope, BookingError> {
        let slot = self.slots.get(slot_id).await?;
        let envelope = self.load_envelope(&slot.content_address).await?;
        Ok(SlotWithEnvelope { slot, envelope })
    }

    /// Unseal `account`'s key with `signature` and decrypt `envelope`.
    ///
    /// # Errors
    ///
    /// `BookingError::Decryption` for a wrong signature, an envelope meant for
    /// someone else, or a plaintext that is not a meeting payload.
    #[instrument(skip_all, name = "booking.allocator.open_meeting")]
    pub fn open_meeting(
        &self,
        account: &Account,
        signature: &SecretString,
        envelope: &Envelope,
    ) -> Result<MeetingPayload, BookingError> {
        let private_key = crypto::unseal_private_key(&account.sealed_private_key, signature)?;
        let plaintext = crypto::decrypt_envelope(&private_key, envelope)?;
        serde_json::from_slice(&plaintext).map_err(|_| BookingError::Decryption)
    }

    async fn load_envelope(&self, address: &str) -> Result<Envelope, BookingError> {
        let bytes = self.content.get(address).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BookingError::Crypto(format!("Stored envelope is malformed: {}", e)))
    }
}

/// Base62 room id for `meeting_id`: a truncated HMAC-SHA256 tag under `key`.
///
/// The same meeting always gets the same room, and the room cannot be
/// guessed from the (public) meeting id without the key.
fn room_id(key: &hmac::Key, meeting_id: Uuid) -> Result<String, BookingError> {
    let tag = hmac::sign(key, meeting_id.as_bytes());

    let mut value: u128 = 0;
    for &b in tag.as_ref().iter().take(ROOM_ID_TAG_BYTES) {
        value = (value << 8) | u128::from(b);
    }

    let mut room_id = String::with_capacity(ROOM_ID_LENGTH);
    for _ in 0..ROOM_ID_LENGTH {
        let idx = usize::try_from(value % 62).map_err(|_| BookingError::Internal)?;
        let ch = BASE62_CHARS.get(idx).ok_or(BookingError::Internal)?;
        room_id.push(char::from(*ch));
        value /= 62;
    }

    Ok(room_id)
}
