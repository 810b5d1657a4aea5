use crate::availability::{BlockedInterval, WeeklyAvailability};
use crate::crypto::Envelope;
use crate::errors::BookingError;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account model (maps to accounts table).
///
/// `sealed_private_key` is ciphertext, but it is still key material and is
/// redacted from Debug output.
#[derive(Clone, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub address: String,
    pub alias: Option<String>,
    pub public_key: String,
    pub sealed_private_key: String,
    pub preferences_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("alias", &self.alias)
            .field("public_key", &self.public_key)
            .field("sealed_private_key", &"[REDACTED]")
            .field("preferences_address", &self.preferences_address)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Participant role within one meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Scheduler,
    Owner,
    Guest,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Scheduler => "scheduler",
            ParticipantRole::Owner => "owner",
            ParticipantRole::Guest => "guest",
        }
    }
}

impl FromStr for ParticipantRole {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduler" => Ok(ParticipantRole::Scheduler),
            "owner" => Ok(ParticipantRole::Owner),
            "guest" => Ok(ParticipantRole::Guest),
            other => Err(BookingError::BadRequest(format!(
                "Unknown participant role '{}'",
                other
            ))),
        }
    }
}

/// Participant attendance status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Accepted,
    Pending,
}

impl ParticipantStatus {
    /// Schedulers and owners are accepted on creation; guests are pending.
    pub fn for_role(role: ParticipantRole) -> Self {
        match role {
            ParticipantRole::Scheduler | ParticipantRole::Owner => ParticipantStatus::Accepted,
            ParticipantRole::Guest => ParticipantStatus::Pending,
        }
    }
}

/// Raw slot row (maps to slots table).
#[derive(Debug, Clone, FromRow)]
pub struct SlotRow {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub owner_public_key: String,
    pub role: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub content_address: String,
    pub created_at: DateTime<Utc>,
}

/// One participant's reservation for one meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub owner_public_key: String,
    pub role: ParticipantRole,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub content_address: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SlotRow> for Slot {
    type Error = BookingError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse()
            .map_err(|_| BookingError::Database(format!("Invalid slot role '{}'", row.role)))?;

        Ok(Slot {
            id: row.id,
            meeting_id: row.meeting_id,
            owner_public_key: row.owner_public_key,
            role,
            start: row.start_time,
            end: row.end_time,
            content_address: row.content_address,
            created_at: row.created_at,
        })
    }
}

/// Slot to be inserted by the allocator.
#[derive(Debug, Clone)]
pub struct NewSlot {
    pub meeting_id: Uuid,
    pub owner_public_key: String,
    pub role: ParticipantRole,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub content_address: String,
    /// Creation time of the meeting, shared by all of its slots.
    pub created_at: DateTime<Utc>,
}

/// Participant entry inside the encrypted meeting payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingParticipant {
    pub address: String,
    pub public_key: String,
    pub role: ParticipantRole,
    pub status: ParticipantStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Entry in a meeting's change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingChange {
    pub changed_at: DateTime<Utc>,
    pub changed_by: String,
    pub summary: String,
}

/// Canonical meeting data, identical across every participant's envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingPayload {
    pub meeting_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    pub meeting_url: String,
    pub participants: Vec<MeetingParticipant>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub changes: Vec<MeetingChange>,
}

/// Account preferences document, stored whole in the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub availability: WeeklyAvailability,
    #[serde(default)]
    pub blocked: Vec<BlockedInterval>,
    #[serde(default)]
    pub min_notice_minutes: u32,
    #[serde(default)]
    pub meeting_durations: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Preferences {
    pub fn validate(&self) -> Result<(), BookingError> {
        self.availability.validate()?;

        if self.blocked.iter().any(BlockedInterval::is_inverted) {
            return Err(BookingError::BadRequest(
                "Blocked interval ends before it starts".to_string(),
            ));
        }

        if self.meeting_durations.iter().any(|d| *d == 0) {
            return Err(BookingError::BadRequest(
                "Meeting durations must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether a meeting of `duration` may be booked. An empty
    /// `meeting_durations` list accepts any length.
    pub fn offers_duration(&self, duration: chrono::Duration) -> bool {
        if self.meeting_durations.is_empty() {
            return true;
        }
        if duration.num_seconds() % 60 != 0 {
            return false;
        }
        u32::try_from(duration.num_minutes())
            .is_ok_and(|minutes| self.meeting_durations.contains(&minutes))
    }
}

// ============================================================================
// Request / response types
// ============================================================================

/// One participant in a meeting request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantRequest {
    /// Address, alias or public key.
    pub identifier: String,
    pub role: ParticipantRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Request to create a meeting.
///
/// `meeting_id` may be chosen by the caller so that a failed attempt can be
/// retried without creating duplicate slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub participants: Vec<ParticipantRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
}

/// Confirmation returned to the scheduler after a successful booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledSlot {
    pub id: Uuid,
    pub meeting_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub owner_public_key: String,
    pub envelope: Envelope,
    pub content_address: String,
}

/// Slot together with the envelope stored at its content address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotWithEnvelope {
    pub slot: Slot,
    pub envelope: Envelope,
}

/// Onboarding request.
#[derive(Debug, Deserialize)]
pub struct OnboardRequest {
    pub address: String,
    pub signature: SecretString,
}

/// Alias change request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAliasRequest {
    pub alias: String,
}

/// Public view of an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            address: account.address.clone(),
            alias: account.alias.clone(),
            public_key: account.public_key.clone(),
            preferences_address: account.preferences_address.clone(),
            created_at: account.created_at,
        }
    }
}

/// Onboarding response. Carries the sealed key so the wallet holder can
/// unseal it client-side with the same signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardResponse {
    #[serde(flatten)]
    pub account: AccountResponse,
    pub sealed_private_key: String,
}

/// Preferences update response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesResponse {
    pub preferences_address: String,
}

/// Query for available start times.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub date: chrono::NaiveDate,
    pub duration_minutes: u32,
}

/// Available start times for one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub date: chrono::NaiveDate,
    pub duration_minutes: u32,
    pub starts: Vec<DateTime<Utc>>,
}

/// Query for busy slots.
#[derive(Debug, Clone, Deserialize)]
pub struct SlotRangeQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Busy slots of an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotsResponse {
    pub slots: Vec<Slot>,
}

/// Cancellation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelMeetingResponse {
    pub meeting_id: Uuid,
    pub removed_slots: u64,
}

/// Signature challenge response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}
