//! Deterministic test data: signatures, preferences, instants and config.

use booking_service::availability::{DayAvailability, TimeRange, WeeklyAvailability};
use booking_service::config::Config;
use booking_service::models::{MeetingRequest, ParticipantRequest, ParticipantRole, Preferences};
use chrono::{DateTime, TimeZone, Utc, Weekday};
use secrecy::SecretString;
use std::collections::HashMap;
use uuid::Uuid;

/// Meeting URL base used by test allocators.
pub const TEST_MEETING_URL_BASE: &str = "https://meet.example.test";

/// Fixed "now" for tests: Tuesday 2030-01-01 00:00 UTC.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
}

/// An instant on Monday 2030-01-07 (UTC), six days after [`test_now`].
pub fn monday_at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 7, hour, minute, 0).unwrap()
}

/// The wallet signature the tests use for `address`.
///
/// Real signatures are produced by the wallet over the challenge message;
/// any stable per-address secret exercises the same sealing path.
pub fn signature_for(address: &str) -> SecretString {
    SecretString::from(format!("0xsig-{}", address.to_lowercase()))
}

/// Preferences open on a single weekday between `start` and `end`
/// ("HH:MM") in `timezone`, with no notice period.
pub fn weekday_preferences(
    timezone: &str,
    weekday: Weekday,
    start: &str,
    end: &str,
) -> Preferences {
    Preferences {
        availability: WeeklyAvailability {
            timezone: timezone.to_string(),
            days: vec![DayAvailability {
                weekday,
                ranges: vec![TimeRange::parse(start, end).unwrap()],
            }],
        },
        blocked: Vec::new(),
        min_notice_minutes: 0,
        meeting_durations: Vec::new(),
        description: None,
    }
}

/// Mondays 09:00-17:00 UTC.
pub fn monday_office_hours() -> Preferences {
    weekday_preferences("UTC", Weekday::Mon, "09:00", "17:00")
}

/// Room id key used by [`test_config`].
pub const TEST_ROOM_ID_SECRET: &str = "test-room-id-secret";

/// Minimal config for building an `AppState` in tests.
///
/// The database URL is never dialled; tests use in-memory stores.
pub fn test_config(enforce_owner_availability: bool) -> Config {
    let vars = HashMap::from([
        (
            "DATABASE_URL".to_string(),
            "postgresql://localhost/booking_test".to_string(),
        ),
        (
            "MEETING_URL_BASE".to_string(),
            TEST_MEETING_URL_BASE.to_string(),
        ),
        (
            "ENFORCE_OWNER_AVAILABILITY".to_string(),
            enforce_owner_availability.to_string(),
        ),
        (
            "ROOM_ID_SECRET".to_string(),
            TEST_ROOM_ID_SECRET.to_string(),
        ),
    ]);
    Config::from_vars(&vars).unwrap()
}

/// Builder for meeting requests.
#[derive(Debug, Clone)]
pub struct MeetingRequestBuilder {
    request: MeetingRequest,
}

impl MeetingRequestBuilder {
    /// A request for `[start, end)` with no participants.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            request: MeetingRequest {
                meeting_id: None,
                start,
                end,
                participants: Vec::new(),
                title: None,
                content: String::new(),
            },
        }
    }

    pub fn meeting_id(mut self, meeting_id: Uuid) -> Self {
        self.request.meeting_id = Some(meeting_id);
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.request.title = Some(title.to_string());
        self
    }

    pub fn content(mut self, content: &str) -> Self {
        self.request.content = content.to_string();
        self
    }

    pub fn participant(mut self, identifier: &str, role: ParticipantRole) -> Self {
        self.request.participants.push(ParticipantRequest {
            identifier: identifier.to_string(),
            role,
            name: None,
        });
        self
    }

    pub fn scheduler(self, identifier: &str) -> Self {
        self.participant(identifier, ParticipantRole::Scheduler)
    }

    pub fn owner(self, identifier: &str) -> Self {
        self.participant(identifier, ParticipantRole::Owner)
    }

    pub fn guest(self, identifier: &str) -> Self {
        self.participant(identifier, ParticipantRole::Guest)
    }

    pub fn build(self) -> MeetingRequest {
        self.request
    }
}
