//! Account onboarding, preferences and availability queries.

use crate::availability::{bookable_starts, BlockedInterval};
use crate::crypto::{self, Identity};
use crate::errors::BookingError;
use crate::models::{Account, Preferences, Slot};
use crate::repositories::{AccountDirectory, ContentStore, SlotStore};
use crate::services::load_preferences;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::instrument;

/// Granularity of the start times offered by [`AccountService::available_starts`].
pub const AVAILABILITY_STEP_MINUTES: i64 = 15;

/// Longest identifier (address or alias) accepted.
const MAX_IDENTIFIER_LENGTH: usize = 255;

#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountDirectory>,
    content: Arc<dyn ContentStore>,
    slots: Arc<dyn SlotStore>,
}

fn validate_identifier(kind: &str, value: &str) -> Result<(), BookingError> {
    if value.is_empty() {
        return Err(BookingError::BadRequest(format!("{} must not be empty", kind)));
    }
    if value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(BookingError::BadRequest(format!(
            "{} must be at most {} characters",
            kind, MAX_IDENTIFIER_LENGTH
        )));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(BookingError::BadRequest(format!(
            "{} must not contain whitespace",
            kind
        )));
    }
    Ok(())
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        content: Arc<dyn ContentStore>,
        slots: Arc<dyn SlotStore>,
    ) -> Self {
        Self {
            accounts,
            content,
            slots,
        }
    }

    /// Create an account for `address`: generate its keypair, seal the
    /// private key under `signature` and register it.
    ///
    /// The plaintext private key is dropped before the directory write.
    #[instrument(skip_all, name = "booking.accounts.onboard")]
    pub async fn onboard(
        &self,
        address: &str,
        signature: &SecretString,
    ) -> Result<Account, BookingError> {
        let address = address.trim();
        validate_identifier("Address", address)?;

        let Identity {
            public_key,
            private_key,
        } = crypto::create_identity()?;
        let sealed = crypto::seal_private_key(&private_key, signature)?;
        drop(private_key);

        let account = self.accounts.create(address, &sealed, &public_key).await?;

        tracing::info!(
            target: "booking.services.accounts",
            account_id = %account.id,
            "Account onboarded"
        );

        Ok(account)
    }

    pub async fn get_account(&self, identifier: &str) -> Result<Account, BookingError> {
        self.accounts.resolve(identifier).await
    }

    #[instrument(skip_all, name = "booking.accounts.set_alias")]
    pub async fn set_alias(&self, identifier: &str, alias: &str) -> Result<Account, BookingError> {
        let alias = alias.trim();
        validate_identifier("Alias", alias)?;

        let account = self.accounts.resolve(identifier).await?;
        self.accounts.set_alias(account.id, alias).await
    }

    /// Replace an account's preferences.
    ///
    /// The document is written as new content and the account is repointed
    /// at it; the previous document stays where it was. Returns the new
    /// content address.
    #[instrument(skip_all, name = "booking.accounts.update_preferences")]
    pub async fn update_preferences(
        &self,
        identifier: &str,
        preferences: &Preferences,
    ) -> Result<String, BookingError> {
        preferences.validate()?;
        let account = self.accounts.resolve(identifier).await?;

        let bytes = serde_json::to_vec(preferences).map_err(|e| {
            tracing::error!(target: "booking.services.accounts", error = %e, "Failed to serialize preferences");
            BookingError::Internal
        })?;
        let address = self.content.put(&bytes).await?;
        self.accounts
            .update_preferences_pointer(account.id, &address)
            .await?;

        tracing::info!(
            target: "booking.services.accounts",
            account_id = %account.id,
            preferences_address = %address,
            "Preferences updated"
        );

        Ok(address)
    }

    pub async fn load_preferences(
        &self,
        account: &Account,
    ) -> Result<Option<Preferences>, BookingError> {
        load_preferences(self.content.as_ref(), account).await
    }

    /// Bookable start times for `identifier` on local `date`.
    pub async fn available_starts(
        &self,
        identifier: &str,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> Result<Vec<DateTime<Utc>>, BookingError> {
        self.available_starts_at(identifier, date, duration_minutes, Utc::now())
            .await
    }

    /// [`Self::available_starts`] with an explicit reference instant.
    ///
    /// The account's existing slots around `date`, whatever their role, are
    /// treated as blocked intervals. An account without preferences has no
    /// starts.
    #[instrument(skip_all, name = "booking.accounts.available_starts", fields(date = %date))]
    pub async fn available_starts_at(
        &self,
        identifier: &str,
        date: NaiveDate,
        duration_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, BookingError> {
        if duration_minutes == 0 {
            return Err(BookingError::BadRequest(
                "Duration must be positive".to_string(),
            ));
        }

        let account = self.accounts.resolve(identifier).await?;
        let Some(preferences) = self.load_preferences(&account).await? else {
            return Ok(Vec::new());
        };

        let duration = Duration::minutes(i64::from(duration_minutes));
        if !preferences.offers_duration(duration) {
            return Err(BookingError::BadRequest(format!(
                "A {} minute meeting is not offered",
                duration_minutes
            )));
        }

        // Any timezone's local date lies within one day either side of UTC.
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .ok_or(BookingError::Internal)?;
        let (Some(window_start), Some(window_end)) = (
            midnight.checked_sub_signed(Duration::days(1)),
            midnight.checked_add_signed(Duration::days(2)),
        ) else {
            return Err(BookingError::BadRequest(format!("Date {} is out of range", date)));
        };

        let busy = self
            .slots
            .find_overlapping(&account.public_key, window_start, window_end)
            .await?;

        let mut blocked = preferences.blocked.clone();
        blocked.extend(busy.iter().map(|s| BlockedInterval::new(s.start, s.end)));

        Ok(bookable_starts(
            &preferences.availability,
            &blocked,
            date,
            duration,
            Duration::minutes(i64::from(preferences.min_notice_minutes)),
            now,
            Duration::minutes(AVAILABILITY_STEP_MINUTES),
        ))
    }

    /// Slots of any role held by `identifier` overlapping `[from, to)`.
    #[instrument(skip_all, name = "booking.accounts.busy_slots")]
    pub async fn busy_slots(
        &self,
        identifier: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Slot>, BookingError> {
        if from >= to {
            return Err(BookingError::BadRequest(
                "'from' must be before 'to'".to_string(),
            ));
        }

        let account = self.accounts.resolve(identifier).await?;
        self.slots.list_for_owner(&account.public_key, from, to).await
    }
}
