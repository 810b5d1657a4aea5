//! Slots repository.
//!
//! The `slots_no_owner_overlap` exclusion constraint is the authority on
//! double booking: two Owner-role rows of the same public key can never
//! overlap, whatever the callers checked beforehand. Guests may be double
//! booked, so the constraint leaves non-Owner rows alone; an Owner landing on
//! the account's own Scheduler or Guest time is refused by the allocator's
//! pre-check against [`SlotStore::find_overlapping`], which sees every role.

use crate::errors::BookingError;
use crate::models::{NewSlot, Slot, SlotRow};
use crate::observability::metrics;
use crate::repositories::SlotStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// PostgreSQL-backed [`SlotStore`].
#[derive(Clone)]
pub struct PgSlotStore {
    pool: PgPool,
}

impl PgSlotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_slots(rows: Vec<SlotRow>) -> Result<Vec<Slot>, BookingError> {
    rows.into_iter().map(Slot::try_from).collect()
}

#[async_trait]
impl SlotStore for PgSlotStore {
    #[instrument(skip_all, name = "booking.repo.find_overlapping")]
    async fn find_overlapping(
        &self,
        owner_public_key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Slot>, BookingError> {
        let query_start = Instant::now();

        let rows = sqlx::query_as::<_, SlotRow>(
            r#"
            SELECT id, meeting_id, owner_public_key, role, start_time, end_time,
                   content_address, created_at
            FROM slots
            WHERE owner_public_key = $1
              AND start_time < $3
              AND end_time > $2
            ORDER BY start_time
            "#,
        )
        .bind(owner_public_key)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|_| {
            metrics::record_db_query("find_overlapping", "error", query_start.elapsed())
        })?;

        metrics::record_db_query("find_overlapping", "success", query_start.elapsed());

        into_slots(rows)
    }

    #[instrument(
        skip_all,
        name = "booking.repo.insert_slot",
        fields(meeting_id = %slot.meeting_id, role = slot.role.as_str())
    )]
    async fn insert(&self, slot: NewSlot) -> Result<Slot, BookingError> {
        let start = Instant::now();

        // ON CONFLICT only arbitrates the (meeting_id, owner_public_key) key;
        // an overlap still raises the exclusion violation.
        let inserted = sqlx::query_as::<_, SlotRow>(
            r#"
            INSERT INTO slots (
                meeting_id, owner_public_key, role, start_time, end_time, content_address,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (meeting_id, owner_public_key) DO NOTHING
            RETURNING id, meeting_id, owner_public_key, role, start_time, end_time,
                      content_address, created_at
            "#,
        )
        .bind(slot.meeting_id)
        .bind(&slot.owner_public_key)
        .bind(slot.role.as_str())
        .bind(slot.start)
        .bind(slot.end)
        .bind(&slot.content_address)
        .bind(slot.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            metrics::record_db_query("insert_slot", "error", start.elapsed());
            let err = BookingError::from(e);
            if matches!(err, BookingError::TimeNotAvailable) {
                metrics::record_slot_conflict("storage");
            }
            err
        })?;

        let row = match inserted {
            Some(row) => row,
            None => {
                tracing::debug!(
                    target: "booking.repo.slots",
                    meeting_id = %slot.meeting_id,
                    "Slot already exists for meeting, returning stored slot"
                );
                sqlx::query_as::<_, SlotRow>(
                    r#"
                    SELECT id, meeting_id, owner_public_key, role, start_time, end_time,
                           content_address, created_at
                    FROM slots
                    WHERE meeting_id = $1 AND owner_public_key = $2
                    "#,
                )
                .bind(slot.meeting_id)
                .bind(&slot.owner_public_key)
                .fetch_one(&self.pool)
                .await
                .inspect_err(|_| {
                    metrics::record_db_query("insert_slot", "error", start.elapsed())
                })?
            }
        };

        metrics::record_db_query("insert_slot", "success", start.elapsed());

        Slot::try_from(row)
    }

    #[instrument(skip_all, name = "booking.repo.get_slot", fields(slot_id = %slot_id))]
    async fn get(&self, slot_id: Uuid) -> Result<Slot, BookingError> {
        let start = Instant::now();

        let row = sqlx::query_as::<_, SlotRow>(
            r#"
            SELECT id, meeting_id, owner_public_key, role, start_time, end_time,
                   content_address, created_at
            FROM slots
            WHERE id = $1
            "#,
        )
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|_| metrics::record_db_query("get_slot", "error", start.elapsed()))?;

        metrics::record_db_query("get_slot", "success", start.elapsed());

        row.ok_or_else(|| BookingError::NotFound(format!("Slot {} not found", slot_id)))
            .and_then(Slot::try_from)
    }

    #[instrument(skip_all, name = "booking.repo.list_for_owner")]
    async fn list_for_owner(
        &self,
        owner_public_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Slot>, BookingError> {
        let start = Instant::now();

        let rows = sqlx::query_as::<_, SlotRow>(
            r#"
            SELECT id, meeting_id, owner_public_key, role, start_time, end_time,
                   content_address, created_at
            FROM slots
            WHERE owner_public_key = $1
              AND start_time < $3
              AND end_time > $2
            ORDER BY start_time
            "#,
        )
        .bind(owner_public_key)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|_| metrics::record_db_query("list_for_owner", "error", start.elapsed()))?;

        metrics::record_db_query("list_for_owner", "success", start.elapsed());

        into_slots(rows)
    }

    #[instrument(skip_all, name = "booking.repo.list_for_meeting", fields(meeting_id = %meeting_id))]
    async fn list_for_meeting(&self, meeting_id: Uuid) -> Result<Vec<Slot>, BookingError> {
        let start = Instant::now();

        let rows = sqlx::query_as::<_, SlotRow>(
            r#"
            SELECT id, meeting_id, owner_public_key, role, start_time, end_time,
                   content_address, created_at
            FROM slots
            WHERE meeting_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(meeting_id)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|_| metrics::record_db_query("list_for_meeting", "error", start.elapsed()))?;

        metrics::record_db_query("list_for_meeting", "success", start.elapsed());

        into_slots(rows)
    }

    #[instrument(skip_all, name = "booking.repo.delete_meeting", fields(meeting_id = %meeting_id))]
    async fn delete_meeting(&self, meeting_id: Uuid) -> Result<u64, BookingError> {
        let start = Instant::now();

        let result = sqlx::query(r#"DELETE FROM slots WHERE meeting_id = $1"#)
            .bind(meeting_id)
            .execute(&self.pool)
            .await
            .inspect_err(|_| {
                metrics::record_db_query("delete_meeting", "error", start.elapsed())
            })?;

        metrics::record_db_query("delete_meeting", "success", start.elapsed());

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), BookingError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
