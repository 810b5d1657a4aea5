//! Content-addressed blob repository.

use crate::crypto::content_address;
use crate::errors::BookingError;
use crate::observability::metrics;
use crate::repositories::ContentStore;
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;

/// PostgreSQL-backed [`ContentStore`].
///
/// Rows are only ever inserted; an identical blob maps to the same primary
/// key and is not stored twice.
#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    #[instrument(skip_all, name = "booking.repo.put_content", fields(size = bytes.len()))]
    async fn put(&self, bytes: &[u8]) -> Result<String, BookingError> {
        let start = Instant::now();
        let address = content_address(bytes);

        sqlx::query(
            r#"
            INSERT INTO content_blobs (address, bytes)
            VALUES ($1, $2)
            ON CONFLICT (address) DO NOTHING
            "#,
        )
        .bind(&address)
        .bind(bytes)
        .execute(&self.pool)
        .await
        .inspect_err(|_| metrics::record_db_query("put_content", "error", start.elapsed()))?;

        metrics::record_db_query("put_content", "success", start.elapsed());

        Ok(address)
    }

    #[instrument(skip_all, name = "booking.repo.get_content")]
    async fn get(&self, address: &str) -> Result<Vec<u8>, BookingError> {
        let start = Instant::now();

        let bytes: Option<Vec<u8>> =
            sqlx::query_scalar(r#"SELECT bytes FROM content_blobs WHERE address = $1"#)
                .bind(address)
                .fetch_optional(&self.pool)
                .await
                .inspect_err(|_| {
                    metrics::record_db_query("get_content", "error", start.elapsed())
                })?;

        metrics::record_db_query("get_content", "success", start.elapsed());

        bytes.ok_or_else(|| BookingError::NotFound(format!("No content at '{}'", address)))
    }
}
