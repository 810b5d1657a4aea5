//! Accounts repository.

use crate::errors::BookingError;
use crate::models::Account;
use crate::observability::metrics;
use crate::repositories::AccountDirectory;
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// PostgreSQL-backed [`AccountDirectory`].
#[derive(Clone)]
pub struct PgAccountDirectory {
    pool: PgPool,
}

impl PgAccountDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    #[instrument(skip_all, name = "booking.repo.resolve_account")]
    async fn resolve(&self, identifier: &str) -> Result<Account, BookingError> {
        let start = Instant::now();

        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, address, alias, public_key, sealed_private_key,
                   preferences_address, created_at
            FROM accounts
            WHERE address = lower($1) OR alias = lower($1) OR public_key = lower($1)
            ORDER BY CASE
                WHEN address = lower($1) THEN 0
                WHEN alias = lower($1) THEN 1
                ELSE 2
            END
            LIMIT 1
            "#,
        )
        .bind(identifier.trim())
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|_| metrics::record_db_query("resolve_account", "error", start.elapsed()))?;

        metrics::record_db_query("resolve_account", "success", start.elapsed());

        account.ok_or_else(|| BookingError::AccountNotFound(identifier.to_string()))
    }

    #[instrument(skip_all, name = "booking.repo.create_account")]
    async fn create(
        &self,
        address: &str,
        sealed_private_key: &str,
        public_key: &str,
    ) -> Result<Account, BookingError> {
        let start = Instant::now();

        let result = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (address, public_key, sealed_private_key)
            VALUES (lower($1), lower($2), $3)
            RETURNING id, address, alias, public_key, sealed_private_key,
                      preferences_address, created_at
            "#,
        )
        .bind(address.trim())
        .bind(public_key)
        .bind(sealed_private_key)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(account) => {
                metrics::record_db_query("create_account", "success", start.elapsed());
                Ok(account)
            }
            Err(e) => {
                metrics::record_db_query("create_account", "error", start.elapsed());
                match BookingError::from(e) {
                    BookingError::DuplicateAccount(_) => {
                        Err(BookingError::DuplicateAccount(address.to_lowercase()))
                    }
                    other => Err(other),
                }
            }
        }
    }

    #[instrument(skip_all, name = "booking.repo.update_preferences_pointer", fields(account_id = %account_id))]
    async fn update_preferences_pointer(
        &self,
        account_id: Uuid,
        preferences_address: &str,
    ) -> Result<Account, BookingError> {
        let start = Instant::now();

        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET preferences_address = $2
            WHERE id = $1
            RETURNING id, address, alias, public_key, sealed_private_key,
                      preferences_address, created_at
            "#,
        )
        .bind(account_id)
        .bind(preferences_address)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|_| {
            metrics::record_db_query("update_preferences_pointer", "error", start.elapsed())
        })?;

        metrics::record_db_query("update_preferences_pointer", "success", start.elapsed());

        account.ok_or_else(|| BookingError::AccountNotFound(account_id.to_string()))
    }

    #[instrument(skip_all, name = "booking.repo.set_alias", fields(account_id = %account_id))]
    async fn set_alias(&self, account_id: Uuid, alias: &str) -> Result<Account, BookingError> {
        let start = Instant::now();

        let result = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET alias = lower($2)
            WHERE id = $1
            RETURNING id, address, alias, public_key, sealed_private_key,
                      preferences_address, created_at
            "#,
        )
        .bind(account_id)
        .bind(alias.trim())
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(account) => {
                metrics::record_db_query("set_alias", "success", start.elapsed());
                account.ok_or_else(|| BookingError::AccountNotFound(account_id.to_string()))
            }
            Err(e) => {
                metrics::record_db_query("set_alias", "error", start.elapsed());
                match BookingError::from(e) {
                    BookingError::DuplicateAccount(_) => {
                        Err(BookingError::DuplicateAccount(alias.to_lowercase()))
                    }
                    other => Err(other),
                }
            }
        }
    }
}
