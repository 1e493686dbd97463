//! Suppression list storage for PostgreSQL.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tokio::sync::OnceCell;

use crate::models::{SuppressionRecord, USER_REQUEST};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS suppressions (
        email      TEXT PRIMARY KEY,
        source     TEXT NOT NULL,
        reason     TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

/// Failure writing to the suppression list.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No connection could be obtained (pool timeout, refused, closed).
    #[error("suppression store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
    /// A connection was obtained but the statement failed.
    #[error("suppression write failed: {0}")]
    WriteFailed(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Unavailable(err),
            other => StoreError::WriteFailed(other),
        }
    }
}

/// Durable deny-list of addresses that opted out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SuppressionStore: Send + Sync {
    /// Insert or refresh the suppression for a normalized address.
    async fn record(&self, email: &str, source: &str) -> Result<(), StoreError>;

    /// Whether the backend can currently be reached.
    async fn health_check(&self) -> Result<bool, StoreError>;

    /// Short backend name for diagnostics.
    fn backend(&self) -> &'static str;
}

/// PostgreSQL implementation of SuppressionStore.
#[derive(Clone)]
pub struct PgSuppressionStore {
    pool: Pool<Postgres>,
    schema: std::sync::Arc<OnceCell<()>>,
}

impl PgSuppressionStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            schema: std::sync::Arc::new(OnceCell::new()),
        }
    }

    /// Create the table if it does not exist yet. Runs at most once per
    /// process after the first success.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
                Ok::<_, StoreError>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SuppressionStore for PgSuppressionStore {
    async fn record(&self, email: &str, source: &str) -> Result<(), StoreError> {
        self.ensure_schema().await?;

        // Single statement so concurrent requests for one address cannot race.
        let row = sqlx::query_as::<_, SuppressionRecord>(
            r#"
            INSERT INTO suppressions (email, source, reason, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (email)
            DO UPDATE SET source = EXCLUDED.source, reason = EXCLUDED.reason, updated_at = now()
            RETURNING email, source, reason, updated_at
            "#,
        )
        .bind(email)
        .bind(source)
        .bind(USER_REQUEST)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            source = %row.source,
            reason = %row.reason,
            updated_at = %row.updated_at,
            "suppression upserted"
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        let result: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(result == 1)
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// Used when no database is configured. Every write succeeds without
/// persisting anything.
#[derive(Clone, Default)]
pub struct DisabledSuppressionStore;

#[async_trait]
impl SuppressionStore for DisabledSuppressionStore {
    async fn record(&self, _email: &str, source: &str) -> Result<(), StoreError> {
        tracing::debug!(source, "no suppression store configured, skipping write");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "disabled"
    }
}
