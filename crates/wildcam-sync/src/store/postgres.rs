//! PostgreSQL pull source store
//!
//! Queries are checked at runtime (`sqlx::query_as`) so the crate builds
//! without a live database. The schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;
use wildcam_common::types::{AuthConfig, NewPullSource, PullSource};

use super::PullSourceStore;
use crate::config::DatabaseConfig;
use crate::error::StoreError;

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, owner_user_id, target_location_id, base_url, auth_config,
           sync_cursor, last_sync_at, is_active, created_at, updated_at
    FROM pull_sources
"#;

#[derive(Debug, FromRow)]
struct PullSourceRow {
    id: Uuid,
    name: String,
    owner_user_id: String,
    target_location_id: Uuid,
    base_url: String,
    auth_config: serde_json::Value,
    sync_cursor: Option<String>,
    last_sync_at: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PullSourceRow> for PullSource {
    type Error = StoreError;

    fn try_from(row: PullSourceRow) -> Result<Self, Self::Error> {
        let auth_config: AuthConfig = serde_json::from_value(row.auth_config)
            .map_err(|source| StoreError::CorruptRecord { id: row.id, source })?;

        Ok(PullSource {
            id: row.id,
            name: row.name,
            owner_user_id: row.owner_user_id,
            target_location_id: row.target_location_id,
            base_url: row.base_url,
            auth_config,
            cursor: row.sync_cursor,
            last_sync_at: row.last_sync_at,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_sources(rows: Vec<PullSourceRow>) -> Result<Vec<PullSource>, StoreError> {
    rows.into_iter().map(PullSource::try_from).collect()
}

/// Store backed by a Postgres connection pool
#[derive(Clone)]
pub struct PgPullSourceStore {
    pool: PgPool,
}

impl PgPullSourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool using the database section of the engine configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await?;

        info!("Database connection pool established");
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to run migrations: {}", e)))?;

        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pull_sources WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

fn require_row(id: Uuid, rows_affected: u64) -> Result<(), StoreError> {
    if rows_affected == 0 {
        Err(StoreError::NotFound(id))
    } else {
        Ok(())
    }
}

#[async_trait]
impl PullSourceStore for PgPullSourceStore {
    async fn create(&self, source: NewPullSource) -> Result<PullSource, StoreError> {
        let record = source.into_source(Utc::now());
        let auth_json = serde_json::to_value(&record.auth_config)
            .map_err(|source| StoreError::CorruptRecord { id: record.id, source })?;

        let result = sqlx::query(
            r#"
            INSERT INTO pull_sources
                (id, name, owner_user_id, target_location_id, base_url, auth_config,
                 is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.owner_user_id)
        .bind(record.target_location_id)
        .bind(&record.base_url)
        .bind(auth_json)
        .bind(record.is_active)
        .bind(record.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(source_id = %record.id, name = %record.name, "Created pull source");
                Ok(record)
            },
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateName(record.name))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_id(&self, id: Uuid) -> Result<PullSource, StoreError> {
        let query = format!("{} WHERE id = $1", SELECT_COLUMNS);
        let row: Option<PullSourceRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or(StoreError::NotFound(id))?.try_into()
    }

    async fn get_all_active(&self) -> Result<Vec<PullSource>, StoreError> {
        let query = format!("{} WHERE is_active ORDER BY name", SELECT_COLUMNS);
        let rows: Vec<PullSourceRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;
        into_sources(rows)
    }

    async fn list_active_for_owner(
        &self,
        owner_user_id: &str,
    ) -> Result<Vec<PullSource>, StoreError> {
        let query = format!(
            "{} WHERE is_active AND owner_user_id = $1 ORDER BY name",
            SELECT_COLUMNS
        );
        let rows: Vec<PullSourceRow> = sqlx::query_as(&query)
            .bind(owner_user_id)
            .fetch_all(&self.pool)
            .await?;
        into_sources(rows)
    }

    async fn update_cursor(
        &self,
        id: Uuid,
        filename: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE pull_sources
            SET sync_cursor = $2, last_sync_at = $3, updated_at = NOW()
            WHERE id = $1
              AND (sync_cursor IS NULL OR sync_cursor < ($2 COLLATE "C"))
            "#,
        )
        .bind(id)
        .bind(filename)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        if self.exists(id).await? {
            debug!(source_id = %id, filename, "Cursor write ignored, would not advance");
            Ok(false)
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    async fn record_sync(&self, id: Uuid, timestamp: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE pull_sources SET last_sync_at = $2 WHERE id = $1")
            .bind(id)
            .bind(timestamp)
            .execute(&self.pool)
            .await?;
        require_row(id, result.rows_affected())
    }

    async fn update_active_status(&self, id: Uuid, is_active: bool) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE pull_sources SET is_active = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(is_active)
        .execute(&self.pool)
        .await?;
        require_row(id, result.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM pull_sources WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        require_row(id, result.rows_affected())
    }
}
