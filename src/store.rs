use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;

use crate::models::{
    NewWatchHistoryItem, Session, WatchHistoryData, WatchHistoryFilter, WatchHistoryItem,
    WatchHistoryKey,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Watch history item {0} not found")]
    NotFound(String),
}

#[async_trait]
pub trait WatchHistoryStore: Send + Sync {
    /// Looks up the row for a composite key. Null season/episode ids match null columns.
    async fn find_by_key(&self, key: &WatchHistoryKey) -> Result<Option<WatchHistoryItem>, StoreError>;

    async fn create(&self, item: &NewWatchHistoryItem) -> Result<WatchHistoryItem, StoreError>;

    /// Overwrites the upsert columns of an existing row, leaving its id and key untouched.
    async fn update(&self, id: &str, data: &WatchHistoryData) -> Result<WatchHistoryItem, StoreError>;

    /// Matching rows, most recently watched first.
    async fn find_many(&self, filter: &WatchHistoryFilter) -> Result<Vec<WatchHistoryItem>, StoreError>;

    /// Returns the number of rows removed.
    async fn delete_many(&self, filter: &WatchHistoryFilter) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_session(&self, id: &str) -> Result<Option<Session>, StoreError>;
}

// numeric columns are read back as text to keep their exact decimal form.
const WATCH_HISTORY_COLUMNS: &str = "id, user_id, tmdb_id, season_id, episode_id, \
     season_number, episode_number, meta, duration::text AS duration, \
     watched::text AS watched, watched_at, completed, created_at, updated_at";

#[derive(Clone)]
pub struct PostgresWatchHistoryStore {
    pool: PgPool,
}

impl PostgresWatchHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Appends the WHERE clause; unset filter fields add no condition.
fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &WatchHistoryFilter) {
    query.push(" WHERE user_id = ");
    query.push_bind(filter.user_id.clone());
    if let Some(tmdb_id) = &filter.tmdb_id {
        query.push(" AND tmdb_id = ");
        query.push_bind(tmdb_id.clone());
    }
    if let Some(season_id) = &filter.season_id {
        query.push(" AND season_id = ");
        query.push_bind(season_id.clone());
    }
    if let Some(episode_id) = &filter.episode_id {
        query.push(" AND episode_id = ");
        query.push_bind(episode_id.clone());
    }
}

#[async_trait]
impl WatchHistoryStore for PostgresWatchHistoryStore {
    async fn find_by_key(&self, key: &WatchHistoryKey) -> Result<Option<WatchHistoryItem>, StoreError> {
        // NULL season/episode ids must match NULL, so plain `=` won't do.
        let sql = format!(
            r#"
            SELECT {}
            FROM watch_history
            WHERE tmdb_id = $1
              AND user_id = $2
              AND season_id IS NOT DISTINCT FROM $3
              AND episode_id IS NOT DISTINCT FROM $4
            "#,
            WATCH_HISTORY_COLUMNS
        );
        let item = sqlx::query_as::<_, WatchHistoryItem>(&sql)
            .bind(&key.tmdb_id)
            .bind(&key.user_id)
            .bind(&key.season_id)
            .bind(&key.episode_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    async fn create(&self, item: &NewWatchHistoryItem) -> Result<WatchHistoryItem, StoreError> {
        // created_at comes from the column default.
        let sql = format!(
            r#"
            INSERT INTO watch_history (
                id, user_id, tmdb_id, season_id, episode_id, season_number, episode_number,
                meta, duration, watched, watched_at, completed, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::numeric, $10::numeric, $11, $12, $13)
            RETURNING {}
            "#,
            WATCH_HISTORY_COLUMNS
        );
        let created = sqlx::query_as::<_, WatchHistoryItem>(&sql)
            .bind(&item.id)
            .bind(&item.key.user_id)
            .bind(&item.key.tmdb_id)
            .bind(&item.key.season_id)
            .bind(&item.key.episode_id)
            .bind(item.season_number)
            .bind(item.episode_number)
            .bind(Json(&item.data.meta))
            .bind(&item.data.duration)
            .bind(&item.data.watched)
            .bind(item.data.watched_at)
            .bind(item.data.completed)
            .bind(item.data.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn update(&self, id: &str, data: &WatchHistoryData) -> Result<WatchHistoryItem, StoreError> {
        // Key columns and episode numbers are fixed at creation.
        let sql = format!(
            r#"
            UPDATE watch_history
            SET duration = $2::numeric,
                watched = $3::numeric,
                watched_at = $4,
                completed = $5,
                meta = $6,
                updated_at = $7
            WHERE id = $1
            RETURNING {}
            "#,
            WATCH_HISTORY_COLUMNS
        );
        sqlx::query_as::<_, WatchHistoryItem>(&sql)
            .bind(id)
            .bind(&data.duration)
            .bind(&data.watched)
            .bind(data.watched_at)
            .bind(data.completed)
            .bind(Json(&data.meta))
            .bind(data.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn find_many(&self, filter: &WatchHistoryFilter) -> Result<Vec<WatchHistoryItem>, StoreError> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM watch_history",
            WATCH_HISTORY_COLUMNS
        ));
        push_filter(&mut query, filter);
        query.push(" ORDER BY watched_at DESC");

        let items = query
            .build_query_as::<WatchHistoryItem>()
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn delete_many(&self, filter: &WatchHistoryFilter) -> Result<u64, StoreError> {
        let mut query = QueryBuilder::<Postgres>::new("DELETE FROM watch_history");
        push_filter(&mut query, filter);

        // Count as reported by the database.
        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn find_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, "user", expires_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }
}
