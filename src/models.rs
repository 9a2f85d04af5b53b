use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Show,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchHistoryMeta {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(rename = "type")]
    pub kind: MediaType,
}

/// A persisted `watch_history` row. `duration` and `watched` are decimal strings.
#[derive(Debug, Clone, FromRow)]
pub struct WatchHistoryItem {
    pub id: String,
    pub user_id: String,
    pub tmdb_id: String,
    pub season_id: Option<String>,
    pub episode_id: Option<String>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub meta: Json<WatchHistoryMeta>,
    pub duration: String,
    pub watched: String,
    pub watched_at: DateTime<Utc>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The unique `(tmdb_id, user_id, season_id, episode_id)` tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchHistoryKey {
    pub tmdb_id: String,
    pub user_id: String,
    pub season_id: Option<String>,
    pub episode_id: Option<String>,
}

/// Columns written on every upsert.
#[derive(Debug, Clone)]
pub struct WatchHistoryData {
    pub duration: String,
    pub watched: String,
    pub watched_at: DateTime<Utc>,
    pub completed: bool,
    pub meta: WatchHistoryMeta,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWatchHistoryItem {
    pub id: String,
    pub key: WatchHistoryKey,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub data: WatchHistoryData,
}

/// Row filter for listing and bulk deletion. Unset fields do not constrain the match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchHistoryFilter {
    pub user_id: String,
    pub tmdb_id: Option<String>,
    pub season_id: Option<String>,
    pub episode_id: Option<String>,
}

impl WatchHistoryFilter {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        WatchHistoryFilter {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn tmdb_id(mut self, tmdb_id: impl Into<String>) -> Self {
        self.tmdb_id = Some(tmdb_id.into());
        self
    }

    /// Empty ids are ignored.
    pub fn season_id(mut self, season_id: Option<&str>) -> Self {
        if let Some(id) = season_id.filter(|id| !id.is_empty()) {
            self.season_id = Some(id.to_string());
        }
        self
    }

    /// Empty ids are ignored.
    pub fn episode_id(mut self, episode_id: Option<&str>) -> Self {
        if let Some(id) = episode_id.filter(|id| !id.is_empty()) {
            self.episode_id = Some(id.to_string());
        }
        self
    }

    pub fn matches(&self, item: &WatchHistoryItem) -> bool {
        item.user_id == self.user_id
            && self.tmdb_id.as_ref().map_or(true, |id| *id == item.tmdb_id)
            && self
                .season_id
                .as_ref()
                .map_or(true, |id| item.season_id.as_ref() == Some(id))
            && self
                .episode_id
                .as_ref()
                .map_or(true, |id| item.episode_id.as_ref() == Some(id))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub user: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sid: String,
}

pub fn iso_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchHistoryResponse {
    pub id: String,
    pub tmdb_id: String,
    pub user_id: String,
    pub season_id: Option<String>,
    pub episode_id: Option<String>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub meta: WatchHistoryMeta,
    pub duration: String,
    pub watched: String,
    pub watched_at: String,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<WatchHistoryItem> for WatchHistoryResponse {
    fn from(item: WatchHistoryItem) -> Self {
        WatchHistoryResponse {
            watched_at: iso_timestamp(&item.watched_at),
            created_at: iso_timestamp(&item.created_at),
            updated_at: iso_timestamp(&item.updated_at),
            id: item.id,
            tmdb_id: item.tmdb_id,
            user_id: item.user_id,
            season_id: item.season_id,
            episode_id: item.episode_id,
            season_number: item.season_number,
            episode_number: item.episode_number,
            meta: item.meta.0,
            duration: item.duration,
            watched: item.watched,
            completed: item.completed,
        }
    }
}

/// Result of a single upsert, as returned to the client.
#[derive(Debug, Serialize)]
pub struct UpsertResult {
    pub success: bool,
    #[serde(flatten)]
    pub item: WatchHistoryResponse,
}

#[derive(Debug, Serialize)]
pub struct BulkUpsertResponse {
    pub success: bool,
    pub count: usize,
    pub items: Vec<UpsertResult>,
}

/// Optional DELETE filters, echoed back as received.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeleteWatchHistoryRequest {
    pub season_id: Option<String>,
    pub episode_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteWatchHistoryResponse {
    pub success: bool,
    pub count: u64,
    pub tmdb_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_id: Option<String>,
}
