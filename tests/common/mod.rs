#![allow(dead_code)]

use actix_web::{test, web, App};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use watch_history_backend::auth::issue_token;
use watch_history_backend::config::{default_scheduled_tasks, AppConfig, MetaConfig, TraktConfig};
use watch_history_backend::handlers;
use watch_history_backend::metrics::Metrics;
use watch_history_backend::models::{
    NewWatchHistoryItem, Session, WatchHistoryData, WatchHistoryFilter, WatchHistoryItem,
    WatchHistoryKey,
};
use watch_history_backend::store::{SessionStore, StoreError, WatchHistoryStore};
use watch_history_backend::AppState;

pub const SECRET: &str = "test_crypto_secret";

#[derive(Default)]
pub struct MemoryWatchHistoryStore {
    pub rows: Mutex<Vec<WatchHistoryItem>>,
    pub fail: Mutex<bool>,
}

impl MemoryWatchHistoryStore {
    pub fn rows(&self) -> Vec<WatchHistoryItem> {
        self.rows.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap() = failing;
    }

    fn check(&self) -> Result<(), StoreError> {
        if *self.fail.lock().unwrap() {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl WatchHistoryStore for MemoryWatchHistoryStore {
    async fn find_by_key(&self, key: &WatchHistoryKey) -> Result<Option<WatchHistoryItem>, StoreError> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| {
                row.tmdb_id == key.tmdb_id
                    && row.user_id == key.user_id
                    && row.season_id == key.season_id
                    && row.episode_id == key.episode_id
            })
            .cloned())
    }

    async fn create(&self, item: &NewWatchHistoryItem) -> Result<WatchHistoryItem, StoreError> {
        self.check()?;
        let row = WatchHistoryItem {
            id: item.id.clone(),
            user_id: item.key.user_id.clone(),
            tmdb_id: item.key.tmdb_id.clone(),
            season_id: item.key.season_id.clone(),
            episode_id: item.key.episode_id.clone(),
            season_number: item.season_number,
            episode_number: item.episode_number,
            meta: Json(item.data.meta.clone()),
            duration: item.data.duration.clone(),
            watched: item.data.watched.clone(),
            watched_at: item.data.watched_at,
            completed: item.data.completed,
            created_at: item.data.updated_at,
            updated_at: item.data.updated_at,
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn update(&self, id: &str, data: &WatchHistoryData) -> Result<WatchHistoryItem, StoreError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row.duration = data.duration.clone();
        row.watched = data.watched.clone();
        row.watched_at = data.watched_at;
        row.completed = data.completed;
        row.meta = Json(data.meta.clone());
        row.updated_at = data.updated_at;
        Ok(row.clone())
    }

    async fn find_many(&self, filter: &WatchHistoryFilter) -> Result<Vec<WatchHistoryItem>, StoreError> {
        self.check()?;
        let mut items: Vec<WatchHistoryItem> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.watched_at.cmp(&a.watched_at));
        Ok(items)
    }

    async fn delete_many(&self, filter: &WatchHistoryFilter) -> Result<u64, StoreError> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|row| !filter.matches(row));
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    pub sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessionStore {
    pub fn insert(&self, id: &str, user: &str, expires_in: Duration) {
        self.sessions.lock().unwrap().insert(
            id.to_string(),
            Session {
                id: id.to_string(),
                user: user.to_string(),
                expires_at: Utc::now() + expires_in,
            },
        );
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.lock().unwrap().get(id).cloned())
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgresql://unused".to_string(),
        bind_host: "127.0.0.1".to_string(),
        bind_port: 0,
        cors_allowed_origins: vec!["http://localhost:3000".to_string()],
        max_body_bytes: 1024 * 1024,
        crypto_secret: SECRET.to_string(),
        meta: MetaConfig {
            name: "Test Backend".to_string(),
            description: "Backend under test".to_string(),
            version: "0.0.0".to_string(),
            has_captcha: false,
            captcha_client_key: String::new(),
        },
        tmdb_api_key: None,
        trakt: TraktConfig::default(),
        scheduled_tasks: default_scheduled_tasks(),
    }
}

pub struct TestContext {
    pub state: web::Data<AppState>,
    pub watch_history: Arc<MemoryWatchHistoryStore>,
    pub sessions: Arc<MemorySessionStore>,
    pub metrics: Arc<Metrics>,
}

impl TestContext {
    pub fn new() -> Self {
        let watch_history = Arc::new(MemoryWatchHistoryStore::default());
        let sessions = Arc::new(MemorySessionStore::default());
        let metrics = Arc::new(Metrics::new());
        let state = web::Data::new(AppState {
            config: test_config(),
            watch_history: watch_history.clone(),
            sessions: sessions.clone(),
            metrics: metrics.clone(),
        });
        TestContext {
            state,
            watch_history,
            sessions,
            metrics,
        }
    }

    /// Creates a live session for `user` and returns a bearer header value.
    pub fn login(&self, user: &str) -> String {
        let session_id = format!("session-{}", user);
        self.sessions.insert(&session_id, user, Duration::days(30));
        bearer(&session_id)
    }
}

pub fn bearer(session_id: &str) -> String {
    format!("Bearer {}", issue_token(session_id, SECRET).unwrap())
}

pub async fn setup_test_app(
    ctx: &TestContext,
) -> impl actix_web::dev::Service<
    actix_http::Request,
    Response = actix_web::dev::ServiceResponse,
    Error = actix_web::Error,
> {
    test::init_service(
        App::new()
            .app_data(ctx.state.clone())
            .configure(handlers::configure_routes),
    )
    .await
}
