pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod store;
pub mod validation;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::store::{SessionStore, WatchHistoryStore};

/// Shared, read-only handles built once at startup.
pub struct AppState {
    pub config: AppConfig,
    pub watch_history: Arc<dyn WatchHistoryStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub metrics: Arc<Metrics>,
}
