use actix_web::{get, web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{info, warn};
use serde_json::json;
use uuid::Uuid;

use crate::auth;
use crate::error::ApiError;
use crate::metrics::MetricsInterval;
use crate::models::{
    BulkUpsertResponse, DeleteWatchHistoryResponse,
    NewWatchHistoryItem, UpsertResult, WatchHistoryData, WatchHistoryFilter, WatchHistoryKey,
    WatchHistoryResponse,
};
use crate::validation::{self, ValidationError, WatchHistoryInput};
use crate::AppState;

#[get("/api/status")]
async fn status() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "running"
    }))
}

#[get("/meta")]
async fn meta(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(&state.config.meta)
}

#[get("/metrics/{interval}")]
async fn metrics_snapshot(path: web::Path<String>, state: web::Data<AppState>) -> HttpResponse {
    match path.parse::<MetricsInterval>() {
        Ok(interval) => HttpResponse::Ok().json(state.metrics.snapshot(interval)),
        Err(message) => HttpResponse::NotFound().json(json!({
            "statusCode": 404,
            "message": message
        })),
    }
}

#[get("/users/{id}/watch-history")]
async fn list_watch_history(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();
    auth::authorize(&req, &state, &user_id).await?;

    let items = state
        .watch_history
        .find_many(&WatchHistoryFilter::for_user(user_id.as_str()))
        .await
        .map_err(ApiError::persistence("Failed to load watch history"))?;

    let items: Vec<WatchHistoryResponse> = items.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(items))
}

const SAVE_FAILED: &str = "Failed to save watch history";

async fn upsert_item(
    state: &AppState,
    user_id: &str,
    tmdb_id: String,
    input: WatchHistoryInput,
) -> Result<UpsertResult, ApiError> {
    let now = Utc::now();
    // Out-of-range timestamps are pulled back into the accepted window.
    let watched_at = validation::clamp_watched_at(input.watched_at.with_timezone(&Utc), now);
    let (season_id, episode_id) = validation::normalize_ids(
        input.meta.kind,
        input.season_id.as_deref(),
        input.episode_id.as_deref(),
    );

    let key = WatchHistoryKey {
        tmdb_id,
        user_id: user_id.to_string(),
        season_id,
        episode_id,
    };
    let data = WatchHistoryData {
        duration: input.duration,
        watched: input.watched,
        watched_at,
        completed: input.completed,
        meta: input.meta,
        updated_at: now,
    };

    // Find by composite key, then update in place or insert.
    let existing = state
        .watch_history
        .find_by_key(&key)
        .await
        .map_err(ApiError::persistence(SAVE_FAILED))?;

    let saved = match existing {
        Some(existing) => state.watch_history.update(&existing.id, &data).await,
        None => {
            state
                .watch_history
                .create(&NewWatchHistoryItem {
                    id: Uuid::new_v4().to_string(),
                    key,
                    season_number: input.season_number,
                    episode_number: input.episode_number,
                    data,
                })
                .await
        }
    }
    .map_err(ApiError::persistence(SAVE_FAILED))?;

    Ok(UpsertResult {
        success: true,
        item: saved.into(),
    })
}

async fn save_watch_history(
    req: &HttpRequest,
    state: &AppState,
    user_id: &str,
    tmdb_id: &str,
    body: &[u8],
) -> Result<HttpResponse, ApiError> {
    auth::authorize(req, state, user_id).await?;

    // Validate every item before writing any of them.
    let body: serde_json::Value = serde_json::from_slice(body).map_err(ValidationError::from)?;
    let items = validation::parse_put_body(&body)?;
    // A lone item is keyed by the path; bulk imports carry their own ids.
    let single = items.len() == 1;

    let mut results = Vec::with_capacity(items.len());
    for input in items {
        let item_tmdb_id = if single {
            tmdb_id.to_string()
        } else {
            input.tmdb_id.clone()
        };
        results.push(upsert_item(state, user_id, item_tmdb_id, input).await?);
    }

    info!("Saved {} watch history item(s) for user {}", results.len(), user_id);
    state.metrics.record_upserts(results.len() as u64);

    // Single writes answer with the item itself.
    if results.len() == 1 {
        Ok(HttpResponse::Ok().json(&results[0]))
    } else {
        Ok(HttpResponse::Ok().json(BulkUpsertResponse {
            success: true,
            count: results.len(),
            items: results,
        }))
    }
}

async fn put_watch_history(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let (user_id, tmdb_id) = path.into_inner();
    save_watch_history(&req, &state, &user_id, &tmdb_id, &body)
        .await
        .map_err(|e| reject(&state, e))
}

async fn remove_watch_history(
    req: &HttpRequest,
    state: &AppState,
    user_id: &str,
    tmdb_id: &str,
    body: &[u8],
) -> Result<HttpResponse, ApiError> {
    auth::authorize(req, state, user_id).await?;

    let body = validation::parse_delete_body(body)?;
    // Empty ids are dropped by the filter builder but still echoed.
    let filter = WatchHistoryFilter::for_user(user_id)
        .tmdb_id(tmdb_id)
        .season_id(body.season_id.as_deref())
        .episode_id(body.episode_id.as_deref());

    let count = state
        .watch_history
        .delete_many(&filter)
        .await
        .map_err(ApiError::persistence("Failed to delete watch history"))?;

    info!("Deleted {} watch history item(s) for user {}", count, user_id);
    state.metrics.record_deletes(count);

    Ok(HttpResponse::Ok().json(DeleteWatchHistoryResponse {
        success: true,
        count,
        tmdb_id: tmdb_id.to_string(),
        episode_id: body.episode_id,
        season_id: body.season_id,
    }))
}

async fn delete_watch_history(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let (user_id, tmdb_id) = path.into_inner();
    remove_watch_history(&req, &state, &user_id, &tmdb_id, &body)
        .await
        .map_err(|e| reject(&state, e))
}

async fn watch_history_method_not_allowed(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let (user_id, _) = path.into_inner();
    // Auth errors win over 405.
    let err = match auth::authorize(&req, &state, &user_id).await {
        Ok(_) => ApiError::MethodNotSupported,
        Err(e) => e,
    };
    Err(reject(&state, err))
}

fn reject(state: &AppState, err: ApiError) -> ApiError {
    // Persistence errors were already logged at error level.
    if !matches!(err, ApiError::Persistence { .. }) {
        warn!("Rejected watch history request: {}", err);
    }
    state.metrics.record_rejection();
    err
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(status)
        .service(meta)
        .service(metrics_snapshot)
        .service(list_watch_history)
        .service(
            web::resource("/users/{id}/watch-history/{tmdbid}")
                .route(web::put().to(put_watch_history))
                .route(web::delete().to(delete_watch_history))
                .default_service(web::to(watch_history_method_not_allowed)),
        );
}
