use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, UNIX_EPOCH};
use thiserror::Error;

use crate::models::{DeleteWatchHistoryRequest, MediaType, WatchHistoryMeta};

/// Stored in place of null season/episode ids for movies so the unique key still applies.
pub const NO_SEASON_OR_EPISODE: &str = "\n";

/// 2021-07-13T00:00:00Z, the earliest accepted `watchedAt`.
pub const WATCHED_AT_FLOOR_MS: u64 = 1_626_134_400_000;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Request body is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("Expected a watch history item or an array of items")]
    InvalidShape,

    #[error("Invalid value at {path}: {message}")]
    Field { path: String, message: String },

    #[error("Invalid value at {path}: expected an ISO 8601 timestamp with offset, got {value:?}")]
    Timestamp { path: String, value: String },
}

impl ValidationError {
    pub fn path(&self) -> Option<&str> {
        match self {
            ValidationError::Field { path, .. } | ValidationError::Timestamp { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWatchHistoryItem {
    meta: WatchHistoryMeta,
    tmdb_id: String,
    duration: f64,
    watched: f64,
    watched_at: String,
    completed: Option<bool>,
    season_id: Option<String>,
    episode_id: Option<String>,
    season_number: Option<f64>,
    episode_number: Option<f64>,
}

/// A validated watch history item with coercions applied.
#[derive(Debug, Clone)]
pub struct WatchHistoryInput {
    pub meta: WatchHistoryMeta,
    pub tmdb_id: String,
    pub duration: String,
    pub watched: String,
    pub watched_at: DateTime<FixedOffset>,
    pub completed: bool,
    pub season_id: Option<String>,
    pub episode_id: Option<String>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
}

/// Accepts a single item or an array of items.
pub fn parse_put_body(body: &Value) -> Result<Vec<WatchHistoryInput>, ValidationError> {
    match body {
        Value::Object(_) => Ok(vec![parse_item(body, "")?]),
        Value::Array(values) => values
            .iter()
            .enumerate()
            .map(|(index, value)| parse_item(value, &format!("[{}]", index)))
            .collect(),
        _ => Err(ValidationError::InvalidShape),
    }
}

fn parse_item(value: &Value, prefix: &str) -> Result<WatchHistoryInput, ValidationError> {
    let raw: RawWatchHistoryItem = serde_path_to_error::deserialize(value).map_err(|err| {
        let message = err.inner().to_string();
        ValidationError::Field {
            path: error_path(prefix, &err.path().to_string(), &message),
            message,
        }
    })?;

    let watched_at =
        parse_timestamp(&raw.watched_at).ok_or_else(|| ValidationError::Timestamp {
            path: join_path(prefix, "watchedAt"),
            value: raw.watched_at.clone(),
        })?;

    Ok(WatchHistoryInput {
        meta: raw.meta,
        tmdb_id: raw.tmdb_id,
        duration: decimal_string(raw.duration),
        watched: decimal_string(raw.watched),
        watched_at,
        completed: raw.completed.unwrap_or(false),
        season_id: raw.season_id,
        episode_id: raw.episode_id,
        season_number: whole_number(raw.season_number, prefix, "seasonNumber")?,
        episode_number: whole_number(raw.episode_number, prefix, "episodeNumber")?,
    })
}

fn join_path(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path) {
        (true, _) => path.to_string(),
        (false, ".") => prefix.to_string(),
        (false, _) => format!("{}.{}", prefix, path),
    }
}

// serde reports a missing field at its parent; point at the field itself.
fn error_path(prefix: &str, path: &str, message: &str) -> String {
    let path = join_path(prefix, path);
    let missing = message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next());
    match missing {
        Some(field) if path.is_empty() || path == "." => field.to_string(),
        Some(field) => format!("{}.{}", path, field),
        None => path,
    }
}

/// `2.0` is accepted as `2`; fractional or out-of-range values are not.
fn whole_number(value: Option<f64>, prefix: &str, field: &str) -> Result<Option<i32>, ValidationError> {
    match value {
        None => Ok(None),
        Some(n) if n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64 => {
            Ok(Some(n as i32))
        }
        Some(n) => Err(ValidationError::Field {
            path: join_path(prefix, field),
            message: format!("expected a whole number, got {}", n),
        }),
    }
}

/// `YYYY-MM-DDTHH:MM:SS[.fff](Z|±HH|±HHMM|±HH:MM)`, uppercase `T` and `Z` only.
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let (local, offset) = match value.strip_suffix('Z') {
        Some(local) => (local, "+00:00".to_string()),
        None => {
            let split = value.rfind(|c: char| c == '+' || c == '-').filter(|&i| i >= 19)?;
            (&value[..split], normalize_offset(&value[split..])?)
        }
    };

    if !is_local_timestamp(local) {
        return None;
    }
    DateTime::parse_from_rfc3339(&format!("{}{}", local, offset)).ok()
}

fn normalize_offset(offset: &str) -> Option<String> {
    let (sign, rest) = offset.split_at(1);
    let digits: String = match rest.len() {
        2 => format!("{}00", rest),
        4 => rest.to_string(),
        5 if rest.as_bytes()[2] == b':' => rest.replacen(':', "", 1),
        _ => return None,
    };
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}{}:{}", sign, &digits[..2], &digits[2..]))
}

fn is_local_timestamp(local: &str) -> bool {
    let bytes = local.as_bytes();
    if bytes.len() < 19 {
        return false;
    }
    let shape = bytes[..19].iter().enumerate().all(|(i, &b)| match i {
        4 | 7 => b == b'-',
        10 => b == b'T',
        13 | 16 => b == b':',
        _ => b.is_ascii_digit(),
    });
    let fraction = match &bytes[19..] {
        [] => true,
        [b'.', digits @ ..] => !digits.is_empty() && digits.iter().all(u8::is_ascii_digit),
        _ => false,
    };
    shape && fraction
}

/// Reads the optional DELETE filters. An absent or non-JSON body means no filter;
/// a filter that is present but not a string is rejected rather than ignored.
pub fn parse_delete_body(body: &[u8]) -> Result<DeleteWatchHistoryRequest, ValidationError> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => return Ok(DeleteWatchHistoryRequest::default()),
    };
    Ok(DeleteWatchHistoryRequest {
        season_id: optional_string(&value, "seasonId")?,
        episode_id: optional_string(&value, "episodeId")?,
    })
}

fn optional_string(body: &Value, field: &str) -> Result<Option<String>, ValidationError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ValidationError::Field {
            path: field.to_string(),
            message: format!("expected a string, got {}", other),
        }),
    }
}

/// Shortest decimal form: `100.0` becomes `"100"`, `12.5` stays `"12.5"`.
pub fn decimal_string(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    value.to_string()
}

pub fn watched_at_floor() -> DateTime<Utc> {
    DateTime::<Utc>::from(UNIX_EPOCH + Duration::from_millis(WATCHED_AT_FLOOR_MS))
}

/// Clamps into `[watched_at_floor(), now]`.
pub fn clamp_watched_at(watched_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    watched_at.min(now).max(watched_at_floor())
}

pub fn normalize_ids(
    kind: MediaType,
    season_id: Option<&str>,
    episode_id: Option<&str>,
) -> (Option<String>, Option<String>) {
    match kind {
        MediaType::Movie => (
            Some(NO_SEASON_OR_EPISODE.to_string()),
            Some(NO_SEASON_OR_EPISODE.to_string()),
        ),
        MediaType::Show => (
            season_id.map(str::to_string),
            episode_id.map(str::to_string),
        ),
    }
}
