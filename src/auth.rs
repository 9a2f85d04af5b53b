use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::{info, warn};

use crate::error::ApiError;
use crate::models::{Claims, Session};
use crate::AppState;

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// Session tokens carry no `exp`; expiry lives on the session row.
fn token_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    validation
}

pub fn session_id_from_token(token: &str, secret: &str) -> Option<String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &token_validation(),
    )
    .map(|data| data.claims.sid)
    .map_err(|e| info!("Rejected session token: {}", e))
    .ok()
}

pub fn issue_token(session_id: &str, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            sid: session_id.to_string(),
        },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Resolves the caller's live session, or `None` when the token is absent, invalid or expired.
pub async fn current_session(req: &HttpRequest, state: &AppState) -> Result<Option<Session>, ApiError> {
    let session_id = match bearer_token(req)
        .and_then(|token| session_id_from_token(token, &state.config.crypto_secret))
    {
        Some(id) => id,
        None => return Ok(None),
    };

    let session = state
        .sessions
        .find_session(&session_id)
        .await
        .map_err(ApiError::persistence("Failed to load session"))?;

    Ok(session.filter(|s| s.expires_at > Utc::now()))
}

/// Requires a live session belonging to `user_id`.
pub async fn authorize(req: &HttpRequest, state: &AppState, user_id: &str) -> Result<Session, ApiError> {
    let session = current_session(req, state)
        .await?
        .ok_or(ApiError::AuthenticationMissing)?;

    if session.user != user_id {
        warn!(
            "Session {} for user {} tried to access user {}",
            session.id, session.user, user_id
        );
        return Err(ApiError::AuthorizationMismatch);
    }

    Ok(session)
}
