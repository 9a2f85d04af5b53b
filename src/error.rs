use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Session not found or expired")]
    AuthenticationMissing,

    #[error("Cannot access other user information")]
    AuthorizationMismatch,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{message}")]
    Persistence {
        message: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Method not allowed")]
    MethodNotSupported,
}

impl ApiError {
    /// Logs the store failure and hides its detail behind `message`.
    pub fn persistence(message: &'static str) -> impl FnOnce(StoreError) -> ApiError {
        move |source| {
            error!("{}: {:?}", message, source);
            ApiError::Persistence { message, source }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::AuthenticationMissing => StatusCode::UNAUTHORIZED,
            ApiError::AuthorizationMismatch => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::MethodNotSupported => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = json!({
            "statusCode": status.as_u16(),
            "message": self.to_string(),
        });
        if let ApiError::Validation(err) = self {
            if let Some(path) = err.path() {
                body["path"] = json!(path);
            }
        }
        HttpResponse::build(status).json(body)
    }
}
