//! Request-level error taxonomy and its HTTP mapping.
//!
//! Service-layer errors (`GalleryError`, `MediaError`, signature failures,
//! extractor rejections) all funnel into `ApiError` before leaving the
//! process. Responses carry a `{"message": ...}` body; collaborator faults
//! are logged server-side and answered with a generic 500 body.

use crate::pagination::CursorError;
use crate::services::gallery_service::GalleryError;
use crate::services::media_service::MediaError;
use crate::services::presign::SignatureError;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Curated 500 message that is safe to show to clients.
    #[error("{0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            ApiError::Database(ref err) => {
                tracing::error!("database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error.".to_string(),
                )
            }
            ApiError::Io(ref err) => {
                tracing::error!("io error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error.".to_string(),
                )
            }
            ApiError::Http(ref err) => {
                tracing::error!("http client error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error.".to_string(),
                )
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<GalleryError> for ApiError {
    fn from(err: GalleryError) -> Self {
        let message = err.to_string();
        match err {
            GalleryError::AlbumNotFound | GalleryError::ArtNotFound => ApiError::NotFound(message),
            GalleryError::AccessDenied | GalleryError::ProfileRequired => {
                ApiError::Forbidden(message)
            }
            GalleryError::Sqlx(inner) => ApiError::Database(inner),
            _ => ApiError::BadRequest(message),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::ObjectNotFound(_) => ApiError::NotFound(err.to_string()),
            MediaError::InvalidKey => ApiError::BadRequest(err.to_string()),
            MediaError::Sqlx(inner) => ApiError::Database(inner),
            MediaError::Io(inner) => ApiError::Io(inner),
        }
    }
}

impl From<SignatureError> for ApiError {
    fn from(_: SignatureError) -> Self {
        ApiError::Forbidden("This link is invalid or has expired.".into())
    }
}

impl From<CursorError> for ApiError {
    fn from(_: CursorError) -> Self {
        ApiError::BadRequest("Malformed pagination token.".into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
