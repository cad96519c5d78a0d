//! Byte-transfer handlers behind signed links.
//!
//! The signature query parameters are the only credential here; these
//! routes sit outside the bearer-auth layer. A link that fails
//! verification gets the same answer whatever the reason.

use crate::errors::ApiError;
use crate::models::media::MediaObject;
use crate::services::presign::{DOWNLOAD_METHOD, UPLOAD_METHOD};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use futures::StreamExt;
use serde::Deserialize;
use std::io;
use tokio_util::io::ReaderStream;

/// Signed-link credentials carried in the query string.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignedLinkQuery {
    pub expires: i64,
    pub signature: String,
}

fn invalid_link() -> ApiError {
    ApiError::forbidden("This link is invalid or has expired.")
}

/// `PUT /media/{*key}`: accept bytes for a previously minted upload link.
pub async fn upload_media(
    State(state): State<AppState>,
    Path(key): Path<String>,
    query: Result<Query<SignedLinkQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|_| invalid_link())?;
    state
        .signer
        .verify(UPLOAD_METHOD, &key, query.expires, &query.signature)?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)));

    let object = state
        .media
        .store_object_stream(&key, content_type, stream)
        .await?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    if let Some(etag) = object.etag.as_deref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{etag}\"")) {
            response.headers_mut().insert(header::ETAG, value);
        }
    }
    Ok(response)
}

/// `GET /media/{*key}`: stream bytes back for a signed download link.
pub async fn download_media(
    State(state): State<AppState>,
    Path(key): Path<String>,
    query: Result<Query<SignedLinkQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|_| invalid_link())?;
    state
        .signer
        .verify(DOWNLOAD_METHOD, &key, query.expires, &query.signature)?;

    let (object, file) = state.media.open_object(&key).await?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;
    set_media_headers(response.headers_mut(), &object);
    Ok(response)
}

fn set_media_headers(headers: &mut HeaderMap, object: &MediaObject) {
    let content_type = object
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&object.size_bytes.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    if let Some(etag) = object.etag.as_deref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{etag}\"")) {
            headers.insert(header::ETAG, value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(&object.last_modified.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
