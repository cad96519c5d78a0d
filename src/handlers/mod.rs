//! HTTP handlers, grouped by entity, plus health probes and the byte
//! routes behind signed links. Success envelopes live here; error bodies
//! come from [`crate::errors::ApiError`].

pub mod album_handlers;
pub mod art_handlers;
pub mod health_handlers;
pub mod media_handlers;
pub mod user_handlers;

use serde::{Deserialize, Serialize};

/// Pagination parameters accepted by the listing endpoints. `limit` stays
/// a raw string so non-numeric values answer 400 instead of 422.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListQuery {
    pub limit: Option<String>,
    pub next_key: Option<String>,
}

/// `{ "item": ... }`
#[derive(Debug, Serialize)]
pub struct ItemResponse<T> {
    pub item: T,
}

/// `{ "items": [...] }`
#[derive(Debug, Serialize)]
pub struct ItemsResponse<T> {
    pub items: Vec<T>,
}

/// `{ "items": [...], "nextKey": "..." }`, the token absent on the final
/// page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_key: Option<String>,
}

/// Deletion confirmation echoing the removed key.
#[derive(Debug, Serialize)]
pub struct DeletedItemResponse<T> {
    pub message: &'static str,
    pub item: T,
}

/// Batch deletion confirmation echoing the removed keys.
#[derive(Debug, Serialize)]
pub struct DeletedItemsResponse<T> {
    pub message: &'static str,
    pub items: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
