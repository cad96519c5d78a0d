use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Who may read an album and the arts inside it. The owner always can.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// A collection of arts owned by one user.
///
/// `user_id` is the access-control anchor and never leaves the server;
/// clients see `ownerName`, captured from the owner's profile at creation
/// time. `cover_url` is refreshed with a newly signed link on every read.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    #[serde(skip_serializing)]
    pub user_id: String,
    pub owner_name: String,
    pub album_id: Uuid,
    pub creation_date: DateTime<Utc>,
    pub visibility: Visibility,
    pub title: String,
    pub description: String,
    pub cover_url: String,
}

/// Album payload returned by the mutating endpoints, carrying a one-shot
/// cover upload link when one was minted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumWithUpload {
    #[serde(flatten)]
    pub album: Album,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
}
