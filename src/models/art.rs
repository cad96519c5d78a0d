use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single item inside an album.
///
/// `sequence_num` is the display position and is rewritten from batch order
/// on every batch write. `img_url` is refreshed with a newly signed link on
/// every read.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Art {
    pub album_id: Uuid,
    pub art_id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: String,
    pub sequence_num: i64,
    pub creation_date: DateTime<Utc>,
    pub title: String,
    pub description: String,
    pub img_url: String,
}

/// Composite key addressing one art. Doubles as the deletion request item
/// and its confirmation echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArtKey {
    pub album_id: Uuid,
    pub art_id: Uuid,
}

/// Art payload returned by the batch write, carrying a one-shot image
/// upload link when one was minted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtWithUpload {
    #[serde(flatten)]
    pub art: Art,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
}
