use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Metadata row for one stored media payload. The bytes live on disk at
/// the path derived from `key`.
#[derive(Debug, Clone, FromRow)]
pub struct MediaObject {
    pub key: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub etag: Option<String>,
    pub last_modified: DateTime<Utc>,
}
