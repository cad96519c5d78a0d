use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// One pending entry in the removal feed.
///
/// Rows are written in the same transaction as the record deletion they
/// describe and consumed by the cleanup worker. `art_id` is `NULL` for an
/// album removal, which fans out into per-art removals when processed.
#[derive(Debug, Clone, FromRow)]
pub struct RecordRemoval {
    pub event_id: i64,
    pub album_id: Uuid,
    pub art_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub attempts: i64,
    pub next_attempt_at: DateTime<Utc>,
}

impl RecordRemoval {
    pub fn is_album(&self) -> bool {
        self.art_id.is_none()
    }
}
