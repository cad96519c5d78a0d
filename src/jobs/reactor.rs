//! Deferred cleanup after record deletions.
//!
//! Deleting an album or an art only removes the primary row and queues an
//! event in `record_removals`, inside the same transaction. This worker
//! polls that feed and finishes the job: an album event cascades over the
//! album's remaining art rows (queueing one event per art) and drops the
//! album's media directory; an art event drops that art's image. Every
//! step tolerates already-deleted targets, so a replayed event is a no-op.
//! A failing event is retried with exponential backoff and abandoned after
//! a few attempts. Processed rows stay around for a few days as an audit
//! trail, then get swept on idle ticks.

use crate::models::event::RecordRemoval;
use crate::services::gallery_service::GalleryService;
use crate::services::media_service::MediaService;
use crate::services::presign::art_image_key;
use anyhow::Result;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

const BATCH_SIZE: i64 = 16;
const MAX_ATTEMPTS: i64 = 5;
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);
const PROCESSED_RETENTION_DAYS: i64 = 7;

pub struct CleanupWorker {
    db: Arc<SqlitePool>,
    gallery: GalleryService,
    media: MediaService,
}

impl CleanupWorker {
    pub fn new(db: Arc<SqlitePool>, gallery: GalleryService, media: MediaService) -> Self {
        Self { db, gallery, media }
    }

    /// Run the polling loop on a background task.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("cleanup worker started");
            loop {
                match self.run_once().await {
                    Ok(0) => {
                        if let Err(err) = self.sweep_processed().await {
                            tracing::error!("sweep of processed events failed: {}", err);
                        }
                        tokio::time::sleep(POLL_INTERVAL).await;
                    }
                    Ok(count) => tracing::debug!("cleanup worker handled {} events", count),
                    Err(err) => {
                        tracing::error!("cleanup worker pass failed: {}", err);
                        tokio::time::sleep(POLL_INTERVAL).await;
                    }
                }
            }
        })
    }

    /// Handle one batch of due events. Returns how many were picked up, so
    /// callers can tell an idle feed from a busy one.
    pub async fn run_once(&self) -> Result<usize> {
        let events = self.fetch_due().await?;
        let count = events.len();
        for event in events {
            match self.process(&event).await {
                Ok(()) => self.mark_done(event.event_id).await?,
                Err(err) => {
                    tracing::error!("removal event {} failed: {}", event.event_id, err);
                    self.reschedule(&event).await?;
                }
            }
        }
        Ok(count)
    }

    /// Drop processed events that have outlived the retention window, so
    /// the feed table does not grow without bound.
    pub async fn sweep_processed(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(PROCESSED_RETENTION_DAYS);
        let result = sqlx::query(
            "DELETE FROM record_removals WHERE processed_at IS NOT NULL AND processed_at <= ?",
        )
        .bind(cutoff)
        .execute(&*self.db)
        .await?;
        if result.rows_affected() > 0 {
            tracing::debug!("swept {} processed removal events", result.rows_affected());
        }
        Ok(result.rows_affected())
    }

    /// Keep taking batches until the feed is idle. An album cascade queues
    /// art events that only become visible to the next pass, so draining
    /// takes more than one.
    pub async fn drain(&self) -> Result<usize> {
        let mut total = 0;
        loop {
            let count = self.run_once().await?;
            if count == 0 {
                return Ok(total);
            }
            total += count;
        }
    }

    async fn process(&self, event: &RecordRemoval) -> Result<()> {
        match event.art_id {
            None => {
                let removed = self.gallery.cascade_delete_album_arts(event.album_id).await?;
                if removed > 0 {
                    tracing::info!(
                        "album {}: {} dependent arts removed",
                        event.album_id,
                        removed
                    );
                }
                self.media
                    .delete_prefix(&event.album_id.to_string())
                    .await?;
            }
            Some(art_id) => {
                self.media
                    .delete_object(&art_image_key(event.album_id, art_id))
                    .await?;
            }
        }
        Ok(())
    }

    async fn fetch_due(&self) -> Result<Vec<RecordRemoval>> {
        Ok(sqlx::query_as::<_, RecordRemoval>(
            "SELECT event_id, album_id, art_id, created_at, attempts, next_attempt_at
             FROM record_removals
             WHERE processed_at IS NULL AND next_attempt_at <= ?
             ORDER BY event_id ASC
             LIMIT ?",
        )
        .bind(Utc::now())
        .bind(BATCH_SIZE)
        .fetch_all(&*self.db)
        .await?)
    }

    async fn mark_done(&self, event_id: i64) -> Result<()> {
        sqlx::query("UPDATE record_removals SET processed_at = ? WHERE event_id = ?")
            .bind(Utc::now())
            .bind(event_id)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    /// Push a failed event back with exponential backoff; give up past the
    /// attempt cap.
    async fn reschedule(&self, event: &RecordRemoval) -> Result<()> {
        let attempts = event.attempts + 1;
        if attempts >= MAX_ATTEMPTS {
            tracing::error!(
                "abandoning removal event {} after {} attempts",
                event.event_id,
                attempts
            );
            sqlx::query(
                "UPDATE record_removals SET attempts = ?, processed_at = ? WHERE event_id = ?",
            )
            .bind(attempts)
            .bind(Utc::now())
            .bind(event.event_id)
            .execute(&*self.db)
            .await?;
            return Ok(());
        }

        let delay = Duration::seconds(1_i64 << attempts.min(6));
        sqlx::query(
            "UPDATE record_removals SET attempts = ?, next_attempt_at = ? WHERE event_id = ?",
        )
        .bind(attempts)
        .bind(Utc::now() + delay)
        .bind(event.event_id)
        .execute(&*self.db)
        .await?;
        Ok(())
    }
}
