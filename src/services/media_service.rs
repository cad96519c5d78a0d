//! Disk-backed media store with SQLite metadata.
//!
//! Payloads live beneath `base_path/{key}` and each carries one row in
//! `media_objects`. Keys come from the record-id scheme in
//! [`crate::services::presign`], so the on-disk tree mirrors album
//! structure and a whole album's media can be dropped by prefix.

use crate::models::media::MediaObject;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_MEDIA_KEY_LEN: usize = 512;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media object `{0}` not found")]
    ObjectNotFound(String),

    #[error("invalid media key")]
    InvalidKey,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Clone)]
pub struct MediaService {
    pub db: Arc<SqlitePool>,
    pub base_path: PathBuf,
}

impl MediaService {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Reject keys that could escape the media root or embed odd bytes.
    fn ensure_key_safe(key: &str) -> MediaResult<()> {
        if key.is_empty() || key.len() > MAX_MEDIA_KEY_LEN {
            return Err(MediaError::InvalidKey);
        }
        if key.contains("..") || key.split('/').any(str::is_empty) {
            return Err(MediaError::InvalidKey);
        }
        if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
            return Err(MediaError::InvalidKey);
        }
        Ok(())
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        path.extend(key.split('/'));
        path
    }

    async fn fetch_object(&self, key: &str) -> MediaResult<MediaObject> {
        sqlx::query_as::<_, MediaObject>(
            "SELECT key, content_type, size_bytes, etag, last_modified
             FROM media_objects WHERE key = ?",
        )
        .bind(key)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => MediaError::ObjectNotFound(key.to_string()),
            other => MediaError::Sqlx(other),
        })
    }

    /// Stream a payload to disk and upsert its metadata row.
    ///
    /// Bytes go to a temp file first, get fsynced and are renamed into
    /// place, so a crash mid-upload never leaves a truncated object at the
    /// key path. The MD5 digest of the payload becomes the ETag.
    pub async fn store_object_stream<S>(
        &self,
        key: &str,
        content_type: Option<String>,
        stream: S,
    ) -> MediaResult<MediaObject>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                MediaError::Io(io::Error::new(
                    ErrorKind::Other,
                    "media path missing parent directory",
                ))
            })?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = md5::Context::new();

        pin_mut!(stream);
        while let Some(next) = stream.next().await {
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(MediaError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(MediaError::Io(err));
            }
        }

        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(MediaError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(MediaError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(MediaError::Io(err));
        }

        let etag = format!("{:x}", digest.compute());
        let stored = sqlx::query_as::<_, MediaObject>(
            "INSERT INTO media_objects (key, content_type, size_bytes, etag, last_modified)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                 content_type = excluded.content_type,
                 size_bytes = excluded.size_bytes,
                 etag = excluded.etag,
                 last_modified = excluded.last_modified
             RETURNING key, content_type, size_bytes, etag, last_modified",
        )
        .bind(key)
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        match stored {
            Ok(object) => {
                debug!("stored media object {} ({} bytes)", key, size_bytes);
                Ok(object)
            }
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(MediaError::Sqlx(err))
            }
        }
    }

    /// Open an object for a streamed download.
    pub async fn open_object(&self, key: &str) -> MediaResult<(MediaObject, File)> {
        Self::ensure_key_safe(key)?;
        let object = self.fetch_object(key).await?;
        let file = File::open(self.object_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                MediaError::ObjectNotFound(key.to_string())
            } else {
                MediaError::Io(err)
            }
        })?;
        Ok((object, file))
    }

    /// Delete one object, reporting whether anything was actually there.
    ///
    /// Missing rows and missing files are both fine: the cleanup worker can
    /// replay the same removal after a crash.
    pub async fn delete_object(&self, key: &str) -> MediaResult<bool> {
        Self::ensure_key_safe(key)?;

        let result = sqlx::query("DELETE FROM media_objects WHERE key = ?")
            .bind(key)
            .execute(&*self.db)
            .await?;
        let mut removed = result.rows_affected() > 0;

        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(()) => {
                removed = true;
                debug!("removed media file {}", file_path.display());
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(MediaError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(removed)
    }

    /// Delete every object whose key falls under `prefix/`, rows and files
    /// both. Returns the number of metadata rows removed; an already-clean
    /// prefix is a no-op.
    pub async fn delete_prefix(&self, prefix: &str) -> MediaResult<u64> {
        Self::ensure_key_safe(prefix)?;

        let result = sqlx::query("DELETE FROM media_objects WHERE key LIKE ?")
            .bind(format!("{prefix}/%"))
            .execute(&*self.db)
            .await?;

        let dir = self.object_path(prefix);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => debug!("removed media directory {}", dir.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(MediaError::Io(err)),
        }

        Ok(result.rows_affected())
    }

    /// Write, read back and remove a scratch file under the media root.
    /// The readiness probe calls this to check the backing volume.
    pub async fn probe_disk(&self) -> MediaResult<()> {
        let path = self.base_path.join(format!(".probe-{}", Uuid::new_v4()));
        fs::write(&path, b"probe").await?;
        let read_back = fs::read(&path).await;
        let removed = fs::remove_file(&path).await;
        if read_back? != b"probe" {
            return Err(MediaError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "scratch file content mismatch",
            )));
        }
        removed?;
        Ok(())
    }

    /// Walk upward removing now-empty directories, stopping at the media
    /// root or the first directory that still has entries.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(()) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_record_derived_keys() {
        let album = Uuid::new_v4();
        let art = Uuid::new_v4();
        assert!(MediaService::ensure_key_safe(&format!("{album}/{album}")).is_ok());
        assert!(MediaService::ensure_key_safe(&format!("{album}/arts/{art}")).is_ok());
    }

    #[test]
    fn rejects_traversal_and_odd_keys() {
        for key in [
            "",
            "/leading/slash",
            "trailing/slash/",
            "a//b",
            "../escape",
            "a/../../b",
            "back\\slash",
            "nul\0byte",
        ] {
            assert!(
                MediaService::ensure_key_safe(key).is_err(),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_oversized_keys() {
        let key = "a".repeat(MAX_MEDIA_KEY_LEN + 1);
        assert!(MediaService::ensure_key_safe(&key).is_err());
    }
}
