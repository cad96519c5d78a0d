//! Domain operations over albums, arts and users.
//!
//! Listings page with opaque resume tokens and refresh every image link on
//! the way out. Mutations check ownership against the caller's subject id,
//! run validation before touching any row, and queue removal events in the
//! same transaction as the delete they describe so the cleanup worker can
//! finish the job later.

use crate::models::album::{Album, AlbumWithUpload, Visibility};
use crate::models::art::{Art, ArtKey, ArtWithUpload};
use crate::models::user::User;
use crate::pagination::{AlbumCursor, ArtCursor, CursorError, decode_cursor, encode_cursor};
use crate::services::presign::{UrlSigner, album_cover_key, art_image_key};
use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_BATCH_ITEMS: usize = 25;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("This album item doesn't exists.")]
    AlbumNotFound,

    #[error("This art item doesn't exists.")]
    ArtNotFound,

    #[error("Unauthorized.")]
    AccessDenied,

    #[error("A user profile is required before creating albums.")]
    ProfileRequired,

    #[error("The arts items don't belong to the same album")]
    MixedAlbums,

    #[error("Title and description are mandatory for new art items.")]
    MissingArtFields,

    #[error("The {0} field cannot be empty.")]
    EmptyField(&'static str),

    #[error("The pagination limit should be a positive number.")]
    InvalidLimit,

    #[error("Malformed pagination token.")]
    MalformedCursor,

    #[error("The request must contain at least one art item.")]
    EmptyBatch,

    #[error("The request contains more items than one batch allows.")]
    BatchTooLarge,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl From<CursorError> for GalleryError {
    fn from(_: CursorError) -> Self {
        GalleryError::MalformedCursor
    }
}

pub type GalleryResult<T> = Result<T, GalleryError>;

/// One page of a listing plus the token resuming after its last item.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_key: Option<String>,
}

/// Body of the album-creation endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewAlbumParams {
    pub visibility: Visibility,
    pub title: String,
    pub description: String,
}

impl NewAlbumParams {
    fn validate(&self) -> GalleryResult<()> {
        if self.title.is_empty() {
            return Err(GalleryError::EmptyField("title"));
        }
        if self.description.is_empty() {
            return Err(GalleryError::EmptyField("description"));
        }
        Ok(())
    }
}

/// Body of the album-edit endpoint. Absent fields keep their stored value;
/// `genUploadUrl` additionally mints a fresh cover upload link.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EditAlbumParams {
    pub visibility: Option<Visibility>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub gen_upload_url: bool,
}

impl EditAlbumParams {
    fn validate(&self) -> GalleryResult<()> {
        if matches!(self.title.as_deref(), Some("")) {
            return Err(GalleryError::EmptyField("title"));
        }
        if matches!(self.description.as_deref(), Some("")) {
            return Err(GalleryError::EmptyField("description"));
        }
        Ok(())
    }
}

/// One entry of the art batch write. Without `artId` it creates an art and
/// then title and description are mandatory; with `artId` it edits, absent
/// fields keeping their stored values.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PutArtParams {
    pub album_id: Uuid,
    pub art_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub gen_upload_url: bool,
}

impl PutArtParams {
    fn validate(&self) -> GalleryResult<()> {
        if matches!(self.title.as_deref(), Some("")) {
            return Err(GalleryError::EmptyField("title"));
        }
        if matches!(self.description.as_deref(), Some("")) {
            return Err(GalleryError::EmptyField("description"));
        }
        if self.art_id.is_none() && (self.title.is_none() || self.description.is_none()) {
            return Err(GalleryError::MissingArtFields);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct GalleryService {
    pub db: Arc<SqlitePool>,
    signer: UrlSigner,
}

impl GalleryService {
    pub fn new(db: Arc<SqlitePool>, signer: UrlSigner) -> Self {
        Self { db, signer }
    }

    /// Parse the raw `limit` query parameter. Absent means the default;
    /// anything that is not a positive integer is rejected, and a
    /// positive value is passed through to the query as given.
    fn validate_limit(limit: Option<&str>) -> GalleryResult<i64> {
        match limit {
            None => Ok(DEFAULT_PAGE_SIZE),
            Some(raw) => {
                let parsed: i64 = raw.trim().parse().map_err(|_| GalleryError::InvalidLimit)?;
                if parsed <= 0 {
                    return Err(GalleryError::InvalidLimit);
                }
                Ok(parsed)
            }
        }
    }

    /// All ids in a batch must name the same album; returns it.
    fn same_album<I>(ids: I) -> GalleryResult<Uuid>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut ids = ids.into_iter();
        let first = ids.next().ok_or(GalleryError::EmptyBatch)?;
        for id in ids {
            if id != first {
                return Err(GalleryError::MixedAlbums);
            }
        }
        Ok(first)
    }

    /// `GET /album/public`: newest-first page of public albums.
    pub async fn list_public_albums(
        &self,
        limit: Option<&str>,
        next_key: Option<&str>,
    ) -> GalleryResult<Page<Album>> {
        self.album_page(None, limit, next_key).await
    }

    /// `GET /album/my`: newest-first page of the caller's albums, any
    /// visibility.
    pub async fn list_user_albums(
        &self,
        user_id: &str,
        limit: Option<&str>,
        next_key: Option<&str>,
    ) -> GalleryResult<Page<Album>> {
        self.album_page(Some(user_id), limit, next_key).await
    }

    async fn album_page(
        &self,
        owner: Option<&str>,
        limit: Option<&str>,
        next_key: Option<&str>,
    ) -> GalleryResult<Page<Album>> {
        let limit = Self::validate_limit(limit)?;
        let cursor = next_key.map(decode_cursor::<AlbumCursor>).transpose()?;

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT user_id, owner_name, album_id, creation_date, visibility, title, description, cover_url
             FROM albums WHERE ",
        );
        match owner {
            Some(user_id) => {
                builder.push("user_id = ");
                builder.push_bind(user_id.to_string());
            }
            None => {
                builder.push("visibility = ");
                builder.push_bind(Visibility::Public);
            }
        }
        if let Some(cursor) = cursor {
            builder.push(" AND (creation_date < ");
            builder.push_bind(cursor.creation_date);
            builder.push(" OR (creation_date = ");
            builder.push_bind(cursor.creation_date);
            builder.push(" AND album_id < ");
            builder.push_bind(cursor.album_id);
            builder.push("))");
        }
        builder.push(" ORDER BY creation_date DESC, album_id DESC LIMIT ");
        builder.push_bind(limit.saturating_add(1));

        let mut albums: Vec<Album> = builder.build_query_as().fetch_all(&*self.db).await?;

        let next_key = if albums.len() as i64 > limit {
            albums.truncate(limit as usize);
            match albums.last() {
                Some(last) => Some(encode_cursor(&AlbumCursor {
                    creation_date: last.creation_date,
                    album_id: last.album_id,
                })?),
                None => None,
            }
        } else {
            None
        };

        for album in &mut albums {
            album.cover_url = self.signer.download_url(&album_cover_key(album.album_id));
        }

        Ok(Page {
            items: albums,
            next_key,
        })
    }

    pub async fn query_album(&self, album_id: Uuid) -> GalleryResult<Album> {
        sqlx::query_as::<_, Album>(
            "SELECT user_id, owner_name, album_id, creation_date, visibility, title, description, cover_url
             FROM albums WHERE album_id = ?",
        )
        .bind(album_id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => GalleryError::AlbumNotFound,
            other => GalleryError::Sqlx(other),
        })
    }

    /// Fetch an album the caller must own. Missing albums surface as not
    /// found before any ownership verdict, so probing can't distinguish
    /// "absent" from "someone else's" by status alone.
    pub async fn album_ownership(&self, user_id: &str, album_id: Uuid) -> GalleryResult<Album> {
        let album = self.query_album(album_id).await?;
        if album.user_id != user_id {
            return Err(GalleryError::AccessDenied);
        }
        Ok(album)
    }

    /// `PUT|POST /album/my`: create an album and mint its cover links.
    /// Requires a stored profile, which supplies the public owner name.
    pub async fn add_album(
        &self,
        user_id: &str,
        params: NewAlbumParams,
    ) -> GalleryResult<AlbumWithUpload> {
        params.validate()?;

        let owner = self
            .get_user(user_id)
            .await?
            .ok_or(GalleryError::ProfileRequired)?;
        let owner_name = owner.name.or(owner.nickname).unwrap_or_default();

        let album_id = Uuid::new_v4();
        let cover_key = album_cover_key(album_id);
        let album = Album {
            user_id: user_id.to_string(),
            owner_name,
            album_id,
            creation_date: Utc::now(),
            visibility: params.visibility,
            title: params.title,
            description: params.description,
            cover_url: self.signer.download_url(&cover_key),
        };

        sqlx::query(
            "INSERT INTO albums (album_id, user_id, owner_name, creation_date, visibility, title, description, cover_url)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(album.album_id)
        .bind(&album.user_id)
        .bind(&album.owner_name)
        .bind(album.creation_date)
        .bind(album.visibility)
        .bind(&album.title)
        .bind(&album.description)
        .bind(&album.cover_url)
        .execute(&*self.db)
        .await?;

        tracing::info!("album {} created", album.album_id);
        Ok(AlbumWithUpload {
            upload_url: Some(self.signer.upload_url(&cover_key)),
            album,
        })
    }

    /// `PATCH /album/my/{album_id}`: merge the provided fields into an
    /// owned album.
    pub async fn edit_album(
        &self,
        user_id: &str,
        album_id: Uuid,
        params: EditAlbumParams,
    ) -> GalleryResult<AlbumWithUpload> {
        params.validate()?;
        let mut album = self.album_ownership(user_id, album_id).await?;

        if let Some(visibility) = params.visibility {
            album.visibility = visibility;
        }
        if let Some(title) = params.title {
            album.title = title;
        }
        if let Some(description) = params.description {
            album.description = description;
        }

        let mut upload_url = None;
        if params.gen_upload_url {
            let cover_key = album_cover_key(album_id);
            album.cover_url = self.signer.download_url(&cover_key);
            upload_url = Some(self.signer.upload_url(&cover_key));
        }

        sqlx::query(
            "UPDATE albums SET visibility = ?, title = ?, description = ?, cover_url = ?
             WHERE album_id = ?",
        )
        .bind(album.visibility)
        .bind(&album.title)
        .bind(&album.description)
        .bind(&album.cover_url)
        .bind(album_id)
        .execute(&*self.db)
        .await?;

        Ok(AlbumWithUpload { album, upload_url })
    }

    /// `DELETE /album/my`: drop an owned album row and queue the deferred
    /// cascade over its arts and media.
    pub async fn delete_album(&self, user_id: &str, album_id: Uuid) -> GalleryResult<Uuid> {
        self.album_ownership(user_id, album_id).await?;

        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM albums WHERE album_id = ?")
            .bind(album_id)
            .execute(&mut *tx)
            .await?;
        enqueue_removal(&mut tx, album_id, None).await?;
        tx.commit().await?;

        tracing::info!("album {} deleted, cascade queued", album_id);
        Ok(album_id)
    }

    /// `GET /album/public/{album_id}`: page through a public album's arts.
    pub async fn list_public_album_arts(
        &self,
        album_id: Uuid,
        limit: Option<&str>,
        next_key: Option<&str>,
    ) -> GalleryResult<Page<Art>> {
        let album = self.query_album(album_id).await?;
        if album.visibility != Visibility::Public {
            return Err(GalleryError::AccessDenied);
        }
        self.art_page(album_id, limit, next_key).await
    }

    /// `GET /album/my/{album_id}`: page through an owned album's arts,
    /// regardless of visibility.
    pub async fn list_user_album_arts(
        &self,
        user_id: &str,
        album_id: Uuid,
        limit: Option<&str>,
        next_key: Option<&str>,
    ) -> GalleryResult<Page<Art>> {
        self.album_ownership(user_id, album_id).await?;
        self.art_page(album_id, limit, next_key).await
    }

    async fn art_page(
        &self,
        album_id: Uuid,
        limit: Option<&str>,
        next_key: Option<&str>,
    ) -> GalleryResult<Page<Art>> {
        let limit = Self::validate_limit(limit)?;
        let cursor = next_key.map(decode_cursor::<ArtCursor>).transpose()?;

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT album_id, art_id, user_id, sequence_num, creation_date, title, description, img_url
             FROM arts WHERE album_id = ",
        );
        builder.push_bind(album_id);
        if let Some(cursor) = cursor {
            builder.push(" AND (sequence_num > ");
            builder.push_bind(cursor.sequence_num);
            builder.push(" OR (sequence_num = ");
            builder.push_bind(cursor.sequence_num);
            builder.push(" AND art_id > ");
            builder.push_bind(cursor.art_id);
            builder.push("))");
        }
        builder.push(" ORDER BY sequence_num ASC, art_id ASC LIMIT ");
        builder.push_bind(limit.saturating_add(1));

        let mut arts: Vec<Art> = builder.build_query_as().fetch_all(&*self.db).await?;

        let next_key = if arts.len() as i64 > limit {
            arts.truncate(limit as usize);
            match arts.last() {
                Some(last) => Some(encode_cursor(&ArtCursor {
                    sequence_num: last.sequence_num,
                    art_id: last.art_id,
                })?),
                None => None,
            }
        } else {
            None
        };

        for art in &mut arts {
            art.img_url = self.signer.download_url(&art_image_key(album_id, art.art_id));
        }

        Ok(Page {
            items: arts,
            next_key,
        })
    }

    pub async fn get_art(&self, album_id: Uuid, art_id: Uuid) -> GalleryResult<Art> {
        sqlx::query_as::<_, Art>(
            "SELECT album_id, art_id, user_id, sequence_num, creation_date, title, description, img_url
             FROM arts WHERE album_id = ? AND art_id = ?",
        )
        .bind(album_id)
        .bind(art_id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => GalleryError::ArtNotFound,
            other => GalleryError::Sqlx(other),
        })
    }

    /// `PUT /art/my`: batch create/edit arts of one owned album.
    ///
    /// Every item is validated and resolved before the single transaction
    /// that writes them, so a failing item leaves the album untouched.
    /// Sequence numbers are rewritten from batch order.
    pub async fn put_arts(
        &self,
        user_id: &str,
        items: Vec<PutArtParams>,
    ) -> GalleryResult<Vec<ArtWithUpload>> {
        if items.len() > MAX_BATCH_ITEMS {
            return Err(GalleryError::BatchTooLarge);
        }
        let album_id = Self::same_album(items.iter().map(|item| item.album_id))?;
        for item in &items {
            item.validate()?;
        }
        self.album_ownership(user_id, album_id).await?;

        let mut arts = Vec::with_capacity(items.len());
        for (position, item) in items.into_iter().enumerate() {
            let sequence_num = position as i64;
            let prepared = match item.art_id {
                None => {
                    let title = item.title.ok_or(GalleryError::MissingArtFields)?;
                    let description = item.description.ok_or(GalleryError::MissingArtFields)?;
                    let art_id = Uuid::new_v4();
                    let image_key = art_image_key(album_id, art_id);
                    ArtWithUpload {
                        art: Art {
                            album_id,
                            art_id,
                            user_id: user_id.to_string(),
                            sequence_num,
                            creation_date: Utc::now(),
                            title,
                            description,
                            img_url: self.signer.download_url(&image_key),
                        },
                        upload_url: Some(self.signer.upload_url(&image_key)),
                    }
                }
                Some(art_id) => {
                    let mut art = self.get_art(album_id, art_id).await?;
                    if let Some(title) = item.title {
                        art.title = title;
                    }
                    if let Some(description) = item.description {
                        art.description = description;
                    }
                    art.sequence_num = sequence_num;
                    let mut upload_url = None;
                    if item.gen_upload_url {
                        let image_key = art_image_key(album_id, art_id);
                        art.img_url = self.signer.download_url(&image_key);
                        upload_url = Some(self.signer.upload_url(&image_key));
                    }
                    ArtWithUpload { art, upload_url }
                }
            };
            arts.push(prepared);
        }

        let mut tx = self.db.begin().await?;
        for entry in &arts {
            let art = &entry.art;
            sqlx::query(
                "INSERT INTO arts (album_id, art_id, user_id, sequence_num, creation_date, title, description, img_url)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(album_id, art_id) DO UPDATE SET
                     sequence_num = excluded.sequence_num,
                     title = excluded.title,
                     description = excluded.description,
                     img_url = excluded.img_url",
            )
            .bind(art.album_id)
            .bind(art.art_id)
            .bind(&art.user_id)
            .bind(art.sequence_num)
            .bind(art.creation_date)
            .bind(&art.title)
            .bind(&art.description)
            .bind(&art.img_url)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(arts)
    }

    /// `DELETE /art/my`: batch delete arts of one owned album. Every key
    /// must exist; the rows go in one transaction together with one removal
    /// event per art.
    pub async fn delete_arts(
        &self,
        user_id: &str,
        items: Vec<ArtKey>,
    ) -> GalleryResult<Vec<ArtKey>> {
        if items.len() > MAX_BATCH_ITEMS {
            return Err(GalleryError::BatchTooLarge);
        }
        let album_id = Self::same_album(items.iter().map(|key| key.album_id))?;
        self.album_ownership(user_id, album_id).await?;
        for key in &items {
            self.get_art(key.album_id, key.art_id).await?;
        }

        let mut tx = self.db.begin().await?;
        for key in &items {
            sqlx::query("DELETE FROM arts WHERE album_id = ? AND art_id = ?")
                .bind(key.album_id)
                .bind(key.art_id)
                .execute(&mut *tx)
                .await?;
            enqueue_removal(&mut tx, key.album_id, Some(key.art_id)).await?;
        }
        tx.commit().await?;

        Ok(items)
    }

    /// Drop every art row of an album and queue one media removal per row.
    /// Runs from the cleanup worker after the album row itself is gone;
    /// replaying it against an already-emptied album is a no-op.
    pub async fn cascade_delete_album_arts(&self, album_id: Uuid) -> GalleryResult<u64> {
        let art_ids: Vec<Uuid> = sqlx::query_scalar("SELECT art_id FROM arts WHERE album_id = ?")
            .bind(album_id)
            .fetch_all(&*self.db)
            .await?;
        if art_ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM arts WHERE album_id = ?")
            .bind(album_id)
            .execute(&mut *tx)
            .await?;
        for art_id in &art_ids {
            enqueue_removal(&mut tx, album_id, Some(*art_id)).await?;
        }
        tx.commit().await?;

        Ok(art_ids.len() as u64)
    }

    pub async fn get_user(&self, user_id: &str) -> GalleryResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT user_id, registration_date, name, nickname, email, picture
             FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&*self.db)
        .await?)
    }

    /// `PUT /user`: upsert a profile. The registration date sticks from the
    /// first insert; later calls only refresh the provider-owned fields.
    pub async fn put_user(&self, user: User) -> GalleryResult<()> {
        sqlx::query(
            "INSERT INTO users (user_id, registration_date, name, nickname, email, picture)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 name = excluded.name,
                 nickname = excluded.nickname,
                 email = excluded.email,
                 picture = excluded.picture",
        )
        .bind(&user.user_id)
        .bind(user.registration_date)
        .bind(&user.name)
        .bind(&user.nickname)
        .bind(&user.email)
        .bind(&user.picture)
        .execute(&*self.db)
        .await?;
        Ok(())
    }
}

/// Queue a removal event for the cleanup worker. Must run inside the same
/// transaction as the row deletion it describes; `art_id` of `None` marks
/// an album removal.
pub(crate) async fn enqueue_removal(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    album_id: Uuid,
    art_id: Option<Uuid>,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO record_removals (album_id, art_id, created_at, attempts, next_attempt_at)
         VALUES (?, ?, ?, 0, ?)",
    )
    .bind(album_id)
    .bind(art_id)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
