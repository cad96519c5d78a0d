//! Shared application state handed to every handler.

use crate::services::auth_service::AuthService;
use crate::services::gallery_service::GalleryService;
use crate::services::media_service::MediaService;
use crate::services::presign::UrlSigner;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub gallery: GalleryService,
    pub media: MediaService,
    pub signer: UrlSigner,
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub fn new(
        db: Arc<SqlitePool>,
        gallery: GalleryService,
        media: MediaService,
        signer: UrlSigner,
        auth: Arc<AuthService>,
    ) -> Self {
        Self {
            db,
            gallery,
            media,
            signer,
            auth,
        }
    }
}
