//! Shared fixtures: an app wired to an in-memory database and a temp media
//! root, plus seeding helpers that go through the service layer.

use art_gallery::config::AuthSettings;
use art_gallery::db;
use art_gallery::jobs::reactor::CleanupWorker;
use art_gallery::models::album::{Album, Visibility};
use art_gallery::models::art::Art;
use art_gallery::models::user::User;
use art_gallery::services::auth_service::AuthService;
use art_gallery::services::gallery_service::{GalleryService, NewAlbumParams, PutArtParams};
use art_gallery::services::media_service::MediaService;
use art_gallery::services::presign::UrlSigner;
use art_gallery::state::AppState;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const PUBLIC_BASE: &str = "http://localhost:3000";

pub struct TestApp {
    pub state: AppState,
    pub worker: CleanupWorker,
    pub media_root: TempDir,
}

/// App against an in-memory database and a throwaway media directory. The
/// auth service points at an unroutable endpoint, so anything that would
/// actually call the identity provider fails fast.
pub async fn create_test_app() -> TestApp {
    create_test_app_with_auth(offline_auth_settings()).await
}

pub async fn create_test_app_with_auth(auth_settings: AuthSettings) -> TestApp {
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect to in-memory sqlite"),
    );
    db::run_migrations(&db).await.expect("run migrations");

    let media_root = TempDir::new().expect("create media temp dir");
    let signer = UrlSigner::new(format!("{PUBLIC_BASE}/media"), TEST_SECRET, 300);
    let gallery = GalleryService::new(db.clone(), signer.clone());
    let media = MediaService::new(db.clone(), media_root.path());
    let auth = Arc::new(AuthService::new(auth_settings));
    let worker = CleanupWorker::new(db.clone(), gallery.clone(), media.clone());
    let state = AppState::new(db, gallery, media, signer, auth);

    TestApp {
        state,
        worker,
        media_root,
    }
}

pub fn offline_auth_settings() -> AuthSettings {
    AuthSettings {
        jwks_uri: "http://127.0.0.1:1/jwks.json".into(),
        audience: "https://gallery-api".into(),
        issuer: "http://127.0.0.1:1/".into(),
        user_info_uri: "http://127.0.0.1:1/userinfo".into(),
    }
}

pub async fn seed_user(state: &AppState, user_id: &str, name: &str) {
    state
        .gallery
        .put_user(User {
            user_id: user_id.to_string(),
            registration_date: Utc::now(),
            name: Some(name.to_string()),
            nickname: None,
            email: Some(format!("{name}@example.com")),
            picture: None,
        })
        .await
        .expect("seed user");
}

pub async fn seed_album(
    state: &AppState,
    user_id: &str,
    visibility: Visibility,
    title: &str,
) -> Album {
    state
        .gallery
        .add_album(
            user_id,
            NewAlbumParams {
                visibility,
                title: title.to_string(),
                description: format!("{title} description"),
            },
        )
        .await
        .expect("seed album")
        .album
}

pub async fn seed_arts(
    state: &AppState,
    user_id: &str,
    album_id: Uuid,
    count: usize,
) -> Vec<Art> {
    let items = (0..count)
        .map(|i| PutArtParams {
            album_id,
            art_id: None,
            title: Some(format!("art {i}")),
            description: Some(format!("art {i} description")),
            gen_upload_url: false,
        })
        .collect();
    state
        .gallery
        .put_arts(user_id, items)
        .await
        .expect("seed arts")
        .into_iter()
        .map(|entry| entry.art)
        .collect()
}
