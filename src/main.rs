use anyhow::Result;
use art_gallery::{
    config::AppConfig,
    db,
    jobs::reactor::CleanupWorker,
    routes::routes,
    services::{
        auth_service::AuthService, gallery_service::GalleryService, media_service::MediaService,
        presign::UrlSigner,
    },
    state::AppState,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!(
        "Starting art-gallery on {} (database {}, media at {})",
        cfg.addr(),
        cfg.database_url,
        cfg.media_dir
    );

    // --- Ensure media directory exists ---
    if !Path::new(&cfg.media_dir).exists() {
        fs::create_dir_all(&cfg.media_dir)?;
        tracing::info!("Created media directory at {}", cfg.media_dir);
    }

    // --- Initialize SQLite connection ---
    let db_path = cfg
        .database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");

    // Create parent directory and the database file itself if needed;
    // SQLx won't create either on connect.
    if db_path != ":memory:" {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
                tracing::info!("Created missing directory {:?}", parent);
            }
        }
        match fs::OpenOptions::new().create(true).append(true).open(db_path) {
            Ok(_) => {}
            Err(err) => tracing::warn!("Failed to prepare database file {}: {}", db_path, err),
        }
    }

    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&cfg.database_url)
            .await?,
    );

    // --- Handle migration mode ---
    if migrate {
        db::run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize services ---
    let signer = UrlSigner::new(
        cfg.media_base_url(),
        cfg.signing_secret.clone(),
        cfg.signed_url_expiry_secs,
    );
    let gallery = GalleryService::new(db.clone(), signer.clone());
    let media = MediaService::new(db.clone(), cfg.media_dir.clone());
    let auth = Arc::new(AuthService::new(cfg.auth.clone()));

    // --- Start deferred-cleanup worker ---
    Arc::new(CleanupWorker::new(db.clone(), gallery.clone(), media.clone())).spawn();

    // --- Build router ---
    let state = AppState::new(db, gallery, media, signer, auth);
    let app = routes::router(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
