//! Route table for the gallery API.
//!
//! ## Structure
//! - **Public endpoints** (no auth)
//!   - `GET /healthz` / `GET /readyz` — probes
//!   - `GET /album/public` — page over public albums
//!   - `GET /album/public/{album_id}` — page over a public album's arts
//!   - `GET|PUT /media/{*key}` — byte transfer, guarded by link signatures
//!
//! - **Protected endpoints** (bearer token)
//!   - `GET|PUT|POST|DELETE /album/my` — list/create/delete own albums
//!   - `GET|PATCH /album/my/{album_id}` — list arts / edit one album
//!   - `PUT|DELETE /art/my` — batch write / batch delete arts
//!   - `PUT /user` — profile upsert from the identity provider
//!
//! The wildcard `*key` allows nested media keys like `{album}/arts/{art}`.

use crate::{
    handlers::{
        album_handlers::{add_album, delete_album, edit_album, list_my_albums, list_public_albums},
        art_handlers::{delete_arts, list_my_album_arts, list_public_album_arts, put_arts},
        health_handlers::{healthz, readyz},
        media_handlers::{download_media, upload_media},
        user_handlers::put_user,
    },
    middleware::auth::require_auth,
    state::AppState,
};
use axum::{
    Router, middleware,
    routing::{get, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the complete application router around the shared state.
///
/// The protected set runs behind [`require_auth`]; everything else answers
/// anonymously. CORS stays permissive since the browser frontend is served
/// from another origin.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/album/public", get(list_public_albums))
        .route("/album/public/{album_id}", get(list_public_album_arts))
        .route("/media/{*key}", get(download_media).put(upload_media));

    let protected = Router::new()
        .route(
            "/album/my",
            get(list_my_albums)
                .put(add_album)
                .post(add_album)
                .delete(delete_album),
        )
        .route(
            "/album/my/{album_id}",
            get(list_my_album_arts).patch(edit_album),
        )
        .route("/art/my", put(put_arts).delete(delete_arts))
        .route("/user", put(put_user))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_auth,
        ));

    public
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
