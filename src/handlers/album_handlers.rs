//! Album endpoints.

use crate::errors::ApiResult;
use crate::handlers::{DeletedItemResponse, ItemResponse, ListQuery, PageResponse};
use crate::middleware::auth::AuthUser;
use crate::models::album::{Album, AlbumWithUpload};
use crate::services::gallery_service::{EditAlbumParams, NewAlbumParams};
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `DELETE /album/my`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeleteAlbumBody {
    pub album_id: Uuid,
}

/// Key echo in the deletion confirmation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumKey {
    pub album_id: Uuid,
}

/// `GET /album/public`: anonymous page over all public albums.
pub async fn list_public_albums(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<PageResponse<Album>>> {
    let Query(query) = query?;
    let page = state
        .gallery
        .list_public_albums(query.limit.as_deref(), query.next_key.as_deref())
        .await?;
    Ok(Json(PageResponse {
        items: page.items,
        next_key: page.next_key,
    }))
}

/// `GET /album/my`: page over the caller's own albums, any visibility.
pub async fn list_my_albums(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<PageResponse<Album>>> {
    let Query(query) = query?;
    let page = state
        .gallery
        .list_user_albums(user.user_id(), query.limit.as_deref(), query.next_key.as_deref())
        .await?;
    Ok(Json(PageResponse {
        items: page.items,
        next_key: page.next_key,
    }))
}

/// `PUT|POST /album/my`: create an album, answering 201 with the stored
/// item and its cover upload link.
pub async fn add_album(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<NewAlbumParams>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ItemResponse<AlbumWithUpload>>)> {
    let Json(params) = payload?;
    let item = state.gallery.add_album(user.user_id(), params).await?;
    Ok((StatusCode::CREATED, Json(ItemResponse { item })))
}

/// `PATCH /album/my/{album_id}`: partial edit of an owned album.
pub async fn edit_album(
    State(state): State<AppState>,
    user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<EditAlbumParams>, JsonRejection>,
) -> ApiResult<Json<ItemResponse<AlbumWithUpload>>> {
    let Path(album_id) = path?;
    let Json(params) = payload?;
    let item = state
        .gallery
        .edit_album(user.user_id(), album_id, params)
        .await?;
    Ok(Json(ItemResponse { item }))
}

/// `DELETE /album/my`: drop an owned album; arts and media follow
/// asynchronously.
pub async fn delete_album(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<DeleteAlbumBody>, JsonRejection>,
) -> ApiResult<Json<DeletedItemResponse<AlbumKey>>> {
    let Json(body) = payload?;
    let album_id = state
        .gallery
        .delete_album(user.user_id(), body.album_id)
        .await?;
    Ok(Json(DeletedItemResponse {
        message: "Album deleted.",
        item: AlbumKey { album_id },
    }))
}
