//! Art endpoints: per-album listings and the batch write/delete pair.

use crate::errors::ApiResult;
use crate::handlers::{DeletedItemsResponse, ItemsResponse, ListQuery, PageResponse};
use crate::middleware::auth::AuthUser;
use crate::models::art::{Art, ArtKey, ArtWithUpload};
use crate::services::gallery_service::PutArtParams;
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use uuid::Uuid;

/// `GET /album/public/{album_id}`: page through a public album's arts.
pub async fn list_public_album_arts(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<PageResponse<Art>>> {
    let Path(album_id) = path?;
    let Query(query) = query?;
    let page = state
        .gallery
        .list_public_album_arts(album_id, query.limit.as_deref(), query.next_key.as_deref())
        .await?;
    Ok(Json(PageResponse {
        items: page.items,
        next_key: page.next_key,
    }))
}

/// `GET /album/my/{album_id}`: page through an owned album's arts.
pub async fn list_my_album_arts(
    State(state): State<AppState>,
    user: AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<PageResponse<Art>>> {
    let Path(album_id) = path?;
    let Query(query) = query?;
    let page = state
        .gallery
        .list_user_album_arts(
            user.user_id(),
            album_id,
            query.limit.as_deref(),
            query.next_key.as_deref(),
        )
        .await?;
    Ok(Json(PageResponse {
        items: page.items,
        next_key: page.next_key,
    }))
}

/// `PUT /art/my`: batch create/edit arts of one owned album, answering 201
/// with the stored items and their upload links.
pub async fn put_arts(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<Vec<PutArtParams>>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ItemsResponse<ArtWithUpload>>)> {
    let Json(items) = payload?;
    let items = state.gallery.put_arts(user.user_id(), items).await?;
    Ok((StatusCode::CREATED, Json(ItemsResponse { items })))
}

/// `DELETE /art/my`: batch delete arts of one owned album; the stored
/// images follow asynchronously.
pub async fn delete_arts(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<Vec<ArtKey>>, JsonRejection>,
) -> ApiResult<Json<DeletedItemsResponse<ArtKey>>> {
    let Json(items) = payload?;
    let items = state.gallery.delete_arts(user.user_id(), items).await?;
    Ok(Json(DeletedItemsResponse {
        message: "Arts deleted.",
        items,
    }))
}
