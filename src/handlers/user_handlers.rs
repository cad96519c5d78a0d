//! User-profile endpoint.

use crate::errors::ApiResult;
use crate::handlers::MessageResponse;
use crate::middleware::auth::AuthUser;
use crate::services::auth_service::AuthService;
use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
};

/// `PUT /user`: pull the caller's profile from the identity provider and
/// upsert it. The body is empty; the same bearer token that authenticated
/// the request is replayed against the userinfo endpoint.
pub async fn put_user(
    State(state): State<AppState>,
    _user: AuthUser,
    headers: HeaderMap,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let token = AuthService::bearer_token(header)?;
    let profile = state.auth.fetch_profile(token).await?;

    state.gallery.put_user(profile.into_user()).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User profile information added or edited in database.",
        }),
    ))
}
