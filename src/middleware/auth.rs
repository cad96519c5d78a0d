//! Bearer-auth layer for the `/my` and `/user` routes.
//!
//! The middleware verifies the Authorization header once per request and
//! stashes the caller's subject id as an [`AuthUser`] extension; handlers
//! pick it up through the extractor impl below.

use crate::errors::ApiError;
use crate::services::auth_service::AuthService;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// The verified subject id of the caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl AuthUser {
    pub fn user_id(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("No authentication header"))
    }
}

/// Reject the request unless it carries a valid provider token.
pub async fn require_auth(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let user_id = auth.authenticate(header).await?;

    request.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(request).await)
}
