//! Bearer-token verification against the identity provider, plus profile
//! retrieval from its userinfo endpoint.
//!
//! Tokens are RS256 JWTs. The signing key is looked up by `kid` in the
//! provider's JWKS document, which is fetched lazily and cached for the
//! process lifetime; a key rotation shows up as a cache miss and triggers a
//! refetch.

use crate::config::AuthSettings;
use crate::errors::{ApiError, ApiResult};
use crate::models::user::User;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

const NO_AUTH_HEADER: &str = "No authentication header";
const MALFORMED_TOKEN: &str = "Malformed token.";
const INVALID_TOKEN: &str = "Invalid token.";
const AUTH_PROCESS_ERROR: &str = "There was an error with the auth process.";

/// Profile payload as the userinfo endpoint reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderProfile {
    pub sub: String,
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
}

impl ProviderProfile {
    /// Materialize a `User` row. The registration stamp set here only
    /// survives for first-time rows; upserts keep the stored one.
    pub fn into_user(self) -> User {
        User {
            user_id: self.sub,
            registration_date: Utc::now(),
            name: self.name,
            nickname: self.nickname,
            email: self.email,
            picture: self.picture,
        }
    }
}

/// Identity providers, recognized by the subject-id prefix before `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityProvider {
    Auth0,
    Google,
    Other,
}

impl IdentityProvider {
    pub fn from_subject(sub: &str) -> Self {
        match sub.split('|').next() {
            Some("auth0") => IdentityProvider::Auth0,
            Some("google-oauth2") => IdentityProvider::Google,
            _ => IdentityProvider::Other,
        }
    }

    /// Normalize provider quirks. Database-account profiles carry the login
    /// handle in `name` and the display name in `nickname`, so those two
    /// are swapped.
    pub fn normalize(self, mut profile: ProviderProfile) -> ProviderProfile {
        if self == IdentityProvider::Auth0 {
            std::mem::swap(&mut profile.name, &mut profile.nickname);
        }
        profile
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

/// One JWKS entry. Fields are optional so non-RSA keys in the document are
/// skipped instead of failing the whole fetch.
#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

pub struct AuthService {
    http: reqwest::Client,
    jwks_uri: String,
    audience: String,
    issuer: String,
    user_info_uri: String,
    keys: RwLock<HashMap<String, DecodingKey>>,
}

impl AuthService {
    pub fn new(settings: AuthSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            jwks_uri: settings.jwks_uri,
            audience: settings.audience,
            issuer: settings.issuer,
            user_info_uri: settings.user_info_uri,
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Strip the bearer scheme (case-insensitive) from an Authorization
    /// header value.
    pub fn bearer_token(header: Option<&str>) -> ApiResult<&str> {
        let header = header.ok_or_else(|| ApiError::unauthorized(NO_AUTH_HEADER))?;
        let scheme = header
            .get(..7)
            .ok_or_else(|| ApiError::unauthorized(MALFORMED_TOKEN))?;
        if !scheme.eq_ignore_ascii_case("bearer ") {
            return Err(ApiError::unauthorized(MALFORMED_TOKEN));
        }
        let token = header[7..].trim();
        if token.is_empty() {
            return Err(ApiError::unauthorized(MALFORMED_TOKEN));
        }
        Ok(token)
    }

    /// Verify the Authorization header and return the caller's subject id.
    pub async fn authenticate(&self, header: Option<&str>) -> ApiResult<String> {
        let token = Self::bearer_token(header)?;
        let jose = decode_header(token).map_err(|_| ApiError::unauthorized(INVALID_TOKEN))?;
        let kid = jose
            .kid
            .ok_or_else(|| ApiError::unauthorized(INVALID_TOKEN))?;
        let key = self.signing_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = decode::<Claims>(token, &key, &validation)
            .map_err(|_| ApiError::unauthorized(INVALID_TOKEN))?;
        Ok(data.claims.sub)
    }

    /// Fetch the caller's profile from the userinfo endpoint and normalize
    /// provider quirks.
    pub async fn fetch_profile(&self, token: &str) -> ApiResult<ProviderProfile> {
        let profile: ProviderProfile = self
            .http
            .get(&self.user_info_uri)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(IdentityProvider::from_subject(&profile.sub).normalize(profile))
    }

    /// Resolve the signing key for `kid`, hitting the JWKS endpoint on a
    /// cache miss.
    async fn signing_key(&self, kid: &str) -> ApiResult<DecodingKey> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        let jwks: Jwks = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(provider_failure)?
            .error_for_status()
            .map_err(provider_failure)?
            .json()
            .await
            .map_err(provider_failure)?;

        let mut keys = self.keys.write().await;
        for jwk in jwks.keys {
            let (Some(kid), Some(n), Some(e)) = (jwk.kid, jwk.n, jwk.e) else {
                continue;
            };
            if let Ok(key) = DecodingKey::from_rsa_components(&n, &e) {
                keys.insert(kid, key);
            }
        }

        keys.get(kid)
            .cloned()
            .ok_or_else(|| ApiError::internal(AUTH_PROCESS_ERROR))
    }
}

fn provider_failure(err: reqwest::Error) -> ApiError {
    tracing::error!("identity provider request failed: {}", err);
    ApiError::internal(AUTH_PROCESS_ERROR)
}
