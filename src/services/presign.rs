//! Time-limited signed links for media transfer.
//!
//! A link is the media base URL plus `expires` and `signature` query
//! parameters, where the signature is a SHA-256 over the server secret, the
//! HTTP method, the object key and the expiry instant. Whoever holds a
//! fresh link can move exactly those bytes in exactly that direction and
//! nothing else, so the byte routes need no bearer auth of their own.

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

pub const DOWNLOAD_METHOD: &str = "GET";
pub const UPLOAD_METHOD: &str = "PUT";

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature mismatch")]
    Mismatch,
    #[error("link expired")]
    Expired,
}

/// Object key for an album's cover image.
pub fn album_cover_key(album_id: Uuid) -> String {
    format!("{album_id}/{album_id}")
}

/// Object key for one art's image. Keys nest under the album so a whole
/// album's media can be dropped by prefix.
pub fn art_image_key(album_id: Uuid, art_id: Uuid) -> String {
    format!("{album_id}/arts/{art_id}")
}

/// Mints and verifies signed media links. Every call mints a fresh link;
/// nothing is persisted, so verification is pure recomputation.
#[derive(Clone, Debug)]
pub struct UrlSigner {
    media_base_url: String,
    secret: String,
    expiry: Duration,
}

impl UrlSigner {
    pub fn new(
        media_base_url: impl Into<String>,
        secret: impl Into<String>,
        expiry_secs: i64,
    ) -> Self {
        let mut media_base_url = media_base_url.into();
        while media_base_url.ends_with('/') {
            media_base_url.pop();
        }
        Self {
            media_base_url,
            secret: secret.into(),
            expiry: Duration::seconds(expiry_secs),
        }
    }

    /// Signed download link for `key`, valid for the configured window.
    pub fn download_url(&self, key: &str) -> String {
        self.presign(DOWNLOAD_METHOD, key)
    }

    /// Signed upload link for `key`, valid for the configured window.
    pub fn upload_url(&self, key: &str) -> String {
        self.presign(UPLOAD_METHOD, key)
    }

    fn presign(&self, method: &str, key: &str) -> String {
        let expires = (Utc::now() + self.expiry).timestamp();
        format!(
            "{}/{}?expires={}&signature={}",
            self.media_base_url,
            key,
            expires,
            self.signature(method, key, expires)
        )
    }

    /// Check a presented link against the signing secret and the clock.
    pub fn verify(
        &self,
        method: &str,
        key: &str,
        expires: i64,
        signature: &str,
    ) -> Result<(), SignatureError> {
        if self.signature(method, key, expires) != signature {
            return Err(SignatureError::Mismatch);
        }
        if Utc::now().timestamp() > expires {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }

    fn signature(&self, method: &str, key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b"\n");
        hasher.update(method.as_bytes());
        hasher.update(b"\n");
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> UrlSigner {
        UrlSigner::new("http://localhost:3000/media", "unit-test-secret", 300)
    }

    fn parse_link(url: &str) -> (String, i64, String) {
        let (path, query) = url.split_once('?').unwrap();
        let key = path
            .strip_prefix("http://localhost:3000/media/")
            .unwrap()
            .to_string();
        let mut expires = 0;
        let mut signature = String::new();
        for pair in query.split('&') {
            let (name, value) = pair.split_once('=').unwrap();
            match name {
                "expires" => expires = value.parse().unwrap(),
                "signature" => signature = value.to_string(),
                other => panic!("unexpected query parameter {other}"),
            }
        }
        (key, expires, signature)
    }

    #[test]
    fn download_link_verifies() {
        let signer = signer();
        let key = album_cover_key(Uuid::new_v4());
        let (parsed_key, expires, signature) = parse_link(&signer.download_url(&key));
        assert_eq!(parsed_key, key);
        signer
            .verify(DOWNLOAD_METHOD, &key, expires, &signature)
            .unwrap();
    }

    #[test]
    fn upload_link_verifies_for_put_only() {
        let signer = signer();
        let key = art_image_key(Uuid::new_v4(), Uuid::new_v4());
        let (_, expires, signature) = parse_link(&signer.upload_url(&key));
        signer
            .verify(UPLOAD_METHOD, &key, expires, &signature)
            .unwrap();
        assert!(matches!(
            signer.verify(DOWNLOAD_METHOD, &key, expires, &signature),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn tampered_key_is_rejected() {
        let signer = signer();
        let key = album_cover_key(Uuid::new_v4());
        let (_, expires, signature) = parse_link(&signer.download_url(&key));
        let other_key = album_cover_key(Uuid::new_v4());
        assert!(matches!(
            signer.verify(DOWNLOAD_METHOD, &other_key, expires, &signature),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn extended_expiry_is_rejected() {
        let signer = signer();
        let key = album_cover_key(Uuid::new_v4());
        let (_, expires, signature) = parse_link(&signer.download_url(&key));
        assert!(matches!(
            signer.verify(DOWNLOAD_METHOD, &key, expires + 3600, &signature),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn expired_link_is_rejected() {
        let expired = UrlSigner::new("http://localhost:3000/media", "unit-test-secret", -60);
        let key = album_cover_key(Uuid::new_v4());
        let (_, expires, signature) = parse_link(&expired.download_url(&key));
        assert!(matches!(
            expired.verify(DOWNLOAD_METHOD, &key, expires, &signature),
            Err(SignatureError::Expired)
        ));
    }

    #[test]
    fn different_secrets_disagree() {
        let signer = signer();
        let other = UrlSigner::new("http://localhost:3000/media", "another-secret", 300);
        let key = album_cover_key(Uuid::new_v4());
        let (_, expires, signature) = parse_link(&signer.download_url(&key));
        assert!(other.verify(DOWNLOAD_METHOD, &key, expires, &signature).is_err());
    }

    #[test]
    fn key_layout_nests_arts_under_album() {
        let album_id = Uuid::new_v4();
        let art_id = Uuid::new_v4();
        assert_eq!(album_cover_key(album_id), format!("{album_id}/{album_id}"));
        assert_eq!(
            art_image_key(album_id, art_id),
            format!("{album_id}/arts/{art_id}")
        );
        assert!(art_image_key(album_id, art_id).starts_with(&format!("{album_id}/")));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let signer = UrlSigner::new("http://localhost:3000/media/", "s", 300);
        let key = album_cover_key(Uuid::new_v4());
        assert!(!signer.download_url(&key).contains("media//"));
    }
}
