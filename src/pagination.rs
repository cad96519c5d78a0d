//! Opaque pagination tokens.
//!
//! A token is the base64url (unpadded) encoding of a small JSON document
//! naming the sort-key values of the last item already returned. Listings
//! resume strictly after that position, so a token stays valid even when
//! the row it points at has since been deleted.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("invalid pagination token encoding")]
    Encoding,
    #[error("invalid pagination token payload")]
    Payload,
}

/// Resume point for album listings, ordered newest first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AlbumCursor {
    pub creation_date: DateTime<Utc>,
    pub album_id: Uuid,
}

/// Resume point for art listings, ordered by explicit sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArtCursor {
    pub sequence_num: i64,
    pub art_id: Uuid,
}

/// Serialize a cursor into its opaque wire form.
pub fn encode_cursor<C: Serialize>(cursor: &C) -> Result<String, CursorError> {
    let json = serde_json::to_vec(cursor).map_err(|_| CursorError::Payload)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a client-supplied token back into a typed cursor.
///
/// Every malformed input (bad base64, bad JSON, wrong shape, extra fields)
/// comes back as a `CursorError` so the API can answer 400 instead of 500.
pub fn decode_cursor<C: DeserializeOwned>(token: &str) -> Result<C, CursorError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.as_bytes())
        .map_err(|_| CursorError::Encoding)?;
    serde_json::from_slice(&bytes).map_err(|_| CursorError::Payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_album_cursor() -> AlbumCursor {
        AlbumCursor {
            creation_date: Utc.with_ymd_and_hms(2024, 5, 17, 12, 30, 45).unwrap(),
            album_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn album_cursor_round_trips() {
        let cursor = sample_album_cursor();
        let token = encode_cursor(&cursor).unwrap();
        let decoded: AlbumCursor = decode_cursor(&token).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn art_cursor_round_trips() {
        let cursor = ArtCursor {
            sequence_num: 7,
            art_id: Uuid::new_v4(),
        };
        let token = encode_cursor(&cursor).unwrap();
        let decoded: ArtCursor = decode_cursor(&token).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn token_is_urlsafe_and_unpadded() {
        let token = encode_cursor(&sample_album_cursor()).unwrap();
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn rejects_bad_base64() {
        let err = decode_cursor::<AlbumCursor>("not base64!!").unwrap_err();
        assert!(matches!(err, CursorError::Encoding));
    }

    #[test]
    fn rejects_bad_json_payload() {
        let token = URL_SAFE_NO_PAD.encode(b"{\"creationDate\":");
        let err = decode_cursor::<AlbumCursor>(&token).unwrap_err();
        assert!(matches!(err, CursorError::Payload));
    }

    #[test]
    fn rejects_wrong_cursor_shape() {
        let art_token = encode_cursor(&ArtCursor {
            sequence_num: 0,
            art_id: Uuid::new_v4(),
        })
        .unwrap();
        assert!(decode_cursor::<AlbumCursor>(&art_token).is_err());
    }

    #[test]
    fn rejects_extra_fields() {
        let token = URL_SAFE_NO_PAD.encode(
            serde_json::json!({
                "sequenceNum": 1,
                "artId": Uuid::new_v4(),
                "admin": true
            })
            .to_string(),
        );
        assert!(decode_cursor::<ArtCursor>(&token).is_err());
    }
}
