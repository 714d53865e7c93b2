//! Access token claims inspection.
//!
//! Decodes the payload segment of a token without verifying its signature.
//! Verification belongs to the identity service; the client only needs to
//! answer "should this token be refreshed before use?" and to read profile
//! claims as a fallback identity source.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use client_storage::Role;
use serde::Deserialize;

/// Safety margin applied to expiry checks, so a token that passes the local
/// check does not expire mid-flight before the server validates it.
pub const DEFAULT_EXPIRY_MARGIN_MS: i64 = 5000;

/// Claims carried in an access token payload.
///
/// Every field is optional: a token from the identity service carries the
/// standard `sub`/`exp` plus whatever profile claims it chooses to embed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    /// Expiry as seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Decode the claims of a token.
///
/// Returns `None` on any malformation (missing payload segment, invalid
/// encoding, non-JSON payload). This is not an error condition — it only
/// means no claims are available from this token.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = decode_segment(payload)?;
    serde_json::from_slice(&bytes).ok()
}

/// Decode a token segment, tolerating both the base64url alphabet tokens
/// are minted with and standard/padded base64.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    if let Ok(bytes) = URL_SAFE_NO_PAD.decode(segment) {
        return Some(bytes);
    }

    let normalized = segment.replace('-', "+").replace('_', "/");
    let padded = match normalized.len() % 4 {
        2 => format!("{}==", normalized),
        3 => format!("{}=", normalized),
        _ => normalized,
    };
    STANDARD.decode(&padded).ok()
}

/// Check whether a token is expired, with the given safety margin.
///
/// An absent token or a token with no decodable expiry claim is treated as
/// *not* expired — absence of information is not expiry. Such a token is
/// sent as-is and the server's own validation has the final word.
pub fn is_expired(token: Option<&str>, margin_ms: i64) -> bool {
    let claims = match token {
        Some(token) => decode_claims(token),
        None => return false,
    };

    match claims.and_then(|c| c.exp) {
        Some(exp) => exp * 1000 <= chrono::Utc::now().timestamp_millis() + margin_ms,
        None => false,
    }
}
