//! Bearer token claim decoding.
//!
//! Tokens are never verified client-side; the payload segment is only read to
//! learn the identity and expiry the backend embedded. Malformed tokens decode
//! to "no claims" instead of failing the caller.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ClaimsError;

/// Identity fields embedded in a bearer token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (`sub`), the user identifier.
    #[serde(
        default,
        rename = "sub",
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub subject: Option<String>,
    /// Email address of the subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Token identifier (`jti`).
    #[serde(
        default,
        rename = "jti",
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub token_id: Option<String>,
    /// Expiry in seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issue time in seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl Claims {
    /// Expiry as epoch milliseconds.
    #[must_use]
    pub fn expires_at_ms(&self) -> Option<i64> {
        self.exp.map(|exp| exp.saturating_mul(1_000))
    }
}

/// Decode the claims segment of `token`.
///
/// # Errors
///
/// Returns [`ClaimsError`] when the token has no payload segment, the segment
/// is not base64url, or it is not a JSON object of claims.
pub fn try_decode_claims(token: &str) -> Result<Claims, ClaimsError> {
    let payload = token
        .split('.')
        .nth(1)
        .map(|segment| segment.trim_end_matches('='))
        .filter(|segment| !segment.is_empty())
        .ok_or(ClaimsError::MissingPayload)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload)?;
    Ok(serde_json::from_slice::<Claims>(&bytes)?)
}

/// Decode the claims of `token`, treating any malformed input as absent.
#[must_use]
pub fn decode_claims(token: &str) -> Option<Claims> {
    match try_decode_claims(token) {
        Ok(claims) => Some(claims),
        Err(err) => {
            tracing::debug!(error = %err, "ignoring undecodable token claims");
            None
        }
    }
}

/// Whether `token` is expired at `now_ms`. Tokens without an `exp` claim count as expired.
#[must_use]
pub fn is_token_expired(token: &str, now_ms: i64) -> bool {
    decode_claims(token)
        .and_then(|claims| claims.expires_at_ms())
        .is_none_or(|expires_at| now_ms >= expires_at)
}

/// Whole seconds until `token` expires, clamped at zero.
#[must_use]
pub fn remaining_seconds(token: &str, now_ms: i64) -> u64 {
    decode_claims(token)
        .and_then(|claims| claims.expires_at_ms())
        .map_or(0, |expires_at| {
            u64::try_from(expires_at.saturating_sub(now_ms) / 1_000).unwrap_or(0)
        })
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(value)) => Some(value),
        Some(Value::Number(value)) => Some(value.to_string()),
        _ => None,
    })
}
