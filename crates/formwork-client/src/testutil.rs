//! Test helpers shared by the client's unit tests.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use httpmock::MockServer;
use serde_json::{Value, json};

use crate::config::ClientConfig;
use crate::http::HttpClient;
use crate::session::{ManualClock, SessionManager};
use crate::store::{MemoryTokenStore, PersistedToken, TokenStore};

/// Fixed "now" used by session tests: 2023-11-14T22:13:20Z.
pub(crate) const NOW_MS: i64 = 1_700_000_000_000;

/// Unsigned token carrying `claims` as its payload.
pub(crate) fn token_with_claims(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// Token for a test user expiring at `exp` (seconds since the epoch).
pub(crate) fn token_with_exp(exp: i64) -> String {
    token_with_claims(&json!({
        "sub": "user-1",
        "email": "u@x.com",
        "jti": "token-1",
        "exp": exp,
    }))
}

/// Token valid for an hour after [`NOW_MS`].
pub(crate) fn valid_token() -> String {
    token_with_exp(NOW_MS / 1_000 + 3_600)
}

pub(crate) fn http_for(server: &MockServer) -> HttpClient {
    let config = ClientConfig::builder(server.base_url().parse().expect("valid URL"))
        .build()
        .expect("valid config");
    HttpClient::new(config).expect("client")
}

/// Session manager against `server`, optionally seeded with a persisted token.
pub(crate) fn session_for(
    server: &MockServer,
    token: Option<&str>,
) -> (Arc<SessionManager>, Arc<MemoryTokenStore>, Arc<ManualClock>) {
    let store = Arc::new(MemoryTokenStore::default());
    if let Some(token) = token {
        store
            .save(&PersistedToken {
                access_token: token.to_string(),
                token_expires_at: None,
            })
            .expect("seed store");
    }
    let clock = Arc::new(ManualClock::new(NOW_MS));
    let session = Arc::new(SessionManager::new(
        http_for(server),
        store.clone(),
        clock.clone(),
    ));
    (session, store, clock)
}
