//! Helpers shared by command handler tests.

use std::time::Duration;

use formwork_client::{FileTokenStore, PersistedToken, TokenStore};
use httpmock::MockServer;
use tempfile::TempDir;

use crate::client::AppContext;

/// Unsigned token for `user-1` / `u@x.com` expiring in 2100.
pub(crate) const FAR_FUTURE_TOKEN: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJzdWIiOiJ1c2VyLTEiLCJlbWFpbCI6InVAeC5jb20iLCJleHAiOjQxMDI0NDQ4MDB9.sig";

/// Context against `server` with a fresh, empty session directory.
pub(crate) fn context_for(server: &MockServer) -> (AppContext, TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = context_in(server, &dir);
    (ctx, dir)
}

/// Context against `server` reusing the session kept in `dir`.
pub(crate) fn context_in(server: &MockServer, dir: &TempDir) -> AppContext {
    AppContext::new(
        server.base_url().parse().expect("valid URL"),
        Duration::from_secs(5),
        "trace-test",
        &dir.path().join("session.json"),
    )
    .expect("context")
}

/// Persist a valid session in `dir`.
pub(crate) fn seed_session(dir: &TempDir) {
    FileTokenStore::new(dir.path().join("session.json"))
        .save(&PersistedToken {
            access_token: FAR_FUTURE_TOKEN.to_string(),
            token_expires_at: None,
        })
        .expect("seed session");
}

/// Context against `server` that is already logged in.
pub(crate) fn logged_in_context(server: &MockServer) -> (AppContext, TempDir) {
    let (ctx, dir) = context_for(server);
    seed_session(&dir);
    (ctx, dir)
}
