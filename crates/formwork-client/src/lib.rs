#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Client core for the Formwork CRM backend.
//!
//! Layout:
//! - `session.rs`: login/logout, startup check and expiry gating
//! - `records/`: paginated record listings with coalescing and invalidation
//! - `objects.rs`: object and field definitions
//! - `claims.rs`: bearer token claim decoding
//! - `store.rs`: persisted token storage
//! - `http.rs`, `config.rs`, `error.rs`: transport, configuration, errors

pub mod claims;
pub mod config;
pub mod error;
pub mod http;
pub mod objects;
pub mod records;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;

pub use claims::{Claims, decode_claims, is_token_expired, remaining_seconds};
pub use config::{ClientConfig, ClientConfigBuilder, PageLimits};
pub use error::{ApiError, AuthError, ClaimsError, ConfigError, StoreError};
pub use http::HttpClient;
pub use objects::ObjectsClient;
pub use records::{CacheEvent, HttpRecordsApi, ListQuery, PageKey, RecordCache, ViewScope};
pub use session::{AuthCheck, AuthStatus, Clock, Session, SessionManager, SystemClock};
pub use store::{FileTokenStore, MemoryTokenStore, PersistedToken, TokenStore};

/// Session, record cache and schema access wired to one backend.
#[derive(Debug, Clone)]
pub struct Formwork {
    config: ClientConfig,
    session: Arc<SessionManager>,
    records: RecordCache,
    objects: ObjectsClient,
}

impl Formwork {
    /// Wire the client against the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Wire the client against an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the HTTP client cannot be built.
    pub fn with_clock(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ApiError> {
        let http = HttpClient::new(config.clone())?;
        let session = Arc::new(SessionManager::new(http.clone(), store, clock));
        let records = RecordCache::new(
            Arc::new(HttpRecordsApi::new(http.clone(), Arc::clone(&session))),
            &config,
        );
        let objects = ObjectsClient::new(http, Arc::clone(&session));
        Ok(Self {
            config,
            session,
            records,
            objects,
        })
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session manager.
    #[must_use]
    pub const fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Record cache.
    #[must_use]
    pub const fn records(&self) -> &RecordCache {
        &self.records
    }

    /// Object and field definitions.
    #[must_use]
    pub const fn objects(&self) -> &ObjectsClient {
        &self.objects
    }

    /// Drop every cached page and record, then log out.
    pub async fn logout(&self) {
        self.records.clear();
        self.session.logout().await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::ManualClock;
    use crate::testutil::{NOW_MS, valid_token};
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn logout_clears_session_and_records() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/records");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"total": 0, "page": 1, "page_size": 50, "records": []}));
        });
        let logout = server.mock(|when, then| {
            when.method(POST).path("/api/auth/logout");
            then.status(204);
        });
        let config = ClientConfig::builder(server.base_url().parse().expect("url"))
            .build()
            .expect("config");
        let store = Arc::new(MemoryTokenStore::with_token(PersistedToken {
            access_token: valid_token(),
            token_expires_at: None,
        }));
        let client = Formwork::with_clock(config, store, Arc::new(ManualClock::new(NOW_MS)))
            .expect("client");
        assert!(client.session().check_auth().is_authenticated);

        let query = ListQuery::new();
        client.records().list("obj-1", &query).await.expect("list");
        let key = client.records().key("obj-1", &query);
        assert!(client.records().cached_page(&key).is_some());

        client.logout().await;
        logout.assert();
        assert!(client.records().cached_page(&key).is_none());
        assert_eq!(client.session().status(), AuthStatus::Unauthenticated);
        assert_eq!(
            client.records().list("obj-1", &query).await,
            Err(ApiError::Unauthenticated)
        );
        assert_eq!(client.config().page_limits(), PageLimits::default());
    }

    #[tokio::test]
    async fn logout_clears_records_before_backend_answers() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/records");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"total": 0, "page": 1, "page_size": 50, "records": []}));
        });
        let _logout = server.mock(|when, then| {
            when.method(POST).path("/api/auth/logout");
            then.status(204).delay(Duration::from_secs(2));
        });
        let config = ClientConfig::builder(server.base_url().parse().expect("url"))
            .build()
            .expect("config");
        let store = Arc::new(MemoryTokenStore::with_token(PersistedToken {
            access_token: valid_token(),
            token_expires_at: None,
        }));
        let client = Formwork::with_clock(config, store, Arc::new(ManualClock::new(NOW_MS)))
            .expect("client");
        let query = ListQuery::new();
        client.records().list("obj-1", &query).await.expect("list");
        let key = client.records().key("obj-1", &query);

        let pending = tokio::time::timeout(Duration::from_millis(200), client.logout()).await;
        assert!(pending.is_err(), "backend logout should still be pending");
        assert!(client.records().cached_page(&key).is_none());
        assert!(!client.session().is_authenticated());
    }
}
