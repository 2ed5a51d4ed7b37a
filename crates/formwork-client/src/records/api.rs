//! Backend record endpoints.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use formwork_api_models::{
    CreateRecordRequest, Record, RecordData, RecordPage, UpdateRecordRequest,
};
use reqwest::Method;
use tracing::debug;

use crate::error::ApiError;
use crate::http::HttpClient;
use crate::records::query::PageKey;
use crate::session::SessionManager;

const RECORDS_PATH: &str = "api/records";
const SEARCH_PATH: &str = "api/records/search";

/// Record operations against the backend. Every call is authenticated.
#[async_trait]
pub trait RecordsApi: Send + Sync + fmt::Debug {
    /// Plain paginated listing.
    async fn list(&self, key: &PageKey) -> Result<RecordPage, ApiError>;

    /// Search listing; `key.search` carries the query text.
    async fn search(&self, key: &PageKey) -> Result<RecordPage, ApiError>;

    /// Fetch one record.
    async fn get(&self, record_id: &str) -> Result<Record, ApiError>;

    /// Create a record.
    async fn create(&self, request: &CreateRecordRequest) -> Result<Record, ApiError>;

    /// Merge `request.data` into an existing record.
    async fn update(
        &self,
        record_id: &str,
        request: &UpdateRecordRequest,
    ) -> Result<Record, ApiError>;

    /// Delete a record.
    async fn delete(&self, record_id: &str) -> Result<(), ApiError>;
}

/// [`RecordsApi`] over HTTP, authenticated through the session.
#[derive(Debug, Clone)]
pub struct HttpRecordsApi {
    http: HttpClient,
    session: Arc<SessionManager>,
}

impl HttpRecordsApi {
    /// Bind the record endpoints to `session`.
    #[must_use]
    pub const fn new(http: HttpClient, session: Arc<SessionManager>) -> Self {
        Self { http, session }
    }

    async fn fetch_page(&self, path: &str, key: &PageKey) -> Result<RecordPage, ApiError> {
        let bearer = self.session.bearer()?;
        let url = self.http.endpoint(path)?;
        debug!(object_id = %key.object_id, page = key.page, search = key.is_search(), "fetching record page");
        let request = self
            .http
            .request(Method::GET, url, Some(&bearer))
            .query(&key.query_pairs());
        self.authorized(self.http.send_json(request).await)
    }

    /// A 401 on a protected call means the token is no longer accepted.
    fn authorized<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        match result {
            Err(ApiError::InvalidCredentials) => {
                self.session.invalidate();
                Err(ApiError::Unauthenticated)
            }
            other => other,
        }
    }
}

#[async_trait]
impl RecordsApi for HttpRecordsApi {
    async fn list(&self, key: &PageKey) -> Result<RecordPage, ApiError> {
        self.fetch_page(RECORDS_PATH, key).await
    }

    async fn search(&self, key: &PageKey) -> Result<RecordPage, ApiError> {
        self.fetch_page(SEARCH_PATH, key).await
    }

    async fn get(&self, record_id: &str) -> Result<Record, ApiError> {
        let bearer = self.session.bearer()?;
        let url = self.http.resource(RECORDS_PATH, record_id)?;
        self.authorized(
            self.http
                .send_json(self.http.request(Method::GET, url, Some(&bearer)))
                .await,
        )
    }

    async fn create(&self, request: &CreateRecordRequest) -> Result<Record, ApiError> {
        let bearer = self.session.bearer()?;
        let url = self.http.endpoint(RECORDS_PATH)?;
        let request = self
            .http
            .request(Method::POST, url, Some(&bearer))
            .json(request);
        self.authorized(self.http.send_json(request).await)
    }

    async fn update(
        &self,
        record_id: &str,
        request: &UpdateRecordRequest,
    ) -> Result<Record, ApiError> {
        let bearer = self.session.bearer()?;
        let url = self.http.resource(RECORDS_PATH, record_id)?;
        let request = self
            .http
            .request(Method::PATCH, url, Some(&bearer))
            .json(request);
        self.authorized(self.http.send_json(request).await)
    }

    async fn delete(&self, record_id: &str) -> Result<(), ApiError> {
        let bearer = self.session.bearer()?;
        let url = self.http.resource(RECORDS_PATH, record_id)?;
        let result = self
            .http
            .send(self.http.request(Method::DELETE, url, Some(&bearer)))
            .await
            .map(drop);
        self.authorized(result)
    }
}

/// Shallow merge: keys in `patch` overwrite matching keys in `base`.
#[must_use]
pub fn merge_data(base: &RecordData, patch: &RecordData) -> RecordData {
    let mut merged = base.clone();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}
