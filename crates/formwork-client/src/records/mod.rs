//! Record query cache.
//!
//! # Design
//! - Pages are cached per [`PageKey`]; any mutation of an object's records evicts
//!   every cached page of that object. Pages are never patched in place.
//! - Concurrent lookups of the same missing key share one spawned fetch. The
//!   fetch outlives any individual caller, so a dropped caller never cancels it.
//! - Each object carries an invalidation generation. A fetch only writes its
//!   page if the generation it started under is still current; older results
//!   still reach their callers but never enter the cache.
//! - The by-id record copy is the only value updated in place (merge on update).

mod api;
mod query;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use formwork_api_models::{CreateRecordRequest, Record, RecordData, RecordPage, UpdateRecordRequest};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use moka::sync::Cache;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

pub use api::{HttpRecordsApi, RecordsApi, merge_data};
pub use query::{ListQuery, PageKey, SortKey};

use crate::config::{ClientConfig, PageLimits};
use crate::error::ApiError;

const EVENT_CAPACITY: usize = 64;

type PageResult = Result<Arc<RecordPage>, ApiError>;
type PageFetch = Shared<BoxFuture<'static, PageResult>>;

/// Change notification for views rendering cached data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Every cached page of `object_id` was evicted.
    PagesInvalidated {
        /// Affected object.
        object_id: String,
    },
    /// The by-id copy of a record was written.
    RecordStored {
        /// Record identifier.
        record_id: String,
        /// Owning object.
        object_id: String,
    },
    /// A record was deleted.
    RecordRemoved {
        /// Record identifier.
        record_id: String,
        /// Owning object.
        object_id: String,
    },
    /// The whole cache was emptied.
    Cleared,
}

/// Lifetime of the view that issued a listing.
///
/// Closing the scope makes pending [`RecordCache::list_in`] calls resolve to
/// `None`; the underlying fetch still completes and populates the cache.
#[derive(Debug, Clone)]
pub struct ViewScope {
    closed: Arc<watch::Sender<bool>>,
}

impl Default for ViewScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewScope {
    /// Open scope.
    #[must_use]
    pub fn new() -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            closed: Arc::new(closed),
        }
    }

    /// Tear the view down.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    /// Whether [`ViewScope::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    async fn closed(&self) {
        let mut receiver = self.closed.subscribe();
        // The sender lives in `self`, so the wait only ends once closed.
        let _ = receiver.wait_for(|closed| *closed).await;
    }
}

struct InFlight {
    id: u64,
    fetch: PageFetch,
}

/// Bookkeeping guarded by one lock: generations, in-flight fetches and the
/// page keys cached per object.
///
/// Every page insert and every index change happens under this lock, so a
/// page present in the cache always has its key indexed.
#[derive(Default)]
struct FetchState {
    epoch: u64,
    generations: HashMap<String, u64>,
    in_flight: HashMap<PageKey, InFlight>,
    keys_by_object: HashMap<String, HashSet<PageKey>>,
    next_fetch_id: u64,
}

impl FetchState {
    fn generation(&self, object_id: &str) -> (u64, u64) {
        (
            self.epoch,
            self.generations.get(object_id).copied().unwrap_or_default(),
        )
    }

    /// Index `key` and drop keys the page cache has since evicted for capacity.
    fn index_key(&mut self, pages: &Cache<PageKey, Arc<RecordPage>>, key: PageKey) {
        let limit = pages
            .policy()
            .max_capacity()
            .map_or(usize::MAX, |capacity| {
                usize::try_from(capacity.saturating_mul(2)).unwrap_or(usize::MAX)
            });
        let keys = self.keys_by_object.entry(key.object_id.clone()).or_default();
        keys.insert(key);
        if keys.len() > limit {
            pages.run_pending_tasks();
            keys.retain(|indexed| pages.contains_key(indexed));
        }
    }
}

struct Inner {
    api: Arc<dyn RecordsApi>,
    limits: PageLimits,
    pages: Cache<PageKey, Arc<RecordPage>>,
    records: Cache<String, Record>,
    state: Mutex<FetchState>,
    events: broadcast::Sender<CacheEvent>,
}

/// Process-wide cache of record pages and records, shared by cloning.
#[derive(Clone)]
pub struct RecordCache {
    inner: Arc<Inner>,
}

impl fmt::Debug for RecordCache {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RecordCache")
            .field("api", &self.inner.api)
            .field("limits", &self.inner.limits)
            .field("pages", &self.inner.pages.entry_count())
            .finish_non_exhaustive()
    }
}

impl RecordCache {
    /// Cache in front of `api`, sized and clamped per `config`.
    #[must_use]
    pub fn new(api: Arc<dyn RecordsApi>, config: &ClientConfig) -> Self {
        let capacity = config.page_cache_capacity();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                api,
                limits: config.page_limits(),
                pages: Cache::builder().max_capacity(capacity).build(),
                records: Cache::builder()
                    .max_capacity(capacity.saturating_mul(u64::from(config.page_limits().max_page_size)))
                    .build(),
                state: Mutex::new(FetchState::default()),
                events,
            }),
        }
    }

    /// Observe cache changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    /// Normalised key for a listing of `object_id`.
    #[must_use]
    pub fn key(&self, object_id: &str, query: &ListQuery) -> PageKey {
        query.to_key(object_id, self.inner.limits)
    }

    /// Cached page for `key`, without fetching.
    #[must_use]
    pub fn cached_page(&self, key: &PageKey) -> Option<Arc<RecordPage>> {
        self.inner.pages.get(key)
    }

    /// Cached copy of a record, without fetching.
    #[must_use]
    pub fn cached_record(&self, record_id: &str) -> Option<Record> {
        self.inner.records.get(record_id)
    }

    /// Return the cached page for the query, fetching it when missing.
    ///
    /// A non-blank `search` routes through the search listing.
    ///
    /// # Errors
    ///
    /// Returns the [`ApiError`] of the fetch; every coalesced caller sees the same one.
    pub async fn list(
        &self,
        object_id: &str,
        query: &ListQuery,
    ) -> Result<Arc<RecordPage>, ApiError> {
        let key = self.key(object_id, query);
        self.page(key).await
    }

    /// Like [`RecordCache::list`], but resolves to `None` once `scope` is closed.
    ///
    /// # Errors
    ///
    /// Same as [`RecordCache::list`] while the scope is open.
    pub async fn list_in(
        &self,
        scope: &ViewScope,
        object_id: &str,
        query: &ListQuery,
    ) -> Result<Option<Arc<RecordPage>>, ApiError> {
        if scope.is_closed() {
            return Ok(None);
        }
        tokio::select! {
            biased;
            () = scope.closed() => {
                debug!(object_id, "view closed before page arrived");
                Ok(None)
            }
            result = self.list(object_id, query) => {
                if scope.is_closed() {
                    Ok(None)
                } else {
                    result.map(Some)
                }
            }
        }
    }

    /// Fetch a record and refresh its by-id copy.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] when the record does not exist, or any other
    /// failure of the call. The cache is unchanged on failure.
    pub async fn get_by_id(&self, record_id: &str) -> Result<Record, ApiError> {
        let record = self.inner.api.get(record_id).await?;
        self.store_record(record.clone());
        Ok(record)
    }

    /// Create a record and evict every page of `object_id`.
    ///
    /// # Errors
    ///
    /// Returns the failure of the call; the cache is unchanged on failure.
    pub async fn create(
        &self,
        object_id: &str,
        data: RecordData,
        primary_value: Option<String>,
    ) -> Result<Record, ApiError> {
        let request = CreateRecordRequest {
            object_id: object_id.to_string(),
            data,
            primary_value,
        };
        let record = self.inner.api.create(&request).await?;
        info!(record_id = %record.id, object_id, "record created");
        self.store_record(record.clone());
        self.invalidate_object(object_id);
        if record.object_id != object_id {
            self.invalidate_object(&record.object_id);
        }
        Ok(record)
    }

    /// Merge `patch` into a record and evict every page of its object.
    ///
    /// The by-id copy becomes the previous copy with the returned data merged
    /// over it, so keys absent from the response survive locally.
    ///
    /// # Errors
    ///
    /// Returns the failure of the call; the cache is unchanged on failure.
    pub async fn update(
        &self,
        record_id: &str,
        patch: RecordData,
        primary_value: Option<String>,
    ) -> Result<Record, ApiError> {
        let request = UpdateRecordRequest {
            data: patch,
            primary_value,
        };
        let returned = self.inner.api.update(record_id, &request).await?;

        let (merged, previous_object) = {
            let _state = self.inner.state.lock();
            let previous = self.inner.records.get(record_id);
            let previous_object = previous.as_ref().map(|record| record.object_id.clone());
            let merged = match previous {
                Some(previous) => Record {
                    data: merge_data(&previous.data, &returned.data),
                    ..returned
                },
                None => returned,
            };
            self.inner
                .records
                .insert(record_id.to_string(), merged.clone());
            (merged, previous_object)
        };
        info!(record_id, object_id = %merged.object_id, "record updated");
        self.emit(CacheEvent::RecordStored {
            record_id: record_id.to_string(),
            object_id: merged.object_id.clone(),
        });

        self.invalidate_object(&merged.object_id);
        if let Some(previous_object) = previous_object.filter(|id| *id != merged.object_id) {
            self.invalidate_object(&previous_object);
        }
        Ok(merged)
    }

    /// Delete a record, drop its copy and evict every page of `object_id`.
    ///
    /// # Errors
    ///
    /// Returns the failure of the call; the cache is unchanged on failure.
    pub async fn delete(&self, record_id: &str, object_id: &str) -> Result<(), ApiError> {
        self.inner.api.delete(record_id).await?;
        info!(record_id, object_id, "record deleted");
        self.inner.records.invalidate(record_id);
        self.emit(CacheEvent::RecordRemoved {
            record_id: record_id.to_string(),
            object_id: object_id.to_string(),
        });
        self.invalidate_object(object_id);
        Ok(())
    }

    /// Evict every cached page of `object_id` and orphan its in-flight fetches.
    pub fn invalidate_object(&self, object_id: &str) {
        let evicted = {
            let mut state = self.inner.state.lock();
            *state.generations.entry(object_id.to_string()).or_default() += 1;
            state.in_flight.retain(|key, _| key.object_id != object_id);
            let keys = state.keys_by_object.remove(object_id).unwrap_or_default();
            for key in &keys {
                self.inner.pages.invalidate(key);
            }
            keys.len()
        };
        debug!(object_id, evicted, "record pages invalidated");
        self.emit(CacheEvent::PagesInvalidated {
            object_id: object_id.to_string(),
        });
    }

    /// Drop everything, including in-flight fetches. Used on logout.
    pub fn clear(&self) {
        {
            let mut state = self.inner.state.lock();
            state.epoch += 1;
            state.generations.clear();
            state.in_flight.clear();
            state.keys_by_object.clear();
            self.inner.pages.invalidate_all();
            self.inner.records.invalidate_all();
        }
        debug!("record cache cleared");
        self.emit(CacheEvent::Cleared);
    }

    async fn page(&self, key: PageKey) -> PageResult {
        let fetch = {
            let mut state = self.inner.state.lock();
            if let Some(page) = self.inner.pages.get(&key) {
                debug!(object_id = %key.object_id, page = key.page, "record page cache hit");
                return Ok(page);
            }
            if let Some(in_flight) = state.in_flight.get(&key) {
                debug!(object_id = %key.object_id, page = key.page, "joining in-flight fetch");
                in_flight.fetch.clone()
            } else {
                state.next_fetch_id += 1;
                let id = state.next_fetch_id;
                let generation = state.generation(&key.object_id);
                let handle = tokio::spawn(run_fetch(
                    Arc::clone(&self.inner),
                    key.clone(),
                    id,
                    generation,
                ));
                let fetch = async move {
                    handle.await.unwrap_or_else(|err| {
                        Err(ApiError::Network {
                            status: None,
                            message: format!("record fetch aborted: {err}"),
                        })
                    })
                }
                .boxed()
                .shared();
                state.in_flight.insert(
                    key,
                    InFlight {
                        id,
                        fetch: fetch.clone(),
                    },
                );
                fetch
            }
        };
        fetch.await
    }

    fn store_record(&self, record: Record) {
        let event = CacheEvent::RecordStored {
            record_id: record.id.clone(),
            object_id: record.object_id.clone(),
        };
        {
            let _state = self.inner.state.lock();
            self.inner.records.insert(record.id.clone(), record);
        }
        self.emit(event);
    }

    fn emit(&self, event: CacheEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

async fn run_fetch(inner: Arc<Inner>, key: PageKey, id: u64, generation: (u64, u64)) -> PageResult {
    let result = if key.is_search() {
        inner.api.search(&key).await
    } else {
        inner.api.list(&key).await
    }
    .map(Arc::new);

    let mut state = inner.state.lock();
    if state.in_flight.get(&key).is_some_and(|in_flight| in_flight.id == id) {
        state.in_flight.remove(&key);
    }
    if let Ok(page) = &result {
        if state.generation(&key.object_id) == generation {
            inner.pages.insert(key.clone(), Arc::clone(page));
            state.index_key(&inner.pages, key);
        } else {
            debug!(object_id = %key.object_id, page = key.page, "discarding page fetched before invalidation");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testutil::{http_for, session_for, valid_token};
    use formwork_api_models::SortOrder;
    use httpmock::Method::PATCH;
    use httpmock::prelude::*;
    use serde_json::{Value, json};

    fn cache_for(server: &MockServer) -> RecordCache {
        let (session, _, _) = session_for(server, Some(&valid_token()));
        let http = http_for(server);
        let config = http.config().clone();
        RecordCache::new(Arc::new(HttpRecordsApi::new(http, session)), &config)
    }

    fn page_body(total: u64) -> Value {
        json!({
            "total": total,
            "page": 1,
            "page_size": 50,
            "records": [{"id": "rec-1", "object_id": "obj-1", "data": {"a": 0, "b": 2}}]
        })
    }

    fn record_body(data: &Value) -> Value {
        json!({"id": "rec-1", "object_id": "obj-1", "data": data})
    }

    fn data(value: &Value) -> RecordData {
        value.as_object().cloned().expect("object")
    }

    fn mock_listing(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/records")
                .query_param("object_id", "obj-1");
            then.status(200)
                .header("content-type", "application/json")
                .delay(Duration::from_millis(100))
                .json_body(page_body(1));
        })
    }

    #[tokio::test]
    async fn identical_concurrent_lists_share_one_request() {
        let server = MockServer::start_async().await;
        let listing = mock_listing(&server);
        let cache = cache_for(&server);
        let query = ListQuery::new();

        let (first, second) = tokio::join!(cache.list("obj-1", &query), cache.list("obj-1", &query));
        let first = first.expect("first list");
        let second = second.expect("second list");
        assert!(Arc::ptr_eq(&first, &second));
        listing.assert_calls(1);

        cache.list("obj-1", &query).await.expect("cached");
        listing.assert_calls(1);
    }

    #[tokio::test]
    async fn oversized_page_is_clamped() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/records")
                .query_param("page_size", "100");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(page_body(0));
        });
        let cache = cache_for(&server);

        cache
            .list("obj-1", &ListQuery::new().page_size(200))
            .await
            .expect("list");
        mock.assert();
    }

    #[tokio::test]
    async fn search_and_plain_listing_are_cached_separately() {
        let server = MockServer::start_async().await;
        let plain = mock_listing(&server);
        let search = server.mock(|when, then| {
            when.method(GET)
                .path("/api/records/search")
                .query_param("q", "acme");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(page_body(0));
        });
        let cache = cache_for(&server);

        let listed = cache.list("obj-1", &ListQuery::new()).await.expect("list");
        let found = cache
            .list("obj-1", &ListQuery::new().search("acme"))
            .await
            .expect("search");
        assert_eq!(listed.total, 1);
        assert_eq!(found.total, 0);
        plain.assert_calls(1);
        search.assert_calls(1);
    }

    async fn prime(cache: &RecordCache, queries: &[ListQuery], keys: &[PageKey]) {
        for query in queries {
            cache.list("obj-1", query).await.expect("prime");
        }
        assert!(keys.iter().all(|key| cache.cached_page(key).is_some()));
    }

    #[tokio::test]
    async fn every_mutation_evicts_all_pages_of_the_object() {
        let server = MockServer::start_async().await;
        let listing = mock_listing(&server);
        let search = server.mock(|when, then| {
            when.method(GET)
                .path("/api/records/search")
                .query_param("q", "acme");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(page_body(0));
        });
        server.mock(|when, then| {
            when.method(POST).path("/api/records");
            then.status(201)
                .header("content-type", "application/json")
                .json_body(record_body(&json!({"a": 5})));
        });
        server.mock(|when, then| {
            when.method(PATCH).path("/api/records/rec-1");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(record_body(&json!({"a": 1})));
        });
        server.mock(|when, then| {
            when.method(DELETE).path("/api/records/rec-1");
            then.status(204);
        });
        let cache = cache_for(&server);
        let queries = [
            ListQuery::new(),
            ListQuery::new().page(2),
            ListQuery::new().search("acme"),
            ListQuery::new().sort("name", SortOrder::Desc),
        ];
        let keys: Vec<PageKey> = queries.iter().map(|query| cache.key("obj-1", query)).collect();
        let mut events = cache.subscribe();

        let assert_evicted = |step: &str| {
            for key in &keys {
                assert!(cache.cached_page(key).is_none(), "{step} left {key:?} cached");
            }
        };

        prime(&cache, &queries, &keys).await;
        cache.create("obj-1", data(&json!({"a": 5})), None).await.expect("create");
        assert_evicted("create");

        prime(&cache, &queries, &keys).await;
        cache.update("rec-1", data(&json!({"a": 1})), None).await.expect("update");
        assert_evicted("update");

        prime(&cache, &queries, &keys).await;
        cache.delete("rec-1", "obj-1").await.expect("delete");
        assert_evicted("delete");
        assert!(cache.cached_record("rec-1").is_none());
        listing.assert_calls(9);
        search.assert_calls(3);

        let mut invalidations = 0;
        while let Ok(event) = events.try_recv() {
            if event == (CacheEvent::PagesInvalidated { object_id: "obj-1".into() }) {
                invalidations += 1;
            }
        }
        assert_eq!(invalidations, 3);
    }

    #[tokio::test]
    async fn page_index_stays_bounded_by_cache_capacity() {
        let server = MockServer::start_async().await;
        let listing = server.mock(|when, then| {
            when.method(GET).path("/api/records");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(page_body(1));
        });
        let (session, _, _) = session_for(&server, Some(&valid_token()));
        let config = ClientConfig::builder(server.base_url().parse().expect("url"))
            .page_cache_capacity(2)
            .build()
            .expect("config");
        let cache = RecordCache::new(
            Arc::new(HttpRecordsApi::new(http_for(&server), session)),
            &config,
        );

        for page in 1..=20 {
            cache
                .list("obj-1", &ListQuery::new().page(page))
                .await
                .expect("list");
            let indexed = cache.inner.state.lock().keys_by_object["obj-1"].len();
            assert!(indexed <= 5, "index grew to {indexed} keys");
        }
        listing.assert_calls(20);

        cache.invalidate_object("obj-1");
        assert!(!cache.inner.state.lock().keys_by_object.contains_key("obj-1"));
        for page in 1..=20 {
            let key = cache.key("obj-1", &ListQuery::new().page(page));
            assert!(cache.cached_page(&key).is_none());
        }
    }

    #[tokio::test]
    async fn update_merges_into_cached_copy() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/records/rec-1");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(record_body(&json!({"a": 0, "b": 2})));
        });
        let patch = server.mock(|when, then| {
            when.method(PATCH)
                .path("/api/records/rec-1")
                .json_body(json!({"data": {"a": 1}}));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(record_body(&json!({"a": 1})));
        });
        let cache = cache_for(&server);

        cache.get_by_id("rec-1").await.expect("get");
        let updated = cache
            .update("rec-1", data(&json!({"a": 1})), None)
            .await
            .expect("update");
        patch.assert();

        assert_eq!(Value::Object(updated.data), json!({"a": 1, "b": 2}));
        let cached = cache.cached_record("rec-1").expect("cached copy");
        assert_eq!(Value::Object(cached.data), json!({"a": 1, "b": 2}));
    }

    #[tokio::test]
    async fn failed_mutation_leaves_cache_untouched() {
        let server = MockServer::start_async().await;
        let _listing = mock_listing(&server);
        server.mock(|when, then| {
            when.method(PATCH).path("/api/records/rec-1");
            then.status(422)
                .header("content-type", "application/json")
                .json_body(json!({"detail": [{"loc": ["body", "data", "email"], "msg": "invalid email"}]}));
        });
        let cache = cache_for(&server);
        let key = cache.key("obj-1", &ListQuery::new());
        cache.list("obj-1", &ListQuery::new()).await.expect("prime");

        let err = cache
            .update("rec-1", data(&json!({"email": "nope"})), None)
            .await
            .expect_err("update should fail");
        assert_eq!(err.field_errors().get("email").map(Vec::len), Some(1));
        assert!(cache.cached_page(&key).is_some());
        assert!(cache.cached_record("rec-1").is_none());
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/records/missing");
            then.status(404)
                .header("content-type", "application/json")
                .json_body(json!({"detail": "Record not found"}));
        });
        let cache = cache_for(&server);

        let err = cache.get_by_id("missing").await.expect_err("404");
        assert_eq!(
            err,
            ApiError::NotFound {
                message: "Record not found".into()
            }
        );
    }

    #[tokio::test]
    async fn page_fetched_before_invalidation_is_returned_but_not_cached() {
        let server = MockServer::start_async().await;
        let listing = mock_listing(&server);
        let cache = cache_for(&server);
        let key = cache.key("obj-1", &ListQuery::new());

        let pending = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.list("obj-1", &ListQuery::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        cache.invalidate_object("obj-1");

        let page = pending.await.expect("join").expect("stale page");
        assert_eq!(page.total, 1);
        assert!(cache.cached_page(&key).is_none());

        cache.list("obj-1", &ListQuery::new()).await.expect("fresh");
        assert!(cache.cached_page(&key).is_some());
        listing.assert_calls(2);
    }

    #[tokio::test]
    async fn closed_scope_discards_late_page() {
        let server = MockServer::start_async().await;
        let listing = mock_listing(&server);
        let cache = cache_for(&server);
        let key = cache.key("obj-1", &ListQuery::new());
        let scope = ViewScope::new();

        let pending = {
            let cache = cache.clone();
            let scope = scope.clone();
            tokio::spawn(async move { cache.list_in(&scope, "obj-1", &ListQuery::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        scope.close();

        assert_eq!(pending.await.expect("join"), Ok(None));
        assert!(scope.is_closed());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(cache.cached_page(&key).is_some());
        listing.assert_calls(1);
    }

    #[tokio::test]
    async fn clear_drops_pages_and_records() {
        let server = MockServer::start_async().await;
        let _listing = mock_listing(&server);
        let cache = cache_for(&server);
        let key = cache.key("obj-1", &ListQuery::new());
        cache.list("obj-1", &ListQuery::new()).await.expect("prime");

        cache.clear();
        assert!(cache.cached_page(&key).is_none());
    }
}
