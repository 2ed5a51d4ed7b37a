//! Client configuration.
//!
//! # Design
//! - Built through [`ClientConfig::builder`]; `build()` validates every field.
//! - The base URL is normalised to end with `/` so relative endpoint paths keep
//!   any prefix the backend is mounted under.

use std::time::Duration;

use url::Url;

use crate::error::{ApiError, ConfigError};

/// Default request timeout; requests exceeding it fail as network errors.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Minimum accepted request timeout.
const MIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Page size used when a listing does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page size the client will request; larger requests are clamped.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default number of record pages retained in the cache.
pub const DEFAULT_PAGE_CACHE_CAPACITY: u64 = 1_000;

/// Validated client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: Url,
    timeout: Duration,
    trace_id: Option<String>,
    page_limits: PageLimits,
    page_cache_capacity: u64,
}

/// Page-size bounds applied to record listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Size used when the caller does not pick one.
    pub default_page_size: u32,
    /// Upper bound; larger requests are clamped to it.
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl PageLimits {
    /// Resolve a requested page size: default when absent, at least 1, at most the cap.
    #[must_use]
    pub fn clamp(self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size)
            .max(1)
    }
}

impl ClientConfig {
    /// Start building a configuration for the backend at `base_url`.
    #[must_use]
    pub fn builder(base_url: Url) -> ClientConfigBuilder {
        ClientConfigBuilder {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            trace_id: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            page_cache_capacity: DEFAULT_PAGE_CACHE_CAPACITY,
        }
    }

    /// Backend base URL, always ending with `/`.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Identifier sent as `x-request-id` on every request, if any.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Page-size bounds for listings.
    #[must_use]
    pub const fn page_limits(&self) -> PageLimits {
        self.page_limits
    }

    /// Maximum number of cached record pages.
    #[must_use]
    pub const fn page_cache_capacity(&self) -> u64 {
        self.page_cache_capacity
    }

    /// Resolve an endpoint path (without leading `/`) against the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Decode`] when the path cannot be joined.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::Decode {
                message: format!("invalid endpoint path '{path}': {err}"),
            })
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    base_url: Url,
    timeout: Duration,
    trace_id: Option<String>,
    default_page_size: u32,
    max_page_size: u32,
    page_cache_capacity: u64,
}

impl ClientConfigBuilder {
    /// Sets the per-request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the `x-request-id` header value sent with every request.
    #[must_use]
    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Sets the page size used when a listing does not specify one.
    #[must_use]
    pub const fn default_page_size(mut self, size: u32) -> Self {
        self.default_page_size = size;
        self
    }

    /// Sets the largest page size the client will request.
    #[must_use]
    pub const fn max_page_size(mut self, size: u32) -> Self {
        self.max_page_size = size;
        self
    }

    /// Sets how many record pages the cache retains.
    #[must_use]
    pub const fn page_cache_capacity(mut self, capacity: u64) -> Self {
        self.page_cache_capacity = capacity;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - the base URL cannot carry paths
    /// - `timeout` is below one second
    /// - `max_page_size` or `page_cache_capacity` is zero
    /// - `default_page_size` is zero or above `max_page_size`
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        if self.base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl {
                value: self.base_url.to_string(),
            });
        }
        if self.timeout < MIN_TIMEOUT {
            return Err(ConfigError::BelowMinimum {
                field: "timeout",
                value: format!("{}ms", self.timeout.as_millis()),
                min: "1s".to_owned(),
            });
        }
        if self.max_page_size == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "max_page_size",
                value: self.max_page_size.to_string(),
                min: "1".to_owned(),
            });
        }
        if self.default_page_size == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "default_page_size",
                value: self.default_page_size.to_string(),
                min: "1".to_owned(),
            });
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::AboveMaximum {
                field: "default_page_size",
                value: self.default_page_size.to_string(),
                max: self.max_page_size.to_string(),
            });
        }
        if self.page_cache_capacity == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "page_cache_capacity",
                value: self.page_cache_capacity.to_string(),
                min: "1".to_owned(),
            });
        }

        let mut base_url = self.base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(ClientConfig {
            base_url,
            timeout: self.timeout,
            trace_id: self.trace_id,
            page_limits: PageLimits {
                default_page_size: self.default_page_size,
                max_page_size: self.max_page_size,
            },
            page_cache_capacity: self.page_cache_capacity,
        })
    }
}
