//! Shared HTTP transport for backend calls.

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ClientConfig;
use crate::error::ApiError;

/// Header carrying the per-process trace identifier.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Thin wrapper over [`reqwest::Client`] bound to one backend.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: ClientConfig,
}

impl HttpClient {
    /// Construct a client with the configured timeout and default headers.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the underlying client cannot be built
    /// or the trace identifier is not a valid header value.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let mut default_headers = HeaderMap::new();
        if let Some(trace_id) = config.trace_id() {
            let request_id = HeaderValue::from_str(trace_id).map_err(|_| ApiError::Network {
                status: None,
                message: "trace identifier contains invalid characters".to_string(),
            })?;
            default_headers.insert(HEADER_REQUEST_ID, request_id);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(default_headers)
            .build()
            .map_err(|err| ApiError::Network {
                status: None,
                message: format!("failed to build HTTP client: {err}"),
            })?;

        Ok(Self { client, config })
    }

    /// Configuration this client was built from.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Resolve an endpoint path against the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Decode`] when the path cannot be joined.
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.config.endpoint(path)
    }

    /// Resolve `path` followed by one percent-encoded identifier segment.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Decode`] when the URL cannot carry path segments.
    pub fn resource(&self, path: &str, id: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Decode {
                message: format!("base URL cannot carry resource '{id}'"),
            })?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    /// Start a request, attaching the bearer token when supplied.
    #[must_use]
    pub fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and classify non-success statuses.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] on transport failure and the classified
    /// error for any non-2xx status.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|err| ApiError::transport(&err))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(classify_problem(response).await)
        }
    }

    /// Send a request and decode a JSON body.
    ///
    /// # Errors
    ///
    /// Same as [`HttpClient::send`], plus [`ApiError::Decode`] if the body does
    /// not match `T`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Decode {
                message: err.to_string(),
            })
    }
}

/// Classify an HTTP response into an [`ApiError`].
pub async fn classify_problem(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let bytes = response.bytes().await.unwrap_or_default();
    ApiError::from_response(status, &bytes)
}
