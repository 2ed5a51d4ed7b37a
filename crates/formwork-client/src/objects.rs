//! Object and field definitions. Uncached pass-through reads.

use std::sync::Arc;

use formwork_api_models::{FieldDefinition, ObjectDefinition, RecordData};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::ApiError;
use crate::http::HttpClient;
use crate::session::SessionManager;

const OBJECTS_PATH: &str = "api/objects";

/// Read access to object schemas.
#[derive(Debug, Clone)]
pub struct ObjectsClient {
    http: HttpClient,
    session: Arc<SessionManager>,
}

impl ObjectsClient {
    /// Bind to `session`.
    #[must_use]
    pub const fn new(http: HttpClient, session: Arc<SessionManager>) -> Self {
        Self { http, session }
    }

    /// All objects visible to the current user.
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthenticated`] without a session, or the failure of the call.
    pub async fn list_objects(&self) -> Result<Vec<ObjectDefinition>, ApiError> {
        let url = self.http.endpoint(OBJECTS_PATH)?;
        self.get(url).await
    }

    /// One object definition.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for unknown ids, or any other failure of the call.
    pub async fn get_object(&self, object_id: &str) -> Result<ObjectDefinition, ApiError> {
        let url = self.http.resource(OBJECTS_PATH, object_id)?;
        self.get(url).await
    }

    /// Fields attached to an object.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotFound`] for unknown ids, or any other failure of the call.
    pub async fn list_fields(&self, object_id: &str) -> Result<Vec<FieldDefinition>, ApiError> {
        let mut url = self.http.resource(OBJECTS_PATH, object_id)?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Decode {
                message: "base URL cannot carry path segments".to_string(),
            })?
            .push("fields");
        self.get(url).await
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let bearer = self.session.bearer()?;
        match self
            .http
            .send_json(self.http.request(Method::GET, url, Some(&bearer)))
            .await
        {
            Err(ApiError::InvalidCredentials) => {
                self.session.invalidate();
                Err(ApiError::Unauthenticated)
            }
            other => other,
        }
    }
}

/// Field marked as primary, if any.
#[must_use]
pub fn primary_field(fields: &[FieldDefinition]) -> Option<&FieldDefinition> {
    fields.iter().find(|field| field.is_primary)
}

/// Display label for a record: the primary field's value rendered as text.
///
/// Values are looked up by field id, then by field name. Empty values yield `None`.
#[must_use]
pub fn derive_primary_value(data: &RecordData, fields: &[FieldDefinition]) -> Option<String> {
    let field = primary_field(fields)?;
    let value = data.get(&field.id).or_else(|| data.get(&field.name))?;
    render_value(value).filter(|text| !text.trim().is_empty())
}

/// Plain-text rendering of a field value.
#[must_use]
pub fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(items) => {
            let parts = items.iter().filter_map(render_value).collect::<Vec<_>>();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}
