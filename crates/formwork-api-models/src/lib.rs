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
//! Shared HTTP DTOs for the Formwork records API.
//!
//! These types mirror the backend's JSON contract so the client library and
//! the CLI encode requests and decode responses from a single definition.
//! Field names follow the backend's `snake_case` wire format.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flexible key/value payload attached to a record, keyed by field identifier.
pub type RecordData = Map<String, Value>;

/// Per-field validation messages keyed by field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// One data row conforming to an object's field set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Identifier scoped to the owning object.
    pub id: String,
    /// Object (schema) the record belongs to.
    pub object_id: String,
    /// Field values keyed by field identifier.
    #[serde(default)]
    pub data: RecordData,
    /// Display label derived from the object's primary field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_value: Option<String>,
    /// User that created the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// User that last modified the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    /// Tenant that owns the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Page of records returned by the list and search endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordPage {
    /// Total number of records matching the listing, across all pages.
    pub total: u64,
    /// One-based page number.
    pub page: u32,
    /// Page size used by the backend.
    pub page_size: u32,
    /// Records on this page in backend order.
    #[serde(default)]
    pub records: Vec<Record>,
}

impl RecordPage {
    /// Number of pages needed to hold `total` records at this page size.
    #[must_use]
    pub fn page_count(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }

    /// Whether a page after this one exists.
    #[must_use]
    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.page_count()
    }
}

/// Body for `POST /api/records`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateRecordRequest {
    /// Object the new record belongs to.
    pub object_id: String,
    /// Initial field values.
    pub data: RecordData,
    /// Optional explicit display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_value: Option<String>,
}

/// Body for `PATCH /api/records/{id}`; `data` is merged into the stored payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateRecordRequest {
    /// Keys to overwrite; keys absent here are preserved by the backend.
    pub data: RecordData,
    /// Optional replacement display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_value: Option<String>,
}

/// Successful response from `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    /// Bearer credential.
    pub access_token: String,
    /// Token scheme, normally `bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds, when the backend supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Sort direction for record listings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl SortOrder {
    /// Wire representation used in query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl Display for SortOrder {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}

/// User-defined record type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectDefinition {
    /// Object identifier.
    pub id: String,
    /// Machine name.
    pub name: String,
    /// Singular display label.
    pub label: String,
    /// Plural display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural_label: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Field designated as the primary display field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_field_id: Option<String>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Value type of a field definition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Single-line text.
    Text,
    /// Multi-line text.
    LongText,
    /// Numeric value.
    Number,
    /// True/false flag.
    Boolean,
    /// Calendar date.
    Date,
    /// Date with time of day.
    Datetime,
    /// Email address.
    Email,
    /// Phone number.
    Phone,
    /// Web address.
    Url,
    /// One option out of a fixed list.
    Select,
    /// Several options out of a fixed list.
    MultiSelect,
    /// Reference to a record of another object.
    Relation,
    /// Type not known to this client.
    #[serde(other)]
    Other,
}

/// Typed attribute definition attached to an object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDefinition {
    /// Field identifier, used as the key in [`Record::data`].
    pub id: String,
    /// Machine name.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Value type.
    pub field_type: FieldType,
    /// Whether a value is mandatory.
    #[serde(default)]
    pub required: bool,
    /// Whether this field provides the record's display label.
    #[serde(default)]
    pub is_primary: bool,
    /// Choices for select-style fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Error document returned by the backend on non-success statuses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ErrorBody {
    /// Message or list of validation issues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ErrorDetail>,
}

/// Either a plain message or a list of field-level validation issues.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ErrorDetail {
    /// Human-readable message.
    Message(String),
    /// Validation issues, one per offending input.
    Validation(Vec<ValidationIssue>),
}

/// Single validation failure reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    /// Location of the offending input, e.g. `["body", "username"]`.
    #[serde(default)]
    pub loc: Vec<Value>,
    /// Human-readable description.
    pub msg: String,
    /// Machine-readable error code.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ValidationIssue {
    /// Name of the offending field: the last segment of `loc`.
    #[must_use]
    pub fn field(&self) -> Option<String> {
        self.loc.last().map(|segment| match segment {
            Value::String(name) => name.clone(),
            other => other.to_string(),
        })
    }
}

impl ErrorBody {
    /// Summary message suitable for display.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            ErrorDetail::Message(message) => Some(message.clone()),
            ErrorDetail::Validation(issues) => {
                let joined = issues
                    .iter()
                    .map(|issue| match issue.field() {
                        Some(field) => format!("{field}: {}", issue.msg),
                        None => issue.msg.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                (!joined.is_empty()).then_some(joined)
            }
        }
    }

    /// Validation messages grouped by field.
    #[must_use]
    pub fn field_errors(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let Some(ErrorDetail::Validation(issues)) = &self.detail {
            for issue in issues {
                let field = issue.field().unwrap_or_else(|| "_".to_string());
                errors.entry(field).or_default().push(issue.msg.clone());
            }
        }
        errors
    }
}
