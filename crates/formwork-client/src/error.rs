//! Error types surfaced by the client library.

use std::io;

use formwork_api_models::{ErrorBody, FieldErrors};
use thiserror::Error;

/// Failure of a backend call or of a local precondition for one.
///
/// `Clone` so that callers coalesced onto the same in-flight request all
/// observe the same failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// No usable session; the caller has to log in first.
    #[error("not authenticated")]
    Unauthenticated,
    /// Backend rejected the bearer credential or login pair (401).
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Backend rejected the request payload (400, 409, 422).
    #[error("invalid input: {message}")]
    InvalidInput {
        /// HTTP status returned by the backend.
        status: u16,
        /// Summary message.
        message: String,
        /// Validation messages grouped by field.
        field_errors: FieldErrors,
    },
    /// Requested resource does not exist (404).
    #[error("not found: {message}")]
    NotFound {
        /// Backend message.
        message: String,
    },
    /// Any other client error status (403, 405, ...).
    #[error("request rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status returned by the backend.
        status: u16,
        /// Backend message.
        message: String,
    },
    /// Timeout, connectivity failure, or 5xx response.
    #[error("network failure: {message}")]
    Network {
        /// HTTP status when the backend answered with a 5xx.
        status: Option<u16>,
        /// Transport or backend message.
        message: String,
    },
    /// Backend answered with a body this client cannot decode.
    #[error("malformed response: {message}")]
    Decode {
        /// Decoder message.
        message: String,
    },
}

impl ApiError {
    /// HTTP status associated with the failure, when one was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidCredentials => Some(401),
            Self::NotFound { .. } => Some(404),
            Self::InvalidInput { status, .. } | Self::Rejected { status, .. } => Some(*status),
            Self::Network { status, .. } => *status,
            Self::Unauthenticated | Self::Decode { .. } => None,
        }
    }

    /// Human-readable message for presentation.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Unauthenticated => "not authenticated".to_string(),
            Self::InvalidCredentials => "invalid credentials".to_string(),
            Self::InvalidInput { message, .. }
            | Self::NotFound { message }
            | Self::Rejected { message, .. }
            | Self::Network { message, .. }
            | Self::Decode { message } => message.clone(),
        }
    }

    /// Per-field validation messages; empty unless the failure is [`ApiError::InvalidInput`].
    #[must_use]
    pub fn field_errors(&self) -> FieldErrors {
        match self {
            Self::InvalidInput { field_errors, .. } => field_errors.clone(),
            _ => FieldErrors::new(),
        }
    }

    /// Map a transport-level failure from `reqwest`.
    pub(crate) fn transport(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            format!("request failed: {err}")
        };
        Self::Network {
            status: err.status().map(|status| status.as_u16()),
            message,
        }
    }

    /// Classify a non-success response from its status and raw body.
    #[must_use]
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let problem = serde_json::from_slice::<ErrorBody>(body).ok();
        let body_text = String::from_utf8_lossy(body).trim().to_string();
        let message = problem
            .as_ref()
            .and_then(ErrorBody::message)
            .or_else(|| (!body_text.is_empty()).then(|| body_text.clone()))
            .unwrap_or_else(|| format!("request failed with status {status}"));

        match status {
            401 => Self::InvalidCredentials,
            404 => Self::NotFound { message },
            400 | 409 | 422 => Self::InvalidInput {
                status,
                message,
                field_errors: problem
                    .as_ref()
                    .map(ErrorBody::field_errors)
                    .unwrap_or_default(),
            },
            500..=599 => Self::Network {
                status: Some(status),
                message,
            },
            _ => Self::Rejected { status, message },
        }
    }
}

/// Login failure, classified for user-facing messages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Email/password pair was rejected (401).
    #[error("invalid email or password")]
    InvalidCredentials,
    /// Input failed validation locally or on the backend (422).
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Summary message.
        message: String,
        /// Validation messages grouped by field.
        field_errors: FieldErrors,
    },
    /// Any other failure; the user may retry.
    #[error("login failed: {message}")]
    LoginFailed {
        /// HTTP status when the backend answered.
        status: Option<u16>,
        /// Failure description.
        message: String,
    },
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidCredentials => Self::InvalidCredentials,
            ApiError::InvalidInput {
                status: 422,
                message,
                field_errors,
            } => Self::InvalidInput {
                message,
                field_errors,
            },
            other => Self::LoginFailed {
                status: other.status(),
                message: other.message(),
            },
        }
    }
}

/// Malformed bearer token. Recovered locally as "claims absent".
#[derive(Debug, Error)]
pub enum ClaimsError {
    /// Token does not have a payload segment.
    #[error("token has no payload segment")]
    MissingPayload,
    /// Payload segment is not valid base64url.
    #[error("token payload is not base64url")]
    Base64 {
        /// Decoder error.
        #[from]
        source: base64::DecodeError,
    },
    /// Payload segment is not a JSON claims object.
    #[error("token payload is not a claims object")]
    Json {
        /// Parser error.
        #[from]
        source: serde_json::Error,
    },
}

/// Persisted token storage failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("token store I/O failed during {operation}")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Source IO error.
        source: io::Error,
    },
    /// Stored content could not be parsed.
    #[error("token store content is corrupt")]
    Corrupt {
        /// Parser error.
        source: serde_json::Error,
    },
    /// Token could not be serialized.
    #[error("failed to serialize token")]
    Serialize {
        /// Serializer error.
        source: serde_json::Error,
    },
}

/// Invalid client configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Value is below the permitted minimum.
    #[error("{field} must be at least {min} (got {value})")]
    BelowMinimum {
        /// Offending field.
        field: &'static str,
        /// Supplied value.
        value: String,
        /// Minimum accepted value.
        min: String,
    },
    /// Value is above the permitted maximum.
    #[error("{field} must be at most {max} (got {value})")]
    AboveMaximum {
        /// Offending field.
        field: &'static str,
        /// Supplied value.
        value: String,
        /// Maximum accepted value.
        max: String,
    },
    /// Base URL cannot carry paths (e.g. `mailto:`).
    #[error("base URL '{value}' cannot be used for HTTP requests")]
    InvalidBaseUrl {
        /// Supplied URL.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(value).expect("serialize")
    }

    #[test]
    fn statuses_map_to_taxonomy() {
        assert_eq!(ApiError::from_response(401, b""), ApiError::InvalidCredentials);
        assert!(matches!(
            ApiError::from_response(404, &body(&json!({"detail": "Record not found"}))),
            ApiError::NotFound { message } if message == "Record not found"
        ));
        assert!(matches!(
            ApiError::from_response(503, b"upstream down"),
            ApiError::Network { status: Some(503), message } if message == "upstream down"
        ));
        assert!(matches!(
            ApiError::from_response(403, b""),
            ApiError::Rejected { status: 403, message } if message == "request failed with status 403"
        ));
    }

    #[test]
    fn validation_body_populates_field_errors() {
        let err = ApiError::from_response(
            422,
            &body(&json!({"detail": [{"loc": ["body", "data"], "msg": "unknown field"}]})),
        );
        assert_eq!(err.status(), Some(422));
        assert_eq!(
            err.field_errors().get("data"),
            Some(&vec!["unknown field".to_string()])
        );
    }

    #[test]
    fn auth_error_only_treats_422_as_invalid_input() {
        let conflict = ApiError::InvalidInput {
            status: 409,
            message: "conflict".into(),
            field_errors: FieldErrors::new(),
        };
        assert!(matches!(
            AuthError::from(conflict),
            AuthError::LoginFailed {
                status: Some(409),
                ..
            }
        ));
        assert_eq!(
            AuthError::from(ApiError::InvalidCredentials),
            AuthError::InvalidCredentials
        );
        assert!(matches!(
            AuthError::from(ApiError::from_response(422, b"{}")),
            AuthError::InvalidInput { .. }
        ));
    }
}
