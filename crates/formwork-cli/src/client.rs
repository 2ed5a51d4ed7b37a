//! Client wiring, session file location, and error mapping for the CLI.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use formwork_api_models::{FieldErrors, RecordData};
use formwork_client::{ApiError, AuthError, ClientConfig, FileTokenStore, Formwork};
use serde_json::Value;
use url::Url;

use crate::cli::Cli;

const SESSION_DIR: &str = "formwork";
const SESSION_FILE_NAME: &str = "session.json";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthenticated => {
                Self::validation("not logged in (run `formwork login` first)")
            }
            ApiError::InvalidInput {
                message,
                field_errors,
                ..
            } => Self::Validation(with_field_errors(&message, &field_errors)),
            other => Self::failure(other),
        }
    }
}

impl From<AuthError> for CliError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::validation("invalid email or password"),
            AuthError::InvalidInput {
                message,
                field_errors,
            } => Self::Validation(with_field_errors(&message, &field_errors)),
            other @ AuthError::LoginFailed { .. } => Self::failure(other),
        }
    }
}

fn with_field_errors(message: &str, field_errors: &FieldErrors) -> String {
    let mut text = message.to_string();
    for (field, messages) in field_errors {
        for detail in messages {
            text.push_str(&format!("\n  {field}: {detail}"));
        }
    }
    text
}

/// Application context passed to command handlers.
#[derive(Debug, Clone)]
pub(crate) struct AppContext {
    pub(crate) client: Formwork,
}

impl AppContext {
    /// Build the client from CLI flags, persisting the session in `session_file`.
    pub(crate) fn from_cli(cli: &Cli, trace_id: &str) -> CliResult<Self> {
        let session_file = match &cli.session_file {
            Some(path) => path.clone(),
            None => default_session_file()?,
        };
        Self::new(cli.api_url.clone(), Duration::from_secs(cli.timeout), trace_id, &session_file)
    }

    pub(crate) fn new(
        api_url: Url,
        timeout: Duration,
        trace_id: &str,
        session_file: &Path,
    ) -> CliResult<Self> {
        let config = ClientConfig::builder(api_url)
            .timeout(timeout)
            .trace_id(trace_id)
            .build()
            .map_err(|err| CliError::validation(err.to_string()))?;
        let store = Arc::new(FileTokenStore::new(session_file));
        let client = Formwork::new(config, store)?;
        Ok(Self { client })
    }
}

/// Default session file under the user's config directory.
pub(crate) fn default_session_file() -> CliResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(SESSION_DIR).join(SESSION_FILE_NAME))
        .ok_or_else(|| {
            CliError::validation(
                "cannot locate a config directory (pass --session-file or set FORMWORK_SESSION_FILE)",
            )
        })
}

/// Parse the API URL provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// Parse record data given inline or as `@path` to a JSON file.
pub(crate) fn parse_record_data(input: &str) -> CliResult<RecordData> {
    let text = match input.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| CliError::failure(anyhow!("failed to read {path}: {err}")))?,
        None => input.to_string(),
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(data)) => Ok(data),
        Ok(_) => Err(CliError::validation("record data must be a JSON object")),
        Err(err) => Err(CliError::validation(format!(
            "record data is not valid JSON: {err}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn api_errors_map_to_exit_codes() {
        assert_eq!(CliError::from(ApiError::Unauthenticated).exit_code(), 2);
        let invalid = CliError::from(ApiError::InvalidInput {
            status: 422,
            message: "invalid record".into(),
            field_errors: BTreeMap::from([("email".to_string(), vec!["bad".to_string()])]),
        });
        assert_eq!(invalid.exit_code(), 2);
        assert_eq!(invalid.display_message(), "invalid record\n  email: bad");
        let network = CliError::from(ApiError::Network {
            status: Some(503),
            message: "unavailable".into(),
        });
        assert_eq!(network.exit_code(), 3);
        assert!(network.display_message().contains("unavailable"));
    }

    #[test]
    fn auth_errors_map_to_exit_codes() {
        assert_eq!(CliError::from(AuthError::InvalidCredentials).exit_code(), 2);
        let failed = CliError::from(AuthError::LoginFailed {
            status: Some(500),
            message: "boom".into(),
        });
        assert_eq!(failed.exit_code(), 3);
    }

    #[test]
    fn record_data_must_be_an_object() {
        let data = parse_record_data(r#"{"name": "Acme"}"#).expect("object");
        assert_eq!(data.get("name"), Some(&Value::String("Acme".into())));
        assert!(matches!(parse_record_data("[1]"), Err(CliError::Validation(_))));
        assert!(matches!(parse_record_data("{"), Err(CliError::Validation(_))));
    }

    #[test]
    fn record_data_can_come_from_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.json");
        std::fs::write(&path, r#"{"a": 1}"#).expect("write");
        let data = parse_record_data(&format!("@{}", path.display())).expect("file data");
        assert_eq!(data.get("a"), Some(&Value::from(1)));
    }

    #[test]
    fn parse_url_rejects_garbage() {
        assert!(parse_url("http://localhost:8000").is_ok());
        assert!(parse_url("not a url").is_err());
    }
}
