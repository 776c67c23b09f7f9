use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("unsupported identity provider '{0}'")]
    UnsupportedProvider(String),
    #[error("identity provider returned {}: {message}", status_label(.status))]
    Provider {
        status: Option<StatusCode>,
        message: String,
    },
    #[error("no pending federated sign-in to complete")]
    MissingCodeVerifier,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("configuration error: {0}")]
    Config(String),
}

fn status_label(status: &Option<StatusCode>) -> String {
    match status {
        Some(status) => status.as_u16().to_string(),
        None => "an error".to_string(),
    }
}

/// Coarse classification shared by every surface that reports auth failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Auth,
    Provider,
    Config,
}

impl AuthError {
    pub fn provider(status: StatusCode, message: impl Into<String>) -> Self {
        AuthError::Provider {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation(_) | AuthError::UnsupportedProvider(_) => ErrorKind::Validation,
            AuthError::InvalidCredentials(_) => ErrorKind::Auth,
            AuthError::Config(_) => ErrorKind::Config,
            AuthError::Provider { .. }
            | AuthError::MissingCodeVerifier
            | AuthError::Http(_)
            | AuthError::Json(_)
            | AuthError::Io(_)
            | AuthError::InvalidUrl(_) => ErrorKind::Provider,
        }
    }

    /// True for failures worth retrying: connection errors, timeouts and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Http(err) => {
                if err.is_connect() || err.is_timeout() {
                    return true;
                }
                err.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            AuthError::Provider {
                status: Some(status),
                ..
            } => status.is_server_error(),
            _ => false,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            AuthError::Provider { status, .. } => status.map(|s| s.as_u16()),
            AuthError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Cloneable projection of an [`AuthError`] kept in controller state and
/// handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub retryable: bool,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            retryable: false,
        }
    }
}

impl From<&AuthError> for ErrorInfo {
    fn from(err: &AuthError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            status: err.http_status(),
            retryable: err.is_transient(),
        }
    }
}

impl From<AuthError> for ErrorInfo {
    fn from(err: AuthError) -> Self {
        ErrorInfo::from(&err)
    }
}
