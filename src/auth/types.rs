use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, ErrorInfo};

/// The authenticated user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Provider-issued credential bound to a principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: i64,
    /// Absolute expiry in unix seconds.
    pub expires_at: i64,
    pub user: Principal,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    pub fn principal(&self) -> &Principal {
        &self.user
    }

    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        self.expires_at - now.timestamp()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.seconds_until_expiry(now) <= 0
    }

    /// Whether the token expires within `margin_secs` and should be refreshed.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin_secs: i64) -> bool {
        self.seconds_until_expiry(now) <= margin_secs
    }

    /// Two sessions are the same credential if they share the refresh token.
    pub fn same_credential(&self, other: &Session) -> bool {
        self.refresh_token == other.refresh_token
    }
}

/// Session transitions broadcast by the provider client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionChange {
    pub event: SessionEvent,
    pub session: Option<Session>,
}

impl SessionChange {
    pub fn new(event: SessionEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.session.as_ref().map(Session::principal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FederatedProvider {
    Google,
    Github,
    Discord,
}

impl FederatedProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            FederatedProvider::Google => "google",
            FederatedProvider::Github => "github",
            FederatedProvider::Discord => "discord",
        }
    }
}

impl fmt::Display for FederatedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FederatedProvider {
    type Err = AuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(FederatedProvider::Google),
            "github" => Ok(FederatedProvider::Github),
            "discord" => Ok(FederatedProvider::Discord),
            other => Err(AuthError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Where to send the user to continue a federated sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedRedirect {
    pub provider: FederatedProvider,
    pub url: String,
}

/// Observable controller state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    pub principal: Option<Principal>,
    pub loading: bool,
    pub last_error: Option<ErrorInfo>,
    pub initialized: bool,
    pub revision: u64,
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self {
            principal: None,
            loading: true,
            last_error: None,
            initialized: false,
            revision: 0,
        }
    }
}

impl AuthSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.id.as_str())
    }

    pub fn user_email(&self) -> Option<&str> {
        self.principal.as_ref().and_then(|p| p.email.as_deref())
    }
}
