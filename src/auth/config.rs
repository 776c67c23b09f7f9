use std::path::PathBuf;
use std::time::Duration;

use crate::auth::{AuthError, AuthResult};

const DEFAULT_SITE_URL: &str = "http://localhost:3000";

/// Retry policy for background token refresh.
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RefreshPolicy {
    /// Delay before retry number `attempt` (0-indexed), doubling up to `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Identity provider configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub url: String,
    pub anon_key: String,
    pub persist_session: bool,
    pub auto_refresh_token: bool,
    pub session_path: PathBuf,
    pub refresh_tick: Duration,
    pub expiry_margin_ticks: u32,
    pub request_timeout: Duration,
    pub refresh_policy: RefreshPolicy,
    pub oauth_redirect_url: Option<String>,
    pub password_reset_redirect_url: Option<String>,
}

impl ProviderConfig {
    /// Minimal configuration with persistence disabled; used by tests and
    /// embedders that manage sessions themselves.
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            persist_session: false,
            auto_refresh_token: false,
            session_path: PathBuf::from(".auth/session.json"),
            refresh_tick: Duration::from_secs(30),
            expiry_margin_ticks: 3,
            request_timeout: Duration::from_secs(10),
            refresh_policy: RefreshPolicy::default(),
            oauth_redirect_url: None,
            password_reset_redirect_url: None,
        }
    }

    pub fn from_env() -> AuthResult<Self> {
        let url = required("SUPABASE_URL")?;
        let anon_key = required("SUPABASE_ANON_KEY")?;

        let site_url = std::env::var("SITE_URL").unwrap_or_else(|_| DEFAULT_SITE_URL.into());
        let site_url = site_url.trim_end_matches('/');

        let persist_session = env_flag("AUTH_PERSIST_SESSION", true);
        let auto_refresh_token = env_flag("AUTH_AUTO_REFRESH_TOKEN", true);
        let session_path = std::env::var("AUTH_SESSION_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".auth/session.json"));
        let refresh_tick = std::env::var("AUTH_REFRESH_TICK_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));
        let request_timeout = std::env::var("AUTH_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(10));
        let oauth_redirect_url = std::env::var("AUTH_OAUTH_REDIRECT_URL")
            .unwrap_or_else(|_| format!("{site_url}/auth/callback"));
        let password_reset_redirect_url = std::env::var("AUTH_PASSWORD_RESET_REDIRECT_URL")
            .unwrap_or_else(|_| format!("{site_url}/auth/reset-password"));

        let mut config = Self::new(url, anon_key);
        config.persist_session = persist_session;
        config.auto_refresh_token = auto_refresh_token;
        config.session_path = session_path;
        config.refresh_tick = refresh_tick;
        config.request_timeout = request_timeout;
        config.oauth_redirect_url = Some(oauth_redirect_url);
        config.password_reset_redirect_url = Some(password_reset_redirect_url);
        Ok(config)
    }

    /// Seconds before expiry at which a session is refreshed.
    pub fn expiry_margin_secs(&self) -> i64 {
        (self.refresh_tick.as_secs() * u64::from(self.expiry_margin_ticks)) as i64
    }

    pub fn auth_endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url, path.trim_start_matches('/'))
    }
}

fn required(key: &str) -> AuthResult<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(AuthError::Config(format!("{key} is required"))),
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "on"))
        .unwrap_or(default)
}
