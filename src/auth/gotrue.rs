//! `IdentityProvider` backed by a GoTrue-compatible REST service.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use url::Url;

use crate::auth::config::ProviderConfig;
use crate::auth::listeners::{ListenerRegistry, SessionChangeHandler, Subscription};
use crate::auth::pkce::{CHALLENGE_METHOD, PkcePair};
use crate::auth::provider::IdentityProvider;
use crate::auth::store::SessionStore;
use crate::auth::types::{
    FederatedProvider, FederatedRedirect, Principal, Session, SessionChange, SessionEvent,
};
use crate::auth::{AuthError, AuthResult};
use crate::validation::is_valid_email;

pub const MIN_PASSWORD_LEN: usize = 6;

const VALIDATION_CODES: &[&str] = &[
    "weak_password",
    "validation_failed",
    "email_address_invalid",
];
const CREDENTIAL_CODES: &[&str] = &["invalid_grant", "invalid_credentials"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    Password,
    RefreshToken,
    Pkce,
}

impl Grant {
    fn as_str(&self) -> &'static str {
        match self {
            Grant::Password => "password",
            Grant::RefreshToken => "refresh_token",
            Grant::Pkce => "pkce",
        }
    }
}

#[derive(Clone)]
pub struct GoTrueClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    config: ProviderConfig,
    store: Option<SessionStore>,
    session: RwLock<Option<Session>>,
    pending_verifier: Mutex<Option<String>>,
    listeners: ListenerRegistry,
    refresh_gate: tokio::sync::Mutex<()>,
    keeper: Mutex<Option<JoinHandle<()>>>,
}

impl GoTrueClient {
    pub fn new(config: ProviderConfig) -> AuthResult<Self> {
        Url::parse(&config.url)?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("users-api-auth/0.1")
            .build()?;

        let store = config
            .persist_session
            .then(|| SessionStore::new(config.session_path.clone()));
        let session = match &store {
            Some(store) => store.load_session()?,
            None => None,
        };
        if let Some(session) = &session {
            log::info!("restored persisted session for user {}", session.user.id);
        }

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                config,
                store,
                session: RwLock::new(session),
                pending_verifier: Mutex::new(None),
                listeners: ListenerRegistry::new(),
                refresh_gate: tokio::sync::Mutex::new(()),
                keeper: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.inner.config
    }

    /// Session held in memory, without refreshing or contacting the service.
    pub fn cached_session(&self) -> Option<Session> {
        self.inner.current_session()
    }

    /// Run one keeper tick now: adopt changes made by other processes, then
    /// refresh when inside the expiry margin.
    pub async fn sync_now(&self) {
        self.inner.keeper_tick().await;
    }

    /// Stop the background refresh task. The client stays usable.
    pub fn shutdown(&self) {
        if let Some(handle) = self.inner.keeper.lock().take() {
            handle.abort();
            log::debug!("session keeper stopped");
        }
    }

    fn ensure_keeper(&self) {
        if !self.inner.config.auto_refresh_token {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let mut keeper = self.inner.keeper.lock();
        if keeper.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let tick = self.inner.config.refresh_tick;
        let weak = Arc::downgrade(&self.inner);
        *keeper = Some(runtime.spawn(run_keeper(weak, tick)));
        log::debug!("session keeper started (tick {:?})", tick);
    }

    fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        let config = &self.inner.config;
        self.inner
            .http
            .request(method, config.auth_endpoint(path))
            .header("apikey", &config.anon_key)
            .bearer_auth(bearer.unwrap_or(&config.anon_key))
    }

    async fn token_grant(&self, grant: Grant, body: Value) -> AuthResult<Session> {
        let path = format!("token?grant_type={}", grant.as_str());
        let response = self
            .request(Method::POST, &path, None)
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = read_json(response, Some(grant)).await?;
        Ok(token.into_session())
    }
}

impl ClientInner {
    fn current_session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    /// Replace the in-memory session, mirror it to disk and notify listeners.
    fn apply_session(&self, session: Option<Session>, event: SessionEvent) {
        *self.session.write() = session.clone();

        if let Some(store) = &self.store {
            let persisted = match &session {
                Some(session) => store.save_session(session),
                None => store.clear_session(),
            };
            if let Err(err) = persisted {
                log::warn!(
                    "failed to persist session to {}: {}",
                    store.path().display(),
                    err
                );
            }
        }

        match &session {
            Some(session) => log::info!("session {:?} for user {}", event, session.user.id),
            None => log::info!("session {:?}", event),
        }
        self.listeners.emit(&SessionChange::new(event, session));
    }

    fn remember_verifier(&self, verifier: &str) -> AuthResult<()> {
        *self.pending_verifier.lock() = Some(verifier.to_string());
        if let Some(store) = &self.store {
            store.save_code_verifier(verifier)?;
        }
        Ok(())
    }

    fn take_verifier(&self) -> AuthResult<Option<String>> {
        let in_memory = self.pending_verifier.lock().take();
        let persisted = match &self.store {
            Some(store) => store.take_code_verifier()?,
            None => None,
        };
        Ok(in_memory.or(persisted))
    }

    async fn keeper_tick(&self) {
        self.adopt_persisted_session();

        let Some(session) = self.current_session() else {
            return;
        };
        if !session.needs_refresh(Utc::now(), self.config.expiry_margin_secs()) {
            return;
        }
        if let Err(err) = self.refresh(&session).await {
            log::warn!("background session refresh failed: {}", err);
        }
    }

    /// Pick up a session written by another process sharing the store.
    fn adopt_persisted_session(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let persisted = match store.load_session() {
            Ok(session) => session,
            Err(err) => {
                log::warn!("failed to reload persisted session: {}", err);
                return;
            }
        };

        let current = self.current_session();
        let event = match (&current, &persisted) {
            (None, None) => return,
            (Some(a), Some(b)) if a.same_credential(b) => return,
            (Some(a), Some(b)) if a.user.id == b.user.id => SessionEvent::TokenRefreshed,
            (_, Some(_)) => SessionEvent::SignedIn,
            (Some(_), None) => SessionEvent::SignedOut,
        };

        log::info!("adopting session change from another process");
        *self.session.write() = persisted.clone();
        self.listeners.emit(&SessionChange::new(event, persisted));
    }

    /// Exchange the refresh token, retrying transient failures with backoff.
    async fn refresh(&self, stale: &Session) -> AuthResult<Session> {
        let _gate = self.refresh_gate.lock().await;

        // Someone else refreshed (or signed out) while we waited.
        match self.current_session() {
            Some(current) if !current.same_credential(stale) => return Ok(current),
            None => {
                return Err(AuthError::Provider {
                    status: None,
                    message: "session ended before it could be refreshed".into(),
                });
            }
            Some(_) => {}
        }

        let policy = &self.config.refresh_policy;
        let attempts = policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match self.refresh_once(&stale.refresh_token).await {
                Ok(session) => {
                    self.apply_session(Some(session.clone()), SessionEvent::TokenRefreshed);
                    return Ok(session);
                }
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let delay = policy.delay_for_attempt(attempt);
                    log::warn!(
                        "session refresh attempt {} failed, retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_transient() => return Err(err),
                Err(err) => {
                    log::warn!("refresh token rejected, signing out: {}", err);
                    self.apply_session(None, SessionEvent::SignedOut);
                    return Err(err);
                }
            }
        }
    }

    async fn refresh_once(&self, refresh_token: &str) -> AuthResult<Session> {
        let response = self
            .http
            .post(self.config.auth_endpoint("token?grant_type=refresh_token"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&self.config.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let token: TokenResponse = read_json(response, Some(Grant::RefreshToken)).await?;
        Ok(token.into_session())
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(handle) = self.keeper.get_mut().take() {
            handle.abort();
        }
    }
}

async fn run_keeper(inner: Weak<ClientInner>, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so a fresh client is left alone.
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.keeper_tick().await;
    }
}

#[rocket::async_trait]
impl IdentityProvider for GoTrueClient {
    async fn get_active_session(&self) -> AuthResult<Option<Session>> {
        self.ensure_keeper();

        let Some(session) = self.inner.current_session() else {
            return Ok(None);
        };
        if session.needs_refresh(Utc::now(), self.inner.config.expiry_margin_secs()) {
            return self.inner.refresh(&session).await.map(Some);
        }
        Ok(Some(session))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<Value>,
    ) -> AuthResult<Principal> {
        let email = email.trim();
        validate_new_credentials(email, password)?;

        let body = json!({
            "email": email,
            "password": password,
            "data": metadata.unwrap_or_else(|| json!({})),
        });
        let response = self
            .request(Method::POST, "signup", None)
            .json(&body)
            .send()
            .await?;

        match read_json::<SignUpResponse>(response, None).await? {
            SignUpResponse::Session(token) => {
                let session = token.into_session();
                let principal = session.user.clone();
                self.ensure_keeper();
                self.inner.apply_session(Some(session), SessionEvent::SignedIn);
                Ok(principal)
            }
            SignUpResponse::User(principal) => {
                log::info!("sign-up for {} awaits email confirmation", principal.id);
                Ok(principal)
            }
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Principal> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "email and password are required".into(),
            ));
        }

        let session = self
            .token_grant(
                Grant::Password,
                json!({ "email": email, "password": password }),
            )
            .await?;
        let principal = session.user.clone();
        self.ensure_keeper();
        self.inner.apply_session(Some(session), SessionEvent::SignedIn);
        Ok(principal)
    }

    async fn sign_in_with_federated_provider(
        &self,
        provider: FederatedProvider,
        redirect_to: Option<&str>,
    ) -> AuthResult<FederatedRedirect> {
        let pkce = PkcePair::generate();
        let url = authorize_url(&self.inner.config, provider, redirect_to, &pkce.challenge)?;
        self.inner.remember_verifier(&pkce.verifier)?;

        log::debug!("prepared {} sign-in redirect", provider);
        Ok(FederatedRedirect {
            provider,
            url: url.into(),
        })
    }

    async fn complete_federated_sign_in(&self, auth_code: &str) -> AuthResult<Principal> {
        let auth_code = auth_code.trim();
        if auth_code.is_empty() {
            return Err(AuthError::Validation("authorization code is required".into()));
        }
        let verifier = self
            .inner
            .take_verifier()?
            .ok_or(AuthError::MissingCodeVerifier)?;

        let session = self
            .token_grant(
                Grant::Pkce,
                json!({ "auth_code": auth_code, "code_verifier": verifier }),
            )
            .await?;
        let principal = session.user.clone();
        self.ensure_keeper();
        self.inner.apply_session(Some(session), SessionEvent::SignedIn);
        Ok(principal)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        if let Some(session) = self.inner.current_session() {
            let outcome = match self
                .request(Method::POST, "logout?scope=global", Some(&session.access_token))
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => Ok(()),
                Ok(response) => Err(error_from_response(response, None).await),
                Err(err) => Err(AuthError::Http(err)),
            };

            if let Err(err) = outcome {
                if err.is_transient() {
                    return Err(err);
                }
                // 401/403/404: the session is already gone remotely.
                log::warn!("remote sign-out rejected, clearing local session: {}", err);
            }
        }

        self.inner.apply_session(None, SessionEvent::SignedOut);
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> AuthResult<()> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::Validation("Invalid email address".into()));
        }

        let mut request = self.request(Method::POST, "recover", None);
        if let Some(redirect_to) = redirect_to {
            request = request.query(&[("redirect_to", redirect_to)]);
        }
        let response = request.json(&json!({ "email": email })).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, None).await);
        }
        Ok(())
    }

    fn on_session_change(&self, handler: SessionChangeHandler) -> Subscription {
        self.inner.listeners.subscribe(handler)
    }
}

fn validate_new_credentials(email: &str, password: &str) -> AuthResult<()> {
    if !is_valid_email(email) {
        return Err(AuthError::Validation("Invalid email address".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password should be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn authorize_url(
    config: &ProviderConfig,
    provider: FederatedProvider,
    redirect_to: Option<&str>,
    challenge: &str,
) -> AuthResult<Url> {
    let mut url = Url::parse(&config.auth_endpoint("authorize"))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("provider", provider.as_str());
        if let Some(redirect_to) = redirect_to {
            query.append_pair("redirect_to", redirect_to);
        }
        query.append_pair("code_challenge", challenge);
        query.append_pair("code_challenge_method", CHALLENGE_METHOD);
    }
    Ok(url)
}

async fn read_json<T: DeserializeOwned>(response: Response, grant: Option<Grant>) -> AuthResult<T> {
    if !response.status().is_success() {
        return Err(error_from_response(response, grant).await);
    }
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

async fn error_from_response(response: Response, grant: Option<Grant>) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_error(status, &ProviderErrorBody::parse(&body), grant)
}

fn classify_error(status: StatusCode, body: &ProviderErrorBody, grant: Option<Grant>) -> AuthError {
    let message = body.message(status);
    let code = body.code();

    if grant == Some(Grant::Password)
        && (matches!(status.as_u16(), 400 | 401)
            || code.is_some_and(|code| CREDENTIAL_CODES.contains(&code)))
    {
        return AuthError::InvalidCredentials(message);
    }
    if code.is_some_and(|code| VALIDATION_CODES.contains(&code)) {
        return AuthError::Validation(message);
    }
    AuthError::provider(status, message)
}

/// Error payload shapes returned by the service across versions.
#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

impl ProviderErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| Self {
            message: Some(body.trim().to_string()).filter(|m| !m.is_empty()),
            ..Self::default()
        })
    }

    fn message(&self, status: StatusCode) -> String {
        self.error_description
            .as_ref()
            .or(self.msg.as_ref())
            .or(self.message.as_ref())
            .or(self.error.as_ref())
            .cloned()
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            })
    }

    fn code(&self) -> Option<&str> {
        self.error_code.as_deref().or(self.error.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default = "bearer")]
    token_type: String,
    expires_in: i64,
    #[serde(default)]
    expires_at: Option<i64>,
    user: Principal,
}

fn bearer() -> String {
    "bearer".to_string()
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| Utc::now().timestamp() + self.expires_in);
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_in: self.expires_in,
            expires_at,
            user: self.user,
        }
    }
}

/// With auto-confirm the service answers sign-up with a full session,
/// otherwise with the bare user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(Principal),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn offline_config() -> ProviderConfig {
        // Nothing listens here; tests below never reach the network.
        ProviderConfig::new("http://127.0.0.1:9", "anon-key")
    }

    fn long_lived_session(refresh_token: &str) -> Session {
        Session {
            access_token: "access".into(),
            refresh_token: refresh_token.into(),
            token_type: "bearer".into(),
            expires_in: 3600,
            expires_at: Utc::now().timestamp() + 3600,
            user: Principal {
                id: "user-1".into(),
                email: Some("a@b.com".into()),
                user_metadata: None,
                created_at: None,
            },
        }
    }

    #[test]
    fn password_grant_rejections_are_credential_errors() {
        let body = ProviderErrorBody::parse(
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        let err = classify_error(StatusCode::BAD_REQUEST, &body, Some(Grant::Password));
        assert!(
            matches!(err, AuthError::InvalidCredentials(ref msg) if msg == "Invalid login credentials")
        );
    }

    #[test]
    fn weak_password_is_a_validation_error() {
        let body = ProviderErrorBody::parse(
            r#"{"code":422,"error_code":"weak_password","msg":"Password should be at least 6 characters"}"#,
        );
        let err = classify_error(StatusCode::UNPROCESSABLE_ENTITY, &body, None);
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[test]
    fn other_failures_keep_status() {
        let body = ProviderErrorBody::parse(r#"{"msg":"User already registered"}"#);
        let err = classify_error(StatusCode::UNPROCESSABLE_ENTITY, &body, None);
        assert_eq!(err.http_status(), Some(422));
        assert!(err.to_string().contains("User already registered"));
        assert!(!err.is_transient());

        let err = classify_error(
            StatusCode::BAD_GATEWAY,
            &ProviderErrorBody::parse("<html>upstream down</html>"),
            None,
        );
        assert!(err.is_transient());
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn empty_error_body_falls_back_to_reason() {
        let body = ProviderErrorBody::parse("");
        assert_eq!(body.message(StatusCode::SERVICE_UNAVAILABLE), "Service Unavailable");
    }

    #[test]
    fn sign_up_response_distinguishes_session_from_user() {
        let user_only: SignUpResponse =
            serde_json::from_str(r#"{"id":"u1","email":"new@x.com","created_at":"2024-05-01T10:00:00.123456Z"}"#)
                .unwrap();
        assert!(matches!(user_only, SignUpResponse::User(ref p) if p.id == "u1"));

        let with_session: SignUpResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","token_type":"bearer","expires_in":3600,
                "user":{"id":"u1","email":"new@x.com"}}"#,
        )
        .unwrap();
        let SignUpResponse::Session(token) = with_session else {
            panic!("expected a session");
        };
        let before = Utc::now().timestamp();
        let session = token.into_session();
        assert!(session.expires_at >= before + 3600);
        assert_eq!(session.user.email.as_deref(), Some("new@x.com"));
    }

    #[test]
    fn rejects_bad_credentials_locally() {
        assert!(matches!(
            validate_new_credentials("not-an-email", "long-enough"),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            validate_new_credentials("a@b.com", "12345"),
            Err(AuthError::Validation(_))
        ));
        assert!(validate_new_credentials("a@b.com", "123456").is_ok());
    }

    #[tokio::test]
    async fn federated_sign_in_builds_pkce_authorize_url() {
        let client = GoTrueClient::new(offline_config()).unwrap();
        let redirect = client
            .sign_in_with_federated_provider(
                FederatedProvider::Github,
                Some("http://localhost:3000/auth/callback"),
            )
            .await
            .unwrap();

        let url = Url::parse(&redirect.url).unwrap();
        assert_eq!(url.path(), "/auth/v1/authorize");
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["provider"], "github");
        assert_eq!(pairs["redirect_to"], "http://localhost:3000/auth/callback");
        assert_eq!(pairs["code_challenge_method"], "s256");

        let verifier = client.inner.take_verifier().unwrap().unwrap();
        assert_eq!(pairs["code_challenge"], crate::auth::pkce::challenge_for(&verifier));
    }

    #[tokio::test]
    async fn completing_without_pending_sign_in_fails_before_network() {
        let client = GoTrueClient::new(offline_config()).unwrap();
        let err = client.complete_federated_sign_in("code").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCodeVerifier));
    }

    #[tokio::test]
    async fn sign_out_without_session_emits_signed_out() {
        let client = GoTrueClient::new(offline_config()).unwrap();
        let events = Arc::new(AtomicUsize::new(0));
        let _subscription = {
            let events = events.clone();
            client.on_session_change(Arc::new(move |change| {
                assert_eq!(change.event, SessionEvent::SignedOut);
                events.fetch_add(1, Ordering::SeqCst);
            }))
        };

        client.sign_out().await.unwrap();
        assert_eq!(events.load(Ordering::SeqCst), 1);
        assert!(client.get_active_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn restores_and_adopts_persisted_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = SessionStore::new(&path);
        store.save_session(&long_lived_session("first")).unwrap();

        let mut config = offline_config();
        config.persist_session = true;
        config.session_path = path;
        let client = GoTrueClient::new(config).unwrap();

        let active = client.get_active_session().await.unwrap().unwrap();
        assert_eq!(active.refresh_token, "first");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let _subscription = {
            let seen = seen.clone();
            client.on_session_change(Arc::new(move |change| seen.lock().push(change.event)))
        };

        // Another process rotates the token, then signs out.
        store.save_session(&long_lived_session("second")).unwrap();
        client.sync_now().await;
        assert_eq!(client.cached_session().unwrap().refresh_token, "second");

        store.clear_session().unwrap();
        client.sync_now().await;
        assert!(client.cached_session().is_none());

        assert_eq!(
            *seen.lock(),
            vec![SessionEvent::TokenRefreshed, SessionEvent::SignedOut]
        );
    }
}
