use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio::sync::Notify;
use users_api::auth::listeners::ListenerRegistry;
use users_api::auth::{
    AuthController, AuthError, AuthHook, AuthResult, ControllerOptions, ErrorKind,
    FederatedProvider, FederatedRedirect, IdentityProvider, Principal, Session, SessionChange,
    SessionChangeHandler, SessionEvent, Subscription, auth_store, install_store, uninstall_store,
};

fn session_for(email: &str) -> Session {
    Session {
        access_token: format!("access-{email}"),
        refresh_token: format!("refresh-{email}"),
        token_type: "bearer".into(),
        expires_in: 3600,
        expires_at: chrono::Utc::now().timestamp() + 3600,
        user: Principal {
            id: format!("id-{email}"),
            email: Some(email.to_string()),
            user_metadata: None,
            created_at: None,
        },
    }
}

/// Scripted provider: password "wrong" is rejected, `down@x.com` hits a
/// provider outage, and `slow@x.com` blocks until `release` is notified.
#[derive(Default)]
struct FakeProvider {
    session: Mutex<Option<Session>>,
    listeners: ListenerRegistry,
    calls: Mutex<Vec<&'static str>>,
    release: Notify,
    active: AtomicUsize,
    max_active: AtomicUsize,
    last_redirect: Mutex<Option<String>>,
}

impl FakeProvider {
    fn enter(&self, call: &'static str) {
        self.calls.lock().push(call);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn calls_to(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == call).count()
    }

    /// A change that did not originate from the controller, such as a token
    /// refresh or a sign-in completed in another tab.
    fn push_external(&self, session: Option<Session>) {
        *self.session.lock() = session.clone();
        let event = if session.is_some() {
            SessionEvent::SignedIn
        } else {
            SessionEvent::SignedOut
        };
        self.listeners.emit(&SessionChange::new(event, session));
    }

    fn establish(&self, email: &str) -> Principal {
        let session = session_for(email);
        let principal = session.user.clone();
        *self.session.lock() = Some(session.clone());
        self.listeners
            .emit(&SessionChange::new(SessionEvent::SignedIn, Some(session)));
        principal
    }
}

#[rocket::async_trait]
impl IdentityProvider for FakeProvider {
    async fn get_active_session(&self) -> AuthResult<Option<Session>> {
        self.enter("get_active_session");
        tokio::task::yield_now().await;
        self.exit();
        Ok(self.session.lock().clone())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        _metadata: Option<serde_json::Value>,
    ) -> AuthResult<Principal> {
        self.enter("sign_up");
        tokio::task::yield_now().await;
        let result = if password.len() < 6 {
            Err(AuthError::Validation(
                "Password should be at least 6 characters".into(),
            ))
        } else {
            Ok(self.establish(email))
        };
        self.exit();
        result
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Principal> {
        self.enter("sign_in_with_password");
        if email == "slow@x.com" {
            self.release.notified().await;
        }
        tokio::task::yield_now().await;
        let result = if password == "wrong" {
            Err(AuthError::InvalidCredentials(
                "Invalid login credentials".into(),
            ))
        } else if email == "down@x.com" {
            Err(AuthError::provider(StatusCode::BAD_GATEWAY, "upstream unavailable"))
        } else {
            Ok(self.establish(email))
        };
        self.exit();
        result
    }

    async fn sign_in_with_federated_provider(
        &self,
        provider: FederatedProvider,
        redirect_to: Option<&str>,
    ) -> AuthResult<FederatedRedirect> {
        self.enter("sign_in_with_federated_provider");
        *self.last_redirect.lock() = redirect_to.map(str::to_string);
        self.exit();
        Ok(FederatedRedirect {
            provider,
            url: format!("https://idp.example.com/authorize?provider={provider}"),
        })
    }

    async fn complete_federated_sign_in(&self, auth_code: &str) -> AuthResult<Principal> {
        self.enter("complete_federated_sign_in");
        let result = if auth_code == "expired" {
            Err(AuthError::MissingCodeVerifier)
        } else {
            Ok(self.establish("oauth@x.com"))
        };
        self.exit();
        result
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.enter("sign_out");
        tokio::task::yield_now().await;
        *self.session.lock() = None;
        self.listeners
            .emit(&SessionChange::new(SessionEvent::SignedOut, None));
        self.exit();
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        _email: &str,
        redirect_to: Option<&str>,
    ) -> AuthResult<()> {
        self.enter("reset_password_for_email");
        *self.last_redirect.lock() = redirect_to.map(str::to_string);
        self.exit();
        Ok(())
    }

    fn on_session_change(&self, handler: SessionChangeHandler) -> Subscription {
        self.listeners.subscribe(handler)
    }
}

fn controller_with(provider: &Arc<FakeProvider>) -> Arc<AuthController> {
    Arc::new(AuthController::new(
        provider.clone(),
        ControllerOptions {
            oauth_redirect_url: Some("http://localhost:3000/auth/callback".into()),
            password_reset_redirect_url: Some("http://localhost:3000/auth/reset-password".into()),
        },
    ))
}

#[tokio::test]
async fn bootstrap_without_remote_session_is_idle_and_signed_out() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);
    assert!(controller.snapshot().loading);

    let principal = controller.bootstrap().await.expect("bootstrap");
    assert!(principal.is_none());

    let snapshot = controller.snapshot();
    assert!(snapshot.principal.is_none());
    assert!(!snapshot.loading);
    assert!(snapshot.last_error.is_none());
    assert!(snapshot.initialized);
}

#[tokio::test]
async fn bootstrap_adopts_existing_session() {
    let provider = Arc::new(FakeProvider::default());
    *provider.session.lock() = Some(session_for("back@x.com"));
    let controller = controller_with(&provider);

    controller.bootstrap().await.expect("bootstrap");
    assert_eq!(controller.snapshot().user_email(), Some("back@x.com"));
}

#[tokio::test]
async fn failed_sign_in_records_error_and_keeps_principal() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);
    controller.bootstrap().await.expect("bootstrap");
    controller
        .sign_in("a@b.com", "right-password")
        .await
        .expect("first sign-in");

    let err = controller
        .sign_in("a@b.com", "wrong")
        .await
        .expect_err("rejected credentials");
    assert_eq!(err.kind, ErrorKind::Auth);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.last_error.as_ref(), Some(&err));
    assert_eq!(snapshot.user_email(), Some("a@b.com"));
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn provider_outage_is_reported_as_retryable() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);

    let err = controller
        .sign_in("down@x.com", "pw123456")
        .await
        .expect_err("outage");
    assert_eq!(err.kind, ErrorKind::Provider);
    assert_eq!(err.status, Some(502));
    assert!(err.retryable);
    assert!(controller.snapshot().principal.is_none());
}

#[tokio::test]
async fn next_operation_clears_previous_error() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);

    controller.sign_in("a@b.com", "wrong").await.expect_err("rejected");
    assert!(controller.snapshot().last_error.is_some());

    let mut rx = controller.subscribe();
    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.sign_in("slow@x.com", "pw123456").await })
    };
    while !rx.borrow_and_update().loading {
        rx.changed().await.expect("controller alive");
    }
    assert!(controller.snapshot().last_error.is_none());

    provider.release.notify_one();
    task.await.expect("join").expect("sign in");

    controller
        .reset_password("a@b.com")
        .await
        .expect("reset password");
    assert!(controller.snapshot().last_error.is_none());
    assert_eq!(
        provider.last_redirect.lock().as_deref(),
        Some("http://localhost:3000/auth/reset-password")
    );
}

#[tokio::test]
async fn sign_up_sets_principal() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);

    let principal = controller
        .sign_up("new@x.com", "pw123456", None)
        .await
        .expect("sign up");
    assert_eq!(principal.email.as_deref(), Some("new@x.com"));
    assert_eq!(controller.snapshot().user_email(), Some("new@x.com"));

    let err = controller
        .sign_up("short@x.com", "pw", None)
        .await
        .expect_err("weak password");
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(controller.snapshot().user_email(), Some("new@x.com"));
}

#[tokio::test]
async fn sign_out_clears_principal_even_when_already_signed_out() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);

    controller.sign_in("a@b.com", "pw123456").await.expect("sign in");
    controller.sign_out().await.expect("sign out");
    assert!(controller.snapshot().principal.is_none());

    controller.sign_out().await.expect("second sign out");
    assert_eq!(provider.calls_to("sign_out"), 2);
    let snapshot = controller.snapshot();
    assert!(snapshot.principal.is_none());
    assert!(snapshot.last_error.is_none());
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn external_change_updates_principal_without_loading() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);
    controller.bootstrap().await.expect("bootstrap");

    provider.push_external(Some(session_for("elsewhere@x.com")));
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.user_email(), Some("elsewhere@x.com"));
    assert!(!snapshot.loading);
    assert!(snapshot.last_error.is_none());

    provider.push_external(None);
    assert!(controller.snapshot().principal.is_none());
}

#[tokio::test]
async fn listener_before_bootstrap_marks_initialized_and_idle() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);

    provider.push_external(Some(session_for("early@x.com")));
    let snapshot = controller.snapshot();
    assert!(snapshot.initialized);
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn loading_stays_true_while_an_operation_is_in_flight() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);
    controller.bootstrap().await.expect("bootstrap");

    let mut rx = controller.subscribe();
    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.sign_in("slow@x.com", "pw123456").await })
    };

    loop {
        rx.changed().await.expect("controller alive");
        if rx.borrow_and_update().loading {
            break;
        }
    }

    // A notification during the call updates the principal but cannot end loading.
    provider.push_external(Some(session_for("other@x.com")));
    let snapshot = controller.snapshot();
    assert!(snapshot.loading);
    assert_eq!(snapshot.user_email(), Some("other@x.com"));

    provider.release.notify_one();
    let principal = task.await.expect("join").expect("sign in");
    assert_eq!(principal.email.as_deref(), Some("slow@x.com"));

    let snapshot = controller.snapshot();
    assert!(!snapshot.loading);
    assert_eq!(snapshot.user_email(), Some("slow@x.com"));
}

#[tokio::test]
async fn cancelled_operation_resets_loading() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);
    controller.bootstrap().await.expect("bootstrap");

    let task = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.sign_in("slow@x.com", "pw123456").await })
    };
    let mut rx = controller.subscribe();
    while !rx.borrow_and_update().loading {
        rx.changed().await.expect("controller alive");
    }

    task.abort();
    let _ = task.await;
    assert!(!controller.snapshot().loading);
}

#[tokio::test]
async fn operations_are_serialized() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);

    let (first, second, third) = tokio::join!(
        controller.sign_in("a@b.com", "pw123456"),
        controller.sign_up("c@d.com", "pw123456", None),
        controller.sign_out(),
    );
    first.expect("sign in");
    second.expect("sign up");
    third.expect("sign out");

    assert_eq!(provider.max_active.load(Ordering::SeqCst), 1);
    assert!(!controller.snapshot().loading);
}

#[tokio::test]
async fn revision_increases_on_every_write() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);

    let before = controller.snapshot().revision;
    controller.bootstrap().await.expect("bootstrap");
    let after_bootstrap = controller.snapshot().revision;
    assert!(after_bootstrap > before);

    provider.push_external(None);
    assert_eq!(controller.snapshot().revision, after_bootstrap + 1);
}

#[tokio::test]
async fn federated_sign_in_uses_configured_redirect_and_rejects_unknown_providers() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);

    let redirect = controller
        .sign_in_with_provider(FederatedProvider::Google)
        .await
        .expect("redirect");
    assert_eq!(redirect.provider, FederatedProvider::Google);
    assert!(controller.snapshot().principal.is_none());
    assert_eq!(
        provider.last_redirect.lock().as_deref(),
        Some("http://localhost:3000/auth/callback")
    );

    let err = controller
        .sign_in_with_provider_named("myspace")
        .await
        .expect_err("unknown provider");
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(controller.snapshot().last_error, Some(err));
    assert_eq!(provider.calls_to("sign_in_with_federated_provider"), 1);

    let principal = controller
        .complete_provider_sign_in("code-123")
        .await
        .expect("callback");
    assert_eq!(principal.email.as_deref(), Some("oauth@x.com"));
    assert!(controller.snapshot().last_error.is_none());

    let err = controller
        .complete_provider_sign_in("expired")
        .await
        .expect_err("no verifier");
    assert_eq!(err.kind, ErrorKind::Provider);
    assert_eq!(controller.snapshot().user_email(), Some("oauth@x.com"));
}

#[tokio::test]
async fn dispose_is_idempotent_and_stops_updates() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);
    controller.bootstrap().await.expect("bootstrap");

    controller.dispose();
    controller.dispose();
    assert!(controller.is_disposed());
    assert!(provider.listeners.is_empty());

    provider.push_external(Some(session_for("ignored@x.com")));
    assert!(controller.snapshot().principal.is_none());
}

#[tokio::test]
async fn dropping_the_controller_unsubscribes() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);
    assert_eq!(provider.listeners.len(), 1);
    drop(controller);
    assert!(provider.listeners.is_empty());
}

#[tokio::test]
async fn hook_and_store_share_one_controller() {
    let provider = Arc::new(FakeProvider::default());
    let controller = controller_with(&provider);
    let store = install_store(controller.clone());
    let mut hook = AuthHook::new(controller.clone());

    store.bootstrap().await.expect("bootstrap");
    assert!(store.initialized());
    assert!(!store.is_authenticated());

    hook.sign_in("a@b.com", "pw123456").await.expect("sign in");
    let latest = hook.changed().await.expect("controller alive");
    assert!(!latest.loading);
    assert_eq!(latest.user_email(), Some("a@b.com"));

    let shared = auth_store().expect("store installed");
    assert!(shared.is_authenticated());
    assert_eq!(shared.user_email().as_deref(), Some("a@b.com"));
    assert_eq!(shared.user_id().as_deref(), Some("id-a@b.com"));
    assert_eq!(hook.principal().and_then(|p| p.email), Some("a@b.com".into()));
    assert!(hook.last_error().is_none());

    uninstall_store();
    assert!(auth_store().is_none());
}
