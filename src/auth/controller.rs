//! Local auth state mirroring the remote session.
//!
//! Two producers write the state: controller operations and the provider's
//! session-change notifications. Both go through one lock and every write
//! bumps the snapshot revision and publishes it on a `watch` channel.
//! Operations are serialized per controller.

use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::auth::config::ProviderConfig;
use crate::auth::listeners::Subscription;
use crate::auth::provider::IdentityProvider;
use crate::auth::shared::shared_client;
use crate::auth::types::{
    AuthSnapshot, FederatedProvider, FederatedRedirect, Principal, SessionChange,
};
use crate::auth::{AuthResult, ErrorInfo};

/// Redirect targets handed to the provider.
#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    pub oauth_redirect_url: Option<String>,
    pub password_reset_redirect_url: Option<String>,
}

impl ControllerOptions {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            oauth_redirect_url: config.oauth_redirect_url.clone(),
            password_reset_redirect_url: config.password_reset_redirect_url.clone(),
        }
    }
}

struct ControllerState {
    snapshot: AuthSnapshot,
    in_flight: usize,
}

struct SharedState {
    state: Mutex<ControllerState>,
    tx: watch::Sender<AuthSnapshot>,
}

impl SharedState {
    fn new() -> Self {
        let snapshot = AuthSnapshot::default();
        let (tx, _rx) = watch::channel(snapshot.clone());
        Self {
            state: Mutex::new(ControllerState {
                snapshot,
                in_flight: 0,
            }),
            tx,
        }
    }

    fn update(&self, mutate: impl FnOnce(&mut ControllerState)) {
        let mut state = self.state.lock();
        mutate(&mut state);
        state.snapshot.revision += 1;
        self.tx.send_replace(state.snapshot.clone());
    }

    fn snapshot(&self) -> AuthSnapshot {
        self.state.lock().snapshot.clone()
    }

    fn apply_change(&self, change: &SessionChange) {
        log::debug!("auth state follows {:?}", change.event);
        self.update(|state| {
            state.snapshot.principal = change.principal().cloned();
            state.snapshot.initialized = true;
            state.snapshot.loading = state.in_flight > 0;
        });
    }
}

/// Marks an operation in flight; `loading` falls back to false on drop,
/// including when the operation future is cancelled.
struct LoadingGuard<'a> {
    shared: &'a SharedState,
}

impl<'a> LoadingGuard<'a> {
    fn begin(shared: &'a SharedState) -> Self {
        shared.update(|state| {
            state.in_flight += 1;
            state.snapshot.last_error = None;
            state.snapshot.loading = true;
        });
        Self { shared }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.shared.update(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.snapshot.loading = state.in_flight > 0;
        });
    }
}

pub struct AuthController {
    provider: Arc<dyn IdentityProvider>,
    options: ControllerOptions,
    shared: Arc<SharedState>,
    gate: tokio::sync::Mutex<()>,
    subscription: Subscription,
}

impl AuthController {
    pub fn new(provider: Arc<dyn IdentityProvider>, options: ControllerOptions) -> Self {
        let shared = Arc::new(SharedState::new());
        let weak: Weak<SharedState> = Arc::downgrade(&shared);
        let subscription = provider.on_session_change(Arc::new(move |change| {
            if let Some(shared) = weak.upgrade() {
                shared.apply_change(change);
            }
        }));

        Self {
            provider,
            options,
            shared,
            gate: tokio::sync::Mutex::new(()),
            subscription,
        }
    }

    /// Controller over the process-wide provider client.
    pub fn connect() -> AuthResult<Self> {
        let client = shared_client()?;
        let options = ControllerOptions::from_config(client.config());
        Ok(Self::new(Arc::new(client), options))
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.shared.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.shared.tx.subscribe()
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Load the current session from the provider.
    pub async fn bootstrap(&self) -> Result<Option<Principal>, ErrorInfo> {
        self.run(
            "bootstrap",
            async {
                let session = self.provider.get_active_session().await?;
                Ok(session.map(|session| session.user))
            },
            |principal, state| {
                state.snapshot.principal = principal.clone();
                state.snapshot.initialized = true;
            },
        )
        .await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Principal, ErrorInfo> {
        self.run(
            "sign_up",
            self.provider.sign_up(email, password, metadata),
            |principal, state| state.snapshot.principal = Some(principal.clone()),
        )
        .await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, ErrorInfo> {
        self.run(
            "sign_in",
            self.provider.sign_in_with_password(email, password),
            |principal, state| state.snapshot.principal = Some(principal.clone()),
        )
        .await
    }

    /// Start a federated sign-in. The principal arrives later through the
    /// session-change listener.
    pub async fn sign_in_with_provider(
        &self,
        provider: FederatedProvider,
    ) -> Result<FederatedRedirect, ErrorInfo> {
        let redirect_to = self.options.oauth_redirect_url.as_deref();
        self.run(
            "sign_in_with_provider",
            self.provider
                .sign_in_with_federated_provider(provider, redirect_to),
            |_, _| {},
        )
        .await
    }

    /// Like [`sign_in_with_provider`](Self::sign_in_with_provider) for a
    /// provider given by name; unknown names are a validation failure.
    pub async fn sign_in_with_provider_named(
        &self,
        name: &str,
    ) -> Result<FederatedRedirect, ErrorInfo> {
        let redirect_to = self.options.oauth_redirect_url.as_deref();
        self.run(
            "sign_in_with_provider",
            async {
                let provider: FederatedProvider = name.parse()?;
                self.provider
                    .sign_in_with_federated_provider(provider, redirect_to)
                    .await
            },
            |_, _| {},
        )
        .await
    }

    pub async fn complete_provider_sign_in(&self, auth_code: &str) -> Result<Principal, ErrorInfo> {
        self.run(
            "complete_provider_sign_in",
            self.provider.complete_federated_sign_in(auth_code),
            |principal, state| state.snapshot.principal = Some(principal.clone()),
        )
        .await
    }

    pub async fn sign_out(&self) -> Result<(), ErrorInfo> {
        self.run("sign_out", self.provider.sign_out(), |_, state| {
            state.snapshot.principal = None;
        })
        .await
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), ErrorInfo> {
        let redirect_to = self.options.password_reset_redirect_url.as_deref();
        self.run(
            "reset_password",
            self.provider.reset_password_for_email(email, redirect_to),
            |_, _| {},
        )
        .await
    }

    /// Detach from the provider's change notifications. Safe to call twice.
    pub fn dispose(&self) {
        self.subscription.unsubscribe();
    }

    pub fn is_disposed(&self) -> bool {
        !self.subscription.is_active()
    }

    async fn run<T, F>(
        &self,
        operation: &'static str,
        call: F,
        on_success: impl FnOnce(&T, &mut ControllerState),
    ) -> Result<T, ErrorInfo>
    where
        F: Future<Output = AuthResult<T>>,
    {
        let _serial = self.gate.lock().await;
        let _loading = LoadingGuard::begin(&self.shared);
        log::debug!("auth {} started", operation);

        match call.await {
            Ok(value) => {
                self.shared.update(|state| on_success(&value, state));
                log::debug!("auth {} succeeded", operation);
                Ok(value)
            }
            Err(err) => {
                let info = ErrorInfo::from(&err);
                log::warn!("auth {} failed: {}", operation, err);
                self.shared
                    .update(|state| state.snapshot.last_error = Some(info.clone()));
                Err(info)
            }
        }
    }
}

impl Drop for AuthController {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for AuthController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthController")
            .field("snapshot", &self.snapshot())
            .field("options", &self.options)
            .finish()
    }
}
