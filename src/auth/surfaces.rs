//! Consumption surfaces over one [`AuthController`]: a per-consumer hook with
//! change notification, and a process-wide store with derived getters.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::auth::controller::AuthController;
use crate::auth::types::{AuthSnapshot, Principal};
use crate::auth::ErrorInfo;

/// Reactive accessor for a single consumer. Operations are reachable through
/// `Deref` to the controller.
pub struct AuthHook {
    controller: Arc<AuthController>,
    rx: watch::Receiver<AuthSnapshot>,
}

impl AuthHook {
    pub fn new(controller: Arc<AuthController>) -> Self {
        let rx = controller.subscribe();
        Self { controller, rx }
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.rx.borrow().clone()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.rx.borrow().principal.clone()
    }

    pub fn loading(&self) -> bool {
        self.rx.borrow().loading
    }

    pub fn last_error(&self) -> Option<ErrorInfo> {
        self.rx.borrow().last_error.clone()
    }

    /// Wait for the next state write. Returns the new snapshot, or `None`
    /// once the controller is gone.
    pub async fn changed(&mut self) -> Option<AuthSnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

impl Deref for AuthHook {
    type Target = AuthController;

    fn deref(&self) -> &AuthController {
        &self.controller
    }
}

/// Process-wide store view with derived getters.
#[derive(Clone)]
pub struct AuthStore {
    controller: Arc<AuthController>,
}

static STORE: RwLock<Option<AuthStore>> = parking_lot::const_rwlock(None);

/// Install the controller backing [`auth_store`], replacing any previous one.
pub fn install_store(controller: Arc<AuthController>) -> AuthStore {
    let store = AuthStore { controller };
    if let Some(previous) = STORE.write().replace(store.clone()) {
        if !Arc::ptr_eq(&previous.controller, &store.controller) {
            previous.controller.dispose();
        }
    }
    store
}

pub fn auth_store() -> Option<AuthStore> {
    STORE.read().clone()
}

pub fn uninstall_store() {
    if let Some(previous) = STORE.write().take() {
        previous.controller.dispose();
    }
}

impl AuthStore {
    pub fn hook(&self) -> AuthHook {
        AuthHook::new(self.controller.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.controller.snapshot().is_authenticated()
    }

    pub fn user_id(&self) -> Option<String> {
        self.controller.snapshot().user_id().map(str::to_string)
    }

    pub fn user_email(&self) -> Option<String> {
        self.controller.snapshot().user_email().map(str::to_string)
    }

    pub fn initialized(&self) -> bool {
        self.controller.snapshot().initialized
    }

    pub fn loading(&self) -> bool {
        self.controller.snapshot().loading
    }
}

impl Deref for AuthStore {
    type Target = AuthController;

    fn deref(&self) -> &AuthController {
        &self.controller
    }
}
