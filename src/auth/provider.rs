//! The contract between the session controller and a remote identity service.

use crate::auth::AuthResult;
use crate::auth::listeners::{SessionChangeHandler, Subscription};
use crate::auth::types::{FederatedProvider, FederatedRedirect, Principal, Session};

#[rocket::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, refreshed first when it is about to expire.
    async fn get_active_session(&self) -> AuthResult<Option<Session>>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Option<serde_json::Value>,
    ) -> AuthResult<Principal>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<Principal>;

    /// Start a federated sign-in. Completion arrives through the
    /// session-change channel, never through this return value.
    async fn sign_in_with_federated_provider(
        &self,
        provider: FederatedProvider,
        redirect_to: Option<&str>,
    ) -> AuthResult<FederatedRedirect>;

    /// Exchange the code returned to the redirect target for a session.
    async fn complete_federated_sign_in(&self, auth_code: &str) -> AuthResult<Principal>;

    async fn sign_out(&self) -> AuthResult<()>;

    async fn reset_password_for_email(&self, email: &str, redirect_to: Option<&str>)
    -> AuthResult<()>;

    fn on_session_change(&self, handler: SessionChangeHandler) -> Subscription;
}
