//! Authentication glue: a client for the remote identity provider and the
//! session controller that mirrors its state locally.

pub mod config;
pub mod controller;
pub mod error;
pub mod gotrue;
pub mod listeners;
pub mod pkce;
pub mod provider;
pub mod shared;
pub mod store;
pub mod surfaces;
pub mod types;

pub use config::{ProviderConfig, RefreshPolicy};
pub use controller::{AuthController, ControllerOptions};
pub use error::{AuthError, AuthResult, ErrorInfo, ErrorKind};
pub use gotrue::GoTrueClient;
pub use listeners::{SessionChangeHandler, Subscription};
pub use provider::IdentityProvider;
pub use shared::{init_shared_client, reset_shared_client, shared_client};
pub use surfaces::{AuthHook, AuthStore, auth_store, install_store, uninstall_store};
pub use types::{
    AuthSnapshot, FederatedProvider, FederatedRedirect, Principal, Session, SessionChange,
    SessionEvent,
};
