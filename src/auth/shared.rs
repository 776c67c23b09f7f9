//! Process-wide identity provider handle.

use parking_lot::RwLock;

use crate::auth::config::ProviderConfig;
use crate::auth::gotrue::GoTrueClient;
use crate::auth::{AuthError, AuthResult};

static SHARED: RwLock<Option<GoTrueClient>> = parking_lot::const_rwlock(None);

/// The shared client, built from the environment on first use.
pub fn shared_client() -> AuthResult<GoTrueClient> {
    if let Some(client) = SHARED.read().as_ref() {
        return Ok(client.clone());
    }

    let mut slot = SHARED.write();
    if let Some(client) = slot.as_ref() {
        return Ok(client.clone());
    }
    let client = GoTrueClient::new(ProviderConfig::from_env()?)?;
    log::info!("identity provider client initialised for {}", client.config().url);
    *slot = Some(client.clone());
    Ok(client)
}

/// Install an explicit configuration. Fails if a client already exists.
pub fn init_shared_client(config: ProviderConfig) -> AuthResult<GoTrueClient> {
    let mut slot = SHARED.write();
    if slot.is_some() {
        return Err(AuthError::Config(
            "identity provider client is already initialised".into(),
        ));
    }
    let client = GoTrueClient::new(config)?;
    *slot = Some(client.clone());
    Ok(client)
}

/// Drop the shared client and stop its keeper task.
pub fn reset_shared_client() {
    if let Some(client) = SHARED.write().take() {
        client.shutdown();
        log::debug!("identity provider client reset");
    }
}
