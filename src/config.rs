//! Server configuration loaded from environment variables.

use std::time::Duration;

use rocket::figment::Figment;
use thiserror::Error;

use crate::auth::{AuthError, ProviderConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SUPABASE_DB_URL or DATABASE_URL must be set")]
    MissingDatabaseUrl,
    #[error("identity provider configuration: {0}")]
    Provider(#[from] AuthError),
    #[error("CORS configuration: {0}")]
    Cors(#[from] rocket_cors::Error),
}

/// Pool settings for the `users_db` database.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: usize,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            idle_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        ["SUPABASE_DB_URL", "DATABASE_URL"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|value| !value.trim().is_empty())
            .map(|url| Self::new(url.trim()))
            .ok_or(ConfigError::MissingDatabaseUrl)
    }

    /// Merge pool settings into a Rocket figment under `databases.users_db`.
    pub fn merge_into(&self, figment: Figment) -> Figment {
        figment
            .merge(("databases.users_db.url", self.url.as_str()))
            .merge(("databases.users_db.max_connections", self.max_connections))
            .merge(("databases.users_db.idle_timeout", self.idle_timeout.as_secs()))
            .merge((
                "databases.users_db.connect_timeout",
                self.connect_timeout.as_secs(),
            ))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database: DatabaseConfig::from_env()?,
            provider: ProviderConfig::from_env()?,
        })
    }
}
