// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration of the taskboard service.
//!
//! `Config` offers an alternative configuration API which can be loaded from a TOML file and passed
//! into `ServiceBuilder::config` instead of setting every option on the builder.
//!
//! ```toml
//! [database]
//! url = "sqlite:taskboard.sqlite"
//! max_connections = 8
//!
//! [authority]
//! domain = "example.eu.auth0.com"
//! client_id = "..."
//! client_secret = "..."
//! resource_server_id = "..."
//! api_identifier = "https://api.example.com"
//! ```
use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use taskboard_auth::ManagementConfig;
use thiserror::Error;

/// Default database url, a SQLite file in the working directory.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:taskboard.sqlite";

/// Default timeout of requests to the authority in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration parameters of the service.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,

    /// Management API of the external authority. Required when the service is built from this
    /// configuration alone.
    pub authority: Option<AuthorityConfig>,
}

impl Config {
    /// Parses a configuration from a TOML string. Missing values fall back to their defaults.
    pub fn from_toml(value: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(value)?)
    }

    /// Reads and parses a TOML configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let value = std::fs::read_to_string(path)?;
        Self::from_toml(&value)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection url. The database is created if it doesn't exist yet.
    pub url: String,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Apply pending migrations on start.
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 16,
            run_migrations: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuthorityConfig {
    /// Tenant domain of the authority.
    pub domain: String,

    pub client_id: String,

    pub client_secret: SecretString,

    /// Audience of the management API token, defaults to the management API of the domain.
    #[serde(default)]
    pub audience: Option<String>,

    /// Resource server holding all permissions.
    pub resource_server_id: String,

    /// Identifier of the resource server.
    pub api_identifier: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl From<AuthorityConfig> for ManagementConfig {
    fn from(config: AuthorityConfig) -> Self {
        ManagementConfig {
            domain: config.domain,
            client_id: config.client_id,
            client_secret: config.client_secret,
            audience: config.audience,
            resource_server_id: config.resource_server_id,
            api_identifier: config.api_identifier,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration file: {0}")]
    Read(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no authority configured")]
    MissingAuthority,
}
