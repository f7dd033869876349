// SPDX-License-Identifier: MIT OR Apache-2.0

use taskboard_auth::{Authority, ManagementClient, ManagementError};
use taskboard_store::{SqliteError, SqliteStore, SqliteStoreBuilder};
use thiserror::Error;

use crate::Service;
use crate::config::{Config, ConfigError};

pub struct ServiceBuilder<A> {
    authority: A,
    store: Option<SqliteStore<'static>>,
    store_builder: SqliteStoreBuilder,
}

impl<A> ServiceBuilder<A>
where
    A: Authority + Clone,
    A::Error: Send + Sync + 'static,
{
    pub(crate) fn new(authority: A) -> Self {
        ServiceBuilder {
            authority,
            store: None,
            store_builder: SqliteStoreBuilder::default(),
        }
    }

    /// Applies the database settings of a configuration.
    pub fn config(mut self, config: &Config) -> Self {
        self.store_builder = self
            .store_builder
            .database_url(&config.database.url)
            .max_connections(config.database.max_connections)
            .run_default_migrations(config.database.run_migrations);
        self
    }

    pub fn database_url(mut self, url: &str) -> Self {
        self.store_builder = self.store_builder.database_url(url);
        self
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.store_builder = self.store_builder.max_connections(max_connections);
        self
    }

    pub fn run_migrations(mut self, value: bool) -> Self {
        self.store_builder = self.store_builder.run_default_migrations(value);
        self
    }

    /// Uses an already connected store, all database settings are ignored.
    pub fn store(mut self, store: SqliteStore<'static>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn build(self) -> Result<Service<A>, StartError> {
        let store = match self.store {
            Some(store) => store,
            None => self.store_builder.build().await?,
        };

        Ok(Service::new(store, self.authority))
    }
}

impl Service<ManagementClient> {
    /// Connects to the database and the management API of the authority named in the
    /// configuration.
    pub async fn from_config(config: Config) -> Result<Self, StartError> {
        let authority = config
            .authority
            .clone()
            .ok_or(ConfigError::MissingAuthority)?;
        let client = ManagementClient::new(authority.into())?;

        Service::builder(client).config(&config).build().await
    }
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] SqliteError),

    #[error(transparent)]
    Authority(#[from] ManagementError),
}
