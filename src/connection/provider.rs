use super::SharedConnection;
use super::config::ConnectionConfig;
use crate::core::{DbError, Result};
use crate::engine::{EngineOptions, Repository};
use crate::schema::Entity;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Source of connection settings and live connections, keyed by database name.
pub trait Configurations: Send + Sync {
    /// The open connection for `database`, if one was established.
    fn connection(&self, database: &str) -> Option<SharedConnection>;

    /// Settings for `database`, if it is configured.
    fn connection_config(&self, database: &str) -> Option<ConnectionConfig>;

    /// Remembers `connection` so later repositories of `database` reuse it.
    fn set_connection(&self, database: &str, connection: SharedConnection);
}

/// Opens connections for one driver.
pub trait ConnectionProvider: Send + Sync {
    fn open(&self, config: &ConnectionConfig) -> Result<SharedConnection>;
}

/// In-process configuration table.
///
/// # Examples
///
/// ```
/// use recordkeeper::ConnectionConfig;
/// use recordkeeper::connection::provider::{Configurations, StaticConfigurations};
///
/// let configs = StaticConfigurations::new()
///     .with_database("app", ConnectionConfig::new("app", "pw").database("app_db"));
/// assert!(configs.connection_config("app").is_some());
/// assert!(configs.connection("app").is_none());
/// ```
#[derive(Default)]
pub struct StaticConfigurations {
    configs: HashMap<String, ConnectionConfig>,
    connections: Mutex<HashMap<String, SharedConnection>>,
}

impl StaticConfigurations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, database: &str, config: ConnectionConfig) -> Self {
        self.configs.insert(database.to_string(), config);
        self
    }

    /// Reads a JSON object mapping database names to connection settings.
    pub fn from_json(json: &str) -> Result<Self> {
        let configs: HashMap<String, ConnectionConfig> = serde_json::from_str(json)?;
        Ok(Self {
            configs,
            connections: Mutex::new(HashMap::new()),
        })
    }

    pub fn databases(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }
}

impl Configurations for StaticConfigurations {
    fn connection(&self, database: &str) -> Option<SharedConnection> {
        // A poisoned table still holds valid entries
        let connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        connections.get(database).cloned()
    }

    fn connection_config(&self, database: &str) -> Option<ConnectionConfig> {
        self.configs.get(database).cloned()
    }

    fn set_connection(&self, database: &str, connection: SharedConnection) {
        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        connections.insert(database.to_string(), connection);
    }
}

/// Builds repositories for [`Entity`] types, opening at most one connection
/// per configured database.
pub struct RepositoryFactory {
    configurations: Arc<dyn Configurations>,
    providers: HashMap<String, Arc<dyn ConnectionProvider>>,
    options: EngineOptions,
}

impl RepositoryFactory {
    pub fn new(configurations: Arc<dyn Configurations>) -> Self {
        Self {
            configurations,
            providers: HashMap::new(),
            options: EngineOptions::default(),
        }
    }

    /// Registers the provider used for configs whose `driver` is `driver`.
    pub fn with_provider(mut self, driver: &str, provider: Arc<dyn ConnectionProvider>) -> Self {
        self.providers.insert(driver.to_string(), provider);
        self
    }

    /// Options handed to every repository this factory creates.
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn configurations(&self) -> &Arc<dyn Configurations> {
        &self.configurations
    }

    /// Creates the repository for `E`.
    pub fn create<E: Entity>(&self) -> Result<Repository> {
        let descriptor = E::descriptor()?;
        let connection = self.connection(E::DATABASE)?;
        debug!(
            database = E::DATABASE,
            table = descriptor.table_name(),
            "repository created"
        );
        Ok(Repository::new(descriptor, connection).with_options(self.options))
    }

    /// The connection for `database`, opened on first use.
    pub fn connection(&self, database: &str) -> Result<SharedConnection> {
        if let Some(connection) = self.configurations.connection(database) {
            return Ok(connection);
        }

        let config = self.configurations.connection_config(database).ok_or_else(|| {
            DbError::ConfigurationError(format!("No connection configured for database '{}'", database))
        })?;
        config.validate()?;

        let provider = self.providers.get(&config.driver).ok_or_else(|| {
            DbError::ConfigurationError(format!(
                "No provider registered for driver '{}' (database '{}')",
                config.driver, database
            ))
        })?;

        let connection = provider.open(&config)?;
        info!(database, url = %config.to_url(), "connection opened");
        self.configurations.set_connection(database, connection.clone());
        Ok(connection)
    }
}
