//! Connection, introspection and configuration contracts.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ConvergeError, Result};
use crate::platform::Platform;
use crate::schema::{SchemaSnapshot, ViewDef};
use crate::value::{Row, Value};

/// A live database connection.
#[async_trait]
pub trait Connection: Send {
    /// The SQL dialect of this connection.
    fn platform(&self) -> Arc<dyn Platform>;

    /// The schema reader for this connection.
    fn introspector(&self) -> Arc<dyn Introspector>;

    /// Executes a statement and returns the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Executes one or more statements without parameters.
    async fn execute_batch(&mut self, sql: &str) -> Result<()>;

    /// Runs a query and returns all rows.
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Starts a transaction.
    async fn begin(&mut self) -> Result<()>;

    /// Commits the current transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Rolls back the current transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Returns the last generated ID, optionally of a named sequence.
    async fn last_insert_id(&mut self, sequence: Option<&str>) -> Result<i64>;

    /// Closes the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Reads the structure of a live database.
#[async_trait]
pub trait Introspector: Send + Sync + fmt::Debug {
    /// Returns sequences, tables and views of the database.
    async fn snapshot(&self, conn: &mut dyn Connection) -> Result<SchemaSnapshot>;

    /// Returns the views of the database.
    async fn list_views(&self, conn: &mut dyn Connection) -> Result<Vec<ViewDef>>;
}

/// Opens connections from a database configuration.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + fmt::Debug {
    /// Opens a new connection.
    async fn connect(&self, config: &DatabaseConfig) -> Result<Box<dyn Connection>>;
}

/// Connection settings of one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Driver name, e.g. `sqlite`.
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Connection URL.
    pub url: String,
}

fn default_driver() -> String {
    "sqlite".to_string()
}

impl DatabaseConfig {
    /// Creates a configuration for the given driver and URL.
    pub fn new(driver: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            url: url.into(),
        }
    }

    /// Creates a SQLite configuration.
    pub fn sqlite(url: impl Into<String>) -> Self {
        Self::new("sqlite", url)
    }
}

/// Named database configurations, in declaration order.
///
/// The JSON form is an object mapping names to settings:
///
/// ```json
/// { "db": { "driver": "sqlite", "url": "sqlite://app.db?mode=rwc" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    /// Databases by name.
    pub databases: IndexMap<String, DatabaseConfig>,
}

impl Config {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a database.
    #[must_use]
    pub fn database(mut self, name: impl Into<String>, config: DatabaseConfig) -> Self {
        self.databases.insert(name.into(), config);
        self
    }

    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConvergeError::io(path, e))?;
        Self::from_json(&json)
    }

    /// Fails if no database is configured.
    pub fn validate(&self) -> Result<()> {
        if self.databases.is_empty() {
            return Err(ConvergeError::config("No database configuration passed"));
        }
        Ok(())
    }

    /// Returns the database with the given name, or the first one if the
    /// name is unknown.
    pub fn get(&self, name: &str) -> Result<(&str, &DatabaseConfig)> {
        self.databases
            .get_key_value(name)
            .or_else(|| self.databases.first())
            .map(|(n, c)| (n.as_str(), c))
            .ok_or_else(|| ConvergeError::config("No database configuration passed"))
    }
}
