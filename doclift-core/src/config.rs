//! Connection and migration configuration.
//!
//! # Security
//! Configuration structs intentionally do NOT store passwords. Credentials
//! live only inside the connection URL, which is redacted before it ever
//! reaches a log line or error message.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{CoercionPolicy, ConflictMode};

/// Configuration for database connections.
///
/// # Security
/// This struct intentionally does NOT store passwords or credentials.
/// Credentials must be handled separately and never logged or serialized.
///
/// # Example
/// ```rust
/// use doclift_core::ConnectionConfig;
///
/// let config = ConnectionConfig::new("localhost".to_string())
///     .with_port(27017)
///     .with_database("appdata".to_string())
///     .with_username("reader".to_string());
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host address
    pub host: String,
    /// Optional port number
    pub port: Option<u16>,
    /// Optional database name
    pub database: Option<String>,
    /// Optional username (password handled separately)
    pub username: Option<String>,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Query timeout duration
    pub query_timeout: Duration,
    /// Maximum number of connections in pool
    pub max_connections: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            database: None,
            username: None,
            connect_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(30),
            max_connections: 10,
        }
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ConnectionConfig({}{}{})",
            self.host,
            self.port.map_or_else(String::new, |p| format!(":{}", p)),
            self.database
                .as_ref()
                .map_or_else(String::new, |db| format!("/{}", db))
        )
        // Intentionally omit username and never include credentials
    }
}

impl ConnectionConfig {
    /// Creates a new connection config with safe defaults.
    pub fn new(host: String) -> Self {
        Self {
            host,
            ..Default::default()
        }
    }

    /// Builder method to set port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Builder method to set database.
    pub fn with_database(mut self, database: String) -> Self {
        self.database = Some(database);
        self
    }

    /// Builder method to set username.
    pub fn with_username(mut self, username: String) -> Self {
        self.username = Some(username);
        self
    }

    /// Validates connection configuration parameters.
    ///
    /// # Errors
    /// Returns error if configuration values are invalid or unsafe
    pub fn validate(&self) -> crate::Result<()> {
        if self.host.is_empty() {
            return Err(crate::error::DocLiftError::configuration(
                "host cannot be empty",
            ));
        }

        if let Some(port) = self.port {
            if port == 0 {
                return Err(crate::error::DocLiftError::configuration(
                    "port must be greater than 0",
                ));
            }
        }

        if self.max_connections == 0 {
            return Err(crate::error::DocLiftError::configuration(
                "max_connections must be greater than 0",
            ));
        }

        if self.max_connections > 100 {
            return Err(crate::error::DocLiftError::configuration(
                "max_connections should not exceed 100 for safety",
            ));
        }

        if self.connect_timeout.as_secs() == 0 {
            return Err(crate::error::DocLiftError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if self.query_timeout.as_secs() == 0 {
            return Err(crate::error::DocLiftError::configuration(
                "query_timeout must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Tunable parameters for a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateConfig {
    /// Documents per read/write batch
    pub batch_size: usize,
    /// Documents sampled during schema inference
    pub sample_size: usize,
    /// Retries per failed batch before giving up
    pub max_retries: u32,
    /// How primary-key conflicts in the target are resolved
    pub conflict_mode: ConflictMode,
    /// How coercion failures are handled
    pub coercion_policy: CoercionPolicy,
    /// Infer and plan only; no writes, no checkpoint
    pub dry_run: bool,
    /// Drop and recreate the target table before transferring
    pub recreate: bool,
    /// Path of the checkpoint file, if resumable runs are wanted
    pub checkpoint_path: Option<std::path::PathBuf>,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            sample_size: 100,
            max_retries: 3,
            conflict_mode: ConflictMode::Skip,
            coercion_policy: CoercionPolicy::Strict,
            dry_run: false,
            recreate: false,
            checkpoint_path: None,
        }
    }
}

impl MigrateConfig {
    /// Validates migration parameters.
    ///
    /// # Errors
    /// Returns error if any parameter is out of range
    pub fn validate(&self) -> crate::Result<()> {
        if self.batch_size == 0 {
            return Err(crate::error::DocLiftError::configuration(
                "batch_size must be greater than 0",
            ));
        }

        if self.batch_size > 100_000 {
            return Err(crate::error::DocLiftError::configuration(
                "batch_size should not exceed 100000",
            ));
        }

        if self.sample_size == 0 {
            return Err(crate::error::DocLiftError::configuration(
                "sample_size must be greater than 0",
            ));
        }

        Ok(())
    }
}
