//! PostgreSQL connection pool management and validation.
//!
//! # Security Features
//! - Validates connection string format and parameters
//! - Enforces connection limits to prevent resource exhaustion
//! - Sets appropriate timeouts for all operations

use super::PgTarget;
use crate::Result;
use crate::config::ConnectionConfig;
use sqlx::PgPool;
use std::time::Duration;
use url::Url;

impl PgTarget {
    /// Creates a new PostgreSQL target with connection pooling.
    ///
    /// # Arguments
    /// * `connection_string` - PostgreSQL connection URL (credentials sanitized in errors)
    ///
    /// # Errors
    /// Returns error if:
    /// - Connection string format is invalid
    /// - Pool configuration is invalid
    pub async fn new(connection_string: &str) -> Result<Self> {
        let config = Self::parse_connection_config(connection_string)?;
        let pool = Self::create_connection_pool(connection_string, &config).await?;

        Ok(Self { pool, config })
    }

    /// Creates a new PostgreSQL target with custom configuration.
    pub async fn with_config(connection_string: &str, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        Self::validate_connection_string(connection_string)?;

        let pool = Self::create_connection_pool(connection_string, &config).await?;

        Ok(Self { pool, config })
    }

    /// Parses connection string to extract configuration parameters.
    ///
    /// # Errors
    /// Returns error if connection string is malformed
    pub fn parse_connection_config(connection_string: &str) -> Result<ConnectionConfig> {
        Self::validate_connection_string(connection_string)?;

        let url = Url::parse(connection_string).map_err(|e| {
            crate::error::DocLiftError::configuration(format!(
                "Invalid PostgreSQL connection string format: {}",
                e
            ))
        })?;

        let mut config = ConnectionConfig::new(url.host_str().unwrap_or("localhost").to_string());

        if let Some(port) = url.port() {
            if port == 0 {
                return Err(crate::error::DocLiftError::configuration(
                    "Invalid port number: must be greater than 0",
                ));
            }
            config = config.with_port(port);
        } else {
            config = config.with_port(5432); // PostgreSQL default port
        }

        let database = url.path().trim_start_matches('/');
        if !database.is_empty() {
            config = config.with_database(database.to_string());
        }

        let username = url.username();
        if !username.is_empty() {
            config = config.with_username(username.to_string());
        }

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "connect_timeout" => {
                    if let Ok(timeout_secs) = value.parse::<u64>() {
                        if timeout_secs > 0 && timeout_secs <= 300 {
                            config.connect_timeout = Duration::from_secs(timeout_secs);
                        }
                    }
                }
                "statement_timeout" => {
                    if let Ok(timeout_ms) = value.parse::<u64>() {
                        if timeout_ms > 0 && timeout_ms <= 300_000 {
                            config.query_timeout = Duration::from_millis(timeout_ms);
                        }
                    }
                }
                "pool_max_conns" => {
                    if let Ok(max_conns) = value.parse::<u32>() {
                        if max_conns > 0 && max_conns <= 100 {
                            config.max_connections = max_conns;
                        }
                    }
                }
                _ => {} // Ignore other parameters
            }
        }

        config.validate()?;

        Ok(config)
    }

    /// Validates connection string format.
    ///
    /// # Errors
    /// Returns error if connection string is invalid
    pub fn validate_connection_string(connection_string: &str) -> Result<()> {
        let url = Url::parse(connection_string).map_err(|e| {
            crate::error::DocLiftError::configuration(format!(
                "Invalid PostgreSQL connection string format: {}",
                e
            ))
        })?;

        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(crate::error::DocLiftError::configuration(
                "Connection string must use postgres:// or postgresql:// scheme",
            ));
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(crate::error::DocLiftError::configuration(
                "Connection string must specify a host",
            ));
        }

        Ok(())
    }

    /// Creates a connection pool with timeouts and session settings applied
    /// to every pooled connection.
    async fn create_connection_pool(
        connection_string: &str,
        config: &ConnectionConfig,
    ) -> Result<PgPool> {
        use sqlx::Executor;

        let query_timeout_secs = config.query_timeout.as_secs();

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections.min(100))
            .acquire_timeout(config.connect_timeout)
            .test_before_acquire(true)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    conn.execute(
                        format!("SET statement_timeout = '{}s'", query_timeout_secs).as_str(),
                    )
                    .await?;

                    conn.execute("SET lock_timeout = '30s'").await?;

                    let app_name = format!("doclift-{}", env!("CARGO_PKG_VERSION"));
                    conn.execute(format!("SET application_name = '{}'", app_name).as_str())
                        .await?;

                    // UTC everywhere so timestamptz round-trips cleanly
                    conn.execute("SET timezone = 'UTC'").await?;

                    Ok(())
                })
            })
            .connect_lazy(connection_string)
            .map_err(|e| {
                crate::error::DocLiftError::connection_failed(
                    format!(
                        "Failed to create PostgreSQL connection pool to {}",
                        crate::error::redact_database_url(connection_string)
                    ),
                    e,
                )
            })?;

        Ok(pool)
    }

    /// Tests the PostgreSQL connection.
    pub async fn test_connection(&self) -> Result<()> {
        let result: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                crate::error::DocLiftError::connection_failed("PostgreSQL ping failed", e)
            })?;

        if result != 1 {
            return Err(crate::error::DocLiftError::configuration(
                "PostgreSQL ping returned unexpected result",
            ));
        }

        Ok(())
    }

    /// Closes the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
