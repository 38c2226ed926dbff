//! MongoDB connection management.
//!
//! Handles client creation, connection validation, and connection string
//! parsing.
//!
//! # Security Features
//! - Connection string credentials are never logged
//! - Connection validation without side effects
//! - Timeout configuration for all operations

use super::MongoSource;
use crate::Result;
use crate::config::ConnectionConfig;
use crate::models::CollectionStats;
use mongodb::Client;
use mongodb::bson::{Document, doc};
use mongodb::options::ClientOptions;
use std::time::Duration;
use url::Url;

impl MongoSource {
    /// Creates a new MongoDB source from a connection string.
    ///
    /// # Arguments
    /// * `connection_string` - MongoDB connection URL (credentials sanitized in errors)
    ///
    /// # Errors
    /// Returns error if:
    /// - Connection string format is invalid
    /// - Client creation fails
    /// - Configuration is invalid
    pub async fn new(connection_string: &str) -> Result<Self> {
        let config = Self::parse_connection_config(connection_string)?;

        let client_options = Self::create_client_options(connection_string, &config).await?;

        let client = Client::with_options(client_options).map_err(|e| {
            crate::error::DocLiftError::connection_failed(
                format!(
                    "Failed to create MongoDB client for {}",
                    crate::error::redact_database_url(connection_string)
                ),
                e,
            )
        })?;

        Ok(Self {
            client,
            config,
            connection_url: connection_string.to_string(),
        })
    }

    /// Creates a new MongoDB source with custom configuration.
    pub async fn with_config(connection_string: &str, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        Self::validate_connection_string(connection_string)?;

        let client_options = Self::create_client_options(connection_string, &config).await?;

        let client = Client::with_options(client_options).map_err(|e| {
            crate::error::DocLiftError::connection_failed(
                format!(
                    "Failed to create MongoDB client for {}",
                    crate::error::redact_database_url(connection_string)
                ),
                e,
            )
        })?;

        Ok(Self {
            client,
            config,
            connection_url: connection_string.to_string(),
        })
    }

    /// Parses a MongoDB connection string to extract configuration.
    ///
    /// # Errors
    /// Returns error if connection string is malformed
    pub fn parse_connection_config(connection_string: &str) -> Result<ConnectionConfig> {
        Self::validate_connection_string(connection_string)?;

        let url = Url::parse(connection_string).map_err(|e| {
            crate::error::DocLiftError::configuration(format!(
                "Invalid MongoDB connection string format: {}",
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
            config = config.with_port(27017); // MongoDB default port
        }

        // Extract database name from path
        let path = url.path().trim_start_matches('/');
        if !path.is_empty() {
            config = config.with_database(path.to_string());
        }

        let username = url.username();
        if !username.is_empty() {
            config = config.with_username(username.to_string());
        }

        // Honor timeout and pool hints carried in the URL itself
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "connectTimeoutMS" => {
                    if let Ok(timeout_ms) = value.parse::<u64>() {
                        if timeout_ms > 0 && timeout_ms <= 300_000 {
                            config.connect_timeout = Duration::from_millis(timeout_ms);
                        }
                    }
                }
                "serverSelectionTimeoutMS" => {
                    if let Ok(timeout_ms) = value.parse::<u64>() {
                        if timeout_ms > 0 && timeout_ms <= 300_000 {
                            config.query_timeout = Duration::from_millis(timeout_ms);
                        }
                    }
                }
                "maxPoolSize" => {
                    if let Ok(max_pool) = value.parse::<u32>() {
                        if max_pool > 0 && max_pool <= 100 {
                            config.max_connections = max_pool;
                        }
                    }
                }
                _ => {} // Ignore other parameters
            }
        }

        config.validate()?;

        Ok(config)
    }

    /// Validates a MongoDB connection string.
    ///
    /// # Errors
    /// Returns error if connection string is invalid or unsafe
    pub fn validate_connection_string(connection_string: &str) -> Result<()> {
        let url = Url::parse(connection_string).map_err(|e| {
            crate::error::DocLiftError::configuration(format!(
                "Invalid MongoDB connection string format: {}",
                e
            ))
        })?;

        if !matches!(url.scheme(), "mongodb" | "mongodb+srv") {
            return Err(crate::error::DocLiftError::configuration(
                "Connection string must use mongodb:// or mongodb+srv:// scheme",
            ));
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(crate::error::DocLiftError::configuration(
                "Connection string must specify a host",
            ));
        }

        Ok(())
    }

    /// The connection URL with credentials masked, safe for display.
    pub fn redacted_url(&self) -> String {
        crate::error::redact_database_url(&self.connection_url)
    }

    /// Creates MongoDB client options with timeouts and pool limits applied.
    async fn create_client_options(
        connection_string: &str,
        config: &ConnectionConfig,
    ) -> Result<ClientOptions> {
        let mut options = ClientOptions::parse(connection_string).await.map_err(|e| {
            crate::error::DocLiftError::configuration(format!(
                "Failed to parse MongoDB connection options: {}",
                e
            ))
        })?;

        options.connect_timeout = Some(config.connect_timeout);
        options.server_selection_timeout = Some(config.query_timeout);
        options.max_pool_size = Some(config.max_connections);

        // Application name for connection tracking on the server side
        options.app_name = Some(format!("doclift-{}", env!("CARGO_PKG_VERSION")));

        Ok(options)
    }

    /// Tests the MongoDB connection.
    pub async fn test_connection(&self) -> Result<()> {
        let _ = self
            .client
            .list_database_names()
            .await
            .map_err(|e| crate::error::DocLiftError::connection_failed("MongoDB ping failed", e))?;

        Ok(())
    }

    /// Returns the database name from the connection URL.
    ///
    /// # Errors
    /// Returns error if the connection string did not specify a database
    pub fn database_name(&self) -> Result<&str> {
        self.config.database.as_deref().ok_or_else(|| {
            crate::error::DocLiftError::configuration(
                "No database specified in MongoDB connection string. \
                 Use mongodb://host:port/database_name format.",
            )
        })
    }

    /// Returns a typed handle for a collection in the configured database.
    pub fn collection(&self, name: &str) -> Result<mongodb::Collection<Document>> {
        let database = self.database_name()?;
        Ok(self.client.database(database).collection::<Document>(name))
    }

    /// Lists collection names in the configured database.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let database = self.database_name()?;
        let mut names = self
            .client
            .database(database)
            .list_collection_names()
            .await
            .map_err(|e| {
                crate::error::DocLiftError::schema_failed(
                    format!("Failed to list collections in '{}'", database),
                    e,
                )
            })?;
        names.sort();
        Ok(names)
    }

    /// Counts documents exactly. Slower than the estimate in
    /// [`collection_stats`](Self::collection_stats), but suitable for
    /// post-migration validation.
    pub async fn count_documents(&self, collection_name: &str) -> Result<u64> {
        let collection = self.collection(collection_name)?;
        collection.count_documents(doc! {}).await.map_err(|e| {
            crate::error::DocLiftError::query_failed(
                format!("Failed to count documents in '{}'", collection_name),
                e,
            )
        })
    }

    /// Collects basic statistics for a collection.
    pub async fn collection_stats(&self, collection_name: &str) -> Result<CollectionStats> {
        let database = self.database_name()?;
        let db = self.client.database(database);

        let count = db
            .collection::<Document>(collection_name)
            .estimated_document_count()
            .await
            .map_err(|e| {
                crate::error::DocLiftError::schema_failed(
                    format!(
                        "Failed to count documents in '{}.{}'",
                        database, collection_name
                    ),
                    e,
                )
            })?;

        let stats = db
            .run_command(doc! { "collStats": collection_name })
            .await
            .ok();

        let size_bytes = stats
            .as_ref()
            .and_then(|s| s.get_i64("size").ok())
            .and_then(|s| u64::try_from(s).ok());

        Ok(CollectionStats {
            name: collection_name.to_string(),
            document_count: count,
            size_bytes,
        })
    }
}
