//! MongoDB source connector.
//!
//! # Module Structure
//! - `connection`: client management and connection string validation
//! - `type_mapping`: BSON to `UnifiedDataType` conversion
//! - `inference`: schema inference from document samples
//! - `reader`: keyset-paginated batch reader for the transfer phase
//!
//! # Schema Inference
//! MongoDB is schemaless, so the source infers a schema by:
//! 1. Sampling a configurable number of documents from the collection
//! 2. Analyzing document structure to discover field names and types
//! 3. Tracking field frequency to determine nullability
//!
//! # Security Guarantees
//! - All source operations are read-only
//! - Connection strings are sanitized in error messages

mod connection;
pub mod inference;
pub mod reader;
pub mod type_mapping;

use crate::config::ConnectionConfig;
use mongodb::Client;

pub use inference::{InferredField, InferredSchema, SchemaInferrer};
pub use reader::DocumentBatches;
pub use type_mapping::{bson_type_name, map_bson_to_unified};

/// MongoDB source with schema inference and batched reading.
///
/// # Example
/// ```rust,ignore
/// use doclift_core::source::MongoSource;
///
/// let source = MongoSource::new("mongodb://localhost:27017/appdata").await?;
/// let schema = source.infer_schema("users", 100).await?;
/// ```
pub struct MongoSource {
    /// MongoDB client
    pub client: Client,
    /// Connection configuration
    pub config: ConnectionConfig,
    /// Original connection URL (kept private to prevent credential exposure)
    connection_url: String,
}

impl std::fmt::Debug for MongoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoSource")
            .field("config", &self.config)
            // connection_url is intentionally omitted to prevent credential exposure
            .finish_non_exhaustive()
    }
}
