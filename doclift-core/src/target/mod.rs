//! PostgreSQL target sink.
//!
//! # Module Structure
//! - `connection`: pooled connection management and validation
//! - `type_mapping`: `UnifiedDataType` to PostgreSQL DDL types and back
//! - `inspect`: introspection of existing target tables
//! - `ddl`: table creation from a target plan
//! - `writer`: batched, transactional INSERT with conflict handling

mod connection;
pub mod ddl;
pub mod inspect;
pub mod type_mapping;
pub mod writer;

use crate::config::ConnectionConfig;
use sqlx::PgPool;

pub use ddl::{create_table_sql, quote_ident, quote_table};
pub use inspect::ExistingTable;
pub use type_mapping::{map_pg_type_to_unified, pg_type_for};
pub use writer::SqlValue;

/// PostgreSQL target with a pooled connection.
///
/// # Example
/// ```rust,ignore
/// use doclift_core::target::PgTarget;
///
/// let target = PgTarget::new("postgres://localhost/warehouse").await?;
/// target.test_connection().await?;
/// ```
#[derive(Debug)]
pub struct PgTarget {
    /// Connection pool
    pub pool: PgPool,
    /// Connection configuration
    pub config: ConnectionConfig,
}
