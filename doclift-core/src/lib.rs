//! Core library for doclift.
//!
//! This crate provides everything the `doclift` binary builds on: the unified
//! type model, schema inference for schemaless collections, type mapping in
//! both directions, compatibility checking, and the batched, checkpointed
//! transfer engine that moves documents into a relational table.
//!
//! # Architecture
//! - `source`: MongoDB connector (connection, inference, batched reader)
//! - `target`: PostgreSQL sink (pool, introspection, DDL, batched writer)
//! - `plan`: bridges inferred document fields to relational columns
//! - `migrate`: the orchestrating engine with retry and resume
//! - `checkpoint`: crash-safe resume state
//!
//! # Security
//! Connection strings are never logged or embedded in errors; see
//! [`error::redact_database_url`].

pub mod checkpoint;
pub mod compat;
pub mod config;
pub mod error;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod plan;
pub mod source;
pub mod target;

// Re-export commonly used types
pub use checkpoint::{MigrationState, RunStatus};
pub use compat::{CompatIssue, CompatReport, IssueKind};
pub use config::{ConnectionConfig, MigrateConfig};
pub use error::{DocLiftError, Result, redact_database_url};
pub use logging::init_logging;
pub use migrate::{MigrationJob, Migrator, ValidationReport};
pub use models::{
    CoercionPolicy, CollectionStats, Column, ConflictMode, MigrationReport, UnifiedDataType,
};
pub use plan::{PlannedColumn, TargetPlan};
pub use source::MongoSource;
pub use target::PgTarget;
