//! Core data models shared between the source and target sides.
//!
//! The unified type model lets the inference engine describe document fields
//! without committing to either BSON or SQL vocabulary; both drivers map into
//! and out of it.

use serde::{Deserialize, Serialize};

/// Unified data type representation across the document and relational sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnifiedDataType {
    /// String/text types with optional length
    String { max_length: Option<u32> },
    /// Integer types with bit width
    Integer { bits: u8, signed: bool },
    /// Floating point types
    Float { precision: Option<u8> },
    /// Boolean type
    Boolean,
    /// Date and time types
    DateTime { with_timezone: bool },
    /// Date only
    Date,
    /// Time only
    Time { with_timezone: bool },
    /// Binary data
    Binary { max_length: Option<u32> },
    /// JSON/JSONB data (embedded documents, arrays)
    Json,
    /// UUID type
    Uuid,
    /// Array types
    Array { element_type: Box<UnifiedDataType> },
    /// Custom/engine-specific types
    Custom { type_name: String },
}

/// Column information, either inferred from documents or introspected from
/// the target table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: UnifiedDataType,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub default_value: Option<String>,
    pub comment: Option<String>,
    pub ordinal_position: u32,
}

/// How the writer resolves a primary-key collision in the target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictMode {
    /// Plain INSERT; a duplicate key fails the batch.
    Fail,
    /// `ON CONFLICT DO NOTHING`; duplicates are counted as skipped.
    Skip,
    /// `ON CONFLICT DO UPDATE`; duplicates are overwritten.
    Replace,
}

/// How coercion failures are handled during transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionPolicy {
    /// A value that cannot be coerced fails the migration.
    Strict,
    /// A value that cannot be coerced becomes NULL and is counted.
    Lenient,
}

/// Basic statistics for a source collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub name: String,
    pub document_count: u64,
    pub size_bytes: Option<u64>,
}

/// Summary of a completed (or dry-run) migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Source collection name.
    pub collection: String,
    /// Target table name.
    pub table: String,
    /// Documents read from the source.
    pub rows_read: u64,
    /// Rows committed to the target.
    pub rows_written: u64,
    /// Rows skipped by conflict handling.
    pub rows_skipped: u64,
    /// Values nulled by lenient coercion.
    pub values_nulled: u64,
    /// Number of batches processed.
    pub batches: u64,
    /// Wall-clock duration of the transfer.
    pub duration_ms: u64,
    /// Whether this run resumed from a checkpoint.
    pub resumed: bool,
    /// Whether this was a dry run (no writes performed).
    pub dry_run: bool,
}

impl MigrationReport {
    /// Creates an empty report for a collection/table pair.
    pub fn new(collection: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            table: table.into(),
            rows_read: 0,
            rows_written: 0,
            rows_skipped: 0,
            values_nulled: 0,
            batches: 0,
            duration_ms: 0,
            resumed: false,
            dry_run: false,
        }
    }
}

impl std::fmt::Display for ConflictMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictMode::Fail => write!(f, "fail"),
            ConflictMode::Skip => write!(f, "skip"),
            ConflictMode::Replace => write!(f, "replace"),
        }
    }
}

impl std::str::FromStr for ConflictMode {
    type Err = crate::DocLiftError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(ConflictMode::Fail),
            "skip" => Ok(ConflictMode::Skip),
            "replace" => Ok(ConflictMode::Replace),
            other => Err(crate::DocLiftError::configuration(format!(
                "Unknown conflict mode '{}' (expected fail, skip, or replace)",
                other
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_conflict_mode_roundtrip() {
        for mode in [ConflictMode::Fail, ConflictMode::Skip, ConflictMode::Replace] {
            let parsed = ConflictMode::from_str(&mode.to_string()).unwrap();
            assert_eq!(parsed, mode);
        }
    }

    #[test]
    fn test_conflict_mode_invalid() {
        assert!(ConflictMode::from_str("merge").is_err());
    }

    #[test]
    fn test_migration_report_new() {
        let report = MigrationReport::new("users", "public.users");
        assert_eq!(report.collection, "users");
        assert_eq!(report.table, "public.users");
        assert_eq!(report.rows_read, 0);
        assert!(!report.resumed);
        assert!(!report.dry_run);
    }

    #[test]
    fn test_unified_type_serde() {
        let ty = UnifiedDataType::Integer {
            bits: 64,
            signed: true,
        };
        let json = serde_json::to_string(&ty).unwrap();
        let back: UnifiedDataType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ty);
    }
}
