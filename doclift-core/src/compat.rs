//! Compatibility checking between an inferred plan and an existing table.
//!
//! When the target table already exists it is not recreated; instead the plan
//! is checked against it. Widening is acceptable (int32 into bigint, bounded
//! string into text); anything lossy or structurally missing is reported as
//! an issue and blocks the migration.

use crate::models::UnifiedDataType;
use crate::plan::TargetPlan;
use crate::target::ExistingTable;
use serde::{Deserialize, Serialize};

/// What kind of incompatibility was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Plan column does not exist in the target table
    MissingColumn,
    /// Target column type cannot hold the planned type without loss
    TypeMismatch,
    /// Nullable source data against a NOT NULL target column
    NullabilityConflict,
    /// Target table lacks the primary key the conflict handling relies on
    MissingPrimaryKey,
    /// NOT NULL target column without default that the plan never fills
    RequiredColumnUnmapped,
}

impl IssueKind {
    /// Whether this issue blocks migrating into the table.
    ///
    /// A missing column does not: the field is simply skipped and the rest
    /// of the document still transfers.
    pub fn blocks_migration(self) -> bool {
        !matches!(self, IssueKind::MissingColumn)
    }
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IssueKind::MissingColumn => "missing column",
            IssueKind::TypeMismatch => "type mismatch",
            IssueKind::NullabilityConflict => "nullability conflict",
            IssueKind::MissingPrimaryKey => "missing primary key",
            IssueKind::RequiredColumnUnmapped => "required column unmapped",
        };
        f.write_str(s)
    }
}

/// One incompatibility between the plan and the existing table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatIssue {
    /// Column the issue concerns
    pub column: String,
    /// Issue category
    pub kind: IssueKind,
    /// Human-readable detail
    pub detail: String,
}

/// Result of a compatibility check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatReport {
    /// Qualified target table name
    pub table: String,
    /// All issues found; empty means compatible
    pub issues: Vec<CompatIssue>,
}

impl CompatReport {
    /// True when no blocking issues were found.
    pub fn is_compatible(&self) -> bool {
        self.issues.iter().all(|i| !i.kind.blocks_migration())
    }

    /// Renders all issues as one message, for error reporting.
    pub fn summary(&self) -> String {
        self.issues
            .iter()
            .map(|i| format!("{} '{}': {}", i.kind, i.column, i.detail))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Checks a plan against an existing table.
pub fn check_compatibility(plan: &TargetPlan, existing: &ExistingTable) -> CompatReport {
    let mut issues = Vec::new();

    for planned in &plan.columns {
        let Some(col) = existing.column(&planned.column_name) else {
            issues.push(CompatIssue {
                column: planned.column_name.clone(),
                kind: IssueKind::MissingColumn,
                detail: format!(
                    "Field would need a {} column; it will be skipped",
                    crate::target::pg_type_for(&planned.data_type)
                ),
            });
            continue;
        };

        if !types_compatible(&planned.data_type, &col.data_type) {
            issues.push(CompatIssue {
                column: planned.column_name.clone(),
                kind: IssueKind::TypeMismatch,
                detail: format!(
                    "Source needs {} but column is {}",
                    crate::target::pg_type_for(&planned.data_type),
                    crate::target::pg_type_for(&col.data_type)
                ),
            });
        }

        if planned.nullable && !col.is_nullable && !planned.primary_key {
            issues.push(CompatIssue {
                column: planned.column_name.clone(),
                kind: IssueKind::NullabilityConflict,
                detail: "Source field is sometimes absent but column is NOT NULL".to_string(),
            });
        }
    }

    // Conflict handling (ON CONFLICT) requires the key to exist in the table
    let pk = plan.pk_columns();
    if !pk.iter().all(|c| existing.primary_key.iter().any(|e| e == c)) {
        issues.push(CompatIssue {
            column: pk.join(", "),
            kind: IssueKind::MissingPrimaryKey,
            detail: format!(
                "Table primary key is ({}) which does not cover the plan key",
                existing.primary_key.join(", ")
            ),
        });
    }

    // NOT NULL columns the plan never writes must have defaults
    for col in &existing.columns {
        let planned = plan.columns.iter().any(|p| p.column_name == col.name);
        if !planned && !col.is_nullable && col.default_value.is_none() {
            issues.push(CompatIssue {
                column: col.name.clone(),
                kind: IssueKind::RequiredColumnUnmapped,
                detail: "NOT NULL column without default is never written by the migration"
                    .to_string(),
            });
        }
    }

    CompatReport {
        table: plan.qualified_name(),
        issues,
    }
}

/// Whether a source type fits a target column type without loss.
///
/// Widening is allowed; narrowing is not.
pub fn types_compatible(source: &UnifiedDataType, target: &UnifiedDataType) -> bool {
    use UnifiedDataType as T;

    match (source, target) {
        // Strings: unbounded target takes anything, bounded needs room
        (T::String { .. }, T::String { max_length: None }) => true,
        (
            T::String {
                max_length: Some(s),
            },
            T::String {
                max_length: Some(t),
            },
        ) => t >= s,
        (T::String { max_length: None }, T::String { max_length: Some(_) }) => false,

        // Integers widen
        (T::Integer { bits: s, .. }, T::Integer { bits: t, .. }) => t >= s,

        // Integers fit floats and arbitrary-precision numerics
        (T::Integer { .. }, T::Float { .. }) => true,

        // Floats: target precision must not be lower; None means numeric
        (T::Float { .. }, T::Float { precision: None }) => true,
        (
            T::Float {
                precision: Some(s),
            },
            T::Float {
                precision: Some(t),
            },
        ) => t >= s,
        (T::Float { precision: None }, T::Float { precision: Some(t) }) => *t >= 53,

        (T::Boolean, T::Boolean) => true,

        // Timezone presence does not lose data either way; values are UTC
        (T::DateTime { .. }, T::DateTime { .. }) => true,
        (T::Date, T::Date) => true,
        (T::Time { .. }, T::Time { .. }) => true,

        (T::Binary { .. }, T::Binary { .. }) => true,

        // Documents, arrays, and engine-specific values all live in jsonb
        (T::Json | T::Array { .. } | T::Custom { .. }, T::Json) => true,

        (T::Uuid, T::Uuid) => true,
        // ObjectId-sized strings fit uuid-width text but not vice versa
        (T::Uuid, T::String { max_length: None }) => true,

        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Column;
    use crate::plan::PlannedColumn;

    fn planned(name: &str, ty: UnifiedDataType, nullable: bool, pk: bool) -> PlannedColumn {
        PlannedColumn {
            field_path: name.to_string(),
            column_name: name.to_string(),
            data_type: ty,
            nullable,
            primary_key: pk,
        }
    }

    fn existing_col(name: &str, ty: UnifiedDataType, nullable: bool, pk: bool) -> Column {
        Column {
            name: name.to_string(),
            data_type: ty,
            is_nullable: nullable,
            is_primary_key: pk,
            default_value: None,
            comment: None,
            ordinal_position: 0,
        }
    }

    fn id_type() -> UnifiedDataType {
        UnifiedDataType::String {
            max_length: Some(24),
        }
    }

    #[test]
    fn test_compatible_table() {
        let plan = TargetPlan {
            schema: "public".to_string(),
            table: "users".to_string(),
            columns: vec![
                planned("_id", id_type(), false, true),
                planned(
                    "age",
                    UnifiedDataType::Integer {
                        bits: 32,
                        signed: true,
                    },
                    true,
                    false,
                ),
            ],
        };
        let existing = ExistingTable {
            schema: "public".to_string(),
            name: "users".to_string(),
            columns: vec![
                existing_col("_id", id_type(), false, true),
                // Existing column is wider; that is fine
                existing_col(
                    "age",
                    UnifiedDataType::Integer {
                        bits: 64,
                        signed: true,
                    },
                    true,
                    false,
                ),
            ],
            primary_key: vec!["_id".to_string()],
        };

        let report = check_compatibility(&plan, &existing);
        assert!(report.is_compatible(), "{}", report.summary());
    }

    #[test]
    fn test_missing_column_reported() {
        let plan = TargetPlan {
            schema: "public".to_string(),
            table: "users".to_string(),
            columns: vec![
                planned("_id", id_type(), false, true),
                planned("email", UnifiedDataType::String { max_length: None }, true, false),
            ],
        };
        let existing = ExistingTable {
            schema: "public".to_string(),
            name: "users".to_string(),
            columns: vec![existing_col("_id", id_type(), false, true)],
            primary_key: vec!["_id".to_string()],
        };

        let report = check_compatibility(&plan, &existing);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::MissingColumn && i.column == "email"));
        // Missing columns are skippable, not blocking
        assert!(report.is_compatible());
    }

    #[test]
    fn test_narrowing_type_rejected() {
        let plan = TargetPlan {
            schema: "public".to_string(),
            table: "t".to_string(),
            columns: vec![
                planned("_id", id_type(), false, true),
                planned(
                    "n",
                    UnifiedDataType::Integer {
                        bits: 64,
                        signed: true,
                    },
                    true,
                    false,
                ),
            ],
        };
        let existing = ExistingTable {
            schema: "public".to_string(),
            name: "t".to_string(),
            columns: vec![
                existing_col("_id", id_type(), false, true),
                existing_col(
                    "n",
                    UnifiedDataType::Integer {
                        bits: 32,
                        signed: true,
                    },
                    true,
                    false,
                ),
            ],
            primary_key: vec!["_id".to_string()],
        };

        let report = check_compatibility(&plan, &existing);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::TypeMismatch));
    }

    #[test]
    fn test_nullable_source_into_not_null_column() {
        let plan = TargetPlan {
            schema: "public".to_string(),
            table: "t".to_string(),
            columns: vec![
                planned("_id", id_type(), false, true),
                planned("name", UnifiedDataType::String { max_length: None }, true, false),
            ],
        };
        let existing = ExistingTable {
            schema: "public".to_string(),
            name: "t".to_string(),
            columns: vec![
                existing_col("_id", id_type(), false, true),
                existing_col("name", UnifiedDataType::String { max_length: None }, false, false),
            ],
            primary_key: vec!["_id".to_string()],
        };

        let report = check_compatibility(&plan, &existing);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::NullabilityConflict));
    }

    #[test]
    fn test_missing_primary_key_reported() {
        let plan = TargetPlan {
            schema: "public".to_string(),
            table: "t".to_string(),
            columns: vec![planned("_id", id_type(), false, true)],
        };
        let existing = ExistingTable {
            schema: "public".to_string(),
            name: "t".to_string(),
            columns: vec![existing_col("_id", id_type(), false, false)],
            primary_key: vec![],
        };

        let report = check_compatibility(&plan, &existing);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::MissingPrimaryKey));
    }

    #[test]
    fn test_required_unmapped_column() {
        let plan = TargetPlan {
            schema: "public".to_string(),
            table: "t".to_string(),
            columns: vec![planned("_id", id_type(), false, true)],
        };
        let existing = ExistingTable {
            schema: "public".to_string(),
            name: "t".to_string(),
            columns: vec![
                existing_col("_id", id_type(), false, true),
                existing_col("created_by", UnifiedDataType::String { max_length: None }, false, false),
            ],
            primary_key: vec!["_id".to_string()],
        };

        let report = check_compatibility(&plan, &existing);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::RequiredColumnUnmapped));
    }

    #[test]
    fn test_types_compatible_lattice() {
        use UnifiedDataType as T;

        assert!(types_compatible(
            &T::String {
                max_length: Some(24)
            },
            &T::String { max_length: None }
        ));
        assert!(!types_compatible(
            &T::String { max_length: None },
            &T::String {
                max_length: Some(24)
            }
        ));
        assert!(types_compatible(
            &T::Integer {
                bits: 32,
                signed: true
            },
            &T::Integer {
                bits: 64,
                signed: true
            }
        ));
        assert!(types_compatible(
            &T::Integer {
                bits: 64,
                signed: true
            },
            &T::Float {
                precision: Some(128)
            }
        ));
        assert!(types_compatible(&T::Json, &T::Json));
        assert!(types_compatible(
            &T::Array {
                element_type: Box::new(T::Boolean)
            },
            &T::Json
        ));
        assert!(!types_compatible(&T::Json, &T::Boolean));
        assert!(types_compatible(
            &T::DateTime {
                with_timezone: true
            },
            &T::DateTime {
                with_timezone: false
            }
        ));
    }
}
