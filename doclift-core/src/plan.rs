//! Target planning: bridges inferred document fields to relational columns.
//!
//! The plan decides, for every inferred field, which column it lands in and
//! with what type. Nested documents become a single `jsonb` column; their
//! dotted sub-fields are folded into it rather than flattened into columns of
//! their own.

use crate::Result;
use crate::models::UnifiedDataType;
use crate::source::InferredSchema;
use crate::target::ExistingTable;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// PostgreSQL identifier length limit.
const MAX_IDENT_LEN: usize = 63;

/// One planned target column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedColumn {
    /// Source field path (dot notation for nested fields)
    pub field_path: String,
    /// Target column name
    pub column_name: String,
    /// Unified type the column carries
    pub data_type: UnifiedDataType,
    /// Whether the column accepts NULL
    pub nullable: bool,
    /// Whether the column is part of the primary key
    pub primary_key: bool,
}

/// The complete mapping from a collection to a target table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetPlan {
    /// Target schema name
    pub schema: String,
    /// Target table name
    pub table: String,
    /// Planned columns, in discovery order
    pub columns: Vec<PlannedColumn>,
}

impl TargetPlan {
    /// Builds a plan from an inferred collection schema.
    ///
    /// Fields nested under a document-typed parent are folded into the
    /// parent's `jsonb` column instead of becoming columns themselves.
    ///
    /// # Errors
    /// Returns error if the schema has no fields or no `_id` field
    pub fn from_inferred(schema: &str, table: &str, inferred: &InferredSchema) -> Result<Self> {
        if inferred.fields.is_empty() {
            return Err(crate::error::DocLiftError::schema_failed(
                format!("Collection '{}' yielded no fields", inferred.collection_name),
                std::io::Error::new(std::io::ErrorKind::InvalidData, "empty sample"),
            ));
        }

        let json_parents: Vec<String> = inferred
            .fields
            .iter()
            .filter(|f| matches!(f.unified_type, UnifiedDataType::Json))
            .map(|f| format!("{}.", f.name))
            .collect();

        let mut used_names: HashSet<String> = HashSet::new();
        let mut columns = Vec::new();

        for field in &inferred.fields {
            // Skip sub-fields already covered by a jsonb parent column
            if json_parents.iter().any(|p| field.name.starts_with(p)) {
                continue;
            }

            let is_id = field.name == "_id";
            let column_name = unique_column_name(&field.name, &mut used_names);

            columns.push(PlannedColumn {
                field_path: field.name.clone(),
                column_name,
                data_type: field.unified_type.clone(),
                nullable: field.is_nullable && !is_id,
                primary_key: is_id,
            });
        }

        if !columns.iter().any(|c| c.primary_key) {
            return Err(crate::error::DocLiftError::migration(
                inferred.collection_name.clone(),
                "No _id field found in sampled documents",
            ));
        }

        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
            columns,
        })
    }

    /// Builds a plan against an existing table, adopting its column types.
    ///
    /// The table's types and nullability win over the inferred ones, so
    /// coercion targets what the table actually stores. Inferred fields with
    /// no matching column are skipped with a warning.
    ///
    /// # Errors
    /// Returns error if none of the table's primary key columns are mapped
    pub fn from_existing(
        inferred: &InferredSchema,
        existing: &ExistingTable,
    ) -> Result<Self> {
        let json_parents: Vec<String> = inferred
            .fields
            .iter()
            .filter(|f| matches!(f.unified_type, UnifiedDataType::Json))
            .map(|f| format!("{}.", f.name))
            .collect();

        let mut used_names: HashSet<String> = HashSet::new();
        let mut columns = Vec::new();

        for field in &inferred.fields {
            if json_parents.iter().any(|p| field.name.starts_with(p)) {
                continue;
            }

            let column_name = unique_column_name(&field.name, &mut used_names);
            match existing.column(&column_name) {
                Some(col) => columns.push(PlannedColumn {
                    field_path: field.name.clone(),
                    column_name: column_name.clone(),
                    data_type: col.data_type.clone(),
                    nullable: col.is_nullable,
                    primary_key: existing.primary_key.iter().any(|p| p == &column_name),
                }),
                None => tracing::warn!(
                    "Field '{}' has no column in '{}.{}'; it will be skipped",
                    field.name,
                    existing.schema,
                    existing.name
                ),
            }
        }

        if !columns.iter().any(|c| c.primary_key) {
            return Err(crate::error::DocLiftError::migration(
                inferred.collection_name.clone(),
                format!(
                    "No field maps onto the primary key of '{}.{}'",
                    existing.schema, existing.name
                ),
            ));
        }

        Ok(Self {
            schema: existing.schema.clone(),
            table: existing.name.clone(),
            columns,
        })
    }

    /// Names of the primary key columns.
    pub fn pk_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.column_name.as_str())
            .collect()
    }

    /// Qualified `schema.table` name for display.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// Sanitizes a field path into a valid PostgreSQL column name.
///
/// Dots become underscores, invalid characters are dropped, and a leading
/// digit gets an underscore prefix. The result is truncated to the
/// PostgreSQL identifier limit.
pub fn sanitize_column_name(field_path: &str) -> String {
    let mut name: String = field_path
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() {
        name = "_unnamed".to_string();
    }

    let starts_with_digit = name.chars().next().is_some_and(|c| c.is_ascii_digit());
    if starts_with_digit {
        name.insert(0, '_');
    }

    name.truncate(MAX_IDENT_LEN);
    name
}

/// Sanitizes a field path and deduplicates against names already taken.
fn unique_column_name(field_path: &str, used: &mut HashSet<String>) -> String {
    let base = sanitize_column_name(field_path);

    if used.insert(base.clone()) {
        return base;
    }

    let mut n = 2u32;
    loop {
        let suffix = format!("_{}", n);
        let mut candidate = base.clone();
        candidate.truncate(MAX_IDENT_LEN.saturating_sub(suffix.len()));
        candidate.push_str(&suffix);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n = n.saturating_add(1);
    }
}
