//! Table creation from a target plan.
//!
//! All identifiers are double-quoted, so column names derived from document
//! fields cannot break out of their position in the statement.

use super::PgTarget;
use super::type_mapping::pg_type_for;
use crate::Result;
use crate::plan::TargetPlan;

/// Quotes a PostgreSQL identifier, escaping embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quotes a schema-qualified table name.
pub fn quote_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Renders the CREATE TABLE statement for a plan.
///
/// Uses IF NOT EXISTS so re-running a migration against an already-created
/// table is a no-op at the DDL level.
pub fn create_table_sql(plan: &TargetPlan) -> String {
    let mut column_defs: Vec<String> = plan
        .columns
        .iter()
        .map(|col| {
            let mut def = format!(
                "{} {}",
                quote_ident(&col.column_name),
                pg_type_for(&col.data_type)
            );
            if !col.nullable {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect();

    let pk_columns = plan.pk_columns();
    if !pk_columns.is_empty() {
        let quoted: Vec<String> = pk_columns.iter().map(|c| quote_ident(c)).collect();
        column_defs.push(format!("PRIMARY KEY ({})", quoted.join(", ")));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_table(&plan.schema, &plan.table),
        column_defs.join(",\n    ")
    )
}

impl PgTarget {
    /// Creates the target schema if it does not exist.
    pub async fn ensure_schema(&self, schema: &str) -> Result<()> {
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema));
        sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
            crate::error::DocLiftError::query_failed(
                format!("Failed to create schema '{}'", schema),
                e,
            )
        })?;
        Ok(())
    }

    /// Creates the planned table if it does not exist.
    pub async fn ensure_table(&self, plan: &TargetPlan) -> Result<()> {
        self.ensure_schema(&plan.schema).await?;

        let sql = create_table_sql(plan);
        tracing::debug!("Ensuring target table {}", plan.qualified_name());

        sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
            crate::error::DocLiftError::query_failed(
                format!("Failed to create table '{}'", plan.qualified_name()),
                e,
            )
        })?;

        Ok(())
    }

    /// Drops the planned table if it exists. Used by `--recreate`.
    pub async fn drop_table(&self, plan: &TargetPlan) -> Result<()> {
        let sql = format!(
            "DROP TABLE IF EXISTS {}",
            quote_table(&plan.schema, &plan.table)
        );
        tracing::warn!("Dropping target table {}", plan.qualified_name());

        sqlx::query(&sql).execute(&self.pool).await.map_err(|e| {
            crate::error::DocLiftError::query_failed(
                format!("Failed to drop table '{}'", plan.qualified_name()),
                e,
            )
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UnifiedDataType;
    use crate::plan::PlannedColumn;

    fn sample_plan() -> TargetPlan {
        TargetPlan {
            schema: "public".to_string(),
            table: "users".to_string(),
            columns: vec![
                PlannedColumn {
                    field_path: "_id".to_string(),
                    column_name: "_id".to_string(),
                    data_type: UnifiedDataType::String {
                        max_length: Some(24),
                    },
                    nullable: false,
                    primary_key: true,
                },
                PlannedColumn {
                    field_path: "name".to_string(),
                    column_name: "name".to_string(),
                    data_type: UnifiedDataType::String { max_length: None },
                    nullable: false,
                    primary_key: false,
                },
                PlannedColumn {
                    field_path: "age".to_string(),
                    column_name: "age".to_string(),
                    data_type: UnifiedDataType::Integer {
                        bits: 32,
                        signed: true,
                    },
                    nullable: true,
                    primary_key: false,
                },
            ],
        }
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
    }

    #[test]
    fn test_quote_table() {
        assert_eq!(quote_table("public", "users"), "\"public\".\"users\"");
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql(&sample_plan());

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"public\".\"users\""));
        assert!(sql.contains("\"_id\" varchar(24) NOT NULL"));
        assert!(sql.contains("\"name\" text NOT NULL"));
        assert!(sql.contains("\"age\" integer"));
        assert!(!sql.contains("\"age\" integer NOT NULL"));
        assert!(sql.contains("PRIMARY KEY (\"_id\")"));
    }

    #[test]
    fn test_create_table_sql_quotes_hostile_names() {
        let mut plan = sample_plan();
        plan.table = "users\"; DROP TABLE x; --".to_string();

        let sql = create_table_sql(&plan);
        // The hostile name stays inside a quoted identifier
        assert!(sql.contains("\"users\"\"; DROP TABLE x; --\""));
    }
}
