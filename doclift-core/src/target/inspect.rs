//! Introspection of existing target tables.
//!
//! Reads `information_schema` so the compatibility checker can compare the
//! inferred source schema against what is already in the target database.

use super::PgTarget;
use super::type_mapping::map_pg_type_to_unified;
use crate::Result;
use crate::models::Column;
use sqlx::Row;

/// An existing table in the target database.
#[derive(Debug, Clone)]
pub struct ExistingTable {
    /// Schema the table lives in
    pub schema: String,
    /// Table name
    pub name: String,
    /// Columns in ordinal order
    pub columns: Vec<Column>,
    /// Primary key column names
    pub primary_key: Vec<String>,
}

impl ExistingTable {
    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl PgTarget {
    /// Checks whether a table exists.
    pub async fn table_exists(&self, schema: &str, table: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )",
        )
        .bind(schema)
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            crate::error::DocLiftError::query_failed(
                format!("Failed to check existence of '{}.{}'", schema, table),
                e,
            )
        })?;

        Ok(exists)
    }

    /// Introspects an existing table, or returns `None` if it does not exist.
    ///
    /// # Errors
    /// Returns error if the introspection queries fail
    pub async fn get_table_schema(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Option<ExistingTable>> {
        if !self.table_exists(schema, table).await? {
            return Ok(None);
        }

        let rows = sqlx::query(
            "SELECT
                column_name,
                data_type,
                udt_name,
                character_maximum_length,
                numeric_precision,
                numeric_scale,
                is_nullable,
                column_default,
                ordinal_position
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position",
        )
        .bind(schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            crate::error::DocLiftError::query_failed(
                format!("Failed to read columns of '{}.{}'", schema, table),
                e,
            )
        })?;

        let primary_key = self.get_primary_key(schema, table).await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("column_name").map_err(introspection_error)?;
            let data_type: String = row.try_get("data_type").map_err(introspection_error)?;
            let udt_name: String = row.try_get("udt_name").map_err(introspection_error)?;
            let char_max_len: Option<i32> = row
                .try_get("character_maximum_length")
                .map_err(introspection_error)?;
            let numeric_precision: Option<i32> = row
                .try_get("numeric_precision")
                .map_err(introspection_error)?;
            let numeric_scale: Option<i32> =
                row.try_get("numeric_scale").map_err(introspection_error)?;
            let is_nullable: String = row.try_get("is_nullable").map_err(introspection_error)?;
            let default_value: Option<String> =
                row.try_get("column_default").map_err(introspection_error)?;
            let ordinal_position: i32 = row
                .try_get("ordinal_position")
                .map_err(introspection_error)?;

            let unified = map_pg_type_to_unified(
                &data_type,
                &udt_name,
                char_max_len,
                numeric_precision,
                numeric_scale,
            );

            let is_primary_key = primary_key.contains(&name);

            columns.push(Column {
                name,
                data_type: unified,
                is_nullable: is_nullable == "YES",
                is_primary_key,
                default_value,
                comment: None,
                ordinal_position: u32::try_from(ordinal_position).unwrap_or(0),
            });
        }

        Ok(Some(ExistingTable {
            schema: schema.to_string(),
            name: table.to_string(),
            columns,
            primary_key,
        }))
    }

    /// Reads the primary key column names of a table.
    async fn get_primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT kcu.column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type = 'PRIMARY KEY'
                AND tc.table_schema = $1
                AND tc.table_name = $2
            ORDER BY kcu.ordinal_position",
        )
        .bind(schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            crate::error::DocLiftError::query_failed(
                format!("Failed to read primary key of '{}.{}'", schema, table),
                e,
            )
        })?;

        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("column_name").map_err(introspection_error)?;
            names.push(name);
        }
        Ok(names)
    }

    /// Counts rows in a table. Used by post-migration validation.
    pub async fn count_rows(&self, schema: &str, table: &str) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            super::ddl::quote_table(schema, table)
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                crate::error::DocLiftError::query_failed(
                    format!("Failed to count rows in '{}.{}'", schema, table),
                    e,
                )
            })?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn introspection_error(e: sqlx::Error) -> crate::error::DocLiftError {
    crate::error::DocLiftError::query_failed("Unexpected introspection row shape", e)
}
