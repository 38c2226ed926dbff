//! Batched, transactional INSERT writer.
//!
//! Each call to `write_batch` is one transaction. A batch larger than the
//! PostgreSQL bind-parameter limit (65535 per statement) is split across
//! several statements inside that transaction, so the batch still commits
//! atomically.

use super::PgTarget;
use super::ddl::{quote_ident, quote_table};
use crate::Result;
use crate::models::ConflictMode;
use crate::plan::TargetPlan;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};

/// PostgreSQL limit on bind parameters per statement.
const MAX_BIND_PARAMS: usize = 65_535;

/// A value ready to bind into an INSERT statement.
///
/// Produced by the coercion layer; each variant matches a column type the
/// planner can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL (emitted as a literal, not a bind)
    Null,
    /// boolean
    Bool(bool),
    /// smallint/integer
    Int(i32),
    /// bigint
    BigInt(i64),
    /// real/double precision/numeric
    Double(f64),
    /// text/varchar
    Text(String),
    /// bytea
    Bytes(Vec<u8>),
    /// timestamp/timestamptz
    Timestamp(DateTime<Utc>),
    /// json/jsonb
    Json(serde_json::Value),
    /// uuid
    Uuid(uuid::Uuid),
}

impl PgTarget {
    /// Writes one batch of rows in a single transaction.
    ///
    /// Returns the number of rows actually inserted; with `ConflictMode::Skip`
    /// this can be lower than `rows.len()`.
    ///
    /// # Errors
    /// Returns error if a row does not match the plan width, or if any
    /// statement in the transaction fails
    pub async fn write_batch(
        &self,
        plan: &TargetPlan,
        rows: &[Vec<SqlValue>],
        mode: ConflictMode,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let ncols = plan.columns.len();
        for row in rows {
            if row.len() != ncols {
                return Err(crate::error::DocLiftError::migration(
                    plan.qualified_name(),
                    format!("Row has {} values but plan has {} columns", row.len(), ncols),
                ));
            }
        }

        let max_rows_per_stmt = (MAX_BIND_PARAMS / ncols).max(1);

        let mut tx = self.pool.begin().await.map_err(|e| {
            crate::error::DocLiftError::query_failed("Failed to begin transaction", e)
        })?;

        let mut written: u64 = 0;
        for chunk in rows.chunks(max_rows_per_stmt) {
            let mut qb = build_insert(plan, chunk, mode);
            let result = qb.build().execute(&mut *tx).await.map_err(|e| {
                crate::error::DocLiftError::query_failed(
                    format!("Failed to insert batch into '{}'", plan.qualified_name()),
                    e,
                )
            })?;
            written = written.saturating_add(result.rows_affected());
        }

        tx.commit().await.map_err(|e| {
            crate::error::DocLiftError::query_failed("Failed to commit transaction", e)
        })?;

        Ok(written)
    }
}

fn build_insert<'a>(
    plan: &TargetPlan,
    chunk: &'a [Vec<SqlValue>],
    mode: ConflictMode,
) -> QueryBuilder<'a, Postgres> {
    let column_list: Vec<String> = plan
        .columns
        .iter()
        .map(|c| quote_ident(&c.column_name))
        .collect();

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        quote_table(&plan.schema, &plan.table),
        column_list.join(", ")
    ));

    qb.push_values(chunk, |mut b, row| {
        for value in row {
            match value {
                // Literal NULL sidesteps typed-null binding and saves a
                // bind slot
                SqlValue::Null => {
                    b.push("NULL");
                }
                SqlValue::Bool(v) => {
                    b.push_bind(*v);
                }
                SqlValue::Int(v) => {
                    b.push_bind(*v);
                }
                SqlValue::BigInt(v) => {
                    b.push_bind(*v);
                }
                SqlValue::Double(v) => {
                    b.push_bind(*v);
                }
                SqlValue::Text(v) => {
                    b.push_bind(v.clone());
                }
                SqlValue::Bytes(v) => {
                    b.push_bind(v.clone());
                }
                SqlValue::Timestamp(v) => {
                    b.push_bind(*v);
                }
                SqlValue::Json(v) => {
                    b.push_bind(v.clone());
                }
                SqlValue::Uuid(v) => {
                    b.push_bind(*v);
                }
            }
        }
    });

    let pk_list: Vec<String> = plan.pk_columns().iter().map(|c| quote_ident(c)).collect();

    match mode {
        ConflictMode::Fail => {}
        ConflictMode::Skip => {
            qb.push(format!(" ON CONFLICT ({}) DO NOTHING", pk_list.join(", ")));
        }
        ConflictMode::Replace => {
            let updates: Vec<String> = plan
                .columns
                .iter()
                .filter(|c| !c.primary_key)
                .map(|c| {
                    let q = quote_ident(&c.column_name);
                    format!("{} = EXCLUDED.{}", q, q)
                })
                .collect();

            if updates.is_empty() {
                // Key-only table; nothing to overwrite
                qb.push(format!(" ON CONFLICT ({}) DO NOTHING", pk_list.join(", ")));
            } else {
                qb.push(format!(
                    " ON CONFLICT ({}) DO UPDATE SET {}",
                    pk_list.join(", "),
                    updates.join(", ")
                ));
            }
        }
    }

    qb
}
