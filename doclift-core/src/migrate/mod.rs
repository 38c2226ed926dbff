//! The migration engine.
//!
//! Orchestrates one collection-to-table transfer: infer, plan, reconcile with
//! the target, then stream batches through coercion into transactional
//! writes. The checkpoint is saved only after a batch commits, so a resumed
//! run can never skip uncommitted rows; conflict handling makes re-reading
//! committed rows harmless.

pub mod row;

use crate::Result;
use crate::checkpoint::{MigrationState, RunStatus};
use crate::compat::{CompatReport, check_compatibility};
use crate::config::MigrateConfig;
use crate::models::{ConflictMode, MigrationReport};
use crate::plan::TargetPlan;
use crate::source::{InferredSchema, MongoSource};
use crate::target::PgTarget;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use row::{ShapedRow, coerce_value, document_to_row};

/// One collection-to-table migration request.
#[derive(Debug, Clone)]
pub struct MigrationJob {
    /// Source collection name
    pub collection: String,
    /// Target schema name
    pub schema: String,
    /// Target table name
    pub table: String,
    /// Tunables for this run
    pub config: MigrateConfig,
}

/// Result of post-migration validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Source collection name
    pub collection: String,
    /// Qualified target table name
    pub table: String,
    /// Documents in the source collection (exact count)
    pub source_count: u64,
    /// Rows in the target table; zero if the table does not exist
    pub target_count: u64,
    /// Schema compatibility against the existing table, when one exists
    pub compat: Option<CompatReport>,
}

impl ValidationReport {
    /// True when source and target row counts agree.
    pub fn counts_match(&self) -> bool {
        self.source_count == self.target_count
    }

    /// True when counts match and no blocking schema issue was found.
    pub fn is_valid(&self) -> bool {
        self.counts_match() && self.compat.as_ref().map_or(true, CompatReport::is_compatible)
    }
}

/// Drives migrations between one source and one target.
pub struct Migrator {
    source: MongoSource,
    target: PgTarget,
}

impl Migrator {
    /// Creates a migrator over a connected source and target.
    pub fn new(source: MongoSource, target: PgTarget) -> Self {
        Self { source, target }
    }

    /// Access to the underlying source.
    pub fn source(&self) -> &MongoSource {
        &self.source
    }

    /// Access to the underlying target.
    pub fn target(&self) -> &PgTarget {
        &self.target
    }

    /// Runs one migration end to end.
    ///
    /// # Errors
    /// Returns error if inference, planning, compatibility checking, or any
    /// batch (after retries) fails
    pub async fn migrate(&self, job: &MigrationJob) -> Result<MigrationReport> {
        job.config.validate()?;

        let qualified = format!("{}.{}", job.schema, job.table);
        tracing::info!(
            "Migrating collection '{}' to table '{}' (batch size {})",
            job.collection,
            qualified,
            job.config.batch_size
        );

        let stats = self.source.collection_stats(&job.collection).await?;
        tracing::info!(
            "Collection '{}' holds approximately {} documents",
            job.collection,
            stats.document_count
        );

        let inferred = self
            .source
            .infer_schema(&job.collection, job.config.sample_size)
            .await?;

        if inferred.documents_sampled == 0 {
            tracing::warn!("Collection '{}' is empty; nothing to migrate", job.collection);
            let mut report = MigrationReport::new(&job.collection, &qualified);
            report.dry_run = job.config.dry_run;
            return Ok(report);
        }

        let inferred_plan = TargetPlan::from_inferred(&job.schema, &job.table, &inferred)?;
        let plan = self
            .reconcile_target(inferred_plan, &inferred, &job.config)
            .await?;

        if job.config.dry_run {
            tracing::info!(
                "Dry run: would transfer '{}' into '{}' with {} columns",
                job.collection,
                qualified,
                plan.columns.len()
            );
            let mut report = MigrationReport::new(&job.collection, &qualified);
            report.dry_run = true;
            return Ok(report);
        }

        let (mut state, resumed) = self.load_or_init_state(job, &qualified)?;
        let resume_token = state.resume_token()?;
        if resumed {
            tracing::info!(
                "Resuming '{}' from checkpoint: {} rows already written",
                job.collection,
                state.rows_written
            );
        }

        let mut reader =
            self.source
                .read_batches(&job.collection, job.config.batch_size, resume_token)?;

        while let Some(docs) = reader.next_batch().await? {
            let read = docs.len() as u64;
            let mut nulled = 0u64;
            let mut rows = Vec::with_capacity(docs.len());
            for doc in &docs {
                let shaped = row::document_to_row(doc, &plan, job.config.coercion_policy)?;
                nulled = nulled.saturating_add(shaped.nulled);
                rows.push(shaped.values);
            }

            let written = self
                .write_with_retry(&plan, &rows, job.config.conflict_mode, job.config.max_retries)
                .await;

            let written = match written {
                Ok(n) => n,
                Err(e) => {
                    state.status = RunStatus::Failed;
                    if let Some(path) = &job.config.checkpoint_path {
                        state.save(path)?;
                    }
                    return Err(e);
                }
            };

            let last_id = reader.last_id().cloned().ok_or_else(|| {
                crate::error::DocLiftError::migration(
                    job.collection.clone(),
                    "Batch reader produced rows without a resume token",
                )
            })?;

            state.record_batch(&last_id, read, written, nulled);

            // Checkpoint only after the batch is committed
            if let Some(path) = &job.config.checkpoint_path {
                state.save(path)?;
            }

            tracing::debug!(
                "Committed batch {} of '{}': {} read, {} written",
                state.batches,
                job.collection,
                read,
                written
            );
        }

        state.status = RunStatus::Completed;
        if let Some(path) = &job.config.checkpoint_path {
            state.save(path)?;
        }

        let report = state.to_report(resumed, false);
        tracing::info!(
            "Migration of '{}' completed: {} read, {} written, {} skipped in {} batches",
            job.collection,
            report.rows_read,
            report.rows_written,
            report.rows_skipped,
            report.batches
        );

        Ok(report)
    }

    /// Validates a migration without writing: exact counts on both sides and
    /// a schema compatibility report against the existing table.
    pub async fn validate(&self, job: &MigrationJob) -> Result<ValidationReport> {
        let source_count = self.source.count_documents(&job.collection).await?;

        let existing = self
            .target
            .get_table_schema(&job.schema, &job.table)
            .await?;

        let target_count = if existing.is_some() {
            self.target.count_rows(&job.schema, &job.table).await?
        } else {
            0
        };

        let compat = match (&existing, source_count) {
            (Some(table), 1..) => {
                let inferred = self
                    .source
                    .infer_schema(&job.collection, job.config.sample_size)
                    .await?;
                let plan = TargetPlan::from_inferred(&job.schema, &job.table, &inferred)?;
                Some(check_compatibility(&plan, table))
            }
            _ => None,
        };

        let report = ValidationReport {
            collection: job.collection.clone(),
            table: format!("{}.{}", job.schema, job.table),
            source_count,
            target_count,
            compat,
        };

        if report.is_valid() {
            tracing::info!(
                "Validation passed for '{}': {} rows on both sides",
                report.table,
                report.target_count
            );
        } else {
            tracing::warn!(
                "Validation failed for '{}': source has {}, target has {}{}",
                report.table,
                report.source_count,
                report.target_count,
                report
                    .compat
                    .as_ref()
                    .filter(|c| !c.is_compatible())
                    .map_or_else(String::new, |c| format!("; {}", c.summary()))
            );
        }

        Ok(report)
    }

    /// Creates the target table, or reconciles the plan with the existing one.
    ///
    /// When the table already exists its column types win, so coercion
    /// targets what the table actually stores.
    async fn reconcile_target(
        &self,
        plan: TargetPlan,
        inferred: &InferredSchema,
        config: &MigrateConfig,
    ) -> Result<TargetPlan> {
        if config.recreate {
            if config.dry_run {
                tracing::info!(
                    "Dry run: would drop and recreate table '{}'",
                    plan.qualified_name()
                );
            } else {
                self.target.drop_table(&plan).await?;
                self.target.ensure_table(&plan).await?;
            }
            return Ok(plan);
        }

        match self.target.get_table_schema(&plan.schema, &plan.table).await? {
            Some(existing) => {
                let report = check_compatibility(&plan, &existing);
                if !report.is_compatible() {
                    return Err(crate::error::DocLiftError::incompatible(
                        plan.qualified_name(),
                        report.summary(),
                    ));
                }
                for issue in &report.issues {
                    tracing::warn!("'{}': {} '{}': {}", plan.qualified_name(), issue.kind, issue.column, issue.detail);
                }
                tracing::info!(
                    "Target table '{}' exists and is compatible; adopting its column types",
                    plan.qualified_name()
                );
                TargetPlan::from_existing(inferred, &existing)
            }
            None => {
                if config.dry_run {
                    tracing::info!(
                        "Dry run: would create table '{}'",
                        plan.qualified_name()
                    );
                } else {
                    self.target.ensure_table(&plan).await?;
                }
                Ok(plan)
            }
        }
    }

    /// Loads a matching checkpoint or starts fresh state.
    fn load_or_init_state(
        &self,
        job: &MigrationJob,
        qualified: &str,
    ) -> Result<(MigrationState, bool)> {
        let Some(path) = &job.config.checkpoint_path else {
            return Ok((MigrationState::new(&job.collection, qualified), false));
        };

        match MigrationState::load(path)? {
            Some(state) if state.matches(&job.collection, qualified) => match state.status {
                RunStatus::Running | RunStatus::Failed => Ok((state, true)),
                RunStatus::Completed => {
                    tracing::info!(
                        "Previous run of '{}' completed; starting a fresh run",
                        job.collection
                    );
                    Ok((MigrationState::new(&job.collection, qualified), false))
                }
            },
            Some(state) => Err(crate::error::DocLiftError::configuration(format!(
                "Checkpoint at {} belongs to '{}' -> '{}', not this migration",
                path.display(),
                state.collection,
                state.table
            ))),
            None => Ok((MigrationState::new(&job.collection, qualified), false)),
        }
    }

    /// Writes a batch, retrying transient failures with backoff.
    async fn write_with_retry(
        &self,
        plan: &TargetPlan,
        rows: &[Vec<crate::target::SqlValue>],
        mode: ConflictMode,
        max_retries: u32,
    ) -> Result<u64> {
        let mut attempt = 0u32;
        loop {
            match self.target.write_batch(plan, rows, mode).await {
                Ok(written) => return Ok(written),
                Err(e) if attempt < max_retries => {
                    attempt = attempt.saturating_add(1);
                    let backoff = Duration::from_millis(200u64.saturating_mul(1 << attempt.min(6)));
                    tracing::warn!(
                        "Batch write to '{}' failed (attempt {}/{}), retrying in {:?}: {}",
                        plan.qualified_name(),
                        attempt,
                        max_retries,
                        backoff,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CoercionPolicy;

    #[test]
    fn test_validation_report_counts() {
        let report = ValidationReport {
            collection: "users".to_string(),
            table: "public.users".to_string(),
            source_count: 100,
            target_count: 100,
            compat: None,
        };
        assert!(report.counts_match());
        assert!(report.is_valid());

        let report = ValidationReport {
            target_count: 99,
            ..report
        };
        assert!(!report.counts_match());
        assert!(!report.is_valid());
    }

    #[test]
    fn test_job_defaults_are_safe() {
        let job = MigrationJob {
            collection: "users".to_string(),
            schema: "public".to_string(),
            table: "users".to_string(),
            config: MigrateConfig::default(),
        };

        assert_eq!(job.config.conflict_mode, ConflictMode::Skip);
        assert_eq!(job.config.coercion_policy, CoercionPolicy::Strict);
        assert!(!job.config.dry_run);
        assert!(job.config.validate().is_ok());
    }
}
