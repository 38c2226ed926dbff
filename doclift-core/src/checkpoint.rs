//! Crash-safe resume state.
//!
//! The engine persists a checkpoint after every committed batch. The file is
//! written atomically (temp file + rename), so a crash never leaves a
//! half-written checkpoint, and the recorded `_id` always refers to rows that
//! are already committed in the target.

use crate::Result;
use crate::models::MigrationReport;
use chrono::{DateTime, Utc};
use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Lifecycle of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Transfer in progress; a checkpoint with this status can be resumed
    Running,
    /// All batches committed
    Completed,
    /// Run aborted after exhausting retries
    Failed,
}

/// Persistent state of one collection-to-table migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationState {
    /// Unique id of the run that created this state
    pub run_id: String,
    /// Source collection name
    pub collection: String,
    /// Qualified target table name
    pub table: String,
    /// Run status
    pub status: RunStatus,
    /// Highest committed `_id`, as relaxed Extended JSON
    pub last_id: Option<serde_json::Value>,
    /// Documents read so far
    pub rows_read: u64,
    /// Rows committed so far
    pub rows_written: u64,
    /// Rows skipped by conflict handling
    pub rows_skipped: u64,
    /// Values nulled by lenient coercion
    pub values_nulled: u64,
    /// Batches committed
    pub batches: u64,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Last checkpoint write
    pub updated_at: DateTime<Utc>,
}

impl MigrationState {
    /// Creates fresh state for a new run.
    pub fn new(collection: impl Into<String>, table: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            collection: collection.into(),
            table: table.into(),
            status: RunStatus::Running,
            last_id: None,
            rows_read: 0,
            rows_written: 0,
            rows_skipped: 0,
            values_nulled: 0,
            batches: 0,
            started_at: now,
            updated_at: now,
        }
    }

    /// Whether this state belongs to the given collection/table pair.
    pub fn matches(&self, collection: &str, table: &str) -> bool {
        self.collection == collection && self.table == table
    }

    /// Records a committed batch.
    pub fn record_batch(&mut self, last_id: &Bson, read: u64, written: u64, nulled: u64) {
        self.last_id = Some(last_id.clone().into_relaxed_extjson());
        self.rows_read = self.rows_read.saturating_add(read);
        self.rows_written = self.rows_written.saturating_add(written);
        self.rows_skipped = self
            .rows_skipped
            .saturating_add(read.saturating_sub(written));
        self.values_nulled = self.values_nulled.saturating_add(nulled);
        self.batches = self.batches.saturating_add(1);
        self.updated_at = Utc::now();
    }

    /// The recorded resume token as a BSON value.
    ///
    /// # Errors
    /// Returns error if the stored Extended JSON is not valid BSON
    pub fn resume_token(&self) -> Result<Option<Bson>> {
        match &self.last_id {
            None => Ok(None),
            Some(value) => {
                let bson = Bson::try_from(value.clone()).map_err(|e| {
                    crate::error::DocLiftError::configuration(format!(
                        "Checkpoint contains an invalid resume token: {}",
                        e
                    ))
                })?;
                Ok(Some(bson))
            }
        }
    }

    /// Saves the state atomically.
    ///
    /// Writes to `<path>.tmp` and renames over the target, so readers never
    /// observe a partial file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            crate::error::DocLiftError::Serialization {
                context: "Failed to serialize checkpoint".to_string(),
                source: e,
            }
        })?;

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, json).map_err(|e| crate::error::DocLiftError::Io {
            context: format!("Failed to write checkpoint to {}", tmp_path.display()),
            source: e,
        })?;

        std::fs::rename(&tmp_path, path).map_err(|e| crate::error::DocLiftError::Io {
            context: format!("Failed to move checkpoint into place at {}", path.display()),
            source: e,
        })?;

        Ok(())
    }

    /// Loads state from disk, or `None` if no checkpoint exists.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(path).map_err(|e| crate::error::DocLiftError::Io {
            context: format!("Failed to read checkpoint from {}", path.display()),
            source: e,
        })?;

        let state = serde_json::from_str(&json).map_err(|e| {
            crate::error::DocLiftError::Serialization {
                context: format!("Failed to parse checkpoint at {}", path.display()),
                source: e,
            }
        })?;

        Ok(Some(state))
    }

    /// Folds the accumulated counters into a report.
    pub fn to_report(&self, resumed: bool, dry_run: bool) -> MigrationReport {
        MigrationReport {
            collection: self.collection.clone(),
            table: self.table.clone(),
            rows_read: self.rows_read,
            rows_written: self.rows_written,
            rows_skipped: self.rows_skipped,
            values_nulled: self.values_nulled,
            batches: self.batches,
            duration_ms: u64::try_from(
                Utc::now()
                    .signed_duration_since(self.started_at)
                    .num_milliseconds(),
            )
            .unwrap_or(0),
            resumed,
            dry_run,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn test_state_new() {
        let state = MigrationState::new("users", "public.users");
        assert_eq!(state.status, RunStatus::Running);
        assert!(state.last_id.is_none());
        assert_eq!(state.rows_written, 0);
        assert!(state.matches("users", "public.users"));
        assert!(!state.matches("users", "public.other"));
    }

    #[test]
    fn test_record_batch_counters() {
        let mut state = MigrationState::new("users", "public.users");
        state.record_batch(&Bson::Int64(100), 1000, 990, 3);

        assert_eq!(state.rows_read, 1000);
        assert_eq!(state.rows_written, 990);
        assert_eq!(state.rows_skipped, 10);
        assert_eq!(state.values_nulled, 3);
        assert_eq!(state.batches, 1);
    }

    #[test]
    fn test_resume_token_roundtrip_object_id() {
        let oid = ObjectId::new();
        let mut state = MigrationState::new("users", "public.users");
        state.record_batch(&Bson::ObjectId(oid), 10, 10, 0);

        let token = state.resume_token().unwrap().unwrap();
        assert_eq!(token, Bson::ObjectId(oid));
    }

    #[test]
    fn test_resume_token_roundtrip_via_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");

        let oid = ObjectId::new();
        let mut state = MigrationState::new("orders", "public.orders");
        state.record_batch(&Bson::ObjectId(oid), 500, 500, 0);
        state.save(&path).unwrap();

        let loaded = MigrationState::load(&path).unwrap().unwrap();
        assert_eq!(loaded.run_id, state.run_id);
        assert_eq!(loaded.rows_written, 500);
        assert_eq!(loaded.resume_token().unwrap(), Some(Bson::ObjectId(oid)));
        // No stray temp file left behind
        assert!(!dir.path().join("checkpoint.tmp").exists());
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json");
        assert!(MigrationState::load(&path).unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(MigrationState::load(&path).is_err());
    }

    #[test]
    fn test_to_report() {
        let mut state = MigrationState::new("users", "public.users");
        state.record_batch(&Bson::Int32(5), 100, 95, 1);
        state.status = RunStatus::Completed;

        let report = state.to_report(true, false);
        assert_eq!(report.rows_read, 100);
        assert_eq!(report.rows_written, 95);
        assert_eq!(report.rows_skipped, 5);
        assert!(report.resumed);
        assert!(!report.dry_run);
    }
}
