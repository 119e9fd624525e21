//! Persistence abstraction for jobs.
//!
//! The store's one non-trivial obligation is [`JobStore::attempt_transition`]:
//! a single atomic compare-and-swap keyed on the job's expected current
//! status. It is the sole cross-request synchronization primitive in the
//! system; coordinators hold no locks and perform no retries.

mod memory;
mod postgres;

pub use memory::MemoryJobStore;
pub use postgres::{PgJobStore, run_migrations};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::job::{Job, JobStatus, TransitionRecord};

/// Result of a conditional write.
///
/// `Conflict` and `NotFound` are distinct: the former means the job exists
/// but its status no longer matches the precondition, the latter that it
/// never existed or was deleted.
#[derive(Debug)]
pub enum CasOutcome {
    /// The precondition held; the returned snapshot includes the appended
    /// history record.
    Updated(Job),
    Conflict,
    NotFound,
}

/// Fields written alongside a status change. `None` leaves a column
/// untouched; the status itself is always written.
#[derive(Debug, Clone)]
pub struct TransitionWrite {
    pub status: JobStatus,
    pub assigned_technician: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub billed_at: Option<DateTime<Utc>>,
}

impl TransitionWrite {
    /// A write that changes only the status column.
    pub fn status_only(status: JobStatus) -> Self {
        Self {
            status,
            assigned_technician: None,
            completed_at: None,
            billed_at: None,
        }
    }
}

/// Non-status fields editable outside the state machine. The guarded
/// fields (status, history, assignee, creator) have no representation
/// here and so cannot travel down this path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub customer: Option<String>,
    pub address: Option<String>,
    pub cost: Option<Decimal>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Job persistence seam.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: &Job) -> Result<(), DatabaseError>;

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, DatabaseError>;

    async fn list_jobs(&self) -> Result<Vec<Job>, DatabaseError>;

    /// Atomically apply `write` and append `record` to the history ledger,
    /// but only if the persisted status still equals `expected`. On any
    /// other persisted status the write is rejected with no partial
    /// mutation observable.
    async fn attempt_transition(
        &self,
        job_id: Uuid,
        expected: JobStatus,
        write: TransitionWrite,
        record: TransitionRecord,
    ) -> Result<CasOutcome, DatabaseError>;

    /// Apply a detail edit, guarded against the terminal status: the write
    /// lands only if the job exists and is not billed. Returns the updated
    /// snapshot, or `None` when the guard rejected it (caller probes to
    /// distinguish missing from billed).
    async fn update_details(
        &self,
        job_id: Uuid,
        edit: &DetailEdit,
    ) -> Result<Option<Job>, DatabaseError>;

    /// Delete a job unless billed. Same guard shape as `update_details`:
    /// `true` when a row was removed.
    async fn delete_job(&self, job_id: Uuid) -> Result<bool, DatabaseError>;
}
