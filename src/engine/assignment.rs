//! First assignment and out-of-band reassignment.

use chrono::Utc;
use uuid::Uuid;

use crate::error::TransitionError;
use crate::job::{Actor, Job, JobStatus, Role, TransitionRecord};
use crate::notify::NotificationKind;
use crate::store::{CasOutcome, TransitionWrite};

use super::Engine;

impl Engine {
    /// Resolve a technician id, requiring the technician role.
    async fn resolve_technician(&self, technician_id: Uuid) -> Result<Actor, TransitionError> {
        let technician = self
            .directory
            .resolve(technician_id)
            .await?
            .ok_or(TransitionError::ActorNotFound(technician_id))?;
        if technician.role != Role::Technician {
            return Err(TransitionError::InvalidAssignee(technician_id));
        }
        Ok(technician)
    }

    /// First assignment: the fixed transition `Confirmed -> Assigned`,
    /// with the extra precondition that the assignee resolves to a
    /// technician.
    pub async fn assign(
        &self,
        job_id: Uuid,
        technician_id: Uuid,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<Job, TransitionError> {
        let technician = self.resolve_technician(technician_id).await?;

        self.policy
            .validate(JobStatus::Confirmed, JobStatus::Assigned, actor.role)?;

        let now = Utc::now();
        let write = TransitionWrite {
            status: JobStatus::Assigned,
            assigned_technician: Some(technician.id),
            completed_at: None,
            billed_at: None,
        };
        let record = TransitionRecord {
            from_status: Some(JobStatus::Confirmed),
            to_status: JobStatus::Assigned,
            actor_id: actor.id,
            timestamp: now,
            notes: notes
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| format!("Assigned to technician {}", technician.id)),
        };

        match self
            .store
            .attempt_transition(job_id, JobStatus::Confirmed, write, record)
            .await?
        {
            CasOutcome::Updated(updated) => {
                tracing::info!(
                    job_id = %job_id,
                    technician_id = %technician.id,
                    actor_id = %actor.id,
                    "job assigned"
                );
                self.after_commit(
                    NotificationKind::JobAssigned,
                    format!("Job \"{}\" assigned to technician {}", updated.title, technician.id),
                    &updated,
                    actor,
                );
                Ok(updated)
            }
            CasOutcome::Conflict => {
                // Advisory read, only to compose a precise diagnostic.
                // Never used to retry the write.
                let reason = match self.store.get_job(job_id).await? {
                    Some(current) => format!(
                        "job must be in status {} to assign; current status is {}",
                        JobStatus::Confirmed,
                        current.status
                    ),
                    None => "job must be in status confirmed to assign".to_string(),
                };
                Err(TransitionError::Conflict { reason })
            }
            CasOutcome::NotFound => Err(TransitionError::JobNotFound(job_id)),
        }
    }

    /// Reassignment: move an actively assigned job (Assigned, Dispatched
    /// or InProgress) back to `Assigned` under a new technician. The
    /// history record's `from_status` is whatever the job was actually in,
    /// deliberately rewinding a dispatched or in-progress job.
    ///
    /// Guarded by the same conditional write as ordinary transitions,
    /// keyed on the status read at the start of the operation.
    pub async fn reassign(
        &self,
        job_id: Uuid,
        technician_id: Uuid,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<Job, TransitionError> {
        let technician = self.resolve_technician(technician_id).await?;
        let job = self.get_job(job_id).await?;

        self.policy.validate_reassignment(job.status, actor.role)?;

        let now = Utc::now();
        let write = TransitionWrite {
            status: JobStatus::Assigned,
            assigned_technician: Some(technician.id),
            completed_at: None,
            billed_at: None,
        };
        let record = TransitionRecord {
            from_status: Some(job.status),
            to_status: JobStatus::Assigned,
            actor_id: actor.id,
            timestamp: now,
            notes: notes
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| format!("Reassigned to technician {}", technician.id)),
        };

        match self
            .store
            .attempt_transition(job_id, job.status, write, record)
            .await?
        {
            CasOutcome::Updated(updated) => {
                tracing::info!(
                    job_id = %job_id,
                    technician_id = %technician.id,
                    actor_id = %actor.id,
                    from = job.status.as_str(),
                    "job reassigned"
                );
                self.after_commit(
                    NotificationKind::JobReassigned,
                    format!("Job \"{}\" reassigned to technician {}", updated.title, technician.id),
                    &updated,
                    actor,
                );
                Ok(updated)
            }
            CasOutcome::Conflict => Err(TransitionError::stale_conflict()),
            CasOutcome::NotFound => Err(TransitionError::JobNotFound(job_id)),
        }
    }
}
