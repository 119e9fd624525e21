//! Ordinary status transitions.

use chrono::Utc;
use uuid::Uuid;

use crate::error::TransitionError;
use crate::job::{Actor, Job, JobStatus, PolicyViolation, Role, TransitionRecord};
use crate::notify::NotificationKind;
use crate::store::{CasOutcome, TransitionWrite};

use super::Engine;

impl Engine {
    /// Move a job to `target`.
    ///
    /// Validation runs against the snapshot read here; by the time the
    /// conditional write executes, that snapshot may be stale. The write
    /// is keyed on the snapshot's status, so a concurrent mutation
    /// surfaces as `Conflict` rather than a silent overwrite. Conflicts
    /// are returned to the caller, never retried: a retry must re-run
    /// validation against fresh state, which only the caller can decide
    /// to do.
    pub async fn transition(
        &self,
        job_id: Uuid,
        target: JobStatus,
        actor: &Actor,
        notes: Option<String>,
    ) -> Result<Job, TransitionError> {
        let job = self.get_job(job_id).await?;

        self.policy.validate(job.status, target, actor.role)?;

        // Assigned requires an assignee, which this path never writes;
        // that move belongs to the assignment coordinator.
        if target == JobStatus::Assigned {
            return Err(PolicyViolation::AssignmentRequiresAssignee.into());
        }

        let notes = notes.filter(|n| !n.trim().is_empty());
        if target == JobStatus::Dispatched && notes.is_none() {
            return Err(TransitionError::MissingRequiredNote);
        }

        // A technician may only move jobs they own, even when the role
        // alone would permit the transition.
        if actor.role == Role::Technician && job.assigned_technician != Some(actor.id) {
            return Err(TransitionError::NotAssigned {
                job_id,
                actor_id: actor.id,
            });
        }

        let now = Utc::now();
        let write = TransitionWrite {
            status: target,
            assigned_technician: None,
            completed_at: (target == JobStatus::Completed).then_some(now),
            billed_at: (target == JobStatus::Billed).then_some(now),
        };
        let record = TransitionRecord {
            from_status: Some(job.status),
            to_status: target,
            actor_id: actor.id,
            timestamp: now,
            notes: notes.unwrap_or_else(|| {
                format!("Status changed from {} to {}", job.status, target)
            }),
        };

        match self
            .store
            .attempt_transition(job_id, job.status, write, record)
            .await?
        {
            CasOutcome::Updated(updated) => {
                tracing::info!(
                    job_id = %job_id,
                    actor_id = %actor.id,
                    from = job.status.as_str(),
                    to = target.as_str(),
                    "job transitioned"
                );
                self.after_commit(
                    NotificationKind::StatusChanged,
                    format!("Job \"{}\" moved from {} to {}", updated.title, job.status, target),
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
