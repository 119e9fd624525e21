//! Detail edits and deletion: paths that bypass the state machine but
//! still honor the terminal-state invariant.

use uuid::Uuid;

use crate::error::TransitionError;
use crate::job::Job;
use crate::notify::JobsChanged;
use crate::store::DetailEdit;

use super::Engine;

impl Engine {
    /// Edit descriptive fields. `DetailEdit` carries no representation of
    /// status, history, assignee or creator, so those cannot change here.
    /// The store's write is guarded against the billed status, closing the
    /// race between this check and the write.
    pub async fn edit_details(
        &self,
        job_id: Uuid,
        edit: DetailEdit,
    ) -> Result<Job, TransitionError> {
        match self.store.update_details(job_id, &edit).await? {
            Some(job) => {
                tracing::info!(job_id = %job_id, "job details updated");
                let _ = self.jobs_changed.send(JobsChanged);
                Ok(job)
            }
            // The guard rejected the write: probe to say why.
            None => match self.store.get_job(job_id).await? {
                Some(_) => Err(TransitionError::TerminalState(job_id)),
                None => Err(TransitionError::JobNotFound(job_id)),
            },
        }
    }

    /// Delete a job. Disallowed once billed; any further authorization is
    /// the outer layer's concern.
    pub async fn delete_job(&self, job_id: Uuid) -> Result<(), TransitionError> {
        if self.store.delete_job(job_id).await? {
            tracing::info!(job_id = %job_id, "job deleted");
            let _ = self.jobs_changed.send(JobsChanged);
            return Ok(());
        }

        match self.store.get_job(job_id).await? {
            Some(_) => Err(TransitionError::TerminalState(job_id)),
            None => Err(TransitionError::JobNotFound(job_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    use crate::engine::testutil::fixture;
    use crate::error::TransitionError;
    use crate::job::{JobDraft, JobStatus};
    use crate::store::DetailEdit;

    #[tokio::test]
    async fn edits_change_fields_without_touching_the_ledger() {
        let fx = fixture().await;
        let job = fx
            .engine
            .create_job(
                JobDraft { title: "Old title".into(), ..JobDraft::default() },
                &fx.admin,
            )
            .await
            .unwrap();

        let edit = DetailEdit {
            title: Some("New title".to_string()),
            address: Some("12 Elm St".to_string()),
            ..DetailEdit::default()
        };
        let updated = fx.engine.edit_details(job.id, edit).await.unwrap();

        assert_eq!(updated.title, "New title");
        assert_eq!(updated.address, "12 Elm St");
        assert_eq!(updated.status, JobStatus::Tentative);
        assert_eq!(updated.status_history.len(), 1);
        assert_eq!(updated.created_by, job.created_by);
    }

    #[tokio::test]
    async fn billed_jobs_reject_edits_and_deletion() {
        let fx = fixture().await;
        let job = fx
            .engine
            .create_job(JobDraft::default(), &fx.admin)
            .await
            .unwrap();
        let job = fx
            .engine
            .transition(job.id, JobStatus::Confirmed, &fx.admin, None)
            .await
            .unwrap();
        let job = fx
            .engine
            .assign(job.id, fx.technician.id, &fx.admin, None)
            .await
            .unwrap();
        let job = fx
            .engine
            .transition(job.id, JobStatus::Dispatched, &fx.manager, Some("keys in lockbox".into()))
            .await
            .unwrap();
        let job = fx
            .engine
            .transition(job.id, JobStatus::InProgress, &fx.technician, None)
            .await
            .unwrap();
        let job = fx
            .engine
            .transition(job.id, JobStatus::Completed, &fx.technician, None)
            .await
            .unwrap();
        let job = fx
            .engine
            .transition(job.id, JobStatus::Billed, &fx.manager, None)
            .await
            .unwrap();

        let edit = DetailEdit {
            title: Some("too late".to_string()),
            ..DetailEdit::default()
        };
        let err = fx.engine.edit_details(job.id, edit).await.unwrap_err();
        assert!(matches!(err, TransitionError::TerminalState(_)));

        let err = fx.engine.delete_job(job.id).await.unwrap_err();
        assert!(matches!(err, TransitionError::TerminalState(_)));

        // Still there, untouched.
        let stored = fx.engine.get_job(job.id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Billed);
    }

    #[tokio::test]
    async fn edits_and_deletes_on_missing_jobs_are_not_found() {
        let fx = fixture().await;
        let id = Uuid::new_v4();

        let err = fx
            .engine
            .edit_details(id, DetailEdit::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::JobNotFound(_)));

        let err = fx.engine.delete_job(id).await.unwrap_err();
        assert!(matches!(err, TransitionError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn delete_works_before_billing() {
        let fx = fixture().await;
        let job = fx
            .engine
            .create_job(JobDraft::default(), &fx.admin)
            .await
            .unwrap();

        fx.engine.delete_job(job.id).await.unwrap();
        let err = fx.engine.get_job(job.id).await.unwrap_err();
        assert!(matches!(err, TransitionError::JobNotFound(_)));
    }
}
