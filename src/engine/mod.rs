//! Transition engine: the coordinators that orchestrate validation,
//! ownership checks, and the conditional write.
//!
//! The engine holds no per-job locks and performs no retries. Every
//! mutation validates against a snapshot that may already be stale; the
//! store's compare-and-swap is the sole authority on whether the write
//! lands. A validation pass followed by a conflict is expected, not a bug.

mod assignment;
mod edits;
mod transition;

use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::directory::ActorDirectory;
use crate::error::TransitionError;
use crate::job::{Actor, Job, JobDraft, TransitionPolicy};
use crate::notify::{JobsChanged, Notification, NotificationKind, Notifier};
use crate::store::JobStore;

pub struct Engine {
    store: Arc<dyn JobStore>,
    directory: Arc<dyn ActorDirectory>,
    policy: TransitionPolicy,
    notifier: Notifier,
    jobs_changed: broadcast::Sender<JobsChanged>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn JobStore>,
        directory: Arc<dyn ActorDirectory>,
        notifier: Notifier,
        jobs_changed: broadcast::Sender<JobsChanged>,
    ) -> Self {
        Self {
            store,
            directory,
            policy: TransitionPolicy::new(),
            notifier,
            jobs_changed,
        }
    }

    /// Subscribe to the best-effort jobs-changed signal.
    pub fn subscribe(&self) -> broadcast::Receiver<JobsChanged> {
        self.jobs_changed.subscribe()
    }

    /// Create a job in `Tentative` with its creation history record.
    /// Admin only.
    pub async fn create_job(
        &self,
        draft: JobDraft,
        actor: &Actor,
    ) -> Result<Job, TransitionError> {
        self.policy.validate_creation(actor.role)?;

        let job = Job::create(draft, actor.id);
        self.store.insert_job(&job).await?;

        tracing::info!(job_id = %job.id, actor_id = %actor.id, "job created");
        let _ = self.jobs_changed.send(JobsChanged);

        Ok(job)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Job, TransitionError> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or(TransitionError::JobNotFound(job_id))
    }

    pub async fn list_jobs(&self) -> Result<Vec<Job>, TransitionError> {
        Ok(self.store.list_jobs().await?)
    }

    /// Hand off a notification and signal the broadcast channel. Called
    /// only after a committed write; failures here are logged downstream
    /// and cannot change the result already determined by the store.
    fn after_commit(&self, kind: NotificationKind, message: String, job: &Job, actor: &Actor) {
        self.notifier.dispatch(Notification {
            kind,
            message,
            job_id: job.id,
            recipient_ids: job.assigned_technician.into_iter().collect(),
            recipient_roles: vec![crate::job::Role::Admin, crate::job::Role::OfficeManager],
            exclude_actor_id: Some(actor.id),
        });
        let _ = self.jobs_changed.send(JobsChanged);
    }
}
