//! In-memory job store for tests and local runs without postgres.
//!
//! A single mutex over the job map makes every operation atomic, which is
//! exactly the contract the postgres implementation provides per row.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::job::{Job, JobStatus, TransitionRecord};

use super::{CasOutcome, DetailEdit, JobStore, TransitionWrite};

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert_job(&self, job: &Job) -> Result<(), DatabaseError> {
        self.jobs.lock().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, DatabaseError> {
        Ok(self.jobs.lock().await.get(&id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, DatabaseError> {
        let mut jobs: Vec<Job> = self.jobs.lock().await.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn attempt_transition(
        &self,
        job_id: Uuid,
        expected: JobStatus,
        write: TransitionWrite,
        record: TransitionRecord,
    ) -> Result<CasOutcome, DatabaseError> {
        let mut jobs = self.jobs.lock().await;

        let Some(job) = jobs.get_mut(&job_id) else {
            return Ok(CasOutcome::NotFound);
        };
        if job.status != expected {
            return Ok(CasOutcome::Conflict);
        }

        job.status = write.status;
        if let Some(technician) = write.assigned_technician {
            job.assigned_technician = Some(technician);
        }
        if let Some(at) = write.completed_at {
            job.completed_at = Some(at);
        }
        if let Some(at) = write.billed_at {
            job.billed_at = Some(at);
        }
        job.status_history.push(record);

        Ok(CasOutcome::Updated(job.clone()))
    }

    async fn update_details(
        &self,
        job_id: Uuid,
        edit: &DetailEdit,
    ) -> Result<Option<Job>, DatabaseError> {
        let mut jobs = self.jobs.lock().await;

        let Some(job) = jobs.get_mut(&job_id) else {
            return Ok(None);
        };
        if job.status.is_terminal() {
            return Ok(None);
        }

        if let Some(title) = &edit.title {
            job.title = title.clone();
        }
        if let Some(description) = &edit.description {
            job.description = description.clone();
        }
        if let Some(customer) = &edit.customer {
            job.customer = customer.clone();
        }
        if let Some(address) = &edit.address {
            job.address = address.clone();
        }
        if let Some(cost) = edit.cost {
            job.cost = Some(cost);
        }
        if let Some(scheduled_for) = edit.scheduled_for {
            job.scheduled_for = Some(scheduled_for);
        }

        Ok(Some(job.clone()))
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<bool, DatabaseError> {
        let mut jobs = self.jobs.lock().await;
        match jobs.get(&job_id) {
            Some(job) if job.status.is_terminal() => Ok(false),
            Some(_) => {
                jobs.remove(&job_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobDraft;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn record(from: JobStatus, to: JobStatus) -> TransitionRecord {
        TransitionRecord {
            from_status: Some(from),
            to_status: to,
            actor_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            notes: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn cas_rejects_mismatched_status_without_mutation() {
        let store = MemoryJobStore::new();
        let job = Job::create(JobDraft::default(), Uuid::new_v4());
        let id = job.id;
        store.insert_job(&job).await.unwrap();

        let outcome = store
            .attempt_transition(
                id,
                JobStatus::Confirmed,
                TransitionWrite::status_only(JobStatus::Assigned),
                record(JobStatus::Confirmed, JobStatus::Assigned),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, CasOutcome::Conflict));

        let stored = store.get_job(id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Tentative);
        assert_eq!(stored.status_history.len(), 1);
    }

    #[tokio::test]
    async fn cas_distinguishes_missing_job_from_conflict() {
        let store = MemoryJobStore::new();
        let outcome = store
            .attempt_transition(
                Uuid::new_v4(),
                JobStatus::Tentative,
                TransitionWrite::status_only(JobStatus::Confirmed),
                record(JobStatus::Tentative, JobStatus::Confirmed),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, CasOutcome::NotFound));
    }

    #[tokio::test]
    async fn cas_applies_write_set_and_appends_history() {
        let store = MemoryJobStore::new();
        let job = Job::create(JobDraft::default(), Uuid::new_v4());
        let id = job.id;
        store.insert_job(&job).await.unwrap();

        let outcome = store
            .attempt_transition(
                id,
                JobStatus::Tentative,
                TransitionWrite::status_only(JobStatus::Confirmed),
                record(JobStatus::Tentative, JobStatus::Confirmed),
            )
            .await
            .unwrap();

        let CasOutcome::Updated(updated) = outcome else {
            panic!("expected success");
        };
        assert_eq!(updated.status, JobStatus::Confirmed);
        assert_eq!(updated.status_history.len(), 2);
        assert_eq!(
            updated.status_history[1].from_status,
            Some(JobStatus::Tentative)
        );
    }

    #[tokio::test]
    async fn racing_writers_from_same_status_produce_one_winner() {
        let store = std::sync::Arc::new(MemoryJobStore::new());
        let job = Job::create(JobDraft::default(), Uuid::new_v4());
        let id = job.id;
        store.insert_job(&job).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .attempt_transition(
                        id,
                        JobStatus::Tentative,
                        TransitionWrite::status_only(JobStatus::Confirmed),
                        record(JobStatus::Tentative, JobStatus::Confirmed),
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                CasOutcome::Updated(_) => wins += 1,
                CasOutcome::Conflict => conflicts += 1,
                CasOutcome::NotFound => panic!("job exists"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 7);

        let stored = store.get_job(id).await.unwrap().unwrap();
        assert_eq!(stored.status_history.len(), 2);
    }

    #[tokio::test]
    async fn detail_edit_and_delete_refuse_billed_jobs() {
        let store = MemoryJobStore::new();
        let mut job = Job::create(JobDraft::default(), Uuid::new_v4());
        job.status = JobStatus::Billed;
        let id = job.id;
        store.insert_job(&job).await.unwrap();

        let edit = DetailEdit {
            title: Some("new title".to_string()),
            ..DetailEdit::default()
        };
        assert!(store.update_details(id, &edit).await.unwrap().is_none());
        assert!(!store.delete_job(id).await.unwrap());
        assert!(store.get_job(id).await.unwrap().is_some());
    }
}
