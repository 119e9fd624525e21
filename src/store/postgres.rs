//! PostgreSQL job store.
//!
//! The conditional write is a single `UPDATE ... WHERE id = $1 AND
//! status = $2` that also appends the history record to the JSONB ledger;
//! row-level atomicity in postgres gives the CAS guarantee without any
//! explicit locking or transaction around the read/validate/write cycle.

use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::DatabaseError;
use crate::job::{Job, JobStatus, TransitionRecord};

use super::{CasOutcome, DetailEdit, JobStore, TransitionWrite};

mod embedded {
    refinery::embed_migrations!("migrations");
}

/// Apply pending schema migrations over a dedicated connection.
pub async fn run_migrations(url: &str) -> Result<(), DatabaseError> {
    let (mut client, connection) = tokio_postgres::connect(url, NoTls).await?;
    let driver = tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "migration connection failed");
        }
    });

    let report = embedded::migrations::runner()
        .run_async(&mut client)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    for migration in report.applied_migrations() {
        tracing::info!(migration = %migration, "applied migration");
    }

    driver.abort();
    Ok(())
}

const JOB_COLUMNS: &str = "id, title, description, customer, address, cost, scheduled_for, \
     status, assigned_technician, created_by, status_history, completed_at, billed_at, created_at";

/// Postgres-backed [`JobStore`].
pub struct PgJobStore {
    pool: Pool,
}

impl PgJobStore {
    /// Create the store and verify connectivity.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let mut cfg = Config::new();
        cfg.url = Some(config.url.clone());
        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: config.pool_size,
            ..Default::default()
        });

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;

        // Test connection
        let _ = pool.get().await?;

        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<deadpool_postgres::Object, DatabaseError> {
        Ok(self.pool.get().await?)
    }

    /// Clone of the pool, for sharing with the directory and the
    /// notification sink.
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }
}

fn job_from_row(row: &Row) -> Result<Job, DatabaseError> {
    let status_str: String = row.get("status");
    let status = JobStatus::parse(&status_str).ok_or_else(|| {
        DatabaseError::Serialization(format!("unknown job status: {status_str}"))
    })?;

    let history_json: serde_json::Value = row.get("status_history");
    let status_history: Vec<TransitionRecord> = serde_json::from_value(history_json)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

    Ok(Job {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        customer: row.get("customer"),
        address: row.get("address"),
        cost: row.get("cost"),
        scheduled_for: row.get("scheduled_for"),
        status,
        assigned_technician: row.get("assigned_technician"),
        created_by: row.get("created_by"),
        status_history,
        completed_at: row.get("completed_at"),
        billed_at: row.get("billed_at"),
        created_at: row.get("created_at"),
    })
}

#[async_trait::async_trait]
impl JobStore for PgJobStore {
    async fn insert_job(&self, job: &Job) -> Result<(), DatabaseError> {
        let conn = self.conn().await?;

        let history = serde_json::to_value(&job.status_history)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO jobs (
                id, title, description, customer, address, cost, scheduled_for,
                status, assigned_technician, created_by, status_history,
                completed_at, billed_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
            &[
                &job.id,
                &job.title,
                &job.description,
                &job.customer,
                &job.address,
                &job.cost,
                &job.scheduled_for,
                &job.status.as_str(),
                &job.assigned_technician,
                &job.created_by,
                &history,
                &job.completed_at,
                &job.billed_at,
                &job.created_at,
            ],
        )
        .await?;

        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, DatabaseError> {
        let conn = self.conn().await?;
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        let row = conn.query_opt(query.as_str(), &[&id]).await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, DatabaseError> {
        let conn = self.conn().await?;
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at");
        let rows = conn.query(query.as_str(), &[]).await?;

        rows.iter().map(job_from_row).collect()
    }

    async fn attempt_transition(
        &self,
        job_id: Uuid,
        expected: JobStatus,
        write: TransitionWrite,
        record: TransitionRecord,
    ) -> Result<CasOutcome, DatabaseError> {
        let conn = self.conn().await?;

        let record_json = serde_json::to_value(&record)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        // Appending a non-array jsonb to a jsonb array pushes it as one
        // element, so the ledger grows by exactly the new record.
        let query = format!(
            r#"
            UPDATE jobs SET
                status = $3,
                assigned_technician = COALESCE($4, assigned_technician),
                completed_at = COALESCE($5, completed_at),
                billed_at = COALESCE($6, billed_at),
                status_history = status_history || $7
            WHERE id = $1 AND status = $2
            RETURNING {JOB_COLUMNS}
            "#
        );
        let row = conn
            .query_opt(
                query.as_str(),
                &[
                    &job_id,
                    &expected.as_str(),
                    &write.status.as_str(),
                    &write.assigned_technician,
                    &write.completed_at,
                    &write.billed_at,
                    &record_json,
                ],
            )
            .await?;

        if let Some(row) = row {
            return Ok(CasOutcome::Updated(job_from_row(&row)?));
        }

        // Zero rows: either the job is gone or its status moved on.
        let exists = conn
            .query_opt("SELECT 1 FROM jobs WHERE id = $1", &[&job_id])
            .await?;
        Ok(if exists.is_some() {
            CasOutcome::Conflict
        } else {
            CasOutcome::NotFound
        })
    }

    async fn update_details(
        &self,
        job_id: Uuid,
        edit: &DetailEdit,
    ) -> Result<Option<Job>, DatabaseError> {
        let conn = self.conn().await?;

        let query = format!(
            r#"
            UPDATE jobs SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                customer = COALESCE($4, customer),
                address = COALESCE($5, address),
                cost = COALESCE($6, cost),
                scheduled_for = COALESCE($7, scheduled_for)
            WHERE id = $1 AND status <> 'billed'
            RETURNING {JOB_COLUMNS}
            "#
        );
        let row = conn
            .query_opt(
                query.as_str(),
                &[
                    &job_id,
                    &edit.title,
                    &edit.description,
                    &edit.customer,
                    &edit.address,
                    &edit.cost,
                    &edit.scheduled_for,
                ],
            )
            .await?;

        row.as_ref().map(job_from_row).transpose()
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let count = conn
            .execute(
                "DELETE FROM jobs WHERE id = $1 AND status <> 'billed'",
                &[&job_id],
            )
            .await?;
        Ok(count > 0)
    }
}
