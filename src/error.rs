//! Error types returned across the library boundary.

use uuid::Uuid;

use crate::job::PolicyViolation;

/// Typed failure of a job mutation. Never panics across the boundary,
/// never retried internally.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("job {0} not found")]
    JobNotFound(Uuid),

    #[error("actor {0} not found")]
    ActorNotFound(Uuid),

    /// State-machine or role violation; carries the valid-target or
    /// required-role set in its message.
    #[error(transparent)]
    InvalidTransition(#[from] PolicyViolation),

    #[error("notes are required when dispatching a job")]
    MissingRequiredNote,

    #[error("technician {actor_id} is not assigned to job {job_id}")]
    NotAssigned { job_id: Uuid, actor_id: Uuid },

    /// The conditional write's precondition no longer matched persisted
    /// state: a concurrent request moved the job first.
    #[error("{reason}")]
    Conflict { reason: String },

    #[error("actor {0} does not have the technician role")]
    InvalidAssignee(Uuid),

    #[error("job {0} is billed and can no longer be modified")]
    TerminalState(Uuid),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl TransitionError {
    /// Conflict with the generic retry guidance for ordinary transitions.
    pub fn stale_conflict() -> Self {
        Self::Conflict {
            reason: "job status was changed by another request; reload and retry".to_string(),
        }
    }

    /// Stable machine-readable kind, used by transport layers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JobNotFound(_) | Self::ActorNotFound(_) => "not_found",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::MissingRequiredNote => "missing_required_note",
            Self::NotAssigned { .. } => "not_assigned",
            Self::Conflict { .. } => "conflict",
            Self::InvalidAssignee(_) => "invalid_assignee",
            Self::TerminalState(_) => "terminal_state_violation",
            Self::Database(_) => "database",
        }
    }
}

/// Persistence-layer failure, distinct from the typed transition outcomes.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<deadpool_postgres::PoolError> for DatabaseError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        Self::Pool(e.to_string())
    }
}

impl From<deadpool_postgres::CreatePoolError> for DatabaseError {
    fn from(e: deadpool_postgres::CreatePoolError) -> Self {
        Self::Pool(e.to_string())
    }
}

/// Configuration loading failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}
