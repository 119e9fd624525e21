//! Job domain types: statuses, actors, and the transition history ledger.
//!
//! A job moves through a fixed set of statuses. Every move is recorded in
//! `status_history`, an append-only ledger whose records chain together:
//! each record's `from_status` equals the previous record's `to_status`,
//! and the job's `status` always equals the last record's `to_status`.

mod policy;

pub use policy::{PolicyViolation, TransitionPolicy};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Tentative,
    Confirmed,
    Assigned,
    Dispatched,
    InProgress,
    Completed,
    Billed,
}

impl JobStatus {
    /// Stable string form used in the database and in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tentative => "tentative",
            Self::Confirmed => "confirmed",
            Self::Assigned => "assigned",
            Self::Dispatched => "dispatched",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Billed => "billed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tentative" => Some(Self::Tentative),
            "confirmed" => Some(Self::Confirmed),
            "assigned" => Some(Self::Assigned),
            "dispatched" => Some(Self::Dispatched),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "billed" => Some(Self::Billed),
            _ => None,
        }
    }

    /// Whether the status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Billed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of an actor issuing a request.
///
/// Roles are supplied by the authentication layer per request; the core
/// never re-derives them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    OfficeManager,
    Technician,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::OfficeManager => "office_manager",
            Self::Technician => "technician",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "office_manager" => Some(Self::OfficeManager),
            "technician" => Some(Self::Technician),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated actor as seen by the core: identity plus role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

/// One entry in a job's status history ledger.
///
/// `from_status` is `None` only for the creation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from_status: Option<JobStatus>,
    pub to_status: JobStatus,
    pub actor_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub notes: String,
}

/// Descriptive fields supplied when creating a job. Opaque to the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDraft {
    pub title: String,
    pub description: String,
    pub customer: String,
    pub address: String,
    pub cost: Option<Decimal>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// A field-service job with its full transition history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub customer: String,
    pub address: String,
    pub cost: Option<Decimal>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub status: JobStatus,
    /// Required from `Assigned` onward; set only via the assignment paths.
    pub assigned_technician: Option<Uuid>,
    /// Immutable after creation.
    pub created_by: Uuid,
    pub status_history: Vec<TransitionRecord>,
    /// Set exactly once, when the transition to `Completed` lands.
    pub completed_at: Option<DateTime<Utc>>,
    /// Set exactly once, when the transition to `Billed` lands.
    pub billed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Build a new job in `Tentative` with its creation record.
    pub fn create(draft: JobDraft, created_by: Uuid) -> Self {
        let now = Utc::now();
        let creation = TransitionRecord {
            from_status: None,
            to_status: JobStatus::Tentative,
            actor_id: created_by,
            timestamp: now,
            notes: "Job created".to_string(),
        };

        Self {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            customer: draft.customer,
            address: draft.address,
            cost: draft.cost,
            scheduled_for: draft.scheduled_for,
            status: JobStatus::Tentative,
            assigned_technician: None,
            created_by,
            status_history: vec![creation],
            completed_at: None,
            billed_at: None,
            created_at: now,
        }
    }
}
