//! fieldops: field-service job lifecycle engine.
//!
//! A job is a finite state machine mutated by role-gated transitions under
//! concurrent access. The core pieces:
//!
//! - [`job::TransitionPolicy`] — pure validation of (current, target, role)
//!   against an immutable transition table.
//! - [`store::JobStore`] — persistence seam whose compare-and-swap update
//!   is the only cross-request synchronization primitive.
//! - [`engine::Engine`] — coordinators for ordinary transitions, first
//!   assignment, reassignment, and detail edits.
//! - [`notify`] — fire-and-forget notification hand-off and the
//!   jobs-changed broadcast, decoupled from transition results.
//! - [`http`] — thin axum surface mapping failure kinds to status codes.

pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod http;
pub mod job;
pub mod notify;
pub mod store;

pub use engine::Engine;
pub use error::{ConfigError, DatabaseError, TransitionError};
pub use job::{Actor, Job, JobDraft, JobStatus, Role, TransitionPolicy, TransitionRecord};
