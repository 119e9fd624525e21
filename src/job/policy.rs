//! Pure transition validation against the role-gated state machine.
//!
//! The policy knows nothing about a specific job instance and performs no
//! I/O; it answers one question: may a request with this role move a job
//! from this status to that status?

use std::collections::HashMap;

use super::{JobStatus, Role};

/// Why a requested transition is not legal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("job is already in status {0}")]
    AlreadyInStatus(JobStatus),

    #[error(
        "cannot move a job from {current} to {requested}; valid targets: {}",
        format_targets(.valid_targets)
    )]
    NoSuchTransition {
        current: JobStatus,
        requested: JobStatus,
        valid_targets: Vec<JobStatus>,
    },

    #[error(
        "role {role} may not move a job from {current} to {requested}; requires one of: {}",
        format_roles(.required)
    )]
    RoleNotAllowed {
        current: JobStatus,
        requested: JobStatus,
        role: Role,
        required: Vec<Role>,
    },

    #[error("only an admin may create a job (actor role is {0})")]
    CreationNotAllowed(Role),

    #[error(
        "a job cannot be moved to assigned through a plain status change; \
         use the assignment operation, which names the technician"
    )]
    AssignmentRequiresAssignee,
}

fn format_targets(targets: &[JobStatus]) -> String {
    if targets.is_empty() {
        return "none (terminal state)".to_string();
    }
    targets
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Immutable transition table: (current, target) -> roles allowed to make
/// that move. Constructed per instance, never global.
pub struct TransitionPolicy {
    table: HashMap<(JobStatus, JobStatus), Vec<Role>>,
}

/// Statuses a job may be reassigned out of.
const REASSIGNABLE: [JobStatus; 3] = [
    JobStatus::Assigned,
    JobStatus::Dispatched,
    JobStatus::InProgress,
];

/// Roles that may reassign a job to a different technician.
const REASSIGNMENT_ROLES: [Role; 2] = [Role::Admin, Role::OfficeManager];

impl Default for TransitionPolicy {
    fn default() -> Self {
        use JobStatus::*;
        use Role::*;

        let table = HashMap::from([
            ((Tentative, Confirmed), vec![Admin]),
            ((Confirmed, Assigned), vec![Admin]),
            ((Assigned, Dispatched), vec![OfficeManager]),
            ((Dispatched, InProgress), vec![Technician]),
            ((InProgress, Completed), vec![Technician]),
            ((Completed, Billed), vec![OfficeManager]),
        ]);

        Self { table }
    }
}

impl TransitionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets reachable from `current`, in lifecycle order.
    pub fn valid_targets(&self, current: JobStatus) -> Vec<JobStatus> {
        use JobStatus::*;
        // Fixed iteration order so error messages are deterministic.
        [Tentative, Confirmed, Assigned, Dispatched, InProgress, Completed, Billed]
            .into_iter()
            .filter(|target| self.table.contains_key(&(current, *target)))
            .collect()
    }

    /// Validate a requested move. Returns the violation on failure.
    pub fn validate(
        &self,
        current: JobStatus,
        requested: JobStatus,
        role: Role,
    ) -> Result<(), PolicyViolation> {
        if current == requested {
            return Err(PolicyViolation::AlreadyInStatus(current));
        }

        let Some(required) = self.table.get(&(current, requested)) else {
            return Err(PolicyViolation::NoSuchTransition {
                current,
                requested,
                valid_targets: self.valid_targets(current),
            });
        };

        if !required.contains(&role) {
            return Err(PolicyViolation::RoleNotAllowed {
                current,
                requested,
                role,
                required: required.clone(),
            });
        }

        Ok(())
    }

    /// Validate the out-of-band reassignment move (back to `Assigned`
    /// under a new technician). Legal only from an active assigned status.
    pub fn validate_reassignment(
        &self,
        current: JobStatus,
        role: Role,
    ) -> Result<(), PolicyViolation> {
        if !REASSIGNABLE.contains(&current) {
            return Err(PolicyViolation::NoSuchTransition {
                current,
                requested: JobStatus::Assigned,
                valid_targets: self.valid_targets(current),
            });
        }

        if !REASSIGNMENT_ROLES.contains(&role) {
            return Err(PolicyViolation::RoleNotAllowed {
                current,
                requested: JobStatus::Assigned,
                role,
                required: REASSIGNMENT_ROLES.to_vec(),
            });
        }

        Ok(())
    }

    /// Validate job creation: admins only.
    pub fn validate_creation(&self, role: Role) -> Result<(), PolicyViolation> {
        if role != Role::Admin {
            return Err(PolicyViolation::CreationNotAllowed(role));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ALL_STATUSES: [JobStatus; 7] = [
        JobStatus::Tentative,
        JobStatus::Confirmed,
        JobStatus::Assigned,
        JobStatus::Dispatched,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Billed,
    ];

    const ALL_ROLES: [Role; 3] = [Role::Admin, Role::OfficeManager, Role::Technician];

    /// The authoritative table, restated for enumeration tests.
    const TABLE: [(JobStatus, JobStatus, Role); 6] = [
        (JobStatus::Tentative, JobStatus::Confirmed, Role::Admin),
        (JobStatus::Confirmed, JobStatus::Assigned, Role::Admin),
        (JobStatus::Assigned, JobStatus::Dispatched, Role::OfficeManager),
        (JobStatus::Dispatched, JobStatus::InProgress, Role::Technician),
        (JobStatus::InProgress, JobStatus::Completed, Role::Technician),
        (JobStatus::Completed, JobStatus::Billed, Role::OfficeManager),
    ];

    #[test]
    fn every_table_entry_passes_with_its_role() {
        let policy = TransitionPolicy::new();
        for (from, to, role) in TABLE {
            assert_eq!(policy.validate(from, to, role), Ok(()), "{from} -> {to} as {role}");
        }
    }

    #[test]
    fn same_status_always_rejected() {
        let policy = TransitionPolicy::new();
        for status in ALL_STATUSES {
            for role in ALL_ROLES {
                assert_eq!(
                    policy.validate(status, status, role),
                    Err(PolicyViolation::AlreadyInStatus(status)),
                );
            }
        }
    }

    #[test]
    fn off_table_pairs_rejected_with_valid_targets() {
        let policy = TransitionPolicy::new();
        for from in ALL_STATUSES {
            for to in ALL_STATUSES {
                if from == to || TABLE.iter().any(|(f, t, _)| *f == from && *t == to) {
                    continue;
                }
                let err = policy
                    .validate(from, to, Role::Admin)
                    .expect_err("off-table pair must fail");
                match err {
                    PolicyViolation::NoSuchTransition { current, requested, valid_targets } => {
                        assert_eq!(current, from);
                        assert_eq!(requested, to);
                        assert_eq!(valid_targets, policy.valid_targets(from));
                    }
                    other => panic!("expected NoSuchTransition, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn wrong_role_rejected_naming_required_roles() {
        let policy = TransitionPolicy::new();
        for (from, to, allowed) in TABLE {
            for role in ALL_ROLES {
                if role == allowed {
                    continue;
                }
                let err = policy.validate(from, to, role).expect_err("wrong role must fail");
                match err {
                    PolicyViolation::RoleNotAllowed { required, .. } => {
                        assert_eq!(required, vec![allowed]);
                    }
                    other => panic!("expected RoleNotAllowed, got {other:?}"),
                }
            }
        }
    }

    #[test]
    fn billed_is_terminal_in_error_text() {
        let policy = TransitionPolicy::new();
        let err = policy
            .validate(JobStatus::Billed, JobStatus::Tentative, Role::Admin)
            .expect_err("billed has no targets");
        assert!(err.to_string().contains("none (terminal state)"), "{err}");
    }

    #[test]
    fn reassignment_allowed_from_active_assigned_statuses() {
        let policy = TransitionPolicy::new();
        for status in [JobStatus::Assigned, JobStatus::Dispatched, JobStatus::InProgress] {
            assert_eq!(policy.validate_reassignment(status, Role::Admin), Ok(()));
            assert_eq!(policy.validate_reassignment(status, Role::OfficeManager), Ok(()));
            assert!(policy.validate_reassignment(status, Role::Technician).is_err());
        }
        for status in [JobStatus::Tentative, JobStatus::Confirmed, JobStatus::Completed, JobStatus::Billed] {
            assert!(policy.validate_reassignment(status, Role::Admin).is_err());
        }
    }

    #[test]
    fn creation_is_admin_only() {
        let policy = TransitionPolicy::new();
        assert_eq!(policy.validate_creation(Role::Admin), Ok(()));
        assert!(policy.validate_creation(Role::OfficeManager).is_err());
        assert!(policy.validate_creation(Role::Technician).is_err());
    }
}
