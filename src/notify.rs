//! Fire-and-forget notification dispatch and the jobs-changed broadcast.
//!
//! Both paths are structurally decoupled from the transition return path:
//! the engine hands a notification to a bounded channel and moves on. A
//! spawned worker task delivers it through the sink and logs any failure.
//! Nothing here can alter a transition result that has already committed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::job::Role;

/// Best-effort signal that some job changed. Carries no payload; receivers
/// are expected to re-fetch.
#[derive(Debug, Clone, Copy)]
pub struct JobsChanged;

/// What kind of event a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    StatusChanged,
    JobAssigned,
    JobReassigned,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StatusChanged => "status_changed",
            Self::JobAssigned => "job_assigned",
            Self::JobReassigned => "job_reassigned",
        }
    }
}

/// A notification handed off after a committed mutation.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub job_id: Uuid,
    pub recipient_ids: Vec<Uuid>,
    pub recipient_roles: Vec<Role>,
    pub exclude_actor_id: Option<Uuid>,
}

/// Delivery/persistence seam for notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), DatabaseError>;
}

/// Sink that persists notifications to the `notifications` table.
pub struct PgNotificationSink {
    pool: deadpool_postgres::Pool,
}

impl PgNotificationSink {
    pub fn new(pool: deadpool_postgres::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), DatabaseError> {
        let conn = self.pool.get().await?;
        let roles: Vec<&str> = notification
            .recipient_roles
            .iter()
            .map(|r| r.as_str())
            .collect();

        conn.execute(
            r#"
            INSERT INTO notifications (id, kind, message, job_id, recipient_ids, recipient_roles, exclude_actor_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
            &[
                &Uuid::new_v4(),
                &notification.kind.as_str(),
                &notification.message,
                &notification.job_id,
                &notification.recipient_ids,
                &roles,
                &notification.exclude_actor_id,
            ],
        )
        .await?;

        Ok(())
    }
}

/// Sink that only logs; used when no persistence is configured.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), DatabaseError> {
        tracing::info!(
            job_id = %notification.job_id,
            kind = notification.kind.as_str(),
            message = %notification.message,
            "notification"
        );
        Ok(())
    }
}

/// Handle for enqueuing notifications without awaiting delivery.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Notification>,
}

impl Notifier {
    /// Spawn the delivery worker and return the handle. Must be called
    /// within a tokio runtime.
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, mut rx) = mpsc::channel::<Notification>(256);

        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if let Err(e) = sink.deliver(&notification).await {
                    tracing::warn!(
                        job_id = %notification.job_id,
                        kind = notification.kind.as_str(),
                        error = %e,
                        "notification delivery failed"
                    );
                }
            }
        });

        Self { tx }
    }

    /// Enqueue a notification. Never blocks and never fails the caller:
    /// a full or closed queue is logged and the notification dropped.
    pub fn dispatch(&self, notification: Notification) {
        if let Err(e) = self.tx.try_send(notification) {
            tracing::warn!(error = %e, "notification queue rejected, dropping");
        }
    }
}

/// Create the jobs-changed broadcast channel.
pub fn jobs_changed_channel() -> broadcast::Sender<JobsChanged> {
    let (tx, _rx) = broadcast::channel(64);
    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingSink {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn deliver(&self, _n: &Notification) -> Result<(), DatabaseError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(DatabaseError::Pool("sink down".to_string()))
        }
    }

    fn sample() -> Notification {
        Notification {
            kind: NotificationKind::StatusChanged,
            message: "status changed".to_string(),
            job_id: Uuid::new_v4(),
            recipient_ids: vec![],
            recipient_roles: vec![Role::Admin],
            exclude_actor_id: None,
        }
    }

    #[tokio::test]
    async fn sink_failure_never_reaches_the_dispatcher() {
        let sink = Arc::new(FailingSink { attempts: AtomicUsize::new(0) });
        let notifier = Notifier::spawn(sink.clone());

        // dispatch is infallible by construction
        notifier.dispatch(sample());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn broadcast_send_without_receivers_is_fine() {
        let tx = jobs_changed_channel();
        // No subscribers yet; send error is expected and ignored.
        assert!(tx.send(JobsChanged).is_err());

        let mut rx = tx.subscribe();
        tx.send(JobsChanged).unwrap();
        assert!(rx.recv().await.is_ok());
    }
}
