// =====================================================================================
// AUDIT LOG - ASYNCHRONOUS ACTIVITY LOG DELIVERY
// =====================================================================================

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use shared_database::{ClinicRepository, StoreError};
use shared_models::{Actor, ActivityLogEntry};

use crate::models::AuditAction;

const RETRY_BACKOFF_MS: u64 = 20;

/// Destination for activity log entries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &ActivityLogEntry) -> Result<(), StoreError>;
}

/// Writes entries to the repository's activity log table.
pub struct RepositoryAuditSink {
    repository: Arc<dyn ClinicRepository>,
}

impl RepositoryAuditSink {
    pub fn new(repository: Arc<dyn ClinicRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl AuditSink for RepositoryAuditSink {
    async fn append(&self, entry: &ActivityLogEntry) -> Result<(), StoreError> {
        self.repository.append_activity(entry).await
    }
}

enum AuditCommand {
    Record(ActivityLogEntry),
    Flush(oneshot::Sender<()>),
}

/// Handle used by services to record completed mutations.
///
/// Recording never fails the caller: entries are queued and written by an
/// [`AuditWorker`] in submission order. Delivery is at-least-once and each
/// entry carries a stable id, so a duplicate write is treated as delivered.
#[derive(Clone)]
pub struct AuditLog {
    sender: mpsc::UnboundedSender<AuditCommand>,
}

impl AuditLog {
    /// Creates the handle and the worker that drains it. The worker must be
    /// driven by the caller, usually with `tokio::spawn(worker.run())`.
    pub fn new(sink: Arc<dyn AuditSink>, max_attempts: u32) -> (Self, AuditWorker) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = AuditWorker {
            sink,
            receiver,
            max_attempts: max_attempts.max(1),
        };
        (Self { sender }, worker)
    }

    pub fn spawn(sink: Arc<dyn AuditSink>, max_attempts: u32) -> Self {
        let (log, worker) = Self::new(sink, max_attempts);
        tokio::spawn(worker.run());
        log
    }

    /// Queues an entry attributed to `actor`. Returns the entry id.
    pub fn record(&self, actor: &Actor, action: AuditAction, details: Value) -> Uuid {
        let entry = ActivityLogEntry {
            id: Uuid::new_v4(),
            user_id: actor.id,
            user_name: actor.display_name.clone(),
            action_type: action.as_str().to_string(),
            details,
            created_at: Utc::now(),
        };
        let id = entry.id;

        debug!(entry_id = %id, action = %action, actor_id = %actor.id, "Queued activity log entry");

        if self.sender.send(AuditCommand::Record(entry)).is_err() {
            error!(entry_id = %id, action = %action, "Audit worker is gone; activity log entry dropped");
        }
        id
    }

    /// Waits until every entry recorded before this call has been handled.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(AuditCommand::Flush(ack)).is_err() {
            warn!("Audit worker is gone; nothing to flush");
            return;
        }
        let _ = done.await;
    }
}

pub struct AuditWorker {
    sink: Arc<dyn AuditSink>,
    receiver: mpsc::UnboundedReceiver<AuditCommand>,
    max_attempts: u32,
}

impl AuditWorker {
    /// Runs until every [`AuditLog`] handle has been dropped.
    pub async fn run(mut self) {
        info!("Audit worker started");

        while let Some(command) = self.receiver.recv().await {
            match command {
                AuditCommand::Record(entry) => self.deliver(entry).await,
                AuditCommand::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }

        info!("Audit worker stopped");
    }

    #[instrument(skip(self, entry), fields(entry_id = %entry.id, action = %entry.action_type))]
    async fn deliver(&self, entry: ActivityLogEntry) {
        for attempt in 1..=self.max_attempts {
            match self.sink.append(&entry).await {
                Ok(()) | Err(StoreError::DuplicateId(_)) => return,
                Err(e) if attempt < self.max_attempts => {
                    warn!("Activity log write failed (attempt {}/{}): {}", attempt, self.max_attempts, e);
                    sleep(Duration::from_millis(RETRY_BACKOFF_MS * attempt as u64)).await;
                }
                Err(e) => {
                    error!(
                        user_id = %entry.user_id,
                        details = %entry.details,
                        "Activity log entry lost after {} attempts: {}",
                        self.max_attempts,
                        e
                    );
                }
            }
        }
    }
}
