use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use super::{FailureHandler, FailureResolution, PendingBatch, PersistenceQueue, QueueEntry};
use crate::capabilities::PersistenceCapability;
use crate::error::ObjectError;
use crate::objects::DomainObjectRef;

/// An entry written successfully in a batch.
#[derive(Clone)]
pub struct PersistedItem {
    pub id: String,
    pub domain_object: DomainObjectRef,
}

impl fmt::Debug for PersistedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedItem").field("id", &self.id).finish()
    }
}

/// An entry whose write failed, with enough context to retry it.
pub struct PersistenceFailure {
    pub id: String,
    pub domain_object: DomainObjectRef,
    pub persistence: Arc<dyn PersistenceCapability>,
    pub error: ObjectError,
    /// How many times this entry has been flushed, starting at 1.
    pub attempt: u32,
    queue: PersistenceQueue,
}

impl PersistenceFailure {
    /// Put the entry back on the queue it failed in.
    pub fn requeue(&self) -> PendingBatch {
        self.queue.put_attempt(
            self.domain_object.clone(),
            Arc::clone(&self.persistence),
            self.attempt + 1,
        )
    }
}

impl fmt::Debug for PersistenceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceFailure")
            .field("id", &self.id)
            .field("error", &self.error)
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// The outcome of one flush.
///
/// A batch with failures still resolves normally; the failures are listed
/// here and were already handed to the failure handler.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub persisted: Vec<PersistedItem>,
    pub failures: Vec<PersistenceFailure>,
    /// What the failure handler did, when there were failures.
    pub resolution: Option<FailureResolution>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_for(&self, id: &str) -> Option<&PersistenceFailure> {
        self.failures.iter().find(|failure| failure.id == id)
    }

    pub fn persisted_ids(&self) -> Vec<&str> {
        self.persisted.iter().map(|item| item.id.as_str()).collect()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|failure| failure.id.as_str()).collect()
    }
}

/// Persist every entry concurrently. One entry failing never stops the
/// others.
pub(super) async fn persist_batch(
    entries: BTreeMap<String, QueueEntry>,
    queue: &PersistenceQueue,
    handler: &dyn FailureHandler,
) -> BatchReport {
    let results = join_all(entries.into_iter().map(|(id, entry)| async move {
        let result = entry.persistence.persist().await;
        (id, entry, result)
    }))
    .await;

    let mut report = BatchReport::default();
    for (id, entry, result) in results {
        match result {
            Ok(()) => report.persisted.push(PersistedItem {
                id,
                domain_object: entry.domain_object,
            }),
            Err(error) => {
                warn!(id = %id, attempt = entry.attempt, "Failed to persist object: {}", error);
                report.failures.push(PersistenceFailure {
                    id,
                    domain_object: entry.domain_object,
                    persistence: entry.persistence,
                    error,
                    attempt: entry.attempt,
                    queue: queue.clone(),
                });
            }
        }
    }

    if !report.failures.is_empty() {
        report.resolution = Some(handler.handle(&report.failures).await);
    }

    info!(
        persisted = report.persisted.len(),
        failed = report.failures.len(),
        "Persistence batch complete"
    );
    report
}
