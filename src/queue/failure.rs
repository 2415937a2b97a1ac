use async_trait::async_trait;
use tracing::{error, info, warn};

use super::PersistenceFailure;

/// Decides what happens to the failed entries of a batch.
///
/// Called once per batch that had at least one failure. Handlers must not
/// await requeued entries: those flush only after the current batch settles.
#[async_trait]
pub trait FailureHandler: Send + Sync {
    async fn handle(&self, failures: &[PersistenceFailure]) -> FailureResolution;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureResolution {
    /// Failures were reported and dropped.
    Dismissed,
    /// This many entries were put back on the queue.
    Requeued(usize),
    /// This many objects were reloaded from storage, discarding local changes.
    Discarded(usize),
}

/// Logs every failure and drops it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingFailureHandler;

#[async_trait]
impl FailureHandler for LoggingFailureHandler {
    async fn handle(&self, failures: &[PersistenceFailure]) -> FailureResolution {
        for failure in failures {
            error!(
                id = %failure.id,
                attempt = failure.attempt,
                "Object could not be persisted: {}",
                failure.error
            );
        }
        FailureResolution::Dismissed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Write the local version again.
    Overwrite,
    /// Keep the stored version and reload it.
    Discard,
}

/// Applies one fixed policy to every failure.
#[derive(Debug, Clone)]
pub struct PolicyFailureHandler {
    policy: FailurePolicy,
    max_attempts: u32,
}

impl PolicyFailureHandler {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Stop overwriting an entry once it has failed this many times.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

#[async_trait]
impl FailureHandler for PolicyFailureHandler {
    async fn handle(&self, failures: &[PersistenceFailure]) -> FailureResolution {
        match self.policy {
            FailurePolicy::Overwrite => {
                let mut requeued = 0;
                for failure in failures {
                    if failure.attempt >= self.max_attempts {
                        error!(
                            id = %failure.id,
                            attempts = failure.attempt,
                            "Giving up on object: {}",
                            failure.error
                        );
                        continue;
                    }
                    let _ = failure.requeue();
                    requeued += 1;
                }
                info!(requeued, "Requeued failed objects for overwrite");
                FailureResolution::Requeued(requeued)
            }
            FailurePolicy::Discard => {
                let mut discarded = 0;
                for failure in failures {
                    match failure.persistence.refresh().await {
                        Ok(()) => discarded += 1,
                        Err(err) => warn!(id = %failure.id, "Could not reload object: {}", err),
                    }
                }
                FailureResolution::Discarded(discarded)
            }
        }
    }
}
