//! Debounced, batched persistence.
//!
//! # Phases
//!
//! The queue moves through [`QueuePhase::Idle`], [`QueuePhase::Accumulating`]
//! and [`QueuePhase::Flushing`]. A `put` while idle arms a timer. When it
//! fires the queue is flushed only if no new ids arrived since the previous
//! observation; otherwise the size is recorded and the timer re-armed, so a
//! burst of writes spread over several ticks ends up in one batch.
//!
//! # Single-flight flushes
//!
//! At most one batch is in flight. Entries are taken out of the queue when a
//! flush starts, so anything `put` while it runs waits for the next batch.
//! Scheduling attempts made during a flush are remembered and re-evaluated
//! once it settles.

mod failure;
mod handler;

pub use failure::{
    FailureHandler, FailurePolicy, FailureResolution, LoggingFailureHandler, PolicyFailureHandler,
};
pub use handler::{BatchReport, PersistedItem, PersistenceFailure};

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::capabilities::PersistenceCapability;
use crate::error::{ObjectError, ObjectResult};
use crate::objects::DomainObjectRef;

/// Default quiescence check interval.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(0);

type FlushFuture = Shared<BoxFuture<'static, Arc<BatchReport>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePhase {
    Idle,
    Accumulating,
    Flushing,
}

pub(crate) struct QueueEntry {
    pub(crate) domain_object: DomainObjectRef,
    pub(crate) persistence: Arc<dyn PersistenceCapability>,
    pub(crate) attempt: u32,
}

#[derive(Default)]
struct QueueState {
    entries: BTreeMap<String, QueueEntry>,
    queue_size: usize,
    last_observed_size: usize,
    timer_armed: bool,
    awaiting_flush: bool,
    in_flight: Option<FlushFuture>,
    waiters: Vec<oneshot::Sender<Arc<BatchReport>>>,
}

struct QueueInner {
    delay: Duration,
    handler: Arc<dyn FailureHandler>,
    state: Mutex<QueueState>,
}

/// Coalesces persistence requests into batched flushes.
#[derive(Clone)]
pub struct PersistenceQueue {
    inner: Arc<QueueInner>,
}

impl PersistenceQueue {
    pub fn new(delay: Duration, handler: Arc<dyn FailureHandler>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                delay,
                handler,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Queue `domain_object` for persistence through `persistence`.
    ///
    /// A later `put` for the same id before the flush replaces this one. The
    /// returned future resolves with the report of the batch that carried the
    /// entry. Must be called within a tokio runtime.
    pub fn put(
        &self,
        domain_object: DomainObjectRef,
        persistence: Arc<dyn PersistenceCapability>,
    ) -> PendingBatch {
        self.put_attempt(domain_object, persistence, 1)
    }

    pub(crate) fn put_attempt(
        &self,
        domain_object: DomainObjectRef,
        persistence: Arc<dyn PersistenceCapability>,
        attempt: u32,
    ) -> PendingBatch {
        let (sender, receiver) = oneshot::channel();
        {
            let mut state = self.lock();
            let id = domain_object.id().to_string();
            let entry = QueueEntry {
                domain_object,
                persistence,
                attempt,
            };
            if state.entries.insert(id.clone(), entry).is_none() {
                state.queue_size += 1;
            }
            state.waiters.push(sender);
            debug!(id = %id, queued = state.queue_size, "Queued object for persistence");
            self.schedule_flush(&mut state);
        }
        PendingBatch { receiver }
    }

    /// Flush whatever is queued now, without waiting for quiescence.
    ///
    /// Waits for any in-flight batch first. Resolves with an empty report
    /// when nothing was queued.
    pub async fn flush(&self) -> Arc<BatchReport> {
        loop {
            let (flush, started) = {
                let mut state = self.lock();
                match state.in_flight.clone() {
                    Some(in_flight) => (in_flight, false),
                    None if state.entries.is_empty() => {
                        return Arc::new(BatchReport::default());
                    }
                    None => (self.start_flush(&mut state), true),
                }
            };
            let report = flush.await;
            if started {
                return report;
            }
        }
    }

    pub fn phase(&self) -> QueuePhase {
        let state = self.lock();
        if state.in_flight.is_some() {
            QueuePhase::Flushing
        } else if state.entries.is_empty() {
            QueuePhase::Idle
        } else {
            QueuePhase::Accumulating
        }
    }

    /// Number of distinct ids waiting for the next flush.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.inner.state.lock().expect("persistence queue lock poisoned")
    }

    fn schedule_flush(&self, state: &mut QueueState) {
        if state.in_flight.is_some() {
            state.awaiting_flush = true;
            return;
        }
        if state.timer_armed {
            return;
        }
        state.timer_armed = true;
        let queue = self.clone();
        let delay = self.inner.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.maybe_flush();
        });
    }

    /// Timer callback: flush if the queue has stopped growing.
    fn maybe_flush(&self) {
        let mut state = self.lock();
        state.timer_armed = false;
        if state.in_flight.is_some() {
            state.awaiting_flush = true;
            return;
        }
        if state.entries.is_empty() {
            state.queue_size = 0;
            state.last_observed_size = 0;
            return;
        }
        if state.queue_size == state.last_observed_size {
            let _flush = self.start_flush(&mut state);
        } else {
            state.last_observed_size = state.queue_size;
            self.schedule_flush(&mut state);
        }
    }

    fn start_flush(&self, state: &mut QueueState) -> FlushFuture {
        let entries = std::mem::take(&mut state.entries);
        let waiters = std::mem::take(&mut state.waiters);
        state.queue_size = 0;
        state.last_observed_size = 0;
        info!(count = entries.len(), "Flushing persistence queue");

        let queue = self.clone();
        let flush = async move {
            let report = Arc::new(
                handler::persist_batch(entries, &queue, queue.inner.handler.as_ref()).await,
            );
            let resume = {
                let mut state = queue.lock();
                state.in_flight = None;
                std::mem::take(&mut state.awaiting_flush)
            };
            for waiter in waiters {
                let _ = waiter.send(Arc::clone(&report));
            }
            if resume {
                let mut state = queue.lock();
                queue.schedule_flush(&mut state);
            }
            report
        }
        .boxed()
        .shared();

        state.in_flight = Some(flush.clone());
        tokio::spawn(flush.clone());
        flush
    }
}

/// Resolves with the report of the batch an entry was flushed in.
#[must_use = "the batch report is only observable by awaiting it"]
pub struct PendingBatch {
    receiver: oneshot::Receiver<Arc<BatchReport>>,
}

impl Future for PendingBatch {
    type Output = ObjectResult<Arc<BatchReport>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.map_err(|_| ObjectError::QueueClosed))
    }
}
