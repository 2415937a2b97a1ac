use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use manifest_objects::capabilities::PersistenceCapability;
use manifest_objects::queue::{
    FailureHandler, FailurePolicy, FailureResolution, LoggingFailureHandler, PersistenceFailure,
    PersistenceQueue, PolicyFailureHandler, QueuePhase,
};
use manifest_objects::{DomainObjectRef, Model, ObjectError, ObjectResult, Runtime, RuntimeConfig};
use tokio::sync::Notify;

type Log = Arc<Mutex<Vec<String>>>;

/// Persistence double that logs each write under a label.
struct Recorder {
    label: String,
    log: Log,
    failures_left: AtomicUsize,
    refreshed: Arc<AtomicUsize>,
    gate: Option<Arc<Notify>>,
}

impl Recorder {
    fn new(label: &str, log: &Log) -> Self {
        Self {
            label: label.to_string(),
            log: Arc::clone(log),
            failures_left: AtomicUsize::new(0),
            refreshed: Arc::new(AtomicUsize::new(0)),
            gate: None,
        }
    }

    fn failing(mut self, times: usize) -> Self {
        self.failures_left = AtomicUsize::new(times);
        self
    }

    fn gated(mut self, gate: &Arc<Notify>) -> Self {
        self.gate = Some(Arc::clone(gate));
        self
    }

    fn into_arc(self) -> Arc<dyn PersistenceCapability> {
        Arc::new(self)
    }
}

#[async_trait]
impl PersistenceCapability for Recorder {
    async fn persist(&self) -> ObjectResult<()> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.log.lock().unwrap().push(self.label.clone());
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ObjectError::Persistence {
                id: self.label.clone(),
                message: "rejected".to_string(),
            });
        }
        Ok(())
    }

    async fn refresh(&self) -> ObjectResult<()> {
        self.refreshed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn space(&self) -> String {
        "mct".to_string()
    }
}

/// Failure handler that only records what it was given.
#[derive(Default)]
struct RecordingHandler {
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl FailureHandler for RecordingHandler {
    async fn handle(&self, failures: &[PersistenceFailure]) -> FailureResolution {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .extend(failures.iter().map(|failure| failure.id.clone()));
        FailureResolution::Dismissed
    }
}

fn objects(ids: &[&str]) -> (Runtime, Vec<DomainObjectRef>) {
    let runtime = Runtime::builder(RuntimeConfig::default()).build();
    let objects = ids
        .iter()
        .map(|id| {
            runtime
                .provider()
                .instantiate(*id, Model::new().with("name", *id))
                .unwrap()
        })
        .collect();
    (runtime, objects)
}

fn queue(handler: Arc<dyn FailureHandler>) -> PersistenceQueue {
    PersistenceQueue::new(Duration::ZERO, handler)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

mod batching {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn repeated_puts_coalesce_to_the_latest_entry() {
        let (_runtime, objects) = objects(&["mct:a"]);
        let log: Log = Default::default();
        let queue = queue(Arc::new(LoggingFailureHandler));

        let first = queue.put(objects[0].clone(), Recorder::new("first", &log).into_arc());
        let second = queue.put(objects[0].clone(), Recorder::new("second", &log).into_arc());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.phase(), QueuePhase::Accumulating);

        let (first, second) = (first.await.unwrap(), second.await.unwrap());

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.persisted_ids(), vec!["mct:a"]);
        assert_eq!(*log.lock().unwrap(), vec!["second".to_string()]);
        assert_eq!(queue.phase(), QueuePhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn puts_in_one_burst_share_a_batch() {
        let (_runtime, objects) = objects(&["mct:a", "mct:b", "mct:c"]);
        let log: Log = Default::default();
        let queue = queue(Arc::new(LoggingFailureHandler));

        let pending: Vec<_> = objects
            .iter()
            .map(|object| queue.put(object.clone(), Recorder::new(object.id(), &log).into_arc()))
            .collect();
        let reports = futures::future::try_join_all(pending).await.unwrap();

        assert!(reports.iter().all(|report| Arc::ptr_eq(report, &reports[0])));
        assert_eq!(reports[0].persisted_ids(), vec!["mct:a", "mct:b", "mct:c"]);
        assert!(reports[0].is_success());
        assert_eq!(reports[0].resolution, None);
    }

    #[tokio::test(start_paused = true)]
    async fn puts_spread_over_timer_ticks_share_a_batch() {
        let (_runtime, objects) = objects(&["mct:a", "mct:b", "mct:c"]);
        let log: Log = Default::default();
        let queue = queue(Arc::new(LoggingFailureHandler));

        let first = queue.put(objects[0].clone(), Recorder::new("mct:a", &log).into_arc());
        tokio::time::sleep(Duration::ZERO).await;
        let second = queue.put(objects[1].clone(), Recorder::new("mct:b", &log).into_arc());
        tokio::time::sleep(Duration::ZERO).await;
        let third = queue.put(objects[2].clone(), Recorder::new("mct:c", &log).into_arc());

        let first = first.await.unwrap();
        let (second, third) = (second.await.unwrap(), third.await.unwrap());

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &third));
        assert_eq!(first.persisted_ids(), vec!["mct:a", "mct:b", "mct:c"]);
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn puts_during_a_flush_wait_for_the_next_batch() {
        let (_runtime, objects) = objects(&["mct:a", "mct:b"]);
        let log: Log = Default::default();
        let gate = Arc::new(Notify::new());
        let queue = queue(Arc::new(LoggingFailureHandler));

        let first = queue.put(
            objects[0].clone(),
            Recorder::new("mct:a", &log).gated(&gate).into_arc(),
        );
        settle().await;
        assert_eq!(queue.phase(), QueuePhase::Flushing);

        let second = queue.put(objects[1].clone(), Recorder::new("mct:b", &log).into_arc());
        settle().await;
        assert_eq!(queue.len(), 1);
        assert!(log.lock().unwrap().is_empty());

        gate.notify_one();
        let first = first.await.unwrap();
        let second = second.await.unwrap();

        assert_eq!(first.persisted_ids(), vec!["mct:a"]);
        assert_eq!(second.persisted_ids(), vec!["mct:b"]);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["mct:a".to_string(), "mct:b".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn flush_does_not_wait_for_quiescence() {
        let (_runtime, objects) = objects(&["mct:a"]);
        let log: Log = Default::default();
        let queue = PersistenceQueue::new(Duration::from_secs(60), Arc::new(LoggingFailureHandler));

        let pending = queue.put(objects[0].clone(), Recorder::new("mct:a", &log).into_arc());
        let report = queue.flush().await;

        assert_eq!(report.persisted_ids(), vec!["mct:a"]);
        assert!(Arc::ptr_eq(&report, &pending.await.unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn flushing_an_empty_queue_reports_nothing() {
        let queue = queue(Arc::new(LoggingFailureHandler));
        let report = queue.flush().await;
        assert!(report.is_success());
        assert!(report.persisted.is_empty());
        assert_eq!(queue.phase(), QueuePhase::Idle);
    }
}

mod failures {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn one_failure_does_not_stop_the_batch() {
        let (_runtime, objects) = objects(&["mct:a", "mct:b", "mct:c"]);
        let log: Log = Default::default();
        let handler = Arc::new(RecordingHandler::default());
        let queue = queue(handler.clone());

        let pending: Vec<_> = objects
            .iter()
            .map(|object| {
                let recorder = Recorder::new(object.id(), &log);
                let recorder = if object.id() == "mct:b" {
                    recorder.failing(1)
                } else {
                    recorder
                };
                queue.put(object.clone(), recorder.into_arc())
            })
            .collect();
        let reports = futures::future::try_join_all(pending).await.unwrap();
        let report = &reports[0];

        assert_eq!(report.persisted_ids(), vec!["mct:a", "mct:c"]);
        assert_eq!(report.failed_ids(), vec!["mct:b"]);
        assert_eq!(report.failure_for("mct:b").unwrap().attempt, 1);
        assert_eq!(report.resolution, Some(FailureResolution::Dismissed));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*handler.seen.lock().unwrap(), vec!["mct:b".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn requeued_failures_go_out_in_a_later_batch() {
        let (_runtime, objects) = objects(&["mct:a"]);
        let log: Log = Default::default();
        let handler = Arc::new(RecordingHandler::default());
        let queue = queue(handler);

        let first = queue
            .put(objects[0].clone(), Recorder::new("mct:a", &log).failing(1).into_arc())
            .await
            .unwrap();
        let failure = first.failure_for("mct:a").unwrap();

        let retried = failure.requeue().await.unwrap();

        assert!(retried.is_success());
        assert_eq!(retried.persisted_ids(), vec!["mct:a"]);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_policy_retries_until_it_succeeds() {
        let (_runtime, objects) = objects(&["mct:a"]);
        let log: Log = Default::default();
        let queue = queue(Arc::new(PolicyFailureHandler::new(FailurePolicy::Overwrite)));

        let report = queue
            .put(objects[0].clone(), Recorder::new("mct:a", &log).failing(1).into_arc())
            .await
            .unwrap();
        assert_eq!(report.resolution, Some(FailureResolution::Requeued(1)));

        settle().await;
        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(queue.phase(), QueuePhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_policy_gives_up_after_max_attempts() {
        let (_runtime, objects) = objects(&["mct:a"]);
        let log: Log = Default::default();
        let handler = PolicyFailureHandler::new(FailurePolicy::Overwrite).with_max_attempts(2);
        let queue = queue(Arc::new(handler));

        let pending = queue.put(
            objects[0].clone(),
            Recorder::new("mct:a", &log).failing(usize::MAX).into_arc(),
        );
        let report = pending.await.unwrap();
        assert_eq!(report.failure_for("mct:a").unwrap().attempt, 1);

        settle().await;
        assert_eq!(log.lock().unwrap().len(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.phase(), QueuePhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn discard_policy_reloads_the_stored_copy() {
        let (_runtime, objects) = objects(&["mct:a"]);
        let log: Log = Default::default();
        let queue = queue(Arc::new(PolicyFailureHandler::new(FailurePolicy::Discard)));
        let recorder = Recorder::new("mct:a", &log).failing(1);
        let refreshed = Arc::clone(&recorder.refreshed);

        let report = queue
            .put(objects[0].clone(), recorder.into_arc())
            .await
            .unwrap();

        assert_eq!(report.resolution, Some(FailureResolution::Discarded(1)));
        assert_eq!(refreshed.load(Ordering::SeqCst), 1);
        settle().await;
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
