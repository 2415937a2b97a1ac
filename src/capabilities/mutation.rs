use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::models::Model;
use crate::objects::ObjectHandle;
use crate::topic::{MutationTopics, Subscription};

/// What a mutator decided to do with the working copy it was handed.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Keep the edits made to the working copy.
    Apply,
    /// Discard the working copy and use this model instead.
    Replace(Model),
    /// Leave the model untouched.
    Cancel,
}

/// The only sanctioned way to change a model.
///
/// Every applied mutation bumps `modified` and is announced on the runtime's
/// mutation topics.
pub struct MutationCapability {
    handle: ObjectHandle,
    topics: Arc<MutationTopics>,
}

impl MutationCapability {
    pub fn new(handle: ObjectHandle, topics: Arc<MutationTopics>) -> Self {
        Self { handle, topics }
    }

    /// Run `mutator` against a copy of the current model and swap the result
    /// in. `modified` becomes `timestamp` when one is given, otherwise a clock
    /// value strictly greater than the previous one.
    ///
    /// Returns `false` when the mutator cancels or the object is gone.
    pub fn mutate<F>(&self, mutator: F, timestamp: Option<i64>) -> bool
    where
        F: FnOnce(&mut Model) -> Mutation,
    {
        let object = match self.handle.upgrade() {
            Ok(object) => object,
            Err(err) => {
                warn!(id = self.handle.id(), "Mutation skipped: {}", err);
                return false;
            }
        };

        let model_handle = object.model_handle();
        let previous = model_handle.snapshot();
        let mut working = previous.clone();
        let mut next = match mutator(&mut working) {
            Mutation::Apply => working,
            Mutation::Replace(model) => model,
            Mutation::Cancel => return false,
        };

        let modified = timestamp.unwrap_or_else(|| next_timestamp(previous.modified()));
        next.set_modified(modified);
        model_handle.replace(next.clone());
        debug!(id = object.id(), modified, "Mutated model");

        self.topics.notify(&object, &next);
        true
    }

    /// Listen for mutations of this object.
    pub fn listen(&self, listener: impl Fn(&Model) + Send + Sync + 'static) -> Subscription {
        self.topics.listen(self.handle.id(), listener)
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn next_timestamp(previous: Option<i64>) -> i64 {
    let now = now_millis();
    match previous {
        Some(previous) if previous >= now => previous + 1,
        _ => now,
    }
}
