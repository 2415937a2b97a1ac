//! Listener registries for change notification.
//!
//! A [`Topic`] is a list of callbacks; [`TopicRegistry`] maps string keys to
//! topics. Registries are owned by the [`Runtime`](crate::runtime::Runtime)
//! rather than living in statics, so tearing the runtime down drops every
//! listener with it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::models::Model;
use crate::objects::DomainObjectRef;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct TopicInner<T> {
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_id: AtomicU64,
}

/// A publish/subscribe channel with synchronous delivery.
pub struct Topic<T> {
    inner: Arc<TopicInner<T>>,
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Default for Topic<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Topic<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TopicInner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register a listener. It stays registered until the returned
    /// subscription is dropped or unsubscribed.
    pub fn listen(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .expect("topic lock poisoned")
            .push((id, Arc::new(listener)));

        let weak: Weak<TopicInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .listeners
                    .lock()
                    .expect("topic lock poisoned")
                    .retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    /// Deliver `message` to every current listener.
    ///
    /// Listeners run outside the lock, so they may subscribe or unsubscribe
    /// while being notified.
    pub fn notify(&self, message: &T) {
        let listeners: Vec<Listener<T>> = self
            .inner
            .listeners
            .lock()
            .expect("topic lock poisoned")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(message);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().expect("topic lock poisoned").len()
    }

    fn clear(&self) {
        self.inner.listeners.lock().expect("topic lock poisoned").clear();
    }
}

/// Handle returned by listener registration.
///
/// Dropping it unsubscribes the listener.
#[must_use = "dropping a subscription unsubscribes the listener"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }

    /// Keep the listener registered for the lifetime of its topic.
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

/// Topics addressed by string key, created on first use.
pub struct TopicRegistry<T> {
    topics: Mutex<HashMap<String, Topic<T>>>,
}

impl<T: 'static> Default for TopicRegistry<T> {
    fn default() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: 'static> TopicRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic(&self, key: &str) -> Topic<T> {
        self.topics
            .lock()
            .expect("topic registry lock poisoned")
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Notify a topic without creating it when nobody listens.
    pub fn notify(&self, key: &str, message: &T) {
        let topic = self
            .topics
            .lock()
            .expect("topic registry lock poisoned")
            .get(key)
            .cloned();
        if let Some(topic) = topic {
            topic.notify(message);
        }
    }

    /// Drop every listener on every topic.
    pub fn clear(&self) {
        let topics: Vec<Topic<T>> = self
            .topics
            .lock()
            .expect("topic registry lock poisoned")
            .drain()
            .map(|(_, topic)| topic)
            .collect();
        for topic in topics {
            topic.clear();
        }
    }
}

/// The mutation channels: one general topic carrying the mutated object and
/// one topic per id carrying the new model.
#[derive(Default)]
pub struct MutationTopics {
    general: Topic<DomainObjectRef>,
    by_id: TopicRegistry<Model>,
}

impl MutationTopics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for mutations of any object.
    pub fn listen_all(
        &self,
        listener: impl Fn(&DomainObjectRef) + Send + Sync + 'static,
    ) -> Subscription {
        self.general.listen(listener)
    }

    /// Listen for mutations of the object with `id`.
    pub fn listen(
        &self,
        id: &str,
        listener: impl Fn(&Model) + Send + Sync + 'static,
    ) -> Subscription {
        self.by_id.topic(&mutation_key(id)).listen(listener)
    }

    pub(crate) fn notify(&self, domain_object: &DomainObjectRef, model: &Model) {
        self.general.notify(domain_object);
        self.by_id.notify(&mutation_key(domain_object.id()), model);
    }

    pub fn clear(&self) {
        self.general.clear();
        self.by_id.clear();
    }
}

fn mutation_key(id: &str) -> String {
    format!("mutation:{}", id)
}
