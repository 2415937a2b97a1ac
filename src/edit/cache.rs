use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::future::try_join_all;
use tracing::{debug, info};

use super::EditableDomainObject;
use crate::error::{ObjectError, ObjectResult};
use crate::objects::DomainObjectRef;

#[derive(Default)]
struct CacheState {
    order: Vec<String>,
    entries: HashMap<String, Arc<EditableDomainObject>>,
    root: Option<String>,
    dirty: HashSet<String>,
}

struct CacheInner {
    state: Mutex<CacheState>,
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            for entry in state.entries.values() {
                entry.release();
            }
        }
    }
}

/// One edit session's identity map from id to editable wrapper.
#[derive(Clone)]
pub struct EditableObjectCache {
    inner: Arc<CacheInner>,
}

impl Default for EditableObjectCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EditableObjectCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner.state.lock().expect("edit cache lock poisoned")
    }

    pub(crate) fn downgrade(&self) -> WeakCache {
        WeakCache(Arc::downgrade(&self.inner))
    }

    /// The session's editable wrapper for `domain_object`'s id, creating it
    /// from `domain_object` on first sight.
    ///
    /// The entry is registered before any of its capabilities are wrapped,
    /// so lookups made while traversing from it, including ones that cycle
    /// back to the same id, find this entry instead of building another.
    pub fn get_editable_object(&self, domain_object: &DomainObjectRef) -> DomainObjectRef {
        self.editable(domain_object)
    }

    pub(crate) fn editable(&self, domain_object: &DomainObjectRef) -> Arc<EditableDomainObject> {
        let mut state = self.lock();
        let id = domain_object.id();
        if let Some(existing) = state.entries.get(id) {
            return Arc::clone(existing);
        }

        // Editables from other sessions are unwrapped so clones never nest
        let original = domain_object
            .original()
            .unwrap_or_else(|| domain_object.clone());
        let editable = EditableDomainObject::new(original, self.downgrade());
        state.entries.insert(id.to_string(), Arc::clone(&editable));
        state.order.push(id.to_string());
        if state.root.is_none() {
            state.root = Some(id.to_string());
        }
        debug!(id, entries = state.entries.len(), "Created editable object");
        editable
    }

    /// Whether `id` has an entry in this session.
    pub fn contains(&self, id: &str) -> bool {
        self.lock().entries.contains_key(id)
    }

    /// The first object wrapped in this session.
    pub fn root(&self) -> Option<DomainObjectRef> {
        let state = self.lock();
        let root = state.root.as_ref()?;
        state
            .entries
            .get(root)
            .map(|entry| Arc::clone(entry) as DomainObjectRef)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn mark_dirty(&self, id: &str) {
        self.lock().dirty.insert(id.to_string());
    }

    pub fn is_dirty(&self, id: &str) -> bool {
        self.lock().dirty.contains(id)
    }

    /// Whether anything in the session has been marked dirty.
    pub fn has_changes(&self) -> bool {
        !self.lock().dirty.is_empty()
    }

    pub(crate) fn mark_clean(&self, id: &str) {
        self.lock().dirty.remove(id);
    }

    /// Save every object wrapped in this session, in the order they were
    /// first reached, then mark the session clean.
    ///
    /// Objects without persistence are skipped. The first failure is
    /// returned once all saves have been attempted or one has failed.
    pub async fn save_all(&self) -> ObjectResult<()> {
        let entries: Vec<Arc<EditableDomainObject>> = {
            let state = self.lock();
            state
                .order
                .iter()
                .filter_map(|id| state.entries.get(id).cloned())
                .collect()
        };

        let editors: Vec<_> = entries
            .iter()
            .filter_map(|entry| entry.editor_capability())
            .collect();
        info!(objects = editors.len(), "Saving edit session");
        try_join_all(editors.iter().map(|editor| editor.save_object())).await?;

        self.lock().dirty.clear();
        Ok(())
    }

    /// End the session, discarding every working copy.
    pub fn close(&self) {
        let entries: Vec<Arc<EditableDomainObject>> = {
            let mut state = self.lock();
            state.order.clear();
            state.root = None;
            state.dirty.clear();
            state.entries.drain().map(|(_, entry)| entry).collect()
        };
        for entry in &entries {
            entry.release();
        }
        debug!(released = entries.len(), "Closed edit session");
    }
}

/// Back-reference from an editable to its session.
#[derive(Clone)]
pub(crate) struct WeakCache(Weak<CacheInner>);

impl WeakCache {
    pub(crate) fn upgrade(&self) -> ObjectResult<EditableObjectCache> {
        self.0
            .upgrade()
            .map(|inner| EditableObjectCache { inner })
            .ok_or(ObjectError::SessionClosed)
    }

    /// Route `domain_object` through the session, or hand it back unchanged
    /// once the session is gone.
    pub(crate) fn wrap(&self, domain_object: &DomainObjectRef) -> DomainObjectRef {
        match self.upgrade() {
            Ok(cache) => cache.get_editable_object(domain_object),
            Err(_) => domain_object.clone(),
        }
    }
}
