use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use super::wrappers::{
    EditableComposition, EditableContext, EditableInstantiation, EditablePersistence,
};
use super::{EditorCapability, WeakCache};
use crate::capabilities::{
    Capability, CapabilitySet, COMPOSITION, CONTEXT, EDITOR, INSTANTIATION, PERSISTENCE,
};
use crate::models::ModelHandle;
use crate::objects::{DomainObject, DomainObjectRef, ObjectHandle};

/// A session-scoped working copy of a domain object.
///
/// Holds a clone of the original's model taken when the object entered the
/// session. Capabilities are rebuilt against this wrapper, so mutation edits
/// the clone, and the traversal capabilities route whatever they return
/// back through the session.
pub struct EditableDomainObject {
    original: DomainObjectRef,
    model: ModelHandle,
    capabilities: CapabilitySet,
    wrapped: Mutex<HashMap<&'static str, Capability>>,
    cache: WeakCache,
    this: Weak<dyn DomainObject>,
}

impl EditableDomainObject {
    pub(crate) fn new(original: DomainObjectRef, cache: WeakCache) -> Arc<Self> {
        let model = ModelHandle::new(original.model());
        let capabilities = original.capabilities();
        Arc::new_cyclic(|this: &Weak<EditableDomainObject>| {
            let this: Weak<dyn DomainObject> = this.clone();
            Self {
                original,
                model,
                capabilities,
                wrapped: Mutex::new(HashMap::new()),
                cache,
                this,
            }
        })
    }

    fn handle(&self) -> ObjectHandle {
        ObjectHandle::new(self.original.id(), self.this.clone())
    }

    /// Capabilities wrapped once and kept for the rest of the session.
    fn memoized(
        &self,
        name: &'static str,
        build: impl FnOnce() -> Option<Capability>,
    ) -> Option<Capability> {
        if let Some(existing) = self.wrapped.lock().expect("editable lock poisoned").get(name) {
            return Some(existing.clone());
        }
        let capability = build()?;
        Some(
            self.wrapped
                .lock()
                .expect("editable lock poisoned")
                .entry(name)
                .or_insert(capability)
                .clone(),
        )
    }

    pub(crate) fn editor_capability(&self) -> Option<Arc<EditorCapability>> {
        self.capability(EDITOR)?.as_editor()
    }

    /// Drop wrapped capabilities, breaking references back into the session.
    pub(crate) fn release(&self) {
        self.wrapped.lock().expect("editable lock poisoned").clear();
    }
}

impl DomainObject for EditableDomainObject {
    fn id(&self) -> &str {
        self.original.id()
    }

    fn model_handle(&self) -> ModelHandle {
        self.model.clone()
    }

    fn capability(&self, name: &str) -> Option<Capability> {
        match name {
            // Save and cancel act on the real object's persistence
            EDITOR => self.memoized(EDITOR, || {
                let persistence = self.original.persistence()?;
                Some(Capability::Editor(Arc::new(EditorCapability::new(
                    self.handle(),
                    self.original.clone(),
                    persistence,
                    self.cache.clone(),
                ))))
            }),
            CONTEXT => {
                let delegate = self.original.context()?;
                Some(Capability::Context(Arc::new(EditableContext::new(
                    delegate,
                    self.cache.clone(),
                ))))
            }
            COMPOSITION => self.memoized(COMPOSITION, || {
                let delegate = self
                    .capabilities
                    .get(COMPOSITION, || self.handle())?
                    .as_composition()?;
                Some(Capability::Composition(Arc::new(EditableComposition::new(
                    delegate,
                    self.cache.clone(),
                ))))
            }),
            PERSISTENCE => self.memoized(PERSISTENCE, || {
                let delegate = self.original.persistence()?;
                Some(Capability::Persistence(Arc::new(EditablePersistence::new(
                    self.original.id(),
                    delegate,
                    self.cache.clone(),
                ))))
            }),
            INSTANTIATION => {
                let delegate = self
                    .capabilities
                    .get(INSTANTIATION, || self.handle())?
                    .as_instantiation()?;
                Some(Capability::Instantiation(Arc::new(EditableInstantiation::new(
                    delegate,
                    self.cache.clone(),
                ))))
            }
            _ => self.capabilities.get(name, || self.handle()),
        }
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities.unbound()
    }

    fn original(&self) -> Option<DomainObjectRef> {
        Some(self.original.clone())
    }
}
