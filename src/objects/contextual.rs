use std::sync::{Arc, Weak};

use tracing::warn;

use super::{DomainObject, DomainObjectRef, ObjectHandle};
use crate::capabilities::{AccessContext, Capability, CapabilitySet, CONTEXT};
use crate::models::ModelHandle;

/// A view of a domain object as reached through a specific parent.
///
/// Shares the wrapped object's model. The `context` capability is replaced by
/// one recording `parent`; every other capability is rebuilt for this view.
pub struct ContextualDomainObject {
    inner: DomainObjectRef,
    context: Arc<AccessContext>,
    capabilities: CapabilitySet,
    this: Weak<dyn DomainObject>,
}

impl ContextualDomainObject {
    pub fn new(inner: DomainObjectRef, parent: Option<DomainObjectRef>) -> DomainObjectRef {
        let capabilities = inner.capabilities();
        let object: Arc<ContextualDomainObject> =
            Arc::new_cyclic(|this: &Weak<ContextualDomainObject>| {
                let this: Weak<dyn DomainObject> = this.clone();
                let handle = ObjectHandle::new(inner.id(), this.clone());
                Self {
                    inner,
                    context: Arc::new(AccessContext::new(parent, handle)),
                    capabilities,
                    this,
                }
            });
        object
    }

    /// Give an object a context with no parent, making it the root of any
    /// path traversed from it.
    pub fn root(inner: DomainObjectRef) -> DomainObjectRef {
        Self::new(inner, None)
    }
}

impl DomainObject for ContextualDomainObject {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn model_handle(&self) -> ModelHandle {
        self.inner.model_handle()
    }

    fn capability(&self, name: &str) -> Option<Capability> {
        if name == CONTEXT {
            return Some(Capability::Context(self.context.clone()));
        }
        self.capabilities
            .get(name, || ObjectHandle::new(self.inner.id(), self.this.clone()))
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities.unbound()
    }
}

/// Place `domain_object` in the context of `parent`.
///
/// Logs a warning when the parent's composition does not list the child, but
/// contextualizes it anyway.
pub fn contextualize(domain_object: DomainObjectRef, parent: &DomainObjectRef) -> DomainObjectRef {
    let id = domain_object.id();
    let listed = parent
        .model_handle()
        .read(|model| model.composition().is_some_and(|ids| ids.iter().any(|c| c == id)));
    if !listed {
        warn!(
            child = id,
            parent = parent.id(),
            "Attempted to contextualize {} in {} but that object does not contain {} in its composition",
            id,
            parent.id(),
            id
        );
    }
    ContextualDomainObject::new(domain_object, Some(parent.clone()))
}
