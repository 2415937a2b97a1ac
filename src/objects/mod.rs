//! Domain objects: identity, model and capability lookup.
//!
//! # Wrappers
//!
//! Every object is reached through the [`DomainObject`] trait. Three
//! implementations exist:
//!
//! - [`BaseDomainObject`]: built by the [`ObjectProvider`] from a stored model.
//! - [`ContextualDomainObject`]: a view of another object that overrides the
//!   `context` capability with the access path used to reach it.
//! - [`EditableDomainObject`](crate::edit::EditableDomainObject): a
//!   session-scoped working copy.
//!
//! Capabilities are bound to the wrapper they were requested from, not to the
//! innermost object. Composition resolved through a contextual view therefore
//! contextualizes its children under that view, which is what keeps access
//! paths intact across several levels of traversal.

mod base;
mod contextual;
mod provider;

pub use base::BaseDomainObject;
pub use contextual::{contextualize, ContextualDomainObject};
pub use provider::ObjectProvider;

use std::sync::{Arc, Weak};

use crate::capabilities::{
    Capability, CapabilitySet, CompositionCapability, ContextCapability, InstantiationCapability,
    MutationCapability, PersistenceCapability, COMPOSITION, CONTEXT, INSTANTIATION, MUTATION,
    PERSISTENCE,
};
use crate::edit::EditorCapability;
use crate::error::{ObjectError, ObjectResult};
use crate::models::{Model, ModelHandle};

/// Shared reference to any domain object wrapper.
pub type DomainObjectRef = Arc<dyn DomainObject>;

/// An entity with a stable id, a model and a set of capabilities.
pub trait DomainObject: Send + Sync {
    fn id(&self) -> &str;

    /// Storage for this object's model. Writes go through the mutation
    /// capability only.
    fn model_handle(&self) -> ModelHandle;

    /// A snapshot of the current model.
    fn model(&self) -> Model {
        self.model_handle().snapshot()
    }

    /// Resolve a capability by name, or `None` when it does not apply.
    fn capability(&self, name: &str) -> Option<Capability>;

    fn has_capability(&self, name: &str) -> bool {
        self.capability(name).is_some()
    }

    /// Unbound capability factories applicable to this object, used by
    /// wrappers to build their own instances.
    fn capabilities(&self) -> CapabilitySet;

    /// The object this one wraps for editing, if it is an editable overlay.
    fn original(&self) -> Option<DomainObjectRef> {
        None
    }
}

impl dyn DomainObject {
    pub fn composition(&self) -> Option<Arc<dyn CompositionCapability>> {
        self.capability(COMPOSITION)?.as_composition()
    }

    pub fn context(&self) -> Option<Arc<dyn ContextCapability>> {
        self.capability(CONTEXT)?.as_context()
    }

    pub fn mutation(&self) -> Option<Arc<MutationCapability>> {
        self.capability(MUTATION)?.as_mutation()
    }

    pub fn persistence(&self) -> Option<Arc<dyn PersistenceCapability>> {
        self.capability(PERSISTENCE)?.as_persistence()
    }

    pub fn instantiation(&self) -> Option<Arc<dyn InstantiationCapability>> {
        self.capability(INSTANTIATION)?.as_instantiation()
    }

    pub fn editor(&self) -> Option<Arc<EditorCapability>> {
        self.capability(crate::capabilities::EDITOR)?.as_editor()
    }
}

/// Whether two references point at the same wrapper instance.
pub fn same_instance(a: &DomainObjectRef, b: &DomainObjectRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Weak back-reference from a capability to the wrapper that owns it.
///
/// Capabilities live inside their owner, so holding it strongly would leak
/// every object that ever resolved a capability.
#[derive(Clone)]
pub struct ObjectHandle {
    id: String,
    object: Weak<dyn DomainObject>,
}

impl ObjectHandle {
    pub fn new(id: impl Into<String>, object: Weak<dyn DomainObject>) -> Self {
        Self {
            id: id.into(),
            object,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn upgrade(&self) -> ObjectResult<DomainObjectRef> {
        self.object
            .upgrade()
            .ok_or_else(|| ObjectError::Released(self.id.clone()))
    }
}

impl std::fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("id", &self.id)
            .field("alive", &(self.object.strong_count() > 0))
            .finish()
    }
}
