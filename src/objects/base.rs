use std::sync::{Arc, Weak};

use super::{DomainObject, DomainObjectRef, ObjectHandle};
use crate::capabilities::{Capability, CapabilityRegistry, CapabilitySet};
use crate::models::{Model, ModelHandle};

/// A domain object built from a stored or freshly instantiated model.
pub struct BaseDomainObject {
    id: String,
    model: ModelHandle,
    capabilities: CapabilitySet,
    this: Weak<dyn DomainObject>,
}

impl BaseDomainObject {
    /// Create an object, resolving which capabilities apply to `model`.
    ///
    /// Capability instances are built on first request, not here.
    pub fn create(
        id: impl Into<String>,
        model: Model,
        registry: &CapabilityRegistry,
    ) -> DomainObjectRef {
        let capabilities = registry.applicable(&model);
        let id = id.into();
        let object: Arc<BaseDomainObject> = Arc::new_cyclic(|this: &Weak<BaseDomainObject>| {
            let this: Weak<dyn DomainObject> = this.clone();
            Self {
                id,
                model: ModelHandle::new(model),
                capabilities,
                this,
            }
        });
        object
    }
}

impl DomainObject for BaseDomainObject {
    fn id(&self) -> &str {
        &self.id
    }

    fn model_handle(&self) -> ModelHandle {
        self.model.clone()
    }

    fn capability(&self, name: &str) -> Option<Capability> {
        self.capabilities
            .get(name, || ObjectHandle::new(&self.id, self.this.clone()))
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities.unbound()
    }
}
