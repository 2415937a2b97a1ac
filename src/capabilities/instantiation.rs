use crate::error::ObjectResult;
use crate::models::{IdentifierProvider, Model};
use crate::objects::{ContextualDomainObject, DomainObjectRef, ObjectHandle, ObjectProvider};

/// Creates new, unpersisted objects alongside an existing one.
pub trait InstantiationCapability: Send + Sync {
    /// Build an object for `model` with a fresh id in the owner's space. The
    /// result is contextualized under the owner but not added to its
    /// composition.
    fn instantiate(&self, model: Model) -> ObjectResult<DomainObjectRef>;
}

pub struct Instantiation {
    owner: ObjectHandle,
    provider: ObjectProvider,
    identifiers: IdentifierProvider,
}

impl Instantiation {
    pub fn new(owner: ObjectHandle, provider: ObjectProvider, identifiers: IdentifierProvider) -> Self {
        Self {
            owner,
            provider,
            identifiers,
        }
    }
}

impl InstantiationCapability for Instantiation {
    fn instantiate(&self, model: Model) -> ObjectResult<DomainObjectRef> {
        let owner = self.owner.upgrade()?;
        let parsed = self.identifiers.parse(owner.id());
        let id = self.identifiers.generate(parsed.defined_space());
        let object = self.provider.instantiate(id, model)?;
        Ok(ContextualDomainObject::new(object, Some(owner)))
    }
}
