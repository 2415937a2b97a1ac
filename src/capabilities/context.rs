use crate::error::ObjectResult;
use crate::objects::{DomainObjectRef, ObjectHandle};

/// The access path through which one object instance was reached.
pub trait ContextCapability: Send + Sync {
    /// The object this instance was reached through, if any.
    fn parent(&self) -> Option<DomainObjectRef>;

    /// The object this context belongs to.
    fn domain_object(&self) -> ObjectResult<DomainObjectRef>;

    /// Ancestors from the root down to, and including, this object.
    fn path(&self) -> ObjectResult<Vec<DomainObjectRef>>;

    fn root(&self) -> ObjectResult<DomainObjectRef> {
        match self.path()?.into_iter().next() {
            Some(root) => Ok(root),
            None => self.domain_object(),
        }
    }
}

/// Context recorded when an object is contextualized under a parent.
pub struct AccessContext {
    parent: Option<DomainObjectRef>,
    domain_object: ObjectHandle,
}

impl AccessContext {
    pub fn new(parent: Option<DomainObjectRef>, domain_object: ObjectHandle) -> Self {
        Self {
            parent,
            domain_object,
        }
    }
}

impl ContextCapability for AccessContext {
    fn parent(&self) -> Option<DomainObjectRef> {
        self.parent.clone()
    }

    fn domain_object(&self) -> ObjectResult<DomainObjectRef> {
        self.domain_object.upgrade()
    }

    fn path(&self) -> ObjectResult<Vec<DomainObjectRef>> {
        let this = self.domain_object.upgrade()?;
        let mut path = match &self.parent {
            Some(parent) => match parent.context() {
                Some(context) => context.path()?,
                None => vec![parent.clone()],
            },
            None => Vec::new(),
        };
        path.push(this);
        Ok(path)
    }
}
