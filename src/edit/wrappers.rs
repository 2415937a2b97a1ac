//! Capability overrides installed on editable objects.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use super::WeakCache;
use crate::capabilities::{
    CompositionCapability, ContextCapability, InstantiationCapability, PersistenceCapability,
};
use crate::error::ObjectResult;
use crate::models::Model;
use crate::objects::DomainObjectRef;

/// Context whose parent and path are editables from the same session.
///
/// Rebuilt on every request so it reflects the session's current entries.
pub(crate) struct EditableContext {
    delegate: Arc<dyn ContextCapability>,
    cache: WeakCache,
}

impl EditableContext {
    pub(crate) fn new(delegate: Arc<dyn ContextCapability>, cache: WeakCache) -> Self {
        Self { delegate, cache }
    }
}

impl ContextCapability for EditableContext {
    fn parent(&self) -> Option<DomainObjectRef> {
        self.delegate.parent().map(|parent| self.cache.wrap(&parent))
    }

    fn domain_object(&self) -> ObjectResult<DomainObjectRef> {
        Ok(self.cache.wrap(&self.delegate.domain_object()?))
    }

    fn path(&self) -> ObjectResult<Vec<DomainObjectRef>> {
        Ok(self
            .delegate
            .path()?
            .iter()
            .map(|object| self.cache.wrap(object))
            .collect())
    }
}

type EditableChildren = Shared<BoxFuture<'static, ObjectResult<Vec<DomainObjectRef>>>>;

/// Composition that resolves once per session.
///
/// The first `invoke` is remembered and every later call shares its result.
/// Adding or removing children through this capability forgets it.
pub(crate) struct EditableComposition {
    delegate: Arc<dyn CompositionCapability>,
    cache: WeakCache,
    resolved: Mutex<Option<EditableChildren>>,
}

impl EditableComposition {
    pub(crate) fn new(delegate: Arc<dyn CompositionCapability>, cache: WeakCache) -> Self {
        Self {
            delegate,
            cache,
            resolved: Mutex::new(None),
        }
    }

    fn forget(&self) {
        *self.resolved.lock().expect("editable composition lock poisoned") = None;
    }
}

#[async_trait]
impl CompositionCapability for EditableComposition {
    async fn invoke(&self) -> ObjectResult<Vec<DomainObjectRef>> {
        let children = {
            let mut resolved = self.resolved.lock().expect("editable composition lock poisoned");
            match resolved.as_ref() {
                Some(children) => children.clone(),
                None => {
                    let delegate = Arc::clone(&self.delegate);
                    let cache = self.cache.clone();
                    let children = async move {
                        let children = delegate.invoke().await?;
                        debug!(count = children.len(), "Wrapping composition for editing");
                        Ok(children.iter().map(|child| cache.wrap(child)).collect())
                    }
                    .boxed()
                    .shared();
                    *resolved = Some(children.clone());
                    children
                }
            }
        };
        children.await
    }

    fn add(&self, child: DomainObjectRef, index: Option<usize>) -> ObjectResult<DomainObjectRef> {
        let added = self.delegate.add(child, index)?;
        self.forget();
        Ok(self.cache.wrap(&added))
    }

    fn remove(&self, id: &str) -> ObjectResult<bool> {
        let removed = self.delegate.remove(id)?;
        self.forget();
        Ok(removed)
    }
}

/// Instantiation whose new objects join the session.
pub(crate) struct EditableInstantiation {
    delegate: Arc<dyn InstantiationCapability>,
    cache: WeakCache,
}

impl EditableInstantiation {
    pub(crate) fn new(delegate: Arc<dyn InstantiationCapability>, cache: WeakCache) -> Self {
        Self { delegate, cache }
    }
}

impl InstantiationCapability for EditableInstantiation {
    fn instantiate(&self, model: Model) -> ObjectResult<DomainObjectRef> {
        Ok(self.cache.wrap(&self.delegate.instantiate(model)?))
    }
}

/// Persistence that records the object as dirty instead of writing it.
///
/// Writes happen when the session is saved.
pub(crate) struct EditablePersistence {
    id: String,
    delegate: Arc<dyn PersistenceCapability>,
    cache: WeakCache,
}

impl EditablePersistence {
    pub(crate) fn new(
        id: impl Into<String>,
        delegate: Arc<dyn PersistenceCapability>,
        cache: WeakCache,
    ) -> Self {
        Self {
            id: id.into(),
            delegate,
            cache,
        }
    }
}

#[async_trait]
impl PersistenceCapability for EditablePersistence {
    async fn persist(&self) -> ObjectResult<()> {
        self.cache.upgrade()?.mark_dirty(&self.id);
        Ok(())
    }

    async fn refresh(&self) -> ObjectResult<()> {
        self.delegate.refresh().await
    }

    fn space(&self) -> String {
        self.delegate.space()
    }
}
