use std::sync::Mutex;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use super::{Mutation, MUTATION};
use crate::error::{ObjectError, ObjectResult};
use crate::models::Model;
use crate::objects::{contextualize, DomainObjectRef, ObjectHandle, ObjectProvider};

/// Resolves a container's `composition` ids into child objects.
#[async_trait]
pub trait CompositionCapability: Send + Sync {
    /// The children, each contextualized under the owner, in composition
    /// order. Ids the object service cannot resolve are left out.
    async fn invoke(&self) -> ObjectResult<Vec<DomainObjectRef>>;

    /// Add `child` to the composition and return it contextualized under the
    /// owner. With an `index` an existing entry is moved there; without one
    /// an existing entry is left where it is.
    fn add(&self, child: DomainObjectRef, index: Option<usize>) -> ObjectResult<DomainObjectRef>;

    /// Remove every occurrence of `id`. Returns whether anything changed.
    fn remove(&self, id: &str) -> ObjectResult<bool>;
}

type ChildrenFuture = Shared<BoxFuture<'static, ObjectResult<Vec<DomainObjectRef>>>>;

/// Memoized fetch of the children, keyed by the owner's `modified`.
struct LastFetch {
    modified: Option<i64>,
    children: ChildrenFuture,
}

/// Composition backed by the object provider.
pub struct Composition {
    owner: ObjectHandle,
    provider: ObjectProvider,
    last: Mutex<Option<LastFetch>>,
}

impl Composition {
    pub fn new(owner: ObjectHandle, provider: ObjectProvider) -> Self {
        Self {
            owner,
            provider,
            last: Mutex::new(None),
        }
    }

    pub fn applies_to(model: &Model) -> bool {
        model.has_composition()
    }

    fn fetch(&self, ids: Vec<String>) -> ChildrenFuture {
        let provider = self.provider.clone();
        async move {
            let found = provider.get_objects(&ids).await?;
            // Duplicated ids yield the same child more than once.
            Ok(ids
                .iter()
                .filter_map(|id| found.get(id).cloned())
                .collect::<Vec<_>>())
        }
        .boxed()
        .shared()
    }

    fn mutate_ids(
        &self,
        owner: &DomainObjectRef,
        edit: impl FnOnce(&mut Vec<String>) -> bool,
    ) -> ObjectResult<bool> {
        let mutation = owner
            .mutation()
            .ok_or_else(|| ObjectError::missing_capability(owner.id(), MUTATION))?;
        Ok(mutation.mutate(
            |model| {
                let mut ids = model.composition().unwrap_or_default();
                if !edit(&mut ids) {
                    return Mutation::Cancel;
                }
                model.set_composition(ids);
                Mutation::Apply
            },
            None,
        ))
    }
}

#[async_trait]
impl CompositionCapability for Composition {
    async fn invoke(&self) -> ObjectResult<Vec<DomainObjectRef>> {
        let owner = self.owner.upgrade()?;
        let (modified, ids) = owner
            .model_handle()
            .read(|model| (model.modified(), model.composition().unwrap_or_default()));

        let children = {
            let mut last = self.last.lock().expect("composition lock poisoned");
            match last.as_ref() {
                Some(fetch) if fetch.modified == modified => {
                    debug!(id = owner.id(), "Reusing composition fetch");
                    fetch.children.clone()
                }
                _ => {
                    debug!(id = owner.id(), children = ids.len(), "Fetching composition");
                    let children = self.fetch(ids);
                    *last = Some(LastFetch {
                        modified,
                        children: children.clone(),
                    });
                    children
                }
            }
        };

        let children = children.await?;
        Ok(children
            .into_iter()
            .map(|child| contextualize(child, &owner))
            .collect())
    }

    fn add(&self, child: DomainObjectRef, index: Option<usize>) -> ObjectResult<DomainObjectRef> {
        let owner = self.owner.upgrade()?;
        let id = child.id().to_string();
        self.mutate_ids(&owner, |ids| {
            let present = ids.contains(&id);
            match index {
                None if present => false,
                None => {
                    ids.push(id.clone());
                    true
                }
                Some(index) => {
                    ids.retain(|existing| existing != &id);
                    ids.insert(index.min(ids.len()), id.clone());
                    true
                }
            }
        })?;
        Ok(contextualize(child, &owner))
    }

    fn remove(&self, id: &str) -> ObjectResult<bool> {
        let owner = self.owner.upgrade()?;
        self.mutate_ids(&owner, |ids| {
            let before = ids.len();
            ids.retain(|existing| existing != id);
            ids.len() != before
        })
    }
}
