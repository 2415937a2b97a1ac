use std::sync::Arc;

use tracing::{debug, info};

use super::WeakCache;
use crate::capabilities::{Mutation, PersistenceCapability, MUTATION};
use crate::error::{ObjectError, ObjectResult};
use crate::objects::{DomainObjectRef, ObjectHandle};

/// Save and cancel for an editable object.
///
/// Only editables have it, and only when the real object has persistence.
pub struct EditorCapability {
    editable: ObjectHandle,
    original: DomainObjectRef,
    persistence: Arc<dyn PersistenceCapability>,
    cache: WeakCache,
}

impl EditorCapability {
    pub(crate) fn new(
        editable: ObjectHandle,
        original: DomainObjectRef,
        persistence: Arc<dyn PersistenceCapability>,
        cache: WeakCache,
    ) -> Self {
        Self {
            editable,
            original,
            persistence,
            cache,
        }
    }

    /// Save changes made in the session.
    ///
    /// With `recursive` every object in the session is saved; otherwise only
    /// this one.
    pub async fn save(&self, recursive: bool) -> ObjectResult<()> {
        if recursive {
            self.cache.upgrade()?.save_all().await
        } else {
            self.save_object().await
        }
    }

    /// Copy the working model onto the real object and persist it.
    pub(crate) async fn save_object(&self) -> ObjectResult<()> {
        let model = self.editable.upgrade()?.model();
        let mutation = self
            .original
            .mutation()
            .ok_or_else(|| ObjectError::missing_capability(self.original.id(), MUTATION))?;
        mutation.mutate(move |_| Mutation::Replace(model), None);
        debug!(id = self.original.id(), "Applied edits to original");

        self.persistence.persist().await?;
        if let Ok(cache) = self.cache.upgrade() {
            cache.mark_clean(self.original.id());
        }
        Ok(())
    }

    /// Abandon the session's changes. The real objects are left untouched;
    /// the working copies go away with the session.
    pub async fn cancel(&self) -> ObjectResult<()> {
        info!(id = self.original.id(), "Cancelled editing");
        Ok(())
    }

    /// Whether this object has been persisted within the session since it
    /// was last saved.
    pub fn dirty(&self) -> bool {
        self.cache
            .upgrade()
            .map(|cache| cache.is_dirty(self.original.id()))
            .unwrap_or(false)
    }
}
