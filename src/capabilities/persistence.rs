use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{now_millis, Mutation, MUTATION};
use crate::error::{ObjectError, ObjectResult};
use crate::models::IdentifierProvider;
use crate::objects::{DomainObjectRef, ObjectHandle};
use crate::queue::PersistenceQueue;
use crate::store::PersistenceService;

/// Writes an object's model to, and reloads it from, storage.
#[async_trait]
pub trait PersistenceCapability: Send + Sync {
    async fn persist(&self) -> ObjectResult<()>;

    /// Replace the model with the stored copy, if there is one.
    async fn refresh(&self) -> ObjectResult<()>;

    /// The storage space the object lives in.
    fn space(&self) -> String;
}

/// Persistence that talks to the persistence service directly.
pub struct StoredPersistence {
    owner: ObjectHandle,
    service: Arc<dyn PersistenceService>,
    identifiers: IdentifierProvider,
}

impl StoredPersistence {
    pub fn new(
        owner: ObjectHandle,
        service: Arc<dyn PersistenceService>,
        identifiers: IdentifierProvider,
    ) -> Self {
        Self {
            owner,
            service,
            identifiers,
        }
    }

    fn mutate(
        &self,
        object: &DomainObjectRef,
        mutation: Mutation,
        timestamp: i64,
    ) -> ObjectResult<bool> {
        let capability = object
            .mutation()
            .ok_or_else(|| ObjectError::missing_capability(object.id(), MUTATION))?;
        Ok(capability.mutate(|_| mutation, Some(timestamp)))
    }
}

#[async_trait]
impl PersistenceCapability for StoredPersistence {
    async fn persist(&self) -> ObjectResult<()> {
        let object = self.owner.upgrade()?;
        let current = object.model();
        let modified = current.modified().unwrap_or_else(now_millis);
        let first_write = current.persisted().is_none();

        let mut stamped = current;
        stamped.set_persisted(modified);
        self.mutate(&object, Mutation::Replace(stamped), modified)?;

        let id = self.identifiers.parse(object.id());
        let model = object.model();
        let written = if first_write {
            self.service.create_object(id.space(), id.key(), &model).await?
        } else {
            self.service.update_object(id.space(), id.key(), &model).await?
        };

        if !written {
            return Err(ObjectError::Persistence {
                id: object.id().to_string(),
                message: "persistence service rejected the write".to_string(),
            });
        }
        debug!(id = object.id(), modified, created = first_write, "Persisted object");
        Ok(())
    }

    async fn refresh(&self) -> ObjectResult<()> {
        let object = self.owner.upgrade()?;
        let id = self.identifiers.parse(object.id());
        let Some(stored) = self.service.read_object(id.space(), id.key()).await? else {
            return Ok(());
        };
        let modified = stored.modified().unwrap_or_else(now_millis);
        self.mutate(&object, Mutation::Replace(stored), modified)?;
        info!(id = object.id(), "Refreshed object from storage");
        Ok(())
    }

    fn space(&self) -> String {
        self.identifiers.parse(self.owner.id()).space().to_string()
    }
}

/// Persistence routed through the batching queue.
///
/// `persist` resolves once the batch containing this object has flushed, and
/// fails if this object's write failed within it.
pub struct QueuingPersistence {
    owner: ObjectHandle,
    stored: Arc<StoredPersistence>,
    queue: PersistenceQueue,
}

impl QueuingPersistence {
    pub fn new(owner: ObjectHandle, stored: Arc<StoredPersistence>, queue: PersistenceQueue) -> Self {
        Self {
            owner,
            stored,
            queue,
        }
    }
}

#[async_trait]
impl PersistenceCapability for QueuingPersistence {
    async fn persist(&self) -> ObjectResult<()> {
        let object = self.owner.upgrade()?;
        let report = self.queue.put(object.clone(), self.stored.clone()).await?;
        match report.failure_for(object.id()) {
            Some(failure) => Err(failure.error.clone()),
            None => Ok(()),
        }
    }

    async fn refresh(&self) -> ObjectResult<()> {
        self.stored.refresh().await
    }

    fn space(&self) -> String {
        self.stored.space()
    }
}
