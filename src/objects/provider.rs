use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tracing::debug;

use super::{BaseDomainObject, DomainObjectRef};
use crate::capabilities::{now_millis, CapabilityRegistry};
use crate::error::{ObjectError, ObjectResult};
use crate::models::Model;
use crate::store::ObjectService;

/// Turns models supplied by the object service into domain objects.
///
/// Holds the capability registry weakly: the registry's own factories hold
/// providers, so a strong reference would keep the runtime alive forever.
#[derive(Clone)]
pub struct ObjectProvider {
    service: Arc<dyn ObjectService>,
    registry: Weak<CapabilityRegistry>,
}

impl ObjectProvider {
    pub fn new(service: Arc<dyn ObjectService>, registry: Weak<CapabilityRegistry>) -> Self {
        Self { service, registry }
    }

    pub fn registry(&self) -> ObjectResult<Arc<CapabilityRegistry>> {
        self.registry.upgrade().ok_or(ObjectError::RuntimeClosed)
    }

    /// Load the objects for `ids`. Ids the service cannot resolve are simply
    /// absent from the result.
    ///
    /// Models without a `persisted` stamp are stamped with their `modified`
    /// value, so later writes update the stored copy instead of creating it.
    pub async fn get_objects(
        &self,
        ids: &[String],
    ) -> ObjectResult<HashMap<String, DomainObjectRef>> {
        let models = self.service.get_objects(ids).await?;
        debug!(
            requested = ids.len(),
            resolved = models.len(),
            "Loaded models from object service"
        );
        let registry = self.registry()?;
        Ok(models
            .into_iter()
            .map(|(id, mut model)| {
                if model.persisted().is_none() {
                    model.set_persisted(model.modified().unwrap_or_else(now_millis));
                }
                let object = BaseDomainObject::create(id.clone(), model, &registry);
                (id, object)
            })
            .collect())
    }

    pub async fn get_object(&self, id: &str) -> ObjectResult<Option<DomainObjectRef>> {
        let mut objects = self.get_objects(&[id.to_string()]).await?;
        Ok(objects.remove(id))
    }

    /// Build an object for a model that has not been stored yet.
    pub fn instantiate(&self, id: impl Into<String>, model: Model) -> ObjectResult<DomainObjectRef> {
        let registry = self.registry()?;
        Ok(BaseDomainObject::create(id, model, &registry))
    }
}
