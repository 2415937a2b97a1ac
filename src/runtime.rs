//! The process-wide context that wires the object system together.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tracing::info;

use crate::capabilities::{
    AppliesTo, Capability, CapabilityFactory, CapabilityRegistry, Composition, Instantiation,
    MutationCapability, QueuingPersistence, StoredPersistence, COMPOSITION, INSTANTIATION,
    MUTATION, PERSISTENCE,
};
use crate::config::RuntimeConfig;
use crate::edit::EditableObjectCache;
use crate::error::{ObjectError, ObjectResult};
use crate::models::{IdentifierProvider, Model};
use crate::objects::{DomainObjectRef, ObjectHandle, ObjectProvider};
use crate::queue::{BatchReport, FailureHandler, LoggingFailureHandler, PersistenceQueue};
use crate::store::{InMemoryObjectStore, ObjectService, PersistenceService};
use crate::topic::MutationTopics;

/// Owns the registry, provider, persistence queue and listener topics.
///
/// Dropping the runtime releases the registry; objects still alive after
/// that keep their resolved capabilities but can no longer load children.
pub struct Runtime {
    config: RuntimeConfig,
    identifiers: IdentifierProvider,
    topics: Arc<MutationTopics>,
    registry: Arc<CapabilityRegistry>,
    provider: ObjectProvider,
    queue: PersistenceQueue,
}

impl Runtime {
    pub fn builder(config: RuntimeConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(config)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn identifiers(&self) -> &IdentifierProvider {
        &self.identifiers
    }

    pub fn topics(&self) -> &MutationTopics {
        &self.topics
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn provider(&self) -> &ObjectProvider {
        &self.provider
    }

    pub fn queue(&self) -> &PersistenceQueue {
        &self.queue
    }

    pub async fn get_object(&self, id: &str) -> ObjectResult<Option<DomainObjectRef>> {
        self.provider.get_object(id).await
    }

    /// Like [`Runtime::get_object`], but a missing object is an error.
    pub async fn require_object(&self, id: &str) -> ObjectResult<DomainObjectRef> {
        self.get_object(id)
            .await?
            .ok_or_else(|| ObjectError::NotFound(id.to_string()))
    }

    pub async fn get_objects(
        &self,
        ids: &[String],
    ) -> ObjectResult<HashMap<String, DomainObjectRef>> {
        self.provider.get_objects(ids).await
    }

    /// Create a new, unpersisted object with a generated id in the default
    /// space.
    pub fn instantiate(&self, model: Model) -> ObjectResult<DomainObjectRef> {
        let id = self
            .identifiers
            .generate(Some(self.identifiers.default_space()));
        self.provider.instantiate(id, model)
    }

    /// Start an edit session.
    pub fn edit_session(&self) -> EditableObjectCache {
        EditableObjectCache::new()
    }

    /// Flush the persistence queue now.
    pub async fn flush(&self) -> Arc<BatchReport> {
        self.queue.flush().await
    }

    /// Write out pending persistence and drop every listener.
    pub async fn shutdown(&self) -> Arc<BatchReport> {
        let report = self.queue.flush().await;
        self.topics.clear();
        info!(
            persisted = report.persisted.len(),
            failed = report.failures.len(),
            "Runtime shut down"
        );
        report
    }
}

/// Configures the collaborators and capabilities of a [`Runtime`].
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    object_service: Option<Arc<dyn ObjectService>>,
    persistence_service: Option<Arc<dyn PersistenceService>>,
    failure_handler: Option<Arc<dyn FailureHandler>>,
    plugins: Vec<(String, AppliesTo, CapabilityFactory)>,
}

impl RuntimeBuilder {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            object_service: None,
            persistence_service: None,
            failure_handler: None,
            plugins: Vec::new(),
        }
    }

    pub fn object_service(mut self, service: Arc<dyn ObjectService>) -> Self {
        self.object_service = Some(service);
        self
    }

    pub fn persistence_service(mut self, service: Arc<dyn PersistenceService>) -> Self {
        self.persistence_service = Some(service);
        self
    }

    /// Use one store for both lookups and writes.
    pub fn store<S>(self, store: Arc<S>) -> Self
    where
        S: ObjectService + PersistenceService + 'static,
    {
        self.object_service(store.clone()).persistence_service(store)
    }

    pub fn failure_handler(mut self, handler: Arc<dyn FailureHandler>) -> Self {
        self.failure_handler = Some(handler);
        self
    }

    /// Register a capability. Plugin registrations are consulted before the
    /// built-in ones, so they can replace a built-in for the models their
    /// predicate accepts.
    pub fn capability(
        mut self,
        name: impl Into<String>,
        applies_to: impl Fn(&Model) -> bool + Send + Sync + 'static,
        factory: impl Fn(ObjectHandle) -> Capability + Send + Sync + 'static,
    ) -> Self {
        let applies_to: AppliesTo = Arc::new(applies_to);
        let factory: CapabilityFactory = Arc::new(factory);
        self.plugins.push((name.into(), applies_to, factory));
        self
    }

    pub fn build(self) -> Runtime {
        let identifiers = IdentifierProvider::new(self.config.default_space.clone());
        let memory = Arc::new(InMemoryObjectStore::new(identifiers.clone()));
        let object_service: Arc<dyn ObjectService> = match self.object_service {
            Some(service) => service,
            None => memory.clone(),
        };
        let persistence_service: Arc<dyn PersistenceService> = match self.persistence_service {
            Some(service) => service,
            None => memory,
        };
        let handler: Arc<dyn FailureHandler> = match self.failure_handler {
            Some(handler) => handler,
            None => Arc::new(LoggingFailureHandler),
        };

        let topics = Arc::new(MutationTopics::new());
        let queue = PersistenceQueue::new(self.config.queue_delay(), handler);

        let plugins = self.plugins;
        let registry = Arc::new_cyclic(|registry: &Weak<CapabilityRegistry>| {
            let provider = ObjectProvider::new(object_service.clone(), registry.clone());
            let mut capabilities = CapabilityRegistry::new();
            for (name, applies_to, factory) in plugins {
                capabilities.register(name, applies_to, factory);
            }
            register_builtins(
                &mut capabilities,
                provider,
                identifiers.clone(),
                Arc::clone(&topics),
                persistence_service,
                queue.clone(),
            );
            capabilities
        });
        let provider = ObjectProvider::new(object_service, Arc::downgrade(&registry));

        info!(
            default_space = %identifiers.default_space(),
            capabilities = ?registry.names(),
            "Object runtime ready"
        );

        Runtime {
            config: self.config,
            identifiers,
            topics,
            registry,
            provider,
            queue,
        }
    }
}

fn register_builtins(
    registry: &mut CapabilityRegistry,
    provider: ObjectProvider,
    identifiers: IdentifierProvider,
    topics: Arc<MutationTopics>,
    persistence_service: Arc<dyn PersistenceService>,
    queue: PersistenceQueue,
) {
    let always: AppliesTo = Arc::new(|_: &Model| true);

    let composition_provider = provider.clone();
    registry.register(
        COMPOSITION,
        Arc::new(Composition::applies_to),
        Arc::new(move |handle: ObjectHandle| {
            Capability::Composition(Arc::new(Composition::new(
                handle,
                composition_provider.clone(),
            )))
        }),
    );

    registry.register(
        MUTATION,
        always.clone(),
        Arc::new(move |handle: ObjectHandle| {
            Capability::Mutation(Arc::new(MutationCapability::new(handle, Arc::clone(&topics))))
        }),
    );

    let instantiation_identifiers = identifiers.clone();
    registry.register(
        INSTANTIATION,
        always.clone(),
        Arc::new(move |handle: ObjectHandle| {
            Capability::Instantiation(Arc::new(Instantiation::new(
                handle,
                provider.clone(),
                instantiation_identifiers.clone(),
            )))
        }),
    );

    registry.register(
        PERSISTENCE,
        always,
        Arc::new(move |handle: ObjectHandle| {
            let stored = Arc::new(StoredPersistence::new(
                handle.clone(),
                Arc::clone(&persistence_service),
                identifiers.clone(),
            ));
            Capability::Persistence(Arc::new(QueuingPersistence::new(
                handle,
                stored,
                queue.clone(),
            )))
        }),
    );
}
