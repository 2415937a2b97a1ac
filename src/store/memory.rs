use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{ObjectService, PersistenceService};
use crate::error::ObjectResult;
use crate::models::{IdentifierProvider, Model};

/// Process-local storage for both service contracts.
pub struct InMemoryObjectStore {
    identifiers: IdentifierProvider,
    objects: RwLock<BTreeMap<(String, String), Model>>,
}

impl InMemoryObjectStore {
    pub fn new(identifiers: IdentifierProvider) -> Self {
        Self {
            identifiers,
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    /// Seed a model under a raw id.
    pub fn insert(&self, id: &str, model: Model) {
        let id = self.identifiers.parse(id);
        self.objects
            .write()
            .expect("object store lock poisoned")
            .insert((id.space().to_string(), id.key().to_string()), model);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(self, id: &str, model: Model) -> Self {
        self.insert(id, model);
        self
    }

    pub fn get(&self, id: &str) -> Option<Model> {
        let id = self.identifiers.parse(id);
        self.read_sync(id.space(), id.key())
    }

    pub fn len(&self) -> usize {
        self.objects.read().expect("object store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_sync(&self, space: &str, key: &str) -> Option<Model> {
        self.objects
            .read()
            .expect("object store lock poisoned")
            .get(&(space.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ObjectService for InMemoryObjectStore {
    async fn get_objects(&self, ids: &[String]) -> ObjectResult<HashMap<String, Model>> {
        Ok(ids
            .iter()
            .filter_map(|raw| {
                let id = self.identifiers.parse(raw);
                self.read_sync(id.space(), id.key())
                    .map(|model| (raw.clone(), model))
            })
            .collect())
    }
}

#[async_trait]
impl PersistenceService for InMemoryObjectStore {
    async fn list_spaces(&self) -> ObjectResult<Vec<String>> {
        let objects = self.objects.read().expect("object store lock poisoned");
        let mut spaces: Vec<String> = objects.keys().map(|(space, _)| space.clone()).collect();
        spaces.dedup();
        Ok(spaces)
    }

    async fn create_object(&self, space: &str, key: &str, model: &Model) -> ObjectResult<bool> {
        let mut objects = self.objects.write().expect("object store lock poisoned");
        let slot = (space.to_string(), key.to_string());
        if objects.contains_key(&slot) {
            return Ok(false);
        }
        objects.insert(slot, model.clone());
        Ok(true)
    }

    async fn read_object(&self, space: &str, key: &str) -> ObjectResult<Option<Model>> {
        Ok(self.read_sync(space, key))
    }

    async fn update_object(&self, space: &str, key: &str, model: &Model) -> ObjectResult<bool> {
        let mut objects = self.objects.write().expect("object store lock poisoned");
        match objects.get_mut(&(space.to_string(), key.to_string())) {
            Some(existing) => {
                *existing = model.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_object(&self, space: &str, key: &str) -> ObjectResult<bool> {
        Ok(self
            .objects
            .write()
            .expect("object store lock poisoned")
            .remove(&(space.to_string(), key.to_string()))
            .is_some())
    }
}
