//! Contracts with the storage collaborators, plus an in-memory store.
//!
//! The object service answers lookups by raw id; the persistence service
//! writes by `(space, key)`. Either may be backed by anything: the
//! [`SqliteObjectStore`](crate::db::SqliteObjectStore) and
//! [`InMemoryObjectStore`] implement both.

mod memory;

pub use memory::InMemoryObjectStore;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ObjectResult;
use crate::models::Model;

/// Supplies models by id.
#[async_trait]
pub trait ObjectService: Send + Sync {
    /// Look up `ids`. Ids that cannot be resolved are left out of the
    /// result rather than failing the request.
    async fn get_objects(&self, ids: &[String]) -> ObjectResult<HashMap<String, Model>>;
}

/// Stores models by space and key.
///
/// Writes report `false` when the service refuses them, such as creating
/// a key that exists or updating one that does not.
#[async_trait]
pub trait PersistenceService: Send + Sync {
    async fn list_spaces(&self) -> ObjectResult<Vec<String>>;

    async fn create_object(&self, space: &str, key: &str, model: &Model) -> ObjectResult<bool>;

    async fn read_object(&self, space: &str, key: &str) -> ObjectResult<Option<Model>>;

    async fn update_object(&self, space: &str, key: &str, model: &Model) -> ObjectResult<bool>;

    async fn delete_object(&self, space: &str, key: &str) -> ObjectResult<bool>;
}
