use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ObjectError, ObjectResult};

/// The plain-data state of a domain object.
///
/// Models are untyped JSON objects. A handful of well-known fields drive the
/// object system:
///
/// - `name`, `type`: descriptive metadata
/// - `modified`: logical timestamp (epoch ms) bumped by every mutation and
///   used for cache invalidation
/// - `persisted`: the `modified` value last written to storage
/// - `composition`: ordered list of child ids; its presence as an array is what
///   makes an object a container
///
/// Everything else is type-specific and carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Model(Map<String, Value>);

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a JSON value into a model. Only JSON objects are accepted.
    pub fn from_value(value: Value) -> ObjectResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ObjectError::InvalidModel(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    /// Builder-style field assignment.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn type_key(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    pub fn modified(&self) -> Option<i64> {
        self.0.get("modified").and_then(Value::as_i64)
    }

    pub fn set_modified(&mut self, timestamp: i64) {
        self.0.insert("modified".to_string(), Value::from(timestamp));
    }

    pub fn persisted(&self) -> Option<i64> {
        self.0.get("persisted").and_then(Value::as_i64)
    }

    pub fn set_persisted(&mut self, timestamp: i64) {
        self.0.insert("persisted".to_string(), Value::from(timestamp));
    }

    /// Whether `composition` is present as an array.
    pub fn has_composition(&self) -> bool {
        matches!(self.0.get("composition"), Some(Value::Array(_)))
    }

    /// Child ids listed in `composition`. Non-string entries are skipped.
    pub fn composition(&self) -> Option<Vec<String>> {
        match self.0.get("composition") {
            Some(Value::Array(ids)) => Some(
                ids.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn set_composition(&mut self, ids: Vec<String>) {
        self.0.insert(
            "composition".to_string(),
            Value::Array(ids.into_iter().map(Value::String).collect()),
        );
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.to_string(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Model {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Shared, writable storage for one object's model.
///
/// Wrappers around the same underlying object (for example a contextualized
/// view) share one handle, so a mutation made through any of them is visible
/// to all. Editable overlays own a separate handle holding their clone.
#[derive(Debug, Clone, Default)]
pub struct ModelHandle(Arc<RwLock<Model>>);

impl ModelHandle {
    pub fn new(model: Model) -> Self {
        Self(Arc::new(RwLock::new(model)))
    }

    /// A copy of the current model.
    pub fn snapshot(&self) -> Model {
        self.0.read().expect("model lock poisoned").clone()
    }

    /// Read a value out of the model without cloning the whole thing.
    pub fn read<R>(&self, f: impl FnOnce(&Model) -> R) -> R {
        f(&self.0.read().expect("model lock poisoned"))
    }

    pub(crate) fn replace(&self, model: Model) {
        *self.0.write().expect("model lock poisoned") = model;
    }
}
