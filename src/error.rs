//! Error types shared by the object, capability, edit and queue layers.

use thiserror::Error;

/// Errors surfaced by domain-object operations.
///
/// Cloneable so that one in-flight request (composition fetch, batch flush)
/// can hand the same failure to every caller awaiting it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ObjectError {
    #[error("Object service failed: {0}")]
    Service(String),

    #[error("Persistence failed for {id}: {message}")]
    Persistence { id: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object {id} has no {capability} capability")]
    MissingCapability { id: String, capability: String },

    #[error("Domain object {0} is no longer available")]
    Released(String),

    #[error("Edit session has ended")]
    SessionClosed,

    #[error("Runtime has been shut down")]
    RuntimeClosed,

    #[error("Persistence queue dropped the request")]
    QueueClosed,

    #[error("Invalid model: {0}")]
    InvalidModel(String),
}

impl ObjectError {
    pub fn missing_capability(id: impl Into<String>, capability: &str) -> Self {
        Self::MissingCapability {
            id: id.into(),
            capability: capability.to_string(),
        }
    }
}

impl From<rusqlite::Error> for ObjectError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ObjectError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidModel(err.to_string())
    }
}

/// Result type for domain-object operations.
pub type ObjectResult<T> = std::result::Result<T, ObjectError>;
