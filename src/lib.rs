//! Capability-based domain objects with edit sessions and batched
//! persistence.
//!
//! A [`Runtime`] loads [`DomainObject`]s from an object service and resolves
//! their capabilities from the shape of their models. Composition and context
//! expand the object graph on demand, [`EditableObjectCache`] gives an editor
//! isolated working copies, and the [`PersistenceQueue`] batches writes.

pub mod capabilities;
pub mod config;
pub mod db;
pub mod edit;
pub mod error;
pub mod models;
pub mod objects;
pub mod queue;
pub mod runtime;
pub mod store;
pub mod topic;
pub mod tree_render;

pub use capabilities::{Capability, Mutation};
pub use config::RuntimeConfig;
pub use edit::{EditableDomainObject, EditableObjectCache, EditorCapability};
pub use error::{ObjectError, ObjectResult};
pub use models::{Identifier, IdentifierProvider, Model};
pub use objects::{DomainObject, DomainObjectRef};
pub use queue::{BatchReport, PersistenceQueue};
pub use runtime::{Runtime, RuntimeBuilder};
