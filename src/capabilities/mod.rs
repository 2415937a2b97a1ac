//! Capabilities: named, model-gated behaviors resolved per object.
//!
//! Which capabilities an object has is decided by the [`CapabilityRegistry`]
//! from the shape of its model. Instances are built on first request and are
//! bound to the wrapper they were requested from.

mod composition;
mod context;
mod instantiation;
mod mutation;
mod persistence;
mod registry;

pub use composition::{Composition, CompositionCapability};
pub use context::{AccessContext, ContextCapability};
pub use instantiation::{Instantiation, InstantiationCapability};
pub use mutation::{Mutation, MutationCapability};
pub use persistence::{PersistenceCapability, QueuingPersistence, StoredPersistence};
pub use registry::{AppliesTo, CapabilityFactory, CapabilityRegistry, CapabilitySet};

pub(crate) use mutation::now_millis;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::edit::EditorCapability;

pub const COMPOSITION: &str = "composition";
pub const CONTEXT: &str = "context";
pub const MUTATION: &str = "mutation";
pub const PERSISTENCE: &str = "persistence";
pub const INSTANTIATION: &str = "instantiation";
pub const EDITOR: &str = "editor";

/// A resolved capability instance.
///
/// Built-in capabilities each get a variant with an explicit interface.
/// Plugins that register other names use [`Capability::Custom`] and downcast.
#[derive(Clone)]
pub enum Capability {
    Composition(Arc<dyn CompositionCapability>),
    Context(Arc<dyn ContextCapability>),
    Mutation(Arc<MutationCapability>),
    Persistence(Arc<dyn PersistenceCapability>),
    Instantiation(Arc<dyn InstantiationCapability>),
    Editor(Arc<EditorCapability>),
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Capability {
    pub fn as_composition(&self) -> Option<Arc<dyn CompositionCapability>> {
        match self {
            Self::Composition(capability) => Some(capability.clone()),
            _ => None,
        }
    }

    pub fn as_context(&self) -> Option<Arc<dyn ContextCapability>> {
        match self {
            Self::Context(capability) => Some(capability.clone()),
            _ => None,
        }
    }

    pub fn as_mutation(&self) -> Option<Arc<MutationCapability>> {
        match self {
            Self::Mutation(capability) => Some(capability.clone()),
            _ => None,
        }
    }

    pub fn as_persistence(&self) -> Option<Arc<dyn PersistenceCapability>> {
        match self {
            Self::Persistence(capability) => Some(capability.clone()),
            _ => None,
        }
    }

    pub fn as_instantiation(&self) -> Option<Arc<dyn InstantiationCapability>> {
        match self {
            Self::Instantiation(capability) => Some(capability.clone()),
            _ => None,
        }
    }

    pub fn as_editor(&self) -> Option<Arc<EditorCapability>> {
        match self {
            Self::Editor(capability) => Some(capability.clone()),
            _ => None,
        }
    }

    /// Downcast a plugin capability to its concrete type.
    pub fn as_custom<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Custom(capability) => capability.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Composition(_) => "Composition",
            Self::Context(_) => "Context",
            Self::Mutation(_) => "Mutation",
            Self::Persistence(_) => "Persistence",
            Self::Instantiation(_) => "Instantiation",
            Self::Editor(_) => "Editor",
            Self::Custom(_) => "Custom",
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability::{}", self.kind())
    }
}
