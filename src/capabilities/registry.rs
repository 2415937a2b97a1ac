use std::sync::{Arc, OnceLock};

use tracing::debug;

use super::Capability;
use crate::models::Model;
use crate::objects::ObjectHandle;

/// Predicate deciding whether a capability applies to a model.
pub type AppliesTo = Arc<dyn Fn(&Model) -> bool + Send + Sync>;

/// Builds a capability for the object behind the handle.
pub type CapabilityFactory = Arc<dyn Fn(ObjectHandle) -> Capability + Send + Sync>;

struct Registration {
    name: String,
    applies_to: AppliesTo,
    factory: CapabilityFactory,
}

/// The set of known capabilities, in registration order.
#[derive(Default)]
pub struct CapabilityRegistry {
    registrations: Vec<Registration>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability. When several registrations share a name, the
    /// first one whose predicate accepts a model is used for that model.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        applies_to: AppliesTo,
        factory: CapabilityFactory,
    ) {
        self.registrations.push(Registration {
            name: name.into(),
            applies_to,
            factory,
        });
    }

    /// Registered capability names, without duplicates.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for registration in &self.registrations {
            if !names.contains(&registration.name.as_str()) {
                names.push(&registration.name);
            }
        }
        names
    }

    /// Evaluate every predicate against `model` and collect the factories that
    /// apply. Nothing is constructed yet.
    pub fn applicable(&self, model: &Model) -> CapabilitySet {
        let mut entries: Vec<SetEntry> = Vec::new();
        for registration in &self.registrations {
            if entries.iter().any(|entry| entry.name == registration.name) {
                continue;
            }
            if (registration.applies_to)(model) {
                entries.push(SetEntry::new(
                    registration.name.clone(),
                    registration.factory.clone(),
                ));
            }
        }
        debug!(
            capabilities = ?entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            "Resolved applicable capabilities"
        );
        CapabilitySet { entries }
    }
}

struct SetEntry {
    name: String,
    factory: CapabilityFactory,
    instance: OnceLock<Capability>,
}

impl SetEntry {
    fn new(name: String, factory: CapabilityFactory) -> Self {
        Self {
            name,
            factory,
            instance: OnceLock::new(),
        }
    }
}

/// Capabilities applicable to one object, constructed on first access and
/// memoized afterwards.
pub struct CapabilitySet {
    entries: Vec<SetEntry>,
}

impl CapabilitySet {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Resolve `name`, building it against `handle` if this is the first
    /// request. Returns `None` when the capability does not apply.
    pub fn get(&self, name: &str, handle: impl FnOnce() -> ObjectHandle) -> Option<Capability> {
        let entry = self.entries.iter().find(|entry| entry.name == name)?;
        Some(
            entry
                .instance
                .get_or_init(|| (entry.factory)(handle()))
                .clone(),
        )
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// The same factories with nothing constructed, for a wrapper that binds
    /// its own instances.
    pub fn unbound(&self) -> CapabilitySet {
        CapabilitySet {
            entries: self
                .entries
                .iter()
                .map(|entry| SetEntry::new(entry.name.clone(), entry.factory.clone()))
                .collect(),
        }
    }
}
